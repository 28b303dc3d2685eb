use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("node {0} is not part of the tree")]
    MissingNode(String),

    #[error("cannot attach {node} beneath its own descendant {parent}")]
    WouldCycle { node: String, parent: String },

    #[error("node {0} has no parent")]
    Detached(String),
}

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("the render tree is a read-only projection; mutate the origin tree instead")]
    ReadOnlyProjection,

    #[error("unknown kind `{0}`")]
    UnknownKind(String),

    #[error("unknown layout `{0}`")]
    UnknownLayout(String),

    #[error("kind `{0}` extends itself")]
    ExtendCycle(String),

    #[error("document has been disposed")]
    Disposed,

    #[error("node `{0}` not found")]
    NodeNotFound(String),

    #[error("node id `{0}` appears more than once in the declared tree")]
    DuplicateId(String),

    #[error("a batch is already open on this tree")]
    BatchActive,

    #[error("the root node cannot be removed")]
    RootRemoval,

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("invalid declarative tree: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;

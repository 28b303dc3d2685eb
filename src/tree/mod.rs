pub mod origin;
pub mod render;
pub mod topology;

pub use origin::{OriginBatch, OriginTree, TreeChange};
pub use render::{NodeClassifier, RenderTree};
pub use topology::{StructuralInfo, TopologyIndex};

use std::ops::ControlFlow;

use crate::document::NodeKey;
use crate::error::Result;

/// Read access shared by the origin tree and its render projection.
pub trait FlowTree {
    fn index(&self) -> &TopologyIndex<NodeKey>;

    fn root(&self) -> NodeKey {
        self.index().root()
    }

    fn contains(&self, key: NodeKey) -> bool {
        self.index().contains(key)
    }

    fn info(&self, key: NodeKey) -> Option<&StructuralInfo<NodeKey>> {
        self.index().info(key)
    }

    fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.index().parent(key)
    }

    fn prev(&self, key: NodeKey) -> Option<NodeKey> {
        self.index().prev(key)
    }

    fn next(&self, key: NodeKey) -> Option<NodeKey> {
        self.index().next(key)
    }

    fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.index().children(key)
    }

    fn traverse<F>(&self, start: NodeKey, visitor: F) -> ControlFlow<()>
    where
        F: FnMut(NodeKey, usize, usize) -> ControlFlow<()>,
        Self: Sized,
    {
        self.index().traverse(start, visitor)
    }
}

/// Structural edits. Only the origin tree accepts them.
pub trait StructureMut {
    fn add_child(&mut self, parent: NodeKey, child: NodeKey, index: Option<usize>) -> Result<()>;

    fn insert_after(&mut self, before: NodeKey, after: NodeKey) -> Result<()>;

    fn remove_parent(&mut self, node: NodeKey) -> Result<()>;

    fn remove(&mut self, node: NodeKey, with_children: bool) -> Result<Vec<NodeKey>>;

    fn move_children(&mut self, parent: NodeKey, nodes: &[NodeKey], index: usize) -> Result<()>;
}

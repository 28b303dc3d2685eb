use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Declarative node record, the unit of `from_json` / `to_json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildRecord>,
    #[serde(skip)]
    pub(crate) synthetic: bool,
}

/// A child entry: either a bare id or a fully typed nested record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChildRecord {
    Id(String),
    Node(NodeRecord),
}

impl NodeRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = NodeRecord>) -> Self {
        self.children = children.into_iter().map(ChildRecord::Node).collect();
        self
    }

    /// Record produced by a kind template rather than declared by the caller.
    pub fn synthetic(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            synthetic: true,
            ..Self::new(id).with_kind(kind)
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn kind_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.kind.as_deref().unwrap_or(default)
    }
}

impl ChildRecord {
    pub fn id(&self) -> &str {
        match self {
            ChildRecord::Id(id) => id,
            ChildRecord::Node(record) => &record.id,
        }
    }

    pub fn to_record(&self) -> NodeRecord {
        match self {
            ChildRecord::Id(id) => NodeRecord::new(id.clone()),
            ChildRecord::Node(record) => record.clone(),
        }
    }
}

impl From<NodeRecord> for ChildRecord {
    fn from(record: NodeRecord) -> Self {
        ChildRecord::Node(record)
    }
}

/// Parses a declared node list; strict JSON first, JSON5 as a fallback.
pub fn parse_records(input: &str) -> Result<Vec<NodeRecord>, serde_json::Error> {
    match serde_json::from_str::<Vec<NodeRecord>>(input) {
        Ok(records) => Ok(records),
        Err(err) => match json5::from_str::<Value>(input) {
            Ok(value) => serde_json::from_value(value),
            Err(_) => Err(err),
        },
    }
}

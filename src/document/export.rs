use std::ops::ControlFlow;

use super::{Document, NodeKey};
use crate::error::Result;
use crate::ir::{ChildRecord, NodeRecord};
use crate::tree::{FlowTree, TopologyIndex};

/// Which structure a listing walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeView {
    #[default]
    Origin,
    Render,
}

impl Document {
    /// Exports the origin tree as declared records. Synthetic nodes are
    /// flattened away; every record carries its kind.
    pub fn to_json(&self) -> Result<Vec<NodeRecord>> {
        self.ensure_live()?;
        Ok(self.export_children(self.root()))
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_json()?)?)
    }

    fn export_children(&self, key: NodeKey) -> Vec<NodeRecord> {
        let mut out = Vec::new();
        for child in self.origin.children(key) {
            let Some(node) = self.nodes.get(*child) else {
                continue;
            };
            if node.is_synthetic() {
                out.extend(self.export_children(*child));
            } else {
                out.push(self.export_node(*child));
            }
        }
        out
    }

    fn export_node(&self, key: NodeKey) -> NodeRecord {
        let Some(node) = self.nodes.get(key) else {
            return NodeRecord::default();
        };
        NodeRecord {
            id: node.id().to_string(),
            kind: Some(node.kind().to_string()),
            data: node.data.clone(),
            meta: node.meta.clone(),
            children: self
                .export_children(key)
                .into_iter()
                .map(ChildRecord::Node)
                .collect(),
            synthetic: false,
        }
    }

    /// Indented listing of the chosen tree:
    ///
    /// ```text
    /// root
    /// |-- start_0
    /// |-- split_0
    /// |---- $icon$split_0
    /// ```
    pub fn to_listing(&self, view: TreeView, show_kind: bool) -> Result<String> {
        self.ensure_live()?;
        let index: &TopologyIndex<NodeKey> = match view {
            TreeView::Origin => self.origin.index(),
            TreeView::Render => self.render.index(),
        };
        let mut lines = Vec::new();
        let _ = index.traverse(index.root(), |key, depth, _| {
            let Some(node) = self.nodes.get(key) else {
                return ControlFlow::Continue(());
            };
            let mut line = if depth == 0 {
                node.id().to_string()
            } else {
                format!("|{} {}", "--".repeat(depth), node.id())
            };
            if show_kind {
                line.push_str(&format!(" ({})", node.kind()));
            }
            lines.push(line);
            ControlFlow::Continue(())
        });
        Ok(lines.join("\n"))
    }
}

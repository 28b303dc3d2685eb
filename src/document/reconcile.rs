//! Declarative loading.
//!
//! The declared tree is walked top-down. Every record either reuses the live
//! node with the same id and kind, replaces a live node whose kind changed,
//! or creates a new one; it is then placed at its declared index and its
//! structural children (template output or declared children) are walked in
//! turn. Live nodes the walk never reached are disposed afterwards.

use std::collections::HashSet;
use std::rc::Rc;

use tracing::debug;

use super::{Document, FlowNode, NodeKey};
use crate::error::{FlowError, Result};
use crate::ir::{ChildRecord, NodeRecord};
use crate::kinds::builtin::DEFAULT_KIND;
use crate::kinds::{CreateContext, KindEntry};
use crate::layout::GeometryState;
use crate::tree::{FlowTree, StructureMut};

#[derive(Debug, Default)]
struct ReconcileStats {
    created: usize,
    reused: usize,
    replaced: usize,
    disposed: usize,
}

#[derive(Default)]
struct ReconcilePass {
    ids: HashSet<String>,
    visited: HashSet<NodeKey>,
    stats: ReconcileStats,
}

impl Document {
    pub(super) fn reconcile(&mut self, records: &[NodeRecord]) -> Result<()> {
        let root = self.root();
        let mut declared = HashSet::from([super::ROOT_ID.to_string()]);
        self.check_unique(records, &mut declared)?;

        let mut pass = ReconcilePass::default();
        pass.ids.insert(super::ROOT_ID.to_string());
        pass.visited.insert(root);
        for (index, record) in records.iter().enumerate() {
            self.reconcile_record(&mut pass, record.clone(), root, index)?;
        }

        let stale: Vec<NodeKey> = self
            .nodes
            .keys()
            .filter(|key| !pass.visited.contains(key))
            .collect();
        for key in stale {
            if self.nodes.contains(key) {
                pass.stats.disposed += self.dispose_subtree(key)?;
            }
        }
        debug!(
            created = pass.stats.created,
            reused = pass.stats.reused,
            replaced = pass.stats.replaced,
            disposed = pass.stats.disposed,
            "reconciled declared tree"
        );
        Ok(())
    }

    /// Creates `record` and its subtree at `index` under `parent`; every id
    /// in it must be new to the document.
    pub(super) fn insert_record(
        &mut self,
        record: NodeRecord,
        parent: NodeKey,
        index: usize,
    ) -> Result<NodeKey> {
        let mut declared = HashSet::new();
        self.check_unique(std::slice::from_ref(&record), &mut declared)?;
        if let Some(id) = declared.iter().find(|id| self.nodes.key_of(id).is_some()) {
            return Err(FlowError::DuplicateId(id.clone()));
        }
        let mut pass = ReconcilePass::default();
        self.reconcile_record(&mut pass, record, parent, index)
    }

    /// Fails on the first id that would be created twice, template ids
    /// included, before anything is mutated.
    fn check_unique(&self, records: &[NodeRecord], seen: &mut HashSet<String>) -> Result<()> {
        for record in records {
            if !seen.insert(record.id.clone()) {
                return Err(FlowError::DuplicateId(record.id.clone()));
            }
            let children = match self.registry.get(record.kind_or(DEFAULT_KIND)) {
                Some(entry) => self.structural_children(record, &entry),
                None => record.children.iter().map(ChildRecord::to_record).collect(),
            };
            self.check_unique(&children, seen)?;
        }
        Ok(())
    }

    fn reconcile_record(
        &mut self,
        pass: &mut ReconcilePass,
        record: NodeRecord,
        parent: NodeKey,
        index: usize,
    ) -> Result<NodeKey> {
        if !pass.ids.insert(record.id.clone()) {
            return Err(FlowError::DuplicateId(record.id));
        }
        let kind = record.kind_or(DEFAULT_KIND).to_string();
        let entry = self.resolve_kind(&kind)?;

        let live = self.nodes.key_of(&record.id);
        let key = match live {
            Some(key) if self.nodes.get(key).is_some_and(|node| node.kind() == kind) => {
                self.refresh_node(key, &record, entry.clone());
                pass.stats.reused += 1;
                key
            }
            Some(key) => {
                self.dispose_subtree(key)?;
                pass.stats.replaced += 1;
                self.create_node(&record, entry.clone())
            }
            None => {
                pass.stats.created += 1;
                self.create_node(&record, entry.clone())
            }
        };
        pass.visited.insert(key);
        self.origin.add_child(parent, key, Some(index))?;

        let children = self.structural_children(&record, &entry);
        for (idx, child) in children.into_iter().enumerate() {
            self.reconcile_record(pass, child, key, idx)?;
        }
        Ok(key)
    }

    fn structural_children(&self, record: &NodeRecord, entry: &KindEntry) -> Vec<NodeRecord> {
        let ctx = CreateContext {
            record,
            entry,
            registry: &self.registry,
        };
        entry
            .on_create
            .as_ref()
            .and_then(|hook| hook(&ctx))
            .unwrap_or_else(|| ctx.declared_children())
    }

    fn create_node(&mut self, record: &NodeRecord, entry: Rc<KindEntry>) -> NodeKey {
        let meta = &entry.meta;
        let size = meta.size.unwrap_or(self.config.spacing.default_node_size);
        let geometry = GeometryState::new(size, meta.origin);
        let collapsed = meta.default_collapsed();
        let mut node = FlowNode::new(record.id.clone(), entry, record.is_synthetic(), geometry);
        node.data = record.data.clone();
        node.meta = record.meta.clone();

        let key = self.nodes.insert(node);
        self.origin.register(key);
        if collapsed {
            self.render.collapse(key);
        }
        key
    }

    fn refresh_node(&mut self, key: NodeKey, record: &NodeRecord, entry: Rc<KindEntry>) {
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        let data_changed = node.data != record.data;
        if data_changed {
            node.data = record.data.clone();
            node.geometry.mark_dirty();
            self.geometry_version += 1;
        }
        node.meta = record.meta.clone();
        node.set_entry(entry);

        // Computed spacing reads the parent's data, so its children move too.
        if data_changed {
            for child in self.origin.children(key).to_vec() {
                if let Some(child) = self.nodes.get_mut(child) {
                    child.geometry.mark_dirty();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_ids_fail_before_touching_the_tree() {
        let mut doc = Document::new();
        doc.from_json(&[NodeRecord::new("a")]).unwrap();
        let version = doc.origin().version();
        let mut split = NodeRecord::new("s").with_kind("split");
        split.children = vec![ChildRecord::Id("b".into()), ChildRecord::Id("b".into())];
        let err = doc.from_json(&[split]).unwrap_err();
        assert!(matches!(err, FlowError::DuplicateId(id) if id == "b"));
        assert_eq!(doc.origin().version(), version);
        assert!(doc.node("a").is_some());
    }

    #[test]
    fn template_id_collisions_fail_before_touching_the_tree() {
        let mut doc = Document::new();
        let err = doc
            .from_json_str(
                r#"[{"id": "$icon$s", "kind": "start"}, {"id": "s", "kind": "split", "children": ["a"]}]"#,
            )
            .unwrap_err();
        assert!(matches!(err, FlowError::DuplicateId(id) if id == "$icon$s"));
        assert_eq!(doc.origin().version(), 0);
        assert_eq!(doc.node_count(), 1);
        assert_eq!(doc.to_listing(crate::TreeView::Origin, false).unwrap(), "root");

        doc.from_json_str(r#"[{"id": "s", "kind": "split"}]"#).unwrap();
        let err = doc
            .add_node(NodeRecord::new("$container$s"), None, None)
            .unwrap_err();
        assert!(matches!(err, FlowError::DuplicateId(_)));
        let split = NodeRecord::new("t")
            .with_kind("split")
            .with_children([NodeRecord::new("$icon$t")]);
        let err = doc.add_node(split, None, None).unwrap_err();
        assert!(matches!(err, FlowError::DuplicateId(id) if id == "$icon$t"));
        assert!(doc.node("t").is_none());
    }

    #[test]
    fn kind_change_replaces_the_node() {
        let mut doc = Document::new();
        doc.from_json(&[NodeRecord::new("n").with_kind("start")]).unwrap();
        let before = doc.key_of("n").unwrap();
        doc.from_json(&[NodeRecord::new("n").with_kind("end")]).unwrap();
        let after = doc.key_of("n").unwrap();
        assert_ne!(before, after);
        assert_eq!(doc.node("n").unwrap().kind(), "end");
        assert_eq!(doc.node_count(), 2);
    }

    #[test]
    fn template_children_are_kept_on_reload() {
        let mut doc = Document::new();
        let json = r#"[{"id": "s", "kind": "split", "children": ["a"]}]"#;
        doc.from_json_str(json).unwrap();
        let icon = doc.key_of("$icon$s").unwrap();
        doc.from_json_str(json).unwrap();
        assert_eq!(doc.key_of("$icon$s"), Some(icon));
        assert_eq!(doc.node_count(), 5);
        assert!(doc.node("$container$s").unwrap().is_synthetic());
    }

    #[test]
    fn unknown_kinds_become_stubs() {
        let mut doc = Document::new();
        doc.from_json(&[NodeRecord::new("x").with_kind("custom")]).unwrap();
        assert!(doc.node("x").unwrap().entry().stub);
        assert!(doc.add_node(NodeRecord::new("x"), None, None).is_err());
    }
}

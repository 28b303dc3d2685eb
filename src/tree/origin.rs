use std::ops::{Deref, DerefMut};

use super::topology::TopologyIndex;
use super::{FlowTree, StructureMut};
use crate::document::NodeKey;
use crate::error::{FlowError, Result};
use crate::notify::{Emitter, ListenerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeChange {
    pub version: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct BatchState {
    open: bool,
    pending: bool,
}

/// Canonical topology of a document. Every structural edit lands here.
pub struct OriginTree {
    index: TopologyIndex<NodeKey>,
    version: u64,
    batch: BatchState,
    listeners: Emitter<TreeChange>,
}

impl OriginTree {
    pub fn new(root: NodeKey) -> Self {
        Self {
            index: TopologyIndex::new(root),
            version: 0,
            batch: BatchState::default(),
            listeners: Emitter::new(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Indexes a freshly created node. It has no structure yet, so nothing fires.
    pub(crate) fn register(&mut self, key: NodeKey) {
        self.index.ensure(key);
    }

    pub fn on_change(&mut self, listener: impl FnMut(&TreeChange) + 'static) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    pub fn off_change(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub fn in_batch(&self) -> bool {
        self.batch.open
    }

    /// Opens a batch: notifications are held until the guard drops, then at
    /// most one fires for everything that changed in between.
    pub fn batch(&mut self) -> Result<OriginBatch<'_>> {
        if !self.begin_batch() {
            return Err(FlowError::BatchActive);
        }
        Ok(OriginBatch { tree: self })
    }

    /// Returns false when a batch was already open.
    pub(crate) fn begin_batch(&mut self) -> bool {
        if self.batch.open {
            return false;
        }
        self.batch = BatchState {
            open: true,
            pending: false,
        };
        true
    }

    pub(crate) fn end_batch(&mut self) {
        let pending = self.batch.pending;
        self.batch = BatchState::default();
        if pending {
            self.flush();
        }
    }

    pub(crate) fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    fn commit(&mut self, changed: bool) {
        if !changed {
            return;
        }
        self.version += 1;
        if self.batch.open {
            self.batch.pending = true;
        } else {
            self.flush();
        }
    }

    fn flush(&mut self) {
        let change = TreeChange {
            version: self.version,
        };
        self.listeners.emit(&change);
    }
}

impl FlowTree for OriginTree {
    fn index(&self) -> &TopologyIndex<NodeKey> {
        &self.index
    }
}

impl StructureMut for OriginTree {
    fn add_child(&mut self, parent: NodeKey, child: NodeKey, index: Option<usize>) -> Result<()> {
        let changed = self.index.add_child(parent, child, index)?;
        self.commit(changed);
        Ok(())
    }

    fn insert_after(&mut self, before: NodeKey, after: NodeKey) -> Result<()> {
        let changed = self.index.insert_after(before, after)?;
        self.commit(changed);
        Ok(())
    }

    fn remove_parent(&mut self, node: NodeKey) -> Result<()> {
        let changed = self.index.remove_parent(node)?;
        self.commit(changed);
        Ok(())
    }

    fn remove(&mut self, node: NodeKey, with_children: bool) -> Result<Vec<NodeKey>> {
        let removed = self.index.remove(node, with_children)?;
        self.commit(true);
        Ok(removed)
    }

    fn move_children(&mut self, parent: NodeKey, nodes: &[NodeKey], index: usize) -> Result<()> {
        let changed = self.index.move_children(parent, nodes, index)?;
        self.commit(changed);
        Ok(())
    }
}

/// Scoped batch over an [`OriginTree`]; dereferences to the tree.
pub struct OriginBatch<'a> {
    tree: &'a mut OriginTree,
}

impl Deref for OriginBatch<'_> {
    type Target = OriginTree;

    fn deref(&self) -> &OriginTree {
        self.tree
    }
}

impl DerefMut for OriginBatch<'_> {
    fn deref_mut(&mut self) -> &mut OriginTree {
        self.tree
    }
}

impl Drop for OriginBatch<'_> {
    fn drop(&mut self) {
        self.tree.end_batch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn keys(count: u32) -> Vec<NodeKey> {
        (0..count).map(|idx| NodeKey::new(idx, 0)).collect()
    }

    fn recorder(tree: &mut OriginTree) -> Rc<RefCell<Vec<u64>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        tree.on_change(move |change| sink.borrow_mut().push(change.version));
        seen
    }

    #[test]
    fn each_mutation_fires_once_and_bumps_version() {
        let k = keys(4);
        let mut tree = OriginTree::new(k[0]);
        let seen = recorder(&mut tree);
        tree.add_child(k[0], k[1], None).unwrap();
        tree.add_child(k[0], k[2], None).unwrap();
        tree.insert_after(k[1], k[3]).unwrap();
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
        assert_eq!(tree.children(k[0]), &[k[1], k[3], k[2]]);
    }

    #[test]
    fn no_op_mutations_stay_silent() {
        let k = keys(2);
        let mut tree = OriginTree::new(k[0]);
        tree.add_child(k[0], k[1], None).unwrap();
        let seen = recorder(&mut tree);
        tree.add_child(k[0], k[1], Some(0)).unwrap();
        tree.remove_parent(k[0]).unwrap();
        assert!(seen.borrow().is_empty());
        assert_eq!(tree.version(), 1);
    }

    #[test]
    fn batch_flushes_a_single_notification() {
        let k = keys(4);
        let mut tree = OriginTree::new(k[0]);
        let seen = recorder(&mut tree);
        {
            let mut batch = tree.batch().unwrap();
            batch.add_child(k[0], k[1], None).unwrap();
            batch.add_child(k[0], k[2], None).unwrap();
            batch.add_child(k[1], k[3], None).unwrap();
            assert!(seen.borrow().is_empty());
            assert!(matches!(batch.batch(), Err(FlowError::BatchActive)));
        }
        assert_eq!(*seen.borrow(), vec![3]);
        assert!(!tree.in_batch());
    }

    #[test]
    fn empty_batch_fires_nothing() {
        let k = keys(1);
        let mut tree = OriginTree::new(k[0]);
        let seen = recorder(&mut tree);
        drop(tree.batch().unwrap());
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn topology_errors_surface_through_flow_error() {
        let k = keys(3);
        let mut tree = OriginTree::new(k[0]);
        tree.add_child(k[0], k[1], None).unwrap();
        let err = tree.add_child(k[1], k[0], None).unwrap_err();
        assert!(matches!(err, FlowError::Topology(_)));
        let err = tree.remove(k[2], true).unwrap_err();
        assert!(err.to_string().contains("not part of the tree"));
    }
}

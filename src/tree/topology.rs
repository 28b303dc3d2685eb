//! Identity-keyed structural index shared by the origin and render trees.
//!
//! Every entry records the parent, the neighbouring siblings and the ordered
//! children of one node. Mutators keep the children lists and the prev/next
//! chain consistent: after any call the order of `children` equals the order
//! obtained by walking `next` from the first child.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::ops::ControlFlow;

use crate::error::TopologyError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralInfo<K> {
    pub parent: Option<K>,
    pub prev: Option<K>,
    pub next: Option<K>,
    pub children: Vec<K>,
}

impl<K> Default for StructuralInfo<K> {
    fn default() -> Self {
        Self {
            parent: None,
            prev: None,
            next: None,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopologyIndex<K> {
    root: K,
    entries: HashMap<K, StructuralInfo<K>>,
}

impl<K> TopologyIndex<K>
where
    K: Copy + Eq + Hash + Display,
{
    pub fn new(root: K) -> Self {
        let mut entries = HashMap::new();
        entries.insert(root, StructuralInfo::default());
        Self { root, entries }
    }

    pub fn root(&self) -> K {
        self.root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: K) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.entries.keys().copied()
    }

    pub fn info(&self, key: K) -> Option<&StructuralInfo<K>> {
        self.entries.get(&key)
    }

    pub(crate) fn info_mut(&mut self, key: K) -> Option<&mut StructuralInfo<K>> {
        self.entries.get_mut(&key)
    }

    pub fn parent(&self, key: K) -> Option<K> {
        self.entries.get(&key)?.parent
    }

    pub fn prev(&self, key: K) -> Option<K> {
        self.entries.get(&key)?.prev
    }

    pub fn next(&self, key: K) -> Option<K> {
        self.entries.get(&key)?.next
    }

    pub fn children(&self, key: K) -> &[K] {
        self.entries
            .get(&key)
            .map(|info| info.children.as_slice())
            .unwrap_or(&[])
    }

    /// Registers `key` with an empty entry if it is not indexed yet.
    pub fn ensure(&mut self, key: K) {
        self.entries.entry(key).or_default();
    }

    /// Returns true when `ancestor` is a strict ancestor of `node`.
    pub fn is_ancestor(&self, ancestor: K, node: K) -> bool {
        let mut current = self.parent(node);
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            current = self.parent(key);
        }
        false
    }

    pub fn add_child(
        &mut self,
        parent: K,
        child: K,
        index: Option<usize>,
    ) -> Result<bool, TopologyError> {
        self.require(parent)?;
        self.check_cycle(parent, child)?;

        let siblings = self.children(parent);
        if self.parent(child) == Some(parent) {
            let last = siblings.len() - 1;
            let current = siblings.iter().position(|key| *key == child);
            let target = index.unwrap_or(last).min(last);
            if current == Some(target) {
                return Ok(false);
            }
        }

        self.detach(child);
        self.ensure(child);
        if let Some(info) = self.entries.get_mut(&parent) {
            let at = index.unwrap_or(info.children.len()).min(info.children.len());
            info.children.insert(at, child);
        }
        self.relink(parent);
        Ok(true)
    }

    pub fn insert_after(&mut self, before: K, after: K) -> Result<bool, TopologyError> {
        self.require(before)?;
        let parent = self
            .parent(before)
            .ok_or_else(|| TopologyError::Detached(before.to_string()))?;
        if before == after || self.next(before) == Some(after) {
            return Ok(false);
        }
        self.check_cycle(parent, after)?;

        self.detach(after);
        self.ensure(after);
        if let Some(info) = self.entries.get_mut(&parent) {
            let at = info
                .children
                .iter()
                .position(|key| *key == before)
                .map(|idx| idx + 1)
                .unwrap_or(info.children.len());
            info.children.insert(at, after);
        }
        self.relink(parent);
        Ok(true)
    }

    pub fn remove_parent(&mut self, node: K) -> Result<bool, TopologyError> {
        self.require(node)?;
        Ok(self.detach(node).is_some())
    }

    /// Removes `node` from the index and returns every key that left it.
    ///
    /// With `with_children` the whole subtree is purged (pre-order); without
    /// it the direct children stay indexed as parentless orphans.
    pub fn remove(&mut self, node: K, with_children: bool) -> Result<Vec<K>, TopologyError> {
        self.require(node)?;
        self.detach(node);

        let mut removed = vec![node];
        if with_children {
            removed.extend(self.descendants(node));
        } else {
            let orphans = self.children(node).to_vec();
            for orphan in orphans {
                if let Some(info) = self.entries.get_mut(&orphan) {
                    info.parent = None;
                    info.prev = None;
                    info.next = None;
                }
            }
        }
        for key in &removed {
            self.entries.remove(key);
        }
        Ok(removed)
    }

    /// Moves `nodes` under `parent` starting at `index`, keeping their order.
    /// A key listed more than once is moved at its first occurrence.
    pub fn move_children(
        &mut self,
        parent: K,
        nodes: &[K],
        index: usize,
    ) -> Result<bool, TopologyError> {
        self.require(parent)?;
        let mut unique: Vec<K> = Vec::with_capacity(nodes.len());
        for node in nodes {
            if !unique.contains(node) {
                unique.push(*node);
            }
        }
        let nodes = unique.as_slice();
        for node in nodes {
            self.require(*node)?;
            self.check_cycle(parent, *node)?;
        }
        let before = self.children(parent).to_vec();

        let mut affected = Vec::new();
        for node in nodes {
            if let Some(former) = self.detach_quiet(*node)
                && former != parent
                && !affected.contains(&former)
            {
                affected.push(former);
            }
        }
        if let Some(info) = self.entries.get_mut(&parent) {
            let at = index.min(info.children.len());
            for (offset, node) in nodes.iter().enumerate() {
                info.children.insert(at + offset, *node);
            }
        }
        for former in affected {
            self.relink(former);
        }
        self.relink(parent);
        Ok(self.children(parent) != before.as_slice())
    }

    /// Pre-order walk starting at `start`; the visitor gets the node, its
    /// depth relative to `start` and its index among its siblings.
    pub fn traverse<F>(&self, start: K, mut visitor: F) -> ControlFlow<()>
    where
        F: FnMut(K, usize, usize) -> ControlFlow<()>,
    {
        let mut stack = vec![(start, 0usize, 0usize)];
        while let Some((key, depth, index)) = stack.pop() {
            visitor(key, depth, index)?;
            let children = self.children(key);
            for (idx, child) in children.iter().enumerate().rev() {
                stack.push((*child, depth + 1, idx));
            }
        }
        ControlFlow::Continue(())
    }

    /// Every descendant of `node` in pre-order, `node` excluded.
    pub fn descendants(&self, node: K) -> Vec<K> {
        let mut out = Vec::new();
        let _ = self.traverse(node, |key, depth, _| {
            if depth > 0 {
                out.push(key);
            }
            ControlFlow::Continue(())
        });
        out
    }

    /// Children of `parent` recovered by following `next` from the first child.
    pub fn sibling_chain(&self, parent: K) -> Vec<K> {
        let mut out = Vec::new();
        let mut current = self.children(parent).first().copied();
        while let Some(key) = current {
            out.push(key);
            current = self.next(key);
        }
        out
    }

    fn require(&self, key: K) -> Result<(), TopologyError> {
        if self.contains(key) {
            Ok(())
        } else {
            Err(TopologyError::MissingNode(key.to_string()))
        }
    }

    fn check_cycle(&self, parent: K, node: K) -> Result<(), TopologyError> {
        if node == parent || self.is_ancestor(node, parent) {
            return Err(TopologyError::WouldCycle {
                node: node.to_string(),
                parent: parent.to_string(),
            });
        }
        Ok(())
    }

    fn detach(&mut self, node: K) -> Option<K> {
        let former = self.detach_quiet(node)?;
        self.relink(former);
        Some(former)
    }

    fn detach_quiet(&mut self, node: K) -> Option<K> {
        let parent = self.entries.get(&node)?.parent?;
        if let Some(info) = self.entries.get_mut(&parent) {
            info.children.retain(|key| *key != node);
        }
        if let Some(info) = self.entries.get_mut(&node) {
            info.parent = None;
            info.prev = None;
            info.next = None;
        }
        Some(parent)
    }

    fn relink(&mut self, parent: K) {
        let Some(children) = self.entries.get(&parent).map(|info| info.children.clone()) else {
            return;
        };
        for (idx, child) in children.iter().enumerate() {
            let info = self.entries.entry(*child).or_default();
            info.parent = Some(parent);
            info.prev = idx.checked_sub(1).map(|p| children[p]);
            info.next = children.get(idx + 1).copied();
        }
    }
}

//! Read-only display projection of the origin tree.
//!
//! The projection is a clone of the origin index with two rewrites applied on
//! top: optional branch refinement, which straightens splits whose branches
//! all end in a terminal node except one, and collapse hiding, which reduces a
//! collapsed node to its marker child. Neither rewrite touches the origin, so
//! expanding a node restores the exact previous structure.
//!
//! Branch refinement is a visual heuristic. Empty branches count as alive, a
//! split without following siblings is left untouched, and a split whose
//! branch container cannot be found is skipped. Refinement never moves
//! followers under a collapsed split, container or surviving branch.

use std::collections::HashSet;

use tracing::debug;

use super::origin::OriginTree;
use super::topology::TopologyIndex;
use super::{FlowTree, StructureMut};
use crate::document::NodeKey;
use crate::error::{FlowError, Result};

/// Kind facts the projection needs about individual nodes.
pub trait NodeClassifier {
    /// Reserved child kept visible while its parent is collapsed.
    fn is_marker(&self, key: NodeKey) -> bool;

    fn is_split(&self, key: NodeKey) -> bool;

    /// The synthetic child of a split that holds its branches.
    fn is_branch_container(&self, key: NodeKey) -> bool;

    fn is_terminal(&self, key: NodeKey) -> bool;
}

pub struct RenderTree {
    index: TopologyIndex<NodeKey>,
    collapsed: HashSet<NodeKey>,
    refine_branches: bool,
    version: u64,
    origin_version: Option<u64>,
    stale: bool,
}

impl RenderTree {
    pub fn new(root: NodeKey) -> Self {
        Self {
            index: TopologyIndex::new(root),
            collapsed: HashSet::new(),
            refine_branches: false,
            version: 0,
            origin_version: None,
            stale: true,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn refines_branches(&self) -> bool {
        self.refine_branches
    }

    pub fn set_refine_branches(&mut self, enabled: bool) {
        if self.refine_branches != enabled {
            self.refine_branches = enabled;
            self.stale = true;
        }
    }

    pub fn needs_update(&self, origin_version: u64) -> bool {
        self.stale || self.origin_version != Some(origin_version)
    }

    pub fn is_collapsed(&self, key: NodeKey) -> bool {
        self.collapsed.contains(&key)
    }

    pub fn collapsed(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.collapsed.iter().copied()
    }

    pub fn collapse(&mut self, key: NodeKey) -> bool {
        let changed = self.collapsed.insert(key);
        self.stale |= changed;
        changed
    }

    pub fn expand(&mut self, key: NodeKey) -> bool {
        let changed = self.collapsed.remove(&key);
        self.stale |= changed;
        changed
    }

    /// Drops the collapse entry of a disposed node.
    pub(crate) fn forget(&mut self, key: NodeKey) {
        self.collapsed.remove(&key);
    }

    pub fn update_render_struct(&mut self, origin: &OriginTree, classifier: &impl NodeClassifier) {
        self.index = origin.index().clone();
        if self.refine_branches {
            self.refine(classifier);
        }
        self.hide_collapsed(classifier);
        self.version += 1;
        self.origin_version = Some(origin.version());
        self.stale = false;
        debug!(
            version = self.version,
            origin_version = origin.version(),
            nodes = self.index.len(),
            "render tree rebuilt"
        );
    }

    fn hide_collapsed(&mut self, classifier: &impl NodeClassifier) {
        let collapsed: Vec<NodeKey> = self.collapsed.iter().copied().collect();
        for key in collapsed {
            let Some(info) = self.index.info(key) else {
                self.collapsed.remove(&key);
                continue;
            };
            let marker = info
                .children
                .iter()
                .copied()
                .find(|child| classifier.is_marker(*child));
            if let Some(info) = self.index.info_mut(key) {
                info.children = marker.into_iter().collect();
            }
            if let Some(marker) = marker
                && let Some(info) = self.index.info_mut(marker)
            {
                info.prev = None;
                info.next = None;
            }
        }
    }

    fn refine(&mut self, classifier: &impl NodeClassifier) {
        self.refine_from(self.index.root(), classifier);
    }

    // Children are re-read on every step: refining a split truncates the
    // list it belongs to and grows one of its branches.
    fn refine_from(&mut self, key: NodeKey, classifier: &impl NodeClassifier) {
        if classifier.is_split(key) {
            self.refine_split(key, classifier);
        }
        let mut idx = 0;
        while let Some(child) = self.index.children(key).get(idx).copied() {
            self.refine_from(child, classifier);
            idx += 1;
        }
    }

    fn refine_split(&mut self, split: NodeKey, classifier: &impl NodeClassifier) {
        let Some(parent) = self.index.parent(split) else {
            return;
        };
        if self.index.next(split).is_none() || self.collapsed.contains(&split) {
            return;
        }
        let Some(container) = self.branch_container(split, classifier) else {
            return;
        };
        if self.collapsed.contains(&container) {
            return;
        }
        let branches = self.index.children(container);
        if branches.len() < 2 {
            return;
        }
        let alive: Vec<NodeKey> = branches
            .iter()
            .copied()
            .filter(|branch| !self.is_dead_branch(*branch, classifier))
            .collect();
        let [survivor] = alive.as_slice() else {
            return;
        };
        let survivor = *survivor;
        // Spliced followers must stay visible.
        if self.collapsed.contains(&survivor) {
            return;
        }

        let siblings = self.index.children(parent);
        let Some(at) = siblings.iter().position(|key| *key == split) else {
            return;
        };
        let moved = siblings[at + 1..].to_vec();
        let end = self.index.children(survivor).len();
        // Moved siblings are never ancestors of the surviving branch.
        if self.index.move_children(survivor, &moved, end).is_ok() {
            debug!(moved = moved.len(), "refined split into its surviving branch");
        }
    }

    fn branch_container(&self, split: NodeKey, classifier: &impl NodeClassifier) -> Option<NodeKey> {
        self.index
            .children(split)
            .iter()
            .copied()
            .find(|child| classifier.is_branch_container(*child))
    }

    fn is_dead_branch(&self, branch: NodeKey, classifier: &impl NodeClassifier) -> bool {
        let Some(last) = self.index.children(branch).last().copied() else {
            return false;
        };
        if classifier.is_terminal(last) {
            return true;
        }
        classifier.is_split(last) && self.all_branches_dead(last, classifier)
    }

    fn all_branches_dead(&self, split: NodeKey, classifier: &impl NodeClassifier) -> bool {
        let Some(container) = self.branch_container(split, classifier) else {
            return false;
        };
        let branches = self.index.children(container);
        !branches.is_empty()
            && branches
                .iter()
                .all(|branch| self.is_dead_branch(*branch, classifier))
    }
}

impl FlowTree for RenderTree {
    fn index(&self) -> &TopologyIndex<NodeKey> {
        &self.index
    }
}

impl StructureMut for RenderTree {
    fn add_child(&mut self, _parent: NodeKey, _child: NodeKey, _index: Option<usize>) -> Result<()> {
        Err(FlowError::ReadOnlyProjection)
    }

    fn insert_after(&mut self, _before: NodeKey, _after: NodeKey) -> Result<()> {
        Err(FlowError::ReadOnlyProjection)
    }

    fn remove_parent(&mut self, _node: NodeKey) -> Result<()> {
        Err(FlowError::ReadOnlyProjection)
    }

    fn remove(&mut self, _node: NodeKey, _with_children: bool) -> Result<Vec<NodeKey>> {
        Err(FlowError::ReadOnlyProjection)
    }

    fn move_children(&mut self, _parent: NodeKey, _nodes: &[NodeKey], _index: usize) -> Result<()> {
        Err(FlowError::ReadOnlyProjection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Clone, Copy, PartialEq)]
    enum Role {
        Plain,
        Marker,
        Split,
        Branches,
        Terminal,
    }

    struct Roles(HashMap<NodeKey, Role>);

    impl Roles {
        fn role(&self, key: NodeKey) -> Role {
            self.0.get(&key).copied().unwrap_or(Role::Plain)
        }
    }

    impl NodeClassifier for Roles {
        fn is_marker(&self, key: NodeKey) -> bool {
            self.role(key) == Role::Marker
        }
        fn is_split(&self, key: NodeKey) -> bool {
            self.role(key) == Role::Split
        }
        fn is_branch_container(&self, key: NodeKey) -> bool {
            self.role(key) == Role::Branches
        }
        fn is_terminal(&self, key: NodeKey) -> bool {
            self.role(key) == Role::Terminal
        }
    }

    fn k(idx: u32) -> NodeKey {
        NodeKey::new(idx, 0)
    }

    // root(0): start(1), split(2){icon(3), branches(4){b5{end 7}, b6{}}}, after(8), end(9)
    fn fixture() -> (OriginTree, Roles) {
        let mut origin = OriginTree::new(k(0));
        for (parent, child) in [(0, 1), (0, 2), (2, 3), (2, 4), (4, 5), (4, 6), (5, 7), (0, 8), (0, 9)] {
            origin.add_child(k(parent), k(child), None).unwrap();
        }
        let roles = Roles(HashMap::from([
            (k(2), Role::Split),
            (k(3), Role::Marker),
            (k(4), Role::Branches),
            (k(7), Role::Terminal),
            (k(9), Role::Terminal),
        ]));
        (origin, roles)
    }

    #[test]
    fn mirrors_origin_without_rewrites() {
        let (origin, roles) = fixture();
        let mut render = RenderTree::new(k(0));
        assert!(render.needs_update(origin.version()));
        render.update_render_struct(&origin, &roles);
        assert!(!render.needs_update(origin.version()));
        assert_eq!(render.children(k(0)), origin.children(k(0)));
        assert_eq!(render.version(), 1);
    }

    #[test]
    fn collapse_keeps_only_the_marker() {
        let (origin, roles) = fixture();
        let mut render = RenderTree::new(k(0));
        render.update_render_struct(&origin, &roles);
        assert!(render.collapse(k(2)));
        assert!(render.needs_update(origin.version()));
        render.update_render_struct(&origin, &roles);
        assert_eq!(render.children(k(2)), &[k(3)]);
        assert_eq!(render.next(k(3)), None);
        assert_eq!(origin.children(k(2)), &[k(3), k(4)]);

        render.collapse(k(5));
        render.update_render_struct(&origin, &roles);
        assert!(render.children(k(5)).is_empty());

        render.expand(k(2));
        render.update_render_struct(&origin, &roles);
        assert_eq!(render.children(k(2)), &[k(3), k(4)]);
    }

    #[test]
    fn forgets_collapse_entries_of_missing_nodes() {
        let (mut origin, roles) = fixture();
        let mut render = RenderTree::new(k(0));
        render.collapse(k(5));
        origin.remove(k(5), true).unwrap();
        render.update_render_struct(&origin, &roles);
        assert!(!render.is_collapsed(k(5)));
    }

    #[test]
    fn refinement_moves_followers_into_surviving_branch() {
        let (origin, roles) = fixture();
        let mut render = RenderTree::new(k(0));
        render.set_refine_branches(true);
        render.update_render_struct(&origin, &roles);
        assert_eq!(render.children(k(0)), &[k(1), k(2)]);
        assert_eq!(render.children(k(6)), &[k(8), k(9)]);
        assert_eq!(render.parent(k(8)), Some(k(6)));
        assert_eq!(render.next(k(2)), None);
        assert_eq!(origin.children(k(0)), &[k(1), k(2), k(8), k(9)]);
    }

    #[test]
    fn refinement_leaves_collapsed_splits_alone() {
        let (origin, roles) = fixture();
        let mut render = RenderTree::new(k(0));
        render.set_refine_branches(true);
        render.collapse(k(2));
        render.update_render_struct(&origin, &roles);
        assert_eq!(render.children(k(0)), &[k(1), k(2), k(8), k(9)]);
        assert_eq!(render.children(k(2)), &[k(3)]);

        render.expand(k(2));
        render.collapse(k(6));
        render.update_render_struct(&origin, &roles);
        assert_eq!(render.children(k(0)), &[k(1), k(2), k(8), k(9)]);
        assert!(render.children(k(6)).is_empty());
    }

    #[test]
    fn refinement_skips_splits_with_several_live_branches() {
        let (mut origin, roles) = fixture();
        origin.remove(k(7), true).unwrap();
        let mut render = RenderTree::new(k(0));
        render.set_refine_branches(true);
        render.update_render_struct(&origin, &roles);
        assert_eq!(render.children(k(0)), &[k(1), k(2), k(8), k(9)]);
    }

    #[test]
    fn structural_edits_are_rejected() {
        let (origin, roles) = fixture();
        let mut render = RenderTree::new(k(0));
        render.update_render_struct(&origin, &roles);
        assert!(matches!(
            render.add_child(k(0), k(1), None),
            Err(FlowError::ReadOnlyProjection)
        ));
        assert!(matches!(
            render.remove(k(1), true),
            Err(FlowError::ReadOnlyProjection)
        ));
        assert!(matches!(
            render.move_children(k(0), &[k(1)], 0),
            Err(FlowError::ReadOnlyProjection)
        ));
    }
}

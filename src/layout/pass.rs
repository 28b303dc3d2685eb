//! The incremental layout pass and the world-space geometry reads built on
//! top of its results.
//!
//! A pass visits the render tree children-first. Once every child of a node
//! has settled, the node's extent only depends on those children, and its
//! position only depends on its own extent and on the bounds of the previous
//! visible sibling, which was settled earlier in the same walk. A node is
//! skipped when it is clean, its structural signature is unchanged and its
//! previous sibling did not move in this pass.

use tracing::{debug, trace};

use super::geometry::{CacheValue, GlobalSlot, LocalSlot, Signature};
use super::strategy::LayoutStrategy;
use super::types::{Point, Rect, Size};
use crate::config::SpacingConfig;
use crate::document::{FlowNode, NodeArena, NodeKey};
use crate::kinds::MetaNumber;
use crate::tree::{FlowTree, RenderTree};

pub(crate) fn visible_children(tree: &RenderTree, nodes: &NodeArena, key: NodeKey) -> Vec<NodeKey> {
    tree.children(key)
        .iter()
        .copied()
        .filter(|child| nodes.get(*child).is_some_and(|node| !node.is_hidden()))
        .collect()
}

fn resolve(value: Option<&MetaNumber>, node: &FlowNode, default: f32) -> f32 {
    value
        .map(|number| number.resolve(&node.view()))
        .unwrap_or(default)
}

/// Spacing facts a parent imposes on its children.
#[derive(Debug, Clone, Copy)]
struct Placement {
    inline: bool,
    spacing: f32,
    spacing_pre: f32,
    gap: f32,
}

impl Placement {
    fn of(parent: &FlowNode, defaults: &SpacingConfig) -> Self {
        let meta = &parent.entry().meta;
        Self {
            inline: meta.is_inline_blocks(),
            spacing: resolve(meta.spacing.as_ref(), parent, defaults.node_spacing),
            spacing_pre: resolve(
                meta.inline_spacing_pre.as_ref(),
                parent,
                defaults.inline_spacing_pre,
            ),
            gap: resolve(
                meta.min_inline_block_spacing.as_ref(),
                parent,
                defaults.min_inline_block_spacing,
            ),
        }
    }
}

/// Extent and children offset of a container, from its children's settled
/// local bounds.
pub(crate) fn container_extent<S: LayoutStrategy + ?Sized>(
    strategy: &S,
    nodes: &NodeArena,
    node: &FlowNode,
    children: &[NodeKey],
    defaults: &SpacingConfig,
) -> (Rect, Point) {
    let meta = &node.entry().meta;
    let row = children
        .iter()
        .filter_map(|child| nodes.get(*child)?.geometry.local_bounds)
        .reduce(|acc, bounds| acc.union(&bounds));
    let inline = meta.is_inline_blocks();
    let offset = match row {
        Some(row) if inline => strategy.children_offset(row),
        _ => Point::ZERO,
    };
    let mut extent = Rect::point(Point::ZERO);
    if let Some(row) = row {
        extent = extent.union(&row.translate(offset));
    }
    extent = extent.expand(meta.padding());
    if inline {
        let after = resolve(
            meta.inline_spacing_after.as_ref(),
            node,
            defaults.inline_spacing_after,
        );
        extent = strategy.extend_main(extent, after);
    }
    (extent, offset)
}

fn leaf_extent<S: LayoutStrategy + ?Sized>(strategy: &S, node: &FlowNode) -> Rect {
    let state = &node.geometry;
    Rect::anchored(
        state.size,
        state.origin.unwrap_or_else(|| strategy.default_origin()),
    )
}

pub struct LayoutPass<'a> {
    tree: &'a RenderTree,
    nodes: &'a mut NodeArena,
    spacing: &'a SpacingConfig,
    epoch: u64,
    recomputed: usize,
}

impl<'a> LayoutPass<'a> {
    pub(crate) fn new(
        tree: &'a RenderTree,
        nodes: &'a mut NodeArena,
        spacing: &'a SpacingConfig,
        epoch: u64,
    ) -> Self {
        Self {
            tree,
            nodes,
            spacing,
            epoch,
            recomputed: 0,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Nodes whose geometry was recomputed so far in this pass.
    pub fn recomputed(&self) -> usize {
        self.recomputed
    }

    pub fn run<S: LayoutStrategy + ?Sized>(&mut self, strategy: &S) {
        let root = self.tree.root();
        self.visit(strategy, root, None, 0);
        debug!(
            epoch = self.epoch,
            recomputed = self.recomputed,
            "layout pass finished"
        );
    }

    /// Lays out `key` and its subtree; returns whether its local bounds moved.
    fn visit<S: LayoutStrategy + ?Sized>(
        &mut self,
        strategy: &S,
        key: NodeKey,
        prev: Option<NodeKey>,
        index: usize,
    ) -> bool {
        let children = visible_children(self.tree, self.nodes, key);
        let mut child_changed = false;
        let mut prev_child = None;
        for (idx, child) in children.iter().enumerate() {
            child_changed |= self.visit(strategy, *child, prev_child, idx);
            prev_child = Some(*child);
        }

        let signature = Signature {
            parent: self.tree.parent(key),
            prev,
            index,
            child_count: children.len(),
            collapsed: self.tree.is_collapsed(key),
        };
        let prev_state = prev.and_then(|prev| self.nodes.get(prev)).map(|node| &node.geometry);
        let prev_moved = prev_state.is_some_and(|state| state.changed_epoch == self.epoch);
        let prev_bounds = prev_state.and_then(|state| state.local_bounds);

        let epoch = self.epoch;
        {
            let Some(node) = self.nodes.get_mut(key) else {
                return false;
            };
            let state = &mut node.geometry;
            state.visited_epoch = epoch;
            if state.signature != Some(signature) || child_changed {
                state.mark_dirty();
            }
            if !state.local_dirty && !prev_moved && state.local_bounds.is_some() {
                return false;
            }
        }
        self.update_node(strategy, key, &children, signature, prev_bounds)
    }

    fn update_node<S: LayoutStrategy + ?Sized>(
        &mut self,
        strategy: &S,
        key: NodeKey,
        children: &[NodeKey],
        signature: Signature,
        prev_bounds: Option<Rect>,
    ) -> bool {
        let nodes: &NodeArena = self.nodes;
        let Some(node) = nodes.get(key) else {
            return false;
        };
        let state = &node.geometry;

        let extent = match state.local(LocalSlot::Extent).and_then(CacheValue::rect) {
            Some(extent) => extent,
            None if node.is_container() => {
                let (extent, offset) = container_extent(strategy, nodes, node, children, self.spacing);
                state.store_local(LocalSlot::ChildrenOffset, CacheValue::Point(offset));
                state.store_local(LocalSlot::Extent, CacheValue::Rect(extent));
                extent
            }
            None => {
                let extent = leaf_extent(strategy, node);
                state.store_local(LocalSlot::Extent, CacheValue::Rect(extent));
                extent
            }
        };

        let position = match signature.parent.and_then(|parent| nodes.get(parent)) {
            Some(parent) => {
                let placement = Placement::of(parent, self.spacing);
                if placement.inline {
                    strategy.inline_position(prev_bounds, extent, placement.spacing_pre, placement.gap)
                } else {
                    strategy.stacked_position(prev_bounds, extent, placement.spacing)
                }
            }
            None => Point::ZERO,
        };
        let bounds = extent.translate(position);
        trace!(id = node.id(), ?bounds, "recomputed geometry");

        let epoch = self.epoch;
        self.recomputed += 1;
        let Some(node) = self.nodes.get_mut(key) else {
            return false;
        };
        let state = &mut node.geometry;
        let changed = state.local_bounds != Some(bounds);
        state.position = position;
        state.local_bounds = Some(bounds);
        state.signature = Some(signature);
        state.local_dirty = false;
        if changed {
            state.changed_epoch = epoch;
        }
        changed
    }
}

/// World-space reads over the result of the last pass. Global values are
/// memoised per pass epoch.
pub struct GeometryReader<'a> {
    pub(crate) tree: &'a RenderTree,
    pub(crate) nodes: &'a NodeArena,
    pub(crate) strategy: &'a dyn LayoutStrategy,
    pub(crate) spacing: &'a SpacingConfig,
    pub(crate) epoch: u64,
}

impl GeometryReader<'_> {
    /// Only nodes reached by the last pass have geometry.
    fn laid_out(&self, key: NodeKey) -> Option<&FlowNode> {
        let node = self.nodes.get(key)?;
        (self.epoch > 0 && node.geometry.visited_epoch == self.epoch).then_some(node)
    }

    pub fn position(&self, key: NodeKey) -> Option<Point> {
        Some(self.laid_out(key)?.geometry.position)
    }

    pub fn local_bounds(&self, key: NodeKey) -> Option<Rect> {
        self.laid_out(key)?.geometry.local_bounds
    }

    /// Stored size for leaves; containers derive it from their children on
    /// every call.
    pub fn size(&self, key: NodeKey) -> Option<Size> {
        let node = self.laid_out(key)?;
        if !node.is_container() {
            return Some(node.geometry.size);
        }
        let children = visible_children(self.tree, self.nodes, key);
        let (extent, _) = container_extent(self.strategy, self.nodes, node, &children, self.spacing);
        Some(extent.size())
    }

    fn children_offset(&self, key: NodeKey, node: &FlowNode) -> Point {
        if let Some(offset) = node
            .geometry
            .local(LocalSlot::ChildrenOffset)
            .and_then(CacheValue::point)
        {
            return offset;
        }
        if !node.is_container() {
            return Point::ZERO;
        }
        let children = visible_children(self.tree, self.nodes, key);
        container_extent(self.strategy, self.nodes, node, &children, self.spacing).1
    }

    /// Origin of the node's own frame in world space.
    pub fn world_origin(&self, key: NodeKey) -> Option<Point> {
        let node = self.laid_out(key)?;
        let state = &node.geometry;
        if let Some(origin) = state
            .global(GlobalSlot::WorldOrigin, self.epoch)
            .and_then(CacheValue::point)
        {
            return Some(origin);
        }
        let frame = match self.tree.parent(key) {
            Some(parent) => {
                let parent_node = self.laid_out(parent)?;
                self.world_origin(parent)? + self.children_offset(parent, parent_node)
            }
            None => Point::ZERO,
        };
        let origin = frame + state.position;
        state.store_global(GlobalSlot::WorldOrigin, self.epoch, CacheValue::Point(origin));
        Some(origin)
    }

    pub fn bounds(&self, key: NodeKey) -> Option<Rect> {
        let node = self.laid_out(key)?;
        let state = &node.geometry;
        if let Some(bounds) = state
            .global(GlobalSlot::Bounds, self.epoch)
            .and_then(CacheValue::rect)
        {
            return Some(bounds);
        }
        let local = state.local_bounds?;
        let frame = self.world_origin(key)? - state.position;
        let bounds = local.translate(frame);
        state.store_global(GlobalSlot::Bounds, self.epoch, CacheValue::Rect(bounds));
        Some(bounds)
    }

    pub fn input_point(&self, key: NodeKey) -> Option<Point> {
        self.anchor(key, GlobalSlot::InputPoint)
    }

    pub fn output_point(&self, key: NodeKey) -> Option<Point> {
        self.anchor(key, GlobalSlot::OutputPoint)
    }

    fn anchor(&self, key: NodeKey, slot: GlobalSlot) -> Option<Point> {
        let node = self.laid_out(key)?;
        if let Some(point) = node
            .geometry
            .global(slot, self.epoch)
            .and_then(CacheValue::point)
        {
            return Some(point);
        }
        let bounds = self.bounds(key)?;
        let point = match slot {
            GlobalSlot::OutputPoint => self.strategy.output_point(bounds),
            _ => self.strategy.input_point(bounds),
        };
        node.geometry
            .store_global(slot, self.epoch, CacheValue::Point(point));
        Some(point)
    }
}

//! The document: node arena, origin tree, render projection and layout
//! engine behind one editing surface.

mod arena;
mod export;
mod reconcile;

pub use arena::{FlowNode, NodeArena, NodeKey};
pub use export::TreeView;

use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use tracing::{trace, warn};

use crate::config::FlowConfig;
use crate::error::{FlowError, Result, TopologyError};
use crate::ir::{NodeRecord, parse_records};
use crate::kinds::builtin::{ROOT, SPLIT};
use crate::kinds::{KindEntry, KindRegistration, KindRegistry};
use crate::layout::{
    GeometryReader, GeometryState, LayoutEngine, LayoutStamp, LayoutStrategy, Point, Rect,
    RefreshEvent, Size,
};
use crate::notify::ListenerId;
use crate::tree::{FlowTree, NodeClassifier, OriginTree, RenderTree, StructureMut, TreeChange};

/// Id of the node every declared tree hangs from.
pub const ROOT_ID: &str = "root";

pub struct Document {
    registry: KindRegistry,
    nodes: NodeArena,
    origin: OriginTree,
    render: RenderTree,
    layout: LayoutEngine,
    config: FlowConfig,
    geometry_version: u64,
    disposed: bool,
}

impl Document {
    pub fn new() -> Self {
        Self::build(FlowConfig::default())
    }

    pub fn with_config(config: FlowConfig) -> Result<Self> {
        let layout = config.layout.clone();
        let mut document = Self::build(config);
        document.layout.set_current(&layout)?;
        Ok(document)
    }

    fn build(config: FlowConfig) -> Self {
        let registry = KindRegistry::with_builtins();
        let mut nodes = NodeArena::new();
        let entry = registry
            .get(ROOT)
            .unwrap_or_else(|| Rc::new(KindEntry::stub(ROOT)));
        let root = nodes.insert(FlowNode::new(
            ROOT_ID,
            entry,
            true,
            GeometryState::new(Size::default(), None),
        ));
        let mut render = RenderTree::new(root);
        render.set_refine_branches(config.refine_branches);
        Self {
            registry,
            nodes,
            origin: OriginTree::new(root),
            render,
            layout: LayoutEngine::new(),
            config,
            geometry_version: 0,
            disposed: false,
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            Err(FlowError::Disposed)
        } else {
            Ok(())
        }
    }

    fn require(&self, id: &str) -> Result<NodeKey> {
        self.ensure_live()?;
        self.nodes
            .key_of(id)
            .ok_or_else(|| FlowError::NodeNotFound(id.to_string()))
    }

    /// Runs `f` inside an origin batch unless one is already open.
    fn batched<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let opened = self.origin.begin_batch();
        let result = f(self);
        if opened {
            self.origin.end_batch();
        }
        result
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn origin(&self) -> &OriginTree {
        &self.origin
    }

    /// Projection as of the last [`Document::refresh`] or
    /// [`Document::update_render`].
    pub fn render(&self) -> &RenderTree {
        &self.render
    }

    pub fn root(&self) -> NodeKey {
        self.origin.root()
    }

    // Registration.

    pub fn register_kind(&mut self, registration: KindRegistration) -> Result<()> {
        self.ensure_live()?;
        self.registry.register(registration)?;
        let default_size = self.config.spacing.default_node_size;
        for node in self.nodes.iter_mut() {
            if let Some(entry) = self.registry.get(node.kind()) {
                let size = entry.meta.size.unwrap_or(default_size);
                if !node.geometry.reseed(size, entry.meta.origin) {
                    node.geometry.mark_dirty();
                }
                node.set_entry(entry);
            }
        }
        self.geometry_version += 1;
        Ok(())
    }

    pub fn register_layout(
        &mut self,
        key: impl Into<String>,
        strategy: impl LayoutStrategy + 'static,
    ) -> Result<()> {
        self.ensure_live()?;
        let key = key.into();
        if key == self.layout.current() {
            self.invalidate_geometry();
        }
        self.layout.register(key, Rc::new(strategy));
        Ok(())
    }

    pub fn set_layout(&mut self, key: &str) -> Result<()> {
        self.ensure_live()?;
        if self.layout.set_current(key)? {
            self.config.layout = key.to_string();
            self.invalidate_geometry();
        }
        Ok(())
    }

    pub fn layout_key(&self) -> &str {
        self.layout.current()
    }

    pub fn set_refine_branches(&mut self, enabled: bool) {
        self.config.refine_branches = enabled;
        self.render.set_refine_branches(enabled);
    }

    fn invalidate_geometry(&mut self) {
        for node in self.nodes.iter_mut() {
            node.geometry.mark_dirty();
        }
        self.geometry_version += 1;
    }

    // Declarative loading.

    pub fn from_json(&mut self, records: &[NodeRecord]) -> Result<()> {
        self.ensure_live()?;
        self.batched(|doc| doc.reconcile(records))
    }

    pub fn from_json_str(&mut self, input: &str) -> Result<()> {
        let records = parse_records(input)?;
        self.from_json(&records)
    }

    // Editing.

    /// Creates `record` (and its subtree) under `parent`, appended unless an
    /// index is given.
    pub fn add_node(
        &mut self,
        record: NodeRecord,
        parent: Option<&str>,
        index: Option<usize>,
    ) -> Result<NodeKey> {
        let parent = match parent {
            Some(id) => self.require(id)?,
            None => {
                self.ensure_live()?;
                self.root()
            }
        };
        let index = index.unwrap_or_else(|| self.origin.children(parent).len());
        self.batched(|doc| doc.insert_record(record, parent, index))
    }

    /// Creates `record` right after the node `after`.
    pub fn add_after(&mut self, after: &str, record: NodeRecord) -> Result<NodeKey> {
        let before = self.require(after)?;
        let parent = self
            .origin
            .parent(before)
            .ok_or_else(|| TopologyError::Detached(after.to_string()))?;
        let index = self
            .origin
            .children(parent)
            .iter()
            .position(|key| *key == before)
            .map(|idx| idx + 1)
            .unwrap_or_else(|| self.origin.children(parent).len());
        self.batched(|doc| doc.insert_record(record, parent, index))
    }

    /// Moves the named nodes under `parent`, keeping their relative order.
    pub fn move_nodes(&mut self, ids: &[&str], parent: &str, index: usize) -> Result<()> {
        let parent = self.require(parent)?;
        let keys = ids
            .iter()
            .map(|id| self.require(id))
            .collect::<Result<Vec<_>>>()?;
        self.origin.move_children(parent, &keys, index)
    }

    /// Disposes `id` and its whole origin subtree.
    pub fn remove_node(&mut self, id: &str) -> Result<()> {
        let key = self.require(id)?;
        if key == self.root() {
            return Err(FlowError::RootRemoval);
        }
        self.dispose_subtree(key)?;
        Ok(())
    }

    pub(crate) fn dispose_subtree(&mut self, key: NodeKey) -> Result<usize> {
        let removed = self.origin.remove(key, true)?;
        for key in &removed {
            self.render.forget(*key);
            self.nodes.remove(*key);
        }
        trace!(count = removed.len(), "disposed subtree");
        Ok(removed.len())
    }

    pub(crate) fn resolve_kind(&self, kind: &str) -> Result<Rc<KindEntry>> {
        match self.registry.get(kind) {
            Some(entry) => Ok(entry),
            None if self.config.strict_kinds => Err(FlowError::UnknownKind(kind.to_string())),
            None => {
                warn!(kind, "unregistered kind, using a bare stub");
                Ok(Rc::new(KindEntry::stub(kind)))
            }
        }
    }

    /// Tears the document down. Every later call fails with
    /// [`FlowError::Disposed`].
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.origin.clear_listeners();
        self.layout.clear_listeners();
        let root = self.root();
        let children = self.origin.children(root).to_vec();
        for child in children {
            let _ = self.dispose_subtree(child);
        }
        self.nodes = NodeArena::new();
        self.disposed = true;
    }

    // Lookup.

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.get(self.nodes.key_of(id)?)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut FlowNode> {
        let key = self.nodes.key_of(id)?;
        self.nodes.get_mut(key)
    }

    pub fn node_by_key(&self, key: NodeKey) -> Option<&FlowNode> {
        self.nodes.get(key)
    }

    pub fn key_of(&self, id: &str) -> Option<NodeKey> {
        self.nodes.key_of(id)
    }

    /// Live nodes in creation order, root first.
    pub fn all_nodes(&self) -> impl Iterator<Item = &FlowNode> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn ids(&self, keys: &[NodeKey]) -> Vec<&str> {
        keys.iter()
            .filter_map(|key| self.nodes.get(*key))
            .map(FlowNode::id)
            .collect()
    }

    pub fn origin_children(&self, id: &str) -> Result<Vec<&str>> {
        let key = self.require(id)?;
        Ok(self.ids(self.origin.children(key)))
    }

    pub fn render_children(&self, id: &str) -> Result<Vec<&str>> {
        let key = self.require(id)?;
        Ok(self.ids(self.render.children(key)))
    }

    // Collapse and measurement.

    /// Collapses or expands `id`; kinds that are not `expandable` ignore it.
    /// Returns whether the collapsed set changed.
    pub fn set_collapsed(&mut self, id: &str, collapsed: bool) -> Result<bool> {
        let key = self.require(id)?;
        let Some(node) = self.nodes.get(key) else {
            return Ok(false);
        };
        if !node.entry().meta.expandable(&node.view()) {
            return Ok(false);
        }
        let changed = if collapsed {
            self.render.collapse(key)
        } else {
            self.render.expand(key)
        };
        Ok(changed)
    }

    pub fn is_collapsed(&self, id: &str) -> Result<bool> {
        let key = self.require(id)?;
        Ok(self.render.is_collapsed(key))
    }

    /// Assigns a measured size. Containers derive theirs, so for them this
    /// does nothing.
    pub fn set_size(&mut self, id: &str, size: Size) -> Result<()> {
        let key = self.require(id)?;
        let Some(node) = self.nodes.get_mut(key) else {
            return Ok(());
        };
        if node.is_container() {
            trace!(id, "ignored size on a container");
            return Ok(());
        }
        if node.geometry.set_size(size) {
            self.geometry_version += 1;
        }
        Ok(())
    }

    pub fn set_origin(&mut self, id: &str, origin: Option<Point>) -> Result<()> {
        let key = self.require(id)?;
        let Some(node) = self.nodes.get_mut(key) else {
            return Ok(());
        };
        if node.geometry.set_origin(origin) {
            self.geometry_version += 1;
        }
        Ok(())
    }

    // Refresh and geometry.

    /// Rebuilds the render projection when the origin tree or the collapsed
    /// set moved. Returns whether it was rebuilt.
    pub fn update_render(&mut self) -> Result<bool> {
        self.ensure_live()?;
        if !self.render.needs_update(self.origin.version()) {
            return Ok(false);
        }
        let facts = KindFacts(&self.nodes);
        self.render.update_render_struct(&self.origin, &facts);
        Ok(true)
    }

    /// Brings the projection and the geometry up to date. Returns `false`
    /// without doing any work when nothing changed since the last call.
    pub fn refresh(&mut self) -> Result<bool> {
        self.update_render()?;
        let stamp = LayoutStamp {
            render_version: self.render.version(),
            geometry_version: self.geometry_version,
        };
        if self.layout.is_current(stamp) {
            return Ok(false);
        }
        self.layout
            .run(&self.render, &mut self.nodes, &self.config.spacing, stamp);
        Ok(true)
    }

    /// Node recomputations performed by every refresh so far.
    pub fn recompute_count(&self) -> usize {
        self.layout.recompute_count()
    }

    pub fn geometry(&self) -> Result<GeometryReader<'_>> {
        self.ensure_live()?;
        Ok(GeometryReader {
            tree: &self.render,
            nodes: &self.nodes,
            strategy: self.layout.active(),
            spacing: &self.config.spacing,
            epoch: self.layout.epoch(),
        })
    }

    pub fn size(&self, id: &str) -> Result<Option<Size>> {
        let key = self.require(id)?;
        Ok(self.geometry()?.size(key))
    }

    pub fn position(&self, id: &str) -> Result<Option<Point>> {
        let key = self.require(id)?;
        Ok(self.geometry()?.position(key))
    }

    pub fn local_bounds(&self, id: &str) -> Result<Option<Rect>> {
        let key = self.require(id)?;
        Ok(self.geometry()?.local_bounds(key))
    }

    pub fn bounds(&self, id: &str) -> Result<Option<Rect>> {
        let key = self.require(id)?;
        Ok(self.geometry()?.bounds(key))
    }

    pub fn input_point(&self, id: &str) -> Result<Option<Point>> {
        let key = self.require(id)?;
        Ok(self.geometry()?.input_point(key))
    }

    pub fn output_point(&self, id: &str) -> Result<Option<Point>> {
        let key = self.require(id)?;
        Ok(self.geometry()?.output_point(key))
    }

    // Notifications.

    pub fn on_tree_change(&mut self, listener: impl FnMut(&TreeChange) + 'static) -> ListenerId {
        self.origin.on_change(listener)
    }

    pub fn off_tree_change(&mut self, id: ListenerId) -> bool {
        self.origin.off_change(id)
    }

    pub fn on_refresh(&mut self, listener: impl FnMut(&RefreshEvent) + 'static) -> ListenerId {
        self.layout.on_refresh(listener)
    }

    pub fn off_refresh(&mut self, id: ListenerId) -> bool {
        self.layout.off_refresh(id)
    }

    /// Groups edits so tree-change listeners hear about them once.
    pub fn batch(&mut self) -> Result<DocumentBatch<'_>> {
        self.ensure_live()?;
        if !self.origin.begin_batch() {
            return Err(FlowError::BatchActive);
        }
        Ok(DocumentBatch { document: self })
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

pub struct DocumentBatch<'a> {
    document: &'a mut Document,
}

impl Deref for DocumentBatch<'_> {
    type Target = Document;

    fn deref(&self) -> &Document {
        self.document
    }
}

impl DerefMut for DocumentBatch<'_> {
    fn deref_mut(&mut self) -> &mut Document {
        self.document
    }
}

impl Drop for DocumentBatch<'_> {
    fn drop(&mut self) {
        self.document.origin.end_batch();
    }
}

struct KindFacts<'a>(&'a NodeArena);

impl NodeClassifier for KindFacts<'_> {
    fn is_marker(&self, key: NodeKey) -> bool {
        self.0
            .get(key)
            .is_some_and(|node| node.entry().meta.is_marker())
    }

    fn is_split(&self, key: NodeKey) -> bool {
        self.0
            .get(key)
            .is_some_and(|node| node.entry().is_type_or_extend_type(SPLIT))
    }

    fn is_branch_container(&self, key: NodeKey) -> bool {
        self.0
            .get(key)
            .is_some_and(|node| node.entry().meta.is_inline_blocks())
    }

    fn is_terminal(&self, key: NodeKey) -> bool {
        self.0
            .get(key)
            .is_some_and(|node| node.entry().meta.is_terminal())
    }
}

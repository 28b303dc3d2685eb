use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::kinds::{KindEntry, NodeView};
use crate::layout::GeometryState;

/// Generational handle to a node owned by a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    index: u32,
    generation: u32,
}

impl NodeKey {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.index)
    }
}

pub struct FlowNode {
    id: String,
    entry: Rc<KindEntry>,
    pub data: Option<Value>,
    pub meta: Option<Map<String, Value>>,
    synthetic: bool,
    pub(crate) geometry: GeometryState,
    /// State attached by outer layers (hover, selection, ...). Survives reloads.
    pub ui_state: Map<String, Value>,
}

impl FlowNode {
    pub(crate) fn new(
        id: impl Into<String>,
        entry: Rc<KindEntry>,
        synthetic: bool,
        geometry: GeometryState,
    ) -> Self {
        Self {
            id: id.into(),
            entry,
            data: None,
            meta: None,
            synthetic,
            geometry,
            ui_state: Map::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &str {
        &self.entry.kind
    }

    pub fn entry(&self) -> &KindEntry {
        &self.entry
    }

    pub(crate) fn set_entry(&mut self, entry: Rc<KindEntry>) {
        self.entry = entry;
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn is_container(&self) -> bool {
        self.entry.meta.is_container()
    }

    pub fn is_hidden(&self) -> bool {
        self.entry.meta.is_hidden()
    }

    pub fn geometry(&self) -> &GeometryState {
        &self.geometry
    }

    pub fn view(&self) -> NodeView<'_> {
        NodeView {
            id: &self.id,
            kind: &self.entry.kind,
            data: self.data.as_ref(),
        }
    }
}

impl fmt::Debug for FlowNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowNode")
            .field("id", &self.id)
            .field("kind", &self.entry.kind)
            .field("synthetic", &self.synthetic)
            .finish_non_exhaustive()
    }
}

struct Slot {
    generation: u32,
    node: Option<FlowNode>,
}

impl Slot {
    fn holds(&self, key: NodeKey) -> bool {
        self.generation == key.generation && self.node.is_some()
    }
}

/// Slot storage for live nodes with id lookup and creation order.
///
/// Removed keys stay in `order` as tombstones until they outnumber the live
/// keys, then the vector is compacted in one sweep.
#[derive(Default)]
pub struct NodeArena {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    ids: HashMap<String, NodeKey>,
    order: Vec<NodeKey>,
    live: usize,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: FlowNode) -> NodeKey {
        let id = node.id.clone();
        let key = match self.free_list.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation += 1;
                slot.node = Some(node);
                NodeKey::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeKey::new(index, 0)
            }
        };
        self.ids.insert(id, key);
        self.order.push(key);
        self.live += 1;
        key
    }

    pub fn remove(&mut self, key: NodeKey) -> Option<FlowNode> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        let node = slot.node.take()?;
        self.free_list.push(key.index);
        if self.ids.get(&node.id) == Some(&key) {
            self.ids.remove(&node.id);
        }
        self.live -= 1;
        if self.order.len() > 2 * self.live {
            self.compact();
        }
        Some(node)
    }

    fn compact(&mut self) {
        let slots = &self.slots;
        self.order
            .retain(|key| slots.get(key.index as usize).is_some_and(|slot| slot.holds(*key)));
    }

    pub fn get(&self, key: NodeKey) -> Option<&FlowNode> {
        let slot = self.slots.get(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.node.as_ref()
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut FlowNode> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.node.as_mut()
    }

    pub fn key_of(&self, id: &str) -> Option<NodeKey> {
        self.ids.get(id).copied()
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.get(key).is_some()
    }

    /// Live keys in creation order.
    pub fn keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.order.iter().copied().filter(|key| self.contains(*key))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlowNode> {
        self.order.iter().filter_map(|key| self.get(*key))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FlowNode> {
        self.slots.iter_mut().filter_map(|slot| slot.node.as_mut())
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

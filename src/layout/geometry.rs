use std::cell::Cell;

use super::types::{Point, Rect, Size};
use crate::document::NodeKey;

/// Slots valid for one layout pass; stamped with the pass epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalSlot {
    WorldOrigin,
    Bounds,
    InputPoint,
    OutputPoint,
}

/// Slots valid until the node is marked dirty; stamped with its version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalSlot {
    Extent,
    ChildrenOffset,
}

impl GlobalSlot {
    const COUNT: usize = 4;

    fn index(self) -> usize {
        self as usize
    }
}

impl LocalSlot {
    const COUNT: usize = 2;

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheValue {
    Point(Point),
    Rect(Rect),
}

impl CacheValue {
    pub fn point(self) -> Option<Point> {
        match self {
            CacheValue::Point(point) => Some(point),
            CacheValue::Rect(_) => None,
        }
    }

    pub fn rect(self) -> Option<Rect> {
        match self {
            CacheValue::Rect(rect) => Some(rect),
            CacheValue::Point(_) => None,
        }
    }
}

type Slot = Cell<Option<(u64, CacheValue)>>;

/// Structural facts compared between passes to catch moves that did not
/// otherwise dirty a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub parent: Option<NodeKey>,
    pub prev: Option<NodeKey>,
    pub index: usize,
    pub child_count: usize,
    pub collapsed: bool,
}

#[derive(Debug)]
pub struct GeometryState {
    pub(crate) size: Size,
    pub(crate) position: Point,
    pub(crate) origin: Option<Point>,
    /// Set once the caller assigns a size; kind defaults no longer apply.
    size_assigned: bool,
    origin_assigned: bool,
    pub(crate) local_dirty: bool,
    pub(crate) version: u64,
    pub(crate) signature: Option<Signature>,
    pub(crate) local_bounds: Option<Rect>,
    /// Epoch of the last pass that reached this node.
    pub(crate) visited_epoch: u64,
    /// Epoch of the last pass that moved or resized this node.
    pub(crate) changed_epoch: u64,
    local: [Slot; LocalSlot::COUNT],
    global: [Slot; GlobalSlot::COUNT],
}

impl GeometryState {
    pub fn new(size: Size, origin: Option<Point>) -> Self {
        Self {
            size,
            position: Point::ZERO,
            origin,
            size_assigned: false,
            origin_assigned: false,
            local_dirty: true,
            version: 0,
            signature: None,
            local_bounds: None,
            visited_epoch: 0,
            changed_epoch: 0,
            local: Default::default(),
            global: Default::default(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_dirty(&self) -> bool {
        self.local_dirty
    }

    /// Invalidates every local slot and schedules a recompute.
    pub fn mark_dirty(&mut self) {
        self.local_dirty = true;
        self.version += 1;
    }

    /// Assigns a size that later kind defaults will not override.
    pub fn set_size(&mut self, size: Size) -> bool {
        self.size_assigned = true;
        if self.size == size {
            return false;
        }
        self.size = size;
        self.mark_dirty();
        true
    }

    pub fn set_origin(&mut self, origin: Option<Point>) -> bool {
        self.origin_assigned = true;
        if self.origin == origin {
            return false;
        }
        self.origin = origin;
        self.mark_dirty();
        true
    }

    /// Applies kind defaults to whatever the caller never assigned.
    /// Returns whether anything changed.
    pub fn reseed(&mut self, size: Size, origin: Option<Point>) -> bool {
        let mut changed = false;
        if !self.size_assigned && self.size != size {
            self.size = size;
            changed = true;
        }
        if !self.origin_assigned && self.origin != origin {
            self.origin = origin;
            changed = true;
        }
        if changed {
            self.mark_dirty();
        }
        changed
    }

    pub fn local(&self, slot: LocalSlot) -> Option<CacheValue> {
        match self.local[slot.index()].get() {
            Some((stamp, value)) if stamp == self.version => Some(value),
            _ => None,
        }
    }

    pub fn store_local(&self, slot: LocalSlot, value: CacheValue) {
        self.local[slot.index()].set(Some((self.version, value)));
    }

    pub fn global(&self, slot: GlobalSlot, epoch: u64) -> Option<CacheValue> {
        match self.global[slot.index()].get() {
            Some((stamp, value)) if stamp == epoch => Some(value),
            _ => None,
        }
    }

    pub fn store_global(&self, slot: GlobalSlot, epoch: u64, value: CacheValue) {
        self.global[slot.index()].set(Some((epoch, value)));
    }

    /// Drops every cached value and settled result.
    pub fn clear(&mut self) {
        for slot in self.local.iter().chain(self.global.iter()) {
            slot.set(None);
        }
        self.signature = None;
        self.local_bounds = None;
        self.mark_dirty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_slots_die_with_the_version() {
        let mut state = GeometryState::new(Size::new(10.0, 10.0), None);
        state.store_local(LocalSlot::Extent, CacheValue::Rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
        assert!(state.local(LocalSlot::Extent).is_some());
        assert!(state.local(LocalSlot::ChildrenOffset).is_none());
        assert!(!state.set_size(Size::new(10.0, 10.0)));
        assert!(state.local(LocalSlot::Extent).is_some());
        assert!(state.set_size(Size::new(20.0, 10.0)));
        assert!(state.local(LocalSlot::Extent).is_none());
    }

    #[test]
    fn global_slots_die_with_the_epoch() {
        let state = GeometryState::new(Size::default(), None);
        state.store_global(GlobalSlot::Bounds, 3, CacheValue::Point(Point::new(1.0, 2.0)));
        assert_eq!(
            state.global(GlobalSlot::Bounds, 3).and_then(CacheValue::point),
            Some(Point::new(1.0, 2.0))
        );
        assert!(state.global(GlobalSlot::Bounds, 4).is_none());
        assert!(state.global(GlobalSlot::InputPoint, 3).is_none());
    }

    #[test]
    fn reseeding_keeps_assigned_values() {
        let mut state = GeometryState::new(Size::new(10.0, 10.0), None);
        assert!(state.reseed(Size::new(30.0, 30.0), Some(Point::ZERO)));
        assert_eq!(state.size, Size::new(30.0, 30.0));
        assert!(!state.reseed(Size::new(30.0, 30.0), Some(Point::ZERO)));

        state.set_size(Size::new(5.0, 5.0));
        let version = state.version();
        assert!(state.reseed(Size::new(40.0, 40.0), None));
        assert_eq!(state.size, Size::new(5.0, 5.0));
        assert_eq!(state.origin, None);
        assert!(state.version() > version);

        state.set_origin(Some(Point::new(1.0, 1.0)));
        assert!(!state.reseed(Size::new(40.0, 40.0), None));
    }
}

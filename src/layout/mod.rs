mod fixed;
pub(crate) mod geometry;
pub(crate) mod pass;
mod strategy;
pub(crate) mod types;

pub use fixed::{Direction, FixedLayout, HORIZONTAL, VERTICAL};
pub use geometry::{GeometryState, GlobalSlot, LocalSlot, Signature};
pub use pass::{GeometryReader, LayoutPass};
pub use strategy::LayoutStrategy;
pub use types::*;

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::config::SpacingConfig;
use crate::document::NodeArena;
use crate::error::{FlowError, Result};
use crate::notify::{Emitter, ListenerId};
use crate::tree::RenderTree;

/// Fired once per refresh that did work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshEvent {
    pub epoch: u64,
    pub recomputed: usize,
}

/// Version stamps a layout pass was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutStamp {
    pub render_version: u64,
    pub geometry_version: u64,
}

/// Strategy registry plus the bookkeeping that makes refreshes idempotent.
///
/// `active` is always the strategy registered under `current`.
pub struct LayoutEngine {
    strategies: HashMap<String, Rc<dyn LayoutStrategy>>,
    current: String,
    active: Rc<dyn LayoutStrategy>,
    epoch: u64,
    last: Option<LayoutStamp>,
    recomputed: usize,
    listeners: Emitter<RefreshEvent>,
}

impl LayoutEngine {
    /// Engine with `vertical` and `horizontal` registered, `vertical` active.
    pub fn new() -> Self {
        let vertical: Rc<dyn LayoutStrategy> = Rc::new(FixedLayout::vertical());
        let mut strategies: HashMap<String, Rc<dyn LayoutStrategy>> = HashMap::new();
        strategies.insert(VERTICAL.to_string(), vertical.clone());
        strategies.insert(HORIZONTAL.to_string(), Rc::new(FixedLayout::horizontal()));
        Self {
            strategies,
            current: VERTICAL.to_string(),
            active: vertical,
            epoch: 0,
            last: None,
            recomputed: 0,
            listeners: Emitter::new(),
        }
    }

    pub fn register(&mut self, key: impl Into<String>, strategy: Rc<dyn LayoutStrategy>) {
        let key = key.into();
        if key == self.current {
            self.active = strategy.clone();
            self.last = None;
        }
        self.strategies.insert(key, strategy);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.strategies.contains_key(key)
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Switches the active strategy; returns whether it changed.
    pub fn set_current(&mut self, key: &str) -> Result<bool> {
        let strategy = self
            .strategies
            .get(key)
            .cloned()
            .ok_or_else(|| FlowError::UnknownLayout(key.to_string()))?;
        if self.current == key {
            return Ok(false);
        }
        self.current = key.to_string();
        self.active = strategy;
        self.last = None;
        Ok(true)
    }

    pub fn strategy(&self) -> Rc<dyn LayoutStrategy> {
        self.active.clone()
    }

    pub fn active(&self) -> &dyn LayoutStrategy {
        self.active.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Total node recomputations since the engine was created.
    pub fn recompute_count(&self) -> usize {
        self.recomputed
    }

    pub fn is_current(&self, stamp: LayoutStamp) -> bool {
        self.last == Some(stamp)
    }

    /// Runs one pass of the active strategy and notifies listeners.
    pub fn run(
        &mut self,
        tree: &RenderTree,
        nodes: &mut NodeArena,
        spacing: &SpacingConfig,
        stamp: LayoutStamp,
    ) -> RefreshEvent {
        let strategy = self.strategy();
        self.epoch += 1;
        let mut pass = LayoutPass::new(tree, nodes, spacing, self.epoch);
        strategy.update(&mut pass);
        let event = RefreshEvent {
            epoch: self.epoch,
            recomputed: pass.recomputed(),
        };
        self.recomputed += event.recomputed;
        self.last = Some(stamp);
        debug!(
            layout = %self.current,
            epoch = event.epoch,
            recomputed = event.recomputed,
            "refreshed geometry"
        );
        self.listeners.emit(&event);
        event
    }

    pub fn on_refresh(&mut self, listener: impl FnMut(&RefreshEvent) + 'static) -> ListenerId {
        self.listeners.subscribe(listener)
    }

    pub fn off_refresh(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub(crate) fn clear_listeners(&mut self) {
        self.listeners.clear();
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

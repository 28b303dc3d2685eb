//! Kind registry: per node-type metadata, templates and `extend` inheritance.
//!
//! Registrations are kept as declared and flattened into one [`KindEntry`]
//! per kind whenever the registry changes, so lookups never walk the
//! ancestry. The flattened entry lists its ancestors most specific first.

pub mod builtin;
pub mod meta;

pub use meta::{KindMeta, MetaFlag, MetaNumber, NodeView};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use tracing::error;

use crate::error::{FlowError, Result};
use crate::ir::NodeRecord;

/// Builds the structural children of a record (synthetic wrappers included).
pub type OnCreate = Rc<dyn Fn(&CreateContext<'_>) -> Option<Vec<NodeRecord>>>;

/// Rewrites one declared child before it is reconciled under its parent.
pub type OnBlockChildCreate = Rc<dyn Fn(&CreateContext<'_>, NodeRecord) -> NodeRecord>;

/// Overrides the kind of a synthetic child, scoped to its parent's kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRegistry {
    pub key: String,
    pub kind: String,
}

#[derive(Clone, Default)]
pub struct KindRegistration {
    pub kind: String,
    pub extend: Option<String>,
    pub meta: KindMeta,
    pub extend_child_registries: Vec<ChildRegistry>,
    pub on_create: Option<OnCreate>,
    pub on_block_child_create: Option<OnBlockChildCreate>,
}

impl KindRegistration {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn extend(mut self, base: impl Into<String>) -> Self {
        self.extend = Some(base.into());
        self
    }

    pub fn meta(mut self, meta: KindMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn child_registry(mut self, key: impl Into<String>, kind: impl Into<String>) -> Self {
        self.extend_child_registries.push(ChildRegistry {
            key: key.into(),
            kind: kind.into(),
        });
        self
    }

    pub fn on_create(
        mut self,
        hook: impl Fn(&CreateContext<'_>) -> Option<Vec<NodeRecord>> + 'static,
    ) -> Self {
        self.on_create = Some(Rc::new(hook));
        self
    }

    pub fn on_block_child_create(
        mut self,
        hook: impl Fn(&CreateContext<'_>, NodeRecord) -> NodeRecord + 'static,
    ) -> Self {
        self.on_block_child_create = Some(Rc::new(hook));
        self
    }

    fn absorb(&mut self, other: KindRegistration) {
        if other.extend.is_some() {
            self.extend = other.extend;
        }
        self.meta.merge(&other.meta);
        for registry in other.extend_child_registries {
            self.extend_child_registries.retain(|r| r.key != registry.key);
            self.extend_child_registries.push(registry);
        }
        if other.on_create.is_some() {
            self.on_create = other.on_create;
        }
        if other.on_block_child_create.is_some() {
            self.on_block_child_create = other.on_block_child_create;
        }
    }
}

impl fmt::Debug for KindRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindRegistration")
            .field("kind", &self.kind)
            .field("extend", &self.extend)
            .field("meta", &self.meta)
            .field("extend_child_registries", &self.extend_child_registries)
            .finish_non_exhaustive()
    }
}

/// Flattened, ready-to-use view of one kind.
#[derive(Clone)]
pub struct KindEntry {
    pub kind: String,
    /// Ancestors, most specific first; the kind itself is not included.
    pub extends: Vec<String>,
    pub meta: KindMeta,
    pub child_registries: Vec<ChildRegistry>,
    pub on_create: Option<OnCreate>,
    pub on_block_child_create: Option<OnBlockChildCreate>,
    pub stub: bool,
}

impl KindEntry {
    /// Bare entry used for kinds nobody registered.
    pub fn stub(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            extends: Vec::new(),
            meta: KindMeta::default(),
            child_registries: Vec::new(),
            on_create: None,
            on_block_child_create: None,
            stub: true,
        }
    }

    pub fn is_extend(&self, base: &str) -> bool {
        self.extends.iter().any(|kind| kind == base)
    }

    pub fn is_type_or_extend_type(&self, base: &str) -> bool {
        self.kind == base || self.is_extend(base)
    }

    pub fn child_kind(&self, key: &str) -> Option<&str> {
        self.child_registries
            .iter()
            .find(|registry| registry.key == key)
            .map(|registry| registry.kind.as_str())
    }
}

impl fmt::Debug for KindEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindEntry")
            .field("kind", &self.kind)
            .field("extends", &self.extends)
            .field("meta", &self.meta)
            .field("child_registries", &self.child_registries)
            .field("stub", &self.stub)
            .finish_non_exhaustive()
    }
}

/// Arguments of the template hooks.
pub struct CreateContext<'a> {
    pub record: &'a NodeRecord,
    pub entry: &'a KindEntry,
    pub registry: &'a KindRegistry,
}

impl CreateContext<'_> {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    /// Kind of the synthetic child registered under `key` for this node's kind.
    pub fn child_kind(&self, key: &str, default: &str) -> String {
        self.entry.child_kind(key).unwrap_or(default).to_string()
    }

    pub fn block_child(&self, record: NodeRecord) -> NodeRecord {
        match &self.entry.on_block_child_create {
            Some(hook) => hook(self, record),
            None => record,
        }
    }

    /// Declared children after `on_block_child_create`.
    pub fn declared_children(&self) -> Vec<NodeRecord> {
        self.record
            .children
            .iter()
            .map(|child| self.block_child(child.to_record()))
            .collect()
    }
}

#[derive(Default)]
pub struct KindRegistry {
    registrations: HashMap<String, KindRegistration>,
    entries: HashMap<String, Rc<KindEntry>>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the builtin kinds.
    ///
    /// The builtin table lists every base before the kinds extending it and
    /// only extends kinds of its own, so registration cannot fail; a failure
    /// would leave the affected kinds resolving to stubs and is logged.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        if let Err(err) = registry.register_all(builtin::registrations()) {
            error!(%err, "builtin kinds failed to register");
        }
        registry
    }

    /// Adds a kind, or merges into an existing registration of the same kind.
    pub fn register(&mut self, registration: KindRegistration) -> Result<()> {
        let kind = registration.kind.clone();
        let mut merged = self
            .registrations
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| KindRegistration::new(kind.clone()));
        merged.absorb(registration);

        let previous = self.registrations.insert(kind.clone(), merged);
        if let Err(err) = self.ancestry(&kind) {
            match previous {
                Some(previous) => self.registrations.insert(kind, previous),
                None => self.registrations.remove(&kind),
            };
            return Err(err);
        }
        self.rebuild()
    }

    pub fn register_all(
        &mut self,
        registrations: impl IntoIterator<Item = KindRegistration>,
    ) -> Result<()> {
        for registration in registrations {
            self.register(registration)?;
        }
        Ok(())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    pub fn get(&self, kind: &str) -> Option<Rc<KindEntry>> {
        self.entries.get(kind).cloned()
    }

    pub fn get_or_stub(&self, kind: &str) -> Rc<KindEntry> {
        self.get(kind)
            .unwrap_or_else(|| Rc::new(KindEntry::stub(kind)))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// True when `kind` inherits from `base` (directly or transitively).
    pub fn is_extend(&self, kind: &str, base: &str) -> bool {
        self.entries
            .get(kind)
            .is_some_and(|entry| entry.is_extend(base))
    }

    pub fn is_type_or_extend_type(&self, kind: &str, base: &str) -> bool {
        kind == base || self.is_extend(kind, base)
    }

    pub fn child_kind(&self, parent_kind: &str, key: &str) -> Option<&str> {
        self.entries.get(parent_kind)?.child_kind(key)
    }

    /// `kind` followed by its ancestors, most specific first.
    fn ancestry(&self, kind: &str) -> Result<Vec<&KindRegistration>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = kind;
        loop {
            if !seen.insert(current) {
                return Err(FlowError::ExtendCycle(kind.to_string()));
            }
            let registration = self
                .registrations
                .get(current)
                .ok_or_else(|| FlowError::UnknownKind(current.to_string()))?;
            chain.push(registration);
            match registration.extend.as_deref() {
                Some(base) => current = base,
                None => return Ok(chain),
            }
        }
    }

    fn resolve(&self, kind: &str) -> Result<KindEntry> {
        let chain = self.ancestry(kind)?;
        let mut meta = KindMeta::default();
        for registration in chain.iter().rev() {
            meta.merge(&registration.meta);
        }
        let mut child_registries: Vec<ChildRegistry> = Vec::new();
        for registration in &chain {
            for registry in &registration.extend_child_registries {
                if !child_registries.iter().any(|r| r.key == registry.key) {
                    child_registries.push(registry.clone());
                }
            }
        }
        Ok(KindEntry {
            kind: kind.to_string(),
            extends: chain[1..].iter().map(|r| r.kind.clone()).collect(),
            meta,
            child_registries,
            on_create: chain.iter().find_map(|r| r.on_create.clone()),
            on_block_child_create: chain.iter().find_map(|r| r.on_block_child_create.clone()),
            stub: false,
        })
    }

    fn rebuild(&mut self) -> Result<()> {
        let mut entries = HashMap::with_capacity(self.registrations.len());
        for kind in self.registrations.keys() {
            entries.insert(kind.clone(), Rc::new(self.resolve(kind)?));
        }
        self.entries = entries;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Size;

    fn sized(width: f32) -> KindMeta {
        KindMeta {
            size: Some(Size::new(width, 10.0)),
            ..Default::default()
        }
    }

    #[test]
    fn resolves_extend_chain_most_specific_first() {
        let mut registry = KindRegistry::new();
        registry
            .register_all([
                KindRegistration::new("base").meta(KindMeta {
                    marker: Some(true),
                    ..sized(10.0)
                }),
                KindRegistration::new("mid").extend("base").meta(sized(20.0)),
                KindRegistration::new("leaf").extend("mid"),
            ])
            .unwrap();
        let leaf = registry.get("leaf").unwrap();
        assert_eq!(leaf.extends, vec!["mid".to_string(), "base".to_string()]);
        assert_eq!(leaf.meta.size, Some(Size::new(20.0, 10.0)));
        assert!(leaf.meta.is_marker());
        assert!(registry.is_extend("leaf", "base"));
        assert!(!registry.is_extend("base", "leaf"));
        assert!(registry.is_type_or_extend_type("mid", "mid"));
    }

    #[test]
    fn re_registering_a_base_updates_descendants() {
        let mut registry = KindRegistry::new();
        registry.register(KindRegistration::new("base").meta(sized(10.0))).unwrap();
        registry.register(KindRegistration::new("leaf").extend("base")).unwrap();
        registry.register(KindRegistration::new("base").meta(sized(30.0))).unwrap();
        assert_eq!(
            registry.get("leaf").unwrap().meta.size,
            Some(Size::new(30.0, 10.0))
        );
    }

    #[test]
    fn rejects_unknown_bases_and_cycles() {
        let mut registry = KindRegistry::new();
        let err = registry
            .register(KindRegistration::new("orphan").extend("missing"))
            .unwrap_err();
        assert!(matches!(err, FlowError::UnknownKind(kind) if kind == "missing"));
        assert!(!registry.contains("orphan"));

        registry.register(KindRegistration::new("a")).unwrap();
        registry.register(KindRegistration::new("b").extend("a")).unwrap();
        let err = registry
            .register(KindRegistration::new("a").extend("b"))
            .unwrap_err();
        assert!(matches!(err, FlowError::ExtendCycle(_)));
        assert!(registry.get("a").unwrap().extends.is_empty());
    }

    #[test]
    fn child_registries_are_overridable_per_parent_kind() {
        let mut registry = KindRegistry::new();
        registry
            .register_all([
                KindRegistration::new("fork").child_registry("icon", "forkIcon"),
                KindRegistration::new("loudFork")
                    .extend("fork")
                    .child_registry("icon", "loudIcon"),
            ])
            .unwrap();
        assert_eq!(registry.child_kind("fork", "icon"), Some("forkIcon"));
        assert_eq!(registry.child_kind("loudFork", "icon"), Some("loudIcon"));
        assert_eq!(registry.child_kind("loudFork", "container"), None);
    }

    #[test]
    fn unknown_kinds_fall_back_to_stub() {
        let registry = KindRegistry::with_builtins();
        let entry = registry.get_or_stub("custom");
        assert!(entry.stub);
        assert_eq!(entry.kind, "custom");
        assert!(registry.contains(builtin::SPLIT));
    }

    #[test]
    fn every_builtin_kind_resolves() {
        let registry = KindRegistry::with_builtins();
        let table = builtin::registrations();
        assert_eq!(registry.kinds().count(), table.len());
        for registration in &table {
            let entry = registry.get(&registration.kind).unwrap();
            assert!(!entry.stub, "{} resolved to a stub", registration.kind);
            if let Some(base) = registration.extend.as_deref() {
                let position = |kind: &str| table.iter().position(|r| r.kind == kind);
                assert!(position(base).is_some_and(|b| Some(b) < position(&registration.kind)));
            }
        }

        let mut fresh = KindRegistry::new();
        fresh.register_all(builtin::registrations()).unwrap();
    }
}

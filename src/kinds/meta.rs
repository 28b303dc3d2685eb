use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::layout::{Padding, Point, Size};

/// What metadata predicates and spacing functions see of a node.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    pub id: &'a str,
    pub kind: &'a str,
    pub data: Option<&'a Value>,
}

#[derive(Clone)]
pub enum MetaFlag {
    Value(bool),
    Predicate(Rc<dyn Fn(&NodeView<'_>) -> bool>),
}

impl MetaFlag {
    pub fn predicate(f: impl Fn(&NodeView<'_>) -> bool + 'static) -> Self {
        MetaFlag::Predicate(Rc::new(f))
    }

    pub fn evaluate(&self, view: &NodeView<'_>) -> bool {
        match self {
            MetaFlag::Value(value) => *value,
            MetaFlag::Predicate(f) => f(view),
        }
    }
}

impl From<bool> for MetaFlag {
    fn from(value: bool) -> Self {
        MetaFlag::Value(value)
    }
}

impl fmt::Debug for MetaFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaFlag::Value(value) => write!(f, "{value}"),
            MetaFlag::Predicate(_) => f.write_str("<predicate>"),
        }
    }
}

#[derive(Clone)]
pub enum MetaNumber {
    Value(f32),
    Computed(Rc<dyn Fn(&NodeView<'_>) -> f32>),
}

impl MetaNumber {
    pub fn computed(f: impl Fn(&NodeView<'_>) -> f32 + 'static) -> Self {
        MetaNumber::Computed(Rc::new(f))
    }

    pub fn resolve(&self, view: &NodeView<'_>) -> f32 {
        match self {
            MetaNumber::Value(value) => *value,
            MetaNumber::Computed(f) => f(view),
        }
    }
}

impl From<f32> for MetaNumber {
    fn from(value: f32) -> Self {
        MetaNumber::Value(value)
    }
}

impl fmt::Debug for MetaNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaNumber::Value(value) => write!(f, "{value}"),
            MetaNumber::Computed(_) => f.write_str("<computed>"),
        }
    }
}

/// Well-known per-kind metadata. Unset fields inherit along the `extend`
/// chain; `extra` carries anything this crate does not interpret.
#[derive(Debug, Clone, Default)]
pub struct KindMeta {
    pub addable: Option<MetaFlag>,
    pub expandable: Option<MetaFlag>,
    pub draggable: Option<MetaFlag>,
    pub selectable: Option<MetaFlag>,
    pub hidden: Option<bool>,
    pub size: Option<Size>,
    pub origin: Option<Point>,
    pub padding: Option<Padding>,
    pub spacing: Option<MetaNumber>,
    pub inline_spacing_pre: Option<MetaNumber>,
    pub inline_spacing_after: Option<MetaNumber>,
    pub min_inline_block_spacing: Option<MetaNumber>,
    pub is_inline_blocks: Option<bool>,
    pub is_container: Option<bool>,
    pub default_collapsed: Option<bool>,
    pub marker: Option<bool>,
    pub terminal: Option<bool>,
    pub extra: Map<String, Value>,
}

macro_rules! take_set {
    ($target:ident, $source:ident, $($field:ident),+ $(,)?) => {
        $(
            if $source.$field.is_some() {
                $target.$field = $source.$field.clone();
            }
        )+
    };
}

impl KindMeta {
    /// Shallow merge: every field set on `other` replaces ours.
    pub fn merge(&mut self, other: &KindMeta) {
        take_set!(
            self,
            other,
            addable,
            expandable,
            draggable,
            selectable,
            hidden,
            size,
            origin,
            padding,
            spacing,
            inline_spacing_pre,
            inline_spacing_after,
            min_inline_block_spacing,
            is_inline_blocks,
            is_container,
            default_collapsed,
            marker,
            terminal,
        );
        for (key, value) in &other.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    pub fn is_container(&self) -> bool {
        self.is_container.unwrap_or(false)
    }

    pub fn is_inline_blocks(&self) -> bool {
        self.is_inline_blocks.unwrap_or(false)
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.unwrap_or(false)
    }

    pub fn is_marker(&self) -> bool {
        self.marker.unwrap_or(false)
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.unwrap_or(false)
    }

    pub fn default_collapsed(&self) -> bool {
        self.default_collapsed.unwrap_or(false)
    }

    pub fn padding(&self) -> Padding {
        self.padding.unwrap_or(Padding::ZERO)
    }

    pub fn expandable(&self, view: &NodeView<'_>) -> bool {
        self.expandable
            .as_ref()
            .map(|flag| flag.evaluate(view))
            .unwrap_or(true)
    }
}

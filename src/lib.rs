#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod ir;
pub mod kinds;
pub mod layout;
pub mod layout_dump;
pub mod notify;
pub mod tree;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{FlowConfig, SpacingConfig, load_config};
pub use document::{Document, DocumentBatch, FlowNode, NodeKey, ROOT_ID, TreeView};
pub use error::{FlowError, Result, TopologyError};
pub use ir::{ChildRecord, NodeRecord, parse_records};
pub use kinds::{KindMeta, KindRegistration, KindRegistry};
pub use layout::{LayoutStrategy, Point, Rect, RefreshEvent, Size};

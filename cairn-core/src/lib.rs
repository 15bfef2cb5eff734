//! # Cairn core
//!
//! A transactional store of typed assets, addressed by slash-delimited paths. All changes are made through
//! transactions which either apply completely or not at all, are recorded for undo and redo, and are reported
//! to subscribers as a net difference once they are visible.

pub mod asset;
pub mod commands;
pub mod events;
pub mod history;
pub mod id;
pub mod path;
pub mod project;
pub mod reference;
pub mod registry;
pub mod state;
pub mod transaction;
pub mod util;

pub use asset::{Asset, AssetKind, AssetType, AssetView, FieldName, Value, ValueType};
pub use events::Watch;
pub use path::{AssetPath, PathError};
pub use project::{HistoryError, Project, ProjectID, ProjectOptions, WeakProject};
pub use reference::Reference;
pub use registry::{KindRegistry, KindSchema};
pub use transaction::{ApplyError, TransactionBuilder};

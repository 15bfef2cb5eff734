//! # Commands
//!
//! Commands are the recorded form of every change made to a project's assets. Each one carries enough of the
//! prior state to be run backwards, so a transaction's inverse is simply its commands applied as [`DoUndo::Undo`]
//! in reverse order. Commands are produced by [`crate::state::Staging`] while planning a transaction and
//! stored in [`crate::history`].

use crate::asset::{Asset, AssetKind, FieldName, Value};
use crate::path::AssetPath;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("{0} is occupied")]
    Occupied(AssetPath),
    #[error("{0} is empty")]
    Missing(AssetPath),
    #[error("command constructed for a state that does not match the current state of {0}")]
    MismatchedState(AssetPath),
}

pub trait CommandConsumer<C> {
    /// Apply a single command. If this generates an error,
    /// the state of `self` should *not* be observably changed.
    fn apply(&mut self, command: DoUndo<'_, C>) -> Result<(), CommandError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// A fresh, fieldless asset was placed at an empty path.
    Created { path: AssetPath, kind: AssetKind },
    /// The asset at `path` was removed. Its final state is kept for undo.
    Destroyed { path: AssetPath, asset: Asset },
    /// The assets at `moved`, which are `from` and paths below it, moved to the same places under `to`.
    /// Anything else already below `to` is left alone.
    Renamed {
        from: AssetPath,
        to: AssetPath,
        moved: Box<[AssetPath]>,
    },
    /// A field was written (`Some`) or cleared (`None`).
    FieldSet {
        path: AssetPath,
        field: FieldName,
        from: Option<Value>,
        to: Option<Value>,
    },
}
impl Command {
    /// The path the command primarily acts on. For renames, the source.
    #[must_use]
    pub fn path(&self) -> &AssetPath {
        match self {
            Self::Created { path, .. }
            | Self::Destroyed { path, .. }
            | Self::FieldSet { path, .. } => path,
            Self::Renamed { from, .. } => from,
        }
    }
}
impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created { path, kind } => write!(f, "create {path} ({kind})"),
            Self::Destroyed { path, asset } => write!(f, "destroy {path} ({})", asset.kind()),
            Self::Renamed { from, to, .. } => write!(f, "rename {from} -> {to}"),
            Self::FieldSet {
                path,
                field,
                to: Some(to),
                ..
            } => write!(f, "set {path}.{field} = {to}"),
            Self::FieldSet {
                path,
                field,
                to: None,
                ..
            } => write!(f, "clear {path}.{field}"),
        }
    }
}

#[derive(PartialEq, Eq, Debug)]
pub enum DoUndo<'c, T> {
    Do(&'c T),
    Undo(&'c T),
}
// Derive would require T: Clone, which is not needed for copying a reference.
impl<T> Clone for DoUndo<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for DoUndo<'_, T> {}

/// Apply a group of commands as one: in order when doing, in reverse order when undoing.
/// Stops at the first error, leaving the consumer with the commands before it applied.
pub fn apply_all<Consumer: CommandConsumer<Command>>(
    consumer: &mut Consumer,
    commands: &[Command],
    undo: bool,
) -> Result<(), CommandError> {
    if undo {
        commands
            .iter()
            .rev()
            .try_for_each(|command| consumer.apply(DoUndo::Undo(command)))
    } else {
        commands
            .iter()
            .try_for_each(|command| consumer.apply(DoUndo::Do(command)))
    }
}

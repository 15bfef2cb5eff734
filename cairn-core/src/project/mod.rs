//! # Project
//!
//! A project owns every asset, keyed by path, along with the undo history and the event channels.
//! [`Project`] is a cheap, clonable handle to this shared state.
//!
//! Reads ([`Project::resolve`], [`Project::enumerate`], [`Project::snapshot`]) see the state between changes,
//! never part-way through one. Changes go through [`Project::commit`], [`Project::undo`] and [`Project::redo`], all of which
//! share one path: stage, validate, write, then notify subscribers once the new state is visible.
//!
//! Only one change may be in progress at a time. A change attempted while another is still running -
//! typically from inside an event callback - is rejected with a `Reentrant` error and has no effect.

#[cfg(test)]
mod test;

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::asset::{AssetKind, AssetType, AssetView, FieldName};
use crate::commands::{self, CommandError};
use crate::events::{Appeared, Channels, Disappeared, FieldChanged, HistoryEvent, Watch};
use crate::history::{Entry, History, HistorySummary};
use crate::path::{AssetPath, PathError, ToAssetPath};
use crate::reference::Reference;
use crate::registry::KindRegistry;
use crate::state::{AssetGraph, Listing, Snapshot};
use crate::transaction::{ApplyError, TransactionBuilder};

pub type ProjectID = crate::id::UniqueID<Project>;

#[derive(Clone, Debug, Default)]
pub struct ProjectOptions {
    /// Kinds and fields to check changes against. `None` accepts anything.
    pub registry: Option<Arc<KindRegistry>>,
    /// Keep at most this many undo steps. `None` keeps everything.
    pub history_limit: Option<NonZeroUsize>,
}

/// Failure to step through history. Stepping past either end is not an error, see [`Project::undo`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    #[error("project is busy applying another change")]
    Reentrant,
    /// The recorded commands no longer match the project, meaning it was changed without going
    /// through history. Nothing was applied and the cursor did not move, but history can't be trusted from here.
    #[error("history entry {description:?} does not match the project")]
    Inconsistent {
        description: Arc<str>,
        #[source]
        source: CommandError,
    },
}

struct State {
    graph: AssetGraph,
    history: History,
    /// Bumped once for every change that went through.
    revision: u64,
}

struct Shared {
    id: ProjectID,
    state: parking_lot::RwLock<State>,
    /// Set while a change is being staged, written, and delivered.
    busy: AtomicBool,
    channels: Channels,
    registry: Option<Arc<KindRegistry>>,
}

/// Marks the project busy for as long as it lives.
struct BusyGuard<'p>(&'p AtomicBool);
impl<'p> BusyGuard<'p> {
    fn acquire(flag: &'p AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self(flag))
    }
}
impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct Project {
    shared: Arc<Shared>,
}
impl Default for Project {
    fn default() -> Self {
        Self::with_options(ProjectOptions::default())
    }
}
impl Project {
    /// An empty project that accepts any kind and keeps unlimited history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn with_options(options: ProjectOptions) -> Self {
        let ProjectOptions {
            registry,
            history_limit,
        } = options;
        Self {
            shared: Arc::new(Shared {
                id: ProjectID::default(),
                state: parking_lot::RwLock::new(State {
                    graph: AssetGraph::default(),
                    history: History::new(history_limit),
                    revision: 0,
                }),
                busy: AtomicBool::new(false),
                channels: Channels::default(),
                registry,
            }),
        }
    }
    #[must_use]
    pub fn id(&self) -> ProjectID {
        self.shared.id
    }
    /// A handle that doesn't keep the project alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakProject {
        WeakProject {
            id: self.shared.id,
            shared: Arc::downgrade(&self.shared),
        }
    }
    #[must_use]
    pub fn registry(&self) -> Option<&Arc<KindRegistry>> {
        self.shared.registry.as_ref()
    }
    /// Number of changes applied so far, including undos and redos.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.shared.state.read().revision
    }
    /// The whole project as it is now. Later changes are never reflected in it.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let state = self.shared.state.read();
        state.graph.snapshot(state.revision)
    }

    /// The asset at `path` if there is one and it is of `kind`. Malformed paths resolve to nothing.
    #[must_use]
    pub fn resolve(&self, path: impl ToAssetPath, kind: &AssetKind) -> Option<AssetView> {
        self.resolve_any(path).filter(|view| view.kind() == kind)
    }
    #[must_use]
    pub fn resolve_as<T: AssetType>(&self, path: impl ToAssetPath) -> Option<AssetView> {
        self.resolve(path, &T::KIND)
    }
    /// The asset at `path`, whatever its kind.
    #[must_use]
    pub fn resolve_any(&self, path: impl ToAssetPath) -> Option<AssetView> {
        let path = path.to_asset_path().ok()?;
        let state = self.shared.state.read();
        state
            .graph
            .get(&path)
            .map(|asset| AssetView::new(path, asset.clone()))
    }
    /// Everything at and below `prefix`, as it is now.
    pub fn enumerate(&self, prefix: impl ToAssetPath) -> Result<Listing, PathError> {
        let prefix = prefix.to_asset_path()?;
        Ok(Listing::new(self.snapshot(), prefix))
    }
    /// Immediate child slots of `parent`, or the top-level slots. See [`Snapshot::children`].
    #[must_use]
    pub fn children(&self, parent: Option<&AssetPath>) -> Vec<AssetPath> {
        self.snapshot().children(parent)
    }
    /// A typed, re-resolving handle to `path`. The path need not be occupied yet.
    pub fn reference(&self, path: impl ToAssetPath, kind: AssetKind) -> Result<Reference, PathError> {
        Ok(Reference::new(self.downgrade(), path.to_asset_path()?, kind))
    }
    pub fn reference_to<T: AssetType>(&self, path: impl ToAssetPath) -> Result<Reference, PathError> {
        self.reference(path, T::KIND)
    }

    /// Start recording a transaction for this project.
    #[must_use]
    pub fn build_transaction(&self, description: impl Into<String>) -> TransactionBuilder {
        TransactionBuilder::new(self.shared.id, description)
    }
    /// Build a transaction in `build` and commit it.
    pub fn transact(
        &self,
        description: impl Into<String>,
        build: impl FnOnce(&mut TransactionBuilder),
    ) -> Result<(), ApplyError> {
        let mut tx = self.build_transaction(description);
        build(&mut tx);
        self.commit(&tx)
    }
    /// Apply a transaction as one undoable step. Either every op applies, or none do and the error says why.
    ///
    /// Subscribers are notified before this returns.
    pub fn commit(&self, tx: &TransactionBuilder) -> Result<(), ApplyError> {
        self.change(tx, true)
    }
    /// Apply a transaction without recording it in history, for populating a project from elsewhere.
    /// Undo can't step back over it, and entries recorded before it may no longer apply.
    pub fn apply(&self, tx: &TransactionBuilder) -> Result<(), ApplyError> {
        self.change(tx, false)
    }
    fn change(&self, tx: &TransactionBuilder, record: bool) -> Result<(), ApplyError> {
        let Some(_busy) = BusyGuard::acquire(&self.shared.busy) else {
            log::warn!(
                "rejected reentrant transaction {:?} on {}",
                tx.description(),
                self.shared.id
            );
            return Err(ApplyError::Reentrant);
        };
        let (events, history) = {
            let mut guard = self.shared.state.write();
            let state = &mut *guard;
            let mut staging = state.graph.stage(self.shared.registry.as_deref());
            let commands = match tx.check(self.shared.id).and_then(|()| tx.stage(&mut staging)) {
                Ok(commands) => commands,
                Err(err) => {
                    log::warn!("rejected transaction {:?}: {err}", tx.description());
                    return Err(err);
                }
            };
            let changeset = staging.finish();
            state.graph.commit(&changeset);
            state.revision += 1;
            let description: Arc<str> = tx.description().into();
            log::debug!(
                "{} {:?} ({} commands) -> revision {}",
                if record { "committed" } else { "applied" },
                description,
                commands.len(),
                state.revision
            );
            let history = record.then(|| {
                state
                    .history
                    .push(Entry::new(description.clone(), commands.into_boxed_slice()));
                HistoryEvent::Committed {
                    description,
                    revision: state.revision,
                }
            });
            (changeset.into_events(), history)
        };
        // Lock released so callbacks may read, still busy so they may not write.
        self.shared.channels.deliver(&events, history.as_ref());
        Ok(())
    }

    /// Revert the most recent applied history entry. `Ok(false)` if there was nothing to undo.
    pub fn undo(&self) -> Result<bool, HistoryError> {
        self.step(true)
    }
    /// Reapply the most recently undone history entry. `Ok(false)` if there was nothing to redo.
    pub fn redo(&self) -> Result<bool, HistoryError> {
        self.step(false)
    }
    fn step(&self, undo: bool) -> Result<bool, HistoryError> {
        let Some(_busy) = BusyGuard::acquire(&self.shared.busy) else {
            log::warn!("rejected reentrant undo/redo on {}", self.shared.id);
            return Err(HistoryError::Reentrant);
        };
        let (events, history) = {
            let mut guard = self.shared.state.write();
            let state = &mut *guard;
            let entry = if undo {
                state.history.peek_undo()
            } else {
                state.history.peek_redo()
            };
            let Some(entry) = entry else {
                return Ok(false);
            };
            let description = entry.description().clone();
            // Replays what was already validated once, so the registry isn't consulted.
            let mut staging = state.graph.stage(None);
            if let Err(source) = commands::apply_all(&mut staging, entry.commands(), undo) {
                log::error!(
                    "history of {} is inconsistent, failed to {} {:?}: {source}",
                    self.shared.id,
                    if undo { "undo" } else { "redo" },
                    description
                );
                return Err(HistoryError::Inconsistent {
                    description,
                    source,
                });
            }
            let changeset = staging.finish();
            state.graph.commit(&changeset);
            state.revision += 1;
            let revision = state.revision;
            let history = if undo {
                state.history.step_back();
                HistoryEvent::Undone {
                    description,
                    revision,
                }
            } else {
                state.history.step_forward();
                HistoryEvent::Redone {
                    description,
                    revision,
                }
            };
            log::debug!("{history:?}");
            (changeset.into_events(), history)
        };
        self.shared.channels.deliver(&events, Some(&history));
        Ok(true)
    }
    #[must_use]
    pub fn history(&self) -> HistorySummary {
        self.shared.state.read().history.summary()
    }
    /// Forget every undo and redo step. The assets are untouched.
    pub fn clear_history(&self) {
        self.shared.state.write().history.clear();
    }

    /// Called with every asset that appears, after the change is visible.
    pub fn subscribe_appear(&self, callback: impl FnMut(&Appeared) + Send + 'static) -> Watch {
        self.shared.channels.appear.subscribe(None, callback)
    }
    /// Called with every asset that disappears, after the change is visible.
    pub fn subscribe_disappear(&self, callback: impl FnMut(&Disappeared) + Send + 'static) -> Watch {
        self.shared.channels.disappear.subscribe(None, callback)
    }
    /// Called with every field change, of any field.
    pub fn subscribe_field_changes(
        &self,
        callback: impl FnMut(&FieldChanged) + Send + 'static,
    ) -> Watch {
        self.shared.channels.fields.subscribe(None, callback)
    }
    /// Called with changes to fields named `field`, on any asset.
    pub fn subscribe_field(
        &self,
        field: impl Into<FieldName>,
        callback: impl FnMut(&FieldChanged) + Send + 'static,
    ) -> Watch {
        let field = field.into();
        self.shared.channels.fields.subscribe(
            Some(Box::new(move |change: &FieldChanged| change.field == field)),
            callback,
        )
    }
    /// Called once per commit, undo, and redo, after all asset events of that step.
    pub fn subscribe_history(&self, callback: impl FnMut(&HistoryEvent) + Send + 'static) -> Watch {
        self.shared.channels.history.subscribe(None, callback)
    }
}
impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("id", &self.shared.id)
            .field("revision", &self.revision())
            .finish_non_exhaustive()
    }
}

/// A project handle that does not keep it alive.
#[derive(Clone)]
pub struct WeakProject {
    id: ProjectID,
    shared: Weak<Shared>,
}
impl WeakProject {
    /// The id of the project, even if it no longer exists.
    #[must_use]
    pub fn id(&self) -> ProjectID {
        self.id
    }
    #[must_use]
    pub fn upgrade(&self) -> Option<Project> {
        self.shared.upgrade().map(|shared| Project { shared })
    }
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() != 0
    }
}
impl std::fmt::Debug for WeakProject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WeakProject").field(&self.id).finish()
    }
}

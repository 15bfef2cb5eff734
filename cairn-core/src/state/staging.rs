use std::collections::BTreeMap;
use std::sync::Arc;

use super::{within, Assets};
use crate::asset::{Asset, FieldName, Value};
use crate::commands::{Command, CommandConsumer, CommandError, DoUndo};
use crate::events::{Appeared, Disappeared, EventBatch, FieldChanged};
use crate::path::AssetPath;
use crate::registry::KindRegistry;

/// Pending changes layered over an immutable graph. Nothing here is visible to readers of the project
/// until [`crate::state::AssetGraph::commit`] is handed the finished [`Changeset`], so a staging session
/// that fails part-way is simply dropped.
pub struct Staging<'g> {
    base: &'g Assets,
    registry: Option<&'g KindRegistry>,
    /// `None` marks a removal.
    overlay: hashbrown::HashMap<AssetPath, Option<Arc<Asset>>>,
    /// Paths in the order they were first written.
    touched: Vec<AssetPath>,
    /// (path, field) in the order they were first written.
    touched_fields: Vec<(AssetPath, FieldName)>,
}

impl<'g> Staging<'g> {
    pub(super) fn new(base: &'g Assets, registry: Option<&'g KindRegistry>) -> Self {
        Self {
            base,
            registry,
            overlay: hashbrown::HashMap::new(),
            touched: Vec::new(),
            touched_fields: Vec::new(),
        }
    }
    #[must_use]
    pub fn registry(&self) -> Option<&'g KindRegistry> {
        self.registry
    }
    /// The asset at `path` as staged so far.
    #[must_use]
    pub fn get(&self, path: &AssetPath) -> Option<&Arc<Asset>> {
        match self.overlay.get(path) {
            Some(staged) => staged.as_ref(),
            None => self.base.get(path),
        }
    }
    /// The asset at `root` and everything below it as staged so far, in path order.
    #[must_use]
    pub fn subtree(&self, root: &AssetPath) -> Vec<(AssetPath, Arc<Asset>)> {
        let mut found: BTreeMap<AssetPath, Arc<Asset>> = within(self.base, root)
            .map(|(path, asset)| (path.clone(), asset.clone()))
            .collect();
        for (path, staged) in &self.overlay {
            if !path.is_within(root) {
                continue;
            }
            match staged {
                Some(asset) => {
                    found.insert(path.clone(), asset.clone());
                }
                None => {
                    found.remove(path);
                }
            }
        }
        found.into_iter().collect()
    }
    /// The first path a rename of `from` to `to` would land on while it is held by something else:
    /// `to` itself if it holds any asset, else the destination of a moving asset that is occupied
    /// by one that stays put. Unrelated assets below `to` don't block it.
    #[must_use]
    pub fn rename_blocker(&self, from: &AssetPath, to: &AssetPath) -> Option<AssetPath> {
        if from == to || self.get(to).is_some() {
            return Some(to.clone());
        }
        let moving = self.subtree(from);
        let sources: hashbrown::HashSet<&AssetPath> = moving.iter().map(|(path, _)| path).collect();
        moving
            .iter()
            .filter_map(|(path, _)| path.rebase(from, to))
            .find(|dest| self.get(dest).is_some() && !sources.contains(dest))
    }
    fn put(&mut self, path: AssetPath, asset: Option<Arc<Asset>>) {
        if !self.overlay.contains_key(&path) {
            self.touched.push(path.clone());
        }
        self.overlay.insert(path, asset);
    }
    fn touch_field(&mut self, path: &AssetPath, field: &FieldName) {
        if !self
            .touched_fields
            .iter()
            .any(|(p, f)| p == path && f == field)
        {
            self.touched_fields.push((path.clone(), field.clone()));
        }
    }
    fn insert(&mut self, path: &AssetPath, asset: Asset) -> Result<(), CommandError> {
        if self.get(path).is_some() {
            return Err(CommandError::Occupied(path.clone()));
        }
        self.put(path.clone(), Some(Arc::new(asset)));
        Ok(())
    }
    /// Remove the asset at `path`, which must be equal to `expected`.
    fn remove(&mut self, path: &AssetPath, expected: &Asset) -> Result<(), CommandError> {
        let asset = self
            .get(path)
            .ok_or_else(|| CommandError::Missing(path.clone()))?;
        if **asset != *expected {
            return Err(CommandError::MismatchedState(path.clone()));
        }
        self.put(path.clone(), None);
        Ok(())
    }
    /// Move exactly `sources`, each from its place below `from` to the same place below `to`.
    fn move_paths(
        &mut self,
        from: &AssetPath,
        to: &AssetPath,
        sources: impl IntoIterator<Item = AssetPath>,
    ) -> Result<(), CommandError> {
        let mut moving = Vec::new();
        for source in sources {
            let asset = self
                .get(&source)
                .cloned()
                .ok_or_else(|| CommandError::Missing(source.clone()))?;
            let dest = source
                .rebase(from, to)
                .ok_or_else(|| CommandError::MismatchedState(source.clone()))?;
            moving.push((source, dest, asset));
        }
        let sources: hashbrown::HashSet<&AssetPath> =
            moving.iter().map(|(source, _, _)| source).collect();
        if let Some((_, dest, _)) = moving
            .iter()
            .find(|(_, dest, _)| self.get(dest).is_some() && !sources.contains(dest))
        {
            return Err(CommandError::Occupied(dest.clone()));
        }
        drop(sources);
        // Clear every source first, the destinations may overlap them.
        for (source, _, _) in &moving {
            self.put(source.clone(), None);
        }
        for (_, dest, asset) in moving {
            self.put(dest, Some(asset));
        }
        Ok(())
    }
    fn write_field(
        &mut self,
        path: &AssetPath,
        field: &FieldName,
        from: Option<&Value>,
        to: Option<&Value>,
    ) -> Result<(), CommandError> {
        let Some(asset) = self.get(path) else {
            return Err(CommandError::Missing(path.clone()));
        };
        if asset.field(field) != from {
            return Err(CommandError::MismatchedState(path.clone()));
        }
        let mut asset = asset.clone();
        Arc::make_mut(&mut asset).put_field(field.clone(), to.cloned());
        self.put(path.clone(), Some(asset));
        self.touch_field(path, field);
        Ok(())
    }
    /// Net writes and the events describing them: only the difference between the base and the
    /// final staged state is reported, not the steps taken in between.
    #[must_use]
    pub fn finish(self) -> Changeset {
        let mut events = EventBatch::default();
        for path in &self.touched {
            let before = self.base.get(path);
            let after = self.overlay.get(path).and_then(Option::as_ref);
            match (before, after) {
                (None, None) => (),
                (None, Some(after)) => events.appeared.push(Appeared {
                    path: path.clone(),
                    asset: after.clone(),
                }),
                (Some(before), None) => events.disappeared.push(Disappeared {
                    path: path.clone(),
                    asset: before.clone(),
                }),
                (Some(before), Some(after)) if before.kind() != after.kind() => {
                    events.disappeared.push(Disappeared {
                        path: path.clone(),
                        asset: before.clone(),
                    });
                    events.appeared.push(Appeared {
                        path: path.clone(),
                        asset: after.clone(),
                    });
                }
                (Some(before), Some(after)) => {
                    if !Arc::ptr_eq(before, after) {
                        self.diff_fields(path, before, after, &mut events.changed);
                    }
                }
            }
        }
        Changeset {
            writes: self.overlay.into_iter().collect(),
            events,
        }
    }
    /// Fields explicitly written come first in the order they were written, then any other differences by name.
    fn diff_fields(
        &self,
        path: &AssetPath,
        before: &Asset,
        after: &Asset,
        out: &mut Vec<FieldChanged>,
    ) {
        let mut report = |field: &FieldName| {
            let (old, new) = (before.field(field), after.field(field));
            if old != new {
                out.push(FieldChanged {
                    path: path.clone(),
                    kind: after.kind().clone(),
                    field: field.clone(),
                    old: old.cloned(),
                    new: new.cloned(),
                });
            }
        };
        let written: Vec<&FieldName> = self
            .touched_fields
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, field)| field)
            .collect();
        for field in &written {
            report(*field);
        }

        let others: std::collections::BTreeSet<&FieldName> = before
            .fields()
            .chain(after.fields())
            .map(|(field, _)| field)
            .filter(|field| !written.contains(field))
            .collect();
        for field in others {
            report(field);
        }
    }
}

impl CommandConsumer<Command> for Staging<'_> {
    fn apply(&mut self, command: DoUndo<'_, Command>) -> Result<(), CommandError> {
        match command {
            DoUndo::Do(Command::Created { path, kind }) => self.insert(path, Asset::new(kind.clone())),
            DoUndo::Undo(Command::Created { path, kind }) => {
                // Creation is only undone if the asset has been returned to its freshly created state.
                self.remove(path, &Asset::new(kind.clone()))
            }
            DoUndo::Do(Command::Destroyed { path, asset }) => self.remove(path, asset),
            DoUndo::Undo(Command::Destroyed { path, asset }) => self.insert(path, asset.clone()),
            DoUndo::Do(Command::Renamed { from, to, moved }) => {
                self.move_paths(from, to, moved.iter().cloned())
            }
            DoUndo::Undo(Command::Renamed { from, to, moved }) => self.move_paths(
                to,
                from,
                moved.iter().filter_map(|path| path.rebase(from, to)),
            ),
            DoUndo::Do(Command::FieldSet {
                path,
                field,
                from,
                to,
            })
            | DoUndo::Undo(Command::FieldSet {
                path,
                field,
                from: to,
                to: from,
            }) => self.write_field(path, field, from.as_ref(), to.as_ref()),
        }
    }
}

/// The finished result of a staging session.
#[derive(Debug)]
pub struct Changeset {
    writes: Vec<(AssetPath, Option<Arc<Asset>>)>,
    events: EventBatch,
}
impl Changeset {
    pub(crate) fn writes(&self) -> &[(AssetPath, Option<Arc<Asset>>)] {
        &self.writes
    }
    #[must_use]
    pub fn events(&self) -> &EventBatch {
        &self.events
    }
    #[must_use]
    pub fn into_events(self) -> EventBatch {
        self.events
    }
}

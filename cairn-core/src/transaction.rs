//! # Transactions
//!
//! A [`TransactionBuilder`] records what the caller intends to do to a project, without touching it. Nothing is
//! checked or changed until it is handed to [`crate::project::Project::commit`], at which point every operation is
//! validated in order against the live state and the whole lot is either applied or rejected as one.
//!
//! Builders are plain data, so any number of speculative transactions can be assembled and thrown away.

use crate::asset::{Asset, AssetKind, AssetType, FieldName, Value};
use crate::commands::{Command, CommandConsumer, CommandError, DoUndo};
use crate::path::{AssetPath, PathError, ToAssetPath};
use crate::project::ProjectID;
use crate::registry::SchemaError;
use crate::state::Staging;

/// Why a transaction was rejected. In every case, the project is left exactly as it was.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("path {0} is already occupied")]
    PathConflict(AssetPath),
    #[error("no asset at {0}")]
    NotFound(AssetPath),
    #[error("asset at {path} is a {found}, expected {expected}")]
    TypeMismatch {
        path: AssetPath,
        expected: AssetKind,
        found: AssetKind,
    },
    #[error(transparent)]
    InvalidPath(#[from] PathError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("transaction has no operations")]
    EmptyTransaction,
    #[error("transaction has no description")]
    MissingDescription,
    #[error("transaction was built for another project")]
    ForeignTransaction,
    #[error("project is busy applying another change")]
    Reentrant,
    #[error("command failed to apply: {0}")]
    Command(#[from] CommandError),
}

/// One recorded intent. Paths are already parsed.
///
/// Ops with an `expect`ed kind fail with [`ApplyError::TypeMismatch`] if the asset they act on
/// turns out to be of another kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Create {
        path: AssetPath,
        kind: AssetKind,
    },
    /// Removes exactly the asset at `path`. Assets below it are left in place.
    Destroy {
        path: AssetPath,
        expect: Option<AssetKind>,
    },
    /// Removes the asset at `path` and everything below it.
    DestroyTree {
        path: AssetPath,
        expect: Option<AssetKind>,
    },
    /// Moves the asset at `from` and everything below it.
    Rename {
        from: AssetPath,
        to: AssetPath,
        expect: Option<AssetKind>,
    },
    /// `None` clears the field.
    SetField {
        path: AssetPath,
        field: FieldName,
        value: Option<Value>,
        expect: Option<AssetKind>,
    },
}
impl Op {
    /// Require the asset acted on to be of `kind`. No effect on [`Op::Create`], which names its kind already.
    #[must_use]
    pub fn expecting(mut self, kind: AssetKind) -> Self {
        match &mut self {
            Self::Create { .. } => (),
            Self::Destroy { expect, .. }
            | Self::DestroyTree { expect, .. }
            | Self::Rename { expect, .. }
            | Self::SetField { expect, .. } => *expect = Some(kind),
        }
        self
    }
    #[must_use]
    pub fn path(&self) -> &AssetPath {
        match self {
            Self::Create { path, .. }
            | Self::Destroy { path, .. }
            | Self::DestroyTree { path, .. }
            | Self::SetField { path, .. } => path,
            Self::Rename { from, .. } => from,
        }
    }
}
impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create { path, kind } => write!(f, "create {path} ({kind})"),
            Self::Destroy { path, .. } => write!(f, "destroy {path}"),
            Self::DestroyTree { path, .. } => write!(f, "destroy {path} and below"),
            Self::Rename { from, to, .. } => write!(f, "rename {from} to {to}"),
            Self::SetField {
                path,
                field,
                value: Some(value),
                ..
            } => write!(f, "set {path}.{field} to {value}"),
            Self::SetField {
                path,
                field,
                value: None,
                ..
            } => write!(f, "clear {path}.{field}"),
        }
    }
}

/// Records operations against one project. See the [module docs](self).
#[derive(Clone, Debug)]
pub struct TransactionBuilder {
    project: ProjectID,
    description: String,
    ops: smallvec::SmallVec<[Op; 1]>,
    /// Problems found while recording, reported on commit. Only the first is kept.
    deferred: Option<ApplyError>,
}

impl TransactionBuilder {
    pub(crate) fn new(project: ProjectID, description: impl Into<String>) -> Self {
        Self {
            project,
            description: description.into(),
            ops: smallvec::SmallVec::new(),
            deferred: None,
        }
    }
    /// The project this transaction may be committed to.
    #[must_use]
    pub fn project(&self) -> ProjectID {
        self.project
    }
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
    /// Replace the description.
    pub fn describe(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = description.into();
        self
    }
    #[must_use]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
    /// Remove every recorded op and any deferred error, keeping the description.
    pub fn clear(&mut self) {
        self.ops.clear();
        self.deferred = None;
    }
    pub fn create(&mut self, path: impl ToAssetPath, kind: AssetKind) -> &mut Self {
        if let Some(path) = self.parse(path) {
            self.push(Op::Create { path, kind });
        }
        self
    }
    pub fn create_as<T: AssetType>(&mut self, path: impl ToAssetPath) -> &mut Self {
        self.create(path, T::KIND)
    }
    pub fn destroy(&mut self, path: impl ToAssetPath) -> &mut Self {
        if let Some(path) = self.parse(path) {
            self.push(Op::Destroy { path, expect: None });
        }
        self
    }
    pub fn destroy_tree(&mut self, path: impl ToAssetPath) -> &mut Self {
        if let Some(path) = self.parse(path) {
            self.push(Op::DestroyTree { path, expect: None });
        }
        self
    }
    pub fn rename(&mut self, from: impl ToAssetPath, to: impl ToAssetPath) -> &mut Self {
        if let (Some(from), Some(to)) = (self.parse(from), self.parse(to)) {
            self.push(Op::Rename {
                from,
                to,
                expect: None,
            });
        }
        self
    }
    pub fn set_field(
        &mut self,
        path: impl ToAssetPath,
        field: impl Into<FieldName>,
        value: impl Into<Value>,
    ) -> &mut Self {
        if let Some(path) = self.parse(path) {
            self.push(Op::SetField {
                path,
                field: field.into(),
                value: Some(value.into()),
                expect: None,
            });
        }
        self
    }
    pub fn clear_field(&mut self, path: impl ToAssetPath, field: impl Into<FieldName>) -> &mut Self {
        if let Some(path) = self.parse(path) {
            self.push(Op::SetField {
                path,
                field: field.into(),
                value: None,
                expect: None,
            });
        }
        self
    }
    /// Record an already constructed op.
    pub fn push(&mut self, op: Op) -> &mut Self {
        self.ops.push(op);
        self
    }
    /// Record a problem to be reported when committing.
    pub(crate) fn defer(&mut self, error: ApplyError) {
        self.deferred.get_or_insert(error);
    }
    fn parse(&mut self, path: impl ToAssetPath) -> Option<AssetPath> {
        match path.to_asset_path() {
            Ok(path) => Some(path),
            Err(error) => {
                self.defer(error.into());
                None
            }
        }
    }
    /// Everything that can be checked without looking at the project's state.
    pub(crate) fn check(&self, project: ProjectID) -> Result<(), ApplyError> {
        if self.project != project {
            return Err(ApplyError::ForeignTransaction);
        }
        if let Some(deferred) = &self.deferred {
            return Err(deferred.clone());
        }
        if self.description.trim().is_empty() {
            return Err(ApplyError::MissingDescription);
        }
        if self.ops.is_empty() {
            return Err(ApplyError::EmptyTransaction);
        }
        Ok(())
    }
    /// Validate and apply every op in order, returning the commands that did it.
    /// On error, `staging` should be discarded.
    pub(crate) fn stage(&self, staging: &mut Staging<'_>) -> Result<Vec<Command>, ApplyError> {
        let mut commands = Vec::with_capacity(self.ops.len());
        for op in &self.ops {
            plan(op, staging, &mut commands)?;
        }
        Ok(commands)
    }
}

fn check_expected(path: &AssetPath, asset: &Asset, expect: Option<&AssetKind>) -> Result<(), ApplyError> {
    match expect {
        Some(expected) if expected != asset.kind() => Err(ApplyError::TypeMismatch {
            path: path.clone(),
            expected: expected.clone(),
            found: asset.kind().clone(),
        }),
        _ => Ok(()),
    }
}

/// Turn one op into commands against the staged state, applying each as it is produced so later ops see it.
fn plan(op: &Op, staging: &mut Staging<'_>, out: &mut Vec<Command>) -> Result<(), ApplyError> {
    let first = out.len();
    match op {
        Op::Create { path, kind } => {
            if let Some(registry) = staging.registry() {
                registry.check_kind(kind)?;
            }
            if staging.get(path).is_some() {
                return Err(ApplyError::PathConflict(path.clone()));
            }
            out.push(Command::Created {
                path: path.clone(),
                kind: kind.clone(),
            });
        }
        Op::Destroy { path, expect } => {
            let asset = staging
                .get(path)
                .ok_or_else(|| ApplyError::NotFound(path.clone()))?;
            check_expected(path, asset, expect.as_ref())?;
            out.push(Command::Destroyed {
                path: path.clone(),
                asset: (**asset).clone(),
            });
        }
        Op::DestroyTree { path, expect } => {
            let asset = staging
                .get(path)
                .ok_or_else(|| ApplyError::NotFound(path.clone()))?;
            check_expected(path, asset, expect.as_ref())?;
            // Descendants sort after their ancestors, so reversed order removes leaves first.
            out.extend(
                staging
                    .subtree(path)
                    .into_iter()
                    .rev()
                    .map(|(path, asset)| Command::Destroyed {
                        path,
                        asset: (*asset).clone(),
                    }),
            );
        }
        Op::Rename { from, to, expect } => {
            let asset = staging
                .get(from)
                .ok_or_else(|| ApplyError::NotFound(from.clone()))?;
            check_expected(from, asset, expect.as_ref())?;
            if let Some(blocker) = staging.rename_blocker(from, to) {
                return Err(ApplyError::PathConflict(blocker));
            }
            out.push(Command::Renamed {
                from: from.clone(),
                to: to.clone(),
                moved: staging
                    .subtree(from)
                    .into_iter()
                    .map(|(path, _)| path)
                    .collect(),
            });
        }
        Op::SetField {
            path,
            field,
            value,
            expect,
        } => {
            let asset = staging
                .get(path)
                .ok_or_else(|| ApplyError::NotFound(path.clone()))?;
            check_expected(path, asset, expect.as_ref())?;
            if let Some(registry) = staging.registry() {
                registry.check_field(asset.kind(), field, value.as_ref())?;
            }
            out.push(Command::FieldSet {
                path: path.clone(),
                field: field.clone(),
                from: asset.field(field).cloned(),
                to: value.clone(),
            });
        }
    }
    for command in &out[first..] {
        log::trace!("planned {command}");
        staging.apply(DoUndo::Do(command))?;
    }
    Ok(())
}

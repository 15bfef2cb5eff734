//! # References
//!
//! A [`Reference`] names a slot in a project and the kind expected there. It holds no asset and caches
//! nothing: every access looks the path up again, so a reference is only as current as the moment it is used.
//! Whoever keeps one around for long should re-check it after each change they are told about.

use crate::asset::{AssetKind, AssetType, AssetView, FieldName, Value};
use crate::path::{AssetPath, PathError, ToAssetPath};
use crate::project::{Project, ProjectID, WeakProject};
use crate::transaction::{ApplyError, Op, TransactionBuilder};

#[derive(Clone)]
pub struct Reference {
    project: WeakProject,
    path: AssetPath,
    kind: AssetKind,
}
impl Reference {
    pub(crate) fn new(project: WeakProject, path: AssetPath, kind: AssetKind) -> Self {
        Self {
            project,
            path,
            kind,
        }
    }
    #[must_use]
    pub fn path(&self) -> &AssetPath {
        &self.path
    }
    #[must_use]
    pub fn kind(&self) -> &AssetKind {
        &self.kind
    }
    #[must_use]
    pub fn project_id(&self) -> ProjectID {
        self.project.id()
    }
    /// The project, if it still exists.
    #[must_use]
    pub fn project(&self) -> Option<Project> {
        self.project.upgrade()
    }
    #[must_use]
    pub fn is<T: AssetType>(&self) -> bool {
        self.kind == T::KIND
    }
    /// The asset currently at the path, if it is of the expected kind.
    #[must_use]
    pub fn get(&self) -> Option<AssetView> {
        self.project.upgrade()?.resolve(&self.path, &self.kind)
    }
    /// Whether the path currently holds an asset of the expected kind.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.get().is_some()
    }
    /// Current value of a field, if the reference is ok and the field is set.
    #[must_use]
    pub fn field(&self, name: &FieldName) -> Option<Value> {
        self.get()?.field(name).cloned()
    }
    /// A reference to the slot `segment` below this one.
    pub fn child(&self, segment: &str, kind: AssetKind) -> Result<Self, PathError> {
        Ok(Self::new(self.project.clone(), self.path.join(segment)?, kind))
    }
    pub fn child_as<T: AssetType>(&self, segment: &str) -> Result<Self, PathError> {
        self.child(segment, T::KIND)
    }
    /// The same kind, at another path. Useful after recording a rename.
    pub fn retarget(&self, path: impl ToAssetPath) -> Result<Self, PathError> {
        Ok(Self::new(
            self.project.clone(),
            path.to_asset_path()?,
            self.kind.clone(),
        ))
    }

    fn record<'t>(&self, tx: &'t mut TransactionBuilder, op: Op) -> &'t mut TransactionBuilder {
        if tx.project() == self.project.id() {
            tx.push(op.expecting(self.kind.clone()));
        } else {
            tx.defer(ApplyError::ForeignTransaction);
        }
        tx
    }
    /// Record creating the referenced asset.
    pub fn create<'t>(&self, tx: &'t mut TransactionBuilder) -> &'t mut TransactionBuilder {
        self.record(
            tx,
            Op::Create {
                path: self.path.clone(),
                kind: self.kind.clone(),
            },
        )
    }
    pub fn destroy<'t>(&self, tx: &'t mut TransactionBuilder) -> &'t mut TransactionBuilder {
        self.record(
            tx,
            Op::Destroy {
                path: self.path.clone(),
                expect: None,
            },
        )
    }
    pub fn destroy_tree<'t>(&self, tx: &'t mut TransactionBuilder) -> &'t mut TransactionBuilder {
        self.record(
            tx,
            Op::DestroyTree {
                path: self.path.clone(),
                expect: None,
            },
        )
    }
    /// Record moving the referenced asset. The reference itself keeps pointing at the old path, see [`Self::retarget`].
    pub fn rename<'t>(
        &self,
        tx: &'t mut TransactionBuilder,
        to: impl ToAssetPath,
    ) -> &'t mut TransactionBuilder {
        match to.to_asset_path() {
            Ok(to) => self.record(
                tx,
                Op::Rename {
                    from: self.path.clone(),
                    to,
                    expect: None,
                },
            ),
            Err(error) => {
                tx.defer(error.into());
                tx
            }
        }
    }
    pub fn set<'t>(
        &self,
        tx: &'t mut TransactionBuilder,
        field: impl Into<FieldName>,
        value: impl Into<Value>,
    ) -> &'t mut TransactionBuilder {
        self.record(
            tx,
            Op::SetField {
                path: self.path.clone(),
                field: field.into(),
                value: Some(value.into()),
                expect: None,
            },
        )
    }
    pub fn clear<'t>(
        &self,
        tx: &'t mut TransactionBuilder,
        field: impl Into<FieldName>,
    ) -> &'t mut TransactionBuilder {
        self.record(
            tx,
            Op::SetField {
                path: self.path.clone(),
                field: field.into(),
                value: None,
                expect: None,
            },
        )
    }
}

// Identity is the slot, the expected kind is a property of the handle.
impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.project.id() == other.project.id() && self.path == other.path
    }
}
impl Eq for Reference {}
impl PartialOrd for Reference {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Reference {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.project
            .id()
            .cmp(&other.project.id())
            .then_with(|| self.path.cmp(&other.path))
    }
}
impl std::hash::Hash for Reference {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.project.id().hash(state);
        self.path.hash(state);
    }
}
impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.path, self.kind)
    }
}
impl std::fmt::Debug for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reference")
            .field("project", &self.project.id())
            .field("path", &self.path)
            .field("kind", &self.kind)
            .finish()
    }
}

//! # Paths
//!
//! Every asset lives at a slash-delimited path, unique within its project. Parent/child relations
//! are implied by prefixes: `"a/b"` is a child slot of `"a"`, whether or not `"a"` holds an asset itself.

use std::sync::Arc;

pub const SEPARATOR: char = '/';

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("path {path:?} has an empty segment at index {index}")]
    EmptySegment { path: String, index: usize },
}

/// A validated path. Cheap to clone.
///
/// Ordering is plain string ordering, under which all descendants of a path are contiguous.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetPath(Arc<str>);

impl AssetPath {
    pub fn parse(text: &str) -> Result<Self, PathError> {
        Self::validate(text)?;
        Ok(Self(text.into()))
    }
    fn validate(text: &str) -> Result<(), PathError> {
        if text.is_empty() {
            return Err(PathError::Empty);
        }
        match text.split(SEPARATOR).position(str::is_empty) {
            Some(index) => Err(PathError::EmptySegment {
                path: text.to_owned(),
                index,
            }),
            None => Ok(()),
        }
    }
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
    /// The child slot `segment` below this path. `segment` may itself contain separators.
    pub fn join(&self, segment: &str) -> Result<Self, PathError> {
        let joined = format!("{}{SEPARATOR}{segment}", self.0);
        Self::validate(&joined)?;
        Ok(Self(joined.into()))
    }
    /// The enclosing slot, or `None` for a top-level path.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0
            .rsplit_once(SEPARATOR)
            .map(|(parent, _)| Self(parent.into()))
    }
    /// The last segment.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or(&self.0)
    }
    pub fn segments(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.split(SEPARATOR)
    }
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments().count()
    }
    /// True if `self` is `prefix` or lies below it.
    #[must_use]
    pub fn is_within(&self, prefix: &AssetPath) -> bool {
        match self.0.strip_prefix(&*prefix.0) {
            Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
            None => false,
        }
    }
    /// True if `self` lies strictly below `ancestor`.
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &AssetPath) -> bool {
        self != ancestor && self.is_within(ancestor)
    }
    /// Substitute the prefix `from` with `to`. `None` if `self` is not within `from`.
    #[must_use]
    pub fn rebase(&self, from: &AssetPath, to: &AssetPath) -> Option<Self> {
        if !self.is_within(from) {
            return None;
        }
        let rest = &self.0[from.0.len()..];
        if rest.is_empty() {
            Some(to.clone())
        } else {
            Some(Self(format!("{}{rest}", to.0).into()))
        }
    }
    /// The text every descendant starts with.
    pub(crate) fn descendant_prefix(&self) -> String {
        format!("{}{SEPARATOR}", self.0)
    }
}

impl std::borrow::Borrow<str> for AssetPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}
impl AsRef<str> for AssetPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl std::str::FromStr for AssetPath {
    type Err = PathError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
impl TryFrom<&str> for AssetPath {
    type Error = PathError;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}
impl std::fmt::Display for AssetPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
impl std::fmt::Debug for AssetPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AssetPath({:?})", &*self.0)
    }
}

/// Anything an interface accepts as a path: text is parsed, paths are passed through.
pub trait ToAssetPath {
    fn to_asset_path(&self) -> Result<AssetPath, PathError>;
}
impl ToAssetPath for str {
    fn to_asset_path(&self) -> Result<AssetPath, PathError> {
        AssetPath::parse(self)
    }
}
impl ToAssetPath for String {
    fn to_asset_path(&self) -> Result<AssetPath, PathError> {
        AssetPath::parse(self)
    }
}
impl ToAssetPath for AssetPath {
    fn to_asset_path(&self) -> Result<AssetPath, PathError> {
        Ok(self.clone())
    }
}
impl<T: ToAssetPath + ?Sized> ToAssetPath for &T {
    fn to_asset_path(&self) -> Result<AssetPath, PathError> {
        (**self).to_asset_path()
    }
}

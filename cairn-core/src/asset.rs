//! # Assets
//!
//! An asset is a typed bag of fields living at a path. The set of kinds is open: the store only ever
//! compares kind tags, what a kind means is up to whoever registers it (see [`crate::registry`]).

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::path::AssetPath;
use crate::util::FiniteF64;

/// Tag selecting the kind of an asset. Opaque to the store.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetKind(Cow<'static, str>);
impl AssetKind {
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
impl std::fmt::Debug for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AssetKind({:?})", &*self.0)
    }
}

/// Implemented by caller-side marker types to bind a kind at compile time.
///
/// ```
/// # use cairn_core::asset::{AssetKind, AssetType};
/// struct Mesh;
/// impl AssetType for Mesh {
///     const KIND: AssetKind = AssetKind::from_static("mesh");
/// }
/// ```
pub trait AssetType {
    const KIND: AssetKind;
}

/// Name of a field within an asset.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldName(Cow<'static, str>);
impl FieldName {
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<&'static str> for FieldName {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}
impl From<String> for FieldName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
impl std::fmt::Debug for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FieldName({:?})", &*self.0)
    }
}

/// A field payload. Large payloads are shared, so cloning a value (and thus recording it into history) is cheap.
#[derive(Clone, Debug, PartialEq, Eq, Hash, strum::EnumDiscriminants)]
#[strum_discriminants(name(ValueType), derive(Hash, strum::AsRefStr, strum::EnumIter))]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(FiniteF64),
    Text(Arc<str>),
    Bytes(Arc<[u8]>),
    /// The path of another slot. Stored as plain data: it is not kept in sync by renames.
    Path(AssetPath),
    List(Arc<[Value]>),
}
impl Value {
    #[must_use]
    pub fn ty(&self) -> ValueType {
        self.into()
    }
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(f.get()),
            _ => None,
        }
    }
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
    #[must_use]
    pub fn as_path(&self) -> Option<&AssetPath> {
        match self {
            Self::Path(p) => Some(p),
            _ => None,
        }
    }
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }
}
impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}
impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}
impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}
impl From<FiniteF64> for Value {
    fn from(value: FiniteF64) -> Self {
        Self::Float(value)
    }
}
impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}
impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value.into())
    }
}
impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value.into())
    }
}
impl From<AssetPath> for Value {
    fn from(value: AssetPath) -> Self {
        Self::Path(value)
    }
}
impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value.into())
    }
}
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(t) => write!(f, "{:?}", &**t),
            Self::Bytes(bytes) => {
                f.write_str("0x")?;
                bytes.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
            }
            Self::Path(p) => write!(f, "@{p}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Asset {
    kind: AssetKind,
    fields: BTreeMap<FieldName, Value>,
}
impl Asset {
    /// A fresh asset with no fields set.
    #[must_use]
    pub fn new(kind: AssetKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
        }
    }
    #[must_use]
    pub fn kind(&self) -> &AssetKind {
        &self.kind
    }
    #[must_use]
    pub fn field(&self, name: &FieldName) -> Option<&Value> {
        self.fields.get(name)
    }
    pub fn fields(&self) -> impl Iterator<Item = (&FieldName, &Value)> + '_ {
        self.fields.iter()
    }
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
    /// Set or clear a field, returning the previous value.
    // Crate private - assets are only ever modified through commands!
    pub(crate) fn put_field(&mut self, name: FieldName, value: Option<Value>) -> Option<Value> {
        match value {
            Some(value) => self.fields.insert(name, value),
            None => self.fields.remove(&name),
        }
    }
}

/// A detached, immutable view of an asset as it was when it was looked up.
///
/// Holding a view does not keep anything alive in the project, and later transactions are never
/// reflected in it - look the path up again (or use a [`crate::reference::Reference`]) for fresh data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetView {
    path: AssetPath,
    asset: Arc<Asset>,
}
impl AssetView {
    pub(crate) fn new(path: AssetPath, asset: Arc<Asset>) -> Self {
        Self { path, asset }
    }
    #[must_use]
    pub fn path(&self) -> &AssetPath {
        &self.path
    }
    #[must_use]
    pub fn asset(&self) -> &Asset {
        &self.asset
    }
    #[must_use]
    pub fn kind(&self) -> &AssetKind {
        self.asset.kind()
    }
    #[must_use]
    pub fn field(&self, name: &FieldName) -> Option<&Value> {
        self.asset.field(name)
    }
    /// Check the view against a compile-time kind.
    #[must_use]
    pub fn is<T: AssetType>(&self) -> bool {
        *self.kind() == T::KIND
    }
}

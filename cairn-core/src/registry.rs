//! # Kind registry
//!
//! Which kinds exist and which fields they carry is decided outside the store. A project given a registry
//! checks creations and field writes against it; a project without one accepts anything.

use crate::asset::{AssetKind, FieldName, Value, ValueType};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: FieldName,
    pub ty: ValueType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KindSchema {
    kind: AssetKind,
    /// Human readable, for listings.
    pub description: String,
    fields: Vec<FieldSchema>,
}
impl KindSchema {
    #[must_use]
    pub fn new(kind: AssetKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            fields: Vec::new(),
        }
    }
    /// Declare a field. Declaring the same name twice replaces the earlier type.
    #[must_use]
    pub fn field(mut self, name: impl Into<FieldName>, ty: ValueType) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|field| field.name == name) {
            Some(existing) => existing.ty = ty,
            None => self.fields.push(FieldSchema { name, ty }),
        }
        self
    }
    #[must_use]
    pub fn kind(&self) -> &AssetKind {
        &self.kind
    }
    #[must_use]
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }
    #[must_use]
    pub fn field_type(&self, name: &FieldName) -> Option<ValueType> {
        self.fields
            .iter()
            .find(|field| &field.name == name)
            .map(|field| field.ty)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("kind {0} is not registered")]
    UnknownKind(AssetKind),
    #[error("kind {kind} has no field {field}")]
    UnknownField { kind: AssetKind, field: FieldName },
    #[error("field {kind}.{field} holds {expected}, got {found}")]
    FieldType {
        kind: AssetKind,
        field: FieldName,
        expected: ValueType,
        found: ValueType,
    },
}

#[derive(Clone, Debug, Default)]
pub struct KindRegistry {
    kinds: hashbrown::HashMap<AssetKind, KindSchema>,
}
impl KindRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Register a kind, returning the schema it replaced, if any.
    pub fn register(&mut self, schema: KindSchema) -> Option<KindSchema> {
        self.kinds.insert(schema.kind.clone(), schema)
    }
    #[must_use]
    pub fn with(mut self, schema: KindSchema) -> Self {
        self.register(schema);
        self
    }
    #[must_use]
    pub fn get(&self, kind: &AssetKind) -> Option<&KindSchema> {
        self.kinds.get(kind)
    }
    /// All schemas, sorted by kind.
    #[must_use]
    pub fn schemas(&self) -> Vec<&KindSchema> {
        let mut schemas: Vec<_> = self.kinds.values().collect();
        schemas.sort_unstable_by(|a, b| a.kind.cmp(&b.kind));
        schemas
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
    pub fn check_kind(&self, kind: &AssetKind) -> Result<&KindSchema, SchemaError> {
        self.get(kind)
            .ok_or_else(|| SchemaError::UnknownKind(kind.clone()))
    }
    /// Check that `value` may be written to `field` of a `kind` asset. Clearing (`None`) only needs the field to exist.
    pub fn check_field(
        &self,
        kind: &AssetKind,
        field: &FieldName,
        value: Option<&Value>,
    ) -> Result<(), SchemaError> {
        let schema = self.check_kind(kind)?;
        let expected = schema
            .field_type(field)
            .ok_or_else(|| SchemaError::UnknownField {
                kind: kind.clone(),
                field: field.clone(),
            })?;
        match value.map(Value::ty) {
            Some(found) if found != expected => Err(SchemaError::FieldType {
                kind: kind.clone(),
                field: field.clone(),
                expected,
                found,
            }),
            _ => Ok(()),
        }
    }
}

//! Schema Types - Synthesized transfer-object types
//!
//! A [`SchemaType`] describes the fields a materialized record carries. Types
//! are built by the [`SchemaSynthesizer`] in two stages: a scalar-only
//! `Partial` stub is made visible to recursive relationship resolution, then
//! promoted to the `Complete` type that includes relationship fields.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::value::ScalarType;

pub mod registry;
pub mod synthesizer;
pub mod validation;


pub use registry::SchemaRegistry;
pub use synthesizer::SchemaSynthesizer;
pub use validation::{ValidatedObject, ValidatedValue};

/// How validation treats record fields the schema does not declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnknownFields {
    #[default]
    Ignore,
    Reject,
}

/// Validation behavior attached to a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub unknown_fields: UnknownFields,
    /// Parse text into typed scalars (date-times, uuids, intervals)
    pub coerce: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            unknown_fields: UnknownFields::Ignore,
            coerce: true,
        }
    }
}

impl SchemaConfig {
    pub fn strict() -> Self {
        Self {
            unknown_fields: UnknownFields::Reject,
            coerce: false,
        }
    }
}

/// Options for a single synthesis request
#[derive(Debug, Clone, Default)]
pub struct SchemaOptions {
    /// Explicit schema name, overriding declared and type names
    pub name: Option<String>,
    /// Fields to leave out, in addition to the entity's declared exclusions
    pub exclude: Vec<String>,
    pub config: Option<SchemaConfig>,
}

impl SchemaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn excluding<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_config(mut self, config: SchemaConfig) -> Self {
        self.config = Some(config);
        self
    }
}

/// Shape of a schema field
#[derive(Clone)]
pub enum FieldKind {
    Scalar(ScalarType),
    NestedOne(Arc<SchemaType>),
    NestedMany(Arc<SchemaType>),
}

impl FieldKind {
    pub fn is_scalar(&self) -> bool {
        matches!(self, FieldKind::Scalar(_))
    }

    /// The nested schema for relation fields
    pub fn nested(&self) -> Option<&Arc<SchemaType>> {
        match self {
            FieldKind::Scalar(_) => None,
            FieldKind::NestedOne(schema) | FieldKind::NestedMany(schema) => Some(schema),
        }
    }
}

// Nested schemas print by name only; full output would repeat the whole graph.
impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Scalar(scalar) => write!(f, "Scalar({:?})", scalar),
            FieldKind::NestedOne(schema) => write!(f, "NestedOne({} {:?})", schema.name(), schema.stage()),
            FieldKind::NestedMany(schema) => write!(f, "NestedMany({} {:?})", schema.name(), schema.stage()),
        }
    }
}

/// Value a field takes when absent from a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    /// No default; the field must be present
    Required,
    Null,
    EmptyList,
}

/// A single schema field
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub default: FieldDefault,
}

impl FieldSpec {
    /// Scalar field; nullable columns are optional with a null default
    pub fn scalar(name: impl Into<String>, scalar: ScalarType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar(scalar),
            default: if nullable { FieldDefault::Null } else { FieldDefault::Required },
        }
    }

    pub fn nested_one(name: impl Into<String>, schema: Arc<SchemaType>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::NestedOne(schema),
            default: FieldDefault::Null,
        }
    }

    pub fn nested_many(name: impl Into<String>, schema: Arc<SchemaType>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::NestedMany(schema),
            default: FieldDefault::EmptyList,
        }
    }

    pub fn is_required(&self) -> bool {
        self.default == FieldDefault::Required
    }
}

/// Construction stage of a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStage {
    /// Scalar fields only
    Partial,
    Complete,
}

/// A synthesized transfer-object type
#[derive(Debug)]
pub struct SchemaType {
    name: String,
    fields: Vec<FieldSpec>,
    config: SchemaConfig,
    stage: SchemaStage,
}

impl SchemaType {
    pub(crate) fn partial(name: String, fields: Vec<FieldSpec>, config: SchemaConfig) -> Self {
        Self {
            name,
            fields,
            config,
            stage: SchemaStage::Partial,
        }
    }

    /// Promote a stub by appending relationship fields
    pub(crate) fn promote(stub: &SchemaType, relations: Vec<FieldSpec>) -> Self {
        let mut fields = stub.fields.clone();
        fields.extend(relations);
        Self {
            name: stub.name.clone(),
            fields,
            config: stub.config.clone(),
            stage: SchemaStage::Complete,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order: scalars first, then relations
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    pub fn stage(&self) -> SchemaStage {
        self.stage
    }

    pub fn is_complete(&self) -> bool {
        self.stage == SchemaStage::Complete
    }

    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|field| field.kind.is_scalar())
    }

    pub fn relation_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|field| !field.kind.is_scalar())
    }
}

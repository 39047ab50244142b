//! Validation of materialized records against schema types

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::{FieldDefault, FieldKind, FieldSpec, SchemaType, UnknownFields};
use crate::error::{MapperError, MapperResult};
use crate::record::{FieldValue, Record};
use crate::value::{self, ScalarType, Value};

/// A validated field value
#[derive(Debug, Clone)]
pub enum ValidatedValue {
    Null,
    Scalar(Value),
    Object(Box<ValidatedObject>),
    List(Vec<ValidatedObject>),
}

impl ValidatedValue {
    pub fn to_json(&self) -> JsonValue {
        match self {
            ValidatedValue::Null => JsonValue::Null,
            ValidatedValue::Scalar(value) => value.to_json(),
            ValidatedValue::Object(object) => object.to_json(),
            ValidatedValue::List(objects) => {
                JsonValue::Array(objects.iter().map(ValidatedObject::to_json).collect())
            }
        }
    }
}

/// A record that passed validation, with every schema field present and
/// scalars converted to their declared types
#[derive(Debug, Clone)]
pub struct ValidatedObject {
    schema: Arc<SchemaType>,
    fields: Vec<(String, ValidatedValue)>,
}

impl ValidatedObject {
    pub fn schema(&self) -> &Arc<SchemaType> {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&ValidatedValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn scalar(&self, name: &str) -> Option<&Value> {
        match self.get(name)? {
            ValidatedValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn object(&self, name: &str) -> Option<&ValidatedObject> {
        match self.get(name)? {
            ValidatedValue::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn list(&self, name: &str) -> Option<&[ValidatedObject]> {
        match self.get(name)? {
            ValidatedValue::List(objects) => Some(objects),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn to_json(&self) -> JsonValue {
        let map = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        JsonValue::Object(map)
    }
}

impl Serialize for ValidatedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ValidatedValue::Null => serializer.serialize_none(),
            ValidatedValue::Scalar(value) => value.serialize(serializer),
            ValidatedValue::Object(object) => object.serialize(serializer),
            ValidatedValue::List(objects) => objects.serialize(serializer),
        }
    }
}

impl Serialize for ValidatedObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Validate a record against a schema type
pub fn validate(schema: &Arc<SchemaType>, record: &Record) -> MapperResult<ValidatedObject> {
    if schema.config().unknown_fields == UnknownFields::Reject {
        if let Some(unknown) = record.keys().find(|key| !schema.has_field(key)) {
            return Err(MapperError::validation(schema.name(), unknown, "unexpected field"));
        }
    }

    let mut fields = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let value = match record.get(&field.name) {
            None => default_for(schema, field)?,
            Some(value) => validate_field(schema, field, value)?,
        };
        fields.push((field.name.clone(), value));
    }

    Ok(ValidatedObject {
        schema: Arc::clone(schema),
        fields,
    })
}

fn default_for(schema: &SchemaType, field: &FieldSpec) -> MapperResult<ValidatedValue> {
    match field.default {
        FieldDefault::Required => Err(MapperError::validation(schema.name(), &field.name, "field required")),
        FieldDefault::Null => Ok(ValidatedValue::Null),
        FieldDefault::EmptyList => Ok(ValidatedValue::List(Vec::new())),
    }
}

fn validate_field(schema: &SchemaType, field: &FieldSpec, value: &FieldValue) -> MapperResult<ValidatedValue> {
    match (&field.kind, value) {
        (FieldKind::Scalar(_), FieldValue::Null) if field.is_required() => Err(MapperError::validation(
            schema.name(),
            &field.name,
            "must not be null",
        )),
        (FieldKind::Scalar(_) | FieldKind::NestedOne(_), FieldValue::Null) => Ok(ValidatedValue::Null),
        (FieldKind::Scalar(scalar), FieldValue::Scalar(raw)) => {
            coerce_scalar(raw, *scalar, schema.config().coerce)
                .map(ValidatedValue::Scalar)
                .ok_or_else(|| {
                    MapperError::validation(
                        schema.name(),
                        &field.name,
                        format!("expected {}, found {}", scalar, raw),
                    )
                })
        }
        (FieldKind::NestedOne(nested), FieldValue::Record(record)) => {
            Ok(ValidatedValue::Object(Box::new(validate(schema_of(record, nested), record)?)))
        }
        (FieldKind::NestedMany(nested), FieldValue::List(records)) => records
            .iter()
            .map(|record| validate(schema_of(record, nested), record))
            .collect::<MapperResult<Vec<_>>>()
            .map(ValidatedValue::List),
        (kind, other) => Err(MapperError::validation(
            schema.name(),
            &field.name,
            format!("expected {}, found {}", describe_kind(kind), describe_value(other)),
        )),
    }
}

/// A tagged record validates against its own type, an untagged one against the declared type
fn schema_of<'a>(record: &'a Record, declared: &'a Arc<SchemaType>) -> &'a Arc<SchemaType> {
    record.schema().unwrap_or(declared)
}

fn coerce_scalar(raw: &Value, scalar: ScalarType, coerce: bool) -> Option<Value> {
    if raw.scalar_type() == Some(scalar) {
        return Some(raw.clone());
    }

    match (scalar, raw) {
        (ScalarType::Float, Value::Int(i)) => Some(Value::Float(*i as f64)),
        (ScalarType::Json, other) => Some(Value::Json(other.to_json())),
        (_, Value::String(text)) if coerce => parse_scalar(text, scalar),
        _ => None,
    }
}

fn parse_scalar(text: &str, scalar: ScalarType) -> Option<Value> {
    match scalar {
        ScalarType::Uuid => uuid::Uuid::parse_str(text).ok().map(Value::Uuid),
        ScalarType::DateTime => value::parse_datetime(text).map(Value::DateTime),
        ScalarType::Timestamp => value::parse_timestamp(text).map(Value::Timestamp),
        ScalarType::Date => value::parse_date(text).map(Value::Date),
        ScalarType::Time => value::parse_time(text).map(Value::Time),
        ScalarType::Interval => value::parse_interval(text).map(Value::Interval),
        ScalarType::Integer => text.trim().parse().ok().map(Value::Int),
        ScalarType::Float => text.trim().parse().ok().map(Value::Float),
        ScalarType::Bool => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Some(Value::Bool(true)),
            "false" | "f" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        ScalarType::String | ScalarType::Bytes | ScalarType::Json => None,
    }
}

fn describe_kind(kind: &FieldKind) -> String {
    match kind {
        FieldKind::Scalar(scalar) => scalar.to_string(),
        FieldKind::NestedOne(schema) => format!("{} or null", schema.name()),
        FieldKind::NestedMany(schema) => format!("list of {}", schema.name()),
    }
}

fn describe_value(value: &FieldValue) -> &'static str {
    match value {
        FieldValue::Null => "null",
        FieldValue::Scalar(_) => "scalar",
        FieldValue::Record(_) => "record",
        FieldValue::List(_) => "list",
    }
}

impl SchemaType {
    /// Validate a materialized record against this schema
    pub fn validate(self: &Arc<Self>, record: &Record) -> MapperResult<ValidatedObject> {
        validate(self, record)
    }
}

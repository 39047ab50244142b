//! Materialized records - the nested output of graph traversal

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::schema::SchemaType;
use crate::value::Value;

/// One field of a materialized record
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    /// A normalized scalar; never `Value::Null`
    Scalar(Value),
    Record(Record),
    List(Vec<Record>),
}

impl FieldValue {
    /// Wrap a raw column value, normalizing temporal values to text
    pub fn scalar(value: Value) -> Self {
        match value.normalized() {
            Value::Null => FieldValue::Null,
            other => FieldValue::Scalar(other),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            FieldValue::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Record]> {
        match self {
            FieldValue::List(records) => Some(records),
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            FieldValue::Null => JsonValue::Null,
            FieldValue::Scalar(value) => value.to_json(),
            FieldValue::Record(record) => record.to_json(),
            FieldValue::List(records) => JsonValue::Array(records.iter().map(Record::to_json).collect()),
        }
    }
}

/// Ordered mapping of field name to value.
///
/// Records produced by traversal carry the schema type their entity resolved
/// to, so each element of a collection validates against its own type.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
    schema: Option<Arc<SchemaType>>,
}

/// Equality compares fields only
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag the record with the schema type it was read under
    pub fn with_schema(mut self, schema: Arc<SchemaType>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Schema type the record was read under, if tagged
    pub fn schema(&self) -> Option<&Arc<SchemaType>> {
        self.schema.as_ref()
    }

    /// Insert a field, replacing an existing value in place
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Field names in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Convert to a JSON object; key order follows insertion order only if
    /// serde_json's `preserve_order` feature is enabled
    pub fn to_json(&self) -> JsonValue {
        let map = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        JsonValue::Object(map)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Scalar(value) => value.serialize(serializer),
            FieldValue::Record(record) => record.serialize(serializer),
            FieldValue::List(records) => records.serialize(serializer),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

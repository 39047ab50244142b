//! Entity instances, relation values and batch keys

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::metadata::RelationshipMeta;
use crate::value::Value;

/// Shared handle to an entity instance
pub type EntityRef = Arc<dyn Entity>;

/// An instance of a persisted entity type, possibly mid-load
pub trait Entity: Send + Sync + fmt::Debug {
    /// The entity type name, as known to the metadata provider
    fn entity_type(&self) -> &str;

    /// Per-instance schema name override
    fn schema_name(&self) -> Option<&str> {
        None
    }

    /// Raw column value; `Value::Null` for null or absent columns
    fn column_value(&self, column: &str) -> Value;

    /// The relation's value if it is resident in memory, `None` if unloaded
    fn loaded_relation(&self, relation: &str) -> Option<RelationValue>;

    fn is_relation_loaded(&self, relation: &str) -> bool {
        self.loaded_relation(relation).is_some()
    }
}

/// Value of a loaded or resolved relation
#[derive(Debug, Clone)]
pub enum RelationValue {
    One(Option<EntityRef>),
    Many(Vec<EntityRef>),
}

impl RelationValue {
    /// The empty value: an empty list for collections, null otherwise
    pub fn empty(is_collection: bool) -> Self {
        if is_collection {
            RelationValue::Many(Vec::new())
        } else {
            RelationValue::One(None)
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, RelationValue::Many(_))
    }

    pub fn len(&self) -> usize {
        match self {
            RelationValue::One(one) => usize::from(one.is_some()),
            RelationValue::Many(many) => many.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_one(&self) -> Option<&EntityRef> {
        match self {
            RelationValue::One(one) => one.as_ref(),
            RelationValue::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> Option<&[EntityRef]> {
        match self {
            RelationValue::One(_) => None,
            RelationValue::Many(many) => Some(many),
        }
    }
}

/// Ordered tuple of key column values correlating owners with fetched rows
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey(Vec<Value>);

impl BatchKey {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// The owner's local key tuple for a relationship
    pub fn local_for(entity: &dyn Entity, relationship: &RelationshipMeta) -> Self {
        Self(relationship.local_columns().map(|column| entity.column_value(column)).collect())
    }

    /// A fetched row's remote key tuple for a relationship
    pub fn remote_for(entity: &dyn Entity, relationship: &RelationshipMeta) -> Self {
        Self(relationship.remote_columns().map(|column| entity.column_value(column)).collect())
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn has_null(&self) -> bool {
        self.0.iter().any(Value::is_null)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Value> for BatchKey {
    fn from(value: Value) -> Self {
        Self(vec![value])
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// Map-backed entity, used for storage rows and hand-built instances
#[derive(Debug, Clone)]
pub struct DynamicEntity {
    entity_type: String,
    schema_name: Option<String>,
    columns: HashMap<String, Value>,
    relations: HashMap<String, RelationValue>,
}

impl DynamicEntity {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            schema_name: None,
            columns: HashMap::new(),
            relations: HashMap::new(),
        }
    }

    pub fn with_schema_name(mut self, schema_name: impl Into<String>) -> Self {
        self.schema_name = Some(schema_name.into());
        self
    }

    pub fn with_column(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_column(name, value);
        self
    }

    /// Mark a relation as loaded with the given value
    pub fn with_relation(mut self, name: impl Into<String>, value: RelationValue) -> Self {
        self.relations.insert(name.into(), value);
        self
    }

    pub fn with_one(self, name: impl Into<String>, related: Option<EntityRef>) -> Self {
        self.with_relation(name, RelationValue::One(related))
    }

    pub fn with_many(self, name: impl Into<String>, related: Vec<EntityRef>) -> Self {
        self.with_relation(name, RelationValue::Many(related))
    }

    pub fn set_column(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.columns.insert(name.into(), value.into());
    }

    /// Forget a loaded relation so it must be fetched again
    pub fn unload(&mut self, name: &str) {
        self.relations.remove(name);
    }

    pub fn into_ref(self) -> EntityRef {
        Arc::new(self)
    }
}

impl Entity for DynamicEntity {
    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn schema_name(&self) -> Option<&str> {
        self.schema_name.as_deref()
    }

    fn column_value(&self, column: &str) -> Value {
        self.columns.get(column).cloned().unwrap_or(Value::Null)
    }

    fn loaded_relation(&self, relation: &str) -> Option<RelationValue> {
        self.relations.get(relation).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::RelationshipMeta;

    #[test]
    fn test_dynamic_entity_columns_and_relations() {
        let author = DynamicEntity::new("Author").with_column("id", 1).into_ref();
        let book = DynamicEntity::new("Book")
            .with_column("id", 10)
            .with_column("title", "Dune")
            .with_one("author", Some(author.clone()));

        assert_eq!(book.entity_type(), "Book");
        assert_eq!(book.column_value("title"), Value::from("Dune"));
        assert_eq!(book.column_value("missing"), Value::Null);
        assert!(book.is_relation_loaded("author"));
        assert!(!book.is_relation_loaded("reviews"));
        assert_eq!(book.loaded_relation("author").map(|r| r.len()), Some(1));
    }

    #[test]
    fn test_unload_relation() {
        let mut book = DynamicEntity::new("Book").with_many("reviews", Vec::new());
        assert!(book.is_relation_loaded("reviews"));
        book.unload("reviews");
        assert!(!book.is_relation_loaded("reviews"));
    }

    #[test]
    fn test_batch_keys_follow_key_pairs() {
        let rel = RelationshipMeta::to_one("edition", "Edition", "isbn", "isbn")
            .with_key_pair("format", "format");
        let book = DynamicEntity::new("Book")
            .with_column("isbn", "978-0441013593")
            .with_column("format", "paperback");
        let edition = DynamicEntity::new("Edition")
            .with_column("isbn", "978-0441013593")
            .with_column("format", "paperback");

        let local = BatchKey::local_for(&book, &rel);
        let remote = BatchKey::remote_for(&edition, &rel);
        assert_eq!(local, remote);
        assert_eq!(local.len(), 2);
        assert!(!local.has_null());
        assert_eq!(local.to_string(), "('978-0441013593', 'paperback')");
    }

    #[test]
    fn test_batch_key_detects_null_components() {
        let rel = RelationshipMeta::to_one("author", "Author", "author_id", "id");
        let orphan = DynamicEntity::new("Book").with_column("id", 3);
        assert!(BatchKey::local_for(&orphan, &rel).has_null());
    }

    #[test]
    fn test_empty_relation_values() {
        assert!(RelationValue::empty(true).is_collection());
        assert!(RelationValue::empty(false).as_one().is_none());
        assert!(RelationValue::empty(true).is_empty());
    }
}

//! Entity Metadata - Column and relationship descriptors for entity types
//!
//! The mapper never introspects entities directly; everything it knows about
//! an entity type comes from a [`MetadataProvider`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{MapperError, MapperResult};
use crate::schema::SchemaConfig;
use crate::value::ScalarType;

pub mod registry;

pub use registry::MetadataRegistry;

/// Source of entity metadata, keyed by entity type name
pub trait MetadataProvider: Send + Sync {
    /// Metadata for an entity type, `None` if the type is unknown
    fn entity(&self, entity_type: &str) -> Option<Arc<EntityMetadata>>;
}

/// Direction of a relationship, as seen from the owning entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipDirection {
    /// Many-to-one or one-to-one; yields a single related entity or null
    ToOne,
    /// One-to-many
    ToManyOrdered,
    /// Many-to-many
    ToManyUnordered,
}

impl RelationshipDirection {
    /// Returns true if this direction yields a collection
    pub fn is_many(self) -> bool {
        matches!(self, Self::ToManyOrdered | Self::ToManyUnordered)
    }
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    /// Declared storage type, e.g. `VARCHAR(255)`
    pub storage_type: String,
    pub nullable: bool,
}

impl ColumnMeta {
    /// Create a non-nullable column
    pub fn new(name: impl Into<String>, storage_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage_type: storage_type.into(),
            nullable: false,
        }
    }

    /// Create a nullable column
    pub fn nullable(name: impl Into<String>, storage_type: impl Into<String>) -> Self {
        Self::new(name, storage_type).with_nullable(true)
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// The runtime scalar type of this column, if its storage type is recognized
    pub fn scalar_type(&self) -> Option<ScalarType> {
        ScalarType::from_storage_type(&self.storage_type)
    }
}

/// A (local column, remote column) join pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyPair {
    pub local: String,
    pub remote: String,
}

/// One term of an ordering clause
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// Relationship metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipMeta {
    /// Name of the relationship (field name on the owning entity)
    pub name: String,
    pub direction: RelationshipDirection,
    /// Entity type on the other side
    pub target: String,
    /// Ordered join pairs; local columns live on the owner, remote on the target
    pub key_pairs: Vec<KeyPair>,
    pub order_by: Vec<OrderBy>,
    /// Whether loaded values are lists; defaults to `direction.is_many()`
    pub is_collection: bool,
}

impl RelationshipMeta {
    /// Create a relationship without join pairs
    pub fn new(
        name: impl Into<String>,
        direction: RelationshipDirection,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            direction,
            target: target.into(),
            key_pairs: Vec::new(),
            order_by: Vec::new(),
            is_collection: direction.is_many(),
        }
    }

    /// Many-to-one: `local` on the owner references `remote` on the target
    pub fn to_one(
        name: impl Into<String>,
        target: impl Into<String>,
        local: impl Into<String>,
        remote: impl Into<String>,
    ) -> Self {
        Self::new(name, RelationshipDirection::ToOne, target).with_key_pair(local, remote)
    }

    /// One-to-many: `remote` on the target references `local` on the owner
    pub fn to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        local: impl Into<String>,
        remote: impl Into<String>,
    ) -> Self {
        Self::new(name, RelationshipDirection::ToManyOrdered, target).with_key_pair(local, remote)
    }

    pub fn with_key_pair(mut self, local: impl Into<String>, remote: impl Into<String>) -> Self {
        self.key_pairs.push(KeyPair {
            local: local.into(),
            remote: remote.into(),
        });
        self
    }

    pub fn with_order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn with_collection(mut self, is_collection: bool) -> Self {
        self.is_collection = is_collection;
        self
    }

    pub fn local_columns(&self) -> impl Iterator<Item = &str> {
        self.key_pairs.iter().map(|pair| pair.local.as_str())
    }

    pub fn remote_columns(&self) -> impl Iterator<Item = &str> {
        self.key_pairs.iter().map(|pair| pair.remote.as_str())
    }

    /// Validate the relationship metadata for consistency
    pub fn validate(&self) -> MapperResult<()> {
        if self.key_pairs.is_empty() {
            return Err(MapperError::Configuration(format!(
                "Relationship '{}' must declare at least one key pair",
                self.name
            )));
        }

        if self.target.is_empty() {
            return Err(MapperError::Configuration(format!(
                "Relationship '{}' must name a target entity type",
                self.name
            )));
        }

        Ok(())
    }
}

/// Everything the mapper needs to know about one entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub entity_type: String,
    pub table: String,
    /// Declared schema name, overriding the entity type name
    pub schema_name: Option<String>,
    /// Fields never exposed through synthesized schemas
    pub excluded: Vec<String>,
    pub schema_config: Option<SchemaConfig>,
    columns: Vec<ColumnMeta>,
    relationships: Vec<RelationshipMeta>,
}

impl EntityMetadata {
    /// Create metadata whose table name equals the entity type
    pub fn new(entity_type: impl Into<String>) -> Self {
        let entity_type = entity_type.into();
        Self {
            table: entity_type.clone(),
            entity_type,
            schema_name: None,
            excluded: Vec::new(),
            schema_config: None,
            columns: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_schema_name(mut self, schema_name: impl Into<String>) -> Self {
        self.schema_name = Some(schema_name.into());
        self
    }

    pub fn with_excluded<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_schema_config(mut self, config: SchemaConfig) -> Self {
        self.schema_config = Some(config);
        self
    }

    pub fn with_column(mut self, column: ColumnMeta) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_relationship(mut self, relationship: RelationshipMeta) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Columns in declaration order
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Relationships in declaration order
    pub fn relationships(&self) -> &[RelationshipMeta] {
        &self.relationships
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipMeta> {
        self.relationships.iter().find(|relationship| relationship.name == name)
    }

    /// Schema name for this type: explicit override, then declared name, then type name
    pub fn canonical_name(&self, explicit: Option<&str>) -> String {
        explicit
            .or(self.schema_name.as_deref())
            .unwrap_or(&self.entity_type)
            .to_string()
    }

    /// Validate the entity metadata for consistency
    pub fn validate(&self) -> MapperResult<()> {
        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|other| other.name == column.name) {
                return Err(MapperError::Configuration(format!(
                    "Entity '{}' declares column '{}' twice",
                    self.entity_type, column.name
                )));
            }
        }

        for relationship in &self.relationships {
            relationship.validate()?;
            if self.column(&relationship.name).is_some() {
                return Err(MapperError::Configuration(format!(
                    "Entity '{}' uses '{}' as both a column and a relationship",
                    self.entity_type, relationship.name
                )));
            }
            if let Some(missing) = relationship.local_columns().find(|local| self.column(local).is_none()) {
                return Err(MapperError::Configuration(format!(
                    "Relationship '{}.{}' references unknown local column '{}'",
                    self.entity_type, relationship.name, missing
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> EntityMetadata {
        EntityMetadata::new("Book")
            .with_table("books")
            .with_column(ColumnMeta::new("id", "INTEGER"))
            .with_column(ColumnMeta::new("title", "VARCHAR(200)"))
            .with_column(ColumnMeta::nullable("author_id", "INTEGER"))
            .with_relationship(RelationshipMeta::to_one("author", "Author", "author_id", "id"))
    }

    #[test]
    fn test_direction_collection_defaults() {
        assert!(!RelationshipDirection::ToOne.is_many());
        assert!(RelationshipDirection::ToManyOrdered.is_many());
        assert!(RelationshipDirection::ToManyUnordered.is_many());

        let rel = RelationshipMeta::to_many("books", "Book", "id", "author_id");
        assert!(rel.is_collection);
        let rel = rel.with_collection(false);
        assert!(!rel.is_collection);
    }

    #[test]
    fn test_canonical_name_precedence() {
        let meta = book();
        assert_eq!(meta.canonical_name(None), "Book");
        assert_eq!(meta.canonical_name(Some("BookDto")), "BookDto");

        let declared = book().with_schema_name("BookSchema");
        assert_eq!(declared.canonical_name(None), "BookSchema");
        assert_eq!(declared.canonical_name(Some("BookDto")), "BookDto");
    }

    #[test]
    fn test_lookup_helpers() {
        let meta = book();
        assert_eq!(meta.table, "books");
        assert!(meta.column("title").is_some());
        assert!(meta.column("author").is_none());
        assert_eq!(meta.relationship("author").map(|r| r.target.as_str()), Some("Author"));
        assert_eq!(meta.columns().len(), 3);
    }

    #[test]
    fn test_validation() {
        assert!(book().validate().is_ok());

        let no_keys = book().with_relationship(RelationshipMeta::new(
            "editor",
            RelationshipDirection::ToOne,
            "Person",
        ));
        assert!(matches!(no_keys.validate(), Err(MapperError::Configuration(_))));

        let bad_local = book().with_relationship(RelationshipMeta::to_one(
            "publisher",
            "Publisher",
            "publisher_id",
            "id",
        ));
        assert!(matches!(bad_local.validate(), Err(MapperError::Configuration(_))));

        let duplicate = book().with_column(ColumnMeta::new("id", "BIGINT"));
        assert!(duplicate.validate().is_err());
    }
}

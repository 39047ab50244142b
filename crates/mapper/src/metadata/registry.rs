//! Metadata Registry - Runtime storage for entity metadata

use dashmap::DashMap;
use std::sync::Arc;

use super::{EntityMetadata, MetadataProvider};
use crate::error::MapperResult;

/// Thread-safe [`MetadataProvider`] backed by a concurrent map
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    entities: Arc<DashMap<String, Arc<EntityMetadata>>>,
}

impl MetadataRegistry {
    /// Create a new empty metadata registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register metadata for an entity type, replacing any previous entry
    pub fn register(&self, metadata: EntityMetadata) -> MapperResult<()> {
        metadata.validate()?;

        tracing::debug!(
            "Registering entity metadata for '{}' ({} columns, {} relationships)",
            metadata.entity_type,
            metadata.columns().len(),
            metadata.relationships().len()
        );
        self.entities
            .insert(metadata.entity_type.clone(), Arc::new(metadata));
        Ok(())
    }

    /// Builder-style registration
    pub fn with(self, metadata: EntityMetadata) -> MapperResult<Self> {
        self.register(metadata)?;
        Ok(self)
    }

    pub fn get(&self, entity_type: &str) -> Option<Arc<EntityMetadata>> {
        self.entities.get(entity_type).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.entities.contains_key(entity_type)
    }

    /// Registered entity types, sorted
    pub fn entity_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.entities.iter().map(|entry| entry.key().clone()).collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl MetadataProvider for MetadataRegistry {
    fn entity(&self, entity_type: &str) -> Option<Arc<EntityMetadata>> {
        self.get(entity_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MapperError;
    use crate::metadata::{ColumnMeta, RelationshipDirection, RelationshipMeta};

    #[test]
    fn test_register_and_lookup() {
        let registry = MetadataRegistry::new();
        assert!(registry.is_empty());

        registry
            .register(EntityMetadata::new("Author").with_column(ColumnMeta::new("id", "INTEGER")))
            .unwrap();
        registry
            .register(EntityMetadata::new("Book").with_column(ColumnMeta::new("id", "INTEGER")))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("Author"));
        assert_eq!(registry.entity_types(), vec!["Author".to_string(), "Book".to_string()]);
        assert!(registry.entity("Book").is_some());
        assert!(registry.entity("Publisher").is_none());
    }

    #[test]
    fn test_register_rejects_invalid_metadata() {
        let registry = MetadataRegistry::new();
        let invalid = EntityMetadata::new("Book")
            .with_column(ColumnMeta::new("id", "INTEGER"))
            .with_relationship(RelationshipMeta::new("author", RelationshipDirection::ToOne, "Author"));

        assert!(matches!(registry.register(invalid), Err(MapperError::Configuration(_))));
        assert!(!registry.contains("Book"));
    }

    #[test]
    fn test_clones_share_storage() {
        let registry = MetadataRegistry::new();
        let clone = registry.clone();
        registry
            .register(EntityMetadata::new("Tag").with_column(ColumnMeta::new("id", "INTEGER")))
            .unwrap();
        assert!(clone.contains("Tag"));
    }
}

//! Error types for schema synthesis and graph materialization
//!
//! Every failure surfaces to the direct caller of `type_for` or
//! `materialize`; nothing is retried or swallowed at this layer.

use crate::storage::StorageError;

/// Result type alias for mapper operations
pub type MapperResult<T> = Result<T, MapperError>;

/// Error types for mapper operations
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    /// A column's declared storage type has no scalar counterpart
    #[error("Cannot map column '{entity}.{column}': unrecognized storage type '{storage_type}'")]
    Mapping {
        entity: String,
        column: String,
        storage_type: String,
    },

    /// Async materialization was requested without a storage binding
    #[error("No storage binding configured: set a session or a connection factory")]
    MissingBinding,

    /// Failure reported by the storage collaborator, passed through as-is
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A materialized record did not satisfy its schema
    #[error("Validation error: {0}")]
    Validation(String),

    /// The metadata provider knows nothing about an entity type
    #[error("Unknown entity type '{0}'")]
    UnknownEntity(String),

    /// Blocking materialization reached a relation that is not resident in memory
    #[error("Relation '{entity}.{relation}' is not loaded and cannot be fetched in blocking mode")]
    RelationNotLoaded { entity: String, relation: String },

    /// Invalid metadata or loader configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MapperError {
    pub(crate) fn validation(schema: &str, field: &str, message: impl std::fmt::Display) -> Self {
        MapperError::Validation(format!("{}.{}: {}", schema, field, message))
    }
}

impl From<serde_json::Error> for MapperError {
    fn from(err: serde_json::Error) -> Self {
        MapperError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_error_message() {
        let err = MapperError::Mapping {
            entity: "Book".to_string(),
            column: "cover".to_string(),
            storage_type: "GEOMETRY".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot map column 'Book.cover': unrecognized storage type 'GEOMETRY'"
        );
    }

    #[test]
    fn test_storage_error_is_transparent() {
        let err: MapperError = StorageError::Backend("connection reset".to_string()).into();
        assert!(matches!(err, MapperError::Storage(StorageError::Backend(_))));
        assert_eq!(err.to_string(), StorageError::Backend("connection reset".to_string()).to_string());
    }

    #[test]
    fn test_validation_helper_includes_path() {
        let err = MapperError::validation("Author", "name", "field required");
        assert_eq!(err.to_string(), "Validation error: Author.name: field required");
    }
}

//! # elif-mapper: Transfer Objects for elif.rs Entities
//!
//! Derives schema types from entity metadata and materializes entity graphs
//! into depth-bounded nested records, fetching unloaded relationships in one
//! batched round trip per relationship and level.
//!
//! The crate has three parts: the [`SchemaSynthesizer`], which builds and
//! caches a [`SchemaType`] per canonical name; the [`GraphLoader`], which
//! walks instances against those types; and the [`BatchResolver`] it uses to
//! fetch relationships through a [`StorageBinding`].

pub mod entity;
pub mod error;
pub mod loading;
pub mod metadata;
pub mod record;
pub mod schema;
pub mod storage;
pub mod value;

#[cfg(test)]
mod test_support;

// Re-export core traits and types
pub use entity::{BatchKey, DynamicEntity, Entity, EntityRef, RelationValue};
pub use error::{MapperError, MapperResult};
pub use loading::{BatchResolver, GraphLoader, LoaderConfig, Materialized, OutputMode};
pub use metadata::{
    ColumnMeta, EntityMetadata, KeyPair, MetadataProvider, MetadataRegistry, OrderBy, RelationshipDirection,
    RelationshipMeta,
};
pub use record::{FieldValue, Record};
pub use schema::{
    FieldDefault, FieldKind, FieldSpec, SchemaConfig, SchemaOptions, SchemaRegistry, SchemaStage, SchemaSynthesizer,
    SchemaType, UnknownFields, ValidatedObject, ValidatedValue,
};
pub use storage::{
    ConnectionFactory, FetchQuery, MemoryStore, StorageBinding, StorageConnection, StorageError, StorageResult,
    StorageSession,
};
pub use value::{ScalarType, Value};

#[cfg(feature = "postgres")]
pub use storage::PgConnectionFactory;

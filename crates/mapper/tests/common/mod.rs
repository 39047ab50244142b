//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use elif_mapper::{
    ColumnMeta, DynamicEntity, EntityMetadata, GraphLoader, MemoryStore, MetadataRegistry, OrderBy,
    RelationshipMeta, SchemaSynthesizer,
};

/// Install a test subscriber honoring `RUST_LOG`; repeated calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Authors and books; with `back_reference` books also relate to their author
pub fn library(back_reference: bool) -> MetadataRegistry {
    let registry = MetadataRegistry::new();

    registry
        .register(
            EntityMetadata::new("Author")
                .with_table("authors")
                .with_column(ColumnMeta::new("id", "INTEGER"))
                .with_column(ColumnMeta::new("name", "VARCHAR(255)"))
                .with_column(ColumnMeta::nullable("joined_at", "TIMESTAMP WITH TIME ZONE"))
                .with_relationship(
                    RelationshipMeta::to_many("books", "Book", "id", "author_id").with_order_by(OrderBy::asc("id")),
                ),
        )
        .expect("author metadata is valid");

    let mut book = EntityMetadata::new("Book")
        .with_table("books")
        .with_column(ColumnMeta::new("id", "INTEGER"))
        .with_column(ColumnMeta::new("title", "TEXT"))
        .with_column(ColumnMeta::nullable("author_id", "INTEGER"));
    if back_reference {
        book = book.with_relationship(RelationshipMeta::to_one("author", "Author", "author_id", "id"));
    }
    registry.register(book).expect("book metadata is valid");

    registry
}

pub fn synthesizer(back_reference: bool) -> Arc<SchemaSynthesizer> {
    Arc::new(SchemaSynthesizer::new(Arc::new(library(back_reference))))
}

pub fn loader(back_reference: bool, store: &MemoryStore) -> GraphLoader {
    GraphLoader::new(synthesizer(back_reference)).with_connection_factory(Arc::new(store.clone()))
}

pub fn author(id: i64, name: &str) -> DynamicEntity {
    DynamicEntity::new("Author").with_column("id", id).with_column("name", name)
}

pub fn book(id: i64, title: &str, author_id: Option<i64>) -> DynamicEntity {
    DynamicEntity::new("Book")
        .with_column("id", id)
        .with_column("title", title)
        .with_column("author_id", author_id)
}

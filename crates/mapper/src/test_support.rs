//! Shared fixtures for unit tests: a small library of authors, books and reviews

use std::sync::Arc;

use crate::entity::{DynamicEntity, EntityRef};
use crate::metadata::{ColumnMeta, EntityMetadata, MetadataRegistry, OrderBy, RelationshipMeta};
use crate::schema::SchemaSynthesizer;

pub(crate) fn author_metadata() -> EntityMetadata {
    EntityMetadata::new("Author")
        .with_table("authors")
        .with_column(ColumnMeta::new("id", "INTEGER"))
        .with_column(ColumnMeta::new("name", "VARCHAR(120)"))
        .with_column(ColumnMeta::nullable("born_at", "TIMESTAMP WITH TIME ZONE"))
        .with_relationship(
            RelationshipMeta::to_many("books", "Book", "id", "author_id").with_order_by(OrderBy::asc("id")),
        )
}

pub(crate) fn book_metadata() -> EntityMetadata {
    EntityMetadata::new("Book")
        .with_table("books")
        .with_column(ColumnMeta::new("id", "INTEGER"))
        .with_column(ColumnMeta::new("title", "TEXT"))
        .with_column(ColumnMeta::nullable("author_id", "INTEGER"))
        .with_relationship(RelationshipMeta::to_one("author", "Author", "author_id", "id"))
        .with_relationship(
            RelationshipMeta::to_many("reviews", "Review", "id", "book_id").with_order_by(OrderBy::desc("rating")),
        )
}

pub(crate) fn review_metadata() -> EntityMetadata {
    EntityMetadata::new("Review")
        .with_table("reviews")
        .with_column(ColumnMeta::new("id", "INTEGER"))
        .with_column(ColumnMeta::new("book_id", "INTEGER"))
        .with_column(ColumnMeta::new("rating", "SMALLINT"))
        .with_column(ColumnMeta::nullable("body", "TEXT"))
        .with_relationship(RelationshipMeta::to_one("book", "Book", "book_id", "id"))
}

pub(crate) fn library() -> MetadataRegistry {
    let registry = MetadataRegistry::new();
    for metadata in [author_metadata(), book_metadata(), review_metadata()] {
        registry.register(metadata).expect("fixture metadata is valid");
    }
    registry
}

pub(crate) fn synthesizer() -> Arc<SchemaSynthesizer> {
    Arc::new(SchemaSynthesizer::new(Arc::new(library())))
}

pub(crate) fn author(id: i64, name: &str) -> DynamicEntity {
    DynamicEntity::new("Author").with_column("id", id).with_column("name", name)
}

pub(crate) fn book(id: i64, title: &str, author_id: Option<i64>) -> DynamicEntity {
    DynamicEntity::new("Book")
        .with_column("id", id)
        .with_column("title", title)
        .with_column("author_id", author_id)
}

pub(crate) fn review(id: i64, book_id: i64, rating: i64) -> EntityRef {
    DynamicEntity::new("Review")
        .with_column("id", id)
        .with_column("book_id", book_id)
        .with_column("rating", rating)
        .into_ref()
}

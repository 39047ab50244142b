mod common;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use elif_mapper::{
    FieldValue, GraphLoader, MapperError, MemoryStore, OutputMode, SchemaOptions, StorageError, Value,
};
use serde_json::json;

use common::{author, book, init_tracing, loader, synthesizer};

#[test]
fn test_loaded_books_at_depth_two() {
    init_tracing();
    let loader = GraphLoader::new(synthesizer(false));
    let entity = author(1, "Ursula K. Le Guin")
        .with_many(
            "books",
            vec![
                book(10, "The Dispossessed", Some(1)).into_ref(),
                book(11, "The Lathe of Heaven", Some(1)).into_ref(),
            ],
        )
        .into_ref();

    let record = loader
        .materialize_sync(&entity, 2, OutputMode::Record)
        .unwrap()
        .into_record()
        .unwrap();

    assert_eq!(
        record.to_json(),
        json!({
            "id": 1,
            "name": "Ursula K. Le Guin",
            "joined_at": null,
            "books": [
                {"id": 10, "title": "The Dispossessed", "author_id": 1},
                {"id": 11, "title": "The Lathe of Heaven", "author_id": 1},
            ],
        })
    );
}

#[tokio::test]
async fn test_loaded_books_need_no_fetch() {
    init_tracing();
    let store = MemoryStore::new();
    let loader = loader(false, &store);
    let entity = author(1, "Ursula K. Le Guin")
        .with_many("books", vec![book(10, "The Dispossessed", Some(1)).into_ref()])
        .into_ref();

    let record = loader
        .materialize(&entity, 2, OutputMode::Record)
        .await
        .unwrap()
        .into_record()
        .unwrap();

    assert_eq!(record.get("books").and_then(FieldValue::as_list).map(|b| b.len()), Some(1));
    assert_eq!(store.fetch_count(), 0);
}

#[test]
fn test_depth_one_truncates_books() {
    let loader = GraphLoader::new(synthesizer(false));
    let entity = author(1, "Ursula K. Le Guin")
        .with_many("books", vec![book(10, "The Dispossessed", Some(1)).into_ref()])
        .into_ref();

    let record = loader
        .materialize_sync(&entity, 1, OutputMode::Record)
        .unwrap()
        .into_record()
        .unwrap();

    assert_eq!(
        record.to_json(),
        json!({"id": 1, "name": "Ursula K. Le Guin", "joined_at": null, "books": []})
    );
}

#[tokio::test]
async fn test_null_author_id_issues_no_fetch() {
    init_tracing();
    let store = MemoryStore::new();
    store.insert(author(1, "Ursula K. Le Guin").into_ref());
    let loader = loader(true, &store);
    let entity = book(13, "Anonymous Pamphlet", None).into_ref();

    let record = loader
        .materialize(&entity, 2, OutputMode::Record)
        .await
        .unwrap()
        .into_record()
        .unwrap();

    assert_eq!(record.get("author"), Some(&FieldValue::Null));
    assert_eq!(store.fetch_count(), 0);
}

#[test]
fn test_null_author_id_needs_no_loaded_author() {
    let loader = GraphLoader::new(synthesizer(true));
    let entity = book(13, "Anonymous Pamphlet", None).into_ref();

    let record = loader
        .materialize_sync(&entity, 2, OutputMode::Record)
        .unwrap()
        .into_record()
        .unwrap();

    assert_eq!(
        record.to_json(),
        json!({"id": 13, "title": "Anonymous Pamphlet", "author_id": null, "author": null})
    );
}

#[tokio::test]
async fn test_fifty_books_resolve_authors_in_one_fetch() {
    init_tracing();
    let store = MemoryStore::new();
    for (id, name) in [(1, "Ursula K. Le Guin"), (2, "Octavia E. Butler"), (3, "N. K. Jemisin")] {
        store.insert(author(id, name).into_ref());
    }
    let loader = loader(true, &store);

    let books: Vec<_> = (0..50i64)
        .map(|i| book(100 + i, &format!("Volume {}", i), Some(i % 3 + 1)).into_ref())
        .collect();
    let results = loader.materialize_many(&books, 2, OutputMode::Record).await.unwrap();

    assert_eq!(store.fetch_count(), 1);
    let query = &store.queries()[0];
    assert_eq!(query.entity_type, "Author");
    assert_eq!(query.keys.len(), 3);

    assert_eq!(results.len(), 50);
    for (i, result) in results.iter().enumerate() {
        let record = result.as_record().unwrap();
        let nested = record.get("author").and_then(FieldValue::as_record).unwrap();
        assert_eq!(nested.get("id"), Some(&FieldValue::Scalar(Value::Int(i as i64 % 3 + 1))));
        // The nested author sits on the depth boundary
        assert_eq!(nested.get("books"), Some(&FieldValue::List(Vec::new())));
    }
}

#[tokio::test]
async fn test_excluded_books_are_never_read() {
    init_tracing();
    let store = MemoryStore::new();
    store.insert(book(10, "The Dispossessed", Some(1)).into_ref());
    let loader = loader(false, &store);

    let schema = loader
        .synthesizer()
        .type_for("Author", SchemaOptions::new().named("AuthorCard").excluding(["books"]))
        .unwrap();
    let entity = author(1, "Ursula K. Le Guin").into_ref();

    let validated = loader
        .materialize_with_schema(&entity, &schema, 3, OutputMode::Validated)
        .await
        .unwrap()
        .into_validated()
        .unwrap();

    assert!(validated.get("books").is_none());
    assert!(!validated.to_json().to_string().contains("books"));
    assert_eq!(store.fetch_count(), 0);
}

#[test]
fn test_depth_zero_yields_empty_record() {
    let loader = GraphLoader::new(synthesizer(true));
    let entity = book(10, "The Dispossessed", Some(1)).into_ref();

    let materialized = loader.materialize_sync(&entity, 0, OutputMode::Record).unwrap();
    assert_eq!(materialized.to_json(), json!({}));
}

#[test]
fn test_repeated_type_for_is_identical() {
    let synth = synthesizer(true);
    let first = synth.type_for("Book", SchemaOptions::new()).unwrap();
    let second = synth.type_for("Book", SchemaOptions::new()).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_datetime_round_trip_truncates_to_seconds() {
    let loader = GraphLoader::new(synthesizer(false));
    let joined = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap() + chrono::Duration::microseconds(891_011);
    let entity = author(1, "Ursula K. Le Guin")
        .with_column("joined_at", joined)
        .with_many("books", Vec::new())
        .into_ref();

    let validated = loader.load_sync(&entity).unwrap();
    assert_eq!(
        validated.scalar("joined_at"),
        Some(&Value::DateTime(Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap()))
    );
}

#[tokio::test]
async fn test_storage_errors_reach_the_caller() {
    let store = MemoryStore::new();
    store.fail_with(StorageError::Backend("relation \"books\" does not exist".to_string()));
    let loader = loader(false, &store);

    let err = loader
        .materialize(&author(1, "Ursula K. Le Guin").into_ref(), 2, OutputMode::Record)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Storage backend error: relation \"books\" does not exist");
    assert!(matches!(err, MapperError::Storage(StorageError::Backend(_))));
}

#[tokio::test]
async fn test_missing_binding() {
    let loader = GraphLoader::new(synthesizer(false));
    let err = loader
        .materialize(&author(1, "Ursula K. Le Guin").into_ref(), 1, OutputMode::Record)
        .await
        .unwrap_err();
    assert!(matches!(err, MapperError::MissingBinding));
}

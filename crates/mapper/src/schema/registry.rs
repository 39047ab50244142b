//! Schema Registry - Process-wide store of committed schema types
//!
//! Lookups are lock-free. Construction is single-flight: a caller that misses
//! the cache takes the build lock, re-checks, and only then builds, so
//! concurrent callers for the same name wait and receive the same `Arc`.

use dashmap::DashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::SchemaType;
use crate::error::MapperResult;

/// Result of one synthesis run, committed atomically
pub(crate) struct StagedSchemas {
    pub root: Arc<SchemaType>,
    /// Every complete type built during the run, the root included
    pub completed: Vec<Arc<SchemaType>>,
}

/// Concurrency-safe keyed store of schema types
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: DashMap<String, Arc<SchemaType>>,
    /// One lock for all names: a build also commits the nested types it
    /// produced, so two concurrent builds for different roots could otherwise
    /// register different `Arc`s for the same nested name.
    build_lock: Mutex<()>,
}

impl SchemaRegistry {
    /// Create a new empty schema registry
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<SchemaType>> {
        self.entries.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered schema names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the type cached under `name`, or run `build` under the build
    /// lock and commit everything it produced. Nothing is committed if
    /// `build` fails.
    pub(crate) fn get_or_build<F>(&self, name: &str, build: F) -> MapperResult<Arc<SchemaType>>
    where
        F: FnOnce() -> MapperResult<StagedSchemas>,
    {
        if let Some(schema) = self.get(name) {
            return Ok(schema);
        }

        // The guarded data is (), so a poisoned lock carries no broken state.
        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(schema) = self.get(name) {
            tracing::debug!("Schema '{}' was built by a concurrent caller", name);
            return Ok(schema);
        }

        let staged = build()?;
        for schema in staged.completed {
            let schema_name = schema.name().to_string();
            self.entries.entry(schema_name.clone()).or_insert_with(|| {
                tracing::debug!(
                    "Registered schema '{}' with {} fields",
                    schema_name,
                    schema.fields().len()
                );
                schema
            });
        }

        Ok(self.get(name).unwrap_or(staged.root))
    }
}

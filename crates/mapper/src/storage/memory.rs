//! In-memory storage, usable as either binding
//!
//! Rows are held per entity type in insertion order. Every fetch is counted
//! and logged so callers can assert on round trips.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use super::{ConnectionFactory, FetchQuery, StorageConnection, StorageError, StorageResult, StorageSession};
use crate::entity::EntityRef;

#[derive(Debug, Default)]
struct MemoryState {
    rows: RwLock<HashMap<String, Vec<EntityRef>>>,
    fetches: AtomicUsize,
    queries: RwLock<Vec<FetchQuery>>,
    failure: RwLock<Option<StorageError>>,
}

/// Shared in-memory row store; clones share the same rows and counters
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row under its own entity type
    pub fn insert(&self, row: EntityRef) {
        let mut rows = self.state.rows.write().unwrap_or_else(|e| e.into_inner());
        rows.entry(row.entity_type().to_string()).or_default().push(row);
    }

    pub fn insert_all<I>(&self, rows: I)
    where
        I: IntoIterator<Item = EntityRef>,
    {
        for row in rows {
            self.insert(row);
        }
    }

    /// Number of rows stored for an entity type
    pub fn row_count(&self, entity_type: &str) -> usize {
        let rows = self.state.rows.read().unwrap_or_else(|e| e.into_inner());
        rows.get(entity_type).map_or(0, Vec::len)
    }

    /// Fetches executed so far, failed ones included
    pub fn fetch_count(&self) -> usize {
        self.state.fetches.load(Ordering::SeqCst)
    }

    /// Every query received, in order
    pub fn queries(&self) -> Vec<FetchQuery> {
        self.state.queries.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Clear the fetch counter and query log, keeping rows
    pub fn reset_counters(&self) {
        self.state.fetches.store(0, Ordering::SeqCst);
        self.state.queries.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Make every subsequent fetch fail with `error`
    pub fn fail_with(&self, error: StorageError) {
        *self.state.failure.write().unwrap_or_else(|e| e.into_inner()) = Some(error);
    }

    pub fn clear_failure(&self) {
        *self.state.failure.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn execute(&self, query: &FetchQuery) -> StorageResult<Vec<EntityRef>> {
        self.state.fetches.fetch_add(1, Ordering::SeqCst);
        self.state
            .queries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(query.clone());

        if let Some(error) = self.state.failure.read().unwrap_or_else(|e| e.into_inner()).clone() {
            tracing::warn!("Memory store fetch of {} failed: {}", query, error);
            return Err(error);
        }

        let rows = self.state.rows.read().unwrap_or_else(|e| e.into_inner());
        let mut matched: Vec<EntityRef> = rows
            .get(&query.entity_type)
            .map(|rows| rows.iter().filter(|&row| query.matches(&**row)).cloned().collect())
            .unwrap_or_default();

        if !query.order_by.is_empty() {
            // Stable, so ties keep insertion order
            matched.sort_by(|a, b| {
                for order in &query.order_by {
                    let ordering = a
                        .column_value(&order.column)
                        .sort_cmp(&b.column_value(&order.column));
                    let ordering = if order.descending { ordering.reverse() } else { ordering };
                    if ordering.is_ne() {
                        return ordering;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }

        tracing::debug!("Memory store fetch of {} returned {} rows", query, matched.len());
        Ok(matched)
    }
}

impl StorageSession for MemoryStore {
    fn fetch(&self, query: &FetchQuery) -> StorageResult<Vec<EntityRef>> {
        self.execute(query)
    }
}

#[async_trait]
impl ConnectionFactory for MemoryStore {
    async fn connect(&self) -> StorageResult<Box<dyn StorageConnection>> {
        Ok(Box::new(MemoryConnection { store: self.clone() }))
    }
}

/// A connection handed out by [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryConnection {
    store: MemoryStore,
}

#[async_trait]
impl StorageConnection for MemoryConnection {
    async fn fetch(&mut self, query: &FetchQuery) -> StorageResult<Vec<EntityRef>> {
        self.store.execute(query)
    }
}

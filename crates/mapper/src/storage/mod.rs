//! Storage Access - The boundary between the loader and the data store
//!
//! The loader never talks to a database directly. Every fetch is expressed as
//! a [`FetchQuery`]: one equality-membership filter over a key tuple, with an
//! optional ordering. A [`StorageBinding`] executes it either through a
//! caller-owned blocking [`StorageSession`] or through connections opened by a
//! [`ConnectionFactory`].

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::entity::{BatchKey, Entity, EntityRef};
use crate::metadata::{EntityMetadata, OrderBy, RelationshipMeta};
use crate::value::Value;

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgConnectionFactory;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Failures reported by a storage collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage connection error: {0}")]
    Connection(String),

    #[error("Storage fetch was cancelled")]
    Cancelled,

    #[error("Storage fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to decode storage row: {0}")]
    Decode(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                StorageError::Connection(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
                StorageError::Decode(err.to_string())
            }
            _ => StorageError::Backend(err.to_string()),
        }
    }
}

/// A single grouped fetch: all rows of `entity_type` whose `key_columns`
/// tuple is one of `keys`, in `order_by` order
#[derive(Debug, Clone, PartialEq)]
pub struct FetchQuery {
    pub entity_type: String,
    pub table: String,
    pub key_columns: Vec<String>,
    pub keys: Vec<BatchKey>,
    pub order_by: Vec<OrderBy>,
}

impl FetchQuery {
    /// Build the fetch for a relationship, filtering the target's remote key
    /// columns by the owners' local key tuples
    pub fn for_relationship(relationship: &RelationshipMeta, target: &EntityMetadata, keys: Vec<BatchKey>) -> Self {
        Self {
            entity_type: target.entity_type.clone(),
            table: target.table.clone(),
            key_columns: relationship.remote_columns().map(str::to_string).collect(),
            keys,
            order_by: relationship.order_by.clone(),
        }
    }

    /// Whether an entity's key tuple is in the key set
    pub fn matches(&self, entity: &dyn Entity) -> bool {
        if entity.entity_type() != self.entity_type {
            return false;
        }
        let key = BatchKey::new(
            self.key_columns
                .iter()
                .map(|column| entity.column_value(column))
                .collect(),
        );
        self.keys.contains(&key)
    }

    /// Render as a PostgreSQL statement with `$n` placeholders
    pub fn to_sql_with_params(&self) -> (String, Vec<Value>) {
        let mut sql = format!("SELECT * FROM {}", quote_identifier(&self.table));
        let mut params = Vec::with_capacity(self.keys.len() * self.key_columns.len());

        if self.keys.is_empty() || self.key_columns.is_empty() {
            sql.push_str(" WHERE FALSE");
        } else {
            let columns: Vec<String> = self.key_columns.iter().map(|c| quote_identifier(c)).collect();
            let mut tuples = Vec::with_capacity(self.keys.len());
            for key in &self.keys {
                let mut placeholders = Vec::with_capacity(key.len());
                for value in key.values() {
                    params.push(value.clone());
                    placeholders.push(format!("${}", params.len()));
                }
                tuples.push(if placeholders.len() == 1 {
                    placeholders.remove(0)
                } else {
                    format!("({})", placeholders.join(", "))
                });
            }

            if columns.len() == 1 {
                sql.push_str(&format!(" WHERE {} IN ({})", columns[0], tuples.join(", ")));
            } else {
                sql.push_str(&format!(" WHERE ({}) IN ({})", columns.join(", "), tuples.join(", ")));
            }
        }

        if !self.order_by.is_empty() {
            let clauses: Vec<String> = self
                .order_by
                .iter()
                .map(|order| {
                    let direction = if order.descending { "DESC" } else { "ASC" };
                    format!("{} {}", quote_identifier(&order.column), direction)
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", clauses.join(", ")));
        }

        (sql, params)
    }
}

impl fmt::Display for FetchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] for {} keys",
            self.entity_type,
            self.key_columns.join(", "),
            self.keys.len()
        )
    }
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Blocking, caller-owned storage session
pub trait StorageSession: Send + Sync {
    fn fetch(&self, query: &FetchQuery) -> StorageResult<Vec<EntityRef>>;
}

/// An open storage connection
#[async_trait]
pub trait StorageConnection: Send {
    async fn fetch(&mut self, query: &FetchQuery) -> StorageResult<Vec<EntityRef>>;
}

/// Opens storage connections on demand
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self) -> StorageResult<Box<dyn StorageConnection>>;
}

/// The storage capability a loader fetches through
#[derive(Clone)]
pub enum StorageBinding {
    Session(Arc<dyn StorageSession>),
    Factory(Arc<dyn ConnectionFactory>),
}

impl StorageBinding {
    pub fn kind(&self) -> &'static str {
        match self {
            StorageBinding::Session(_) => "session",
            StorageBinding::Factory(_) => "connection factory",
        }
    }

    /// Execute one fetch.
    ///
    /// Session fetches run on the blocking pool; factory fetches open a fresh
    /// connection that is dropped once the rows are read.
    pub async fn fetch(&self, query: &FetchQuery) -> StorageResult<Vec<EntityRef>> {
        match self {
            StorageBinding::Session(session) => {
                let session = Arc::clone(session);
                let query = query.clone();
                tokio::task::spawn_blocking(move || session.fetch(&query))
                    .await
                    .map_err(|err| {
                        if err.is_cancelled() {
                            StorageError::Cancelled
                        } else {
                            StorageError::Backend(format!("Session fetch panicked: {}", err))
                        }
                    })?
            }
            StorageBinding::Factory(factory) => {
                let mut connection = factory.connect().await?;
                connection.fetch(query).await
            }
        }
    }
}

impl fmt::Debug for StorageBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StorageBinding").field(&self.kind()).finish()
    }
}

//! PostgreSQL storage binding backed by a sqlx connection pool

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo};
use std::time::Duration;

use super::{ConnectionFactory, FetchQuery, StorageConnection, StorageError, StorageResult};
use crate::entity::{DynamicEntity, EntityRef};
use crate::value::Value;

/// Pool options for [`PgConnectionFactory::connect`]
#[derive(Debug, Clone)]
pub struct PgPoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PgPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Hands out pooled PostgreSQL connections
#[derive(Debug, Clone)]
pub struct PgConnectionFactory {
    pool: PgPool,
}

impl PgConnectionFactory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`
    pub async fn connect_url(database_url: &str, config: PgPoolConfig) -> StorageResult<Self> {
        if !database_url.starts_with("postgresql://") && !database_url.starts_with("postgres://") {
            return Err(StorageError::Connection("Invalid PostgreSQL URL scheme".to_string()));
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Connection(format!("Failed to create PostgreSQL pool: {}", e)))?;

        tracing::info!("PostgreSQL pool ready (max {} connections)", config.max_connections);
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionFactory for PgConnectionFactory {
    async fn connect(&self) -> StorageResult<Box<dyn StorageConnection>> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StorageError::Connection(format!("Failed to acquire connection: {}", e)))?;
        Ok(Box::new(PgStorageConnection { conn }))
    }
}

/// A pooled connection; returned to the pool on drop
pub struct PgStorageConnection {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl StorageConnection for PgStorageConnection {
    async fn fetch(&mut self, query: &FetchQuery) -> StorageResult<Vec<EntityRef>> {
        let (sql, params) = query.to_sql_with_params();
        tracing::debug!("Executing batch fetch: {} ({} params)", sql, params.len());

        let mut statement = sqlx::query(&sql);
        for param in &params {
            statement = bind_value(statement, param);
        }

        let rows = statement.fetch_all(&mut *self.conn).await?;
        rows.iter()
            .map(|row| decode_row(&query.entity_type, row).map(DynamicEntity::into_ref))
            .collect()
    }
}

fn bind_value<'q>(query: Query<'q, Postgres, PgArguments>, value: &Value) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
        Value::Uuid(u) => query.bind(*u),
        Value::DateTime(dt) => query.bind(*dt),
        Value::Timestamp(ts) => query.bind(*ts),
        Value::Date(d) => query.bind(*d),
        Value::Time(t) => query.bind(*t),
        Value::Interval(d) => query.bind(*d),
        Value::Json(j) => query.bind(j.clone()),
    }
}

/// Decode every column of a row into a map-backed entity
pub fn decode_row(entity_type: &str, row: &PgRow) -> StorageResult<DynamicEntity> {
    let mut entity = DynamicEntity::new(entity_type);
    for (index, column) in row.columns().iter().enumerate() {
        entity.set_column(column.name(), decode_column(row, index)?);
    }
    Ok(entity)
}

fn decode_column(row: &PgRow, index: usize) -> StorageResult<Value> {
    let type_name = row.columns()[index].type_info().name();

    let value = match type_name {
        "BOOL" => Value::from(get::<bool>(row, index)?),
        "INT2" => Value::from(get::<i16>(row, index)?.map(i64::from)),
        "INT4" => Value::from(get::<i32>(row, index)?),
        "INT8" => Value::from(get::<i64>(row, index)?),
        "FLOAT4" => Value::from(get::<f32>(row, index)?.map(f64::from)),
        "FLOAT8" => Value::from(get::<f64>(row, index)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" => Value::from(get::<String>(row, index)?),
        "BYTEA" => Value::from(get::<Vec<u8>>(row, index)?),
        "UUID" => Value::from(get::<uuid::Uuid>(row, index)?),
        "TIMESTAMPTZ" => Value::from(get::<chrono::DateTime<chrono::Utc>>(row, index)?),
        "TIMESTAMP" => Value::from(get::<chrono::NaiveDateTime>(row, index)?),
        "DATE" => Value::from(get::<chrono::NaiveDate>(row, index)?),
        "TIME" => Value::from(get::<chrono::NaiveTime>(row, index)?),
        "INTERVAL" => Value::from(get::<sqlx::postgres::types::PgInterval>(row, index)?.map(interval_to_duration)),
        "JSON" | "JSONB" => Value::from(get::<serde_json::Value>(row, index)?),
        other => match get::<String>(row, index) {
            Ok(value) => Value::from(value),
            Err(_) => {
                return Err(StorageError::Decode(format!(
                    "Unsupported column type '{}' for column '{}'",
                    other,
                    row.columns()[index].name()
                )))
            }
        },
    };
    Ok(value)
}

fn get<'r, T>(row: &'r PgRow, index: usize) -> StorageResult<Option<T>>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index).map_err(StorageError::from)
}

/// Months count as 30 days
fn interval_to_duration(interval: sqlx::postgres::types::PgInterval) -> chrono::Duration {
    chrono::Duration::days(i64::from(interval.months) * 30 + i64::from(interval.days))
        + chrono::Duration::microseconds(interval.microseconds)
}

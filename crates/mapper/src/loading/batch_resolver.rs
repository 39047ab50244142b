//! Batched Relationship Resolver - One storage round trip per relationship
//! for any number of owners

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::entity::{BatchKey, EntityRef, RelationValue};
use crate::error::{MapperError, MapperResult};
use crate::metadata::{MetadataProvider, RelationshipMeta};
use crate::storage::{FetchQuery, StorageBinding, StorageError};

/// Resolves a relationship for a set of owner keys with a single fetch
#[derive(Clone)]
pub struct BatchResolver {
    binding: StorageBinding,
    provider: Arc<dyn MetadataProvider>,
    fetch_timeout: Option<Duration>,
}

impl BatchResolver {
    pub fn new(binding: StorageBinding, provider: Arc<dyn MetadataProvider>) -> Self {
        Self {
            binding,
            provider,
            fetch_timeout: None,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn binding(&self) -> &StorageBinding {
        &self.binding
    }

    /// The grouped fetch for a relationship over `keys`
    pub fn query_for(&self, relationship: &RelationshipMeta, keys: Vec<BatchKey>) -> MapperResult<FetchQuery> {
        relationship.validate()?;
        let target = self
            .provider
            .entity(&relationship.target)
            .ok_or_else(|| MapperError::UnknownEntity(relationship.target.clone()))?;
        Ok(FetchQuery::for_relationship(relationship, &target, keys))
    }

    /// Resolve a relationship for every key in `keys`.
    ///
    /// Keys are deduplicated and every requested key appears in the result:
    /// an ordered list for collections (possibly empty), the first matching
    /// row or null otherwise. Keys with a null component never reach storage.
    /// At most one fetch is issued; none if no key survives.
    pub async fn resolve_batch<I>(
        &self,
        relationship: &RelationshipMeta,
        keys: I,
    ) -> MapperResult<HashMap<BatchKey, RelationValue>>
    where
        I: IntoIterator<Item = BatchKey>,
    {
        let mut seen = HashSet::new();
        let requested: Vec<BatchKey> = keys.into_iter().filter(|key| seen.insert(key.clone())).collect();
        let fetchable: Vec<BatchKey> = requested.iter().filter(|key| !key.has_null()).cloned().collect();

        if fetchable.is_empty() {
            return Ok(group_rows(relationship, &requested, Vec::new()));
        }

        let query = self.query_for(relationship, fetchable)?;
        tracing::debug!(
            "Batch fetching '{}' ({}) for {} keys via {}",
            relationship.name,
            query.entity_type,
            query.keys.len(),
            self.binding.kind()
        );

        let rows = match self.fetch_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.binding.fetch(&query))
                .await
                .map_err(|_| {
                    tracing::warn!("Batch fetch of {} timed out after {:?}", query, timeout);
                    StorageError::Timeout(timeout)
                })??,
            None => self.binding.fetch(&query).await?,
        };

        tracing::debug!("Batch fetch of '{}' returned {} rows", relationship.name, rows.len());
        Ok(group_rows(relationship, &requested, rows))
    }
}

/// Group fetched rows by their remote key tuple, in fetch order
pub(crate) fn group_rows(
    relationship: &RelationshipMeta,
    keys: &[BatchKey],
    rows: Vec<EntityRef>,
) -> HashMap<BatchKey, RelationValue> {
    let mut grouped: HashMap<BatchKey, Vec<EntityRef>> = HashMap::new();
    for row in rows {
        let key = BatchKey::remote_for(&*row, relationship);
        grouped.entry(key).or_default().push(row);
    }

    keys.iter()
        .map(|key| {
            let rows = grouped.remove(key).unwrap_or_default();
            let value = if relationship.is_collection {
                RelationValue::Many(rows)
            } else {
                RelationValue::One(rows.into_iter().next())
            };
            (key.clone(), value)
        })
        .collect()
}

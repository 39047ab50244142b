//! Graph Materializer - Walks entity instances into depth-bounded records

use std::sync::Arc;

use super::batch_resolver::BatchResolver;
use super::config::LoaderConfig;
use super::traversal::Traversal;
use crate::entity::EntityRef;
use crate::error::{MapperError, MapperResult};
use crate::record::Record;
use crate::schema::{SchemaSynthesizer, SchemaType, ValidatedObject};
use crate::storage::{ConnectionFactory, StorageBinding, StorageSession};

/// Shape of a materialization result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// The plain nested record
    Record,
    /// The record parsed through the root schema
    #[default]
    Validated,
}

/// A materialized instance
#[derive(Debug, Clone)]
pub enum Materialized {
    Record(Record),
    Validated(ValidatedObject),
}

impl Materialized {
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Materialized::Record(record) => Some(record),
            Materialized::Validated(_) => None,
        }
    }

    pub fn as_validated(&self) -> Option<&ValidatedObject> {
        match self {
            Materialized::Record(_) => None,
            Materialized::Validated(object) => Some(object),
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Materialized::Record(record) => Some(record),
            Materialized::Validated(_) => None,
        }
    }

    pub fn into_validated(self) -> Option<ValidatedObject> {
        match self {
            Materialized::Record(_) => None,
            Materialized::Validated(object) => Some(object),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Materialized::Record(record) => record.to_json(),
            Materialized::Validated(object) => object.to_json(),
        }
    }
}

/// Materializes entity graphs against synthesized schemas.
///
/// Blocking materialization only reads relations already resident on the
/// instances. Async materialization fetches unloaded relations through the
/// configured storage binding, one fetch per relationship per depth level.
pub struct GraphLoader {
    synthesizer: Arc<SchemaSynthesizer>,
    binding: Option<StorageBinding>,
    config: LoaderConfig,
}

impl GraphLoader {
    /// Create a loader without a storage binding
    pub fn new(synthesizer: Arc<SchemaSynthesizer>) -> Self {
        Self {
            synthesizer,
            binding: None,
            config: LoaderConfig::default(),
        }
    }

    /// Fetch through a caller-owned blocking session
    pub fn with_session(mut self, session: Arc<dyn StorageSession>) -> Self {
        self.binding = Some(StorageBinding::Session(session));
        self
    }

    /// Fetch through connections opened per batch
    pub fn with_connection_factory(mut self, factory: Arc<dyn ConnectionFactory>) -> Self {
        self.binding = Some(StorageBinding::Factory(factory));
        self
    }

    pub fn with_binding(mut self, binding: StorageBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn synthesizer(&self) -> &Arc<SchemaSynthesizer> {
        &self.synthesizer
    }

    pub fn binding(&self) -> Option<&StorageBinding> {
        self.binding.as_ref()
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Materialize one instance from loaded state only
    pub fn materialize_sync(&self, entity: &EntityRef, depth: i32, mode: OutputMode) -> MapperResult<Materialized> {
        single(self.run_sync(std::slice::from_ref(entity), depth, mode, None)?)
    }

    /// Materialize several instances from loaded state only, in input order
    pub fn materialize_many_sync(
        &self,
        entities: &[EntityRef],
        depth: i32,
        mode: OutputMode,
    ) -> MapperResult<Vec<Materialized>> {
        self.run_sync(entities, depth, mode, None)
    }

    /// Blocking materialization against an explicit root schema
    pub fn materialize_sync_with_schema(
        &self,
        entity: &EntityRef,
        schema: &Arc<SchemaType>,
        depth: i32,
        mode: OutputMode,
    ) -> MapperResult<Materialized> {
        single(self.run_sync(std::slice::from_ref(entity), depth, mode, Some(schema))?)
    }

    /// Materialize one instance, fetching unloaded relations
    pub async fn materialize(&self, entity: &EntityRef, depth: i32, mode: OutputMode) -> MapperResult<Materialized> {
        single(self.run(std::slice::from_ref(entity), depth, mode, None).await?)
    }

    /// Materialize several instances, sharing one fetch per relationship and
    /// level across all of them
    pub async fn materialize_many(
        &self,
        entities: &[EntityRef],
        depth: i32,
        mode: OutputMode,
    ) -> MapperResult<Vec<Materialized>> {
        self.run(entities, depth, mode, None).await
    }

    /// Async materialization against an explicit root schema
    pub async fn materialize_with_schema(
        &self,
        entity: &EntityRef,
        schema: &Arc<SchemaType>,
        depth: i32,
        mode: OutputMode,
    ) -> MapperResult<Materialized> {
        single(self.run(std::slice::from_ref(entity), depth, mode, Some(schema)).await?)
    }

    /// Validated async materialization at the configured depth
    pub async fn load(&self, entity: &EntityRef) -> MapperResult<ValidatedObject> {
        let materialized = self
            .materialize(entity, self.config.async_depth, OutputMode::Validated)
            .await?;
        validated(materialized)
    }

    /// Validated blocking materialization at the configured depth
    pub fn load_sync(&self, entity: &EntityRef) -> MapperResult<ValidatedObject> {
        let materialized = self.materialize_sync(entity, self.config.sync_depth, OutputMode::Validated)?;
        validated(materialized)
    }

    fn run_sync(
        &self,
        entities: &[EntityRef],
        depth: i32,
        mode: OutputMode,
        schema: Option<&Arc<SchemaType>>,
    ) -> MapperResult<Vec<Materialized>> {
        let mut traversal = Traversal::new(&self.synthesizer, entities, depth, schema)?;
        loop {
            // Nothing is fetched in blocking mode; unloaded relations error out
            traversal.expand(false)?;
            if !traversal.descend()? {
                break;
            }
        }

        tracing::debug!(
            "Materialized {} instances over {} levels from loaded state",
            entities.len(),
            traversal.levels()
        );
        finish(traversal, mode)
    }

    async fn run(
        &self,
        entities: &[EntityRef],
        depth: i32,
        mode: OutputMode,
        schema: Option<&Arc<SchemaType>>,
    ) -> MapperResult<Vec<Materialized>> {
        let binding = self.binding.clone().ok_or(MapperError::MissingBinding)?;
        let resolver = BatchResolver::new(binding, Arc::clone(self.synthesizer.provider()))
            .with_fetch_timeout(self.config.fetch_timeout);

        let mut traversal = Traversal::new(&self.synthesizer, entities, depth, schema)?;
        let mut fetches = 0usize;
        loop {
            let requests = traversal.expand(true)?;
            for (group, request) in requests.into_iter().enumerate() {
                tracing::debug!(
                    "Resolving {}.{} for {} owners",
                    request.owner_type,
                    request.relationship.name,
                    request.keys.len()
                );
                let resolved = resolver.resolve_batch(&request.relationship, request.keys).await?;
                traversal.supply(group, resolved);
                fetches += 1;
            }
            if !traversal.descend()? {
                break;
            }
        }

        tracing::debug!(
            "Materialized {} instances over {} levels with {} batch fetches",
            entities.len(),
            traversal.levels(),
            fetches
        );
        finish(traversal, mode)
    }
}

fn finish(traversal: Traversal<'_>, mode: OutputMode) -> MapperResult<Vec<Materialized>> {
    traversal
        .into_records()
        .into_iter()
        .map(|(schema, record)| match mode {
            OutputMode::Record => Ok(Materialized::Record(record)),
            OutputMode::Validated => schema.validate(&record).map(Materialized::Validated),
        })
        .collect()
}

fn single(results: Vec<Materialized>) -> MapperResult<Materialized> {
    results
        .into_iter()
        .next()
        .ok_or_else(|| MapperError::Configuration("materialization produced no record".to_string()))
}

fn validated(materialized: Materialized) -> MapperResult<ValidatedObject> {
    match materialized {
        Materialized::Validated(object) => Ok(object),
        Materialized::Record(_) => Err(MapperError::Configuration(
            "validated output requested but a plain record was produced".to_string(),
        )),
    }
}

//! Schema Synthesizer - Derives schema types from entity metadata

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::registry::{SchemaRegistry, StagedSchemas};
use super::{FieldSpec, SchemaOptions, SchemaType};
use crate::entity::Entity;
use crate::error::{MapperError, MapperResult};
use crate::metadata::{EntityMetadata, MetadataProvider};

/// Builds and memoizes schema types, one per canonical name
pub struct SchemaSynthesizer {
    provider: Arc<dyn MetadataProvider>,
    registry: Arc<SchemaRegistry>,
}

impl SchemaSynthesizer {
    /// Create a synthesizer with its own registry
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self::with_registry(provider, Arc::new(SchemaRegistry::new()))
    }

    /// Create a synthesizer sharing an existing registry
    pub fn with_registry(provider: Arc<dyn MetadataProvider>, registry: Arc<SchemaRegistry>) -> Self {
        Self { provider, registry }
    }

    pub fn provider(&self) -> &Arc<dyn MetadataProvider> {
        &self.provider
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub(crate) fn metadata(&self, entity_type: &str) -> MapperResult<Arc<EntityMetadata>> {
        self.provider
            .entity(entity_type)
            .ok_or_else(|| MapperError::UnknownEntity(entity_type.to_string()))
    }

    /// The schema type for an entity type.
    ///
    /// If a type is already registered under the canonical name it is returned
    /// as-is and `options` are ignored. Fails with [`MapperError::Mapping`] when
    /// a column's storage type is unrecognized; in that case nothing built by
    /// this call is registered.
    pub fn type_for(&self, entity_type: &str, options: SchemaOptions) -> MapperResult<Arc<SchemaType>> {
        let metadata = self.metadata(entity_type)?;
        let name = metadata.canonical_name(options.name.as_deref());

        if let Some(schema) = self.registry.get(&name) {
            return Ok(schema);
        }

        self.registry.get_or_build(&name, || {
            let mut synthesis = Synthesis::new(self);
            let root = synthesis.build(&metadata, name.clone(), &options)?;
            Ok(StagedSchemas {
                root,
                completed: synthesis.completed,
            })
        })
    }

    /// The schema type selected by an instance's own runtime type and
    /// schema name override
    pub fn type_for_entity(&self, entity: &dyn Entity) -> MapperResult<Arc<SchemaType>> {
        let options = SchemaOptions {
            name: entity.schema_name().map(str::to_string),
            ..SchemaOptions::default()
        };
        self.type_for(entity.entity_type(), options)
    }
}

/// State of one top-level synthesis run
struct Synthesis<'a> {
    synthesizer: &'a SchemaSynthesizer,
    /// Scalar-only stubs of types still under construction
    stubs: HashMap<String, Arc<SchemaType>>,
    /// Types completed during this run, awaiting commit
    completed: Vec<Arc<SchemaType>>,
}

impl<'a> Synthesis<'a> {
    fn new(synthesizer: &'a SchemaSynthesizer) -> Self {
        Self {
            synthesizer,
            stubs: HashMap::new(),
            completed: Vec::new(),
        }
    }

    /// Resolve a relationship target with default options
    fn resolve(&mut self, entity_type: &str) -> MapperResult<Arc<SchemaType>> {
        let metadata = self.synthesizer.metadata(entity_type)?;
        let name = metadata.canonical_name(None);

        if let Some(schema) = self.completed.iter().find(|schema| schema.name() == name) {
            return Ok(Arc::clone(schema));
        }
        if let Some(stub) = self.stubs.get(&name) {
            tracing::debug!("Schema '{}' is under construction, using its scalar stub", name);
            return Ok(Arc::clone(stub));
        }
        if let Some(schema) = self.synthesizer.registry.get(&name) {
            return Ok(schema);
        }

        self.build(&metadata, name, &SchemaOptions::default())
    }

    fn build(
        &mut self,
        metadata: &EntityMetadata,
        name: String,
        options: &SchemaOptions,
    ) -> MapperResult<Arc<SchemaType>> {
        let excluded: HashSet<&str> = options
            .exclude
            .iter()
            .chain(metadata.excluded.iter())
            .map(String::as_str)
            .collect();
        let config = options
            .config
            .clone()
            .or_else(|| metadata.schema_config.clone())
            .unwrap_or_default();

        let mut scalars = Vec::with_capacity(metadata.columns().len());
        for column in metadata.columns() {
            if excluded.contains(column.name.as_str()) {
                continue;
            }
            let scalar = column.scalar_type().ok_or_else(|| MapperError::Mapping {
                entity: metadata.entity_type.clone(),
                column: column.name.clone(),
                storage_type: column.storage_type.clone(),
            })?;
            scalars.push(FieldSpec::scalar(column.name.clone(), scalar, column.nullable));
        }

        let stub = Arc::new(SchemaType::partial(name.clone(), scalars, config));
        self.stubs.insert(name.clone(), Arc::clone(&stub));

        let mut relations = Vec::with_capacity(metadata.relationships().len());
        for relationship in metadata.relationships() {
            if excluded.contains(relationship.name.as_str()) {
                continue;
            }
            let target = self.resolve(&relationship.target)?;
            let field = if relationship.direction.is_many() {
                FieldSpec::nested_many(relationship.name.clone(), target)
            } else {
                FieldSpec::nested_one(relationship.name.clone(), target)
            };
            relations.push(field);
        }

        self.stubs.remove(&name);
        let schema = Arc::new(SchemaType::promote(&stub, relations));
        tracing::debug!(
            "Synthesized schema '{}' for entity '{}' ({} fields)",
            name,
            metadata.entity_type,
            schema.fields().len()
        );
        self.completed.push(Arc::clone(&schema));
        Ok(schema)
    }
}

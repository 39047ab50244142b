//! Level-wise graph traversal shared by the blocking and async drivers
//!
//! A traversal expands one depth level at a time. Expanding a level reads
//! scalars and loaded relations directly and collects unloaded relations into
//! fetch requests, one per (owner type, relationship). The driver answers the
//! requests however it can, then descends into the next level.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entity::{BatchKey, EntityRef, RelationValue};
use crate::error::{MapperError, MapperResult};
use crate::metadata::{EntityMetadata, RelationshipMeta};
use crate::record::{FieldValue, Record};
use crate::schema::{FieldKind, SchemaSynthesizer, SchemaType};

/// One grouped fetch needed to finish the current level
#[derive(Debug, Clone)]
pub(crate) struct FetchRequest {
    pub owner_type: String,
    pub relationship: RelationshipMeta,
    pub keys: Vec<BatchKey>,
}

enum Slot {
    Ready(FieldValue),
    One(usize),
    Many(Vec<usize>),
    Awaiting {
        group: usize,
        key: BatchKey,
        collection: bool,
    },
}

struct Node {
    entity: EntityRef,
    schema: Arc<SchemaType>,
    metadata: Arc<EntityMetadata>,
    /// Remaining depth budget, always positive for expanded nodes
    depth: i32,
    fields: Vec<(String, Slot)>,
}

pub(crate) struct Traversal<'a> {
    synthesizer: &'a SchemaSynthesizer,
    nodes: Vec<Node>,
    roots: Vec<usize>,
    frontier: Vec<usize>,
    next: Vec<usize>,
    awaiting: Vec<usize>,
    requests: Vec<FetchRequest>,
    request_index: HashMap<(String, String), usize>,
    results: Vec<Option<HashMap<BatchKey, RelationValue>>>,
    levels: usize,
}

fn empty_value(collection: bool) -> FieldValue {
    if collection {
        FieldValue::List(Vec::new())
    } else {
        FieldValue::Null
    }
}

impl<'a> Traversal<'a> {
    /// Start a traversal over `roots`, each selecting its own schema unless
    /// `root_schema` is given
    pub fn new(
        synthesizer: &'a SchemaSynthesizer,
        roots: &[EntityRef],
        depth: i32,
        root_schema: Option<&Arc<SchemaType>>,
    ) -> MapperResult<Self> {
        let mut traversal = Self {
            synthesizer,
            nodes: Vec::with_capacity(roots.len()),
            roots: Vec::with_capacity(roots.len()),
            frontier: Vec::new(),
            next: Vec::new(),
            awaiting: Vec::new(),
            requests: Vec::new(),
            request_index: HashMap::new(),
            results: Vec::new(),
            levels: 0,
        };

        for entity in roots {
            let schema = match root_schema {
                Some(schema) => Arc::clone(schema),
                None => synthesizer.type_for_entity(&**entity)?,
            };
            let metadata = synthesizer.metadata(entity.entity_type())?;
            let index = traversal.push(Arc::clone(entity), schema, metadata, depth);
            traversal.roots.push(index);
            if depth > 0 {
                traversal.frontier.push(index);
            }
        }

        Ok(traversal)
    }

    pub fn levels(&self) -> usize {
        self.levels
    }

    fn push(&mut self, entity: EntityRef, schema: Arc<SchemaType>, metadata: Arc<EntityMetadata>, depth: i32) -> usize {
        self.nodes.push(Node {
            entity,
            schema,
            metadata,
            depth,
            fields: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Add a related entity to the next level, under its own schema
    fn spawn(&mut self, entity: EntityRef, depth: i32) -> MapperResult<usize> {
        let schema = self.synthesizer.type_for_entity(&*entity)?;
        let metadata = self.synthesizer.metadata(entity.entity_type())?;
        let index = self.push(entity, schema, metadata, depth);
        self.next.push(index);
        Ok(index)
    }

    fn attach(&mut self, value: RelationValue, depth: i32) -> MapperResult<Slot> {
        let slot = match value {
            RelationValue::One(None) => Slot::Ready(FieldValue::Null),
            RelationValue::One(Some(entity)) => Slot::One(self.spawn(entity, depth)?),
            RelationValue::Many(entities) => {
                let mut children = Vec::with_capacity(entities.len());
                for entity in entities {
                    children.push(self.spawn(entity, depth)?);
                }
                Slot::Many(children)
            }
        };
        Ok(slot)
    }

    fn request(&mut self, owner_type: &str, relationship: &RelationshipMeta, key: BatchKey) -> usize {
        let id = (owner_type.to_string(), relationship.name.clone());
        let group = match self.request_index.get(&id) {
            Some(&group) => group,
            None => {
                self.requests.push(FetchRequest {
                    owner_type: owner_type.to_string(),
                    relationship: relationship.clone(),
                    keys: Vec::new(),
                });
                self.request_index.insert(id, self.requests.len() - 1);
                self.requests.len() - 1
            }
        };
        let keys = &mut self.requests[group].keys;
        if !keys.contains(&key) {
            keys.push(key);
        }
        group
    }

    /// Expand the current level.
    ///
    /// Returns the fetches needed to fill unloaded relations. When
    /// `can_fetch` is false an unloaded relation is an error instead.
    pub fn expand(&mut self, can_fetch: bool) -> MapperResult<Vec<FetchRequest>> {
        let frontier = std::mem::take(&mut self.frontier);
        if frontier.is_empty() {
            return Ok(Vec::new());
        }
        self.levels += 1;

        for index in frontier {
            let (entity, schema, metadata, depth) = {
                let node = &self.nodes[index];
                (
                    Arc::clone(&node.entity),
                    Arc::clone(&node.schema),
                    Arc::clone(&node.metadata),
                    node.depth,
                )
            };

            let mut fields = Vec::with_capacity(schema.fields().len());
            let mut waits = false;
            for field in schema.fields() {
                match &field.kind {
                    FieldKind::Scalar(_) => {
                        if metadata.column(&field.name).is_some() {
                            let value = FieldValue::scalar(entity.column_value(&field.name));
                            fields.push((field.name.clone(), Slot::Ready(value)));
                        }
                    }
                    FieldKind::NestedOne(_) | FieldKind::NestedMany(_) => {
                        let Some(relationship) = metadata.relationship(&field.name) else {
                            continue;
                        };
                        let collection = relationship.is_collection;

                        if depth - 1 <= 0 {
                            fields.push((field.name.clone(), Slot::Ready(empty_value(collection))));
                            continue;
                        }

                        let slot = match entity.loaded_relation(&relationship.name) {
                            Some(value) => self.attach(value, depth - 1)?,
                            None => {
                                // A null key component has nothing to fetch in either mode
                                let key = BatchKey::local_for(&*entity, relationship);
                                if key.has_null() {
                                    Slot::Ready(empty_value(collection))
                                } else if !can_fetch {
                                    return Err(MapperError::RelationNotLoaded {
                                        entity: entity.entity_type().to_string(),
                                        relation: relationship.name.clone(),
                                    });
                                } else {
                                    waits = true;
                                    let group = self.request(entity.entity_type(), relationship, key.clone());
                                    Slot::Awaiting { group, key, collection }
                                }
                            }
                        };
                        fields.push((field.name.clone(), slot));
                    }
                }
            }

            self.nodes[index].fields = fields;
            if waits {
                self.awaiting.push(index);
            }
        }

        self.request_index.clear();
        let requests = std::mem::take(&mut self.requests);
        self.results = vec![None; requests.len()];
        Ok(requests)
    }

    /// Provide the resolved values for one request of the current level
    pub fn supply(&mut self, group: usize, resolved: HashMap<BatchKey, RelationValue>) {
        if let Some(slot) = self.results.get_mut(group) {
            *slot = Some(resolved);
        }
    }

    /// Fill awaiting relations from supplied results and move to the next
    /// level. Returns false once there is nothing left to expand.
    pub fn descend(&mut self) -> MapperResult<bool> {
        let results = std::mem::take(&mut self.results);

        for index in std::mem::take(&mut self.awaiting) {
            let depth = self.nodes[index].depth;
            let fields = std::mem::take(&mut self.nodes[index].fields);
            let mut filled = Vec::with_capacity(fields.len());

            for (name, slot) in fields {
                let slot = match slot {
                    Slot::Awaiting { group, key, collection } => {
                        let value = results
                            .get(group)
                            .and_then(Option::as_ref)
                            .and_then(|resolved| resolved.get(&key).cloned())
                            .unwrap_or_else(|| RelationValue::empty(collection));
                        self.attach(value, depth - 1)?
                    }
                    other => other,
                };
                filled.push((name, slot));
            }

            self.nodes[index].fields = filled;
        }

        self.frontier = std::mem::take(&mut self.next);
        Ok(!self.frontier.is_empty())
    }

    /// Assemble the nested records, one per root, with each root's schema
    pub fn into_records(self) -> Vec<(Arc<SchemaType>, Record)> {
        let roots = self.roots;
        let mut nodes: Vec<Option<Node>> = self.nodes.into_iter().map(Some).collect();

        roots
            .into_iter()
            .filter_map(|index| {
                let schema = nodes[index].as_ref().map(|node| Arc::clone(&node.schema))?;
                Some((schema, assemble(&mut nodes, index)))
            })
            .collect()
    }
}

fn assemble(nodes: &mut [Option<Node>], index: usize) -> Record {
    let Some(node) = nodes.get_mut(index).and_then(Option::take) else {
        return Record::new();
    };

    let mut record = Record::new().with_schema(node.schema);
    for (name, slot) in node.fields {
        let value = match slot {
            Slot::Ready(value) => value,
            Slot::One(child) => FieldValue::Record(assemble(nodes, child)),
            Slot::Many(children) => FieldValue::List(children.into_iter().map(|child| assemble(nodes, child)).collect()),
            Slot::Awaiting { collection, .. } => empty_value(collection),
        };
        record.insert(name, value);
    }
    record
}

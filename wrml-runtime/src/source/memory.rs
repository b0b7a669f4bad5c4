//! In-memory schema registry

use super::SchemaSource;
use crate::error::SchemaSourceError;
use dashmap::DashMap;
use std::sync::Arc;
use wrml_types::{Schema, SchemaId};

/// A concurrent, programmatically filled schema registry
#[derive(Debug, Default)]
pub struct InMemorySchemaSource {
    schemas: DashMap<SchemaId, Arc<Schema>>,
}

impl InMemorySchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a set of schemas
    pub fn with_schemas(schemas: impl IntoIterator<Item = Schema>) -> Self {
        let source = Self::new();
        source.register_all(schemas);
        source
    }

    /// Register a schema, returning the one it replaced
    ///
    /// Prototypes already built from the replaced schema are not rebuilt;
    /// invalidate them through the resolver if that matters.
    pub fn register(&self, schema: Schema) -> Option<Arc<Schema>> {
        self.schemas.insert(schema.id.clone(), Arc::new(schema))
    }

    pub fn register_all(&self, schemas: impl IntoIterator<Item = Schema>) {
        for schema in schemas {
            self.register(schema);
        }
    }

    pub fn remove(&self, id: &SchemaId) -> Option<Arc<Schema>> {
        self.schemas.remove(id).map(|(_, schema)| schema)
    }

    pub fn contains(&self, id: &SchemaId) -> bool {
        self.schemas.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// All registered ids, sorted
    pub fn ids(&self) -> Vec<SchemaId> {
        let mut ids: Vec<SchemaId> = self.schemas.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

impl SchemaSource for InMemorySchemaSource {
    fn get_schema(&self, id: &SchemaId) -> Result<Arc<Schema>, SchemaSourceError> {
        self.schemas
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SchemaSourceError::NotFound(id.clone()))
    }

    fn has_schema(&self, id: &SchemaId) -> bool {
        self.contains(id)
    }

    fn source_name(&self) -> &str {
        "memory"
    }
}

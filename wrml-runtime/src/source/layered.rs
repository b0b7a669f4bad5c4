//! Layered schema lookup

use super::SchemaSource;
use crate::error::SchemaSourceError;
use std::fmt;
use std::sync::Arc;
use wrml_types::{Schema, SchemaId};

/// Consults a stack of sources in order; the first that knows an id wins
///
/// Typical stacking puts application schema directories first and the
/// built-in system schemas last, so applications may shadow a system schema.
#[derive(Default)]
pub struct LayeredSchemaSource {
    layers: Vec<Arc<dyn SchemaSource>>,
}

impl LayeredSchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer with lower precedence than the existing ones
    pub fn push(&mut self, layer: Arc<dyn SchemaSource>) {
        self.layers.push(layer);
    }

    pub fn with_layer(mut self, layer: Arc<dyn SchemaSource>) -> Self {
        self.push(layer);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl fmt::Debug for LayeredSchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.layers.iter().map(|layer| layer.source_name()))
            .finish()
    }
}

impl SchemaSource for LayeredSchemaSource {
    fn get_schema(&self, id: &SchemaId) -> Result<Arc<Schema>, SchemaSourceError> {
        for layer in &self.layers {
            match layer.get_schema(id) {
                Ok(schema) => return Ok(schema),
                Err(SchemaSourceError::NotFound(_)) => continue,
                Err(err) => {
                    tracing::warn!(layer = layer.source_name(), schema = %id, error = %err, "schema layer failed");
                    return Err(err);
                }
            }
        }
        Err(SchemaSourceError::NotFound(id.clone()))
    }

    fn has_schema(&self, id: &SchemaId) -> bool {
        self.layers.iter().any(|layer| layer.has_schema(id))
    }

    fn source_name(&self) -> &str {
        "layered"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySchemaSource;

    #[test]
    fn test_first_layer_wins() {
        let app = InMemorySchemaSource::with_schemas([Schema::new("urn:test:A").with_title("app")]);
        let system = InMemorySchemaSource::with_schemas([
            Schema::new("urn:test:A").with_title("system"),
            Schema::new("urn:test:B"),
        ]);

        let layered = LayeredSchemaSource::new()
            .with_layer(Arc::new(app))
            .with_layer(Arc::new(system));

        let a = layered.get_schema(&SchemaId::new("urn:test:A")).unwrap();
        assert_eq!(a.title.as_deref(), Some("app"));
        assert!(layered.has_schema(&SchemaId::new("urn:test:B")));
        assert!(matches!(
            layered.get_schema(&SchemaId::new("urn:test:C")),
            Err(SchemaSourceError::NotFound(_))
        ));
    }
}

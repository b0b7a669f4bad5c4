//! Schema sources
//!
//! A [`SchemaSource`] resolves a schema id to its immutable [`Schema`]
//! document. The runtime never mutates what a source returns; sources must
//! be safe to call from many threads at once and may block on I/O.
//!
//! Provided backends:
//! - [`InMemorySchemaSource`]: concurrent registry, filled programmatically
//! - [`DirectorySchemaSource`]: JSON/YAML schema documents loaded from disk
//! - [`LayeredSchemaSource`]: first hit wins across several sources

mod directory;
mod layered;
mod memory;

pub use directory::DirectorySchemaSource;
pub use layered::LayeredSchemaSource;
pub use memory::InMemorySchemaSource;

use crate::error::SchemaSourceError;
use std::sync::Arc;
use wrml_types::{Schema, SchemaId};

/// Resolves schema ids to schema documents
pub trait SchemaSource: Send + Sync {
    /// Fetch a schema; may block
    fn get_schema(&self, id: &SchemaId) -> Result<Arc<Schema>, SchemaSourceError>;

    /// Cheap membership check
    ///
    /// The default implementation fetches the schema and discards it.
    fn has_schema(&self, id: &SchemaId) -> bool {
        self.get_schema(id).is_ok()
    }

    /// Name used in logs
    fn source_name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<S: SchemaSource + ?Sized> SchemaSource for Arc<S> {
    fn get_schema(&self, id: &SchemaId) -> Result<Arc<Schema>, SchemaSourceError> {
        (**self).get_schema(id)
    }

    fn has_schema(&self, id: &SchemaId) -> bool {
        (**self).has_schema(id)
    }

    fn source_name(&self) -> &str {
        (**self).source_name()
    }
}

//! Error types for the WRML runtime

use std::path::PathBuf;
use thiserror::Error;
use wrml_types::{SchemaId, TransientKey};

/// Top-level runtime error
#[derive(Debug, Error)]
pub enum Error {
    #[error("Schema source error: {0}")]
    Source(#[from] SchemaSourceError),

    #[error(transparent)]
    Prototype(#[from] PrototypeError),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Heap(#[from] HeapError),

    #[error(transparent)]
    Facade(#[from] FacadeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures reported by a [`SchemaSource`](crate::source::SchemaSource)
#[derive(Debug, Error)]
pub enum SchemaSourceError {
    #[error("schema not found: {0}")]
    NotFound(SchemaId),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON schema {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse YAML schema {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("schema {id} declared twice ({first} and {second})")]
    Duplicate {
        id: SchemaId,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Prototype construction errors
#[derive(Debug, Error)]
pub enum PrototypeError {
    /// A schema reachable from `schema_id` could not be fetched
    #[error("cannot resolve prototype for {schema_id}: schema {missing} is unavailable: {source}")]
    SchemaResolution {
        schema_id: SchemaId,
        missing: SchemaId,
        #[source]
        source: SchemaSourceError,
    },
}

/// Field store write errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("field \"{field}\" is read only in {schema_id}")]
    ReadOnlyField { schema_id: SchemaId, field: String },

    #[error("field \"{field}\" requires a value in {schema_id}")]
    RequiredField { schema_id: SchemaId, field: String },
}

/// Identity heap errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    /// Absorb attempted across native types; shards are partitioned wrong
    #[error("identity conflict: shard for {shard} cannot hold a {model} model")]
    IdentityConflict { shard: SchemaId, model: SchemaId },

    /// Freed models cannot re-enter the heap
    #[error("model {0} has been freed")]
    Freed(TransientKey),
}

/// Static interface dispatch errors
#[derive(Debug, Error)]
pub enum FacadeError {
    #[error("no field or link of {schema_id} answers to accessor \"{accessor}\"")]
    UnknownAccessor { schema_id: SchemaId, accessor: String },

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Heap(#[from] HeapError),

    #[error("link click failed: {0}")]
    Click(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

/// Result type using the top-level [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

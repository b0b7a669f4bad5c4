//! WRML model runtime
//!
//! This crate turns schema documents into live, schema-driven models. It
//! flattens multiply-inherited schemas into cached prototypes, stores model
//! fields with schema defaults and validation, and keeps a per-schema
//! identity heap so that each identified resource has one canonical
//! in-memory instance.
//!
//! # Architecture
//!
//! ```text
//! SchemaSource -> PrototypeResolver -> Prototype (fields, links, accessor tables)
//!                                          |
//!                      Model (DynamicFieldMap) <-> ModelHeap (Shard per schema)
//!                                          |
//!                              StaticInterfaceFacade -> LinkClicker
//! ```
//!
//! Everything hangs off a [`RuntimeContext`]; there is no global state.
//!
//! # Example
//!
//! ```rust,ignore
//! use wrml_runtime::prelude::*;
//!
//! let context = RuntimeContext::from_config(RuntimeConfig::from_file("wrml.yml")?)?;
//! let story = context.new_model(&SchemaId::new("http://schemas.example.com/Story"))?;
//! context.set_field_value(&story, "title", Value::text("Hello"))?;
//!
//! let mut facade = context.facade(story);
//! let title = facade.invoke("getTitle", &[])?;
//! ```

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod defaults;
pub mod error;
pub mod facade;
pub mod field_map;
pub mod heap;
pub mod metrics;
pub mod model;
pub mod prototype;
pub mod source;

pub use config::RuntimeConfig;
pub use context::{RuntimeContext, RuntimeContextBuilder};
pub use defaults::TypeDefaults;
pub use error::{
    ConfigError, Error, FacadeError, FieldError, HeapError, PrototypeError, Result,
    SchemaSourceError,
};
pub use facade::{LinkClicker, NoopLinkClicker, StaticInterfaceFacade};
pub use field_map::{DynamicFieldMap, FieldMap};
pub use heap::{HeapKey, ModelHeap, Shard, ShardEvent, ShardListener, SubscriptionId};
pub use metrics::{MetricsSnapshot, RuntimeMetrics};
pub use model::{HeapState, Hyperlink, ListenerId, Model, ModelEvent, ModelHandle, ModelListener};
pub use prototype::{
    method_key, FieldAccess, FieldAccessor, LinkAccessor, Prototype, PrototypeResolver,
};
pub use source::{DirectorySchemaSource, InMemorySchemaSource, LayeredSchemaSource, SchemaSource};
pub use wrml_types::{
    FieldDecl, FieldKind, LinkDecl, Method, ModelRef, RelationId, Schema, SchemaId, TransientKey,
    Value,
};

/// Commonly used items
pub mod prelude {
    pub use crate::{
        FieldMap, ModelHandle, RuntimeConfig, RuntimeContext, Schema, SchemaId, SchemaSource,
        Value,
    };
}

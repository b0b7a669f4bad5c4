//! The runtime context
//!
//! A [`RuntimeContext`] owns everything a model runtime needs: the schema
//! source, the prototype resolver, the type defaults and the model heap.
//! There is no global state; two contexts never share models or
//! prototypes.

use crate::bootstrap;
use crate::config::RuntimeConfig;
use crate::defaults::TypeDefaults;
use crate::error::{FieldError, HeapError, Result};
use crate::facade::{LinkClicker, NoopLinkClicker, StaticInterfaceFacade};
use crate::field_map::FieldMap;
use crate::heap::{HeapKey, ModelHeap};
use crate::metrics::{MetricsSnapshot, RuntimeMetrics};
use crate::model::{deliver, HeapState, Model, ModelEvent, ModelHandle};
use crate::prototype::{Prototype, PrototypeResolver};
use crate::source::{DirectorySchemaSource, LayeredSchemaSource, SchemaSource};
use std::sync::Arc;
use wrml_types::{SchemaId, Value};

pub struct RuntimeContext {
    config: RuntimeConfig,
    identity_field: Arc<str>,
    defaults: Arc<TypeDefaults>,
    resolver: PrototypeResolver,
    heap: ModelHeap,
    link_clicker: Arc<dyn LinkClicker>,
    metrics: Arc<RuntimeMetrics>,
}

impl RuntimeContext {
    /// Context over `source` with default settings
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        Self::builder(source).build()
    }

    pub fn builder(source: Arc<dyn SchemaSource>) -> RuntimeContextBuilder {
        RuntimeContextBuilder {
            source,
            config: RuntimeConfig::default(),
            link_clicker: None,
        }
    }

    /// Build a context from configuration
    ///
    /// Schema directories are loaded eagerly, first directory first. With
    /// `bootstrap` set, the system schemas sit beneath them.
    pub fn from_config(config: RuntimeConfig) -> Result<Self> {
        let mut layered = LayeredSchemaSource::new();
        let dirs = config.schema_dirs();
        if !dirs.is_empty() {
            layered.push(Arc::new(DirectorySchemaSource::open_all(&dirs)?));
        }
        if config.bootstrap {
            layered.push(Arc::new(bootstrap::system_source()));
        }

        tracing::debug!(layers = layered.len(), identity_field = %config.identity_field, "created runtime context");
        Ok(Self::builder(Arc::new(layered)).config(config).build())
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn resolver(&self) -> &PrototypeResolver {
        &self.resolver
    }

    pub fn defaults(&self) -> &Arc<TypeDefaults> {
        &self.defaults
    }

    pub fn heap(&self) -> &ModelHeap {
        &self.heap
    }

    pub fn link_clicker(&self) -> &Arc<dyn LinkClicker> {
        &self.link_clicker
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn prototype(&self, schema_id: &SchemaId) -> Result<Arc<Prototype>> {
        Ok(self.resolver.get(schema_id)?)
    }

    /// Construct and register an empty model
    pub fn new_model(&self, schema_id: &SchemaId) -> Result<ModelHandle> {
        self.new_model_with(schema_id, std::iter::empty())
    }

    /// Construct a model from stored field values, then register it
    ///
    /// Values are written unchecked, as when materializing a document that
    /// already passed validation elsewhere. When the values carry an
    /// identity that is already known, the canonical model is returned
    /// with these values folded in.
    pub fn new_model_with<I>(&self, schema_id: &SchemaId, fields: I) -> Result<ModelHandle>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let prototype = self.prototype(schema_id)?;
        let mut model = Model::new(prototype, Arc::clone(&self.defaults), Arc::clone(&self.identity_field));
        for (name, value) in fields {
            model.initialize_field(&name, value);
        }
        Ok(self.heap.add(&model.into_handle())?)
    }

    /// Write a field and keep the heap in step with identity changes
    ///
    /// Returns the previous value. If the write gave the model an identity
    /// that another model already holds, `handle` is absorbed; use
    /// [`ModelHeap::canonical`] to reach the surviving instance.
    pub fn set_field_value(&self, handle: &ModelHandle, name: &str, value: Value) -> Result<Value> {
        self.update_field(handle, name, value)
    }

    pub(crate) fn update_field<E>(&self, handle: &ModelHandle, name: &str, value: Value) -> std::result::Result<Value, E>
    where
        E: From<FieldError> + From<HeapError>,
    {
        let (previous, identity) = {
            let mut model = handle.write();
            let before = model.heap_identity();
            let previous = model.set_field_value(name, value)?;
            let after = model.heap_identity();
            (previous, if after != before { after } else { None })
        };

        // Model lock released: the heap takes the shard lock first
        if let Some(identity) = identity {
            self.heap.identify(handle, &identity)?;
        }
        Ok(previous)
    }

    pub fn facade(&self, handle: ModelHandle) -> StaticInterfaceFacade<'_> {
        StaticInterfaceFacade::new(self, handle)
    }

    /// Free a model from whatever state it is in
    ///
    /// A model the heap tracks is removed from it. One the heap no longer
    /// tracks (never added, or absorbed into a canonical instance) is
    /// marked freed directly; a canonical instance it was absorbed into
    /// stays live. Returns `false` if the model was already freed.
    pub fn free(&self, handle: &ModelHandle) -> bool {
        let (schema_id, key) = {
            let model = handle.read();
            (model.schema_id().clone(), model.transient_key())
        };
        if self.heap.free(&schema_id, HeapKey::Transient(key)).is_some() {
            return true;
        }

        let (event, listeners) = {
            let mut model = handle.write();
            if model.heap_state() == &HeapState::Freed {
                return false;
            }
            model.set_heap_state(HeapState::Freed);
            let event = ModelEvent::Freed {
                model: model.model_ref(),
            };
            let listeners = model.listeners_for(&event);
            (event, listeners)
        };

        tracing::debug!(schema = %schema_id, key = %key, "freed untracked model");
        self.metrics.record_freed();
        deliver(listeners, &event);
        true
    }
}

impl std::fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("heap", &self.heap)
            .finish()
    }
}

/// Assembles a [`RuntimeContext`] around an existing schema source
pub struct RuntimeContextBuilder {
    source: Arc<dyn SchemaSource>,
    config: RuntimeConfig,
    link_clicker: Option<Arc<dyn LinkClicker>>,
}

impl RuntimeContextBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn link_clicker(mut self, clicker: Arc<dyn LinkClicker>) -> Self {
        self.link_clicker = Some(clicker);
        self
    }

    pub fn build(self) -> RuntimeContext {
        let metrics = Arc::new(RuntimeMetrics::new());
        RuntimeContext {
            identity_field: Arc::from(self.config.identity_field.as_str()),
            config: self.config,
            defaults: Arc::new(TypeDefaults::new()),
            resolver: PrototypeResolver::with_metrics(self.source, Arc::clone(&metrics)),
            heap: ModelHeap::with_metrics(Arc::clone(&metrics)),
            link_clicker: self
                .link_clicker
                .unwrap_or_else(|| Arc::new(NoopLinkClicker)),
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::source::InMemorySchemaSource;
    use wrml_types::{FieldDecl, FieldKind, Schema};

    fn context() -> RuntimeContext {
        let source = bootstrap::system_source();
        source.register(
            Schema::new("urn:test:Point")
                .with_base(bootstrap::DOCUMENT)
                .with_field(FieldDecl::new("x", FieldKind::Integer))
                .with_field(FieldDecl::new("label", FieldKind::Text).read_only()),
        );
        RuntimeContext::new(Arc::new(source))
    }

    fn point_id() -> SchemaId {
        SchemaId::new("urn:test:Point")
    }

    #[test]
    fn test_new_model_registers() {
        let context = context();
        let point = context.new_model(&point_id()).unwrap();

        assert_eq!(point.read().heap_state(), &HeapState::Registered);
        assert_eq!(point.read().get_field_value("x"), Value::Integer(0));
        assert_eq!(point.read().get_field_value("readOnly"), Value::Boolean(false));
        assert_eq!(context.metrics().models_added, 1);
    }

    #[test]
    fn test_identity_write_reconciles() {
        let context = context();
        let a = context.new_model(&point_id()).unwrap();
        context.set_field_value(&a, "id", Value::text("p")).unwrap();

        let b = context.new_model(&point_id()).unwrap();
        context.set_field_value(&b, "x", Value::Integer(5)).unwrap();
        context.set_field_value(&b, "id", Value::text("p")).unwrap();

        let canonical = context.heap().get_by_identity(&point_id(), "p").unwrap();
        assert!(Arc::ptr_eq(&canonical, &a));
        assert_eq!(a.read().get_field_value("x"), Value::Integer(5));
        assert_eq!(context.metrics().models_absorbed, 1);
    }

    #[test]
    fn test_new_model_with_known_identity() {
        let context = context();
        let a = context
            .new_model_with(&point_id(), [("id".to_string(), Value::text("p"))])
            .unwrap();
        let b = context
            .new_model_with(
                &point_id(),
                [
                    ("id".to_string(), Value::text("p")),
                    ("label".to_string(), Value::text("origin")),
                ],
            )
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.read().get_field_value("label"), Value::text("origin"));
    }

    #[test]
    fn test_read_only_write_surfaces_error() {
        let context = context();
        let point = context.new_model(&point_id()).unwrap();

        let err = context
            .set_field_value(&point, "label", Value::text("x"))
            .unwrap_err();
        assert!(matches!(err, Error::Field(FieldError::ReadOnlyField { .. })));
        assert!(!point.read().fields().contains("label"));
    }

    #[test]
    fn test_unknown_schema() {
        let context = context();
        let err = context.new_model(&SchemaId::new("urn:test:Nope")).unwrap_err();
        assert!(matches!(err, Error::Prototype(_)));
    }

    #[test]
    fn test_free() {
        let context = context();
        let point = context.new_model(&point_id()).unwrap();
        assert!(context.free(&point));
        assert!(!context.free(&point));
        assert_eq!(point.read().heap_state(), &HeapState::Freed);
    }

    #[test]
    fn test_free_untracked_models() {
        let context = context();

        // Never added to the heap
        let prototype = context.prototype(&point_id()).unwrap();
        let loose = Model::new(prototype, Arc::clone(context.defaults()), Arc::from("id")).into_handle();
        assert!(context.free(&loose));
        assert_eq!(loose.read().heap_state(), &HeapState::Freed);

        // Absorbed into a canonical instance
        let a = context.new_model(&point_id()).unwrap();
        context.set_field_value(&a, "id", Value::text("p")).unwrap();
        let b = context.new_model(&point_id()).unwrap();
        context.set_field_value(&b, "id", Value::text("p")).unwrap();
        assert!(matches!(b.read().heap_state(), HeapState::Absorbed { .. }));

        assert!(context.free(&b));
        assert_eq!(b.read().heap_state(), &HeapState::Freed);
        assert!(!context.free(&b));
        assert!(a.read().heap_state().is_live());
        assert!(context.heap().get_by_identity(&point_id(), "p").is_some());
    }

    #[test]
    fn test_model_listeners_see_lifecycle() {
        let context = context();
        let point = context.new_model(&point_id()).unwrap();
        let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let log = Arc::clone(&events);
        point
            .write()
            .add_listener(Arc::new(move |e: &ModelEvent| log.lock().push(e.clone())));

        context.set_field_value(&point, "x", Value::Integer(4)).unwrap();
        context.free(&point);

        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ModelEvent::FieldValueChanged { field, .. } if field == "x"));
        assert_eq!(
            events[1],
            ModelEvent::Freed {
                model: point.read().model_ref()
            }
        );
    }

    #[test]
    fn test_custom_identity_field() {
        let source = InMemorySchemaSource::with_schemas([Schema::new("urn:test:Page")
            .with_field(FieldDecl::new("slug", FieldKind::Text))]);
        let context = RuntimeContext::builder(Arc::new(source))
            .config(RuntimeConfig::default().with_identity_field("slug"))
            .build();

        let page = context.new_model(&SchemaId::new("urn:test:Page")).unwrap();
        context.set_field_value(&page, "slug", Value::text("home")).unwrap();
        assert!(context
            .heap()
            .get_by_identity(&SchemaId::new("urn:test:Page"), "home")
            .is_some());
    }
}

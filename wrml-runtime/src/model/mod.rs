//! Model instances

mod events;

pub use events::{ListenerId, ModelEvent, ModelListener};
pub(crate) use events::deliver;

use crate::defaults::TypeDefaults;
use crate::error::FieldError;
use crate::field_map::{DynamicFieldMap, FieldMap};
use crate::prototype::Prototype;
use events::ModelListeners;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use wrml_types::{ModelRef, RelationId, SchemaId, TransientKey, Value};

/// Shared, lockable model; reference identity is `Arc::ptr_eq`
pub type ModelHandle = Arc<RwLock<Model>>;

/// Where a model stands with respect to its heap shard
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HeapState {
    /// Constructed but never added to a heap
    #[default]
    Unregistered,
    /// Tracked by transient key only
    Registered,
    /// Canonical instance for `identity`
    Identified { identity: String },
    /// Folded into the canonical instance `into`; re-fetch through the heap
    Absorbed { into: TransientKey },
    /// Removed from the heap; terminal
    Freed,
}

impl HeapState {
    pub fn is_live(&self) -> bool {
        matches!(self, HeapState::Registered | HeapState::Identified { .. })
    }
}

/// A link of a model to a related resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperlink {
    pub relation_id: RelationId,
    pub referrer: ModelRef,
    pub enabled: bool,
}

/// One runtime instance of a schema
#[derive(Debug)]
pub struct Model {
    transient_key: TransientKey,
    identity_field: Arc<str>,
    fields: DynamicFieldMap,
    hyperlinks: BTreeMap<RelationId, Hyperlink>,
    heap_state: HeapState,
    listeners: ModelListeners,
}

impl Model {
    /// New model with a fresh transient key
    ///
    /// `identity_field` names the field whose value becomes the heap
    /// identity once set.
    pub fn new(prototype: Arc<Prototype>, defaults: Arc<TypeDefaults>, identity_field: Arc<str>) -> Self {
        Self {
            transient_key: TransientKey::next(),
            identity_field,
            fields: DynamicFieldMap::new(prototype, defaults),
            hyperlinks: BTreeMap::new(),
            heap_state: HeapState::Unregistered,
            listeners: ModelListeners::default(),
        }
    }

    pub fn into_handle(self) -> ModelHandle {
        Arc::new(RwLock::new(self))
    }

    pub fn schema_id(&self) -> &SchemaId {
        self.fields.schema_id()
    }

    pub fn prototype(&self) -> &Arc<Prototype> {
        self.fields.prototype()
    }

    pub fn transient_key(&self) -> TransientKey {
        self.transient_key
    }

    pub fn model_ref(&self) -> ModelRef {
        ModelRef::new(self.schema_id().clone(), self.transient_key)
    }

    pub fn identity_field(&self) -> &str {
        &self.identity_field
    }

    /// Identity used by the heap, read from the identity field
    ///
    /// Text values are used as-is; integer values are rendered in decimal.
    /// Null or empty text means the identity is not yet known.
    pub fn heap_identity(&self) -> Option<String> {
        match self.fields.get(&self.identity_field) {
            Value::Text(text) if !text.is_empty() => Some(text),
            Value::Integer(n) => Some(n.to_string()),
            Value::Long(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn heap_state(&self) -> &HeapState {
        &self.heap_state
    }

    pub(crate) fn set_heap_state(&mut self, state: HeapState) {
        self.heap_state = state;
    }

    pub fn get_field_value(&self, name: &str) -> Value {
        self.fields.get(name)
    }

    /// Validated write; returns the previous effective value
    ///
    /// Listeners see `FieldValueChanged` with the value as stored, after
    /// normalization. Identity changes are not propagated to the heap from
    /// here; go through
    /// [`RuntimeContext::set_field_value`](crate::RuntimeContext::set_field_value)
    /// for that.
    pub fn set_field_value(&mut self, name: &str, value: Value) -> Result<Value, FieldError> {
        let previous = self.fields.set(name, value)?;
        if !self.listeners.is_empty() {
            self.notify(ModelEvent::FieldValueChanged {
                model: self.model_ref(),
                field: name.to_string(),
                previous: previous.clone(),
                value: self.fields.get(name),
            });
        }
        Ok(previous)
    }

    /// Unchecked write that listeners see as `FieldValueInitialized`
    pub fn initialize_field(&mut self, name: &str, value: Value) {
        let event = (!self.listeners.is_empty()).then(|| ModelEvent::FieldValueInitialized {
            model: self.model_ref(),
            field: name.to_string(),
            value: value.clone(),
        });
        self.fields.initialize(name, value);
        if let Some(event) = event {
            self.notify(event);
        }
    }

    pub fn fields(&self) -> &DynamicFieldMap {
        &self.fields
    }

    /// Raw access to the field store; writes here are not observed
    pub fn fields_mut(&mut self) -> &mut DynamicFieldMap {
        &mut self.fields
    }

    /// Copy every stored field of `other` into this model
    ///
    /// Writes are unchecked and the copied values win over ours. This runs
    /// under the heap's shard lock during absorb, so listeners are not
    /// told; the heap reports the absorb itself.
    pub fn extend(&mut self, other: &Model) {
        for (name, value) in other.fields.iter() {
            self.fields.initialize(name, value.clone());
        }
    }

    /// The hyperlink for `relation_id`, created on first use
    ///
    /// Returns `None` when the prototype declares no such relation.
    pub fn hyperlink(&mut self, relation_id: &RelationId) -> Option<&Hyperlink> {
        self.prototype().link(relation_id)?;

        let referrer = self.model_ref();
        Some(
            self.hyperlinks
                .entry(relation_id.clone())
                .or_insert_with(|| Hyperlink {
                    relation_id: relation_id.clone(),
                    referrer,
                    enabled: true,
                }),
        )
    }

    /// Hyperlinks created so far
    pub fn hyperlinks(&self) -> impl Iterator<Item = &Hyperlink> {
        self.hyperlinks.values()
    }

    /// Listen to every event of this model
    pub fn add_listener(&mut self, listener: Arc<dyn ModelListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    /// Listen to field events for `field` only
    pub fn add_field_listener(&mut self, field: &str, listener: Arc<dyn ModelListener>) -> ListenerId {
        self.listeners.add_for_field(field, listener)
    }

    /// Drop a model or field listener; `false` if `id` was not registered
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Listeners for `event`, for delivery once the model lock is released
    pub(crate) fn listeners_for(&self, event: &ModelEvent) -> Vec<Arc<dyn ModelListener>> {
        self.listeners.targets(event)
    }

    fn notify(&self, event: ModelEvent) {
        deliver(self.listeners.targets(&event), &event);
    }
}

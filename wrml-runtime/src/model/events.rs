//! Per-model change notifications

use std::collections::BTreeMap;
use std::sync::Arc;
use wrml_types::{ModelRef, RelationId, Value};

/// Something that happened to one model
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// A validated write through [`Model::set_field_value`](super::Model::set_field_value)
    FieldValueChanged {
        model: ModelRef,
        field: String,
        previous: Value,
        value: Value,
    },
    /// An unchecked write, as when materializing a model from a document
    FieldValueInitialized {
        model: ModelRef,
        field: String,
        value: Value,
    },
    Freed {
        model: ModelRef,
    },
    /// A link was followed from this model and answered `response`
    LinkClicked {
        model: ModelRef,
        relation_id: RelationId,
        response: Value,
    },
}

impl ModelEvent {
    pub fn model(&self) -> &ModelRef {
        match self {
            ModelEvent::FieldValueChanged { model, .. }
            | ModelEvent::FieldValueInitialized { model, .. }
            | ModelEvent::Freed { model }
            | ModelEvent::LinkClicked { model, .. } => model,
        }
    }

    /// The field a field event is about
    pub fn field(&self) -> Option<&str> {
        match self {
            ModelEvent::FieldValueChanged { field, .. }
            | ModelEvent::FieldValueInitialized { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Receives [`ModelEvent`]s from the models it is registered with
///
/// Field events are delivered while the model is write-locked, so a
/// listener must not lock the model it listens to. `Freed` and
/// `LinkClicked` are delivered with no locks held.
pub trait ModelListener: Send + Sync {
    fn on_event(&self, event: &ModelEvent);
}

impl<F> ModelListener for F
where
    F: Fn(&ModelEvent) + Send + Sync,
{
    fn on_event(&self, event: &ModelEvent) {
        self(event)
    }
}

/// Registration handle returned by [`Model::add_listener`](super::Model::add_listener)
pub type ListenerId = u64;

type Entries = Vec<(ListenerId, Arc<dyn ModelListener>)>;

/// Model-wide listeners plus listeners scoped to one field
#[derive(Default)]
pub(crate) struct ModelListeners {
    model: Entries,
    fields: BTreeMap<String, Entries>,
    next_id: ListenerId,
}

impl ModelListeners {
    pub(crate) fn add(&mut self, listener: Arc<dyn ModelListener>) -> ListenerId {
        let id = self.allocate();
        self.model.push((id, listener));
        id
    }

    pub(crate) fn add_for_field(&mut self, field: &str, listener: Arc<dyn ModelListener>) -> ListenerId {
        let id = self.allocate();
        self.fields.entry(field.to_string()).or_default().push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.len();
        self.model.retain(|(entry, _)| *entry != id);
        for entries in self.fields.values_mut() {
            entries.retain(|(entry, _)| *entry != id);
        }
        self.fields.retain(|_, entries| !entries.is_empty());
        self.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.model.len() + self.fields.values().map(Vec::len).sum::<usize>()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.model.is_empty() && self.fields.is_empty()
    }

    /// Listeners interested in `event`, model-wide ones first
    pub(crate) fn targets(&self, event: &ModelEvent) -> Vec<Arc<dyn ModelListener>> {
        let scoped = event
            .field()
            .and_then(|field| self.fields.get(field))
            .into_iter()
            .flatten();
        self.model
            .iter()
            .chain(scoped)
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    fn allocate(&mut self) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl std::fmt::Debug for ModelListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelListeners")
            .field("model", &self.model.len())
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub(crate) fn deliver(targets: Vec<Arc<dyn ModelListener>>, event: &ModelEvent) {
    for listener in targets {
        listener.on_event(event);
    }
}

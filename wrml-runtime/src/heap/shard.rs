//! Per-schema identity tables

use super::{HeapKey, Listeners, ShardEvent};
use crate::error::HeapError;
use crate::metrics::RuntimeMetrics;
use crate::model::{deliver, HeapState, ModelEvent, ModelHandle};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use wrml_types::{SchemaId, TransientKey};

#[derive(Debug, Default)]
struct ShardTables {
    by_transient_key: HashMap<TransientKey, ModelHandle>,
    by_identity: HashMap<String, ModelHandle>,
    superseded: HashMap<TransientKey, TransientKey>,
}

impl ShardTables {
    /// Follow absorb forwarding from `key` to a live transient key
    fn forward(&self, mut key: TransientKey) -> TransientKey {
        // Each hop moves to a model absorbed later, so chains are acyclic;
        // the bound only guards against a corrupted table.
        for _ in 0..=self.superseded.len() {
            match self.superseded.get(&key) {
                Some(next) => key = *next,
                None => break,
            }
        }
        key
    }

    fn drop_identity_of(&mut self, handle: &ModelHandle, identity: &str) {
        if self
            .by_identity
            .get(identity)
            .is_some_and(|current| Arc::ptr_eq(current, handle))
        {
            self.by_identity.remove(identity);
        }
    }
}

/// All models of one schema
///
/// `by_transient_key` holds every live instance; `by_identity` holds the
/// canonical instance per known identity. The write lock is held across an
/// identify, including any absorb, so identification is atomic per shard.
///
/// Lock order is shard, then model. Callers must not hold a model's lock
/// while handing that model to a shard.
pub struct Shard {
    schema_id: SchemaId,
    tables: RwLock<ShardTables>,
    listeners: Arc<Listeners>,
    metrics: Arc<RuntimeMetrics>,
}

impl Shard {
    pub(crate) fn new(schema_id: SchemaId, listeners: Arc<Listeners>, metrics: Arc<RuntimeMetrics>) -> Self {
        Self {
            schema_id,
            tables: RwLock::new(ShardTables::default()),
            listeners,
            metrics,
        }
    }

    pub fn schema_id(&self) -> &SchemaId {
        &self.schema_id
    }

    /// Track `handle`; if it already carries an identity, identify it too
    ///
    /// Returns the canonical handle, which differs from `handle` when the
    /// model was absorbed.
    pub fn add(&self, handle: &ModelHandle) -> Result<ModelHandle, HeapError> {
        let mut events = Vec::new();
        let result = {
            let mut tables = self.tables.write();
            self.register_locked(&mut tables, handle, &mut events)
                .and_then(|()| {
                    let identity = handle.read().heap_identity();
                    match identity {
                        Some(identity) => self.identify_locked(&mut tables, handle, &identity, &mut events),
                        None => Ok(Arc::clone(handle)),
                    }
                })
        };
        self.emit(events);
        result
    }

    /// Reconcile `handle` against the canonical instance for `identity`
    ///
    /// With no canonical instance, `handle` becomes canonical. With a
    /// different one, every stored field of `handle` is copied into it and
    /// `handle` is marked absorbed and dropped from the shard.
    pub fn identify(&self, handle: &ModelHandle, identity: &str) -> Result<ModelHandle, HeapError> {
        let mut events = Vec::new();
        let result = {
            let mut tables = self.tables.write();
            self.identify_locked(&mut tables, handle, identity, &mut events)
        };
        self.emit(events);
        result
    }

    /// Remove a model from both tables; `None` if it was not here
    ///
    /// The model's own listeners see `Freed` after the shard listeners.
    pub fn free(&self, key: &HeapKey) -> Option<ModelHandle> {
        let freed = {
            let mut tables = self.tables.write();
            let handle = match key {
                HeapKey::Identity(identity) => tables.by_identity.get(identity).cloned(),
                HeapKey::Transient(key) => tables.by_transient_key.get(key).cloned(),
            }?;

            let mut model = handle.write();
            let transient_key = model.transient_key();
            tables.by_transient_key.remove(&transient_key);
            if let HeapState::Identified { identity } = model.heap_state() {
                let identity = identity.clone();
                tables.drop_identity_of(&handle, &identity);
            }
            tables.superseded.retain(|_, into| *into != transient_key);
            model.set_heap_state(HeapState::Freed);
            let event = ModelEvent::Freed {
                model: model.model_ref(),
            };
            let listeners = model.listeners_for(&event);
            drop(model);

            (handle, transient_key, event, listeners)
        };

        let (handle, transient_key, event, listeners) = freed;
        tracing::debug!(schema = %self.schema_id, key = %transient_key, "freed model");
        self.metrics.record_freed();
        self.emit(vec![ShardEvent::Freed {
            schema_id: self.schema_id.clone(),
            transient_key,
        }]);
        deliver(listeners, &event);
        Some(handle)
    }

    pub fn get_by_identity(&self, identity: &str) -> Option<ModelHandle> {
        self.tables.read().by_identity.get(identity).cloned()
    }

    pub fn get_by_transient(&self, key: TransientKey) -> Option<ModelHandle> {
        self.tables.read().by_transient_key.get(&key).cloned()
    }

    /// The live model `key` refers to, following absorb forwarding
    pub fn canonical(&self, key: TransientKey) -> Option<ModelHandle> {
        let tables = self.tables.read();
        let key = tables.forward(key);
        tables.by_transient_key.get(&key).cloned()
    }

    /// Number of live models
    pub fn len(&self) -> usize {
        self.tables.read().by_transient_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of identified models
    pub fn identified(&self) -> usize {
        self.tables.read().by_identity.len()
    }

    fn register_locked(
        &self,
        tables: &mut ShardTables,
        handle: &ModelHandle,
        events: &mut Vec<ShardEvent>,
    ) -> Result<(), HeapError> {
        let mut model = handle.write();
        if model.schema_id() != &self.schema_id {
            return Err(HeapError::IdentityConflict {
                shard: self.schema_id.clone(),
                model: model.schema_id().clone(),
            });
        }

        let transient_key = model.transient_key();
        match model.heap_state() {
            HeapState::Freed => return Err(HeapError::Freed(transient_key)),
            HeapState::Unregistered => {}
            // Already tracked here
            _ => return Ok(()),
        }

        tables.by_transient_key.insert(transient_key, Arc::clone(handle));
        model.set_heap_state(HeapState::Registered);
        self.metrics.record_added();
        events.push(ShardEvent::Added {
            schema_id: self.schema_id.clone(),
            transient_key,
        });
        Ok(())
    }

    fn identify_locked(
        &self,
        tables: &mut ShardTables,
        handle: &ModelHandle,
        identity: &str,
        events: &mut Vec<ShardEvent>,
    ) -> Result<ModelHandle, HeapError> {
        let state = {
            let model = handle.read();
            if model.schema_id() != &self.schema_id {
                return Err(HeapError::IdentityConflict {
                    shard: self.schema_id.clone(),
                    model: model.schema_id().clone(),
                });
            }
            model.heap_state().clone()
        };
        match state {
            HeapState::Freed => return Err(HeapError::Freed(handle.read().transient_key())),
            HeapState::Absorbed { into } => {
                let key = tables.forward(into);
                return tables
                    .by_transient_key
                    .get(&key)
                    .cloned()
                    .ok_or(HeapError::Freed(key));
            }
            HeapState::Identified { identity: ref current } if current == identity => {
                if let Some(canonical) = tables.by_identity.get(identity) {
                    return Ok(Arc::clone(canonical));
                }
            }
            HeapState::Unregistered => self.register_locked(tables, handle, events)?,
            _ => {}
        }

        let existing = tables.by_identity.get(identity).cloned();
        match existing {
            Some(canonical) if Arc::ptr_eq(&canonical, handle) => Ok(canonical),
            Some(canonical) => self.absorb_locked(tables, canonical, handle, identity, events),
            None => {
                let mut model = handle.write();
                let transient_key = model.transient_key();

                // Re-keying a canonical instance drops its old identity
                if let HeapState::Identified { identity: previous } = model.heap_state() {
                    let previous = previous.clone();
                    tables.drop_identity_of(handle, &previous);
                }

                tables.by_identity.insert(identity.to_string(), Arc::clone(handle));
                model.set_heap_state(HeapState::Identified {
                    identity: identity.to_string(),
                });

                tracing::debug!(schema = %self.schema_id, key = %transient_key, identity, "identified model");
                self.metrics.record_identified();
                events.push(ShardEvent::Identified {
                    schema_id: self.schema_id.clone(),
                    transient_key,
                    identity: identity.to_string(),
                });
                Ok(Arc::clone(handle))
            }
        }
    }

    fn absorb_locked(
        &self,
        tables: &mut ShardTables,
        canonical: ModelHandle,
        handle: &ModelHandle,
        identity: &str,
        events: &mut Vec<ShardEvent>,
    ) -> Result<ModelHandle, HeapError> {
        let mut target = canonical.write();
        let mut absorbed = handle.write();

        if target.schema_id() != absorbed.schema_id() {
            return Err(HeapError::IdentityConflict {
                shard: target.schema_id().clone(),
                model: absorbed.schema_id().clone(),
            });
        }

        target.extend(&absorbed);

        let absorbed_key = absorbed.transient_key();
        let into = target.transient_key();
        if let HeapState::Identified { identity: previous } = absorbed.heap_state() {
            let previous = previous.clone();
            tables.drop_identity_of(handle, &previous);
        }
        tables.by_transient_key.remove(&absorbed_key);
        tables.superseded.insert(absorbed_key, into);
        absorbed.set_heap_state(HeapState::Absorbed { into });

        drop(absorbed);
        drop(target);

        tracing::debug!(schema = %self.schema_id, absorbed = %absorbed_key, into = %into, identity, "absorbed model");
        self.metrics.record_absorbed();
        events.push(ShardEvent::Absorbed {
            schema_id: self.schema_id.clone(),
            absorbed: absorbed_key,
            into,
            identity: identity.to_string(),
        });
        Ok(canonical)
    }

    fn emit(&self, events: Vec<ShardEvent>) {
        for event in &events {
            self.listeners.notify(event);
        }
    }
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("Shard")
            .field("schema_id", &self.schema_id)
            .field("live", &tables.by_transient_key.len())
            .field("identified", &tables.by_identity.len())
            .field("superseded", &tables.superseded.len())
            .finish()
    }
}

//! Identity cache for model instances
//!
//! The heap guarantees at most one canonical live model per (schema,
//! identity) pair. Models are usually constructed before their identity is
//! known, for example while walking a nested document, so the heap tracks
//! them by transient key first and reconciles them when their identity
//! field is set. A late arrival whose identity is already taken is absorbed
//! into the canonical instance.
//!
//! ```text
//! Unregistered -> Registered -> Identified
//!                            \-> Absorbed
//! any state -> Freed
//! ```

mod shard;

pub use shard::Shard;

use crate::error::HeapError;
use crate::metrics::RuntimeMetrics;
use crate::model::ModelHandle;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use wrml_types::{ModelRef, SchemaId, TransientKey};

/// Key accepted by [`ModelHeap::free`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HeapKey {
    Identity(String),
    Transient(TransientKey),
}

impl From<TransientKey> for HeapKey {
    fn from(key: TransientKey) -> Self {
        HeapKey::Transient(key)
    }
}

impl From<&str> for HeapKey {
    fn from(identity: &str) -> Self {
        HeapKey::Identity(identity.to_string())
    }
}

/// Shard change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardEvent {
    Added {
        schema_id: SchemaId,
        transient_key: TransientKey,
    },
    Identified {
        schema_id: SchemaId,
        transient_key: TransientKey,
        identity: String,
    },
    Absorbed {
        schema_id: SchemaId,
        absorbed: TransientKey,
        into: TransientKey,
        identity: String,
    },
    Freed {
        schema_id: SchemaId,
        transient_key: TransientKey,
    },
}

impl ShardEvent {
    pub fn schema_id(&self) -> &SchemaId {
        match self {
            ShardEvent::Added { schema_id, .. }
            | ShardEvent::Identified { schema_id, .. }
            | ShardEvent::Absorbed { schema_id, .. }
            | ShardEvent::Freed { schema_id, .. } => schema_id,
        }
    }
}

/// Receives [`ShardEvent`]s from every shard of a heap
///
/// Events are delivered after the shard lock is released, on the thread
/// that caused them.
pub trait ShardListener: Send + Sync {
    fn on_event(&self, event: &ShardEvent);
}

impl<F> ShardListener for F
where
    F: Fn(&ShardEvent) + Send + Sync,
{
    fn on_event(&self, event: &ShardEvent) {
        self(event)
    }
}

/// Subscription handle returned by [`ModelHeap::subscribe`]
pub type SubscriptionId = u64;

#[derive(Default)]
pub(crate) struct Listeners {
    entries: RwLock<Vec<(SubscriptionId, Arc<dyn ShardListener>)>>,
    next_id: AtomicU64,
}

impl Listeners {
    fn subscribe(&self, listener: Arc<dyn ShardListener>) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.write().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    pub(crate) fn notify(&self, event: &ShardEvent) {
        // Snapshot so listeners may subscribe or unsubscribe re-entrantly
        let listeners: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener.on_event(event);
        }
    }
}

/// Shards of models, one per schema id
pub struct ModelHeap {
    shards: DashMap<SchemaId, Arc<Shard>>,
    listeners: Arc<Listeners>,
    metrics: Arc<RuntimeMetrics>,
}

impl ModelHeap {
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(RuntimeMetrics::new()))
    }

    pub fn with_metrics(metrics: Arc<RuntimeMetrics>) -> Self {
        Self {
            shards: DashMap::new(),
            listeners: Arc::new(Listeners::default()),
            metrics,
        }
    }

    /// The shard for `schema_id`, created on first use
    pub fn shard(&self, schema_id: &SchemaId) -> Arc<Shard> {
        if let Some(shard) = self.shards.get(schema_id) {
            return Arc::clone(shard.value());
        }
        self.shards
            .entry(schema_id.clone())
            .or_insert_with(|| {
                Arc::new(Shard::new(
                    schema_id.clone(),
                    Arc::clone(&self.listeners),
                    Arc::clone(&self.metrics),
                ))
            })
            .clone()
    }

    /// Register a model; see [`Shard::add`]
    pub fn add(&self, handle: &ModelHandle) -> Result<ModelHandle, HeapError> {
        let schema_id = handle.read().schema_id().clone();
        self.shard(&schema_id).add(handle)
    }

    /// Reconcile a model against its identity; see [`Shard::identify`]
    pub fn identify(&self, handle: &ModelHandle, identity: &str) -> Result<ModelHandle, HeapError> {
        let schema_id = handle.read().schema_id().clone();
        self.shard(&schema_id).identify(handle, identity)
    }

    /// Remove a model by identity or transient key; idempotent
    pub fn free(&self, schema_id: &SchemaId, key: impl Into<HeapKey>) -> Option<ModelHandle> {
        let shard = self.shards.get(schema_id).map(|s| Arc::clone(s.value()))?;
        shard.free(&key.into())
    }

    pub fn get_by_identity(&self, schema_id: &SchemaId, identity: &str) -> Option<ModelHandle> {
        self.shards.get(schema_id)?.get_by_identity(identity)
    }

    pub fn get_by_transient(&self, schema_id: &SchemaId, key: TransientKey) -> Option<ModelHandle> {
        self.shards.get(schema_id)?.get_by_transient(key)
    }

    /// The live model `key` now refers to, following absorb forwarding
    pub fn canonical(&self, schema_id: &SchemaId, key: TransientKey) -> Option<ModelHandle> {
        self.shards.get(schema_id)?.canonical(key)
    }

    /// Resolve a model reference held in a field value
    pub fn resolve(&self, model_ref: &ModelRef) -> Option<ModelHandle> {
        self.canonical(&model_ref.schema_id, model_ref.transient_key)
    }

    pub fn subscribe(&self, listener: Arc<dyn ShardListener>) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Live models across all shards
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

impl Default for ModelHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModelHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHeap")
            .field("shards", &self.shards.len())
            .field("listeners", &self.listeners.entries.read().len())
            .finish()
    }
}

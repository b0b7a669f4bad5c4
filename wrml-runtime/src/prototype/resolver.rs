//! Prototype construction and memoization

use super::{FieldAccessor, LinkAccessor, Prototype};
use crate::error::PrototypeError;
use crate::metrics::RuntimeMetrics;
use crate::source::SchemaSource;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use wrml_types::{Schema, SchemaId};

/// Builds and caches one [`Prototype`] per schema id
///
/// Each schema id owns a once-cell. Concurrent first requests for the same
/// id block on that cell while a single build runs; every caller then sees
/// the same `Arc`. A failed build leaves the cell empty so a later request
/// can retry.
pub struct PrototypeResolver {
    source: Arc<dyn SchemaSource>,
    cells: DashMap<SchemaId, Arc<OnceCell<Arc<Prototype>>>>,
    metrics: Arc<RuntimeMetrics>,
}

impl PrototypeResolver {
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        Self::with_metrics(source, Arc::new(RuntimeMetrics::new()))
    }

    pub fn with_metrics(source: Arc<dyn SchemaSource>, metrics: Arc<RuntimeMetrics>) -> Self {
        Self {
            source,
            cells: DashMap::new(),
            metrics,
        }
    }

    pub fn source(&self) -> &Arc<dyn SchemaSource> {
        &self.source
    }

    pub fn metrics(&self) -> &Arc<RuntimeMetrics> {
        &self.metrics
    }

    /// The prototype for `schema_id`, built on first request
    pub fn get(&self, schema_id: &SchemaId) -> Result<Arc<Prototype>, PrototypeError> {
        // Clone the cell out so no map guard is held during the build
        let cell = self.cells.entry(schema_id.clone()).or_default().clone();

        if let Some(prototype) = cell.get() {
            self.metrics.record_hit();
            return Ok(prototype.clone());
        }
        self.metrics.record_miss();

        let prototype = cell.get_or_try_init(|| {
            let start = Instant::now();
            let prototype = self.build_prototype(schema_id)?;
            self.metrics.record_build(start.elapsed());
            Ok::<_, PrototypeError>(Arc::new(prototype))
        })?;

        Ok(prototype.clone())
    }

    /// Whether a prototype for `schema_id` is already built
    pub fn is_cached(&self, schema_id: &SchemaId) -> bool {
        self.cells
            .get(schema_id)
            .is_some_and(|cell| cell.value().get().is_some())
    }

    /// Drop the cached prototype for `schema_id`
    ///
    /// Holders of the old `Arc` keep it; the next [`get`](Self::get) builds
    /// afresh.
    pub fn invalidate(&self, schema_id: &SchemaId) -> bool {
        let removed = self.cells.remove(schema_id).is_some();
        if removed {
            tracing::debug!(schema = %schema_id, "invalidated prototype");
        }
        removed
    }

    /// Drop every cached prototype
    pub fn clear(&self) {
        self.cells.clear();
    }

    /// Every ancestor of `schema_id` in breadth-first level order
    ///
    /// Each ancestor appears once even when reachable along several paths,
    /// and `schema_id` itself never appears, so diamonds and cycles are
    /// both safe.
    pub fn resolve_all_base_schema_ids(&self, schema_id: &SchemaId) -> Result<Vec<SchemaId>, PrototypeError> {
        let root = self.fetch(schema_id, schema_id)?;

        let mut result: Vec<SchemaId> = Vec::new();
        let mut queue: VecDeque<SchemaId> = VecDeque::new();
        let mut enqueued: HashSet<SchemaId> = HashSet::new();

        enqueue_bases(&root, schema_id, &mut queue, &mut enqueued);

        while let Some(base_id) = queue.pop_front() {
            if base_id == *schema_id || result.contains(&base_id) {
                continue;
            }
            let base = self.fetch(schema_id, &base_id)?;
            result.push(base_id);
            enqueue_bases(&base, schema_id, &mut queue, &mut enqueued);
        }

        Ok(result)
    }

    /// Merge `schema_id` and its ancestors into a fresh prototype
    ///
    /// Farthest ancestors merge first and the schema itself last, so a
    /// closer declaration replaces a farther one with the same name.
    pub fn build_prototype(&self, schema_id: &SchemaId) -> Result<Prototype, PrototypeError> {
        let all_base_schema_ids = self.resolve_all_base_schema_ids(schema_id)?;

        let mut fields = BTreeMap::new();
        let mut links = BTreeMap::new();

        let merge_order = all_base_schema_ids.iter().rev().chain(std::iter::once(schema_id));
        for id in merge_order {
            let schema = self.fetch(schema_id, id)?;
            for (name, field) in &schema.fields {
                fields.insert(name.clone(), field.clone());
            }
            for (relation_id, link) in &schema.links {
                links.insert(relation_id.clone(), link.clone());
            }
        }

        tracing::debug!(
            schema = %schema_id,
            bases = all_base_schema_ids.len(),
            fields = fields.len(),
            links = links.len(),
            "built prototype"
        );

        Ok(Prototype::new(schema_id.clone(), all_base_schema_ids, fields, links))
    }

    /// Resolve a field accessor against the prototype for `schema_id`
    pub fn resolve_field_accessor(
        &self,
        schema_id: &SchemaId,
        accessor_name: &str,
        arity: usize,
    ) -> Result<Option<FieldAccessor>, PrototypeError> {
        Ok(self.get(schema_id)?.resolve_field_accessor(accessor_name, arity))
    }

    /// Resolve a link accessor against the prototype for `schema_id`
    pub fn resolve_link_accessor(
        &self,
        schema_id: &SchemaId,
        accessor_name: &str,
        arity: usize,
    ) -> Result<Option<LinkAccessor>, PrototypeError> {
        Ok(self.get(schema_id)?.resolve_link_accessor(accessor_name, arity))
    }

    fn fetch(&self, schema_id: &SchemaId, id: &SchemaId) -> Result<Arc<Schema>, PrototypeError> {
        self.source
            .get_schema(id)
            .map_err(|source| PrototypeError::SchemaResolution {
                schema_id: schema_id.clone(),
                missing: id.clone(),
                source,
            })
    }
}

impl std::fmt::Debug for PrototypeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrototypeResolver")
            .field("source", &self.source.source_name())
            .field("cached", &self.cells.len())
            .finish()
    }
}

fn enqueue_bases(
    schema: &Schema,
    root: &SchemaId,
    queue: &mut VecDeque<SchemaId>,
    enqueued: &mut HashSet<SchemaId>,
) {
    for base_id in &schema.base_schema_ids {
        if base_id != root && enqueued.insert(base_id.clone()) {
            queue.push_back(base_id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap;
    use crate::error::SchemaSourceError;
    use crate::source::InMemorySchemaSource;
    use wrml_types::{FieldDecl, FieldKind, LinkDecl, Method, RelationId};

    fn ids(names: &[&str]) -> Vec<SchemaId> {
        names.iter().map(|n| SchemaId::new(format!("urn:test:{n}"))).collect()
    }

    fn schema(name: &str, bases: &[&str]) -> Schema {
        bases.iter().fold(Schema::new(format!("urn:test:{name}")), |s, b| {
            s.with_base(format!("urn:test:{b}"))
        })
    }

    fn resolver(schemas: Vec<Schema>) -> PrototypeResolver {
        PrototypeResolver::new(Arc::new(InMemorySchemaSource::with_schemas(schemas)))
    }

    #[test]
    fn test_diamond_bases_deduplicated() {
        let resolver = resolver(vec![
            schema("A", &["B", "C"]),
            schema("B", &["D"]),
            schema("C", &["D"]),
            schema("D", &[]),
        ]);

        let bases = resolver.resolve_all_base_schema_ids(&SchemaId::new("urn:test:A")).unwrap();
        assert_eq!(bases, ids(&["B", "C", "D"]));
    }

    #[test]
    fn test_cycle_terminates() {
        let resolver = resolver(vec![schema("A", &["B"]), schema("B", &["A"])]);

        let bases = resolver.resolve_all_base_schema_ids(&SchemaId::new("urn:test:A")).unwrap();
        assert_eq!(bases, ids(&["B"]));

        let prototype = resolver.get(&SchemaId::new("urn:test:B")).unwrap();
        assert_eq!(prototype.all_base_schema_ids(), ids(&["A"]).as_slice());
    }

    #[test]
    fn test_level_order() {
        let resolver = resolver(vec![
            schema("A", &["B", "C"]),
            schema("B", &["E"]),
            schema("C", &["D"]),
            schema("D", &[]),
            schema("E", &[]),
        ]);

        let bases = resolver.resolve_all_base_schema_ids(&SchemaId::new("urn:test:A")).unwrap();
        assert_eq!(bases, ids(&["B", "C", "E", "D"]));
    }

    #[test]
    fn test_closer_declaration_wins() {
        let resolver = resolver(vec![
            Schema::new("urn:test:Base")
                .with_field(FieldDecl::new("name", FieldKind::Text))
                .with_field(FieldDecl::new("size", FieldKind::Integer))
                .with_link(LinkDecl::new("urn:rel:next", Method::Get)),
            Schema::new("urn:test:Derived")
                .with_base("urn:test:Base")
                .with_field(FieldDecl::new("name", FieldKind::Text).required())
                .with_link(LinkDecl::new("urn:rel:next", Method::Post)),
        ]);

        let prototype = resolver.get(&SchemaId::new("urn:test:Derived")).unwrap();
        assert_eq!(prototype.fields().len(), 2);
        assert!(prototype.field("name").unwrap().required);
        assert_eq!(prototype.field("size").unwrap().kind, FieldKind::Integer);
        assert_eq!(
            prototype.link(&RelationId::new("urn:rel:next")).unwrap().method,
            Method::Post
        );
    }

    #[test]
    fn test_system_schema_prototype() {
        let resolver = PrototypeResolver::new(Arc::new(bootstrap::system_source()));

        let prototype = resolver.get(&bootstrap::schema_id()).unwrap();
        assert_eq!(prototype.fields().len(), 10);
        assert_eq!(prototype.all_base_schema_ids(), &[bootstrap::document_id()]);
        assert!(prototype.is_a(&bootstrap::document_id()));
        assert!(prototype.link_by_name("self").is_some());
    }

    #[test]
    fn test_get_is_memoized() {
        let resolver = resolver(vec![schema("A", &[])]);
        let id = SchemaId::new("urn:test:A");

        let first = resolver.get(&id).unwrap();
        let second = resolver.get(&id).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let snapshot = resolver.metrics().snapshot();
        assert_eq!(snapshot.prototype_builds, 1);
        assert_eq!(snapshot.prototype_hits, 1);
        assert_eq!(snapshot.prototype_misses, 1);
    }

    #[test]
    fn test_invalidate_rebuilds() {
        let resolver = resolver(vec![schema("A", &[])]);
        let id = SchemaId::new("urn:test:A");

        let first = resolver.get(&id).unwrap();
        assert!(resolver.invalidate(&id));
        assert!(!resolver.is_cached(&id));

        let second = resolver.get(&id).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.fields(), second.fields());
    }

    #[test]
    fn test_missing_base_is_an_error() {
        let source = Arc::new(InMemorySchemaSource::with_schemas([schema("A", &["Gone"])]));
        let resolver = PrototypeResolver::new(source.clone());
        let id = SchemaId::new("urn:test:A");

        let err = resolver.get(&id).unwrap_err();
        let PrototypeError::SchemaResolution { schema_id, missing, source: cause } = err;
        assert_eq!(schema_id, id);
        assert_eq!(missing, SchemaId::new("urn:test:Gone"));
        assert!(matches!(cause, SchemaSourceError::NotFound(_)));
        assert!(!resolver.is_cached(&id));

        // Failures are not cached; once the base appears the build succeeds
        source.register(schema("Gone", &[]));
        assert_eq!(resolver.get(&id).unwrap().all_base_schema_ids(), ids(&["Gone"]).as_slice());
    }

    #[test]
    fn test_accessor_lookup_through_resolver() {
        let resolver = resolver(vec![
            Schema::new("urn:test:A").with_field(FieldDecl::new("title", FieldKind::Text))
        ]);
        let id = SchemaId::new("urn:test:A");

        let accessor = resolver.resolve_field_accessor(&id, "getTitle", 0).unwrap();
        assert_eq!(accessor.unwrap().field_name, "title");
        assert!(resolver.resolve_link_accessor(&id, "getTitle", 0).unwrap().is_none());
    }
}

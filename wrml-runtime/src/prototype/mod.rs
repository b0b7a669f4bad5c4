//! Merged schema prototypes
//!
//! A [`Prototype`] is the fully flattened view of a schema: every field and
//! link inherited through its base schemas, merged so that closer
//! declarations override farther ones. Prototypes are built once per schema
//! id by the [`PrototypeResolver`] and are immutable afterwards, except for
//! the accessor tables, which fill lazily and never change an entry once
//! written.

mod accessor;
mod resolver;

pub use accessor::{method_key, FieldAccess, FieldAccessor, LinkAccessor};
pub use resolver::PrototypeResolver;

use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use wrml_types::{FieldDecl, LinkDecl, Method, RelationId, SchemaId};

/// Flattened schema with cached accessor dispatch tables
#[derive(Debug)]
pub struct Prototype {
    schema_id: SchemaId,
    all_base_schema_ids: Vec<SchemaId>,
    fields: BTreeMap<String, FieldDecl>,
    links: BTreeMap<RelationId, LinkDecl>,
    links_by_name: HashMap<String, RelationId>,
    field_accessors: DashMap<String, Option<FieldAccessor>>,
    link_accessors: DashMap<String, Option<LinkAccessor>>,
}

impl Prototype {
    pub(crate) fn new(
        schema_id: SchemaId,
        all_base_schema_ids: Vec<SchemaId>,
        fields: BTreeMap<String, FieldDecl>,
        links: BTreeMap<RelationId, LinkDecl>,
    ) -> Self {
        let links_by_name = links
            .values()
            .map(|link| (link.relation_name().to_string(), link.relation_id.clone()))
            .collect();

        Self {
            schema_id,
            all_base_schema_ids,
            fields,
            links,
            links_by_name,
            field_accessors: DashMap::new(),
            link_accessors: DashMap::new(),
        }
    }

    pub fn schema_id(&self) -> &SchemaId {
        &self.schema_id
    }

    /// Every ancestor, nearest first
    pub fn all_base_schema_ids(&self) -> &[SchemaId] {
        &self.all_base_schema_ids
    }

    /// Whether `schema_id` is this prototype's schema or one of its ancestors
    pub fn is_a(&self, schema_id: &SchemaId) -> bool {
        &self.schema_id == schema_id || self.all_base_schema_ids.contains(schema_id)
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldDecl> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.get(name)
    }

    pub fn links(&self) -> &BTreeMap<RelationId, LinkDecl> {
        &self.links
    }

    pub fn link(&self, relation_id: &RelationId) -> Option<&LinkDecl> {
        self.links.get(relation_id)
    }

    /// Look up a link by its short relation name
    pub fn link_by_name(&self, name: &str) -> Option<&LinkDecl> {
        self.links_by_name
            .get(name)
            .and_then(|relation_id| self.links.get(relation_id))
    }

    /// Resolve an accessor name to a field get or set
    ///
    /// `getX`, `isX` and `setX` name the field `x`. A `set` accessor takes
    /// exactly one argument; with any other arity it does not resolve. The
    /// answer, including "no such field", is cached per method key.
    pub fn resolve_field_accessor(&self, accessor_name: &str, arity: usize) -> Option<FieldAccessor> {
        let key = method_key(accessor_name, arity);
        if let Some(cached) = self.field_accessors.get(&key) {
            return cached.clone();
        }

        let resolved = accessor::field_candidate(accessor_name)
            .filter(|(name, is_setter)| self.fields.contains_key(name) && (!is_setter || arity == 1))
            .map(|(name, is_setter)| FieldAccessor {
                field_name: name,
                access: if is_setter { FieldAccess::Set } else { FieldAccess::Get },
            });

        tracing::trace!(schema = %self.schema_id, key = %key, found = resolved.is_some(), "cached field accessor");
        self.field_accessors.entry(key).or_insert(resolved).clone()
    }

    /// Resolve an accessor name to a link relation
    ///
    /// The raw accessor name is tried first as a relation name. Failing
    /// that, a `get` prefix is stripped, and then a trailing `As<Type>`
    /// qualifier (`getAuthorAsWriter` names the `author` relation). Links
    /// found through a `get` accessor must themselves be GET links.
    pub fn resolve_link_accessor(&self, accessor_name: &str, arity: usize) -> Option<LinkAccessor> {
        let key = method_key(accessor_name, arity);
        if let Some(cached) = self.link_accessors.get(&key) {
            return cached.clone();
        }

        let resolved = self.find_link(accessor_name).map(|link| LinkAccessor {
            relation_id: link.relation_id.clone(),
            method: link.method,
            link: link.clone(),
        });

        tracing::trace!(schema = %self.schema_id, key = %key, found = resolved.is_some(), "cached link accessor");
        self.link_accessors.entry(key).or_insert(resolved).clone()
    }

    fn find_link(&self, accessor_name: &str) -> Option<&LinkDecl> {
        if let Some(link) = self.link_by_name(accessor_name) {
            return Some(link);
        }

        let rel_name = accessor::strip_prefix(accessor_name, "get")?;
        let link = self.link_by_name(&rel_name).or_else(|| {
            accessor::strip_as_suffix(&rel_name).and_then(|short| self.link_by_name(short))
        })?;

        (link.method == Method::Get).then_some(link)
    }

    /// Number of cached accessor resolutions, fields and links combined
    pub fn cached_accessors(&self) -> usize {
        self.field_accessors.len() + self.link_accessors.len()
    }
}

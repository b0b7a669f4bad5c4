//! Prototype-aware field storage
//!
//! A [`DynamicFieldMap`] is a plain name-to-value store with schema rules
//! layered on top: unset declared fields read as their defaults, read-only
//! fields refuse writes, required fields refuse null.

use crate::defaults::TypeDefaults;
use crate::error::FieldError;
use crate::prototype::Prototype;
use std::collections::BTreeMap;
use std::sync::Arc;
use wrml_types::{FieldDecl, FieldKind, SchemaId, Value};

/// String-keyed field access with schema semantics
///
/// Enumeration (`names`, `contains`, `iter`, `len`) reflects what has been
/// stored, not what the schema declares; a model may hold fewer fields than
/// its prototype and the rest read as defaults.
pub trait FieldMap {
    /// Stored value, else the declared default, else null
    fn get(&self, name: &str) -> Value;

    /// Validated write; returns the previous effective value
    fn set(&mut self, name: &str, value: Value) -> Result<Value, FieldError>;

    /// Reset every stored writable field
    fn clear(&mut self);

    /// Forget a stored value so the field reads as its default again
    fn remove(&mut self, name: &str) -> Result<Value, FieldError>;

    /// Unchecked write used when materializing a model from a document
    fn initialize(&mut self, name: &str, value: Value);

    fn names(&self) -> Vec<&str>;

    fn contains(&self, name: &str) -> bool;

    fn iter(&self) -> Box<dyn Iterator<Item = (&str, &Value)> + '_>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The field store behind every [`Model`](crate::model::Model)
#[derive(Debug, Clone)]
pub struct DynamicFieldMap {
    prototype: Arc<Prototype>,
    defaults: Arc<TypeDefaults>,
    store: BTreeMap<String, Value>,
}

impl DynamicFieldMap {
    pub fn new(prototype: Arc<Prototype>, defaults: Arc<TypeDefaults>) -> Self {
        Self {
            prototype,
            defaults,
            store: BTreeMap::new(),
        }
    }

    pub fn prototype(&self) -> &Arc<Prototype> {
        &self.prototype
    }

    pub fn schema_id(&self) -> &SchemaId {
        self.prototype.schema_id()
    }

    /// The raw stored value, without default substitution
    pub fn stored(&self, name: &str) -> Option<&Value> {
        self.store.get(name)
    }

    fn default_value(&self, decl: Option<&FieldDecl>) -> Value {
        decl.map(|decl| self.defaults.default_for(decl))
            .unwrap_or_default()
    }

    fn read_only(&self, name: &str) -> Result<(), FieldError> {
        match self.prototype.field(name) {
            Some(decl) if decl.read_only => Err(FieldError::ReadOnlyField {
                schema_id: self.schema_id().clone(),
                field: name.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl FieldMap for DynamicFieldMap {
    fn get(&self, name: &str) -> Value {
        match self.store.get(name) {
            Some(value) => value.clone(),
            None => self.default_value(self.prototype.field(name)),
        }
    }

    fn set(&mut self, name: &str, value: Value) -> Result<Value, FieldError> {
        self.read_only(name)?;

        let decl = self.prototype.field(name);
        let value = match decl {
            Some(decl) if value.is_null() && decl.required => {
                return Err(FieldError::RequiredField {
                    schema_id: self.schema_id().clone(),
                    field: name.to_string(),
                });
            }
            Some(decl) if value.is_null() => self.defaults.default_for(decl),
            Some(decl) if decl.kind == FieldKind::Boolean => normalize_boolean(value),
            _ => value,
        };

        let previous = self.get(name);
        self.store.insert(name.to_string(), value);
        Ok(previous)
    }

    fn clear(&mut self) {
        let prototype = Arc::clone(&self.prototype);
        let defaults = Arc::clone(&self.defaults);

        for (name, value) in self.store.iter_mut() {
            let decl = prototype.field(name);
            if decl.is_some_and(|decl| decl.read_only) {
                continue;
            }
            // Collection fields keep their container; undeclared names go by shape
            let in_place = decl.map_or(true, |decl| decl.kind.is_collection()) && value.clear_collection();
            if !in_place {
                *value = decl.map(|decl| defaults.default_for(decl)).unwrap_or_default();
            }
        }
    }

    fn remove(&mut self, name: &str) -> Result<Value, FieldError> {
        self.read_only(name)?;
        let previous = self.get(name);
        self.store.remove(name);
        Ok(previous)
    }

    fn initialize(&mut self, name: &str, value: Value) {
        self.store.insert(name.to_string(), value);
    }

    fn names(&self) -> Vec<&str> {
        self.store.keys().map(String::as_str).collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.store.contains_key(name)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (&str, &Value)> + '_> {
        Box::new(self.store.iter().map(|(name, value)| (name.as_str(), value)))
    }

    fn len(&self) -> usize {
        self.store.len()
    }
}

/// Boolean fields accept `"true"`/`"false"` text in any case
fn normalize_boolean(value: Value) -> Value {
    match &value {
        Value::Text(text) if text.eq_ignore_ascii_case("true") => Value::Boolean(true),
        Value::Text(text) if text.eq_ignore_ascii_case("false") => Value::Boolean(false),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prototype::PrototypeResolver;
    use crate::source::InMemorySchemaSource;
    use wrml_types::Schema;

    fn field_map() -> DynamicFieldMap {
        let schema = Schema::new("urn:test:Task")
            .with_field(FieldDecl::new("title", FieldKind::Text).required())
            .with_field(FieldDecl::new("done", FieldKind::Boolean))
            .with_field(FieldDecl::new("estimate", FieldKind::Integer).with_default(Value::Integer(3)))
            .with_field(FieldDecl::new("created", FieldKind::DateTime).read_only())
            .with_field(FieldDecl::new("tags", FieldKind::List));
        let resolver = PrototypeResolver::new(Arc::new(InMemorySchemaSource::with_schemas([schema])));
        let prototype = resolver.get(&SchemaId::new("urn:test:Task")).unwrap();
        DynamicFieldMap::new(prototype, Arc::new(TypeDefaults::new()))
    }

    #[test]
    fn test_unset_fields_read_defaults() {
        let fields = field_map();
        assert_eq!(fields.get("done"), Value::Boolean(false));
        assert_eq!(fields.get("estimate"), Value::Integer(3));
        assert!(fields.get("title").is_null());
        assert!(fields.get("undeclared").is_null());
        assert!(fields.is_empty());
    }

    #[test]
    fn test_set_returns_previous() {
        let mut fields = field_map();
        assert_eq!(fields.set("estimate", Value::Integer(5)).unwrap(), Value::Integer(3));
        assert_eq!(fields.set("estimate", Value::Integer(8)).unwrap(), Value::Integer(5));
        assert_eq!(fields.get("estimate"), Value::Integer(8));
        assert_eq!(fields.names(), vec!["estimate"]);
    }

    #[test]
    fn test_read_only_rejected_without_mutation() {
        let mut fields = field_map();
        let err = fields.set("created", Value::text("2024-01-01")).unwrap_err();
        assert!(matches!(err, FieldError::ReadOnlyField { ref field, .. } if field == "created"));
        assert!(!fields.contains("created"));

        // Raw initialization bypasses the check
        fields.initialize("created", Value::text("2024-01-01"));
        assert!(fields.set("created", Value::Null).is_err());
        assert_eq!(fields.get("created"), Value::text("2024-01-01"));
    }

    #[test]
    fn test_required_rejects_null() {
        let mut fields = field_map();
        fields.set("title", Value::text("write docs")).unwrap();

        let err = fields.set("title", Value::Null).unwrap_err();
        assert!(matches!(err, FieldError::RequiredField { .. }));
        assert_eq!(fields.get("title"), Value::text("write docs"));
    }

    #[test]
    fn test_null_on_optional_stores_default() {
        let mut fields = field_map();
        fields.set("estimate", Value::Integer(13)).unwrap();
        fields.set("estimate", Value::Null).unwrap();
        assert_eq!(fields.stored("estimate"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_boolean_text_normalized() {
        let mut fields = field_map();
        fields.set("done", Value::text("TRUE")).unwrap();
        assert_eq!(fields.get("done"), Value::Boolean(true));
        fields.set("done", Value::text("false")).unwrap();
        assert_eq!(fields.get("done"), Value::Boolean(false));

        // Only boolean fields are normalized
        fields.set("title", Value::text("true")).unwrap();
        assert_eq!(fields.get("title"), Value::text("true"));
    }

    #[test]
    fn test_clear() {
        let mut fields = field_map();
        fields.set("done", Value::Boolean(true)).unwrap();
        fields.set("tags", Value::List(vec![Value::text("a")])).unwrap();
        fields.initialize("created", Value::text("2024-01-01"));
        // A list stored in a text field is reset, not emptied
        fields.initialize("title", Value::List(vec![Value::text("stray")]));

        fields.clear();

        assert_eq!(fields.get("done"), Value::Boolean(false));
        assert_eq!(fields.get("tags"), Value::List(vec![]));
        assert_eq!(fields.get("created"), Value::text("2024-01-01"));
        assert!(fields.get("title").is_null());
        assert_eq!(fields.len(), 4);
    }

    #[test]
    fn test_remove_restores_default() {
        let mut fields = field_map();
        fields.set("estimate", Value::Integer(1)).unwrap();
        assert_eq!(fields.remove("estimate").unwrap(), Value::Integer(1));
        assert_eq!(fields.get("estimate"), Value::Integer(3));
        assert!(!fields.contains("estimate"));
    }

    #[test]
    fn test_iter_follows_store() {
        let mut fields = field_map();
        fields.set("title", Value::text("t")).unwrap();
        fields.set("done", Value::Boolean(true)).unwrap();

        let pairs: Vec<_> = fields.iter().collect();
        assert_eq!(
            pairs,
            vec![("done", &Value::Boolean(true)), ("title", &Value::text("t"))]
        );
    }
}

//! End-to-end tests for prototypes, field storage and the identity heap

mod common;

use common::{context, point_id};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use wrml_runtime::bootstrap;
use wrml_runtime::prelude::*;
use wrml_runtime::{Error, FieldError, HeapState, PrototypeResolver};

#[test]
fn test_schema_prototype_merges_document() {
    let context = context();
    let prototype = context.prototype(&bootstrap::schema_id()).unwrap();

    // Document contributes 4 fields, Schema adds 6
    assert_eq!(prototype.fields().len(), 10);
    assert_eq!(prototype.all_base_schema_ids(), &[bootstrap::document_id()]);

    let again = context.prototype(&bootstrap::schema_id()).unwrap();
    assert!(Arc::ptr_eq(&prototype, &again));
}

#[test]
fn test_redeclared_field_overrides_base() {
    let source = common::source();
    source.register(
        Schema::new("urn:test:Strict")
            .with_base(bootstrap::SCHEMA)
            .with_field(wrml_runtime::FieldDecl::new("id", wrml_runtime::FieldKind::Text).required()),
    );
    let resolver = PrototypeResolver::new(Arc::new(source));

    let prototype = resolver.get(&SchemaId::new("urn:test:Strict")).unwrap();
    assert!(prototype.field("id").unwrap().required);
    assert_eq!(prototype.fields().len(), 10);
    assert_eq!(
        prototype.all_base_schema_ids(),
        &[bootstrap::schema_id(), bootstrap::document_id()]
    );
}

#[test]
fn test_unset_fields_read_zero_values() {
    let context = context();
    let point = context.new_model(&point_id()).unwrap();
    let point = point.read();

    assert_eq!(point.get_field_value("readOnly"), Value::Boolean(false));
    assert_eq!(point.get_field_value("secondsToLive"), Value::Long(0));
    assert_eq!(point.get_field_value("x"), Value::Integer(0));
    assert!(point.get_field_value("label").is_null());
    assert!(point.fields().is_empty());
}

#[test]
fn test_identity_reconciliation() {
    let context = context();

    let first = context.new_model(&point_id()).unwrap();
    context.set_field_value(&first, "id", Value::text("p-1")).unwrap();
    context.set_field_value(&first, "y", Value::Integer(2)).unwrap();

    let second = context.new_model(&point_id()).unwrap();
    context.set_field_value(&second, "x", Value::Integer(5)).unwrap();
    context.set_field_value(&second, "id", Value::text("p-1")).unwrap();

    let canonical = context.heap().get_by_identity(&point_id(), "p-1").unwrap();
    assert!(Arc::ptr_eq(&canonical, &first));
    assert_eq!(canonical.read().get_field_value("x"), Value::Integer(5));
    assert_eq!(canonical.read().get_field_value("y"), Value::Integer(2));

    // Repeated lookups agree, and the superseded instance forwards
    let again = context.heap().get_by_identity(&point_id(), "p-1").unwrap();
    assert!(Arc::ptr_eq(&canonical, &again));
    let second_key = second.read().transient_key();
    assert!(matches!(second.read().heap_state(), HeapState::Absorbed { .. }));
    assert!(Arc::ptr_eq(
        &context.heap().canonical(&point_id(), second_key).unwrap(),
        &first
    ));
}

#[test]
fn test_read_only_field_left_untouched() {
    let source = common::source();
    source.register(
        Schema::new("urn:test:Locked").with_field(
            wrml_runtime::FieldDecl::new("serial", wrml_runtime::FieldKind::Text).read_only(),
        ),
    );
    let context = RuntimeContext::new(Arc::new(source));
    let locked = context
        .new_model_with(
            &SchemaId::new("urn:test:Locked"),
            [("serial".to_string(), Value::text("A-1"))],
        )
        .unwrap();

    let err = context
        .set_field_value(&locked, "serial", Value::text("B-2"))
        .unwrap_err();
    assert!(matches!(err, Error::Field(FieldError::ReadOnlyField { .. })));
    assert_eq!(locked.read().get_field_value("serial"), Value::text("A-1"));
}

#[test]
fn test_context_from_config_directory() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("schemas")).unwrap();
    fs::write(
        dir.path().join("schemas/story.json"),
        format!(
            r#"{{
                "id": "urn:app:Story",
                "baseSchemaIds": ["{}"],
                "fields": [
                    {{ "name": "title", "kind": "text", "required": true }},
                    {{ "name": "status", "kind": "choice", "choices": ["draft", "live"] }}
                ],
                "links": [
                    {{ "relationId": "urn:rel:author", "method": "GET" }}
                ]
            }}"#,
            bootstrap::DOCUMENT
        ),
    )
    .unwrap();
    let config_path = dir.path().join("wrml.yml");
    fs::write(&config_path, "schemaPaths:\n  - schemas\n").unwrap();

    let context = RuntimeContext::from_config(RuntimeConfig::from_file(&config_path).unwrap()).unwrap();
    let story_id = SchemaId::new("urn:app:Story");
    let story = context.new_model(&story_id).unwrap();

    assert_eq!(story.read().get_field_value("status"), Value::Choice("draft".into()));
    assert!(story.read().prototype().link_by_name("self").is_some());

    let mut facade = context.facade(story.clone());
    facade.invoke("setTitle", &[Value::text("Hello")]).unwrap();
    assert_eq!(facade.invoke("getTitle", &[]).unwrap(), Value::text("Hello"));
    assert_eq!(facade.invoke("getAuthor", &[]).unwrap(), Value::Null);
}

#[test]
fn test_context_without_bootstrap() {
    let config = RuntimeConfig::default().with_bootstrap(false);
    let context = RuntimeContext::from_config(config).unwrap();

    let err = context.prototype(&bootstrap::document_id()).unwrap_err();
    assert!(matches!(err, Error::Prototype(_)));
}

#[test]
fn test_metrics_follow_traffic() {
    let context = context();
    let a = context.new_model(&point_id()).unwrap();
    let b = context.new_model(&point_id()).unwrap();
    context.set_field_value(&a, "id", Value::text("k")).unwrap();
    context.set_field_value(&b, "id", Value::text("k")).unwrap();
    context.free(&a);

    let metrics = context.metrics();
    assert_eq!(metrics.prototype_builds, 1);
    assert_eq!(metrics.prototype_hits, 1);
    assert_eq!(metrics.models_added, 2);
    assert_eq!(metrics.models_identified, 1);
    assert_eq!(metrics.models_absorbed, 1);
    assert_eq!(metrics.models_freed, 1);
    assert!(context.heap().is_empty());
}

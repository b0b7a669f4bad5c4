//! Built-in system schemas
//!
//! These are the schemas the runtime itself is described by. They are
//! available without any external schema source and are normally layered
//! underneath application schemas.

use crate::source::InMemorySchemaSource;
use wrml_types::{FieldDecl, FieldKind, LinkDecl, Method, Schema, SchemaId};

/// Base URI of the system schemas
pub const SYSTEM_SCHEMA_BASE: &str = "http://api.schemas.wrml.org/org/wrml/model";

pub const DOCUMENT: &str = "http://api.schemas.wrml.org/org/wrml/model/Document";
pub const SCHEMA: &str = "http://api.schemas.wrml.org/org/wrml/model/schema/Schema";
pub const FIELD: &str = "http://api.schemas.wrml.org/org/wrml/model/schema/Field";
pub const LINK: &str = "http://api.schemas.wrml.org/org/wrml/model/schema/Link";

/// Relation of a document's link to itself
pub const SELF_RELATION: &str = "http://relations.api.wrml.org/common/self";

/// Field names shared by every document
pub mod document_fields {
    pub const ETAG: &str = "etag";
    pub const ID: &str = "id";
    pub const READ_ONLY: &str = "readOnly";
    pub const SECONDS_TO_LIVE: &str = "secondsToLive";
}

pub fn document_id() -> SchemaId {
    SchemaId::new(DOCUMENT)
}

pub fn schema_id() -> SchemaId {
    SchemaId::new(SCHEMA)
}

/// `Document{etag, id, readOnly, secondsToLive}` plus its `self` link
pub fn document_schema() -> Schema {
    Schema::new(DOCUMENT)
        .with_title("Document")
        .with_field(FieldDecl::new(document_fields::ETAG, FieldKind::Text))
        .with_field(FieldDecl::new(document_fields::ID, FieldKind::Text))
        .with_field(FieldDecl::new(document_fields::READ_ONLY, FieldKind::Boolean))
        .with_field(FieldDecl::new(document_fields::SECONDS_TO_LIVE, FieldKind::Long))
        .with_link(
            LinkDecl::new(SELF_RELATION, Method::Get)
                .named("self")
                .responds_with(DOCUMENT),
        )
}

/// `Schema:{Document}`, the schema of schema documents
pub fn schema_schema() -> Schema {
    Schema::new(SCHEMA)
        .with_title("Schema")
        .with_base(DOCUMENT)
        .with_field(FieldDecl::new("baseSchemaIds", FieldKind::List))
        .with_field(FieldDecl::new("description", FieldKind::Text))
        .with_field(FieldDecl::new("fields", FieldKind::List))
        .with_field(FieldDecl::new("links", FieldKind::List))
        .with_field(FieldDecl::new("name", FieldKind::Text).required())
        .with_field(FieldDecl::new("version", FieldKind::Integer))
}

pub fn field_schema() -> Schema {
    Schema::new(FIELD)
        .with_title("Field")
        .with_field(FieldDecl::new("name", FieldKind::Text).required())
        .with_field(
            FieldDecl::new("kind", FieldKind::Choice).with_choices([
                "native", "model", "boolean", "text", "list", "map", "choice", "integer",
                "dateTime", "long", "double",
            ]),
        )
        .with_field(FieldDecl::new("defaultValue", FieldKind::Native))
        .with_field(FieldDecl::new("required", FieldKind::Boolean))
        .with_field(FieldDecl::new("readOnly", FieldKind::Boolean))
        .with_field(FieldDecl::new("hidden", FieldKind::Boolean))
        .with_field(FieldDecl::new("choices", FieldKind::List))
}

pub fn link_schema() -> Schema {
    Schema::new(LINK)
        .with_title("Link")
        .with_field(FieldDecl::new("relationId", FieldKind::Text).required())
        .with_field(
            FieldDecl::new("method", FieldKind::Choice)
                .with_choices(["GET", "PUT", "POST", "DELETE", "HEAD", "OPTIONS"]),
        )
        .with_field(FieldDecl::new("name", FieldKind::Text))
        .with_field(FieldDecl::new("responseSchemaIds", FieldKind::List))
        .with_field(FieldDecl::new("requestSchemaIds", FieldKind::List))
}

/// Every system schema
pub fn system_schemas() -> Vec<Schema> {
    vec![document_schema(), schema_schema(), field_schema(), link_schema()]
}

/// A registry preloaded with the system schemas
pub fn system_source() -> InMemorySchemaSource {
    InMemorySchemaSource::with_schemas(system_schemas())
}

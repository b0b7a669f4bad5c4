//! Shared types for the WRML model runtime
//!
//! This crate provides the plain data that flows between schema sources,
//! the prototype resolver and model instances: schema identifiers, schema
//! documents with their field and link declarations, and runtime values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

mod value;

pub use value::{ModelRef, TransientKey, Value};

/// Schema identifier (a URI)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(pub String);

impl SchemaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last non-empty path segment, e.g. `Document` for
    /// `http://api.schemas.wrml.org/org/wrml/model/Document`
    pub fn local_name(&self) -> &str {
        last_segment(&self.0)
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SchemaId {
    fn from(id: &str) -> Self {
        SchemaId(id.to_string())
    }
}

impl From<String> for SchemaId {
    fn from(id: String) -> Self {
        SchemaId(id)
    }
}

/// Link relation identifier (a URI)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationId(pub String);

impl RelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn local_name(&self) -> &str {
        last_segment(&self.0)
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RelationId {
    fn from(id: &str) -> Self {
        RelationId(id.to_string())
    }
}

fn last_segment(uri: &str) -> &str {
    uri.trim_end_matches('/')
        .rsplit(['/', '#', ':'])
        .next()
        .unwrap_or(uri)
}

/// Declared kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Boolean,
    Integer,
    Long,
    Double,
    Text,
    DateTime,
    Choice,
    List,
    Map,
    Model,
    Native,
}

impl FieldKind {
    /// Collections are cleared in place rather than reset
    pub fn is_collection(&self) -> bool {
        matches!(self, FieldKind::List | FieldKind::Map)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Boolean => "boolean",
            FieldKind::Integer => "integer",
            FieldKind::Long => "long",
            FieldKind::Double => "double",
            FieldKind::Text => "text",
            FieldKind::DateTime => "dateTime",
            FieldKind::Choice => "choice",
            FieldKind::List => "list",
            FieldKind::Map => "map",
            FieldKind::Model => "model",
            FieldKind::Native => "native",
        };
        f.write_str(name)
    }
}

/// Interaction method of a link relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Put,
    Post,
    Delete,
    Head,
    Options,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        };
        f.write_str(name)
    }
}

/// A field declared by a schema
///
/// In documents the default is written plainly (`defaultValue: 3`) and
/// read back as the variant the field's `kind` calls for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FieldDocument", into = "FieldDocument")]
pub struct FieldDecl {
    pub name: String,
    pub kind: FieldKind,
    pub default_value: Option<Value>,
    pub required: bool,
    pub read_only: bool,
    pub hidden: bool,
    /// Choice menu, only meaningful for `Choice` fields
    pub choices: Vec<String>,
}

/// Wire form of [`FieldDecl`]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldDocument {
    name: String,
    kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_value: Option<serde_json::Value>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    read_only: bool,
    #[serde(default)]
    hidden: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    choices: Vec<String>,
}

impl TryFrom<FieldDocument> for FieldDecl {
    type Error = String;

    fn try_from(doc: FieldDocument) -> Result<Self, Self::Error> {
        let default_value = doc
            .default_value
            .map(|raw| Value::from_document(doc.kind, raw))
            .transpose()
            .map_err(|e| format!("field `{}` defaultValue: {e}", doc.name))?
            .filter(|value| !value.is_null());

        Ok(FieldDecl {
            name: doc.name,
            kind: doc.kind,
            default_value,
            required: doc.required,
            read_only: doc.read_only,
            hidden: doc.hidden,
            choices: doc.choices,
        })
    }
}

impl From<FieldDecl> for FieldDocument {
    fn from(field: FieldDecl) -> Self {
        FieldDocument {
            default_value: field.default_value.as_ref().map(Value::to_document),
            name: field.name,
            kind: field.kind,
            required: field.required,
            read_only: field.read_only,
            hidden: field.hidden,
            choices: field.choices,
        }
    }
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default_value: None,
            required: false,
            read_only: false,
            hidden: false,
            choices: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }
}

/// A link relation declared by a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDecl {
    pub relation_id: RelationId,
    #[serde(default)]
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_schema_ids: Vec<SchemaId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub request_schema_ids: Vec<SchemaId>,
}

impl LinkDecl {
    pub fn new(relation_id: impl Into<String>, method: Method) -> Self {
        Self {
            relation_id: RelationId::new(relation_id),
            method,
            name: None,
            response_schema_ids: Vec::new(),
            request_schema_ids: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn responds_with(mut self, schema_id: impl Into<SchemaId>) -> Self {
        self.response_schema_ids.push(schema_id.into());
        self
    }

    pub fn requests_with(mut self, schema_id: impl Into<SchemaId>) -> Self {
        self.request_schema_ids.push(schema_id.into());
        self
    }

    /// Short relation name used for accessor lookups
    pub fn relation_name(&self) -> &str {
        match &self.name {
            Some(name) => name,
            None => self.relation_id.local_name(),
        }
    }
}

/// An immutable schema document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub id: SchemaId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub base_schema_ids: Vec<SchemaId>,
    #[serde(default, with = "field_list")]
    pub fields: BTreeMap<String, FieldDecl>,
    #[serde(default, with = "link_list")]
    pub links: BTreeMap<RelationId, LinkDecl>,
}

impl Schema {
    pub fn new(id: impl Into<SchemaId>) -> Self {
        Self {
            id: id.into(),
            title: None,
            description: None,
            base_schema_ids: Vec::new(),
            fields: BTreeMap::new(),
            links: BTreeMap::new(),
        }
    }

    pub fn with_base(mut self, base: impl Into<SchemaId>) -> Self {
        self.base_schema_ids.push(base.into());
        self
    }

    pub fn with_field(mut self, field: FieldDecl) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn with_link(mut self, link: LinkDecl) -> Self {
        self.links.insert(link.relation_id.clone(), link);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

// Schema documents list their members as arrays; the keyed maps are derived.
mod field_list {
    use super::FieldDecl;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        fields: &BTreeMap<String, FieldDecl>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let list: Vec<&FieldDecl> = fields.values().collect();
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, FieldDecl>, D::Error> {
        let list = Vec::<FieldDecl>::deserialize(deserializer)?;
        Ok(list.into_iter().map(|f| (f.name.clone(), f)).collect())
    }
}

mod link_list {
    use super::{LinkDecl, RelationId};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        links: &BTreeMap<RelationId, LinkDecl>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let list: Vec<&LinkDecl> = links.values().collect();
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<RelationId, LinkDecl>, D::Error> {
        let list = Vec::<LinkDecl>::deserialize(deserializer)?;
        Ok(list
            .into_iter()
            .map(|l| (l.relation_id.clone(), l))
            .collect())
    }
}

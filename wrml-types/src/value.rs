//! Runtime field values

use crate::{FieldKind, SchemaId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Instance-local key assigned to every model at construction
///
/// Transient keys are unique within the process and never reused, so a
/// key that has been freed cannot alias a newer model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransientKey(pub u64);

static TRANSIENT_COUNTER: AtomicU64 = AtomicU64::new(1);

impl TransientKey {
    /// Allocate the next key
    pub fn next() -> Self {
        Self(TRANSIENT_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t:{}", self.0)
    }
}

/// Reference from one model's field to another model
///
/// Models never hold each other directly; the reference is resolved
/// through the heap shard for `schema_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRef {
    pub schema_id: SchemaId,
    pub transient_key: TransientKey,
}

impl ModelRef {
    pub fn new(schema_id: SchemaId, transient_key: TransientKey) -> Self {
        Self {
            schema_id,
            transient_key,
        }
    }
}

/// A field value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Double(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    Choice(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Model(ModelRef),
    Native(serde_json::Value),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(i64::from(*i)),
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// String content of `Text` and `Choice` values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Choice(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&ModelRef> {
        match self {
            Value::Model(r) => Some(r),
            _ => None,
        }
    }

    /// Convert plain JSON, choosing the variant from its shape
    ///
    /// Whole numbers become `Integer` when they fit, otherwise `Long`.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(l) => i32::try_from(l).map_or(Value::Long(l), Value::Integer),
                None => n.as_f64().map_or(Value::Null, Value::Double),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Value::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Convert a plain document value into the variant for a field of `kind`
    ///
    /// Schema documents spell defaults as bare scalars or collections
    /// (`defaultValue: 3`). The tagged form (`{"kind": .., "value": ..}`)
    /// is accepted too for scalar kinds. `null` is `Null` for every kind.
    pub fn from_document(kind: FieldKind, json: serde_json::Value) -> Result<Self, String> {
        if json.is_null() {
            return Ok(Value::Null);
        }
        let tagged = json.get("kind").is_some()
            && !matches!(kind, FieldKind::Map | FieldKind::Model | FieldKind::Native);
        if tagged {
            return serde_json::from_value(json).map_err(|e| e.to_string());
        }

        let mismatch = |json: &serde_json::Value| format!("expected a {kind} value, found {json}");
        match kind {
            FieldKind::Boolean => json.as_bool().map(Value::Boolean).ok_or_else(|| mismatch(&json)),
            FieldKind::Integer => json
                .as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .map(Value::Integer)
                .ok_or_else(|| mismatch(&json)),
            FieldKind::Long => json.as_i64().map(Value::Long).ok_or_else(|| mismatch(&json)),
            FieldKind::Double => json.as_f64().map(Value::Double).ok_or_else(|| mismatch(&json)),
            FieldKind::Text => json
                .as_str()
                .map(|s| Value::Text(s.to_string()))
                .ok_or_else(|| mismatch(&json)),
            FieldKind::Choice => json
                .as_str()
                .map(|s| Value::Choice(s.to_string()))
                .ok_or_else(|| mismatch(&json)),
            FieldKind::DateTime => serde_json::from_value::<DateTime<Utc>>(json)
                .map(Value::DateTime)
                .map_err(|e| e.to_string()),
            FieldKind::List if json.is_array() => Ok(Value::from_json(json)),
            FieldKind::Map if json.is_object() => Ok(Value::from_json(json)),
            FieldKind::List | FieldKind::Map => Err(mismatch(&json)),
            FieldKind::Model => serde_json::from_value::<ModelRef>(json)
                .map(Value::Model)
                .map_err(|e| e.to_string()),
            FieldKind::Native => Ok(Value::Native(json)),
        }
    }

    /// Plain document form, the inverse of [`Value::from_document`]
    pub fn to_document(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Long(l) => serde_json::Value::from(*l),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Text(s) | Value::Choice(s) => serde_json::Value::String(s.clone()),
            Value::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Value::List(items) => items.iter().map(Value::to_document).collect(),
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_document()))
                    .collect(),
            ),
            Value::Model(r) => serde_json::json!({
                "schemaId": r.schema_id.as_str(),
                "transientKey": r.transient_key.as_u64(),
            }),
            Value::Native(v) => v.clone(),
        }
    }

    /// Empty a collection value in place; returns false for scalars
    pub fn clear_collection(&mut self) -> bool {
        match self {
            Value::List(items) => {
                items.clear();
                true
            }
            Value::Map(entries) => {
                entries.clear();
                true
            }
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}

impl From<i64> for Value {
    fn from(l: i64) -> Self {
        Value::Long(l)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<ModelRef> for Value {
    fn from(r: ModelRef) -> Self {
        Value::Model(r)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Long(l) => write!(f, "{}", l),
            Value::Double(d) => write!(f, "{}", d),
            Value::Text(s) | Value::Choice(s) => write!(f, "{}", s),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::List(items) => write!(f, "[{} items]", items.len()),
            Value::Map(entries) => write!(f, "{{{} entries}}", entries.len()),
            Value::Model(r) => write!(f, "<{} {}>", r.schema_id.local_name(), r.transient_key),
            Value::Native(v) => write!(f, "{}", v),
        }
    }
}

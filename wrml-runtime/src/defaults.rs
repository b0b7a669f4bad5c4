//! Zero values per field kind

use dashmap::DashMap;
use wrml_types::{FieldDecl, FieldKind, Value};

/// Maps a field kind to its zero value
///
/// Values are memoized per kind; the table is tiny but the lookup sits on
/// every unset field read.
#[derive(Debug, Default)]
pub struct TypeDefaults {
    zero_values: DashMap<FieldKind, Value>,
}

impl TypeDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero value for a kind: `false`, `0` or `0.0` for scalars, null otherwise
    pub fn zero_value(&self, kind: FieldKind) -> Value {
        if let Some(value) = self.zero_values.get(&kind) {
            return value.clone();
        }

        let value = match kind {
            FieldKind::Boolean => Value::Boolean(false),
            FieldKind::Integer => Value::Integer(0),
            FieldKind::Long => Value::Long(0),
            FieldKind::Double => Value::Double(0.0),
            FieldKind::Text
            | FieldKind::DateTime
            | FieldKind::Choice
            | FieldKind::List
            | FieldKind::Map
            | FieldKind::Model
            | FieldKind::Native => Value::Null,
        };

        self.zero_values.insert(kind, value.clone());
        value
    }

    /// Value an unset field reads as
    ///
    /// The declared default wins; a choice field falls back to the first
    /// entry of its menu; anything else gets the kind's zero value.
    pub fn default_for(&self, field: &FieldDecl) -> Value {
        if let Some(value) = &field.default_value {
            return value.clone();
        }

        if field.kind == FieldKind::Choice {
            if let Some(first) = field.choices.first() {
                return Value::Choice(first.clone());
            }
        }

        self.zero_value(field.kind)
    }

    /// Number of kinds memoized so far
    pub fn cached_kinds(&self) -> usize {
        self.zero_values.len()
    }
}

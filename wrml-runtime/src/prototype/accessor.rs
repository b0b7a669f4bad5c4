//! Accessor name dispatch

use wrml_types::{LinkDecl, Method, RelationId};

/// Whether a field accessor reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccess {
    Get,
    Set,
}

/// An accessor resolved to a merged field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAccessor {
    pub field_name: String,
    pub access: FieldAccess,
}

/// An accessor resolved to a merged link
#[derive(Debug, Clone, PartialEq)]
pub struct LinkAccessor {
    pub relation_id: RelationId,
    pub method: Method,
    pub link: LinkDecl,
}

/// Cache key for an accessor call: `"<accessor_name>/<arity>"`
pub fn method_key(accessor_name: &str, arity: usize) -> String {
    format!("{accessor_name}/{arity}")
}

/// Field name named by a `get`/`is`/`set` accessor, and whether it is a setter
pub(crate) fn field_candidate(accessor_name: &str) -> Option<(String, bool)> {
    if let Some(name) = strip_prefix(accessor_name, "get") {
        return Some((name, false));
    }
    if let Some(name) = strip_prefix(accessor_name, "is") {
        return Some((name, false));
    }
    strip_prefix(accessor_name, "set").map(|name| (name, true))
}

/// `getTitle` with prefix `get` becomes `title`
///
/// The prefix only counts when an upper-case letter follows it, so a field
/// such as `isbn` is never mistaken for an `is` accessor.
pub(crate) fn strip_prefix(accessor_name: &str, prefix: &str) -> Option<String> {
    let rest = accessor_name.strip_prefix(prefix)?;
    let mut chars = rest.chars();
    let first = chars.next()?;
    if !first.is_uppercase() {
        return None;
    }
    Some(first.to_lowercase().chain(chars).collect())
}

/// `authorAsWriter` becomes `author`
pub(crate) fn strip_as_suffix(rel_name: &str) -> Option<&str> {
    rel_name
        .match_indices("As")
        .find(|(index, _)| {
            *index >= 1
                && rel_name[index + 2..]
                    .chars()
                    .next()
                    .is_some_and(char::is_uppercase)
        })
        .map(|(index, _)| &rel_name[..index])
}

//! Named-accessor dispatch over a model
//!
//! [`StaticInterfaceFacade`] lets callers use conventional accessor names
//! (`getTitle`, `setTitle`, `isDone`, `getAuthorAsWriter`) against any
//! model. Names resolve through the prototype's accessor tables, so each
//! distinct name is parsed once per schema.

use crate::context::RuntimeContext;
use crate::error::FacadeError;
use crate::model::{deliver, HeapState, ModelEvent, ModelHandle};
use crate::prototype::FieldAccess;
use std::collections::BTreeMap;
use wrml_types::{LinkDecl, ModelRef, Value};

/// Performs a link interaction on behalf of a model
pub trait LinkClicker: Send + Sync {
    /// Follow `link` from `referrer`
    ///
    /// `request_entity` is null when the call carried no body;
    /// `href_params` fill template parameters of the link's target.
    fn click(
        &self,
        link: &LinkDecl,
        referrer: &ModelRef,
        request_entity: &Value,
        href_params: &BTreeMap<String, Value>,
    ) -> Result<Value, FacadeError>;
}

/// A clicker with nowhere to go; every click answers null
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLinkClicker;

impl LinkClicker for NoopLinkClicker {
    fn click(
        &self,
        link: &LinkDecl,
        referrer: &ModelRef,
        _request_entity: &Value,
        _href_params: &BTreeMap<String, Value>,
    ) -> Result<Value, FacadeError> {
        tracing::debug!(rel = %link.relation_id, method = %link.method, referrer = %referrer.transient_key, "ignored link click");
        Ok(Value::Null)
    }
}

/// Accessor-name view of one model
pub struct StaticInterfaceFacade<'a> {
    context: &'a RuntimeContext,
    handle: ModelHandle,
}

impl<'a> StaticInterfaceFacade<'a> {
    pub fn new(context: &'a RuntimeContext, handle: ModelHandle) -> Self {
        Self { context, handle }
    }

    /// The model currently behind this facade
    ///
    /// After a write that caused the model to be absorbed, this is the
    /// canonical instance.
    pub fn model(&self) -> &ModelHandle {
        &self.handle
    }

    /// Call an accessor by name
    ///
    /// Field getters return the field value and setters the previous value.
    /// Link accessors take an optional request entity as the first argument
    /// and an optional map of href parameters as the second.
    pub fn invoke(&mut self, accessor_name: &str, args: &[Value]) -> Result<Value, FacadeError> {
        let prototype = self.handle.read().prototype().clone();

        if let Some(accessor) = prototype.resolve_field_accessor(accessor_name, args.len()) {
            return match accessor.access {
                FieldAccess::Get => Ok(self.handle.read().get_field_value(&accessor.field_name)),
                FieldAccess::Set => {
                    let value = args.first().cloned().unwrap_or_default();
                    self.write(&accessor.field_name, value)
                }
            };
        }

        if let Some(accessor) = prototype.resolve_link_accessor(accessor_name, args.len()) {
            let request_entity = args.first().cloned().unwrap_or_default();
            let href_params = match args.get(1) {
                Some(Value::Map(params)) => params.clone(),
                _ => BTreeMap::new(),
            };
            return self.follow(&accessor.link, &request_entity, &href_params);
        }

        Err(FacadeError::UnknownAccessor {
            schema_id: prototype.schema_id().clone(),
            accessor: accessor_name.to_string(),
        })
    }

    /// Read a declared field by name
    pub fn get(&self, field: &str) -> Result<Value, FacadeError> {
        let model = self.handle.read();
        if model.prototype().field(field).is_none() {
            return Err(FacadeError::UnknownAccessor {
                schema_id: model.schema_id().clone(),
                accessor: field.to_string(),
            });
        }
        Ok(model.get_field_value(field))
    }

    /// Write a declared field by name; returns the previous value
    pub fn set(&mut self, field: &str, value: Value) -> Result<Value, FacadeError> {
        {
            let model = self.handle.read();
            if model.prototype().field(field).is_none() {
                return Err(FacadeError::UnknownAccessor {
                    schema_id: model.schema_id().clone(),
                    accessor: field.to_string(),
                });
            }
        }
        self.write(field, value)
    }

    /// Follow a link by relation name with no request entity
    pub fn click(&self, rel_name: &str) -> Result<Value, FacadeError> {
        let link = {
            let model = self.handle.read();
            match model.prototype().link_by_name(rel_name) {
                Some(link) => link.clone(),
                None => {
                    return Err(FacadeError::UnknownAccessor {
                        schema_id: model.schema_id().clone(),
                        accessor: rel_name.to_string(),
                    })
                }
            }
        };
        self.follow(&link, &Value::Null, &BTreeMap::new())
    }

    fn write(&mut self, field: &str, value: Value) -> Result<Value, FacadeError> {
        let previous = self
            .context
            .update_field::<FacadeError>(&self.handle, field, value)?;

        // Rebind if the write made this model a duplicate of a canonical one
        let absorbed = match self.handle.read().heap_state() {
            HeapState::Absorbed { into } => Some(*into),
            _ => None,
        };
        if let Some(into) = absorbed {
            let schema_id = self.handle.read().schema_id().clone();
            if let Some(canonical) = self.context.heap().canonical(&schema_id, into) {
                self.handle = canonical;
            }
        }

        Ok(previous)
    }

    fn follow(
        &self,
        link: &LinkDecl,
        request_entity: &Value,
        href_params: &BTreeMap<String, Value>,
    ) -> Result<Value, FacadeError> {
        let referrer = self.handle.read().model_ref();
        let response = self
            .context
            .link_clicker()
            .click(link, &referrer, request_entity, href_params)?;

        let event = ModelEvent::LinkClicked {
            model: referrer,
            relation_id: link.relation_id.clone(),
            response: response.clone(),
        };
        let listeners = self.handle.read().listeners_for(&event);
        deliver(listeners, &event);
        Ok(response)
    }
}

impl std::fmt::Debug for StaticInterfaceFacade<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticInterfaceFacade")
            .field("model", &self.handle.read().model_ref())
            .finish()
    }
}

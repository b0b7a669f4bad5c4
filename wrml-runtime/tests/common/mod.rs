//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wrml_runtime::bootstrap;
use wrml_runtime::prelude::*;
use wrml_runtime::{FieldDecl, FieldKind, InMemorySchemaSource};

/// Route runtime logs to the test harness; `RUST_LOG=wrml_runtime=debug`
/// shows prototype builds and heap traffic.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

pub const POINT: &str = "urn:test:Point";

/// System schemas plus a `Point:{Document}` with an integer `x`
pub fn source() -> InMemorySchemaSource {
    let source = bootstrap::system_source();
    source.register(
        Schema::new(POINT)
            .with_base(bootstrap::DOCUMENT)
            .with_field(FieldDecl::new("x", FieldKind::Integer))
            .with_field(FieldDecl::new("y", FieldKind::Integer))
            .with_field(FieldDecl::new("label", FieldKind::Text)),
    );
    source
}

pub fn context() -> RuntimeContext {
    init_tracing();
    RuntimeContext::new(Arc::new(source()))
}

pub fn point_id() -> SchemaId {
    SchemaId::new(POINT)
}

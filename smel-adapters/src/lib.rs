//! SMEL Adapters - Native Schema Artifacts
//!
//! Each adapter turns one paradigm's native schema artifact into a
//! [`Snapshot`] and back:
//!
//! | Paradigm | Artifact |
//! |---|---|
//! | Relational | PostgreSQL `CREATE TABLE` DDL |
//! | Document | MongoDB `$jsonSchema` (JSON) |
//! | Columnar | CQL `CREATE TYPE` / `CREATE TABLE` |
//!
//! Export is deterministic: the same snapshot always renders to the same
//! bytes, and `export(import(a)) == a` for artifacts already in canonical
//! form. The graph paradigm has no schema artifact and no adapter.

pub mod columnar;
pub mod document;
pub mod relational;
mod text;

pub use columnar::ColumnarAdapter;
pub use document::DocumentAdapter;
pub use relational::RelationalAdapter;

use smel_core::{AdapterError, AdapterResult, Paradigm, SmelConfig, Snapshot};

/// Import and export of one paradigm's native schema artifact.
pub trait SchemaAdapter: Send + Sync {
    /// Paradigm this adapter reads and writes.
    fn paradigm(&self) -> Paradigm;

    /// Parse `raw` into a version 1 snapshot called `name`.
    fn import_schema(&self, raw: &str, name: &str) -> AdapterResult<Snapshot>;

    /// Render `snapshot` as a native artifact.
    fn export_schema(&self, snapshot: &Snapshot) -> AdapterResult<String>;
}

/// The adapter for `paradigm`.
pub fn adapter_for(paradigm: Paradigm, config: &SmelConfig) -> AdapterResult<Box<dyn SchemaAdapter>> {
    match paradigm {
        Paradigm::Relational => Ok(Box::new(RelationalAdapter::new())),
        Paradigm::Document => Ok(Box::new(DocumentAdapter::new(config))),
        Paradigm::Columnar => Ok(Box::new(ColumnarAdapter::new(config))),
        Paradigm::Graph => Err(AdapterError::UnsupportedConstruct {
            paradigm,
            construct: "graph schemas have no native artifact".to_string(),
        }),
    }
}

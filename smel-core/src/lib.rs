//! SMEL Core - Unified Meta-Schema
//!
//! Paradigm-neutral schema model shared by every other crate in the workspace:
//! the canonical type set and its mapping tables, the snapshot/entity model,
//! the abstract operation syntax, configuration and error types.
//!
//! This crate holds data and invariants only. Parsing lives in `smel-dsl`,
//! operation semantics in `smel-engine`, native artifacts in `smel-adapters`.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod config;
pub mod error;
pub mod operation;
pub mod schema;
pub mod types;

pub use config::*;
pub use error::*;
pub use operation::*;
pub use schema::*;
pub use types::*;

// ============================================================================
// PARADIGM
// ============================================================================

/// The data model family a schema (or a single entity) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Paradigm {
    /// Tables with columns, primary and foreign keys.
    Relational,
    /// Collections of (possibly nested) documents.
    Document,
    /// Wide-column tables with partition and clustering keys.
    Columnar,
    /// Node labels with properties.
    Graph,
}

impl Paradigm {
    /// Every paradigm, in declaration order.
    pub const ALL: [Paradigm; 4] = [
        Paradigm::Relational,
        Paradigm::Document,
        Paradigm::Columnar,
        Paradigm::Graph,
    ];

    /// Script keyword for this paradigm.
    pub fn keyword(self) -> &'static str {
        match self {
            Paradigm::Relational => "RELATIONAL",
            Paradigm::Document => "DOCUMENT",
            Paradigm::Columnar => "COLUMNAR",
            Paradigm::Graph => "GRAPH",
        }
    }

    /// Whether entities of this paradigm can carry nested aggregations.
    pub fn supports_aggregations(self) -> bool {
        matches!(self, Paradigm::Document | Paradigm::Columnar)
    }
}

impl fmt::Display for Paradigm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl std::str::FromStr for Paradigm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Paradigm::ALL
            .into_iter()
            .find(|p| p.keyword().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "paradigm".to_string(),
                value: s.to_string(),
                reason: "expected RELATIONAL, DOCUMENT, COLUMNAR or GRAPH".to_string(),
            })
    }
}

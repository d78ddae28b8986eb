//! Error types for SMEL operations

use crate::Paradigm;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// ERROR KINDS
// ============================================================================

/// Closed set of failure kinds reported by the executor and the adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnknownEntity,
    UnknownAttribute,
    NameConflict,
    ReferentialConflict,
    NoPrimaryKey,
    AmbiguousFlattenScenario,
    AmbiguousCardinality,
    InvalidClause,
    UnsupportedType,
    /// Adapter only.
    ParseFailure,
    /// Adapter only.
    UnsupportedConstruct,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UnknownEntity => "UnknownEntity",
            ErrorKind::UnknownAttribute => "UnknownAttribute",
            ErrorKind::NameConflict => "NameConflict",
            ErrorKind::ReferentialConflict => "ReferentialConflict",
            ErrorKind::NoPrimaryKey => "NoPrimaryKey",
            ErrorKind::AmbiguousFlattenScenario => "AmbiguousFlattenScenario",
            ErrorKind::AmbiguousCardinality => "AmbiguousCardinality",
            ErrorKind::InvalidClause => "InvalidClause",
            ErrorKind::UnsupportedType => "UnsupportedType",
            ErrorKind::ParseFailure => "ParseFailure",
            ErrorKind::UnsupportedConstruct => "UnsupportedConstruct",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SCHEMA ERRORS
// ============================================================================

/// Structural and semantic failures raised while transforming a snapshot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown entity '{entity}'")]
    UnknownEntity { entity: String },

    #[error("unknown attribute '{attribute}' on entity '{entity}'")]
    UnknownAttribute { entity: String, attribute: String },

    #[error("name conflict: '{name}' already exists in '{scope}'")]
    NameConflict { scope: String, name: String },

    #[error("referential conflict on '{entity}': {detail}")]
    ReferentialConflict { entity: String, detail: String },

    #[error("entity '{entity}' has no primary key")]
    NoPrimaryKey { entity: String },

    #[error("ambiguous flatten scenario for '{path}': {reason}")]
    AmbiguousFlattenScenario { path: String, reason: String },

    #[error("ambiguous cardinality nesting '{nested}' into '{owner}': {reason}")]
    AmbiguousCardinality {
        nested: String,
        owner: String,
        reason: String,
    },

    #[error("invalid clause '{clause}': {reason}")]
    InvalidClause { clause: String, reason: String },

    #[error("unsupported {paradigm} type: {native_type}")]
    UnsupportedType {
        paradigm: Paradigm,
        native_type: String,
    },
}

impl SchemaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchemaError::UnknownEntity { .. } => ErrorKind::UnknownEntity,
            SchemaError::UnknownAttribute { .. } => ErrorKind::UnknownAttribute,
            SchemaError::NameConflict { .. } => ErrorKind::NameConflict,
            SchemaError::ReferentialConflict { .. } => ErrorKind::ReferentialConflict,
            SchemaError::NoPrimaryKey { .. } => ErrorKind::NoPrimaryKey,
            SchemaError::AmbiguousFlattenScenario { .. } => ErrorKind::AmbiguousFlattenScenario,
            SchemaError::AmbiguousCardinality { .. } => ErrorKind::AmbiguousCardinality,
            SchemaError::InvalidClause { .. } => ErrorKind::InvalidClause,
            SchemaError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
        }
    }

    pub fn unknown_entity(entity: &str) -> Self {
        SchemaError::UnknownEntity {
            entity: entity.to_string(),
        }
    }

    pub fn unknown_attribute(entity: &str, attribute: &str) -> Self {
        SchemaError::UnknownAttribute {
            entity: entity.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub fn name_conflict(scope: &str, name: &str) -> Self {
        SchemaError::NameConflict {
            scope: scope.to_string(),
            name: name.to_string(),
        }
    }
}

/// Result type alias for snapshot transformations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// A failed operation inside an executor batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("operation #{index} ({operation}) failed: {error}")]
pub struct ExecutionError {
    /// Zero-based position of the operation in the script.
    pub index: usize,
    /// Script keyword of the failing operation.
    pub operation: String,
    pub error: SchemaError,
}

impl ExecutionError {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

// ============================================================================
// ADAPTER ERRORS
// ============================================================================

/// Failures raised while importing or exporting a native schema artifact.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    #[error("failed to parse {paradigm} artifact: {reason}")]
    ParseFailure { paradigm: Paradigm, reason: String },

    #[error("unsupported {paradigm} construct: {construct}")]
    UnsupportedConstruct {
        paradigm: Paradigm,
        construct: String,
    },

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl AdapterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdapterError::ParseFailure { .. } => ErrorKind::ParseFailure,
            AdapterError::UnsupportedConstruct { .. } => ErrorKind::UnsupportedConstruct,
            AdapterError::Schema(e) => e.kind(),
        }
    }
}

/// Result type alias for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

// ============================================================================
// CONFIG ERRORS
// ============================================================================

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Malformed configuration: {reason}")]
    Malformed { reason: String },
}

// ============================================================================
// MASTER ERROR
// ============================================================================

/// Master error type for all SMEL errors.
#[derive(Debug, Clone, Error)]
pub enum SmelError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Parse error at line {line}, column {column}: {message}")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },
}

impl SmelError {
    /// Failure kind, when the error belongs to the executor/adapter taxonomy.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            SmelError::Schema(e) => Some(e.kind()),
            SmelError::Execution(e) => Some(e.kind()),
            SmelError::Adapter(e) => Some(e.kind()),
            SmelError::Parse { .. } => Some(ErrorKind::ParseFailure),
            SmelError::Config(_) | SmelError::Io { .. } => None,
        }
    }
}

/// Result type alias for SMEL operations.
pub type SmelResult<T> = Result<T, SmelError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display_unknown_attribute() {
        let err = SchemaError::unknown_attribute("person", "age");
        let msg = format!("{}", err);
        assert!(msg.contains("unknown attribute"));
        assert!(msg.contains("person"));
        assert!(msg.contains("age"));
    }

    #[test]
    fn test_schema_error_kinds() {
        assert_eq!(SchemaError::unknown_entity("x").kind(), ErrorKind::UnknownEntity);
        assert_eq!(
            SchemaError::name_conflict("person", "id").kind(),
            ErrorKind::NameConflict
        );
        let err = SchemaError::UnsupportedType {
            paradigm: Paradigm::Relational,
            native_type: "JSONB".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::UnsupportedType);
        assert!(err.to_string().contains("RELATIONAL"));
    }

    #[test]
    fn test_execution_error_display() {
        let err = ExecutionError {
            index: 3,
            operation: "DELETE ENTITY".to_string(),
            error: SchemaError::ReferentialConflict {
                entity: "person".to_string(),
                detail: "referenced by address.person_id".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("#3"));
        assert!(msg.contains("DELETE ENTITY"));
        assert!(msg.contains("address.person_id"));
        assert_eq!(err.kind(), ErrorKind::ReferentialConflict);
    }

    #[test]
    fn test_adapter_error_kind_passes_through_schema_errors() {
        let err = AdapterError::from(SchemaError::unknown_entity("ghost"));
        assert_eq!(err.kind(), ErrorKind::UnknownEntity);

        let err = AdapterError::ParseFailure {
            paradigm: Paradigm::Document,
            reason: "expected object".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::ParseFailure);
    }

    #[test]
    fn test_smel_error_from_variants() {
        let schema = SmelError::from(SchemaError::unknown_entity("x"));
        assert!(matches!(schema, SmelError::Schema(_)));

        let config = SmelError::from(ConfigError::Malformed {
            reason: "bad".to_string(),
        });
        assert!(matches!(config, SmelError::Config(_)));
        assert_eq!(config.kind(), None);

        let adapter = SmelError::from(AdapterError::UnsupportedConstruct {
            paradigm: Paradigm::Graph,
            construct: "adapter".to_string(),
        });
        assert_eq!(adapter.kind(), Some(ErrorKind::UnsupportedConstruct));
    }
}

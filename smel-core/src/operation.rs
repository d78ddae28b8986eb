//! Abstract syntax of a migration script
//!
//! Produced by the `smel-dsl` parser, consumed by the executor. The set of
//! operations is closed: adding one means touching the parser, the pretty
//! printer and the executor together.

use crate::schema::Literal;
use crate::types::CanonicalType;
use crate::Paradigm;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed script: header plus ordered operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    pub header: Header,
    pub operations: Vec<Operation>,
}

/// `MIGRATION name:version FROM kind TO kind USING schema:version`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub version: String,
    pub source: Paradigm,
    pub target: Paradigm,
    pub schema: String,
    pub schema_version: String,
}

impl Header {
    /// Whether the script changes the data model.
    pub fn is_migration(&self) -> bool {
        self.source != self.target
    }
}

/// Attribute declaration used by `ADD ATTRIBUTE` and `ADD ENTITY`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    pub data_type: CanonicalType,
    pub not_null: bool,
    pub default: Option<Literal>,
}

impl AttributeSpec {
    pub fn new(name: impl Into<String>, data_type: CanonicalType) -> Self {
        Self {
            name: name.into(),
            data_type,
            not_null: false,
            default: None,
        }
    }
}

/// `entity.attribute`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributePath {
    pub entity: String,
    pub attribute: String,
}

impl AttributePath {
    pub fn new(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.attribute)
    }
}

/// How `GENERATE KEY` fills the new key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyStrategy {
    Serial,
    /// `STRING PREFIX "p"`
    Prefixed(String),
}

/// `entity.agg(.agg)*[[]]`: the nested structure a FLATTEN pulls out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenPath {
    pub entity: String,
    /// Aggregation names from the entity downwards; never empty.
    pub segments: Vec<String>,
    /// Trailing `[]` marker.
    pub array: bool,
}

impl fmt::Display for FlattenPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.entity)?;
        for segment in &self.segments {
            write!(f, ".{}", segment)?;
        }
        if self.array {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

/// Clauses accepted after a FLATTEN head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlattenClause {
    GenerateKey { attribute: String, strategy: KeyStrategy },
    AddReference { attribute: String, target: String },
    Rename { from: String, to: String },
}

/// One schema operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    RenameAttribute {
        entity: String,
        from: String,
        to: String,
    },
    RenameEntity {
        from: String,
        to: String,
    },
    AddAttribute {
        entity: String,
        attribute: AttributeSpec,
    },
    AddEntity {
        name: String,
        attributes: Vec<AttributeSpec>,
    },
    DeleteAttribute(AttributePath),
    DeleteEntity {
        name: String,
    },
    Extract {
        entity: String,
        attributes: Vec<String>,
        into: String,
    },
    Copy {
        source: AttributePath,
        target: AttributePath,
    },
    GenerateKey {
        path: AttributePath,
        strategy: KeyStrategy,
    },
    AddReference {
        path: AttributePath,
        target: String,
    },
    DeleteReference(AttributePath),
    AddPrimaryKey {
        entity: String,
        attributes: Vec<String>,
    },
    DropPrimaryKey {
        entity: String,
        attributes: Vec<String>,
    },
    Nest {
        source: String,
        target: String,
        alias: String,
    },
    Flatten {
        path: FlattenPath,
        into: String,
        clauses: Vec<FlattenClause>,
    },
}

impl Operation {
    /// Leading keywords of the operation in script form.
    pub fn keyword(&self) -> &'static str {
        match self {
            Operation::RenameAttribute { .. } => "RENAME",
            Operation::RenameEntity { .. } => "RENAME ENTITY",
            Operation::AddAttribute { .. } => "ADD ATTRIBUTE",
            Operation::AddEntity { .. } => "ADD ENTITY",
            Operation::DeleteAttribute(_) => "DELETE ATTRIBUTE",
            Operation::DeleteEntity { .. } => "DELETE ENTITY",
            Operation::Extract { .. } => "EXTRACT",
            Operation::Copy { .. } => "COPY",
            Operation::GenerateKey { .. } => "GENERATE KEY",
            Operation::AddReference { .. } => "ADD REFERENCE",
            Operation::DeleteReference(_) => "DELETE REFERENCE",
            Operation::AddPrimaryKey { .. } => "ADD PRIMARY KEY",
            Operation::DropPrimaryKey { .. } => "DROP PRIMARY KEY",
            Operation::Nest { .. } => "NEST",
            Operation::Flatten { .. } => "FLATTEN",
        }
    }

    /// Whether the operation belongs to the migration (cross-paradigm) set.
    pub fn is_migration_operation(&self) -> bool {
        matches!(
            self,
            Operation::GenerateKey { .. }
                | Operation::AddReference { .. }
                | Operation::DeleteReference(_)
                | Operation::AddPrimaryKey { .. }
                | Operation::DropPrimaryKey { .. }
                | Operation::Nest { .. }
                | Operation::Flatten { .. }
        )
    }
}

//! Pretty printer for SMEL migrations
//!
//! Produces canonical script text: upper-case keywords, one statement per
//! line, FLATTEN clauses indented below their head, every statement
//! terminated by `;`. `parse(pretty_print(m)) == m` for any migration whose
//! defaults are plain literals.

use smel_core::{
    AttributeSpec, FlattenClause, Header, KeyStrategy, Literal, Migration, Operation,
};

// ============================================================================
// PRETTY PRINTER
// ============================================================================

/// Pretty-print a migration back to SMEL source.
pub fn pretty_print(migration: &Migration) -> String {
    let mut output = pretty_print_header(&migration.header);

    if !migration.operations.is_empty() {
        output.push('\n');
    }
    for operation in &migration.operations {
        output.push_str(&pretty_print_operation(operation));
        output.push_str(";\n");
    }

    output
}

fn pretty_print_header(header: &Header) -> String {
    format!(
        "MIGRATION {}:{}\nFROM {} TO {}\nUSING {}:{}\n",
        header.name,
        header.version,
        header.source.keyword(),
        header.target.keyword(),
        header.schema,
        header.schema_version
    )
}

/// Render one operation without the trailing `;`.
pub fn pretty_print_operation(operation: &Operation) -> String {
    match operation {
        Operation::RenameAttribute { entity, from, to } => {
            format!("RENAME {} TO {} IN {}", from, to, entity)
        }
        Operation::RenameEntity { from, to } => format!("RENAME ENTITY {} TO {}", from, to),
        Operation::AddAttribute { entity, attribute } => format!(
            "ADD ATTRIBUTE {}.{} WITH TYPE {}",
            entity,
            attribute.name,
            pretty_print_type_and_modifiers(attribute)
        ),
        Operation::AddEntity { name, attributes } => {
            let attrs: Vec<String> = attributes
                .iter()
                .map(|a| format!("{} {}", a.name, pretty_print_type_and_modifiers(a)))
                .collect();
            format!("ADD ENTITY {} WITH ATTRIBUTES ({})", name, attrs.join(", "))
        }
        Operation::DeleteAttribute(path) => format!("DELETE ATTRIBUTE {}", path),
        Operation::DeleteEntity { name } => format!("DELETE ENTITY {}", name),
        Operation::Extract {
            entity,
            attributes,
            into,
        } => format!(
            "EXTRACT ({}) FROM {} INTO {}",
            attributes.join(", "),
            entity,
            into
        ),
        Operation::Copy { source, target } => format!("COPY {} TO {}", source, target),
        Operation::GenerateKey { path, strategy } => {
            format!("GENERATE KEY {} AS {}", path, pretty_print_strategy(strategy))
        }
        Operation::AddReference { path, target } => {
            format!("ADD REFERENCE {} TO {}", path, target)
        }
        Operation::DeleteReference(path) => format!("DELETE REFERENCE {}", path),
        Operation::AddPrimaryKey { entity, attributes } => {
            format!("ADD PRIMARY KEY ({}) TO {}", attributes.join(", "), entity)
        }
        Operation::DropPrimaryKey { entity, attributes } => {
            format!("DROP PRIMARY KEY ({}) FROM {}", attributes.join(", "), entity)
        }
        Operation::Nest {
            source,
            target,
            alias,
        } => format!("NEST {} INTO {} AS {}", source, target, alias),
        Operation::Flatten {
            path,
            into,
            clauses,
        } => {
            let mut output = format!("FLATTEN {} AS {}", path, into);
            for clause in clauses {
                output.push_str("\n    ");
                output.push_str(&pretty_print_flatten_clause(clause));
            }
            output
        }
    }
}

fn pretty_print_flatten_clause(clause: &FlattenClause) -> String {
    match clause {
        FlattenClause::GenerateKey {
            attribute,
            strategy,
        } => format!("GENERATE KEY {} AS {}", attribute, pretty_print_strategy(strategy)),
        FlattenClause::AddReference { attribute, target } => {
            format!("ADD REFERENCE {} TO {}", attribute, target)
        }
        FlattenClause::Rename { from, to } => format!("RENAME {} TO {}", from, to),
    }
}

fn pretty_print_strategy(strategy: &KeyStrategy) -> String {
    match strategy {
        KeyStrategy::Serial => "SERIAL".to_string(),
        KeyStrategy::Prefixed(prefix) => format!("STRING PREFIX \"{}\"", escape_string(prefix)),
    }
}

fn pretty_print_type_and_modifiers(attribute: &AttributeSpec) -> String {
    let mut output = attribute.data_type.to_string();
    if attribute.not_null {
        output.push_str(" NOT NULL");
    }
    if let Some(default) = &attribute.default {
        output.push_str(" DEFAULT ");
        output.push_str(&pretty_print_literal(default));
    }
    output
}

fn pretty_print_literal(literal: &Literal) -> String {
    match literal {
        Literal::String(s) => format!("\"{}\"", escape_string(s)),
        other => other.to_string(),
    }
}

pub(crate) fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
        .replace('\r', "\\r")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use smel_core::{AttributePath, CanonicalType, FlattenPath, Paradigm};

    fn header() -> Header {
        Header {
            name: "m".to_string(),
            version: "1.0".to_string(),
            source: Paradigm::Document,
            target: Paradigm::Relational,
            schema: "s".to_string(),
            schema_version: "1".to_string(),
        }
    }

    #[test]
    fn test_pretty_print_header_only() {
        let migration = Migration {
            header: header(),
            operations: vec![],
        };
        let output = pretty_print(&migration);
        assert_eq!(output, "MIGRATION m:1.0\nFROM DOCUMENT TO RELATIONAL\nUSING s:1\n");
    }

    #[test]
    fn test_pretty_print_flatten_indents_clauses() {
        let operation = Operation::Flatten {
            path: FlattenPath {
                entity: "person".to_string(),
                segments: vec!["tags".to_string()],
                array: true,
            },
            into: "person_tag".to_string(),
            clauses: vec![
                FlattenClause::GenerateKey {
                    attribute: "id".to_string(),
                    strategy: KeyStrategy::Serial,
                },
                FlattenClause::AddReference {
                    attribute: "person_id".to_string(),
                    target: "person".to_string(),
                },
            ],
        };
        assert_eq!(
            pretty_print_operation(&operation),
            "FLATTEN person.tags[] AS person_tag\n    GENERATE KEY id AS SERIAL\n    ADD REFERENCE person_id TO person"
        );
    }

    #[test]
    fn test_pretty_print_escapes_strings() {
        let operation = Operation::AddAttribute {
            entity: "note".to_string(),
            attribute: AttributeSpec {
                name: "body".to_string(),
                data_type: CanonicalType::Text,
                not_null: false,
                default: Some(Literal::String("say \"hi\"".to_string())),
            },
        };
        let migration = Migration {
            header: header(),
            operations: vec![operation],
        };
        let printed = pretty_print(&migration);
        assert!(printed.contains(r#"DEFAULT "say \"hi\"""#));
        assert_eq!(parse(&printed).unwrap(), migration);
    }

    #[test]
    fn test_round_trip_is_stable() {
        let migration = Migration {
            header: header(),
            operations: vec![
                Operation::GenerateKey {
                    path: AttributePath::new("customer", "id"),
                    strategy: KeyStrategy::Prefixed("cust_".to_string()),
                },
                Operation::DropPrimaryKey {
                    entity: "line".to_string(),
                    attributes: vec!["a".to_string(), "b".to_string()],
                },
            ],
        };
        let once = pretty_print(&migration);
        let twice = pretty_print(&parse(&once).unwrap());
        assert_eq!(once, twice);
    }
}

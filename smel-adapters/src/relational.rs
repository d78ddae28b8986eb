//! PostgreSQL DDL adapter
//!
//! Reads `CREATE TABLE` statements and writes them back in one canonical
//! layout: one column per line, inline `PRIMARY KEY` for single-column keys,
//! a trailing `PRIMARY KEY (...)` line for composite ones, inline
//! `REFERENCES`, and referenced tables before the tables that point at them.

use crate::text::{split_top_level, statement_head, strip_comments};
use crate::SchemaAdapter;
use once_cell::sync::Lazy;
use regex::Regex;
use smel_core::{
    canonical_of, native_of, AdapterError, AdapterResult, Attribute, CanonicalType, Entity, Key,
    KeyGenerator, KeyKind, Literal, NativeType, Paradigm, Reference, SchemaDraft, SchemaError,
    Snapshot,
};

static CREATE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*\((.*)\)$").unwrap()
});
static CREATE_TABLE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^CREATE\s+TABLE\b").unwrap());
static TABLE_PRIMARY_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^(?:CONSTRAINT\s+[A-Za-z_][A-Za-z0-9_]*\s+)?PRIMARY\s+KEY\s*\(([^)]*)\)$").unwrap()
});
static TABLE_FOREIGN_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^(?:CONSTRAINT\s+[A-Za-z_][A-Za-z0-9_]*\s+)?FOREIGN\s+KEY\s*\(\s*([A-Za-z_][A-Za-z0-9_]*)\s*\)\s*REFERENCES\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:\(\s*([A-Za-z_][A-Za-z0-9_]*)\s*\))?$",
    )
    .unwrap()
});
static TABLE_CONSTRAINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(CONSTRAINT|UNIQUE|CHECK|EXCLUDE|PRIMARY\s+KEY|FOREIGN\s+KEY)\b").unwrap());
static COLUMN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^([A-Za-z_][A-Za-z0-9_]*)\s+(.+)$").unwrap());
static COLUMN_CONSTRAINT_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(PRIMARY\s+KEY|NOT\s+NULL|NULL|DEFAULT|REFERENCES|UNIQUE|CHECK|CONSTRAINT)\b").unwrap()
});
static PRIMARY_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^PRIMARY\s+KEY\s*").unwrap());
static NOT_NULL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^NOT\s+NULL\s*").unwrap());
static NULL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^NULL\s*").unwrap());
static DEFAULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^DEFAULT\s+('(?:[^']|'')*'|[^\s(]+(?:\([^)]*\))?)\s*").unwrap()
});
static REFERENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^REFERENCES\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:\(\s*([A-Za-z_][A-Za-z0-9_]*)\s*\))?\s*").unwrap()
});
static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+$").unwrap());
static DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+\.\d+$").unwrap());

const SERIAL_TYPES: [&str; 6] = ["serial", "serial4", "bigserial", "serial8", "smallserial", "serial2"];

/// Adapter for PostgreSQL `CREATE TABLE` DDL.
#[derive(Debug, Clone, Default)]
pub struct RelationalAdapter;

impl RelationalAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl SchemaAdapter for RelationalAdapter {
    fn paradigm(&self) -> Paradigm {
        Paradigm::Relational
    }

    fn import_schema(&self, raw: &str, name: &str) -> AdapterResult<Snapshot> {
        let source = strip_comments(raw);
        let mut draft = SchemaDraft::new(name, 1, Paradigm::Relational);
        let mut pending = Vec::new();

        for statement in split_top_level(&source, ';') {
            let (entity, references) = parse_create_table(&statement)?;
            tracing::debug!(table = %entity.name, columns = entity.attributes.len(), "Imported table");
            draft.push_entity(entity);
            pending.extend(references);
        }

        for reference in pending {
            let to_key = match reference.to_attribute {
                Some(attribute) => vec![attribute],
                None => {
                    let target = draft.lookup(&reference.to_entity)?;
                    target
                        .primary_key()
                        .map(|k| k.attributes.clone())
                        .ok_or_else(|| SchemaError::NoPrimaryKey {
                            entity: target.name.clone(),
                        })?
                }
            };
            draft.lookup_mut(&reference.table)?.references.push(Reference::new(
                reference.from_attribute,
                reference.to_entity,
                to_key,
            ));
        }

        Ok(draft.commit()?)
    }

    fn export_schema(&self, snapshot: &Snapshot) -> AdapterResult<String> {
        let mut tables = Vec::with_capacity(snapshot.len());
        for entity in dependency_order(snapshot.entities()) {
            tables.push(render_table(entity)?);
            tracing::debug!(table = %entity.name, "Exported table");
        }
        Ok(tables.join("\n"))
    }
}

// ============================================================================
// IMPORT
// ============================================================================

/// A `REFERENCES` clause waiting for every table to be known.
struct PendingReference {
    table: String,
    from_attribute: String,
    to_entity: String,
    to_attribute: Option<String>,
}

fn parse_failure(reason: impl Into<String>) -> AdapterError {
    AdapterError::ParseFailure {
        paradigm: Paradigm::Relational,
        reason: reason.into(),
    }
}

fn unsupported(construct: impl Into<String>) -> AdapterError {
    AdapterError::UnsupportedConstruct {
        paradigm: Paradigm::Relational,
        construct: construct.into(),
    }
}

fn parse_create_table(statement: &str) -> AdapterResult<(Entity, Vec<PendingReference>)> {
    let captures = match CREATE_TABLE.captures(statement) {
        Some(captures) => captures,
        None if CREATE_TABLE_PREFIX.is_match(statement) => {
            return Err(parse_failure(format!("malformed CREATE TABLE: {}", statement_head(statement))))
        }
        None => return Err(unsupported(statement_head(statement))),
    };
    let table = captures[1].to_string();
    let mut entity = Entity::new(table.clone(), Paradigm::Relational);
    let mut references = Vec::new();

    for definition in split_top_level(&captures[2], ',') {
        if let Some(key) = TABLE_PRIMARY_KEY.captures(&definition) {
            let columns: Vec<String> = key[1].split(',').map(|c| c.trim().to_string()).collect();
            if columns.iter().any(|c| c.is_empty()) {
                return Err(parse_failure(format!("empty PRIMARY KEY column in '{}'", table)));
            }
            for column in &columns {
                if let Some(attribute) = entity.attribute_mut(column) {
                    attribute.nullable = false;
                }
            }
            entity.keys.push(Key::new(KeyKind::Primary, columns));
        } else if let Some(foreign) = TABLE_FOREIGN_KEY.captures(&definition) {
            references.push(PendingReference {
                table: table.clone(),
                from_attribute: foreign[1].to_string(),
                to_entity: foreign[2].to_string(),
                to_attribute: foreign.get(3).map(|m| m.as_str().to_string()),
            });
        } else if let Some(constraint) = TABLE_CONSTRAINT.captures(&definition) {
            return Err(unsupported(format!(
                "table constraint {} in '{}'",
                constraint[1].to_ascii_uppercase(),
                table
            )));
        } else {
            let (attribute, inline_key, reference) = parse_column(&table, &definition)?;
            if inline_key {
                entity.keys.push(Key::primary([attribute.name.as_str()]));
            }
            if let Some(reference) = reference {
                references.push(reference);
            }
            entity.attributes.push(attribute);
        }
    }

    Ok((entity, references))
}

fn parse_column(table: &str, definition: &str) -> AdapterResult<(Attribute, bool, Option<PendingReference>)> {
    let captures = COLUMN
        .captures(definition)
        .ok_or_else(|| parse_failure(format!("malformed column '{}' in '{}'", definition, table)))?;
    let name = captures[1].to_string();
    let rest = captures.get(2).map(|m| m.as_str()).unwrap_or_default();

    let split = COLUMN_CONSTRAINT_START.find(rest).map(|m| m.start()).unwrap_or(rest.len());
    let type_text = &rest[..split];
    let native = NativeType::parse(type_text)
        .ok_or_else(|| parse_failure(format!("malformed type '{}' for {}.{}", type_text.trim(), table, name)))?;
    let data_type = canonical_of(Paradigm::Relational, &native)?;

    let mut attribute = Attribute::new(name.clone(), data_type);
    if SERIAL_TYPES.contains(&native.name.to_ascii_lowercase().as_str()) {
        attribute = attribute.generated(KeyGenerator::Serial);
    }

    let mut inline_key = false;
    let mut reference = None;
    let mut constraints = rest[split..].trim();
    while !constraints.is_empty() {
        if let Some(m) = PRIMARY_KEY.find(constraints) {
            inline_key = true;
            attribute.nullable = false;
            constraints = &constraints[m.end()..];
        } else if let Some(m) = NOT_NULL.find(constraints) {
            attribute.nullable = false;
            constraints = &constraints[m.end()..];
        } else if let Some(m) = NULL.find(constraints) {
            constraints = &constraints[m.end()..];
        } else if let Some(c) = DEFAULT.captures(constraints) {
            attribute.default = Some(parse_default(&c[1]));
            constraints = &constraints[c[0].len()..];
        } else if let Some(c) = REFERENCES.captures(constraints) {
            reference = Some(PendingReference {
                table: table.to_string(),
                from_attribute: name.clone(),
                to_entity: c[1].to_string(),
                to_attribute: c.get(2).map(|m| m.as_str().to_string()),
            });
            constraints = &constraints[c[0].len()..];
        } else {
            let head = constraints.split_whitespace().next().unwrap_or_default().to_ascii_uppercase();
            return match head.as_str() {
                "UNIQUE" | "CHECK" | "CONSTRAINT" => {
                    Err(unsupported(format!("column constraint {} on {}.{}", head, table, name)))
                }
                _ => Err(parse_failure(format!("unexpected '{}' after {}.{}", head, table, name))),
            };
        }
    }

    Ok((attribute, inline_key, reference))
}

fn parse_default(text: &str) -> Literal {
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        return Literal::String(text[1..text.len() - 1].replace("''", "'"));
    }
    if INTEGER.is_match(text) {
        if let Ok(n) = text.parse::<i64>() {
            return Literal::Integer(n);
        }
    }
    if DECIMAL.is_match(text) {
        return Literal::Decimal(text.to_string());
    }
    match text.to_ascii_uppercase().as_str() {
        "TRUE" => Literal::Boolean(true),
        "FALSE" => Literal::Boolean(false),
        "NULL" => Literal::Null,
        _ => Literal::Expression(text.to_string()),
    }
}

// ============================================================================
// EXPORT
// ============================================================================

/// Tables ordered so every referenced table comes before its referrers.
///
/// Among tables that are ready at the same time, declaration order wins.
/// A reference cycle is broken at the earliest remaining table.
fn dependency_order(entities: &[Entity]) -> Vec<&Entity> {
    let mut emitted = vec![false; entities.len()];
    let mut ordered = Vec::with_capacity(entities.len());

    while ordered.len() < entities.len() {
        let ready = entities.iter().enumerate().position(|(i, entity)| {
            !emitted[i]
                && entity.references.iter().all(|r| {
                    r.to_entity == entity.name
                        || entities
                            .iter()
                            .position(|e| e.name == r.to_entity)
                            .map(|j| emitted[j])
                            .unwrap_or(true)
                })
        });
        let next = ready.or_else(|| emitted.iter().position(|done| !done));
        match next {
            Some(i) => {
                emitted[i] = true;
                ordered.push(&entities[i]);
            }
            None => break,
        }
    }

    ordered
}

fn render_table(entity: &Entity) -> AdapterResult<String> {
    if let Some(aggregation) = entity.aggregations.first() {
        return Err(unsupported(format!(
            "nested structure {}.{} (flatten it first)",
            entity.name, aggregation.name
        )));
    }

    let inline_key = entity
        .primary_key()
        .filter(|k| k.attributes.len() == 1)
        .map(|k| k.attributes[0].as_str());

    let mut lines = Vec::with_capacity(entity.attributes.len() + 1);
    for attribute in &entity.attributes {
        let serial = attribute.is_serial() && attribute.data_type == CanonicalType::Integer;
        let mut line = format!("    {} ", attribute.name);
        if serial {
            line.push_str("SERIAL");
        } else {
            line.push_str(&native_of(Paradigm::Relational, attribute.data_type).to_string());
        }

        let primary = inline_key == Some(attribute.name.as_str());
        if primary {
            line.push_str(" PRIMARY KEY");
        } else if !attribute.nullable && !serial {
            line.push_str(" NOT NULL");
        }
        if let Some(default) = &attribute.default {
            line.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some(reference) = entity.reference_from(&attribute.name) {
            line.push_str(&format!(
                " REFERENCES {}({})",
                reference.to_entity,
                reference.to_key.join(", ")
            ));
        }
        lines.push(line);
    }

    if let Some(key) = entity.primary_key().filter(|k| k.attributes.len() > 1) {
        lines.push(format!("    PRIMARY KEY ({})", key.attributes.join(", ")));
    }

    Ok(format!("CREATE TABLE {} (\n{}\n);\n", entity.name, lines.join(",\n")))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use smel_core::ErrorKind;
    use smel_test_utils::fixtures::{shop_relational_snapshot, SHOP_DDL};

    fn import(ddl: &str) -> AdapterResult<Snapshot> {
        RelationalAdapter::new().import_schema(ddl, "shop")
    }

    #[test]
    fn test_import_shop_matches_fixture() {
        assert_eq!(import(SHOP_DDL).unwrap(), shop_relational_snapshot());
    }

    #[test]
    fn test_export_shop_is_canonical() {
        let exported = RelationalAdapter::new()
            .export_schema(&shop_relational_snapshot())
            .unwrap();
        assert_eq!(exported, SHOP_DDL);
    }

    #[test]
    fn test_import_table_level_constraints_and_comments() {
        let ddl = "-- accounts\nCREATE TABLE IF NOT EXISTS account (\n  id INTEGER,\n  owner_id INTEGER,\n  label TEXT DEFAULT 'it''s',\n  /* composite */\n  PRIMARY KEY (id),\n  FOREIGN KEY (owner_id) REFERENCES account\n);";
        let snapshot = import(ddl).unwrap();
        let account = snapshot.entity("account").unwrap();
        assert!(!account.attribute("id").unwrap().nullable);
        assert_eq!(account.primary_key().unwrap().attributes, vec!["id"]);
        assert_eq!(account.reference_from("owner_id").unwrap().to_key, vec!["id"]);
        assert_eq!(
            account.attribute("label").unwrap().default,
            Some(Literal::String("it's".to_string()))
        );
    }

    #[test]
    fn test_references_resolve_forward() {
        let ddl = "CREATE TABLE a (b_id INTEGER REFERENCES b); CREATE TABLE b (id SERIAL PRIMARY KEY);";
        let snapshot = import(ddl).unwrap();
        assert_eq!(snapshot.entity("a").unwrap().reference_from("b_id").unwrap().to_entity, "b");

        let exported = RelationalAdapter::new().export_schema(&snapshot).unwrap();
        assert!(exported.starts_with("CREATE TABLE b ("));
    }

    #[test]
    fn test_import_errors() {
        assert_eq!(import("CREATE INDEX i ON t (x);").unwrap_err().kind(), ErrorKind::UnsupportedConstruct);
        assert_eq!(import("CREATE TABLE t x int;").unwrap_err().kind(), ErrorKind::ParseFailure);
        assert_eq!(import("CREATE TABLE t (x GEOMETRY);").unwrap_err().kind(), ErrorKind::UnsupportedType);
        assert_eq!(
            import("CREATE TABLE t (x INTEGER UNIQUE);").unwrap_err().kind(),
            ErrorKind::UnsupportedConstruct
        );
        assert_eq!(
            import("CREATE TABLE t (x INTEGER REFERENCES nowhere(id));").unwrap_err().kind(),
            ErrorKind::UnknownEntity
        );
    }

    #[test]
    fn test_export_rejects_nested_structures() {
        let snapshot = smel_test_utils::fixtures::person_document_snapshot();
        let err = RelationalAdapter::new().export_schema(&snapshot).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedConstruct);
    }

    #[test]
    fn test_parse_default_literals() {
        assert_eq!(parse_default("42"), Literal::Integer(42));
        assert_eq!(parse_default("-1.50"), Literal::Decimal("-1.50".to_string()));
        assert_eq!(parse_default("true"), Literal::Boolean(true));
        assert_eq!(parse_default("NULL"), Literal::Null);
        assert_eq!(parse_default("now()"), Literal::Expression("now()".to_string()));
    }
}

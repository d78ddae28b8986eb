//! CQL adapter
//!
//! User-defined types become aggregation payloads: `frozen<udt>` columns are
//! embedded aggregations, `list<...>`/`set<...>` columns are arrays. The
//! primary key keeps its partition/clustering layout, so a table carries a
//! Primary key plus Partition and (when present) Clustering keys.

use crate::text::{parenthesized, split_top_level, statement_head, strip_comments};
use crate::SchemaAdapter;
use once_cell::sync::Lazy;
use regex::Regex;
use smel_core::{
    canonical_of, native_of, AdapterError, AdapterResult, Aggregation, AggregationKind, Attribute,
    CanonicalType, Entity, Key, KeyKind, NativeType, Paradigm, SchemaDraft, SmelConfig, Snapshot,
};
use std::collections::HashMap;

static CREATE_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^CREATE\s+(TABLE|TYPE)\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:[A-Za-z_][A-Za-z0-9_]*\.)?([A-Za-z_][A-Za-z0-9_]*)\s*").unwrap()
});
static TABLE_OPTIONS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^WITH\s+").unwrap());
static PRIMARY_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^PRIMARY\s+KEY\s*\((.*)\)$").unwrap());
static COLUMN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^([A-Za-z_][A-Za-z0-9_]*)\s+(.+?)(\s+PRIMARY\s+KEY)?$").unwrap()
});
static FROZEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^frozen\s*<\s*(.+)\s*>$").unwrap());
static COLLECTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(list|set|map)\s*<\s*(.+)\s*>$").unwrap());

/// Adapter for Cassandra/ScyllaDB CQL schemas.
#[derive(Debug, Clone)]
pub struct ColumnarAdapter {
    value_column: String,
}

impl ColumnarAdapter {
    pub fn new(config: &SmelConfig) -> Self {
        Self {
            value_column: config.value_column.clone(),
        }
    }
}

impl Default for ColumnarAdapter {
    fn default() -> Self {
        Self::new(&SmelConfig::default())
    }
}

fn parse_failure(reason: impl Into<String>) -> AdapterError {
    AdapterError::ParseFailure {
        paradigm: Paradigm::Columnar,
        reason: reason.into(),
    }
}

fn unsupported(construct: impl Into<String>) -> AdapterError {
    AdapterError::UnsupportedConstruct {
        paradigm: Paradigm::Columnar,
        construct: construct.into(),
    }
}

impl SchemaAdapter for ColumnarAdapter {
    fn paradigm(&self) -> Paradigm {
        Paradigm::Columnar
    }

    fn import_schema(&self, raw: &str, name: &str) -> AdapterResult<Snapshot> {
        let source = strip_comments(raw);
        let mut types: HashMap<String, Entity> = HashMap::new();
        let mut draft = SchemaDraft::new(name, 1, Paradigm::Columnar);

        for statement in split_top_level(&source, ';') {
            let head = CREATE_HEAD
                .captures(&statement)
                .ok_or_else(|| unsupported(statement_head(&statement)))?;
            let object = head[2].to_string();
            let is_type = head[1].eq_ignore_ascii_case("type");
            let (body, trailing) = parenthesized(&statement[head[0].len()..])
                .ok_or_else(|| parse_failure(format!("malformed {}", statement_head(&statement))))?;
            if !trailing.is_empty() && (is_type || !TABLE_OPTIONS.is_match(trailing)) {
                return Err(parse_failure(format!("unexpected '{}' after '{}'", trailing, object)));
            }

            if is_type {
                let mut payload = Entity::new(object.clone(), Paradigm::Columnar);
                for field in split_top_level(body, ',') {
                    self.import_column(&mut payload, &field, &types)?;
                }
                tracing::debug!(udt = %object, "Imported user-defined type");
                types.insert(object, payload);
            } else {
                let entity = self.import_table(&object, body, &types)?;
                tracing::debug!(table = %entity.name, "Imported table");
                draft.push_entity(entity);
            }
        }

        Ok(draft.commit()?)
    }

    fn export_schema(&self, snapshot: &Snapshot) -> AdapterResult<String> {
        let mut udts: Vec<&Entity> = Vec::new();
        for entity in snapshot.entities() {
            self.collect_udts(entity, &mut udts);
        }

        let mut statements = Vec::new();
        for udt in &udts {
            let fields = self.column_lines(udt)?;
            statements.push(format!("CREATE TYPE {} (\n{}\n);\n", udt.name, fields.join(",\n")));
        }
        for entity in snapshot.entities() {
            statements.push(self.render_table(entity)?);
            tracing::debug!(table = %entity.name, "Exported table");
        }
        Ok(statements.join("\n"))
    }
}

// ============================================================================
// IMPORT
// ============================================================================

impl ColumnarAdapter {
    fn import_table(&self, name: &str, body: &str, types: &HashMap<String, Entity>) -> AdapterResult<Entity> {
        let mut entity = Entity::new(name, Paradigm::Columnar);
        let mut layout: Option<(Vec<String>, Vec<String>)> = None;

        for definition in split_top_level(body, ',') {
            if let Some(key) = PRIMARY_KEY.captures(&definition) {
                layout = Some(parse_key_layout(&key[1])?);
            } else if let Some(column) = self.import_column(&mut entity, &definition, types)? {
                layout = Some((vec![column], Vec::new()));
            }
        }

        let (partition, clustering) =
            layout.ok_or_else(|| parse_failure(format!("table '{}' has no PRIMARY KEY", name)))?;
        let mut primary = partition.clone();
        primary.extend(clustering.iter().cloned());
        for attribute in &mut entity.attributes {
            if primary.contains(&attribute.name) {
                attribute.nullable = false;
            }
        }
        entity.keys.push(Key::new(KeyKind::Primary, primary));
        entity.keys.push(Key::new(KeyKind::Partition, partition));
        if !clustering.is_empty() {
            entity.keys.push(Key::new(KeyKind::Clustering, clustering));
        }
        Ok(entity)
    }

    /// Add one column or UDT field to `entity`; returns the column name when
    /// it carried an inline `PRIMARY KEY`.
    fn import_column(
        &self,
        entity: &mut Entity,
        definition: &str,
        types: &HashMap<String, Entity>,
    ) -> AdapterResult<Option<String>> {
        let captures = COLUMN
            .captures(definition)
            .ok_or_else(|| parse_failure(format!("malformed column '{}' in '{}'", definition, entity.name)))?;
        let name = captures[1].to_string();
        let type_text = captures[2].trim();
        let inline_key = captures.get(3).is_some();
        let scalar = !FROZEN.is_match(type_text) && !COLLECTION.is_match(type_text);
        if inline_key && !scalar {
            return Err(unsupported(format!("PRIMARY KEY on non-scalar column {}.{}", entity.name, name)));
        }

        if let Some(frozen) = FROZEN.captures(type_text) {
            let payload = lookup_udt(types, frozen[1].trim())?;
            entity
                .aggregations
                .push(Aggregation::new(name.clone(), AggregationKind::Embedded, payload));
        } else if let Some(collection) = COLLECTION.captures(type_text) {
            if collection[1].eq_ignore_ascii_case("map") {
                return Err(unsupported(format!("map column {}.{}", entity.name, name)));
            }
            let element = collection[2].trim();
            let payload = match FROZEN.captures(element) {
                Some(frozen) => lookup_udt(types, frozen[1].trim())?,
                None => Entity::new(name.clone(), Paradigm::Columnar)
                    .with_attribute(Attribute::new(self.value_column.clone(), scalar_type(element)?)),
            };
            entity
                .aggregations
                .push(Aggregation::new(name.clone(), AggregationKind::Array, payload));
        } else {
            entity.attributes.push(Attribute::new(name.clone(), scalar_type(type_text)?));
        }

        Ok(inline_key.then_some(name))
    }
}

fn lookup_udt(types: &HashMap<String, Entity>, name: &str) -> AdapterResult<Entity> {
    types
        .get(name)
        .cloned()
        .ok_or_else(|| parse_failure(format!("unknown user-defined type '{}'", name)))
}

fn scalar_type(text: &str) -> AdapterResult<CanonicalType> {
    let native = NativeType::parse(text).ok_or_else(|| parse_failure(format!("malformed type '{}'", text)))?;
    Ok(canonical_of(Paradigm::Columnar, &native)?)
}

/// `(p1, p2), c1` or `p, c1` into (partition, clustering).
fn parse_key_layout(text: &str) -> AdapterResult<(Vec<String>, Vec<String>)> {
    let parts = split_top_level(text, ',');
    let (first, rest) = parts
        .split_first()
        .ok_or_else(|| parse_failure("empty PRIMARY KEY"))?;
    let partition: Vec<String> = match first.strip_prefix('(').and_then(|p| p.strip_suffix(')')) {
        Some(inner) => inner.split(',').map(|c| c.trim().to_string()).collect(),
        None => vec![first.clone()],
    };
    if partition.iter().chain(rest).any(|c| c.is_empty()) {
        return Err(parse_failure("empty PRIMARY KEY column"));
    }
    Ok((partition, rest.to_vec()))
}

// ============================================================================
// EXPORT
// ============================================================================

impl ColumnarAdapter {
    /// Payloads that need a `CREATE TYPE`, innermost first, each once.
    fn collect_udts<'s>(&self, entity: &'s Entity, udts: &mut Vec<&'s Entity>) {
        for aggregation in &entity.aggregations {
            if aggregation.is_scalar(&self.value_column) {
                continue;
            }
            self.collect_udts(&aggregation.payload, udts);
            if !udts.iter().any(|u| u.name == aggregation.payload.name) {
                udts.push(&aggregation.payload);
            }
        }
    }

    fn column_lines(&self, entity: &Entity) -> AdapterResult<Vec<String>> {
        let mut lines = Vec::new();
        for attribute in &entity.attributes {
            lines.push(format!(
                "    {} {}",
                attribute.name,
                native_of(Paradigm::Columnar, attribute.data_type)
            ));
        }
        for aggregation in &entity.aggregations {
            let column_type = match aggregation.kind {
                AggregationKind::Embedded => format!("frozen<{}>", aggregation.payload.name),
                AggregationKind::Array if aggregation.is_scalar(&self.value_column) => format!(
                    "list<{}>",
                    native_of(Paradigm::Columnar, aggregation.payload.attributes[0].data_type)
                ),
                AggregationKind::Array => format!("list<frozen<{}>>", aggregation.payload.name),
            };
            lines.push(format!("    {} {}", aggregation.name, column_type));
        }
        if lines.is_empty() {
            return Err(unsupported(format!("'{}' has no columns", entity.name)));
        }
        Ok(lines)
    }

    fn render_table(&self, entity: &Entity) -> AdapterResult<String> {
        let primary = entity
            .primary_key()
            .ok_or_else(|| unsupported(format!("table '{}' without a primary key", entity.name)))?;
        let partition = entity
            .key(KeyKind::Partition)
            .map(|k| k.attributes.clone())
            .unwrap_or_else(|| primary.attributes[..1].to_vec());
        let clustering = entity
            .key(KeyKind::Clustering)
            .map(|k| k.attributes.clone())
            .unwrap_or_else(|| primary.attributes[partition.len().min(primary.attributes.len())..].to_vec());

        let partition_text = if partition.len() == 1 {
            partition[0].clone()
        } else {
            format!("({})", partition.join(", "))
        };
        let mut key_columns = vec![partition_text];
        key_columns.extend(clustering);

        let mut lines = self.column_lines(entity)?;
        lines.push(format!("    PRIMARY KEY ({})", key_columns.join(", ")));
        Ok(format!("CREATE TABLE {} (\n{}\n);\n", entity.name, lines.join(",\n")))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use smel_core::ErrorKind;

    const SENSOR_CQL: &str = "CREATE TYPE reading (
    value_at timestamp,
    level decimal
);

CREATE TABLE sensor (
    site text,
    sensor_id uuid,
    taken date,
    last frozen<reading>,
    tags list<text>,
    history list<frozen<reading>>,
    PRIMARY KEY ((site, sensor_id), taken)
);
";

    #[test]
    fn test_import_sensor_layout() {
        let snapshot = ColumnarAdapter::default().import_schema(SENSOR_CQL, "iot").unwrap();
        let sensor = snapshot.entity("sensor").unwrap();

        assert_eq!(sensor.attribute_names(), vec!["site", "sensor_id", "taken"]);
        assert_eq!(sensor.primary_key().unwrap().attributes, vec!["site", "sensor_id", "taken"]);
        assert_eq!(sensor.key(KeyKind::Partition).unwrap().attributes, vec!["site", "sensor_id"]);
        assert_eq!(sensor.key(KeyKind::Clustering).unwrap().attributes, vec!["taken"]);
        assert_eq!(sensor.attribute("sensor_id").unwrap().data_type, CanonicalType::Reference);
        assert!(!sensor.attribute("taken").unwrap().nullable);

        let last = sensor.aggregation("last").unwrap();
        assert_eq!(last.kind, AggregationKind::Embedded);
        assert_eq!(last.payload.attribute_names(), vec!["value_at", "level"]);
        assert!(sensor.aggregation("tags").unwrap().is_scalar("value"));
        assert_eq!(sensor.aggregation("history").unwrap().payload.name, "reading");
    }

    #[test]
    fn test_sensor_round_trip() {
        let adapter = ColumnarAdapter::default();
        let snapshot = adapter.import_schema(SENSOR_CQL, "iot").unwrap();
        assert_eq!(adapter.export_schema(&snapshot).unwrap(), SENSOR_CQL);
    }

    #[test]
    fn test_inline_primary_key() {
        let snapshot = ColumnarAdapter::default()
            .import_schema("CREATE TABLE t (id uuid PRIMARY KEY, name text) WITH comment = 'x';", "s")
            .unwrap();
        let t = snapshot.entity("t").unwrap();
        assert_eq!(t.primary_key().unwrap().attributes, vec!["id"]);
        assert_eq!(t.key(KeyKind::Partition).unwrap().attributes, vec!["id"]);
        assert!(t.key(KeyKind::Clustering).is_none());
    }

    #[test]
    fn test_inline_primary_key_names_its_own_column() {
        let snapshot = ColumnarAdapter::default()
            .import_schema(
                "CREATE TYPE point (x int, y int); CREATE TABLE t (id uuid PRIMARY KEY, at frozen<point>, tags set<text>);",
                "s",
            )
            .unwrap();
        let t = snapshot.entity("t").unwrap();
        assert_eq!(t.primary_key().unwrap().attributes, vec!["id"]);
        assert!(!t.attribute("id").unwrap().nullable);

        // a keyed column declared after an aggregation column
        let snapshot = ColumnarAdapter::default()
            .import_schema("CREATE TABLE u (tags list<text>, code text PRIMARY KEY);", "s")
            .unwrap();
        assert_eq!(snapshot.entity("u").unwrap().primary_key().unwrap().attributes, vec!["code"]);

        let err = ColumnarAdapter::default()
            .import_schema("CREATE TYPE point (x int); CREATE TABLE v (at frozen<point> PRIMARY KEY);", "s")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedConstruct);
    }

    #[test]
    fn test_set_columns_export_as_lists() {
        let adapter = ColumnarAdapter::default();
        let snapshot = adapter
            .import_schema("CREATE TABLE t (id int PRIMARY KEY, tags set<text>);", "s")
            .unwrap();
        assert_eq!(snapshot.entity("t").unwrap().aggregation("tags").unwrap().kind, AggregationKind::Array);
        assert!(adapter.export_schema(&snapshot).unwrap().contains("    tags list<text>,\n"));
    }

    #[test]
    fn test_import_errors() {
        let adapter = ColumnarAdapter::default();
        let err = adapter.import_schema("CREATE TABLE t (id int);", "s").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure);
        let err = adapter
            .import_schema("CREATE TABLE t (id int PRIMARY KEY, m map<text, int>);", "s")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedConstruct);
        let err = adapter
            .import_schema("CREATE TABLE t (id int PRIMARY KEY, u frozen<missing>);", "s")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure);
        let err = adapter.import_schema("CREATE KEYSPACE k WITH x = 1;", "s").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedConstruct);
    }
}

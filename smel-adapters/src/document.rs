//! MongoDB `$jsonSchema` adapter
//!
//! One JSON schema per collection; a JSON array holds several. Objects map to
//! embedded aggregations, arrays to array aggregations, and `_id` is the
//! primary key. Export writes keys in a fixed order (`$schema`, `title`,
//! `bsonType`, `required`, `properties`) so output is byte-stable.

use crate::SchemaAdapter;
use serde_json::{Map, Value};
use smel_core::{
    canonical_of, native_of, AdapterError, AdapterResult, Aggregation, AggregationKind, Attribute,
    Entity, Key, NativeType, Paradigm, SchemaDraft, SmelConfig, Snapshot,
};

const JSON_SCHEMA_DRAFT: &str = "http://json-schema.org/draft-07/schema#";
const ID_FIELD: &str = "_id";

/// Adapter for MongoDB `$jsonSchema` validators.
#[derive(Debug, Clone)]
pub struct DocumentAdapter {
    value_column: String,
}

impl DocumentAdapter {
    pub fn new(config: &SmelConfig) -> Self {
        Self {
            value_column: config.value_column.clone(),
        }
    }
}

impl Default for DocumentAdapter {
    fn default() -> Self {
        Self::new(&SmelConfig::default())
    }
}

fn parse_failure(reason: impl Into<String>) -> AdapterError {
    AdapterError::ParseFailure {
        paradigm: Paradigm::Document,
        reason: reason.into(),
    }
}

impl SchemaAdapter for DocumentAdapter {
    fn paradigm(&self) -> Paradigm {
        Paradigm::Document
    }

    fn import_schema(&self, raw: &str, name: &str) -> AdapterResult<Snapshot> {
        let root: Value = serde_json::from_str(raw).map_err(|e| parse_failure(e.to_string()))?;
        let schemas = match root {
            Value::Array(items) => items,
            object @ Value::Object(_) => vec![object],
            _ => return Err(parse_failure("expected a schema object or an array of them")),
        };

        let mut draft = SchemaDraft::new(name, 1, Paradigm::Document);
        for schema in &schemas {
            let title = schema
                .get("title")
                .and_then(Value::as_str)
                .ok_or_else(|| parse_failure("collection schema without a string 'title'"))?;
            let mut entity = self.import_object(title, schema)?;
            if entity.has_attribute(ID_FIELD) {
                entity.keys.push(Key::primary([ID_FIELD]));
            }
            tracing::debug!(collection = title, fields = entity.attributes.len(), "Imported collection");
            draft.push_entity(entity);
        }

        Ok(draft.commit()?)
    }

    fn export_schema(&self, snapshot: &Snapshot) -> AdapterResult<String> {
        let mut schemas = Vec::with_capacity(snapshot.len());
        for entity in snapshot.entities() {
            let mut schema = Map::new();
            schema.insert("$schema".to_string(), Value::from(JSON_SCHEMA_DRAFT));
            schema.insert("title".to_string(), Value::from(entity.name.clone()));
            for (key, value) in self.export_object(entity) {
                schema.insert(key, value);
            }
            schemas.push(Value::Object(schema));
            tracing::debug!(collection = %entity.name, "Exported collection");
        }

        let document = match schemas.len() {
            1 => schemas.remove(0),
            _ => Value::Array(schemas),
        };
        let mut rendered = serde_json::to_string_pretty(&document).map_err(|e| parse_failure(e.to_string()))?;
        rendered.push('\n');
        Ok(rendered)
    }
}

// ============================================================================
// IMPORT
// ============================================================================

impl DocumentAdapter {
    fn import_object(&self, name: &str, schema: &Value) -> AdapterResult<Entity> {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let properties = match schema.get("properties") {
            Some(Value::Object(properties)) => properties.clone(),
            Some(_) => return Err(parse_failure(format!("'properties' of '{}' is not an object", name))),
            None => Map::new(),
        };

        let mut entity = Entity::new(name, Paradigm::Document);
        for (field, property) in &properties {
            match bson_type(property, field)? {
                "object" => {
                    let payload = self.import_object(field, property)?;
                    entity
                        .aggregations
                        .push(Aggregation::new(field.clone(), AggregationKind::Embedded, payload));
                }
                "array" => {
                    let items = property
                        .get("items")
                        .ok_or_else(|| parse_failure(format!("array '{}' has no 'items'", field)))?;
                    let payload = if bson_type(items, field)? == "object" {
                        self.import_object(field, items)?
                    } else {
                        Entity::new(field.clone(), Paradigm::Document)
                            .with_attribute(scalar_attribute(&self.value_column, items, field)?)
                    };
                    entity
                        .aggregations
                        .push(Aggregation::new(field.clone(), AggregationKind::Array, payload));
                }
                _ => {
                    let mut attribute = scalar_attribute(field, property, field)?;
                    attribute.nullable = !required.contains(&field.as_str());
                    entity.attributes.push(attribute);
                }
            }
        }
        Ok(entity)
    }
}

fn bson_type<'v>(property: &'v Value, field: &str) -> AdapterResult<&'v str> {
    match property.get("bsonType") {
        Some(Value::String(name)) => Ok(name.as_str()),
        Some(Value::Array(_)) => Err(AdapterError::UnsupportedConstruct {
            paradigm: Paradigm::Document,
            construct: format!("union bsonType on '{}'", field),
        }),
        _ => Err(parse_failure(format!("'{}' has no bsonType", field))),
    }
}

fn scalar_attribute(name: &str, property: &Value, field: &str) -> AdapterResult<Attribute> {
    let mut native = NativeType::new(bson_type(property, field)?);
    if let Some(length) = property.get("maxLength").and_then(Value::as_u64) {
        let length = u32::try_from(length).map_err(|_| parse_failure(format!("maxLength of '{}' is too large", field)))?;
        native.params.push(length);
    }
    let data_type = canonical_of(Paradigm::Document, &native)?;
    Ok(Attribute::new(name, data_type))
}

// ============================================================================
// EXPORT
// ============================================================================

impl DocumentAdapter {
    /// `bsonType`, `required` and `properties` of one object level.
    fn export_object(&self, entity: &Entity) -> Map<String, Value> {
        let mut object = Map::new();
        object.insert("bsonType".to_string(), Value::from("object"));

        let required: Vec<Value> = entity
            .attributes
            .iter()
            .filter(|a| !a.nullable)
            .map(|a| Value::from(a.name.clone()))
            .collect();
        if !required.is_empty() {
            object.insert("required".to_string(), Value::Array(required));
        }

        let mut properties = Map::new();
        for attribute in &entity.attributes {
            let property = if entity.reference_from(&attribute.name).is_some() {
                scalar_property(NativeType::new("objectId"))
            } else {
                scalar_property(native_of(Paradigm::Document, attribute.data_type))
            };
            properties.insert(attribute.name.clone(), property);
        }
        for aggregation in &entity.aggregations {
            let property = match aggregation.kind {
                AggregationKind::Embedded => Value::Object(self.export_object(&aggregation.payload)),
                AggregationKind::Array => {
                    let items = if aggregation.is_scalar(&self.value_column) {
                        let value = &aggregation.payload.attributes[0];
                        scalar_property(native_of(Paradigm::Document, value.data_type))
                    } else {
                        Value::Object(self.export_object(&aggregation.payload))
                    };
                    let mut array = Map::new();
                    array.insert("bsonType".to_string(), Value::from("array"));
                    array.insert("items".to_string(), items);
                    Value::Object(array)
                }
            };
            properties.insert(aggregation.name.clone(), property);
        }
        object.insert("properties".to_string(), Value::Object(properties));
        object
    }
}

fn scalar_property(native: NativeType) -> Value {
    let mut property = Map::new();
    property.insert("bsonType".to_string(), Value::from(native.name));
    if let Some(length) = native.params.first() {
        property.insert("maxLength".to_string(), Value::from(*length));
    }
    Value::Object(property)
}

// ============================================================================
// TESTS
// ============================================================================

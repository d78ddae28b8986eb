//! SMEL Test Utilities
//!
//! Shared test infrastructure for the SMEL workspace:
//! - Proptest generators for types, names, snapshots and scripts
//! - Fixtures for the person (document) and shop (relational) schemas
//! - Assertions for snapshot invariants and error kinds

pub use smel_core::{
    AdapterError, Aggregation, AggregationKind, Attribute, AttributePath, AttributeSpec,
    CanonicalType, Entity, ErrorKind, ExecutionError, FlattenClause, FlattenPath, Header, Key,
    KeyGenerator, KeyKind, KeyStrategy, Literal, Migration, Operation, Paradigm, Precision,
    Reference, SchemaDraft, SchemaError, SmelError, Snapshot,
};

/// Anything that carries an [`ErrorKind`].
pub trait HasErrorKind {
    fn error_kind(&self) -> Option<ErrorKind>;
}

impl HasErrorKind for SchemaError {
    fn error_kind(&self) -> Option<ErrorKind> {
        Some(self.kind())
    }
}

impl HasErrorKind for ExecutionError {
    fn error_kind(&self) -> Option<ErrorKind> {
        Some(self.kind())
    }
}

impl HasErrorKind for AdapterError {
    fn error_kind(&self) -> Option<ErrorKind> {
        Some(self.kind())
    }
}

impl HasErrorKind for SmelError {
    fn error_kind(&self) -> Option<ErrorKind> {
        self.kind()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for SMEL models and scripts.
    //!
    //! Generated names always contain an underscore, so they never collide
    //! with a script keyword.

    use super::*;
    use proptest::prelude::*;
    use proptest::sample::Index;

    /// Generate an identifier like `ab3_x`.
    pub fn arb_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,6}_[a-z0-9]{1,4}"
    }

    /// Generate any canonical type, parameters included.
    pub fn arb_canonical_type() -> impl Strategy<Value = CanonicalType> {
        prop_oneof![
            Just(CanonicalType::Integer),
            Just(CanonicalType::Decimal(None)),
            (1u32..38)
                .prop_flat_map(|p| (Just(p), 0..=p))
                .prop_map(|(precision, scale)| CanonicalType::Decimal(Some(Precision {
                    precision,
                    scale
                }))),
            Just(CanonicalType::String(None)),
            (1u32..4000).prop_map(|n| CanonicalType::String(Some(n))),
            Just(CanonicalType::Text),
            Just(CanonicalType::Boolean),
            Just(CanonicalType::Date),
            Just(CanonicalType::Timestamp),
            Just(CanonicalType::Reference),
        ]
    }

    /// Generate a literal the script syntax can express.
    pub fn arb_literal() -> impl Strategy<Value = Literal> {
        prop_oneof![
            "[a-zA-Z0-9 _'\"\\\\-]{0,12}".prop_map(Literal::String),
            any::<i64>().prop_map(Literal::Integer),
            (any::<i32>(), 0u32..1000).prop_map(|(int, frac)| Literal::Decimal(format!("{}.{}", int, frac))),
            any::<bool>().prop_map(Literal::Boolean),
            Just(Literal::Null),
        ]
    }

    pub fn arb_attribute_spec() -> impl Strategy<Value = AttributeSpec> {
        (
            arb_name(),
            arb_canonical_type(),
            any::<bool>(),
            prop::option::of(arb_literal()),
        )
            .prop_map(|(name, data_type, not_null, default)| AttributeSpec {
                name,
                data_type,
                not_null,
                default,
            })
    }

    pub fn arb_attribute_path() -> impl Strategy<Value = AttributePath> {
        (arb_name(), arb_name()).prop_map(|(entity, attribute)| AttributePath { entity, attribute })
    }

    pub fn arb_key_strategy() -> impl Strategy<Value = KeyStrategy> {
        prop_oneof![
            Just(KeyStrategy::Serial),
            "[a-z]{1,4}_?".prop_map(KeyStrategy::Prefixed),
        ]
    }

    pub fn arb_flatten_clause() -> impl Strategy<Value = FlattenClause> {
        prop_oneof![
            (arb_name(), arb_key_strategy())
                .prop_map(|(attribute, strategy)| FlattenClause::GenerateKey { attribute, strategy }),
            (arb_name(), arb_name())
                .prop_map(|(attribute, target)| FlattenClause::AddReference { attribute, target }),
            (arb_name(), arb_name()).prop_map(|(from, to)| FlattenClause::Rename { from, to }),
        ]
    }

    /// Generate a syntactically valid evolution operation.
    pub fn arb_evolution_operation() -> impl Strategy<Value = Operation> {
        prop_oneof![
            (arb_name(), arb_name(), arb_name())
                .prop_map(|(entity, from, to)| Operation::RenameAttribute { entity, from, to }),
            (arb_name(), arb_name()).prop_map(|(from, to)| Operation::RenameEntity { from, to }),
            (arb_name(), arb_attribute_spec())
                .prop_map(|(entity, attribute)| Operation::AddAttribute { entity, attribute }),
            (arb_name(), prop::collection::vec(arb_attribute_spec(), 1..4))
                .prop_map(|(name, attributes)| Operation::AddEntity { name, attributes }),
            arb_attribute_path().prop_map(Operation::DeleteAttribute),
            arb_name().prop_map(|name| Operation::DeleteEntity { name }),
            (arb_name(), prop::collection::vec(arb_name(), 1..4), arb_name()).prop_map(
                |(entity, attributes, into)| Operation::Extract {
                    entity,
                    attributes,
                    into
                }
            ),
            (arb_attribute_path(), arb_attribute_path())
                .prop_map(|(source, target)| Operation::Copy { source, target }),
        ]
    }

    /// Generate a syntactically valid migration operation.
    pub fn arb_migration_operation() -> impl Strategy<Value = Operation> {
        prop_oneof![
            (arb_attribute_path(), arb_key_strategy())
                .prop_map(|(path, strategy)| Operation::GenerateKey { path, strategy }),
            (arb_attribute_path(), arb_name())
                .prop_map(|(path, target)| Operation::AddReference { path, target }),
            arb_attribute_path().prop_map(Operation::DeleteReference),
            (arb_name(), prop::collection::vec(arb_name(), 1..3))
                .prop_map(|(entity, attributes)| Operation::AddPrimaryKey { entity, attributes }),
            (arb_name(), prop::collection::vec(arb_name(), 1..3))
                .prop_map(|(entity, attributes)| Operation::DropPrimaryKey { entity, attributes }),
            (arb_name(), arb_name(), arb_name())
                .prop_map(|(source, target, alias)| Operation::Nest { source, target, alias }),
            (
                arb_name(),
                prop::collection::vec(arb_name(), 1..3),
                any::<bool>(),
                arb_name(),
                prop::collection::vec(arb_flatten_clause(), 0..4),
            )
                .prop_map(|(entity, segments, array, into, clauses)| Operation::Flatten {
                    path: FlattenPath {
                        entity,
                        segments,
                        array,
                    },
                    into,
                    clauses,
                }),
        ]
    }

    pub fn arb_operation() -> impl Strategy<Value = Operation> {
        prop_oneof![arb_evolution_operation(), arb_migration_operation()]
    }

    pub fn arb_paradigm() -> impl Strategy<Value = Paradigm> {
        prop_oneof![
            Just(Paradigm::Relational),
            Just(Paradigm::Document),
            Just(Paradigm::Columnar),
            Just(Paradigm::Graph),
        ]
    }

    fn arb_version() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u32..10, 0u32..10).prop_map(|(major, minor)| format!("{}.{}", major, minor)),
            (1u32..100).prop_map(|n| n.to_string()),
        ]
    }

    /// Generate a complete script AST.
    pub fn arb_migration() -> impl Strategy<Value = Migration> {
        (
            arb_name(),
            arb_version(),
            arb_paradigm(),
            arb_paradigm(),
            arb_name(),
            arb_version(),
            prop::collection::vec(arb_operation(), 0..8),
        )
            .prop_map(
                |(name, version, source, target, schema, schema_version, operations)| Migration {
                    header: Header {
                        name,
                        version,
                        source,
                        target,
                        schema,
                        schema_version,
                    },
                    operations,
                },
            )
    }

    /// Generate a valid relational snapshot.
    ///
    /// Every table has a serial `id` primary key and 1-4 typed columns; some
    /// tables reference an earlier table through a `ref<N>` column.
    pub fn arb_relational_snapshot() -> impl Strategy<Value = Snapshot> {
        prop::collection::btree_set(arb_name(), 1..5)
            .prop_flat_map(|names| {
                let names: Vec<String> = names.into_iter().collect();
                let n = names.len();
                (
                    Just(names),
                    prop::collection::vec(
                        prop::collection::btree_map(arb_name(), arb_canonical_type(), 1..5),
                        n,
                    ),
                    prop::collection::vec(prop::option::of(any::<Index>()), n),
                )
            })
            .prop_map(|(names, columns, links)| {
                let mut draft = SchemaDraft::new("generated", 1, Paradigm::Relational);
                for (i, (name, columns)) in names.iter().zip(columns).enumerate() {
                    let mut entity = Entity::new(name.clone(), Paradigm::Relational)
                        .with_attribute(
                            Attribute::new("id", CanonicalType::Integer)
                                .generated(KeyGenerator::Serial),
                        )
                        .with_key(Key::primary(["id"]));
                    for (column, data_type) in columns {
                        entity = entity.with_attribute(Attribute::new(column, data_type));
                    }
                    if let (true, Some(index)) = (i > 0, links[i]) {
                        let target = index.index(i);
                        let column = format!("ref{}", target);
                        entity = entity
                            .with_attribute(Attribute::new(column.clone(), CanonicalType::Integer))
                            .with_reference(Reference::new(
                                column,
                                names[target].clone(),
                                vec!["id".to_string()],
                            ));
                    }
                    draft.push_entity(entity);
                }
                draft.commit().expect("generated snapshot is valid")
            })
    }

    /// A V1 with embedded and array aggregations, the shop schema or a
    /// generated relational schema.
    pub fn arb_source_snapshot() -> impl Strategy<Value = Snapshot> {
        prop_oneof![
            Just(crate::fixtures::person_document_snapshot()),
            Just(crate::fixtures::shop_relational_snapshot()),
            arb_relational_snapshot(),
        ]
    }

    /// Generate a snapshot plus a mixed script whose names come from it.
    ///
    /// Every operation kind appears: renames, adds and deletes, EXTRACT,
    /// COPY, key and reference changes, NEST and FLATTEN. Names are drawn from
    /// V1, so scripts mix steps that apply with steps that fail part way.
    pub fn arb_snapshot_with_operations() -> impl Strategy<Value = (Snapshot, Vec<Operation>)> {
        arb_source_snapshot()
            .prop_flat_map(|snapshot| {
                let steps = prop::collection::vec(
                    (0u8..14, any::<Index>(), any::<Index>(), any::<Index>(), arb_name()),
                    0..8,
                );
                (Just(snapshot), steps)
            })
            .prop_map(|(snapshot, steps)| {
                let operations = steps
                    .into_iter()
                    .map(|(kind, a, b, c, fresh)| operation_on(&snapshot, kind, a, b, c, fresh))
                    .collect();
                (snapshot, operations)
            })
    }

    fn operation_on(snapshot: &Snapshot, kind: u8, a: Index, b: Index, c: Index, fresh: String) -> Operation {
        let entity = a.get(snapshot.entities());
        let other = c.get(snapshot.entities()).name.clone();
        let attribute = if entity.attributes.is_empty() {
            fresh.clone()
        } else {
            b.get(&entity.attributes).name.clone()
        };
        let name = entity.name.clone();

        match kind {
            0 => Operation::RenameAttribute {
                entity: name,
                from: attribute,
                to: fresh,
            },
            1 => Operation::RenameEntity { from: name, to: fresh },
            2 => Operation::AddAttribute {
                entity: name,
                attribute: AttributeSpec::new(fresh, CanonicalType::Text),
            },
            3 => Operation::DeleteAttribute(AttributePath::new(name, attribute)),
            4 => Operation::DeleteEntity { name: other },
            5 => Operation::Extract {
                entity: name,
                attributes: vec![attribute],
                into: fresh,
            },
            6 => Operation::Copy {
                source: AttributePath::new(name, attribute),
                target: AttributePath::new(other, fresh),
            },
            7 => Operation::GenerateKey {
                path: AttributePath::new(name, fresh),
                strategy: KeyStrategy::Serial,
            },
            8 => Operation::AddReference {
                path: AttributePath::new(name, fresh),
                target: other,
            },
            9 => {
                let from = if entity.references.is_empty() {
                    attribute
                } else {
                    c.get(&entity.references).from_attribute.clone()
                };
                Operation::DeleteReference(AttributePath::new(name, from))
            }
            10 => Operation::AddPrimaryKey {
                entity: name,
                attributes: vec![attribute],
            },
            11 => Operation::DropPrimaryKey {
                attributes: entity
                    .primary_key()
                    .map(|k| k.attributes.clone())
                    .unwrap_or_else(|| vec![attribute]),
                entity: name,
            },
            12 => Operation::Nest {
                source: other,
                target: name,
                alias: fresh,
            },
            _ => flatten_on(entity, &b, &c, fresh),
        }
    }

    /// FLATTEN one of `entity`'s aggregations; some clause lists leave out
    /// the back-reference and fail.
    fn flatten_on(entity: &Entity, b: &Index, c: &Index, into: String) -> Operation {
        let (segment, array) = if entity.aggregations.is_empty() {
            // not an aggregation, so the path fails to resolve
            let attribute = entity.attributes.first().map(|a| a.name.clone());
            (attribute.unwrap_or_else(|| into.clone()), false)
        } else {
            let aggregation = b.get(&entity.aggregations);
            (aggregation.name.clone(), aggregation.kind == AggregationKind::Array)
        };
        let key = FlattenClause::GenerateKey {
            attribute: format!("{}_id", into),
            strategy: KeyStrategy::Serial,
        };
        let back = FlattenClause::AddReference {
            attribute: format!("{}_ref", into),
            target: entity.name.clone(),
        };
        let clauses = match c.index(3) {
            0 => vec![key, back],
            1 => vec![back],
            _ => vec![key],
        };
        Operation::Flatten {
            path: FlattenPath {
                entity: entity.name.clone(),
                segments: vec![segment],
                array,
            },
            into,
            clauses,
        }
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for the recurring schemas.

    use super::*;

    /// MongoDB `$jsonSchema` for the person collection, in canonical export
    /// form.
    pub const PERSON_JSON_SCHEMA: &str = r##"{
  "$schema": "http://json-schema.org/draft-07/schema#",
  "title": "person",
  "bsonType": "object",
  "required": [
    "_id",
    "name"
  ],
  "properties": {
    "_id": {
      "bsonType": "objectId"
    },
    "name": {
      "bsonType": "string"
    },
    "address": {
      "bsonType": "object",
      "properties": {
        "street": {
          "bsonType": "string"
        },
        "city": {
          "bsonType": "string"
        }
      }
    },
    "tags": {
      "bsonType": "array",
      "items": {
        "bsonType": "string"
      }
    },
    "knows": {
      "bsonType": "array",
      "items": {
        "bsonType": "objectId"
      }
    }
  }
}
"##;

    /// Document → relational migration of the person collection.
    pub const PERSON_SCRIPT: &str = r#"-- person collection to normalized tables
MIGRATION person_d2r:1.0
FROM DOCUMENT TO RELATIONAL
USING person_schema:1

FLATTEN person.address AS address
    GENERATE KEY id AS SERIAL
    ADD REFERENCE person_id TO person;

FLATTEN person.tags[] AS person_tag
    GENERATE KEY id AS SERIAL
    RENAME value TO tag_value
    ADD REFERENCE person_id TO person;

FLATTEN person.knows[] AS person_knows
    ADD REFERENCE person_id TO person
    ADD REFERENCE knows_person_id TO person;

RENAME _id TO id IN person;
"#;

    /// PostgreSQL DDL of the shop schema, in canonical export form.
    pub const SHOP_DDL: &str = "CREATE TABLE customer (
    id SERIAL PRIMARY KEY,
    name VARCHAR(80) NOT NULL,
    email VARCHAR(255)
);

CREATE TABLE orders (
    id SERIAL PRIMARY KEY,
    customer_id INTEGER NOT NULL REFERENCES customer(id),
    placed_at TIMESTAMP DEFAULT now(),
    total DECIMAL(10,2) DEFAULT 0
);

CREATE TABLE order_line (
    order_id INTEGER NOT NULL REFERENCES orders(id),
    line_no INTEGER NOT NULL,
    sku VARCHAR(40) NOT NULL,
    quantity INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (order_id, line_no)
);
";

    /// The person collection as a document snapshot.
    pub fn person_document_snapshot() -> Snapshot {
        let address = Entity::new("address", Paradigm::Document)
            .with_attribute(Attribute::new("street", CanonicalType::String(None)))
            .with_attribute(Attribute::new("city", CanonicalType::String(None)));
        let tags = Entity::new("tags", Paradigm::Document)
            .with_attribute(Attribute::new("value", CanonicalType::String(None)));
        let knows = Entity::new("knows", Paradigm::Document)
            .with_attribute(Attribute::new("value", CanonicalType::Reference));

        let person = Entity::new("person", Paradigm::Document)
            .with_attribute(Attribute::new("_id", CanonicalType::Reference).not_null())
            .with_attribute(Attribute::new("name", CanonicalType::String(None)).not_null())
            .with_key(Key::primary(["_id"]))
            .with_aggregation(Aggregation::new("address", AggregationKind::Embedded, address))
            .with_aggregation(Aggregation::new("tags", AggregationKind::Array, tags))
            .with_aggregation(Aggregation::new("knows", AggregationKind::Array, knows));

        let mut draft = SchemaDraft::new("person_schema", 1, Paradigm::Document);
        draft.push_entity(person);
        draft.commit().expect("person fixture is valid")
    }

    /// The shop schema as a relational snapshot (same content as [`SHOP_DDL`]).
    pub fn shop_relational_snapshot() -> Snapshot {
        let customer = Entity::new("customer", Paradigm::Relational)
            .with_attribute(Attribute::new("id", CanonicalType::Integer).generated(KeyGenerator::Serial))
            .with_attribute(Attribute::new("name", CanonicalType::String(Some(80))).not_null())
            .with_attribute(Attribute::new("email", CanonicalType::String(Some(255))))
            .with_key(Key::primary(["id"]));

        let orders = Entity::new("orders", Paradigm::Relational)
            .with_attribute(Attribute::new("id", CanonicalType::Integer).generated(KeyGenerator::Serial))
            .with_attribute(Attribute::new("customer_id", CanonicalType::Integer).not_null())
            .with_attribute(
                Attribute::new("placed_at", CanonicalType::Timestamp)
                    .with_default(Literal::Expression("now()".to_string())),
            )
            .with_attribute(
                Attribute::new(
                    "total",
                    CanonicalType::Decimal(Some(Precision {
                        precision: 10,
                        scale: 2,
                    })),
                )
                .with_default(Literal::Integer(0)),
            )
            .with_key(Key::primary(["id"]))
            .with_reference(Reference::new("customer_id", "customer", vec!["id".to_string()]));

        let order_line = Entity::new("order_line", Paradigm::Relational)
            .with_attribute(Attribute::new("order_id", CanonicalType::Integer).not_null())
            .with_attribute(Attribute::new("line_no", CanonicalType::Integer).not_null())
            .with_attribute(Attribute::new("sku", CanonicalType::String(Some(40))).not_null())
            .with_attribute(
                Attribute::new("quantity", CanonicalType::Integer)
                    .not_null()
                    .with_default(Literal::Integer(1)),
            )
            .with_key(Key::primary(["order_id", "line_no"]))
            .with_reference(Reference::new("order_id", "orders", vec!["id".to_string()]));

        let mut draft = SchemaDraft::new("shop", 1, Paradigm::Relational);
        draft.push_entity(customer);
        draft.push_entity(orders);
        draft.push_entity(order_line);
        draft.commit().expect("shop fixture is valid")
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for SMEL-specific validation.

    use super::*;

    /// Assert that a snapshot satisfies every structural invariant.
    #[track_caller]
    pub fn assert_invariants(snapshot: &Snapshot) {
        if let Err(e) = snapshot.to_draft().validate() {
            panic!("Snapshot {} v{} violates an invariant: {}", snapshot.name(), snapshot.version(), e);
        }
    }

    /// Assert that a result failed with the given kind.
    #[track_caller]
    pub fn assert_error_kind<T, E>(result: &Result<T, E>, expected: ErrorKind)
    where
        T: std::fmt::Debug,
        E: HasErrorKind + std::fmt::Debug,
    {
        match result {
            Err(e) => assert_eq!(
                e.error_kind(),
                Some(expected),
                "Expected {} error, got: {:?}",
                expected,
                e
            ),
            Ok(value) => panic!("Expected {} error, got Ok: {:?}", expected, value),
        }
    }

    /// Assert the ordered attribute names of an entity.
    #[track_caller]
    pub fn assert_attribute_names(snapshot: &Snapshot, entity: &str, expected: &[&str]) {
        let found = snapshot
            .entity(entity)
            .unwrap_or_else(|| panic!("Entity {} missing; have {:?}", entity, snapshot.entity_names()));
        assert_eq!(found.attribute_names(), expected, "Attributes of {}", entity);
    }

    /// Assert the ordered primary key attributes of an entity.
    #[track_caller]
    pub fn assert_primary_key(snapshot: &Snapshot, entity: &str, expected: &[&str]) {
        let found = snapshot
            .entity(entity)
            .unwrap_or_else(|| panic!("Entity {} missing; have {:?}", entity, snapshot.entity_names()));
        let key = found
            .primary_key()
            .unwrap_or_else(|| panic!("Entity {} has no primary key", entity));
        let attributes: Vec<&str> = key.attributes.iter().map(String::as_str).collect();
        assert_eq!(attributes, expected, "Primary key of {}", entity);
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Unified meta-schema model
//!
//! A [`Snapshot`] is an immutable, versioned set of entities. The only way to
//! change one is to take a [`SchemaDraft`], edit it, and `commit` it back; the
//! commit re-validates every structural invariant, so a `Snapshot` in hand is
//! always well-formed.

use crate::error::{SchemaError, SchemaResult};
use crate::types::CanonicalType;
use crate::Paradigm;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

// ============================================================================
// LITERALS
// ============================================================================

/// Default value of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Literal {
    String(String),
    Integer(i64),
    /// Kept as text so the value survives without float rounding.
    Decimal(String),
    Boolean(bool),
    Null,
    /// Native expression carried through from an imported artifact (`now()`).
    Expression(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Decimal(d) => f.write_str(d),
            Literal::Boolean(true) => f.write_str("TRUE"),
            Literal::Boolean(false) => f.write_str("FALSE"),
            Literal::Null => f.write_str("NULL"),
            Literal::Expression(e) => f.write_str(e),
        }
    }
}

// ============================================================================
// ATTRIBUTES
// ============================================================================

/// How the values of a generated key attribute are produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyGenerator {
    /// Auto-increment integer; the target adapter picks the native form.
    Serial,
    /// `prefix` followed by a per-entity counter zero-padded to `width` digits.
    Prefixed {
        prefix: String,
        width: usize,
        /// First counter value reserved for this key.
        first: u64,
    },
}

impl KeyGenerator {
    /// Render the value for counter `n`; `None` for serial keys.
    pub fn render(&self, n: u64) -> Option<String> {
        match self {
            KeyGenerator::Serial => None,
            KeyGenerator::Prefixed { prefix, width, .. } => {
                Some(format!("{}{:0width$}", prefix, n, width = *width))
            }
        }
    }

    /// The first value this generator hands out.
    pub fn first_value(&self) -> Option<String> {
        match self {
            KeyGenerator::Serial => None,
            KeyGenerator::Prefixed { first, .. } => self.render(*first),
        }
    }
}

/// A typed field of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub data_type: CanonicalType,
    pub nullable: bool,
    pub default: Option<Literal>,
    pub generator: Option<KeyGenerator>,
}

impl Attribute {
    /// A nullable attribute without default.
    pub fn new(name: impl Into<String>, data_type: CanonicalType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            default: None,
            generator: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: Literal) -> Self {
        self.default = Some(default);
        self
    }

    pub fn generated(mut self, generator: KeyGenerator) -> Self {
        self.generator = Some(generator);
        self.nullable = false;
        self
    }

    pub fn is_serial(&self) -> bool {
        matches!(self.generator, Some(KeyGenerator::Serial))
    }
}

// ============================================================================
// KEYS & REFERENCES
// ============================================================================

/// Role of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    Primary,
    Partition,
    Clustering,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Primary => f.write_str("PRIMARY KEY"),
            KeyKind::Partition => f.write_str("PARTITION KEY"),
            KeyKind::Clustering => f.write_str("CLUSTERING KEY"),
        }
    }
}

/// An ordered list of attributes playing a key role. Order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub kind: KeyKind,
    pub attributes: Vec<String>,
}

impl Key {
    pub fn new(kind: KeyKind, attributes: Vec<String>) -> Self {
        Self { kind, attributes }
    }

    pub fn primary<S: Into<String>>(attributes: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            KeyKind::Primary,
            attributes.into_iter().map(Into::into).collect(),
        )
    }

    pub fn covers(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute)
    }
}

/// An outgoing foreign-key-like link of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub from_attribute: String,
    pub to_entity: String,
    /// Target attributes, resolved to the target's primary key on creation.
    pub to_key: Vec<String>,
}

impl Reference {
    pub fn new(
        from_attribute: impl Into<String>,
        to_entity: impl Into<String>,
        to_key: Vec<String>,
    ) -> Self {
        Self {
            from_attribute: from_attribute.into(),
            to_entity: to_entity.into(),
            to_key,
        }
    }
}

// ============================================================================
// AGGREGATIONS
// ============================================================================

/// Shape of a nested structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationKind {
    /// A single nested object (document sub-object, frozen UDT).
    Embedded,
    /// A repeated structure (array of objects or of scalars).
    Array,
}

/// A nested sub-structure carried inline by its owning entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    /// Field name on the owner.
    pub name: String,
    pub kind: AggregationKind,
    /// Entity-shaped payload; its name is the nested type name.
    pub payload: Entity,
}

impl Aggregation {
    pub fn new(name: impl Into<String>, kind: AggregationKind, payload: Entity) -> Self {
        Self {
            name: name.into(),
            kind,
            payload,
        }
    }

    /// An array of scalars: exactly one attribute named `value_column` and
    /// nothing else.
    pub fn is_scalar(&self, value_column: &str) -> bool {
        self.kind == AggregationKind::Array
            && self.payload.attributes.len() == 1
            && self.payload.attributes[0].name == value_column
            && self.payload.aggregations.is_empty()
            && self.payload.references.is_empty()
    }
}

// ============================================================================
// ENTITIES
// ============================================================================

/// A table, collection, columnar table or node label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: Paradigm,
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub keys: Vec<Key>,
    pub references: Vec<Reference>,
    pub aggregations: Vec<Aggregation>,
}

impl Entity {
    pub fn new(name: impl Into<String>, kind: Paradigm) -> Self {
        Self {
            kind,
            name: name.into(),
            attributes: Vec::new(),
            keys: Vec::new(),
            references: Vec::new(),
            aggregations: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_key(mut self, key: Key) -> Self {
        self.keys.push(key);
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregations.push(aggregation);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attributes.iter_mut().find(|a| a.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Look up an attribute, failing with `UnknownAttribute`.
    pub fn require_attribute(&self, name: &str) -> SchemaResult<&Attribute> {
        self.attribute(name)
            .ok_or_else(|| SchemaError::unknown_attribute(&self.name, name))
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn primary_key(&self) -> Option<&Key> {
        self.keys.iter().find(|k| k.kind == KeyKind::Primary)
    }

    pub fn key(&self, kind: KeyKind) -> Option<&Key> {
        self.keys.iter().find(|k| k.kind == kind)
    }

    pub fn aggregation(&self, name: &str) -> Option<&Aggregation> {
        self.aggregations.iter().find(|a| a.name == name)
    }

    pub fn aggregation_mut(&mut self, name: &str) -> Option<&mut Aggregation> {
        self.aggregations.iter_mut().find(|a| a.name == name)
    }

    /// The outgoing reference carried by `attribute`, if any.
    pub fn reference_from(&self, attribute: &str) -> Option<&Reference> {
        self.references.iter().find(|r| r.from_attribute == attribute)
    }

    /// Whether `name` is taken by an attribute or an aggregation.
    pub fn has_member(&self, name: &str) -> bool {
        self.has_attribute(name) || self.aggregation(name).is_some()
    }

    /// Visit this entity's references and those of every nested payload.
    pub fn visit_references<'a>(&'a self, path: &str, visit: &mut dyn FnMut(&str, &'a Reference)) {
        for reference in &self.references {
            visit(path, reference);
        }
        for aggregation in &self.aggregations {
            let nested = format!("{}.{}", path, aggregation.name);
            aggregation.payload.visit_references(&nested, visit);
        }
    }

    /// Mutable counterpart of [`Entity::visit_references`].
    pub fn visit_references_mut(&mut self, visit: &mut dyn FnMut(&mut Reference)) {
        for reference in &mut self.references {
            visit(reference);
        }
        for aggregation in &mut self.aggregations {
            aggregation.payload.visit_references_mut(visit);
        }
    }

    fn validate(&self, path: &str, entities: &[Entity]) -> SchemaResult<()> {
        let mut seen = HashSet::new();
        for attribute in &self.attributes {
            if !seen.insert(attribute.name.as_str()) {
                return Err(SchemaError::name_conflict(path, &attribute.name));
            }
        }
        for aggregation in &self.aggregations {
            if !seen.insert(aggregation.name.as_str()) {
                return Err(SchemaError::name_conflict(path, &aggregation.name));
            }
        }

        let mut primary_keys = 0;
        for key in &self.keys {
            if key.kind == KeyKind::Primary {
                primary_keys += 1;
            }
            if key.attributes.is_empty() {
                return Err(SchemaError::InvalidClause {
                    clause: key.kind.to_string(),
                    reason: format!("key on '{}' covers no attributes", path),
                });
            }
            for attribute in &key.attributes {
                if !self.has_attribute(attribute) {
                    return Err(SchemaError::unknown_attribute(path, attribute));
                }
            }
        }
        if primary_keys > 1 {
            return Err(SchemaError::name_conflict(path, "PRIMARY KEY"));
        }

        for reference in &self.references {
            if !self.has_attribute(&reference.from_attribute) {
                return Err(SchemaError::unknown_attribute(path, &reference.from_attribute));
            }
            let target = entities
                .iter()
                .find(|e| e.name == reference.to_entity)
                .ok_or_else(|| SchemaError::unknown_entity(&reference.to_entity))?;
            if reference.to_key.is_empty() {
                return Err(SchemaError::NoPrimaryKey {
                    entity: target.name.clone(),
                });
            }
            for attribute in &reference.to_key {
                if !target.has_attribute(attribute) {
                    return Err(SchemaError::unknown_attribute(&target.name, attribute));
                }
            }
        }

        for aggregation in &self.aggregations {
            let nested = format!("{}.{}", path, aggregation.name);
            aggregation.payload.validate(&nested, entities)?;
        }

        Ok(())
    }
}

// ============================================================================
// SNAPSHOTS
// ============================================================================

/// One versioned, immutable instance of the unified meta-schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    name: String,
    version: u32,
    paradigm: Paradigm,
    entities: Vec<Entity>,
}

impl Snapshot {
    /// A snapshot with no entities.
    pub fn empty(name: impl Into<String>, version: u32, paradigm: Paradigm) -> Self {
        Self {
            name: name.into(),
            version,
            paradigm,
            entities: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn paradigm(&self) -> Paradigm {
        self.paradigm
    }

    /// Entities in insertion order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// A mutable copy to build the next snapshot from.
    pub fn to_draft(&self) -> SchemaDraft {
        SchemaDraft {
            name: self.name.clone(),
            version: self.version,
            paradigm: self.paradigm,
            entities: self.entities.clone(),
        }
    }

    /// Hex SHA-256 of the canonical rendering, stable across runs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Mutable working copy of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDraft {
    pub name: String,
    pub version: u32,
    pub paradigm: Paradigm,
    pub entities: Vec<Entity>,
}

impl SchemaDraft {
    pub fn new(name: impl Into<String>, version: u32, paradigm: Paradigm) -> Self {
        Self {
            name: name.into(),
            version,
            paradigm,
            entities: Vec::new(),
        }
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entity(name).is_some()
    }

    /// Look up an entity, failing with `UnknownEntity`.
    pub fn lookup(&self, name: &str) -> SchemaResult<&Entity> {
        self.entity(name)
            .ok_or_else(|| SchemaError::unknown_entity(name))
    }

    /// Mutable lookup, failing with `UnknownEntity`.
    pub fn lookup_mut(&mut self, name: &str) -> SchemaResult<&mut Entity> {
        self.entities
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| SchemaError::unknown_entity(name))
    }

    pub fn push_entity(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    /// Remove an entity by name, returning it.
    pub fn remove_entity(&mut self, name: &str) -> SchemaResult<Entity> {
        let index = self
            .entities
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| SchemaError::unknown_entity(name))?;
        Ok(self.entities.remove(index))
    }

    /// Every reference in the schema that points at `target`, with the
    /// dotted path of the entity or payload that owns it.
    pub fn references_to(&self, target: &str) -> Vec<(String, Reference)> {
        let mut found = Vec::new();
        for entity in &self.entities {
            entity.visit_references(&entity.name, &mut |path, reference| {
                if reference.to_entity == target {
                    found.push((path.to_string(), reference.clone()));
                }
            });
        }
        found
    }

    /// Apply `visit` to every reference in the schema, payloads included.
    pub fn visit_references_mut(&mut self, visit: &mut dyn FnMut(&mut Reference)) {
        for entity in &mut self.entities {
            entity.visit_references_mut(visit);
        }
    }

    /// Check every structural invariant.
    pub fn validate(&self) -> SchemaResult<()> {
        let mut names = HashSet::new();
        for entity in &self.entities {
            if !names.insert(entity.name.as_str()) {
                return Err(SchemaError::name_conflict(&self.name, &entity.name));
            }
        }
        for entity in &self.entities {
            entity.validate(&entity.name, &self.entities)?;
        }
        Ok(())
    }

    /// Validate and freeze into a [`Snapshot`].
    pub fn commit(self) -> SchemaResult<Snapshot> {
        self.validate()?;
        Ok(Snapshot {
            name: self.name,
            version: self.version,
            paradigm: self.paradigm,
            entities: self.entities,
        })
    }
}

// ============================================================================
// RENDERING
// ============================================================================

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "schema {} v{} ({})", self.name, self.version, self.paradigm)?;
        for entity in &self.entities {
            write_entity(f, entity, 1)?;
        }
        Ok(())
    }
}

fn write_entity(f: &mut fmt::Formatter<'_>, entity: &Entity, depth: usize) -> fmt::Result {
    let pad = "  ".repeat(depth);
    writeln!(f, "{}entity {} [{}]", pad, entity.name, entity.kind)?;
    for attribute in &entity.attributes {
        write!(f, "{}  {} {}", pad, attribute.name, attribute.data_type)?;
        if !attribute.nullable {
            f.write_str(" NOT NULL")?;
        }
        if let Some(default) = &attribute.default {
            write!(f, " DEFAULT {}", default)?;
        }
        match &attribute.generator {
            Some(KeyGenerator::Serial) => f.write_str(" GENERATED SERIAL")?,
            Some(KeyGenerator::Prefixed { prefix, width, first }) => {
                write!(f, " GENERATED PREFIX '{}' WIDTH {} FROM {}", prefix, width, first)?
            }
            None => {}
        }
        writeln!(f)?;
    }
    for key in &entity.keys {
        writeln!(f, "{}  {} ({})", pad, key.kind, key.attributes.join(", "))?;
    }
    for reference in &entity.references {
        writeln!(
            f,
            "{}  REFERENCE {} -> {}({})",
            pad,
            reference.from_attribute,
            reference.to_entity,
            reference.to_key.join(", ")
        )?;
    }
    for aggregation in &entity.aggregations {
        let kind = match aggregation.kind {
            AggregationKind::Embedded => "EMBEDDED",
            AggregationKind::Array => "ARRAY",
        };
        writeln!(f, "{}  {} {}", pad, kind, aggregation.name)?;
        write_entity(f, &aggregation.payload, depth + 2)?;
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

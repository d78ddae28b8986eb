//! FLATTEN: turn a nested aggregation into a top-level entity.
//!
//! Which shape the new entity takes depends only on two things: whether the
//! path carries the `[]` array marker and whether a `GENERATE KEY` clause is
//! present. [`classify_flatten`] makes that decision and rejects clause lists
//! that do not fit the chosen shape before anything is touched.

use super::{migration::key_attribute, reference_key, Context};
use smel_core::{
    Aggregation, AggregationKind, Attribute, Entity, FlattenClause, FlattenPath, Key, KeyKind,
    Reference, SchemaError, SchemaResult,
};
use std::fmt;

/// The four shapes a FLATTEN can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlattenScenario {
    /// Embedded object with a generated primary key.
    EmbeddedObject,
    /// Embedded object without a key, linked only by references.
    EmbeddedKeyless,
    /// Array of values (or objects) with a generated primary key.
    ValueArray,
    /// Array flattened into a many-to-many join keyed by its references.
    ReferenceArray,
}

impl fmt::Display for FlattenScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlattenScenario::EmbeddedObject => "embedded object",
            FlattenScenario::EmbeddedKeyless => "embedded object (keyless)",
            FlattenScenario::ValueArray => "value array",
            FlattenScenario::ReferenceArray => "reference array",
        };
        f.write_str(name)
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Pick the FLATTEN scenario for `path` over an aggregation of `kind`.
pub fn classify_flatten(
    path: &FlattenPath,
    kind: AggregationKind,
    clauses: &[FlattenClause],
) -> SchemaResult<FlattenScenario> {
    let generated = clauses
        .iter()
        .filter(|c| matches!(c, FlattenClause::GenerateKey { .. }))
        .count();
    let references = clauses
        .iter()
        .filter(|c| matches!(c, FlattenClause::AddReference { .. }))
        .count();
    let renames = clauses.len() - generated - references;

    if generated > 1 {
        return Err(SchemaError::InvalidClause {
            clause: "GENERATE KEY".to_string(),
            reason: format!("FLATTEN {} generates more than one key", path),
        });
    }
    match (path.array, kind) {
        (true, AggregationKind::Embedded) => {
            return Err(SchemaError::InvalidClause {
                clause: "FLATTEN".to_string(),
                reason: format!("'{}' is an embedded object and takes no [] marker", path),
            })
        }
        (false, AggregationKind::Array) => {
            return Err(SchemaError::InvalidClause {
                clause: "FLATTEN".to_string(),
                reason: format!("'{}' is an array and needs the [] marker", path),
            })
        }
        _ => {}
    }

    let scenario = match (path.array, generated == 1) {
        (false, true) => FlattenScenario::EmbeddedObject,
        (false, false) if references > 0 => FlattenScenario::EmbeddedKeyless,
        (false, false) => {
            return Err(SchemaError::AmbiguousFlattenScenario {
                path: path.to_string(),
                reason: "neither GENERATE KEY nor ADD REFERENCE given".to_string(),
            })
        }
        (true, true) => FlattenScenario::ValueArray,
        (true, false) => FlattenScenario::ReferenceArray,
    };

    if renames > 0 && scenario != FlattenScenario::ValueArray {
        return Err(SchemaError::InvalidClause {
            clause: "RENAME".to_string(),
            reason: format!("only a value array can rename its value column, '{}' is a {}", path, scenario),
        });
    }
    if references == 0 {
        return Err(SchemaError::InvalidClause {
            clause: "ADD REFERENCE".to_string(),
            reason: format!("FLATTEN {} is a {} and needs at least one ADD REFERENCE", path, scenario),
        });
    }

    Ok(scenario)
}

// ============================================================================
// APPLICATION
// ============================================================================

/// `FLATTEN path AS into [clauses]`
pub fn flatten(
    ctx: &mut Context<'_>,
    path: &FlattenPath,
    into: &str,
    clauses: &[FlattenClause],
) -> SchemaResult<()> {
    let aggregation = resolve(ctx, path)?.clone();
    if ctx.draft.contains(into) {
        return Err(SchemaError::name_conflict(&ctx.draft.name, into));
    }
    let scenario = classify_flatten(path, aggregation.kind, clauses)?;
    let owner_kind = ctx.draft.lookup(&path.entity)?.kind;
    let value_column = ctx.config.value_column.clone();
    let scalar = aggregation.is_scalar(&value_column);

    let mut payload = aggregation.payload;
    for clause in clauses {
        if let FlattenClause::Rename { from, to } = clause {
            if *from != value_column || !payload.has_attribute(from) {
                return Err(SchemaError::InvalidClause {
                    clause: "RENAME".to_string(),
                    reason: format!("'{}' is not the value column of '{}'", from, path),
                });
            }
            rename_payload_attribute(&mut payload, from, to);
        }
    }
    if scenario == FlattenScenario::ReferenceArray && scalar {
        payload.attributes.retain(|a| a.name != value_column);
    }

    let mut entity = Entity::new(into, owner_kind);

    let mut generated_key = None;
    for clause in clauses {
        if let FlattenClause::GenerateKey { attribute, strategy } = clause {
            if payload.has_member(attribute) {
                return Err(SchemaError::name_conflict(into, attribute));
            }
            let key = key_attribute(ctx, into, attribute, strategy);
            generated_key = Some((key.name.clone(), key.data_type));
            entity.attributes.push(key);
            entity.keys.push(Key::primary([attribute.as_str()]));
        }
    }

    entity.attributes.extend(payload.attributes.iter().cloned());
    for key in &payload.keys {
        let carried = match key.kind {
            KeyKind::Primary => scenario == FlattenScenario::EmbeddedKeyless,
            KeyKind::Partition | KeyKind::Clustering => true,
        };
        if carried && key.attributes.iter().all(|a| entity.has_attribute(a)) {
            entity.keys.push(key.clone());
        }
    }
    entity.references = payload
        .references
        .iter()
        .filter(|r| entity.has_attribute(&r.from_attribute))
        .cloned()
        .collect();
    entity.aggregations = payload.aggregations;

    let mut reference_attributes = Vec::new();
    for clause in clauses {
        if let FlattenClause::AddReference { attribute, target } = clause {
            if entity.has_member(attribute) {
                return Err(SchemaError::name_conflict(into, attribute));
            }
            let (key, data_type) = if target == into {
                generated_key.clone().ok_or_else(|| SchemaError::NoPrimaryKey {
                    entity: into.to_string(),
                })?
            } else {
                reference_key(ctx.draft.lookup(target)?, "ADD REFERENCE")?
            };
            entity
                .attributes
                .push(Attribute::new(attribute, data_type).not_null());
            entity
                .references
                .push(Reference::new(attribute, target, vec![key]));
            reference_attributes.push(attribute.clone());
        }
    }
    if scenario == FlattenScenario::ReferenceArray {
        entity.keys.insert(0, Key::new(KeyKind::Primary, reference_attributes));
    }

    let owner = resolve_owner_mut(ctx, path)?;
    owner.aggregations.retain(|a| a.name != aggregation.name);
    ctx.draft.push_entity(entity);
    Ok(())
}

/// Walk `path` down to the aggregation it names.
fn resolve<'d>(ctx: &'d Context<'_>, path: &FlattenPath) -> SchemaResult<&'d Aggregation> {
    let mut current = ctx.draft.lookup(&path.entity)?;
    let mut walked = path.entity.clone();
    let mut found = None;
    for segment in &path.segments {
        let aggregation = current
            .aggregation(segment)
            .ok_or_else(|| SchemaError::unknown_attribute(&walked, segment))?;
        walked = format!("{}.{}", walked, segment);
        current = &aggregation.payload;
        found = Some(aggregation);
    }
    found.ok_or_else(|| SchemaError::InvalidClause {
        clause: "FLATTEN".to_string(),
        reason: format!("'{}' names no nested structure", path),
    })
}

/// The entity or payload that directly owns the aggregation `path` names.
fn resolve_owner_mut<'d>(ctx: &'d mut Context<'_>, path: &FlattenPath) -> SchemaResult<&'d mut Entity> {
    let mut current = ctx.draft.lookup_mut(&path.entity)?;
    let parents = path.segments.len().saturating_sub(1);
    for segment in &path.segments[..parents] {
        let entity_name = current.name.clone();
        current = &mut current
            .aggregation_mut(segment)
            .ok_or_else(|| SchemaError::unknown_attribute(&entity_name, segment))?
            .payload;
    }
    Ok(current)
}

fn rename_payload_attribute(payload: &mut Entity, from: &str, to: &str) {
    if let Some(attribute) = payload.attribute_mut(from) {
        attribute.name = to.to_string();
    }
    for key in &mut payload.keys {
        for name in &mut key.attributes {
            if name == from {
                *name = to.to_string();
            }
        }
    }
    for reference in &mut payload.references {
        if reference.from_attribute == from {
            reference.from_attribute = to.to_string();
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use smel_core::{CanonicalType, ErrorKind, KeyStrategy, SmelConfig};
    use smel_test_utils::fixtures::person_document_snapshot;

    fn person(config: &SmelConfig) -> Context<'_> {
        Context::new(person_document_snapshot().to_draft(), config)
    }

    fn path(segments: &[&str], array: bool) -> FlattenPath {
        FlattenPath {
            entity: "person".to_string(),
            segments: segments.iter().map(|s| s.to_string()).collect(),
            array,
        }
    }

    fn serial(name: &str) -> FlattenClause {
        FlattenClause::GenerateKey {
            attribute: name.to_string(),
            strategy: KeyStrategy::Serial,
        }
    }

    fn reference(name: &str, target: &str) -> FlattenClause {
        FlattenClause::AddReference {
            attribute: name.to_string(),
            target: target.to_string(),
        }
    }

    #[test]
    fn test_classify_person_paths() {
        let address = classify_flatten(
            &path(&["address"], false),
            AggregationKind::Embedded,
            &[serial("id"), reference("person_id", "person")],
        )
        .unwrap();
        assert_eq!(address, FlattenScenario::EmbeddedObject);

        let tags = classify_flatten(
            &path(&["tags"], true),
            AggregationKind::Array,
            &[serial("id"), reference("person_id", "person")],
        )
        .unwrap();
        assert_eq!(tags, FlattenScenario::ValueArray);

        let knows = classify_flatten(
            &path(&["knows"], true),
            AggregationKind::Array,
            &[reference("person_id", "person"), reference("knows_person_id", "person")],
        )
        .unwrap();
        assert_eq!(knows, FlattenScenario::ReferenceArray);

        let keyless = classify_flatten(
            &path(&["address"], false),
            AggregationKind::Embedded,
            &[reference("person_id", "person")],
        )
        .unwrap();
        assert_eq!(keyless, FlattenScenario::EmbeddedKeyless);
    }

    #[test]
    fn test_classify_rejects_bad_clause_lists() {
        let err = classify_flatten(&path(&["address"], false), AggregationKind::Embedded, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousFlattenScenario);

        let err = classify_flatten(&path(&["address"], true), AggregationKind::Embedded, &[serial("id")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidClause);

        let err = classify_flatten(&path(&["tags"], false), AggregationKind::Array, &[serial("id")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidClause);

        let err = classify_flatten(
            &path(&["tags"], true),
            AggregationKind::Array,
            &[serial("id"), serial("id2"), reference("p", "person")],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidClause);

        let rename = FlattenClause::Rename {
            from: "value".to_string(),
            to: "v".to_string(),
        };
        let err = classify_flatten(
            &path(&["knows"], true),
            AggregationKind::Array,
            &[reference("p", "person"), rename],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidClause);

        let err = classify_flatten(&path(&["tags"], true), AggregationKind::Array, &[serial("id")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidClause);
    }

    #[test]
    fn test_reference_array_without_references_is_invalid() {
        let err = classify_flatten(&path(&["knows"], true), AggregationKind::Array, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidClause);
        assert!(err.to_string().contains("ADD REFERENCE"));

        // only the unmarked, keyless, reference-free form is ambiguous
        let err = classify_flatten(&path(&["address"], false), AggregationKind::Embedded, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousFlattenScenario);
    }

    #[test]
    fn test_flatten_embedded_object() {
        let config = SmelConfig::default();
        let mut ctx = person(&config);
        flatten(
            &mut ctx,
            &path(&["address"], false),
            "address",
            &[serial("id"), reference("person_id", "person")],
        )
        .unwrap();

        let address = ctx.draft.entity("address").unwrap();
        assert_eq!(address.attribute_names(), vec!["id", "street", "city", "person_id"]);
        assert_eq!(address.primary_key().unwrap().attributes, vec!["id"]);
        let back = address.reference_from("person_id").unwrap();
        assert_eq!(back.to_entity, "person");
        assert_eq!(back.to_key, vec!["_id"]);
        assert!(!address.attribute("person_id").unwrap().nullable);
        assert_eq!(address.attribute("person_id").unwrap().data_type, CanonicalType::Reference);

        assert!(ctx.draft.entity("person").unwrap().aggregation("address").is_none());
        ctx.draft.validate().unwrap();
    }

    #[test]
    fn test_flatten_value_array_renames_value_column() {
        let config = SmelConfig::default();
        let mut ctx = person(&config);
        let clauses = [
            serial("id"),
            FlattenClause::Rename {
                from: "value".to_string(),
                to: "tag_value".to_string(),
            },
            reference("person_id", "person"),
        ];
        flatten(&mut ctx, &path(&["tags"], true), "person_tag", &clauses).unwrap();

        let tags = ctx.draft.entity("person_tag").unwrap();
        assert_eq!(tags.attribute_names(), vec!["id", "tag_value", "person_id"]);
        ctx.draft.validate().unwrap();
    }

    #[test]
    fn test_flatten_value_array_rename_must_name_value_column() {
        let config = SmelConfig::default();
        let mut ctx = person(&config);
        let clauses = [
            serial("id"),
            FlattenClause::Rename {
                from: "label".to_string(),
                to: "tag_value".to_string(),
            },
            reference("person_id", "person"),
        ];
        let err = flatten(&mut ctx, &path(&["tags"], true), "person_tag", &clauses).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidClause);
    }

    #[test]
    fn test_flatten_reference_array_builds_join() {
        let config = SmelConfig::default();
        let mut ctx = person(&config);
        flatten(
            &mut ctx,
            &path(&["knows"], true),
            "person_knows",
            &[reference("person_id", "person"), reference("knows_person_id", "person")],
        )
        .unwrap();

        let knows = ctx.draft.entity("person_knows").unwrap();
        assert_eq!(knows.attribute_names(), vec!["person_id", "knows_person_id"]);
        assert_eq!(
            knows.primary_key().unwrap().attributes,
            vec!["person_id", "knows_person_id"]
        );
        assert_eq!(knows.references.len(), 2);
        ctx.draft.validate().unwrap();
    }

    #[test]
    fn test_flatten_self_reference_uses_pending_key() {
        let config = SmelConfig::default();
        let mut ctx = person(&config);
        flatten(
            &mut ctx,
            &path(&["address"], false),
            "address",
            &[
                serial("id"),
                reference("person_id", "person"),
                reference("previous_id", "address"),
            ],
        )
        .unwrap();

        let address = ctx.draft.entity("address").unwrap();
        let previous = address.reference_from("previous_id").unwrap();
        assert_eq!(previous.to_entity, "address");
        assert_eq!(previous.to_key, vec!["id"]);
        assert_eq!(address.attribute("previous_id").unwrap().data_type, CanonicalType::Integer);
        ctx.draft.validate().unwrap();
    }

    #[test]
    fn test_flatten_unknown_path_and_taken_name() {
        let config = SmelConfig::default();
        let mut ctx = person(&config);
        let err = flatten(
            &mut ctx,
            &path(&["nope"], false),
            "x",
            &[serial("id"), reference("person_id", "person")],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownAttribute);

        let err = flatten(
            &mut ctx,
            &path(&["address"], false),
            "person",
            &[serial("id"), reference("person_id", "person")],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NameConflict);
    }
}

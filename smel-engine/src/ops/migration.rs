//! Migration operations: keys, references and nesting.

use super::{ensure_free_member, foreign_key_attribute, owner_root, reference_key, Context};
use smel_core::{
    Aggregation, AggregationKind, Attribute, CanonicalType, Key, KeyGenerator, KeyKind,
    KeyStrategy, Reference, SchemaError, SchemaResult,
};
use std::collections::HashSet;

/// Build a generated key attribute for `entity`, reserving a counter value
/// for prefixed strategies.
pub(crate) fn key_attribute(
    ctx: &mut Context<'_>,
    entity: &str,
    name: &str,
    strategy: &KeyStrategy,
) -> Attribute {
    match strategy {
        KeyStrategy::Serial => Attribute::new(name, CanonicalType::Integer).generated(KeyGenerator::Serial),
        KeyStrategy::Prefixed(prefix) => {
            let first = ctx.keys.reserve(entity);
            Attribute::new(name, CanonicalType::String(None)).generated(KeyGenerator::Prefixed {
                prefix: prefix.clone(),
                width: ctx.config.key_prefix_width,
                first,
            })
        }
    }
}

// ============================================================================
// KEYS
// ============================================================================

/// `GENERATE KEY entity.name AS strategy`
pub fn generate_key(
    ctx: &mut Context<'_>,
    entity: &str,
    name: &str,
    strategy: &KeyStrategy,
) -> SchemaResult<()> {
    let target = ctx.draft.lookup(entity)?;
    ensure_free_member(target, name)?;
    if target.primary_key().is_some() {
        return Err(SchemaError::name_conflict(entity, "PRIMARY KEY"));
    }

    let attribute = key_attribute(ctx, entity, name, strategy);
    let target = ctx.draft.lookup_mut(entity)?;
    target.attributes.insert(0, attribute);
    target.keys.insert(0, Key::primary([name]));
    Ok(())
}

/// `ADD PRIMARY KEY (cols) TO entity`
pub fn add_primary_key(ctx: &mut Context<'_>, entity: &str, attributes: &[String]) -> SchemaResult<()> {
    let target = ctx.draft.lookup_mut(entity)?;
    let mut seen = HashSet::new();
    for name in attributes {
        target.require_attribute(name)?;
        if !seen.insert(name.as_str()) {
            return Err(SchemaError::InvalidClause {
                clause: "ADD PRIMARY KEY".to_string(),
                reason: format!("'{}' is listed twice", name),
            });
        }
    }
    if attributes.is_empty() {
        return Err(SchemaError::InvalidClause {
            clause: "ADD PRIMARY KEY".to_string(),
            reason: "no attributes given".to_string(),
        });
    }
    if target.primary_key().is_some() {
        return Err(SchemaError::name_conflict(entity, "PRIMARY KEY"));
    }

    for attribute in &mut target.attributes {
        if seen.contains(attribute.name.as_str()) {
            attribute.nullable = false;
        }
    }
    target.keys.push(Key::new(KeyKind::Primary, attributes.to_vec()));
    Ok(())
}

/// `DROP PRIMARY KEY (cols) FROM entity`
pub fn drop_primary_key(ctx: &mut Context<'_>, entity: &str, attributes: &[String]) -> SchemaResult<()> {
    let target = ctx.draft.lookup(entity)?;
    let key = target.primary_key().ok_or_else(|| SchemaError::NoPrimaryKey {
        entity: entity.to_string(),
    })?;
    if key.attributes != attributes {
        return Err(SchemaError::InvalidClause {
            clause: "DROP PRIMARY KEY".to_string(),
            reason: format!(
                "primary key of '{}' is ({}), not ({})",
                entity,
                key.attributes.join(", "),
                attributes.join(", ")
            ),
        });
    }
    if let Some((path, _)) = ctx
        .draft
        .references_to(entity)
        .into_iter()
        .find(|(_, r)| r.to_key == attributes)
    {
        return Err(SchemaError::ReferentialConflict {
            entity: entity.to_string(),
            detail: format!("primary key is referenced from '{}'", path),
        });
    }

    let target = ctx.draft.lookup_mut(entity)?;
    target.keys.retain(|k| k.kind != KeyKind::Primary);
    Ok(())
}

// ============================================================================
// REFERENCES
// ============================================================================

/// `ADD REFERENCE entity.name TO target`
pub fn add_reference(ctx: &mut Context<'_>, entity: &str, name: &str, target: &str) -> SchemaResult<()> {
    let (key, data_type) = reference_key(ctx.draft.lookup(target)?, "ADD REFERENCE")?;

    let owner = ctx.draft.lookup_mut(entity)?;
    if owner.aggregation(name).is_some() || owner.reference_from(name).is_some() {
        return Err(SchemaError::name_conflict(entity, name));
    }
    match owner.attribute(name) {
        Some(existing) if existing.data_type != data_type => {
            return Err(SchemaError::InvalidClause {
                clause: "ADD REFERENCE".to_string(),
                reason: format!(
                    "{}.{} is {} but {}.{} is {}",
                    entity, name, existing.data_type, target, key, data_type
                ),
            });
        }
        Some(_) => {}
        None => owner.attributes.push(foreign_key_attribute(name, data_type)),
    }
    owner.references.push(Reference::new(name, target, vec![key]));
    Ok(())
}

/// `DELETE REFERENCE entity.name`; the local attribute stays.
pub fn delete_reference(ctx: &mut Context<'_>, entity: &str, name: &str) -> SchemaResult<()> {
    let owner = ctx.draft.lookup_mut(entity)?;
    let index = owner
        .references
        .iter()
        .position(|r| r.from_attribute == name)
        .ok_or_else(|| SchemaError::unknown_attribute(entity, name))?;
    owner.references.remove(index);
    Ok(())
}

// ============================================================================
// NEST
// ============================================================================

enum Link {
    /// `target.attr → source`: each target row points at one source row.
    Inbound(Reference),
    /// `source.attr → target` where `attr` is the whole key of `source`.
    Outbound(Reference),
}

/// `NEST source INTO target AS alias`
pub fn nest(ctx: &mut Context<'_>, source: &str, target: &str, alias: &str) -> SchemaResult<()> {
    if source == target {
        return Err(SchemaError::InvalidClause {
            clause: "NEST".to_string(),
            reason: format!("cannot nest '{}' into itself", source),
        });
    }
    let nested = ctx.draft.lookup(source)?;
    let owner = ctx.draft.lookup(target)?;
    ensure_free_member(owner, alias)?;

    let link = if let Some(reference) = owner.references.iter().find(|r| r.to_entity == source) {
        Link::Inbound(reference.clone())
    } else if let Some(reference) = nested.references.iter().find(|r| r.to_entity == target) {
        let whole_key = nested
            .primary_key()
            .map(|k| k.attributes == [reference.from_attribute.clone()])
            .unwrap_or(false);
        if !whole_key {
            return Err(SchemaError::AmbiguousCardinality {
                nested: source.to_string(),
                owner: target.to_string(),
                reason: format!(
                    "'{}.{}' is not the whole primary key of '{}', so one '{}' may own many",
                    source, reference.from_attribute, source, target
                ),
            });
        }
        Link::Outbound(reference.clone())
    } else {
        return Err(SchemaError::AmbiguousCardinality {
            nested: source.to_string(),
            owner: target.to_string(),
            reason: "no reference links the two entities".to_string(),
        });
    };

    let inbound_attribute = match &link {
        Link::Inbound(reference) => Some(reference.from_attribute.as_str()),
        Link::Outbound(_) => None,
    };
    if let Some((path, _)) = ctx.draft.references_to(source).into_iter().find(|(path, r)| {
        !(path == target && Some(r.from_attribute.as_str()) == inbound_attribute)
    }) {
        return Err(SchemaError::ReferentialConflict {
            entity: source.to_string(),
            detail: format!("'{}' still references it", owner_root(&path)),
        });
    }

    let mut payload = ctx.draft.remove_entity(source)?;
    let owner = ctx.draft.lookup_mut(target)?;
    payload.kind = owner.kind;

    match link {
        Link::Inbound(reference) => {
            let attribute = reference.from_attribute;
            owner.references.retain(|r| r.from_attribute != attribute);
            if !owner.keys.iter().any(|k| k.covers(&attribute)) {
                owner.attributes.retain(|a| a.name != attribute);
            }
        }
        Link::Outbound(reference) => {
            let attribute = reference.from_attribute;
            payload.references.retain(|r| r.from_attribute != attribute);
            payload.keys.retain(|k| !k.covers(&attribute));
            payload.attributes.retain(|a| a.name != attribute);
        }
    }

    owner
        .aggregations
        .push(Aggregation::new(alias, AggregationKind::Embedded, payload));
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

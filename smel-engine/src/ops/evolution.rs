//! Evolution operations: structural edits within one paradigm.

use super::{ensure_free_member, owner_root, Context};
use smel_core::{
    Attribute, AttributePath, AttributeSpec, CanonicalType, Entity, Key, KeyGenerator, Reference,
    SchemaError, SchemaResult,
};
use std::collections::HashSet;

pub(crate) fn attribute_from_spec(spec: &AttributeSpec) -> Attribute {
    let mut attribute = Attribute::new(&spec.name, spec.data_type);
    if spec.not_null {
        attribute = attribute.not_null();
    }
    if let Some(default) = &spec.default {
        attribute = attribute.with_default(default.clone());
    }
    attribute
}

// ============================================================================
// RENAME
// ============================================================================

/// `RENAME from TO to IN entity`. Also renames an aggregation of that name.
pub fn rename_attribute(ctx: &mut Context<'_>, entity: &str, from: &str, to: &str) -> SchemaResult<()> {
    let target = ctx.draft.lookup_mut(entity)?;
    if !target.has_member(from) {
        return Err(SchemaError::unknown_attribute(entity, from));
    }
    ensure_free_member(target, to)?;

    if let Some(aggregation) = target.aggregation_mut(from) {
        aggregation.name = to.to_string();
        return Ok(());
    }

    if let Some(attribute) = target.attribute_mut(from) {
        attribute.name = to.to_string();
    }
    for key in &mut target.keys {
        for name in &mut key.attributes {
            if name == from {
                *name = to.to_string();
            }
        }
    }
    for reference in &mut target.references {
        if reference.from_attribute == from {
            reference.from_attribute = to.to_string();
        }
    }

    ctx.draft.visit_references_mut(&mut |reference| {
        if reference.to_entity == entity {
            for name in &mut reference.to_key {
                if name == from {
                    *name = to.to_string();
                }
            }
        }
    });
    Ok(())
}

/// `RENAME ENTITY from TO to`
pub fn rename_entity(ctx: &mut Context<'_>, from: &str, to: &str) -> SchemaResult<()> {
    ctx.draft.lookup(from)?;
    if ctx.draft.contains(to) {
        return Err(SchemaError::name_conflict(&ctx.draft.name, to));
    }

    ctx.draft.lookup_mut(from)?.name = to.to_string();
    ctx.draft.visit_references_mut(&mut |reference| {
        if reference.to_entity == from {
            reference.to_entity = to.to_string();
        }
    });
    ctx.keys.rename(from, to);
    Ok(())
}

// ============================================================================
// ADD
// ============================================================================

/// `ADD ATTRIBUTE entity.name WITH TYPE ...`
pub fn add_attribute(ctx: &mut Context<'_>, entity: &str, spec: &AttributeSpec) -> SchemaResult<()> {
    let target = ctx.draft.lookup_mut(entity)?;
    ensure_free_member(target, &spec.name)?;
    target.attributes.push(attribute_from_spec(spec));
    Ok(())
}

/// `ADD ENTITY name WITH ATTRIBUTES (...)`; the entity takes the schema's paradigm.
pub fn add_entity(ctx: &mut Context<'_>, name: &str, attributes: &[AttributeSpec]) -> SchemaResult<()> {
    if ctx.draft.contains(name) {
        return Err(SchemaError::name_conflict(&ctx.draft.name, name));
    }

    let mut entity = Entity::new(name, ctx.draft.paradigm);
    for spec in attributes {
        ensure_free_member(&entity, &spec.name)?;
        entity.attributes.push(attribute_from_spec(spec));
    }
    ctx.draft.push_entity(entity);
    Ok(())
}

// ============================================================================
// DELETE
// ============================================================================

/// `DELETE ATTRIBUTE entity.attribute`
///
/// Outgoing references carried by the attribute go with it; anything that
/// still depends on it (a key, an incoming reference) blocks the delete.
pub fn delete_attribute(ctx: &mut Context<'_>, entity: &str, attribute: &str) -> SchemaResult<()> {
    let owner = ctx.draft.lookup(entity)?;

    if owner.aggregation(attribute).is_some() {
        let owner = ctx.draft.lookup_mut(entity)?;
        owner.aggregations.retain(|a| a.name != attribute);
        return Ok(());
    }

    owner.require_attribute(attribute)?;
    if let Some(key) = owner.keys.iter().find(|k| k.covers(attribute)) {
        return Err(SchemaError::ReferentialConflict {
            entity: entity.to_string(),
            detail: format!("'{}' is part of the {}", attribute, key.kind),
        });
    }
    if let Some((path, _)) = ctx
        .draft
        .references_to(entity)
        .into_iter()
        .find(|(_, r)| r.to_key.iter().any(|k| k == attribute))
    {
        return Err(SchemaError::ReferentialConflict {
            entity: entity.to_string(),
            detail: format!("'{}' is referenced from '{}'", attribute, path),
        });
    }

    let owner = ctx.draft.lookup_mut(entity)?;
    owner.attributes.retain(|a| a.name != attribute);
    owner.references.retain(|r| r.from_attribute != attribute);
    Ok(())
}

/// `DELETE ENTITY name`. Never cascades.
pub fn delete_entity(ctx: &mut Context<'_>, name: &str) -> SchemaResult<()> {
    ctx.draft.lookup(name)?;
    if let Some((path, _)) = ctx
        .draft
        .references_to(name)
        .into_iter()
        .find(|(path, _)| owner_root(path) != name)
    {
        return Err(SchemaError::ReferentialConflict {
            entity: name.to_string(),
            detail: format!("still referenced from '{}'", path),
        });
    }
    ctx.draft.remove_entity(name)?;
    Ok(())
}

// ============================================================================
// EXTRACT / COPY
// ============================================================================

/// `EXTRACT (a, b) FROM entity INTO into`
pub fn extract(ctx: &mut Context<'_>, entity: &str, attributes: &[String], into: &str) -> SchemaResult<()> {
    let source = ctx.draft.lookup(entity)?;

    let mut seen = HashSet::new();
    for name in attributes {
        if !seen.insert(name.as_str()) {
            return Err(SchemaError::InvalidClause {
                clause: "EXTRACT".to_string(),
                reason: format!("'{}' is listed twice", name),
            });
        }
        source.require_attribute(name)?;
        if let Some(key) = source.keys.iter().find(|k| k.covers(name)) {
            return Err(SchemaError::ReferentialConflict {
                entity: entity.to_string(),
                detail: format!("'{}' is part of the {}", name, key.kind),
            });
        }
    }
    if let Some((path, _)) = ctx
        .draft
        .references_to(entity)
        .into_iter()
        .find(|(_, r)| r.to_key.iter().any(|k| seen.contains(k.as_str())))
    {
        return Err(SchemaError::ReferentialConflict {
            entity: entity.to_string(),
            detail: format!("extracted attributes are referenced from '{}'", path),
        });
    }
    if ctx.draft.contains(into) {
        return Err(SchemaError::name_conflict(&ctx.draft.name, into));
    }
    let link = format!("{}_id", into);
    ensure_free_member(source, &link)?;

    let key_name = if seen.contains(ctx.config.default_key_name.as_str()) {
        link.clone()
    } else {
        ctx.config.default_key_name.clone()
    };
    if seen.contains(key_name.as_str()) {
        return Err(SchemaError::name_conflict(into, &key_name));
    }

    let mut extracted = Entity::new(into, source.kind)
        .with_attribute(Attribute::new(&key_name, CanonicalType::Integer).generated(KeyGenerator::Serial))
        .with_key(Key::primary([key_name.as_str()]));
    for name in attributes {
        extracted.attributes.push(source.require_attribute(name)?.clone());
    }
    extracted.references = source
        .references
        .iter()
        .filter(|r| seen.contains(r.from_attribute.as_str()))
        .cloned()
        .collect();

    let source = ctx.draft.lookup_mut(entity)?;
    source.attributes.retain(|a| !seen.contains(a.name.as_str()));
    source.references.retain(|r| !seen.contains(r.from_attribute.as_str()));
    source.attributes.push(Attribute::new(&link, CanonicalType::Integer));
    source.references.push(Reference::new(&link, into, vec![key_name]));

    ctx.draft.push_entity(extracted);
    Ok(())
}

/// `COPY source.attr TO target.attr`: type, nullability and default travel,
/// the generator does not.
pub fn copy(ctx: &mut Context<'_>, source: &AttributePath, target: &AttributePath) -> SchemaResult<()> {
    let mut attribute = ctx
        .draft
        .lookup(&source.entity)?
        .require_attribute(&source.attribute)?
        .clone();
    attribute.name = target.attribute.clone();
    attribute.generator = None;

    let owner = ctx.draft.lookup_mut(&target.entity)?;
    ensure_free_member(owner, &target.attribute)?;
    owner.attributes.push(attribute);
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use smel_core::{ErrorKind, KeyKind, Literal, Paradigm, SchemaDraft, SmelConfig};
    use smel_test_utils::fixtures::shop_relational_snapshot;

    fn shop(config: &SmelConfig) -> Context<'_> {
        Context::new(shop_relational_snapshot().to_draft(), config)
    }

    #[test]
    fn test_rename_attribute_updates_incoming_references() {
        let config = SmelConfig::default();
        let mut ctx = shop(&config);
        rename_attribute(&mut ctx, "customer", "id", "customer_no").unwrap();

        let customer = ctx.draft.entity("customer").unwrap();
        assert_eq!(customer.attribute_names(), vec!["customer_no", "name", "email"]);
        assert_eq!(customer.primary_key().unwrap().attributes, vec!["customer_no"]);

        let orders = ctx.draft.entity("orders").unwrap();
        assert_eq!(orders.reference_from("customer_id").unwrap().to_key, vec!["customer_no"]);
        ctx.draft.validate().unwrap();
    }

    #[test]
    fn test_rename_attribute_rejects_taken_name() {
        let config = SmelConfig::default();
        let mut ctx = shop(&config);
        let err = rename_attribute(&mut ctx, "customer", "name", "email").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NameConflict);

        let err = rename_attribute(&mut ctx, "customer", "nope", "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownAttribute);
    }

    #[test]
    fn test_rename_entity_updates_targets() {
        let config = SmelConfig::default();
        let mut ctx = shop(&config);
        rename_entity(&mut ctx, "orders", "purchase").unwrap();

        let line = ctx.draft.entity("order_line").unwrap();
        assert_eq!(line.reference_from("order_id").unwrap().to_entity, "purchase");
        assert!(!ctx.draft.contains("orders"));

        let err = rename_entity(&mut ctx, "purchase", "customer").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NameConflict);
    }

    #[test]
    fn test_add_attribute_and_entity() {
        let config = SmelConfig::default();
        let mut ctx = shop(&config);
        let mut spec = AttributeSpec::new("vip", CanonicalType::Boolean);
        spec.not_null = true;
        spec.default = Some(Literal::Boolean(false));
        add_attribute(&mut ctx, "customer", &spec).unwrap();

        let vip = ctx.draft.entity("customer").unwrap().attribute("vip").unwrap();
        assert!(!vip.nullable);
        assert_eq!(vip.default, Some(Literal::Boolean(false)));

        let err = add_attribute(&mut ctx, "customer", &spec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NameConflict);

        add_entity(&mut ctx, "coupon", &[AttributeSpec::new("code", CanonicalType::Text)]).unwrap();
        assert_eq!(ctx.draft.entity("coupon").unwrap().kind, Paradigm::Relational);

        let twice = [
            AttributeSpec::new("a", CanonicalType::Text),
            AttributeSpec::new("a", CanonicalType::Integer),
        ];
        let err = add_entity(&mut ctx, "dup", &twice).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NameConflict);
    }

    #[test]
    fn test_delete_attribute_guards_dependents() {
        let config = SmelConfig::default();
        let mut ctx = shop(&config);

        let err = delete_attribute(&mut ctx, "customer", "id").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferentialConflict);

        delete_attribute(&mut ctx, "orders", "customer_id").unwrap();
        let orders = ctx.draft.entity("orders").unwrap();
        assert!(orders.reference_from("customer_id").is_none());
        assert!(!orders.has_attribute("customer_id"));
    }

    #[test]
    fn test_delete_entity_blocks_on_incoming_reference() {
        let config = SmelConfig::default();
        let mut ctx = shop(&config);
        let err = delete_entity(&mut ctx, "customer").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferentialConflict);

        delete_entity(&mut ctx, "order_line").unwrap();
        assert!(!ctx.draft.contains("order_line"));
    }

    #[test]
    fn test_delete_entity_ignores_self_reference() {
        let config = SmelConfig::default();
        let mut draft = SchemaDraft::new("s", 1, Paradigm::Relational);
        draft.push_entity(
            Entity::new("employee", Paradigm::Relational)
                .with_attribute(Attribute::new("id", CanonicalType::Integer).not_null())
                .with_attribute(Attribute::new("manager_id", CanonicalType::Integer))
                .with_key(Key::primary(["id"]))
                .with_reference(Reference::new("manager_id", "employee", vec!["id".to_string()])),
        );
        let mut ctx = Context::new(draft, &config);
        delete_entity(&mut ctx, "employee").unwrap();
        assert!(ctx.draft.entities.is_empty());
    }

    #[test]
    fn test_extract_moves_attributes_behind_generated_key() {
        let config = SmelConfig::default();
        let mut ctx = shop(&config);
        extract(&mut ctx, "customer", &["email".to_string()], "contact").unwrap();

        let contact = ctx.draft.entity("contact").unwrap();
        assert_eq!(contact.attribute_names(), vec!["id", "email"]);
        assert!(contact.attribute("id").unwrap().is_serial());
        assert_eq!(contact.key(KeyKind::Primary).unwrap().attributes, vec!["id"]);

        let customer = ctx.draft.entity("customer").unwrap();
        assert_eq!(customer.attribute_names(), vec!["id", "name", "contact_id"]);
        let link = customer.reference_from("contact_id").unwrap();
        assert_eq!(link.to_entity, "contact");
        assert_eq!(link.to_key, vec!["id"]);
        ctx.draft.validate().unwrap();
    }

    #[test]
    fn test_extract_key_name_falls_back_on_collision() {
        let config = SmelConfig::default();
        let mut draft = SchemaDraft::new("s", 1, Paradigm::Relational);
        draft.push_entity(
            Entity::new("event", Paradigm::Relational)
                .with_attribute(Attribute::new("code", CanonicalType::Text))
                .with_attribute(Attribute::new("id", CanonicalType::Text)),
        );
        let mut ctx = Context::new(draft, &config);
        extract(&mut ctx, "event", &["id".to_string()], "origin").unwrap();

        let origin = ctx.draft.entity("origin").unwrap();
        assert_eq!(origin.attribute_names(), vec!["origin_id", "id"]);
        assert_eq!(origin.primary_key().unwrap().attributes, vec!["origin_id"]);
    }

    #[test]
    fn test_extract_rejects_key_attribute_and_existing_target() {
        let config = SmelConfig::default();
        let mut ctx = shop(&config);
        let err = extract(&mut ctx, "customer", &["id".to_string()], "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferentialConflict);

        let err = extract(&mut ctx, "customer", &["email".to_string()], "orders").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NameConflict);

        let twice = ["email".to_string(), "email".to_string()];
        let err = extract(&mut ctx, "customer", &twice, "contact").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidClause);
    }

    #[test]
    fn test_copy_strips_generator() {
        let config = SmelConfig::default();
        let mut ctx = shop(&config);
        copy(
            &mut ctx,
            &AttributePath::new("customer", "id"),
            &AttributePath::new("orders", "legacy_customer"),
        )
        .unwrap();

        let copied = ctx.draft.entity("orders").unwrap().attribute("legacy_customer").unwrap();
        assert_eq!(copied.data_type, CanonicalType::Integer);
        assert!(copied.generator.is_none());
        assert!(!copied.nullable);

        let err = copy(
            &mut ctx,
            &AttributePath::new("customer", "name"),
            &AttributePath::new("orders", "total"),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NameConflict);
    }
}

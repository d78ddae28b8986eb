//! Operation semantics
//!
//! Every operation is a function from a working [`Context`] to
//! `SchemaResult<()>`. Operations may leave the draft half-edited when they
//! fail; the executor discards the working copy in that case.

pub mod evolution;
pub mod flatten;
pub mod migration;

use crate::keys::KeySequencer;
use smel_core::{
    Attribute, CanonicalType, Entity, Operation, SchemaDraft, SchemaError, SchemaResult,
    SmelConfig,
};

/// Mutable state threaded through one batch.
#[derive(Debug, Clone)]
pub struct Context<'c> {
    pub draft: SchemaDraft,
    pub keys: KeySequencer,
    pub config: &'c SmelConfig,
}

impl<'c> Context<'c> {
    pub fn new(draft: SchemaDraft, config: &'c SmelConfig) -> Self {
        let keys = KeySequencer::seeded(&draft);
        Self {
            draft,
            keys,
            config,
        }
    }
}

/// Apply one operation to the working context.
pub fn apply(ctx: &mut Context<'_>, operation: &Operation) -> SchemaResult<()> {
    match operation {
        Operation::RenameAttribute { entity, from, to } => {
            evolution::rename_attribute(ctx, entity, from, to)
        }
        Operation::RenameEntity { from, to } => evolution::rename_entity(ctx, from, to),
        Operation::AddAttribute { entity, attribute } => {
            evolution::add_attribute(ctx, entity, attribute)
        }
        Operation::AddEntity { name, attributes } => evolution::add_entity(ctx, name, attributes),
        Operation::DeleteAttribute(path) => evolution::delete_attribute(ctx, &path.entity, &path.attribute),
        Operation::DeleteEntity { name } => evolution::delete_entity(ctx, name),
        Operation::Extract {
            entity,
            attributes,
            into,
        } => evolution::extract(ctx, entity, attributes, into),
        Operation::Copy { source, target } => evolution::copy(ctx, source, target),
        Operation::GenerateKey { path, strategy } => {
            migration::generate_key(ctx, &path.entity, &path.attribute, strategy)
        }
        Operation::AddReference { path, target } => {
            migration::add_reference(ctx, &path.entity, &path.attribute, target)
        }
        Operation::DeleteReference(path) => {
            migration::delete_reference(ctx, &path.entity, &path.attribute)
        }
        Operation::AddPrimaryKey { entity, attributes } => {
            migration::add_primary_key(ctx, entity, attributes)
        }
        Operation::DropPrimaryKey { entity, attributes } => {
            migration::drop_primary_key(ctx, entity, attributes)
        }
        Operation::Nest {
            source,
            target,
            alias,
        } => migration::nest(ctx, source, target, alias),
        Operation::Flatten {
            path,
            into,
            clauses,
        } => flatten::flatten(ctx, path, into, clauses),
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Type a local attribute must have to reference `target`'s primary key.
///
/// Fails with `NoPrimaryKey` when the target has none and `InvalidClause`
/// when the key is composite, since one attribute cannot cover it.
pub(crate) fn reference_key(target: &Entity, clause: &str) -> SchemaResult<(String, CanonicalType)> {
    let key = target.primary_key().ok_or_else(|| SchemaError::NoPrimaryKey {
        entity: target.name.clone(),
    })?;
    match key.attributes.as_slice() {
        [single] => {
            let attribute = target.require_attribute(single)?;
            Ok((single.clone(), attribute.data_type))
        }
        _ => Err(SchemaError::InvalidClause {
            clause: clause.to_string(),
            reason: format!(
                "primary key of '{}' is composite ({}); a single attribute cannot reference it",
                target.name,
                key.attributes.join(", ")
            ),
        }),
    }
}

/// A plain copy of `attribute` under a new name: same type, no default and
/// no generator.
pub(crate) fn foreign_key_attribute(name: &str, data_type: CanonicalType) -> Attribute {
    Attribute::new(name, data_type)
}

/// Root entity name of a dotted owner path (`person.address` → `person`).
pub(crate) fn owner_root(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

/// Fail with `NameConflict` when `name` is already taken on `entity`.
pub(crate) fn ensure_free_member(entity: &Entity, name: &str) -> SchemaResult<()> {
    if entity.has_member(name) {
        return Err(SchemaError::name_conflict(&entity.name, name));
    }
    Ok(())
}

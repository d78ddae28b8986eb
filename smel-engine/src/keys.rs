//! Per-entity counters for prefixed generated keys

use smel_core::{KeyGenerator, SchemaDraft};
use std::collections::HashMap;

/// Hands out counter values for `GENERATE KEY ... AS STRING PREFIX`.
///
/// One sequencer lives for one executor run. Values start at 1 per entity
/// and only ever grow, so the rendered first values of repeated invocations
/// on the same entity are strictly increasing.
#[derive(Debug, Clone, Default)]
pub struct KeySequencer {
    next: HashMap<String, u64>,
}

impl KeySequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue after every prefixed generator already recorded in `draft`.
    pub fn seeded(draft: &SchemaDraft) -> Self {
        let mut sequencer = Self::new();
        for entity in &draft.entities {
            for attribute in &entity.attributes {
                if let Some(KeyGenerator::Prefixed { first, .. }) = &attribute.generator {
                    let next = sequencer.next.entry(entity.name.clone()).or_insert(1);
                    *next = (*next).max(first.saturating_add(1));
                }
            }
        }
        sequencer
    }

    /// Reserve the next counter value for `entity`.
    pub fn reserve(&mut self, entity: &str) -> u64 {
        let next = self.next.entry(entity.to_string()).or_insert(1);
        let value = *next;
        *next += 1;
        value
    }

    /// The value the next `reserve` for `entity` would return.
    pub fn peek(&self, entity: &str) -> u64 {
        self.next.get(entity).copied().unwrap_or(1)
    }

    /// Carry an entity's counter over to its new name.
    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(next) = self.next.remove(from) {
            self.next.insert(to.to_string(), next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smel_core::{Attribute, CanonicalType, Entity, Paradigm};

    #[test]
    fn test_reserve_starts_at_one_and_increases() {
        let mut keys = KeySequencer::new();
        assert_eq!(keys.reserve("customer"), 1);
        assert_eq!(keys.reserve("customer"), 2);
        assert_eq!(keys.reserve("order"), 1);
        assert_eq!(keys.peek("customer"), 3);
    }

    #[test]
    fn test_seeded_continues_after_existing_generators() {
        let mut draft = SchemaDraft::new("s", 1, Paradigm::Relational);
        draft.push_entity(Entity::new("customer", Paradigm::Relational).with_attribute(
            Attribute::new("code", CanonicalType::String(None)).generated(KeyGenerator::Prefixed {
                prefix: "c".to_string(),
                width: 6,
                first: 4,
            }),
        ));
        let mut keys = KeySequencer::seeded(&draft);
        assert_eq!(keys.reserve("customer"), 5);
    }

    #[test]
    fn test_rename_moves_counter() {
        let mut keys = KeySequencer::new();
        keys.reserve("a");
        keys.rename("a", "b");
        assert_eq!(keys.reserve("b"), 2);
        assert_eq!(keys.reserve("a"), 1);
    }
}

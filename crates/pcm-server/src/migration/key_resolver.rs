//! Business key to generated id mapping for one migration run

use super::error::MigrationError;
use super::types::EntityType;
use std::collections::HashMap;
use uuid::Uuid;

/// Maps `(entity type, business key)` to the id assigned on insert.
///
/// Entries are only ever added. Registering a key twice is an error.
#[derive(Debug, Default)]
pub struct KeyMap {
    entries: HashMap<(EntityType, String), Uuid>,
}

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        entity: EntityType,
        business_key: impl Into<String>,
        id: Uuid,
    ) -> Result<(), MigrationError> {
        let business_key = business_key.into();
        if self.entries.contains_key(&(entity, business_key.clone())) {
            return Err(MigrationError::DuplicateBusinessKey {
                entity,
                key: business_key,
            });
        }
        self.entries.insert((entity, business_key), id);
        Ok(())
    }

    pub fn lookup(&self, entity: EntityType, business_key: &str) -> Option<Uuid> {
        self.entries
            .get(&(entity, business_key.to_string()))
            .copied()
    }

    pub fn contains(&self, entity: EntityType, business_key: &str) -> bool {
        self.lookup(entity, business_key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut keys = KeyMap::new();
        let id = Uuid::new_v4();
        keys.register(EntityType::Program, "P1", id).unwrap();

        assert_eq!(keys.lookup(EntityType::Program, "P1"), Some(id));
        assert_eq!(keys.lookup(EntityType::Chapter, "P1"), None);
        assert_eq!(keys.lookup(EntityType::Program, "P2"), None);
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn test_second_registration_is_rejected() {
        let mut keys = KeyMap::new();
        let first = Uuid::new_v4();
        keys.register(EntityType::Chapter, "C1", first).unwrap();

        let err = keys
            .register(EntityType::Chapter, "C1", Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(
            err,
            MigrationError::DuplicateBusinessKey { entity: EntityType::Chapter, ref key } if key == "C1"
        ));
        assert_eq!(keys.lookup(EntityType::Chapter, "C1"), Some(first));
    }

    #[test]
    fn test_same_key_for_different_entities() {
        let mut keys = KeyMap::new();
        keys.register(EntityType::Program, "X", Uuid::new_v4()).unwrap();
        keys.register(EntityType::Chapter, "X", Uuid::new_v4()).unwrap();
        assert_eq!(keys.len(), 2);
    }
}

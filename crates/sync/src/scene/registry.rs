use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::error::SceneError;
use crate::host::{EntityHandle, HostError};

use super::entity::{EntityKind, SceneEntity};

/// Name-keyed map of every entity the engine has seen. Entries are created on
/// first reference and live until the process ends.
#[derive(Debug, Default)]
pub struct SceneRegistry {
    entities: HashMap<String, SceneEntity>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &str) -> Option<&SceneEntity> {
        self.entities.get(name)
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut SceneEntity> {
        self.entities.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Returns the entity named `name`, creating it with the handle produced
    /// by `create` if it does not exist yet. `create` only runs for a new
    /// entity. The flag is true when the entity was created.
    pub fn create_or_get<F>(
        &mut self,
        name: &str,
        kind: EntityKind,
        create: F,
    ) -> Result<(&mut SceneEntity, bool), SceneError>
    where
        F: FnOnce() -> Result<EntityHandle, HostError>,
    {
        match self.entities.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                let entity = entry.into_mut();
                if entity.kind != kind {
                    return Err(SceneError::KindMismatch {
                        name: name.to_string(),
                        expected: kind,
                        found: entity.kind,
                    });
                }
                Ok((entity, false))
            }
            Entry::Vacant(entry) => {
                let handle = create()?;
                log::debug!("registered {} '{}' as {}", kind, name, handle);
                Ok((entry.insert(SceneEntity::new(name, kind, handle)), true))
            }
        }
    }

    pub fn require(&self, name: &str) -> Result<&SceneEntity, SceneError> {
        self.entities
            .get(name)
            .ok_or_else(|| SceneError::UnknownEntity {
                name: name.to_string(),
            })
    }

    /// Like [`require`](Self::require) but also checks the entity kind.
    pub fn require_kind_mut(
        &mut self,
        name: &str,
        kind: EntityKind,
    ) -> Result<&mut SceneEntity, SceneError> {
        let entity = self
            .entities
            .get_mut(name)
            .ok_or_else(|| SceneError::UnknownEntity {
                name: name.to_string(),
            })?;
        if entity.kind != kind {
            return Err(SceneError::KindMismatch {
                name: name.to_string(),
                expected: kind,
                found: entity.kind,
            });
        }
        Ok(entity)
    }

    pub fn record_frame(&mut self, name: &str, frame_index: u32) -> Result<bool, SceneError> {
        let entity = self
            .entities
            .get_mut(name)
            .ok_or_else(|| SceneError::UnknownEntity {
                name: name.to_string(),
            })?;
        Ok(entity.record_frame(frame_index))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> impl Iterator<Item = &SceneEntity> {
        self.entities.values()
    }

    pub fn count_of(&self, kind: EntityKind) -> usize {
        self.entities.values().filter(|e| e.kind == kind).count()
    }
}

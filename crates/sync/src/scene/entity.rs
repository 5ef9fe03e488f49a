use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::command::Pose;
use crate::host::{EntityHandle, ShapeKeyHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    RigidBody,
    DeformableMesh,
    PointCloud,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::RigidBody => "rigid body",
            EntityKind::DeformableMesh => "deformable mesh",
            EntityKind::PointCloud => "point cloud",
        }
    }

    pub fn is_deformable(self) -> bool {
        matches!(self, EntityKind::DeformableMesh | EntityKind::PointCloud)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry-side view of a named scene object. The host owns the geometry;
/// this only tracks what the engine needs to drive it.
#[derive(Debug, Clone)]
pub struct SceneEntity {
    pub name: String,
    pub kind: EntityKind,
    pub handle: EntityHandle,
    pub pose: Pose,
    pub last_frame_index: Option<u32>,
    /// Frames a shape key was registered for, in arrival order.
    pub shape_key_history: Vec<u32>,
    shape_keys: BTreeMap<u32, ShapeKeyHandle>,
    /// Frames at which the key of each frame was keyed to zero.
    hidden_at: BTreeMap<u32, BTreeSet<u32>>,
}

impl SceneEntity {
    pub fn new(name: impl Into<String>, kind: EntityKind, handle: EntityHandle) -> Self {
        Self {
            name: name.into(),
            kind,
            handle,
            pose: Pose::IDENTITY,
            last_frame_index: None,
            shape_key_history: Vec::new(),
            shape_keys: BTreeMap::new(),
            hidden_at: BTreeMap::new(),
        }
    }

    /// Appends `frame_index` to the history unless already present.
    /// Returns whether it was appended.
    pub fn record_frame(&mut self, frame_index: u32) -> bool {
        self.last_frame_index = Some(frame_index);
        if self.shape_key_history.contains(&frame_index) {
            return false;
        }
        self.shape_key_history.push(frame_index);
        true
    }

    pub fn has_frame(&self, frame_index: u32) -> bool {
        self.shape_key_history.contains(&frame_index)
    }

    pub fn shape_key(&self, frame_index: u32) -> Option<ShapeKeyHandle> {
        self.shape_keys.get(&frame_index).copied()
    }

    /// Binds the shape key for `frame_index`, returning the one it replaced.
    pub fn bind_shape_key(
        &mut self,
        frame_index: u32,
        key: ShapeKeyHandle,
    ) -> Option<ShapeKeyHandle> {
        self.shape_keys.insert(frame_index, key)
    }

    pub fn shape_key_count(&self) -> usize {
        self.shape_keys.len()
    }

    /// Notes that the key bound to `frame_index` was keyed to zero at `at`.
    pub fn record_hidden(&mut self, frame_index: u32, at: u32) {
        if frame_index != at {
            self.hidden_at.entry(frame_index).or_default().insert(at);
        }
    }

    /// Every frame the key of `frame_index` has to be zero at, in order.
    pub fn hidden_frames(&self, frame_index: u32) -> impl Iterator<Item = u32> + '_ {
        self.hidden_at
            .get(&frame_index)
            .into_iter()
            .flat_map(|frames| frames.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_frame_is_idempotent() {
        let mut entity = SceneEntity::new("cloud", EntityKind::PointCloud, EntityHandle(0));

        assert!(entity.record_frame(10));
        assert!(entity.record_frame(0));
        assert!(!entity.record_frame(10));

        assert_eq!(entity.shape_key_history, vec![10, 0]);
        assert_eq!(entity.last_frame_index, Some(10));
    }

    #[test]
    fn rebinding_returns_replaced_key() {
        let mut entity = SceneEntity::new("sheet", EntityKind::DeformableMesh, EntityHandle(0));

        assert_eq!(entity.bind_shape_key(5, ShapeKeyHandle(0)), None);
        assert_eq!(entity.bind_shape_key(5, ShapeKeyHandle(1)), Some(ShapeKeyHandle(0)));
        assert_eq!(entity.shape_key(5), Some(ShapeKeyHandle(1)));
        assert_eq!(entity.shape_key_count(), 1);
    }

    #[test]
    fn hidden_frames_are_kept_per_frame() {
        let mut entity = SceneEntity::new("cloud", EntityKind::PointCloud, EntityHandle(0));

        entity.record_hidden(10, 0);
        entity.record_hidden(0, 10);
        entity.record_hidden(10, 20);
        entity.record_hidden(10, 0);
        entity.record_hidden(10, 10);

        assert_eq!(entity.hidden_frames(10).collect::<Vec<_>>(), vec![0, 20]);
        assert_eq!(entity.hidden_frames(0).collect::<Vec<_>>(), vec![10]);
        assert_eq!(entity.hidden_frames(20).count(), 0);
    }
}

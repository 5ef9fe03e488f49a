//! The narrow interface the engine drives the scene host through.
//!
//! The engine never touches geometry or animation data directly; every
//! mutation of the authored scene goes through [`SceneHost`]. [`MemoryHost`]
//! is the in-process implementation used by the server and the tests.

mod archive;
mod import;
mod memory;
mod primitives;

use std::fmt;
use std::path::PathBuf;

use glam::Vec3;
use rkyv::rancor;

use crate::command::{AssetKind, Face, Pose, PrimitiveKind, PrimitiveParams};

pub use archive::{ObjectArchive, QuatKey, SceneArchive, ShapeKeyArchive, VecKey, WeightKey};
pub use memory::{MemoryHost, ObjectSource, SceneObject, ShapeKey};
pub use primitives::build_primitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle(pub u32);

impl EntityHandle {
    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeKeyHandle(pub u32);

impl ShapeKeyHandle {
    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ShapeKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shape_key#{}", self.0)
    }
}

/// Animatable transform channel of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Location,
    Rotation,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Location => "location",
            Channel::Rotation => "rotation_quaternion",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("{0} is not known to the scene host")]
    UnknownEntity(EntityHandle),
    #[error("{0} is not known to the scene host")]
    UnknownShapeKey(ShapeKeyHandle),
    #[error("failed to import {kind} asset: {reason}")]
    Import { kind: AssetKind, reason: String },
    #[error("invalid frame range [{start}, {end}]")]
    InvalidFrameRange { start: u32, end: u32 },
    #[error("'{0}' cannot be used as a scene file name")]
    InvalidSceneName(String),
    #[error("failed to archive scene: {0}")]
    Archive(rancor::Error),
    #[error("failed to write scene to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait SceneHost {
    /// Imports an asset and returns the object it produced, renamed to `name`.
    fn import_mesh_asset(
        &mut self,
        name: &str,
        bytes: &[u8],
        kind: AssetKind,
    ) -> Result<EntityHandle, HostError>;

    fn create_primitive(
        &mut self,
        name: &str,
        kind: PrimitiveKind,
        params: &PrimitiveParams,
    ) -> Result<EntityHandle, HostError>;

    /// Creates an empty mesh object to receive deformable geometry.
    fn create_mesh_object(&mut self, name: &str) -> Result<EntityHandle, HostError>;

    fn set_pose(&mut self, entity: EntityHandle, pose: &Pose) -> Result<(), HostError>;

    /// Records the current value of `channel` at `frame_index`, replacing any
    /// sample already there.
    fn keyframe(
        &mut self,
        entity: EntityHandle,
        channel: Channel,
        frame_index: u32,
    ) -> Result<(), HostError>;

    /// Replaces the whole topology of `entity`.
    fn upsert_geometry(
        &mut self,
        entity: EntityHandle,
        vertices: &[Vec3],
        faces: &[Face],
    ) -> Result<(), HostError>;

    /// Adds a shape key capturing the current geometry of `entity`.
    fn add_shape_key(&mut self, entity: EntityHandle, tag: &str)
    -> Result<ShapeKeyHandle, HostError>;

    /// Sets the weight of `key` and records it at `frame_index`.
    fn keyframe_weight(
        &mut self,
        key: ShapeKeyHandle,
        value: f32,
        frame_index: u32,
    ) -> Result<(), HostError>;

    fn set_frame_range(&mut self, start: u32, end: u32) -> Result<(), HostError>;

    fn persist(&mut self, name: &str) -> Result<(), HostError>;
}

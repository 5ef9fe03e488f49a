use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glam::{Quat, Vec3};

use crate::command::{
    AssetKind, Face, Pose, PrimitiveKind, PrimitiveParams, is_valid_scene_name,
};

use super::archive::{
    ObjectArchive, QuatKey, SceneArchive, ShapeKeyArchive, VecKey, WeightKey,
    SCENE_FILE_EXTENSION,
};
use super::import::import_asset;
use super::primitives::build_primitive;
use super::{Channel, EntityHandle, HostError, SceneHost, ShapeKeyHandle};

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectSource {
    Asset { kind: AssetKind, size: usize },
    Primitive(PrimitiveKind),
    Mesh,
}

impl ObjectSource {
    fn describe(&self) -> String {
        match self {
            ObjectSource::Asset { kind, size } => format!("asset:{kind}:{size}"),
            ObjectSource::Primitive(kind) => format!("primitive:{kind}"),
            ObjectSource::Mesh => "mesh".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SceneObject {
    pub name: String,
    pub source: ObjectSource,
    pub pose: Pose,
    pub vertices: Vec<Vec3>,
    pub faces: Vec<Face>,
    pub location_keys: BTreeMap<u32, Vec3>,
    pub rotation_keys: BTreeMap<u32, Quat>,
    pub shape_keys: Vec<ShapeKeyHandle>,
}

impl SceneObject {
    fn new(name: &str, source: ObjectSource) -> Self {
        Self {
            name: name.to_string(),
            source,
            pose: Pose::IDENTITY,
            vertices: Vec::new(),
            faces: Vec::new(),
            location_keys: BTreeMap::new(),
            rotation_keys: BTreeMap::new(),
            shape_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShapeKey {
    pub owner: EntityHandle,
    pub tag: String,
    pub vertices: Vec<Vec3>,
    pub weight: f32,
    pub weight_keys: BTreeMap<u32, f32>,
}

impl ShapeKey {
    /// Weight shown at `frame`. Keys hold their value until the next key,
    /// so a chain of 0/1 keys plays back as discrete steps.
    pub fn weight_at(&self, frame: u32) -> f32 {
        self.weight_keys
            .range(..=frame)
            .next_back()
            .or_else(|| self.weight_keys.iter().next())
            .map(|(_, &w)| w)
            .unwrap_or(self.weight)
    }
}

/// Scene host keeping the authored scene in memory. `persist` writes an rkyv
/// archive into the output directory, when one is configured.
#[derive(Debug, Default)]
pub struct MemoryHost {
    objects: Vec<SceneObject>,
    shape_keys: Vec<ShapeKey>,
    frame_range: Option<(u32, u32)>,
    frame_range_writes: usize,
    output_dir: Option<PathBuf>,
    persisted: Vec<String>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: Some(output_dir.into()),
            ..Self::default()
        }
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn object(&self, handle: EntityHandle) -> Option<&SceneObject> {
        self.objects.get(handle.0 as usize)
    }

    pub fn object_by_name(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn shape_key(&self, handle: ShapeKeyHandle) -> Option<&ShapeKey> {
        self.shape_keys.get(handle.0 as usize)
    }

    pub fn shape_key_by_tag(&self, object: &str, tag: &str) -> Option<&ShapeKey> {
        let object = self.object_by_name(object)?;
        object
            .shape_keys
            .iter()
            .filter_map(|&h| self.shape_key(h))
            .find(|key| key.tag == tag)
    }

    pub fn frame_range(&self) -> Option<(u32, u32)> {
        self.frame_range
    }

    pub fn frame_range_writes(&self) -> usize {
        self.frame_range_writes
    }

    pub fn persisted(&self) -> &[String] {
        &self.persisted
    }

    pub fn archive(&self, name: &str) -> SceneArchive {
        let (frame_start, frame_end) = self.frame_range.unwrap_or((0, 0));
        let objects = self
            .objects
            .iter()
            .map(|object| ObjectArchive {
                name: object.name.clone(),
                source: object.source.describe(),
                pose: object.pose.to_array(),
                vertices: object.vertices.iter().map(|v| v.to_array()).collect(),
                faces: object.faces.clone(),
                location_keys: object
                    .location_keys
                    .iter()
                    .map(|(&frame, v)| VecKey {
                        frame,
                        value: v.to_array(),
                    })
                    .collect(),
                rotation_keys: object
                    .rotation_keys
                    .iter()
                    .map(|(&frame, q)| QuatKey {
                        frame,
                        value: [q.w, q.x, q.y, q.z],
                    })
                    .collect(),
                shape_keys: object
                    .shape_keys
                    .iter()
                    .filter_map(|&h| self.shape_key(h))
                    .map(|key| ShapeKeyArchive {
                        tag: key.tag.clone(),
                        vertices: key.vertices.iter().map(|v| v.to_array()).collect(),
                        weights: key
                            .weight_keys
                            .iter()
                            .map(|(&frame, &value)| WeightKey { frame, value })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        SceneArchive {
            name: name.to_string(),
            frame_start,
            frame_end,
            objects,
        }
    }

    fn insert(&mut self, object: SceneObject) -> EntityHandle {
        let handle = EntityHandle(self.objects.len() as u32);
        log::debug!("host created {} '{}'", handle, object.name);
        self.objects.push(object);
        handle
    }

    fn object_mut(&mut self, handle: EntityHandle) -> Result<&mut SceneObject, HostError> {
        self.objects
            .get_mut(handle.0 as usize)
            .ok_or(HostError::UnknownEntity(handle))
    }

    fn scene_path(&self, dir: &Path, name: &str) -> Result<PathBuf, HostError> {
        if !is_valid_scene_name(name) {
            return Err(HostError::InvalidSceneName(name.to_string()));
        }
        Ok(dir.join(format!("{name}.{SCENE_FILE_EXTENSION}")))
    }
}

impl SceneHost for MemoryHost {
    fn import_mesh_asset(
        &mut self,
        name: &str,
        bytes: &[u8],
        kind: AssetKind,
    ) -> Result<EntityHandle, HostError> {
        let mesh = import_asset(bytes, kind)?;
        let mut object = SceneObject::new(
            name,
            ObjectSource::Asset {
                kind,
                size: bytes.len(),
            },
        );
        object.vertices = mesh.vertices;
        object.faces = mesh.faces;
        Ok(self.insert(object))
    }

    fn create_primitive(
        &mut self,
        name: &str,
        kind: PrimitiveKind,
        params: &PrimitiveParams,
    ) -> Result<EntityHandle, HostError> {
        let (vertices, faces) = build_primitive(kind, params);
        let mut object = SceneObject::new(name, ObjectSource::Primitive(kind));
        object.vertices = vertices;
        object.faces = faces;
        Ok(self.insert(object))
    }

    fn create_mesh_object(&mut self, name: &str) -> Result<EntityHandle, HostError> {
        Ok(self.insert(SceneObject::new(name, ObjectSource::Mesh)))
    }

    fn set_pose(&mut self, entity: EntityHandle, pose: &Pose) -> Result<(), HostError> {
        self.object_mut(entity)?.pose = *pose;
        Ok(())
    }

    fn keyframe(
        &mut self,
        entity: EntityHandle,
        channel: Channel,
        frame_index: u32,
    ) -> Result<(), HostError> {
        let object = self.object_mut(entity)?;
        match channel {
            Channel::Location => {
                object
                    .location_keys
                    .insert(frame_index, object.pose.translation);
            }
            Channel::Rotation => {
                object.rotation_keys.insert(frame_index, object.pose.rotation);
            }
        }
        Ok(())
    }

    fn upsert_geometry(
        &mut self,
        entity: EntityHandle,
        vertices: &[Vec3],
        faces: &[Face],
    ) -> Result<(), HostError> {
        let object = self.object_mut(entity)?;
        object.vertices.clear();
        object.vertices.extend_from_slice(vertices);
        object.faces.clear();
        object.faces.extend_from_slice(faces);
        Ok(())
    }

    fn add_shape_key(
        &mut self,
        entity: EntityHandle,
        tag: &str,
    ) -> Result<ShapeKeyHandle, HostError> {
        let handle = ShapeKeyHandle(self.shape_keys.len() as u32);
        let object = self.object_mut(entity)?;
        object.shape_keys.push(handle);
        let vertices = object.vertices.clone();

        self.shape_keys.push(ShapeKey {
            owner: entity,
            tag: tag.to_string(),
            vertices,
            weight: 0.0,
            weight_keys: BTreeMap::new(),
        });
        Ok(handle)
    }

    fn keyframe_weight(
        &mut self,
        key: ShapeKeyHandle,
        value: f32,
        frame_index: u32,
    ) -> Result<(), HostError> {
        let shape_key = self
            .shape_keys
            .get_mut(key.0 as usize)
            .ok_or(HostError::UnknownShapeKey(key))?;
        shape_key.weight = value;
        shape_key.weight_keys.insert(frame_index, value);
        Ok(())
    }

    fn set_frame_range(&mut self, start: u32, end: u32) -> Result<(), HostError> {
        if start > end {
            return Err(HostError::InvalidFrameRange { start, end });
        }
        self.frame_range = Some((start, end));
        self.frame_range_writes += 1;
        Ok(())
    }

    fn persist(&mut self, name: &str) -> Result<(), HostError> {
        if let Some(dir) = &self.output_dir {
            let path = self.scene_path(dir, name)?;
            let bytes = self.archive(name).to_bytes()?;

            let io_err = |source| HostError::Persist {
                path: path.clone(),
                source,
            };
            std::fs::create_dir_all(dir).map_err(io_err)?;
            std::fs::write(&path, bytes).map_err(io_err)?;
            log::info!("Scene '{}' written to {}", name, path.display());
        } else {
            log::info!("Scene '{}' finalized (no output directory configured)", name);
        }

        self.persisted.push(name.to_string());
        Ok(())
    }
}

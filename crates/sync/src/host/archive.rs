use std::path::Path;

use rkyv::util::AlignedVec;
use rkyv::{rancor, Archive, Deserialize, Serialize};

use super::HostError;

pub const SCENE_FILE_EXTENSION: &str = "scene";

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct VecKey {
    pub frame: u32,
    pub value: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct QuatKey {
    pub frame: u32,
    /// w-first, matching the wire pose layout.
    pub value: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct WeightKey {
    pub frame: u32,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ShapeKeyArchive {
    pub tag: String,
    pub vertices: Vec<[f32; 3]>,
    pub weights: Vec<WeightKey>,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ObjectArchive {
    pub name: String,
    pub source: String,
    pub pose: [f32; 7],
    pub vertices: Vec<[f32; 3]>,
    pub faces: Vec<Vec<u32>>,
    pub location_keys: Vec<VecKey>,
    pub rotation_keys: Vec<QuatKey>,
    pub shape_keys: Vec<ShapeKeyArchive>,
}

/// Everything a finished animation persists.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct SceneArchive {
    pub name: String,
    pub frame_start: u32,
    pub frame_end: u32,
    pub objects: Vec<ObjectArchive>,
}

impl SceneArchive {
    pub fn to_bytes(&self) -> Result<Vec<u8>, HostError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(HostError::Archive)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, HostError> {
        let mut aligned = AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);
        rkyv::from_bytes::<Self, rancor::Error>(&aligned).map_err(HostError::Archive)
    }

    pub fn read(path: &Path) -> Result<Self, HostError> {
        let data = std::fs::read(path).map_err(|source| HostError::Persist {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&data)
    }

    pub fn object(&self, name: &str) -> Option<&ObjectArchive> {
        self.objects.iter().find(|o| o.name == name)
    }
}

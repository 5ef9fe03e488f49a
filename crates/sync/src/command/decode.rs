use glam::Vec3;
use rkyv::rancor;

use crate::net::{WireCommand, WirePrimitiveParam};

use super::{
    AssetKind, Command, CommandKind, Face, Pose, PrimitiveKind, PrimitiveParams, ShapeFrame,
    is_valid_scene_name,
};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
    #[error("packet body of {len} bytes ends inside its header")]
    Truncated { len: usize },
    #[error("malformed packet: {0}")]
    Malformed(rancor::Error),
    #[error("bad packet header (magic {magic:#010x}, version {version})")]
    BadHeader { magic: u32, version: u32 },
    #[error("no handler registered for message kind {kind}")]
    NoHandler { kind: u16 },
    #[error("header announces {header} but payload is {payload}")]
    KindMismatch {
        header: CommandKind,
        payload: CommandKind,
    },
    #[error("{field} must not be empty")]
    EmptyName { field: &'static str },
    #[error("'{0}' cannot be used as a scene name")]
    InvalidSceneName(String),
    #[error("expecting a pose vector of length 7 (3 location dims, 4 rotation dims), got {len}")]
    PoseArity { len: usize },
    #[error("pose rotation has zero length")]
    DegenerateRotation,
    #[error("{field} contains a non-finite value")]
    NonFinite { field: &'static str },
    #[error("vertex array of length {len} does not reshape to N x 3")]
    VertexArity { len: usize },
    #[error("face {face} has {len} indices, need at least 3")]
    FaceTooSmall { face: usize, len: usize },
    #[error("face {face} references vertex {index} but only {vertex_count} vertices were sent")]
    FaceIndexOutOfRange {
        face: usize,
        index: u32,
        vertex_count: usize,
    },
    #[error("unknown primitive kind '{0}'")]
    UnknownPrimitive(String),
    #[error("unknown primitive parameter '{0}'")]
    UnknownParam(String),
    #[error("primitive parameter '{key}' expects {expected} values, got {got}")]
    ParamArity {
        key: String,
        expected: usize,
        got: usize,
    },
    #[error("primitive parameter '{key}' has invalid value {value}")]
    InvalidParam { key: String, value: f32 },
    #[error("'{0}' is not a supported mesh asset kind")]
    UnsupportedAsset(String),
}

impl TryFrom<WireCommand> for Command {
    type Error = DecodeError;

    fn try_from(wire: WireCommand) -> Result<Self, Self::Error> {
        match wire {
            WireCommand::AddRigidBodyMesh {
                name,
                mesh_asset,
                asset_kind,
                init_pose,
            } => {
                let asset_kind = AssetKind::from_name(&asset_kind)
                    .or_else(|| AssetKind::from_file_name(&name))
                    .ok_or(DecodeError::UnsupportedAsset(asset_kind))?;
                Ok(Command::AddRigidBodyMesh {
                    name: require_name(name, "name")?,
                    mesh_asset,
                    asset_kind,
                    init_pose: Pose::from_slice(&init_pose)?,
                })
            }
            WireCommand::AddRigidBodyPrimitive {
                name,
                primitive_kind,
                params,
            } => {
                let kind = PrimitiveKind::from_name(&primitive_kind)
                    .ok_or(DecodeError::UnknownPrimitive(primitive_kind))?;
                Ok(Command::AddRigidBodyPrimitive {
                    name: require_name(name, "name")?,
                    primitive_kind: kind,
                    params: decode_params(&params)?,
                })
            }
            WireCommand::UpdateRigidBodyPose {
                name,
                pose,
                frame_index,
            } => Ok(Command::UpdateRigidBodyPose {
                name: require_name(name, "name")?,
                pose: Pose::from_slice(&pose)?,
                frame_index,
            }),
            WireCommand::SetDeformableMesh {
                name,
                vertices,
                faces,
                frame_index,
                prev_frame_index,
            } => {
                let vertices = decode_vertices(&vertices)?;
                validate_faces(&faces, vertices.len())?;
                Ok(Command::SetDeformableMesh(ShapeFrame {
                    name: require_name(name, "name")?,
                    vertices,
                    faces,
                    frame_index,
                    prev_frame_index,
                }))
            }
            WireCommand::SetPointCloud {
                name,
                vertices,
                frame_index,
                prev_frame_index,
            } => Ok(Command::SetPointCloud(ShapeFrame {
                name: require_name(name, "name")?,
                vertices: decode_vertices(&vertices)?,
                faces: Vec::new(),
                frame_index,
                prev_frame_index,
            })),
            WireCommand::FinishAnimation {
                experiment_name,
                end_frame_index,
            } => Ok(Command::FinishAnimation {
                experiment_name: require_scene_name(experiment_name)?,
                end_frame_index,
            }),
        }
    }
}

fn require_name(name: String, field: &'static str) -> Result<String, DecodeError> {
    if name.trim().is_empty() {
        return Err(DecodeError::EmptyName { field });
    }
    Ok(name)
}

fn require_scene_name(name: String) -> Result<String, DecodeError> {
    let name = require_name(name, "experiment_name")?;
    if !is_valid_scene_name(&name) {
        return Err(DecodeError::InvalidSceneName(name));
    }
    Ok(name)
}

fn decode_vertices(flat: &[f32]) -> Result<Vec<Vec3>, DecodeError> {
    if flat.len() % 3 != 0 {
        return Err(DecodeError::VertexArity { len: flat.len() });
    }
    if flat.iter().any(|v| !v.is_finite()) {
        return Err(DecodeError::NonFinite { field: "vertices" });
    }
    Ok(flat.chunks_exact(3).map(Vec3::from_slice).collect())
}

fn validate_faces(faces: &[Face], vertex_count: usize) -> Result<(), DecodeError> {
    for (face, indices) in faces.iter().enumerate() {
        if indices.len() < 3 {
            return Err(DecodeError::FaceTooSmall {
                face,
                len: indices.len(),
            });
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(DecodeError::FaceIndexOutOfRange {
                face,
                index,
                vertex_count,
            });
        }
    }
    Ok(())
}

fn decode_params(params: &[WirePrimitiveParam]) -> Result<PrimitiveParams, DecodeError> {
    let mut decoded = PrimitiveParams::default();

    for param in params {
        let key = param.key.trim().to_ascii_lowercase();
        let expected = match key.as_str() {
            "size" | "radius" | "depth" | "segments" | "rings" => 1,
            "location" | "rotation" | "scale" => 3,
            _ => return Err(DecodeError::UnknownParam(param.key.clone())),
        };
        if param.values.len() != expected {
            return Err(DecodeError::ParamArity {
                key,
                expected,
                got: param.values.len(),
            });
        }
        if let Some(&value) = param.values.iter().find(|v| !v.is_finite()) {
            return Err(DecodeError::InvalidParam { key, value });
        }

        let values = &param.values;
        match key.as_str() {
            "size" => decoded.size = positive(&key, values[0])?,
            "radius" => decoded.radius = positive(&key, values[0])?,
            "depth" => decoded.depth = positive(&key, values[0])?,
            "segments" => decoded.segments = count(&key, values[0], 3)?,
            "rings" => decoded.rings = count(&key, values[0], 2)?,
            "location" => decoded.location = Vec3::from_slice(values),
            "rotation" => decoded.rotation = Vec3::from_slice(values),
            "scale" => decoded.scale = Vec3::from_slice(values),
            _ => unreachable!("key validated above"),
        }
    }

    Ok(decoded)
}

fn positive(key: &str, value: f32) -> Result<f32, DecodeError> {
    if value <= 0.0 {
        return Err(DecodeError::InvalidParam {
            key: key.to_string(),
            value,
        });
    }
    Ok(value)
}

fn count(key: &str, value: f32, min: u32) -> Result<u32, DecodeError> {
    if value.fract() != 0.0 || value < min as f32 || value > 1024.0 {
        return Err(DecodeError::InvalidParam {
            key: key.to_string(),
            value,
        });
    }
    Ok(value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_cloud(vertices: Vec<f32>) -> WireCommand {
        WireCommand::SetPointCloud {
            name: "cloud".to_string(),
            vertices,
            frame_index: 0,
            prev_frame_index: None,
        }
    }

    #[test]
    fn vertices_reshape_to_n_by_3() {
        let command = Command::try_from(point_cloud(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])).unwrap();
        let Command::SetPointCloud(frame) = command else {
            panic!("expected a point cloud");
        };
        assert_eq!(frame.vertices, vec![Vec3::new(0.0, 1.0, 2.0), Vec3::new(3.0, 4.0, 5.0)]);
        assert!(frame.faces.is_empty());

        let err = Command::try_from(point_cloud(vec![0.0; 4])).unwrap_err();
        assert!(matches!(err, DecodeError::VertexArity { len: 4 }));
    }

    #[test]
    fn faces_must_index_sent_vertices() {
        let wire = WireCommand::SetDeformableMesh {
            name: "sheet".to_string(),
            vertices: vec![0.0; 9],
            faces: vec![vec![0, 1, 3]],
            frame_index: 0,
            prev_frame_index: None,
        };
        let err = Command::try_from(wire).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::FaceIndexOutOfRange {
                face: 0,
                index: 3,
                vertex_count: 3
            }
        ));

        let wire = WireCommand::SetDeformableMesh {
            name: "sheet".to_string(),
            vertices: vec![0.0; 9],
            faces: vec![vec![0, 1]],
            frame_index: 0,
            prev_frame_index: None,
        };
        assert!(matches!(
            Command::try_from(wire).unwrap_err(),
            DecodeError::FaceTooSmall { face: 0, len: 2 }
        ));
    }

    #[test]
    fn experiment_name_must_be_a_file_name() {
        for name in ["runs/exp1", "..", "a\\b", "exp\0"] {
            let wire = WireCommand::FinishAnimation {
                experiment_name: name.to_string(),
                end_frame_index: 100,
            };
            assert!(
                matches!(Command::try_from(wire), Err(DecodeError::InvalidSceneName(_))),
                "{name:?} accepted"
            );
        }

        let wire = WireCommand::FinishAnimation {
            experiment_name: "test_10".to_string(),
            end_frame_index: 100,
        };
        assert!(Command::try_from(wire).is_ok());
    }

    #[test]
    fn primitive_params_are_checked() {
        let wire = WireCommand::AddRigidBodyPrimitive {
            name: "cube_a".to_string(),
            primitive_kind: "cube".to_string(),
            params: vec![
                WirePrimitiveParam::new("size", &[1.0]),
                WirePrimitiveParam::new("location", &[0.0, 0.1, 0.0]),
                WirePrimitiveParam::new("scale", &[0.2, 0.2, 1.0]),
            ],
        };
        let Command::AddRigidBodyPrimitive { params, .. } = Command::try_from(wire).unwrap() else {
            panic!("expected a primitive");
        };
        assert_eq!(params.size, 1.0);
        assert_eq!(params.location, Vec3::new(0.0, 0.1, 0.0));
        assert_eq!(params.scale, Vec3::new(0.2, 0.2, 1.0));
        assert_eq!(params.radius, PrimitiveParams::default().radius);

        let wire = WireCommand::AddRigidBodyPrimitive {
            name: "cube_a".to_string(),
            primitive_kind: "cube".to_string(),
            params: vec![WirePrimitiveParam::new("location", &[0.0, 0.1])],
        };
        assert!(matches!(
            Command::try_from(wire).unwrap_err(),
            DecodeError::ParamArity { expected: 3, got: 2, .. }
        ));

        let wire = WireCommand::AddRigidBodyPrimitive {
            name: "cube_a".to_string(),
            primitive_kind: "cube".to_string(),
            params: vec![WirePrimitiveParam::new("exec", &[1.0])],
        };
        assert!(matches!(
            Command::try_from(wire).unwrap_err(),
            DecodeError::UnknownParam(_)
        ));
    }

    #[test]
    fn unknown_primitive_kind_is_rejected() {
        let wire = WireCommand::AddRigidBodyPrimitive {
            name: "cube_a".to_string(),
            primitive_kind: "bpy.ops.mesh.primitive_cube_add".to_string(),
            params: Vec::new(),
        };
        assert!(matches!(
            Command::try_from(wire).unwrap_err(),
            DecodeError::UnknownPrimitive(_)
        ));
    }

    #[test]
    fn unsupported_asset_kind_is_rejected() {
        let wire = WireCommand::AddRigidBodyMesh {
            name: "part.stl".to_string(),
            mesh_asset: vec![1, 2, 3],
            asset_kind: "stl".to_string(),
            init_pose: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
        };
        assert!(matches!(
            Command::try_from(wire).unwrap_err(),
            DecodeError::UnsupportedAsset(kind) if kind == "stl"
        ));
    }

    #[test]
    fn asset_kind_falls_back_to_name_suffix() {
        let wire = WireCommand::AddRigidBodyMesh {
            name: "gripper.dae".to_string(),
            mesh_asset: vec![1, 2, 3],
            asset_kind: String::new(),
            init_pose: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
        };
        let Command::AddRigidBodyMesh { asset_kind, .. } = Command::try_from(wire).unwrap() else {
            panic!("expected a mesh");
        };
        assert_eq!(asset_kind, AssetKind::Collada);
    }

    #[test]
    fn empty_names_are_rejected() {
        let wire = WireCommand::FinishAnimation {
            experiment_name: "  ".to_string(),
            end_frame_index: 10,
        };
        assert!(matches!(
            Command::try_from(wire).unwrap_err(),
            DecodeError::EmptyName { field: "experiment_name" }
        ));
    }
}

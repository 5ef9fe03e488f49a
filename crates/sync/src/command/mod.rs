//! Typed scene-authoring commands.
//!
//! A [`Command`] only exists once its payload has passed every shape check in
//! [`decode`]; handlers never see a half-valid command.

mod decode;

use std::fmt;

use glam::{EulerRot, Quat, Vec3};

pub use decode::DecodeError;

/// Numeric message kind carried in every packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CommandKind {
    AddRigidBodyMesh = 1,
    AddRigidBodyPrimitive = 2,
    UpdateRigidBodyPose = 3,
    SetDeformableMesh = 4,
    SetPointCloud = 5,
    FinishAnimation = 6,
}

impl CommandKind {
    pub const ALL: [CommandKind; 6] = [
        CommandKind::AddRigidBodyMesh,
        CommandKind::AddRigidBodyPrimitive,
        CommandKind::UpdateRigidBodyPose,
        CommandKind::SetDeformableMesh,
        CommandKind::SetPointCloud,
        CommandKind::FinishAnimation,
    ];

    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::AddRigidBodyMesh => "add_rigid_body_mesh",
            CommandKind::AddRigidBodyPrimitive => "add_rigid_body_primitive",
            CommandKind::UpdateRigidBodyPose => "update_rigid_body_pose",
            CommandKind::SetDeformableMesh => "set_deformable_mesh",
            CommandKind::SetPointCloud => "set_point_cloud",
            CommandKind::FinishAnimation => "finish_animation",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translation plus unit rotation.
///
/// On the wire a pose is seven scalars: `[x, y, z, w, qx, qy, qz]`. The
/// quaternion is always w-first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const ARITY: usize = 7;

    pub const IDENTITY: Pose = Pose {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn from_slice(values: &[f32]) -> Result<Self, DecodeError> {
        if values.len() != Self::ARITY {
            return Err(DecodeError::PoseArity { len: values.len() });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(DecodeError::NonFinite { field: "pose" });
        }

        let translation = Vec3::new(values[0], values[1], values[2]);
        let rotation = Quat::from_xyzw(values[4], values[5], values[6], values[3]);
        if rotation.length_squared() < f32::EPSILON {
            return Err(DecodeError::DegenerateRotation);
        }

        Ok(Self::new(translation, rotation.normalize()))
    }

    /// Pose built from a location and XYZ Euler angles in radians.
    pub fn from_location_euler(location: Vec3, euler: Vec3) -> Self {
        Self::new(
            location,
            Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z),
        )
    }

    pub fn to_array(&self) -> [f32; 7] {
        let t = self.translation;
        let q = self.rotation;
        [t.x, t.y, t.z, q.w, q.x, q.y, q.z]
    }
}

/// A polygon given as indices into the owning vertex array.
pub type Face = Vec<u32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Cube,
    Plane,
    UvSphere,
    IcoSphere,
    Cylinder,
    Cone,
}

impl PrimitiveKind {
    const NAMES: [(&'static str, PrimitiveKind); 6] = [
        ("cube", PrimitiveKind::Cube),
        ("plane", PrimitiveKind::Plane),
        ("uv_sphere", PrimitiveKind::UvSphere),
        ("ico_sphere", PrimitiveKind::IcoSphere),
        ("cylinder", PrimitiveKind::Cylinder),
        ("cone", PrimitiveKind::Cone),
    ];

    /// Resolves a client-supplied name through the fixed table. Nothing outside
    /// the table is ever constructed.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, kind)| *kind)
    }

    pub fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveParams {
    pub size: f32,
    pub radius: f32,
    pub depth: f32,
    pub segments: u32,
    pub rings: u32,
    pub location: Vec3,
    /// XYZ Euler angles in radians.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for PrimitiveParams {
    fn default() -> Self {
        Self {
            size: 2.0,
            radius: 1.0,
            depth: 2.0,
            segments: 32,
            rings: 16,
            location: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl PrimitiveParams {
    pub fn initial_pose(&self) -> Pose {
        Pose::from_location_euler(self.location, self.rotation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Collada,
    Gltf,
    Glb,
}

impl AssetKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "collada" | "dae" => Some(AssetKind::Collada),
            "gltf" => Some(AssetKind::Gltf),
            "glb" => Some(AssetKind::Glb),
            _ => None,
        }
    }

    /// Infers the kind from a file name suffix, e.g. `arm.dae`.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, suffix) = file_name.rsplit_once('.')?;
        Self::from_name(suffix)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Collada => "collada",
            AssetKind::Gltf => "gltf",
            AssetKind::Glb => "glb",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `name` can name a persisted scene: a single plain file name.
pub fn is_valid_scene_name(name: &str) -> bool {
    !name.trim().is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

/// One frame of deformable geometry. Point clouds carry no faces.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeFrame {
    pub name: String,
    pub vertices: Vec<Vec3>,
    pub faces: Vec<Face>,
    pub frame_index: u32,
    pub prev_frame_index: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddRigidBodyMesh {
        name: String,
        mesh_asset: Vec<u8>,
        asset_kind: AssetKind,
        init_pose: Pose,
    },
    AddRigidBodyPrimitive {
        name: String,
        primitive_kind: PrimitiveKind,
        params: PrimitiveParams,
    },
    UpdateRigidBodyPose {
        name: String,
        pose: Pose,
        frame_index: u32,
    },
    SetDeformableMesh(ShapeFrame),
    SetPointCloud(ShapeFrame),
    FinishAnimation {
        experiment_name: String,
        end_frame_index: u32,
    },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::AddRigidBodyMesh { .. } => CommandKind::AddRigidBodyMesh,
            Command::AddRigidBodyPrimitive { .. } => CommandKind::AddRigidBodyPrimitive,
            Command::UpdateRigidBodyPose { .. } => CommandKind::UpdateRigidBodyPose,
            Command::SetDeformableMesh(_) => CommandKind::SetDeformableMesh,
            Command::SetPointCloud(_) => CommandKind::SetPointCloud,
            Command::FinishAnimation { .. } => CommandKind::FinishAnimation,
        }
    }

    /// Entity or experiment the command is about, for logging.
    pub fn subject(&self) -> &str {
        match self {
            Command::AddRigidBodyMesh { name, .. }
            | Command::AddRigidBodyPrimitive { name, .. }
            | Command::UpdateRigidBodyPose { name, .. } => name,
            Command::SetDeformableMesh(frame) | Command::SetPointCloud(frame) => &frame.name,
            Command::FinishAnimation {
                experiment_name, ..
            } => experiment_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_is_w_first_on_the_wire() {
        let pose = Pose::from_slice(&[1.0, 2.0, 3.0, 1.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(pose.translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(pose.rotation, Quat::IDENTITY);
        assert_eq!(pose.to_array(), [1.0, 2.0, 3.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn pose_rejects_wrong_arity() {
        let err = Pose::from_slice(&[0.0; 6]).unwrap_err();
        assert!(matches!(err, DecodeError::PoseArity { len: 6 }));

        let err = Pose::from_slice(&[0.0; 8]).unwrap_err();
        assert!(matches!(err, DecodeError::PoseArity { len: 8 }));
    }

    #[test]
    fn pose_normalizes_rotation() {
        let pose = Pose::from_slice(&[0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0]).unwrap();
        assert!((pose.rotation.length() - 1.0).abs() < 1e-6);

        let err = Pose::from_slice(&[0.0; 7]).unwrap_err();
        assert!(matches!(err, DecodeError::DegenerateRotation));
    }

    #[test]
    fn primitive_names_resolve_through_fixed_table() {
        assert_eq!(PrimitiveKind::from_name("cube"), Some(PrimitiveKind::Cube));
        assert_eq!(PrimitiveKind::from_name(" UV_Sphere "), Some(PrimitiveKind::UvSphere));
        assert_eq!(PrimitiveKind::from_name("bpy.ops.mesh.primitive_cube_add"), None);
        for (name, kind) in PrimitiveKind::NAMES {
            assert_eq!(kind.name(), name);
        }
    }

    #[test]
    fn asset_kind_from_file_name() {
        assert_eq!(AssetKind::from_file_name("arm.DAE"), Some(AssetKind::Collada));
        assert_eq!(AssetKind::from_file_name("robot.glb"), Some(AssetKind::Glb));
        assert_eq!(AssetKind::from_file_name("scene.gltf"), Some(AssetKind::Gltf));
        assert_eq!(AssetKind::from_file_name("mesh.stl"), None);
        assert_eq!(AssetKind::from_file_name("noext"), None);
    }

    #[test]
    fn command_kind_ids_are_stable() {
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(CommandKind::from_id(0), None);
        assert_eq!(CommandKind::from_id(7), None);
    }
}

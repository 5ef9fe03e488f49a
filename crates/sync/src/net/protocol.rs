use rkyv::util::AlignedVec;
use rkyv::{rancor, Archive, Deserialize, Serialize};

use crate::command::{Command, CommandKind, DecodeError, ShapeFrame};

pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x53434E4B;
pub const DEFAULT_PORT: u16 = 27016;
/// Upper bound on a single frame body. Mesh assets and dense clouds are large.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;
pub const FRAME_LENGTH_PREFIX: usize = 4;
const HEADER_LENGTH_PREFIX: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
    pub sequence: u32,
    pub kind: u16,
}

impl PacketHeader {
    pub fn new(sequence: u32, kind: u16) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            sequence,
            kind,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct WirePrimitiveParam {
    pub key: String,
    pub values: Vec<f32>,
}

impl WirePrimitiveParam {
    pub fn new(key: impl Into<String>, values: &[f32]) -> Self {
        Self {
            key: key.into(),
            values: values.to_vec(),
        }
    }
}

/// Raw payload as it travels. Arrays are flat and unchecked until
/// [`Command::try_from`] validates them.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum WireCommand {
    AddRigidBodyMesh {
        name: String,
        mesh_asset: Vec<u8>,
        asset_kind: String,
        init_pose: Vec<f32>,
    },
    AddRigidBodyPrimitive {
        name: String,
        primitive_kind: String,
        params: Vec<WirePrimitiveParam>,
    },
    UpdateRigidBodyPose {
        name: String,
        pose: Vec<f32>,
        frame_index: u32,
    },
    SetDeformableMesh {
        name: String,
        vertices: Vec<f32>,
        faces: Vec<Vec<u32>>,
        frame_index: u32,
        prev_frame_index: Option<u32>,
    },
    SetPointCloud {
        name: String,
        vertices: Vec<f32>,
        frame_index: u32,
        prev_frame_index: Option<u32>,
    },
    FinishAnimation {
        experiment_name: String,
        end_frame_index: u32,
    },
}

impl WireCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            WireCommand::AddRigidBodyMesh { .. } => CommandKind::AddRigidBodyMesh,
            WireCommand::AddRigidBodyPrimitive { .. } => CommandKind::AddRigidBodyPrimitive,
            WireCommand::UpdateRigidBodyPose { .. } => CommandKind::UpdateRigidBodyPose,
            WireCommand::SetDeformableMesh { .. } => CommandKind::SetDeformableMesh,
            WireCommand::SetPointCloud { .. } => CommandKind::SetPointCloud,
            WireCommand::FinishAnimation { .. } => CommandKind::FinishAnimation,
        }
    }
}

impl From<&Command> for WireCommand {
    fn from(command: &Command) -> Self {
        fn flatten(vertices: &[glam::Vec3]) -> Vec<f32> {
            vertices.iter().flat_map(|v| v.to_array()).collect()
        }

        match command {
            Command::AddRigidBodyMesh {
                name,
                mesh_asset,
                asset_kind,
                init_pose,
            } => WireCommand::AddRigidBodyMesh {
                name: name.clone(),
                mesh_asset: mesh_asset.clone(),
                asset_kind: asset_kind.as_str().to_string(),
                init_pose: init_pose.to_array().to_vec(),
            },
            Command::AddRigidBodyPrimitive {
                name,
                primitive_kind,
                params,
            } => WireCommand::AddRigidBodyPrimitive {
                name: name.clone(),
                primitive_kind: primitive_kind.name().to_string(),
                params: vec![
                    WirePrimitiveParam::new("size", &[params.size]),
                    WirePrimitiveParam::new("radius", &[params.radius]),
                    WirePrimitiveParam::new("depth", &[params.depth]),
                    WirePrimitiveParam::new("segments", &[params.segments as f32]),
                    WirePrimitiveParam::new("rings", &[params.rings as f32]),
                    WirePrimitiveParam::new("location", &params.location.to_array()),
                    WirePrimitiveParam::new("rotation", &params.rotation.to_array()),
                    WirePrimitiveParam::new("scale", &params.scale.to_array()),
                ],
            },
            Command::UpdateRigidBodyPose {
                name,
                pose,
                frame_index,
            } => WireCommand::UpdateRigidBodyPose {
                name: name.clone(),
                pose: pose.to_array().to_vec(),
                frame_index: *frame_index,
            },
            Command::SetDeformableMesh(ShapeFrame {
                name,
                vertices,
                faces,
                frame_index,
                prev_frame_index,
            }) => WireCommand::SetDeformableMesh {
                name: name.clone(),
                vertices: flatten(vertices),
                faces: faces.clone(),
                frame_index: *frame_index,
                prev_frame_index: *prev_frame_index,
            },
            Command::SetPointCloud(ShapeFrame {
                name,
                vertices,
                frame_index,
                prev_frame_index,
                ..
            }) => WireCommand::SetPointCloud {
                name: name.clone(),
                vertices: flatten(vertices),
                frame_index: *frame_index,
                prev_frame_index: *prev_frame_index,
            },
            Command::FinishAnimation {
                experiment_name,
                end_frame_index,
            } => WireCommand::FinishAnimation {
                experiment_name: experiment_name.clone(),
                end_frame_index: *end_frame_index,
            },
        }
    }
}


/// One frame body: the archived header, prefixed with its length, followed
/// by the archived payload. The header is validated on its own, so a payload
/// this version cannot read still reports the kind it was sent as.
#[derive(Debug, Clone)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: WireCommand,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("packet of {len} bytes exceeds the {max} byte frame limit")]
    TooLarge { len: usize, max: usize },
}

impl Packet {
    pub fn new(sequence: u32, payload: WireCommand) -> Self {
        let header = PacketHeader::new(sequence, payload.kind().id());
        Self { header, payload }
    }

    pub fn from_command(sequence: u32, command: &Command) -> Self {
        Self::new(sequence, WireCommand::from(command))
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        let payload =
            rkyv::to_bytes::<rancor::Error>(&self.payload).map_err(PacketError::Serialize)?;
        join_sections(&self.header, &payload)
    }

    /// Length-prefixed frame ready to be written to a stream.
    pub fn encode_frame(&self, max_frame_size: usize) -> Result<Vec<u8>, PacketError> {
        let body = self.serialize()?;
        if body.len() > max_frame_size || body.len() > u32::MAX as usize {
            return Err(PacketError::TooLarge {
                len: body.len(),
                max: max_frame_size,
            });
        }

        let mut frame = Vec::with_capacity(FRAME_LENGTH_PREFIX + body.len());
        frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Validates and deserializes one frame body without any protocol checks.
    pub fn deserialize(data: &[u8]) -> Result<Self, DecodeError> {
        let (header, payload) = split_sections(data)?;
        Ok(Self {
            header: read_header(header)?,
            payload: read_payload(payload)?,
        })
    }

    /// Full decode: header validation and kind lookup first, then the payload
    /// archive, then the shape checks that produce a typed command.
    pub fn decode(data: &[u8]) -> Result<(PacketHeader, Command), DecodeError> {
        let (header_bytes, payload_bytes) = split_sections(data)?;
        let header = read_header(header_bytes)?;

        if !header.is_valid() {
            return Err(DecodeError::BadHeader {
                magic: header.magic,
                version: header.version,
            });
        }

        let Some(kind) = CommandKind::from_id(header.kind) else {
            return Err(DecodeError::NoHandler { kind: header.kind });
        };

        let payload = read_payload(payload_bytes)?;
        if kind != payload.kind() {
            return Err(DecodeError::KindMismatch {
                header: kind,
                payload: payload.kind(),
            });
        }

        let command = Command::try_from(payload)?;
        Ok((header, command))
    }
}

fn join_sections(header: &PacketHeader, payload: &[u8]) -> Result<Vec<u8>, PacketError> {
    let header = rkyv::to_bytes::<rancor::Error>(header).map_err(PacketError::Serialize)?;

    let mut body = Vec::with_capacity(HEADER_LENGTH_PREFIX + header.len() + payload.len());
    body.extend_from_slice(&(header.len() as u32).to_be_bytes());
    body.extend_from_slice(&header);
    body.extend_from_slice(payload);
    Ok(body)
}

fn split_sections(data: &[u8]) -> Result<(&[u8], &[u8]), DecodeError> {
    if data.len() < HEADER_LENGTH_PREFIX {
        return Err(DecodeError::Truncated { len: data.len() });
    }
    let (prefix, rest) = data.split_at(HEADER_LENGTH_PREFIX);
    let header_len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if header_len > rest.len() {
        return Err(DecodeError::Truncated { len: data.len() });
    }
    Ok(rest.split_at(header_len))
}

// Archived data read off a socket has no alignment guarantee.
fn aligned(data: &[u8]) -> AlignedVec<16> {
    let mut aligned = AlignedVec::<16>::with_capacity(data.len());
    aligned.extend_from_slice(data);
    aligned
}

fn read_header(data: &[u8]) -> Result<PacketHeader, DecodeError> {
    rkyv::from_bytes::<PacketHeader, rancor::Error>(&aligned(data)).map_err(DecodeError::Malformed)
}

fn read_payload(data: &[u8]) -> Result<WireCommand, DecodeError> {
    rkyv::from_bytes::<WireCommand, rancor::Error>(&aligned(data)).map_err(DecodeError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finish_packet() -> Packet {
        Packet::new(
            3,
            WireCommand::FinishAnimation {
                experiment_name: "exp".to_string(),
                end_frame_index: 100,
            },
        )
    }

    /// Payload enum of a later protocol revision with one extra message.
    #[allow(dead_code)]
    #[derive(Archive, Serialize)]
    enum NextWireCommand {
        AddRigidBodyMesh,
        AddRigidBodyPrimitive,
        UpdateRigidBodyPose,
        SetDeformableMesh,
        SetPointCloud,
        FinishAnimation,
        SetMaterial { name: String, color: [f32; 4] },
    }

    fn next_payload() -> Vec<u8> {
        let payload = NextWireCommand::SetMaterial {
            name: "cube_a".to_string(),
            color: [1.0, 0.0, 0.0, 1.0],
        };
        rkyv::to_bytes::<rancor::Error>(&payload).unwrap().into_vec()
    }

    #[test]
    fn test_packet_serialization() {
        let packet = finish_packet();

        let serialized = packet.serialize().unwrap();
        let deserialized = Packet::deserialize(&serialized).unwrap();

        assert_eq!(packet.header, deserialized.header);
        assert_eq!(packet.payload, deserialized.payload);
    }

    #[test]
    fn test_header_kind_follows_payload() {
        let packet = finish_packet();
        assert_eq!(packet.header.kind, CommandKind::FinishAnimation.id());
        assert_eq!(packet.header.sequence, 3);
        assert!(packet.header.is_valid());
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        let mut packet = finish_packet();
        packet.header.kind = 42;

        let bytes = packet.serialize().unwrap();
        let err = Packet::decode(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::NoHandler { kind: 42 }));
        assert_eq!(err.to_string(), "no handler registered for message kind 42");
    }

    #[test]
    fn test_decode_reports_newer_message_kind() {
        let payload = next_payload();

        let bytes = join_sections(&PacketHeader::new(0, 7), &payload).unwrap();
        let err = Packet::decode(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::NoHandler { kind: 7 }));

        // Under a known kind the same payload is unreadable.
        let bytes = join_sections(&PacketHeader::new(0, 6), &payload).unwrap();
        let err = Packet::decode(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_decode_rejects_kind_mismatch() {
        let mut packet = finish_packet();
        packet.header.kind = CommandKind::SetPointCloud.id();

        let bytes = packet.serialize().unwrap();
        let err = Packet::decode(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::KindMismatch { .. }));
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut packet = finish_packet();
        packet.header.magic = 0xDEADBEEF;

        let bytes = packet.serialize().unwrap();
        let err = Packet::decode(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::BadHeader { .. }));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let header = PacketHeader::new(0, CommandKind::FinishAnimation.id());
        let bytes = join_sections(&header, &[0xFF; 24]).unwrap();
        let err = Packet::decode(&bytes).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));

        let err = Packet::decode(&[0xFF; 24]).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { len: 24 }));
        assert!(matches!(
            Packet::decode(&[0, 0]),
            Err(DecodeError::Truncated { len: 2 })
        ));
    }

    #[test]
    fn test_frame_prefix_is_body_length() {
        let packet = finish_packet();
        let frame = packet.encode_frame(DEFAULT_MAX_FRAME_SIZE).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - FRAME_LENGTH_PREFIX);

        let err = packet.encode_frame(8).unwrap_err();
        assert!(matches!(err, PacketError::TooLarge { max: 8, .. }));
    }
}

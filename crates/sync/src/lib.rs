pub mod animation;
pub mod command;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod net;
pub mod scene;

pub use animation::DanglingPrevPolicy;
pub use command::{
    AssetKind, Command, CommandKind, DecodeError, Face, Pose, PrimitiveKind, PrimitiveParams,
    ShapeFrame,
};
pub use dispatch::{Dispatcher, DispatcherConfig, Outcome};
pub use error::SceneError;
pub use host::{
    Channel, EntityHandle, HostError, MemoryHost, SceneArchive, SceneHost, ShapeKeyHandle,
};
pub use net::{
    DEFAULT_MAX_FRAME_SIZE, DEFAULT_PORT, FrameReader, FrameWriter, Inbound, Packet, PacketError,
    PacketHeader, PROTOCOL_MAGIC, PROTOCOL_VERSION,
};
pub use scene::{EntityKind, SceneEntity, SceneRegistry};

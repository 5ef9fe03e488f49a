mod protocol;
mod transport;

pub use protocol::{
    Packet, PacketError, PacketHeader, WireCommand, WirePrimitiveParam, DEFAULT_MAX_FRAME_SIZE,
    DEFAULT_PORT, FRAME_LENGTH_PREFIX, PROTOCOL_MAGIC, PROTOCOL_VERSION,
};
pub use transport::{FrameReader, FrameWriter, Inbound};

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::command::{Command, DecodeError};

use super::protocol::{
    Packet, PacketError, PacketHeader, DEFAULT_MAX_FRAME_SIZE, FRAME_LENGTH_PREFIX,
};

/// What one read off the stream produced.
#[derive(Debug)]
pub enum Inbound {
    Command {
        header: PacketHeader,
        command: Command,
        bytes: usize,
    },
    /// The frame was complete but failed validation. The stream is still in
    /// sync and the next frame can be read.
    Rejected { error: DecodeError, bytes: usize },
    /// Peer closed the stream on a frame boundary.
    Closed,
}

pub struct FrameReader<R> {
    inner: R,
    max_frame_size: usize,
    body: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_limit(inner, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_limit(inner: R, max_frame_size: usize) -> Self {
        Self {
            inner,
            max_frame_size,
            body: Vec::new(),
        }
    }

    /// Reads the next frame. `Err` means the transport itself is unusable:
    /// an I/O failure, a truncated frame, or a length prefix over the limit
    /// (the stream cannot be resynchronized past a frame that is not read).
    pub async fn next(&mut self) -> io::Result<Inbound> {
        let mut prefix = [0u8; FRAME_LENGTH_PREFIX];
        let mut filled = 0;
        while filled < FRAME_LENGTH_PREFIX {
            let n = self.inner.read(&mut prefix[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(Inbound::Closed);
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed inside a frame length prefix",
                ));
            }
            filled += n;
        }

        let len = u32::from_be_bytes(prefix) as usize;
        if len > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                DecodeError::FrameTooLarge {
                    len,
                    max: self.max_frame_size,
                },
            ));
        }

        // Grows with the bytes that actually arrive, not with the claimed length.
        self.body.clear();
        let read = (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut self.body)
            .await?;
        if read < len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("connection closed after {read} of {len} frame bytes"),
            ));
        }

        let bytes = FRAME_LENGTH_PREFIX + len;
        Ok(match Packet::decode(&self.body) {
            Ok((header, command)) => Inbound::Command {
                header,
                command,
                bytes,
            },
            Err(error) => Inbound::Rejected { error, bytes },
        })
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

pub struct FrameWriter<W> {
    inner: W,
    max_frame_size: usize,
    sequence: u32,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            sequence: 0,
        }
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub async fn send(&mut self, command: &Command) -> io::Result<usize> {
        let packet = Packet::from_command(self.sequence, command);
        let written = self.send_packet(&packet).await?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(written)
    }

    /// Writes an already-built packet as is. Used to send packets a
    /// [`Command`] cannot express, such as those from a newer protocol.
    pub async fn send_packet(&mut self, packet: &Packet) -> io::Result<usize> {
        let frame = packet
            .encode_frame(self.max_frame_size)
            .map_err(|e: PacketError| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.inner.write_all(&frame).await?;
        self.inner.flush().await?;
        Ok(frame.len())
    }

    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn short_body_does_not_reserve_claimed_length() {
        let claimed: u32 = 512 * 1024 * 1024;
        let mut wire = claimed.to_be_bytes().to_vec();
        wire.extend_from_slice(&[0u8; 16]);

        let mut reader = FrameReader::with_limit(&wire[..], claimed as usize);
        let err = reader.next().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(reader.body.capacity() < 1024 * 1024);
    }
}

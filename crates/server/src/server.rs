use std::fmt;
use std::io;
use std::net::SocketAddr;

use anyhow::{Context, Result, anyhow, bail};
use tokio::net::{TcpListener, TcpStream};

use scenelink::{CommandKind, Dispatcher, FrameReader, Inbound, Outcome, SceneHost};

use crate::config::ServerConfig;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServerStats {
    pub connections: u32,
    pub frames_received: u64,
    pub commands_applied: u64,
    pub commands_rejected: u64,
    pub bytes_received: u64,
}

impl fmt::Display for ServerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} connections, {} frames ({} bytes), {} applied, {} rejected",
            self.connections,
            self.frames_received,
            self.bytes_received,
            self.commands_applied,
            self.commands_rejected
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Finished {
        experiment_name: String,
        end_frame_index: u32,
    },
    /// Single-connection mode and the client left without finishing.
    Disconnected,
}

enum SessionEnd {
    Finished {
        experiment_name: String,
        end_frame_index: u32,
    },
    Closed,
}

pub struct SceneServer<H> {
    listener: TcpListener,
    dispatcher: Dispatcher<H>,
    config: ServerConfig,
    stats: ServerStats,
}

impl<H: SceneHost> SceneServer<H> {
    pub async fn bind(bind_addr: &str, config: ServerConfig, host: H) -> io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self {
            listener,
            dispatcher: Dispatcher::with_config(host, config.dispatcher()),
            config,
            stats: ServerStats::default(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stats(&self) -> ServerStats {
        self.stats
    }

    pub fn dispatcher(&self) -> &Dispatcher<H> {
        &self.dispatcher
    }

    /// Serves clients one at a time until the animation is finished. The
    /// scene carries over between connections.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .context("failed to accept connection")?;
            self.stats.connections += 1;
            log::info!("Client connected from {}", peer);

            match self.serve(stream).await? {
                SessionEnd::Finished {
                    experiment_name,
                    end_frame_index,
                } => {
                    return Ok(RunOutcome::Finished {
                        experiment_name,
                        end_frame_index,
                    });
                }
                SessionEnd::Closed => {
                    log::info!("Client {} disconnected", peer);
                    if self.config.single_connection {
                        return Ok(RunOutcome::Disconnected);
                    }
                }
            }
        }
    }

    async fn serve(&mut self, stream: TcpStream) -> Result<SessionEnd> {
        let mut reader = FrameReader::with_limit(stream, self.config.max_frame_size);

        loop {
            let inbound = match self.config.idle_timeout {
                Some(limit) => tokio::time::timeout(limit, reader.next())
                    .await
                    .map_err(|_| anyhow!("no frame received for {:?}", limit))?,
                None => reader.next().await,
            }
            .context("connection lost")?;

            let (header, command, bytes) = match inbound {
                Inbound::Closed => return Ok(SessionEnd::Closed),
                Inbound::Rejected { error, bytes } => {
                    self.record_frame(bytes);
                    self.stats.commands_rejected += 1;
                    log::warn!("Dropped undecodable frame: {}", error);
                    continue;
                }
                Inbound::Command {
                    header,
                    command,
                    bytes,
                } => (header, command, bytes),
            };
            self.record_frame(bytes);

            let kind = command.kind();
            let subject = command.subject().to_string();
            log::debug!("#{} {} '{}'", header.sequence, kind, subject);

            match self.dispatcher.dispatch(command) {
                Ok(Outcome::Applied { .. }) => self.stats.commands_applied += 1,
                Ok(Outcome::Finished {
                    experiment_name,
                    end_frame_index,
                }) => {
                    self.stats.commands_applied += 1;
                    return Ok(SessionEnd::Finished {
                        experiment_name,
                        end_frame_index,
                    });
                }
                Err(err) if kind == CommandKind::FinishAnimation || !err.is_recoverable() => {
                    self.stats.commands_rejected += 1;
                    bail!("{} '{}' failed: {}", kind, subject, err);
                }
                Err(err) => {
                    self.stats.commands_rejected += 1;
                    log::warn!("{} '{}' rejected: {}", kind, subject, err);
                }
            }
        }
    }

    fn record_frame(&mut self, bytes: usize) {
        self.stats.frames_received += 1;
        self.stats.bytes_received += bytes as u64;
    }
}

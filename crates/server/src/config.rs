use std::path::PathBuf;
use std::time::Duration;

use scenelink::{DEFAULT_MAX_FRAME_SIZE, DanglingPrevPolicy, DispatcherConfig};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_frame_size: usize,
    /// Read timeout per frame. `None` waits for the client indefinitely.
    pub idle_timeout: Option<Duration>,
    pub output_dir: PathBuf,
    pub dangling_prev: DanglingPrevPolicy,
    /// Exit once the first client disconnects instead of waiting for another.
    pub single_connection: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            idle_timeout: None,
            output_dir: PathBuf::from("scenes"),
            dangling_prev: DanglingPrevPolicy::Reject,
            single_connection: false,
        }
    }
}

impl ServerConfig {
    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            dangling_prev: self.dangling_prev,
        }
    }
}

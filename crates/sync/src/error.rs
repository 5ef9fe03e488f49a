use crate::host::HostError;
use crate::scene::EntityKind;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("'{name}' is not known to the scene; it must be added before it can be updated")]
    UnknownEntity { name: String },
    #[error("'{name}' is a {found}, not a {expected}")]
    KindMismatch {
        name: String,
        expected: EntityKind,
        found: EntityKind,
    },
    #[error("'{name}' frame {frame_index} links to frame {prev_frame_index}, which has no shape key")]
    DanglingPrevFrame {
        name: String,
        frame_index: u32,
        prev_frame_index: u32,
    },
    #[error("scene host operation failed: {0}")]
    Host(#[from] HostError),
    #[error("animation is already finished; no further commands are accepted")]
    Finished,
}

impl SceneError {
    /// Per-command failures leave the scene consistent, so the stream can
    /// carry on with the next command.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, SceneError::Finished)
    }
}

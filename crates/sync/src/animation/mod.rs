mod deformable;
mod rigid;

pub use deformable::{DanglingPrevPolicy, ShapeFrameApplied, set_shape_frame, shape_key_tag};
pub use rigid::{add_mesh, add_primitive, update_pose};

use crate::command::is_valid_scene_name;
use crate::error::SceneError;
use crate::host::{HostError, SceneHost};

pub const ANIMATION_START_FRAME: u32 = 0;

/// Sets the playback range to `[0, end_frame_index]` and persists the scene
/// as `experiment_name`. The name is checked before the range is written,
/// and the range is written before anything is saved.
pub fn finish_animation<H: SceneHost>(
    host: &mut H,
    experiment_name: &str,
    end_frame_index: u32,
) -> Result<(), SceneError> {
    if !is_valid_scene_name(experiment_name) {
        return Err(HostError::InvalidSceneName(experiment_name.to_string()).into());
    }
    host.set_frame_range(ANIMATION_START_FRAME, end_frame_index)?;
    host.persist(experiment_name)?;
    log::info!(
        "Animation '{}' finished with frame range [{}, {}]",
        experiment_name,
        ANIMATION_START_FRAME,
        end_frame_index
    );
    Ok(())
}

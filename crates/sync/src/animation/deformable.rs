use crate::command::ShapeFrame;
use crate::error::SceneError;
use crate::host::{SceneHost, ShapeKeyHandle};
use crate::scene::{EntityKind, SceneRegistry};

/// What to do when `prev_frame_index` names a frame with no shape key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DanglingPrevPolicy {
    /// Fail the command before anything is touched.
    #[default]
    Reject,
    /// Install the frame but leave out both back-link keys.
    SkipBackLink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeFrameApplied {
    pub created: bool,
    pub shape_key: ShapeKeyHandle,
    pub linked: bool,
}

pub fn shape_key_tag(frame_index: u32) -> String {
    format!("frame_{frame_index}")
}

/// Installs one frame of deformable geometry and extends the shape-key chain.
///
/// The geometry is fully replaced, then a shape key tagged with the frame is
/// added and keyed to 1 at `frame_index`. With a previous frame, the new key
/// is keyed to 0 at the previous frame and the previous key to 0 at this
/// frame, so exactly one key shows at any time.
pub fn set_shape_frame<H: SceneHost>(
    registry: &mut SceneRegistry,
    host: &mut H,
    kind: EntityKind,
    frame: &ShapeFrame,
    policy: DanglingPrevPolicy,
) -> Result<ShapeFrameApplied, SceneError> {
    debug_assert!(kind.is_deformable());
    let name = frame.name.as_str();
    let frame_index = frame.frame_index;

    let prev_key = match frame.prev_frame_index {
        Some(prev) => resolve_prev(registry, kind, frame, prev, policy)?,
        None => None,
    };

    let (entity, created) =
        registry.create_or_get(name, kind, || host.create_mesh_object(name))?;

    host.upsert_geometry(entity.handle, &frame.vertices, &frame.faces)?;

    let key = host.add_shape_key(entity.handle, &shape_key_tag(frame_index))?;
    host.keyframe_weight(key, 1.0, frame_index)?;

    if let Some((prev, prev_key)) = prev_key {
        host.keyframe_weight(key, 0.0, prev)?;
        host.keyframe_weight(prev_key, 0.0, frame_index)?;
        entity.record_hidden(frame_index, prev);
        entity.record_hidden(prev, frame_index);
    }

    if let Some(replaced) = entity.bind_shape_key(frame_index, key) {
        // Replayed frame: the new key takes over every cut of the old one,
        // including back-links written by later frames.
        host.keyframe_weight(replaced, 0.0, frame_index)?;
        for at in entity.hidden_frames(frame_index) {
            host.keyframe_weight(key, 0.0, at)?;
        }
        log::debug!("'{}' frame {} replayed, {} silenced", name, frame_index, replaced);
    }
    entity.record_frame(frame_index);

    if created {
        log::info!(
            "Created {} '{}' with {} vertices",
            kind,
            name,
            frame.vertices.len()
        );
    }
    log::debug!(
        "'{}' frame {} installed ({} vertices, {} faces, prev {:?})",
        name,
        frame_index,
        frame.vertices.len(),
        frame.faces.len(),
        frame.prev_frame_index
    );

    Ok(ShapeFrameApplied {
        created,
        shape_key: key,
        linked: prev_key.is_some(),
    })
}

fn resolve_prev(
    registry: &SceneRegistry,
    kind: EntityKind,
    frame: &ShapeFrame,
    prev: u32,
    policy: DanglingPrevPolicy,
) -> Result<Option<(u32, ShapeKeyHandle)>, SceneError> {
    let entity = registry.lookup(&frame.name);

    if let Some(entity) = entity {
        if entity.kind != kind {
            return Err(SceneError::KindMismatch {
                name: frame.name.clone(),
                expected: kind,
                found: entity.kind,
            });
        }
    }

    let key = entity
        .filter(|_| prev != frame.frame_index)
        .and_then(|entity| entity.shape_key(prev));

    match (key, policy) {
        (Some(key), _) => Ok(Some((prev, key))),
        (None, DanglingPrevPolicy::Reject) => Err(SceneError::DanglingPrevFrame {
            name: frame.name.clone(),
            frame_index: frame.frame_index,
            prev_frame_index: prev,
        }),
        (None, DanglingPrevPolicy::SkipBackLink) => {
            log::warn!(
                "'{}' frame {} links to unknown frame {}, skipping back-link",
                frame.name,
                frame.frame_index,
                prev
            );
            Ok(None)
        }
    }
}

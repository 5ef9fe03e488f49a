use crate::command::{AssetKind, Pose, PrimitiveKind, PrimitiveParams};
use crate::error::SceneError;
use crate::host::{Channel, SceneHost};
use crate::scene::{EntityKind, SceneRegistry};

/// Adds an asset-backed rigid body, or re-poses it if the name is already
/// registered. Topology is only imported once.
pub fn add_mesh<H: SceneHost>(
    registry: &mut SceneRegistry,
    host: &mut H,
    name: &str,
    mesh_asset: &[u8],
    asset_kind: AssetKind,
    init_pose: &Pose,
) -> Result<bool, SceneError> {
    let (entity, created) = registry.create_or_get(name, EntityKind::RigidBody, || {
        host.import_mesh_asset(name, mesh_asset, asset_kind)
    })?;

    host.set_pose(entity.handle, init_pose)?;
    entity.pose = *init_pose;

    if created {
        log::info!("Imported {} mesh '{}' ({} bytes)", asset_kind, name, mesh_asset.len());
    } else {
        log::info!("'{}' already exists, re-applied its pose", name);
    }
    Ok(created)
}

/// Adds a procedurally built rigid body. Its pose comes from the `location`
/// and `rotation` parameters.
pub fn add_primitive<H: SceneHost>(
    registry: &mut SceneRegistry,
    host: &mut H,
    name: &str,
    primitive_kind: PrimitiveKind,
    params: &PrimitiveParams,
) -> Result<bool, SceneError> {
    let (entity, created) = registry.create_or_get(name, EntityKind::RigidBody, || {
        host.create_primitive(name, primitive_kind, params)
    })?;

    let pose = params.initial_pose();
    host.set_pose(entity.handle, &pose)?;
    entity.pose = pose;

    if created {
        log::info!("Created {} primitive '{}'", primitive_kind, name);
    } else {
        log::info!("'{}' already exists, re-applied its pose", name);
    }
    Ok(created)
}

/// Poses an existing rigid body and keys location and rotation at
/// `frame_index`. Keys at the same frame are overwritten.
pub fn update_pose<H: SceneHost>(
    registry: &mut SceneRegistry,
    host: &mut H,
    name: &str,
    pose: &Pose,
    frame_index: u32,
) -> Result<(), SceneError> {
    let entity = registry.require_kind_mut(name, EntityKind::RigidBody)?;

    host.set_pose(entity.handle, pose)?;
    host.keyframe(entity.handle, Channel::Location, frame_index)?;
    host.keyframe(entity.handle, Channel::Rotation, frame_index)?;

    entity.pose = *pose;
    entity.last_frame_index = Some(frame_index);

    log::debug!(
        "'{}' keyed at frame {}: {:?}",
        name,
        frame_index,
        pose.translation
    );
    Ok(())
}

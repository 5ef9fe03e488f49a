//! Routes decoded commands to the entity state machines.

use crate::animation::{self, DanglingPrevPolicy};
use crate::command::{Command, CommandKind};
use crate::error::SceneError;
use crate::host::SceneHost;
use crate::scene::{EntityKind, SceneRegistry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub dangling_prev: DanglingPrevPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The command mutated the scene.
    Applied { kind: CommandKind, created: bool },
    /// The scene was persisted; the stream is done.
    Finished {
        experiment_name: String,
        end_frame_index: u32,
    },
}

impl Outcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, Outcome::Finished { .. })
    }
}

/// Owns the scene registry and the host, and applies commands in arrival
/// order. Each command either applies completely or returns an error; a
/// failed command never aborts the dispatcher.
pub struct Dispatcher<H> {
    registry: SceneRegistry,
    host: H,
    config: DispatcherConfig,
    finished: bool,
}

impl<H: SceneHost> Dispatcher<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, DispatcherConfig::default())
    }

    pub fn with_config(host: H, config: DispatcherConfig) -> Self {
        Self {
            registry: SceneRegistry::new(),
            host,
            config,
            finished: false,
        }
    }

    pub fn dispatch(&mut self, command: Command) -> Result<Outcome, SceneError> {
        if self.finished {
            return Err(SceneError::Finished);
        }

        let kind = command.kind();
        let registry = &mut self.registry;
        let host = &mut self.host;

        let created = match command {
            Command::AddRigidBodyMesh {
                name,
                mesh_asset,
                asset_kind,
                init_pose,
            } => animation::add_mesh(registry, host, &name, &mesh_asset, asset_kind, &init_pose)?,
            Command::AddRigidBodyPrimitive {
                name,
                primitive_kind,
                params,
            } => animation::add_primitive(registry, host, &name, primitive_kind, &params)?,
            Command::UpdateRigidBodyPose {
                name,
                pose,
                frame_index,
            } => {
                animation::update_pose(registry, host, &name, &pose, frame_index)?;
                false
            }
            Command::SetDeformableMesh(frame) => {
                animation::set_shape_frame(
                    registry,
                    host,
                    EntityKind::DeformableMesh,
                    &frame,
                    self.config.dangling_prev,
                )?
                .created
            }
            Command::SetPointCloud(frame) => {
                animation::set_shape_frame(
                    registry,
                    host,
                    EntityKind::PointCloud,
                    &frame,
                    self.config.dangling_prev,
                )?
                .created
            }
            Command::FinishAnimation {
                experiment_name,
                end_frame_index,
            } => {
                animation::finish_animation(host, &experiment_name, end_frame_index)?;
                self.finished = true;
                return Ok(Outcome::Finished {
                    experiment_name,
                    end_frame_index,
                });
            }
        };

        Ok(Outcome::Applied { kind, created })
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn into_host(self) -> H {
        self.host
    }
}

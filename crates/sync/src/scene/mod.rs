mod entity;
mod registry;

pub use entity::{EntityKind, SceneEntity};
pub use registry::SceneRegistry;

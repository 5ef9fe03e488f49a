use anyhow::Result;
use glam::Vec3;
use rand::Rng;

use scenelink::{Command, Pose, PrimitiveKind, PrimitiveParams, ShapeFrame};

pub const CUBE_NAME: &str = "cube_a";
pub const CLOUD_NAME: &str = "cloud";
pub const GRID_RESOLUTION: usize = 100;
pub const FRAME_STEP: u32 = 10;
pub const FRAME_COUNT: u32 = 10;

const SURFACE_NOISE: f32 = 0.005;
const LAYER_OFFSET: f32 = 0.01;

/// Cube rotation per keyed frame, w-first.
#[rustfmt::skip]
const ROTATIONS: [[f32; 4]; FRAME_COUNT as usize] = [
    [1.0000,  0.0000,  0.0000,  0.0000],
    [0.6603,  0.0000,  0.0000, -0.7510],
    [0.1280,  0.0000,  0.0000,  0.9918],
    [0.8293,  0.0000,  0.0000,  0.5588],
    [0.9673, -0.0000, -0.0000, -0.2538],
    [0.4481, -0.0000, -0.0000, -0.8940],
    [0.3755,  0.0000,  0.0000,  0.9268],
    [0.9440,  0.0000,  0.0000,  0.3300],
    [0.8712, -0.0000, -0.0000, -0.4910],
    [0.2065, -0.0000, -0.0000, -0.9785],
];

/// Unit square grid with a little noise, doubled into a second layer just
/// below the first.
pub fn noisy_surface<R: Rng>(rng: &mut R, resolution: usize) -> Vec<Vec3> {
    let step = if resolution > 1 {
        1.0 / (resolution - 1) as f32
    } else {
        0.0
    };

    let mut top = Vec::with_capacity(resolution * resolution);
    for row in 0..resolution {
        for col in 0..resolution {
            let base = Vec3::new(col as f32 * step, row as f32 * step, 0.0);
            let noise = Vec3::new(rng.r#gen(), rng.r#gen(), rng.r#gen()) * SURFACE_NOISE;
            top.push(base + noise);
        }
    }

    let bottom: Vec<Vec3> = top
        .iter()
        .map(|v| *v - Vec3::new(0.0, 0.0, LAYER_OFFSET))
        .collect();
    top.extend(bottom);
    top
}

/// A cube keyed through ten poses next to a point cloud drifting over ten
/// chained frames, then finished as `experiment_name`.
pub fn demo_sequence<R: Rng>(
    rng: &mut R,
    experiment_name: &str,
    end_frame_index: u32,
) -> Result<Vec<Command>> {
    let mut commands = Vec::with_capacity(2 + 2 * FRAME_COUNT as usize);

    commands.push(Command::AddRigidBodyPrimitive {
        name: CUBE_NAME.to_string(),
        primitive_kind: PrimitiveKind::Cube,
        params: PrimitiveParams {
            size: 1.0,
            location: Vec3::new(0.0, 0.1, 0.0),
            rotation: Vec3::new(0.0, 0.0, 0.6),
            scale: Vec3::new(0.2, 0.2, 1.0),
            ..PrimitiveParams::default()
        },
    });

    let surface = noisy_surface(rng, GRID_RESOLUTION);
    let mut prev_frame_index = None;

    for (i, rotation) in ROTATIONS.iter().enumerate() {
        let frame_index = i as u32 * FRAME_STEP;
        let shift = Vec3::splat(frame_index as f32 / FRAME_STEP as f32);

        commands.push(Command::SetPointCloud(ShapeFrame {
            name: CLOUD_NAME.to_string(),
            vertices: surface.iter().map(|v| *v + shift).collect(),
            faces: Vec::new(),
            frame_index,
            prev_frame_index,
        }));

        let [w, x, y, z] = *rotation;
        let pose = Pose::from_slice(&[0.0, 0.0, 0.1 + 0.01 * frame_index as f32, w, x, y, z])?;
        commands.push(Command::UpdateRigidBodyPose {
            name: CUBE_NAME.to_string(),
            pose,
            frame_index,
        });

        prev_frame_index = Some(frame_index);
    }

    commands.push(Command::FinishAnimation {
        experiment_name: experiment_name.to_string(),
        end_frame_index,
    });

    Ok(commands)
}

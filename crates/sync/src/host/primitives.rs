use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::command::{Face, PrimitiveKind, PrimitiveParams};

/// Procedural geometry for a primitive, with `params.scale` baked in.
pub fn build_primitive(kind: PrimitiveKind, params: &PrimitiveParams) -> (Vec<Vec3>, Vec<Face>) {
    let (mut vertices, faces) = match kind {
        PrimitiveKind::Cube => cube(params.size),
        PrimitiveKind::Plane => plane(params.size),
        PrimitiveKind::UvSphere => uv_sphere(params.radius, params.segments, params.rings),
        PrimitiveKind::IcoSphere => ico_sphere(params.radius),
        PrimitiveKind::Cylinder => cylinder(params.radius, params.depth, params.segments),
        PrimitiveKind::Cone => cone(params.radius, params.depth, params.segments),
    };

    for vertex in &mut vertices {
        *vertex *= params.scale;
    }

    (vertices, faces)
}

fn cube(size: f32) -> (Vec<Vec3>, Vec<Face>) {
    let h = size * 0.5;
    let vertices = vec![
        Vec3::new(-h, -h, h),
        Vec3::new(h, -h, h),
        Vec3::new(h, h, h),
        Vec3::new(-h, h, h),
        Vec3::new(-h, -h, -h),
        Vec3::new(h, -h, -h),
        Vec3::new(h, h, -h),
        Vec3::new(-h, h, -h),
    ];

    #[rustfmt::skip]
    let faces = vec![
        vec![0, 1, 2, 3], // +Z
        vec![4, 7, 6, 5], // -Z
        vec![3, 2, 6, 7], // +Y
        vec![0, 4, 5, 1], // -Y
        vec![1, 5, 6, 2], // +X
        vec![0, 3, 7, 4], // -X
    ];

    (vertices, faces)
}

fn plane(size: f32) -> (Vec<Vec3>, Vec<Face>) {
    let h = size * 0.5;
    let vertices = vec![
        Vec3::new(-h, -h, 0.0),
        Vec3::new(h, -h, 0.0),
        Vec3::new(h, h, 0.0),
        Vec3::new(-h, h, 0.0),
    ];
    (vertices, vec![vec![0, 1, 2, 3]])
}

fn ring(radius: f32, z: f32, segments: u32) -> impl Iterator<Item = Vec3> {
    let step = TAU / segments as f32;
    (0..segments).map(move |j| {
        let angle = j as f32 * step;
        Vec3::new(radius * angle.cos(), radius * angle.sin(), z)
    })
}

fn uv_sphere(radius: f32, segments: u32, rings: u32) -> (Vec<Vec3>, Vec<Face>) {
    let mut vertices = vec![Vec3::new(0.0, 0.0, radius)];
    let stack_step = PI / rings as f32;

    for i in 1..rings {
        let stack_angle = PI / 2.0 - i as f32 * stack_step;
        vertices.extend(ring(
            radius * stack_angle.cos(),
            radius * stack_angle.sin(),
            segments,
        ));
    }
    let south = vertices.len() as u32;
    vertices.push(Vec3::new(0.0, 0.0, -radius));

    let loop_start = |i: u32| 1 + i * segments;
    let mut faces = Vec::new();

    for j in 0..segments {
        let next = (j + 1) % segments;
        faces.push(vec![0, loop_start(0) + j, loop_start(0) + next]);
    }

    for i in 0..rings.saturating_sub(2) {
        let top = loop_start(i);
        let bottom = loop_start(i + 1);
        for j in 0..segments {
            let next = (j + 1) % segments;
            faces.push(vec![top + j, bottom + j, bottom + next, top + next]);
        }
    }

    let last = loop_start(rings - 2);
    for j in 0..segments {
        let next = (j + 1) % segments;
        faces.push(vec![south, last + next, last + j]);
    }

    (vertices, faces)
}

fn ico_sphere(radius: f32) -> (Vec<Vec3>, Vec<Face>) {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;

    #[rustfmt::skip]
    let corners = [
        (-1.0, t, 0.0), (1.0, t, 0.0), (-1.0, -t, 0.0), (1.0, -t, 0.0),
        (0.0, -1.0, t), (0.0, 1.0, t), (0.0, -1.0, -t), (0.0, 1.0, -t),
        (t, 0.0, -1.0), (t, 0.0, 1.0), (-t, 0.0, -1.0), (-t, 0.0, 1.0),
    ];
    let vertices = corners
        .iter()
        .map(|&(x, y, z)| Vec3::new(x, y, z).normalize() * radius)
        .collect();

    #[rustfmt::skip]
    let triangles: [[u32; 3]; 20] = [
        [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
        [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
        [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
        [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
    ];

    (vertices, triangles.iter().map(|t| t.to_vec()).collect())
}

fn cylinder(radius: f32, depth: f32, segments: u32) -> (Vec<Vec3>, Vec<Face>) {
    let h = depth * 0.5;
    let mut vertices: Vec<Vec3> = ring(radius, h, segments).collect();
    vertices.extend(ring(radius, -h, segments));

    let mut faces = Vec::with_capacity(segments as usize + 2);
    for j in 0..segments {
        let next = (j + 1) % segments;
        faces.push(vec![j, segments + j, segments + next, next]);
    }
    faces.push((0..segments).collect());
    faces.push((segments..2 * segments).rev().collect());

    (vertices, faces)
}

fn cone(radius: f32, depth: f32, segments: u32) -> (Vec<Vec3>, Vec<Face>) {
    let h = depth * 0.5;
    let mut vertices: Vec<Vec3> = ring(radius, -h, segments).collect();
    let apex = vertices.len() as u32;
    vertices.push(Vec3::new(0.0, 0.0, h));

    let mut faces = Vec::with_capacity(segments as usize + 1);
    for j in 0..segments {
        faces.push(vec![j, (j + 1) % segments, apex]);
    }
    faces.push((0..segments).rev().collect());

    (vertices, faces)
}

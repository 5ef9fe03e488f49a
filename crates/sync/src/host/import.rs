use glam::Vec3;
use gltf::mesh::Mode;

use crate::command::{AssetKind, Face};

use super::HostError;

/// Geometry pulled out of an imported asset.
#[derive(Debug, Default)]
pub(super) struct ImportedMesh {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<Face>,
}

/// Collada is kept as an opaque blob; only glTF geometry is read.
pub(super) fn import_asset(bytes: &[u8], kind: AssetKind) -> Result<ImportedMesh, HostError> {
    match kind {
        AssetKind::Collada => {
            if bytes.is_empty() {
                return Err(import_error(kind, "asset is empty"));
            }
            Ok(ImportedMesh::default())
        }
        AssetKind::Gltf | AssetKind::Glb => import_gltf(bytes, kind),
    }
}

fn import_error(kind: AssetKind, reason: impl Into<String>) -> HostError {
    HostError::Import {
        kind,
        reason: reason.into(),
    }
}

fn import_gltf(bytes: &[u8], kind: AssetKind) -> Result<ImportedMesh, HostError> {
    let gltf =
        gltf::Gltf::from_slice(bytes).map_err(|e| import_error(kind, e.to_string()))?;

    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_ref()
                    .ok_or_else(|| import_error(kind, "GLB missing binary blob"))?;
                buffer_data.push(blob.clone());
            }
            gltf::buffer::Source::Uri(_) => {
                return Err(import_error(
                    kind,
                    "external buffer URIs not supported, use GLB format",
                ));
            }
        }
    }

    let mut mesh = ImportedMesh::default();
    for gltf_mesh in gltf.meshes() {
        for primitive in gltf_mesh.primitives() {
            let reader =
                primitive.reader(|buffer| buffer_data.get(buffer.index()).map(Vec::as_slice));

            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .ok_or_else(|| import_error(kind, "mesh primitive missing positions"))?
                .collect();

            let base = u32::try_from(mesh.vertices.len())
                .map_err(|_| import_error(kind, "too many vertices"))?;
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };

            let triangles = triangulate(primitive.mode(), &indices).ok_or_else(|| {
                import_error(
                    kind,
                    format!("unsupported primitive mode {:?}", primitive.mode()),
                )
            })?;
            let faces = offset_faces(&triangles, base, positions.len())
                .map_err(|reason| import_error(kind, reason))?;

            mesh.vertices
                .extend(positions.iter().map(|&p| Vec3::from_array(p)));
            mesh.faces.extend(faces);
        }
    }

    log::debug!(
        "imported {} asset: {} vertices, {} faces",
        kind,
        mesh.vertices.len(),
        mesh.faces.len()
    );

    Ok(mesh)
}

/// Splits an index list into triangles. Point and line modes have none.
fn triangulate(mode: Mode, indices: &[u32]) -> Option<Vec<[u32; 3]>> {
    let triangles: Vec<[u32; 3]> = match mode {
        Mode::Triangles => indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect(),
        Mode::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(i, t)| if i % 2 == 0 { [t[0], t[1], t[2]] } else { [t[0], t[2], t[1]] })
            .collect(),
        Mode::TriangleFan => match indices.split_first() {
            Some((&hub, rest)) => rest.windows(2).map(|w| [hub, w[0], w[1]]).collect(),
            None => Vec::new(),
        },
        Mode::Points | Mode::Lines | Mode::LineLoop | Mode::LineStrip => return None,
    };
    Some(triangles)
}

fn offset_faces(
    triangles: &[[u32; 3]],
    base: u32,
    vertex_count: usize,
) -> Result<Vec<Face>, String> {
    triangles
        .iter()
        .map(|triangle| {
            triangle
                .iter()
                .map(|&index| {
                    if index as usize >= vertex_count {
                        return Err(format!(
                            "index {index} out of range for {vertex_count} vertices"
                        ));
                    }
                    base.checked_add(index)
                        .ok_or_else(|| "vertex index overflows u32".to_string())
                })
                .collect::<Result<Face, String>>()
        })
        .collect()
}

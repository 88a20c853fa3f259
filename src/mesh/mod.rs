pub mod blend_shape;
pub mod partition;
pub mod source;
pub mod weights;
pub mod weld;

use cgmath::Vector3;
use serde::{Deserialize, Serialize};

use crate::math::{normal_matrix, transform_normal, transform_point, Point4};

use self::{source::SourceMesh, weights::WeightAssigner};

/// Bone influences a vertex can carry.
pub const MAX_INFLUENCES: usize = 4;

const DEFAULT_NORMAL: [f64; 3] = [0.0, 0.0, 0.0];
const DEFAULT_UV: [f64; 2] = [0.0, 0.0];
const DEFAULT_COLOR: [f64; 4] = [1.0, 1.0, 1.0, 1.0];

/// Output vertex of the model format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Homogeneous world-space position.
    pub position: [f32; 4],
    pub normal: [f32; 3],
    /// Two UV channels packed as `(u1, v1, u2, v2)`, V already negated.
    pub uv: [f32; 4],
    pub color: [f32; 4],
    /// Zero wherever there is no influence. Not normalized.
    pub blend_weights: [f32; 4],
    /// Indices into the owning group's bone table.
    pub blend_indices: [u8; 4],
}

impl Vertex {
    /// A vertex that only carries a position, as stored for blend-shape replacements.
    pub fn from_position(position: Point4) -> Self {
        Self {
            position: point_to_f32(position),
            ..Default::default()
        }
    }

    pub fn position_f64(&self) -> Point4 {
        let p = self.position;
        Point4::new(p[0] as f64, p[1] as f64, p[2] as f64, p[3] as f64)
    }
}

pub fn point_to_f32(p: Point4) -> [f32; 4] {
    [p.x as f32, p.y as f32, p.z as f32, p.w as f32]
}

/// Builds the candidate vertex of every corner of `mesh`.
///
/// `positions` are the (possibly deformed) control points in the mesh's local space.
/// Normals, UVs and colors are resolved per corner from the mesh layers; layer 0
/// supplies normals, the first UV channel and colors, layer 1 the second UV channel.
pub fn corner_vertices(mesh: &SourceMesh, positions: &[Point4], weights: &WeightAssigner) -> Vec<Vertex> {
    let normal_matrix = normal_matrix(&mesh.global_transform);
    let corner_polygons = mesh.corner_polygons();
    let layer0 = mesh.layer(0);
    let layer1 = mesh.layer(1);

    mesh.polygon_vertices
        .iter()
        .enumerate()
        .map(|(corner, &control_point)| {
            let polygon = corner_polygons.get(corner).copied().unwrap_or_default();

            let normal = layer0
                .and_then(|l| l.normals.as_ref())
                .and_then(|e| e.value(corner, polygon, control_point))
                .unwrap_or(DEFAULT_NORMAL);
            let uv1 = layer0
                .and_then(|l| l.uvs.as_ref())
                .and_then(|e| e.value(corner, polygon, control_point))
                .unwrap_or(DEFAULT_UV);
            let uv2 = layer1
                .and_then(|l| l.uvs.as_ref())
                .and_then(|e| e.value(corner, polygon, control_point))
                .unwrap_or(DEFAULT_UV);
            let color = layer0
                .and_then(|l| l.colors.as_ref())
                .and_then(|e| e.value(corner, polygon, control_point))
                .unwrap_or(DEFAULT_COLOR);

            let position = transform_point(&mesh.global_transform, positions[control_point]);
            let normal = transform_normal(&normal_matrix, Vector3::from(normal));

            let mut vertex = Vertex {
                position: point_to_f32(position),
                normal: [normal.x as f32, normal.y as f32, normal.z as f32],
                uv: [uv1[0] as f32, -uv1[1] as f32, uv2[0] as f32, -uv2[1] as f32],
                color: color.map(|c| c as f32),
                blend_weights: [0.0; 4],
                blend_indices: [0; 4],
            };
            weights.apply(control_point, &mut vertex);
            vertex
        })
        .collect()
}

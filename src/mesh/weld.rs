use std::collections::BTreeMap;

use crate::error::MeshError;

use super::Vertex;

/// Control point id to the welded vertex ids it produced, in creation order.
pub type WeldMap = BTreeMap<usize, Vec<u32>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeldedMesh {
    pub vertices: Vec<Vertex>,
    /// One entry per input corner.
    pub indices: Vec<u32>,
    pub weld_map: WeldMap,
}

/// Corner indices referencing each control point, ascending.
pub fn corners_by_control_point(
    corner_control_points: &[usize],
    control_point_count: usize,
) -> Result<Vec<Vec<usize>>, MeshError> {
    let mut buckets = vec![Vec::new(); control_point_count];
    for (corner, &control_point) in corner_control_points.iter().enumerate() {
        let bucket = buckets
            .get_mut(control_point)
            .ok_or(MeshError::ControlPointOutOfRange {
                corner,
                control_point,
                count: control_point_count,
            })?;
        bucket.push(corner);
    }
    Ok(buckets)
}

/// Deduplicates the corner stream of one triangulated mesh.
///
/// `corner_vertices[i]` is the candidate vertex built for corner `i`, whose control
/// point is `corner_control_points[i]`. Control points are visited in ascending order
/// and each corner reuses the first vertex already accepted for the same control
/// point whose position is identical; normal, UV and color are not compared.
pub fn weld_corners(
    corner_vertices: &[Vertex],
    corner_control_points: &[usize],
    control_point_count: usize,
) -> Result<WeldedMesh, MeshError> {
    let corner_count = corner_control_points.len();
    if control_point_count == 0 || corner_count == 0 {
        return Err(MeshError::Empty);
    }
    if corner_count % 3 != 0 {
        return Err(MeshError::NotTriangulated {
            corners: corner_count,
            polygons: corner_count / 3,
        });
    }
    debug_assert_eq!(corner_vertices.len(), corner_count);

    let buckets = corners_by_control_point(corner_control_points, control_point_count)?;

    let mut vertices: Vec<Vertex> = Vec::with_capacity(corner_count);
    let mut indices = vec![0u32; corner_count];
    let mut weld_map = WeldMap::new();

    for (control_point, corners) in buckets.iter().enumerate() {
        if corners.is_empty() {
            continue;
        }

        let mut accepted: Vec<u32> = Vec::new();
        for &corner in corners {
            let candidate = &corner_vertices[corner];
            let existing = accepted
                .iter()
                .copied()
                .find(|&id| vertices[id as usize].position == candidate.position);

            let id = match existing {
                Some(id) => id,
                None => {
                    let id = vertices.len() as u32;
                    vertices.push(*candidate);
                    accepted.push(id);
                    id
                }
            };
            indices[corner] = id;
        }
        weld_map.insert(control_point, accepted);
    }

    log::debug!(
        "Welded {} corners into {} vertices",
        corner_count,
        vertices.len()
    );

    Ok(WeldedMesh {
        vertices,
        indices,
        weld_map,
    })
}

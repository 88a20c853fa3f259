use std::collections::HashMap;

use crate::{
    diagnostics::ConversionReport,
    error::PartitionError,
    model::{MeshGroup, Shape},
};

use super::Vertex;

/// A shape re-expressed against a partitioned submesh: one vertex per local vertex,
/// shaped where the shape applies and the base vertex elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionedShape {
    pub name: String,
    pub vertices: Vec<Vertex>,
}

/// One submesh cut out of its group with its own compact vertex list.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionedSubmesh {
    pub vertices: Vec<Vertex>,
    /// Group vertex id of every local vertex.
    pub source_vertex_ids: Vec<u32>,
    /// Local indices, same length as the submesh window.
    pub indices: Vec<u32>,
    pub shapes: Vec<PartitionedShape>,
}

/// Collects the vertices referenced by submesh `submesh` of `group` in first-seen
/// order and rewrites its indices against them.
///
/// Group shapes touching the submesh are replayed from the highest
/// `values_start_index` down. Each one only claims index positions in
/// `[values_start_index, next higher start)`, so shapes sharing a start share
/// their range. A shape left with nothing to claim, or whose vertex list cannot
/// be lined up with the submesh's, is reported and left out.
pub fn partition_submesh(
    group: &MeshGroup,
    submesh: usize,
    report: &mut ConversionReport,
) -> Result<PartitionedSubmesh, PartitionError> {
    let window = group.submesh_window(submesh)?;
    let window_start = group.submeshes[submesh].index_offset as usize;
    let in_window = window_start..window_start + window.len();

    let mut remap: HashMap<u32, u32> = HashMap::new();
    let mut source_vertex_ids = vec![];
    let mut vertices = vec![];
    let mut indices = Vec::with_capacity(window.len());

    for (position, &vertex_id) in group.indices[window.clone()].iter().enumerate() {
        let local = match remap.get(&vertex_id) {
            Some(&local) => local,
            None => {
                let vertex = group.vertices.get(vertex_id as usize).ok_or(
                    PartitionError::VertexOutOfRange {
                        index: window.start + position,
                        vertex: vertex_id,
                        count: group.vertices.len(),
                    },
                )?;
                let local = source_vertex_ids.len() as u32;
                remap.insert(vertex_id, local);
                source_vertex_ids.push(vertex_id);
                vertices.push(*vertex);
                local
            }
        };
        indices.push(local);
    }

    let mut overlapping: Vec<&Shape> = group
        .shapes
        .iter()
        .filter(|shape| {
            shape
                .values
                .iter()
                .any(|v| in_window.contains(&(v.offset as usize)))
        })
        .collect();
    overlapping.sort_by(|a, b| b.values_start_index.cmp(&a.values_start_index));

    let scope = format!("group {} submesh {}", group.index, submesh);
    let mut shapes = vec![];
    let mut current_start = u32::MAX;
    let mut claimed_from = u32::MAX;

    for shape in overlapping {
        if shape.values_start_index < current_start {
            claimed_from = current_start;
            current_start = shape.values_start_index;
        }
        let claim = shape.values_start_index..claimed_from;

        let mut replacements: HashMap<u32, u32> = HashMap::new();
        for value in &shape.values {
            let offset = value.offset as usize;
            if !claim.contains(&value.offset) || !in_window.contains(&offset) {
                continue;
            }
            replacements.insert(indices[offset - window_start], value.replacement);
        }

        if replacements.is_empty() {
            report.warning(
                "SHAPE_FULLY_CLAIMED",
                format!("{}/{}", scope, shape.name),
                format!(
                    "every vertex of the shape lies in a range claimed by a shape starting above {}",
                    shape.values_start_index
                ),
            );
            continue;
        }

        let shape_vertices: Vec<Vertex> = vertices
            .iter()
            .enumerate()
            .filter_map(|(local, base)| match replacements.get(&(local as u32)) {
                Some(&replacement) => group.vertices.get(replacement as usize).copied(),
                None => Some(*base),
            })
            .collect();

        if shape_vertices.len() != vertices.len() {
            report.warning(
                "SHAPE_VERTEX_MISMATCH",
                format!("{}/{}", scope, shape.name),
                format!(
                    "shape resolves {} vertices but the submesh has {}",
                    shape_vertices.len(),
                    vertices.len()
                ),
            );
            continue;
        }

        shapes.push(PartitionedShape {
            name: shape.name.clone(),
            vertices: shape_vertices,
        });
    }

    Ok(PartitionedSubmesh {
        vertices,
        source_vertex_ids,
        indices,
        shapes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ShapeValue, Submesh};

    fn vertex(x: f32) -> Vertex {
        Vertex {
            position: [x, 0.0, 0.0, 1.0],
            ..Default::default()
        }
    }

    fn two_part_group() -> MeshGroup {
        MeshGroup {
            index: 0,
            vertices: (0..6).map(|i| vertex(i as f32)).collect(),
            indices: vec![0, 1, 2, 2, 1, 0, 3, 4, 5, 5, 4, 3],
            submeshes: vec![
                Submesh { index_offset: 0, index_count: 6 },
                Submesh { index_offset: 6, index_count: 6 },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn local_indices_follow_first_use() {
        let group = two_part_group();
        let mut report = ConversionReport::new();
        let part = partition_submesh(&group, 1, &mut report).unwrap();

        assert_eq!(part.source_vertex_ids, [3, 4, 5]);
        assert_eq!(part.indices, [0, 1, 2, 2, 1, 0]);
        assert_eq!(part.vertices[0].position[0], 3.0);
    }

    #[test]
    fn unresolved_replacement_rejects_shape() {
        let mut group = two_part_group();
        group.shapes.push(Shape {
            name: "shp_broken".to_string(),
            values_start_index: 0,
            values: vec![ShapeValue { offset: 1, replacement: 99 }],
        });

        let mut report = ConversionReport::new();
        let part = partition_submesh(&group, 0, &mut report).unwrap();
        assert!(part.shapes.is_empty());
        assert!(report.has_code("SHAPE_VERTEX_MISMATCH"));
    }

    #[test]
    fn shape_outside_window_is_ignored() {
        let mut group = two_part_group();
        group.vertices.push(vertex(42.0));
        group.shapes.push(Shape {
            name: "shp_other_part".to_string(),
            values_start_index: 6,
            values: vec![ShapeValue { offset: 7, replacement: 6 }],
        });

        let mut report = ConversionReport::new();
        let first = partition_submesh(&group, 0, &mut report).unwrap();
        assert!(first.shapes.is_empty());

        let second = partition_submesh(&group, 1, &mut report).unwrap();
        assert_eq!(second.shapes.len(), 1);
        assert_eq!(second.shapes[0].vertices[1].position[0], 42.0);
        assert_eq!(second.shapes[0].vertices[0], second.vertices[0]);
        assert!(report.is_clean());
    }

    #[test]
    fn shapes_with_equal_start_share_their_range() {
        let mut group = two_part_group();
        group.vertices.push(vertex(10.0)); // 6
        group.vertices.push(vertex(20.0)); // 7
        for (name, offset, replacement) in [("shp_a", 0, 6), ("shp_b", 2, 7)] {
            group.shapes.push(Shape {
                name: name.to_string(),
                values_start_index: 0,
                values: vec![ShapeValue { offset, replacement }],
            });
        }

        let mut report = ConversionReport::new();
        let part = partition_submesh(&group, 0, &mut report).unwrap();
        assert!(report.is_clean());

        let names: Vec<&str> = part.shapes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["shp_a", "shp_b"]);
        assert_eq!(part.shapes[0].vertices[0].position[0], 10.0);
        assert_eq!(part.shapes[1].vertices[2].position[0], 20.0);
        assert_eq!(part.shapes[1].vertices[0].position[0], 0.0);
    }

    #[test]
    fn shape_with_nothing_left_to_claim_is_reported() {
        let mut group = two_part_group();
        group.vertices.push(vertex(10.0));
        group.shapes.push(Shape {
            name: "shp_upper".to_string(),
            values_start_index: 3,
            values: vec![ShapeValue { offset: 4, replacement: 6 }],
        });
        group.shapes.push(Shape {
            name: "shp_lower".to_string(),
            values_start_index: 0,
            values: vec![ShapeValue { offset: 4, replacement: 6 }],
        });

        let mut report = ConversionReport::new();
        let part = partition_submesh(&group, 0, &mut report).unwrap();
        assert_eq!(part.shapes.len(), 1);
        assert_eq!(part.shapes[0].name, "shp_upper");
        assert_eq!(report.count_code("SHAPE_FULLY_CLAIMED"), 1);
    }

    #[test]
    fn oversized_window_is_rejected_without_overflow() {
        let mut group = two_part_group();
        group.submeshes[1].index_count = u32::MAX;
        let mut report = ConversionReport::new();
        assert!(matches!(
            partition_submesh(&group, 1, &mut report),
            Err(PartitionError::WindowOutOfRange { .. })
        ));
    }

    #[test]
    fn bad_vertex_reference_is_an_error() {
        let mut group = two_part_group();
        group.indices[4] = 77;
        let mut report = ConversionReport::new();
        assert_eq!(
            partition_submesh(&group, 0, &mut report),
            Err(PartitionError::VertexOutOfRange { index: 4, vertex: 77, count: 6 })
        );
    }
}

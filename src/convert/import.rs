use crate::{
    diagnostics::ConversionReport,
    error::MeshError,
    mesh::{
        blend_shape::{self, WeldedShape},
        corner_vertices,
        source::{SourceMesh, SourceScene},
        weights::{BoneTable, WeightAssigner},
        weld::{self, WeldedMesh},
        MAX_INFLUENCES,
    },
    model::{MeshGroup, Model},
};

use super::{context::ConversionContext, options::ConvertOptions};

/// A source mesh ready to be appended to its group.
#[derive(Debug, Clone)]
pub struct BuiltSubmesh {
    pub welded: WeldedMesh,
    pub shapes: Vec<WeldedShape>,
    /// The group's bone table extended with this mesh's bones.
    pub bone_table: BoneTable,
}

/// Converts every registered mesh of `scene` into mesh groups.
///
/// A mesh that cannot be converted is reported and skipped; groups left without
/// any part are dropped.
pub fn import_scene(
    scene: &SourceScene,
    options: &ConvertOptions,
    report: &mut ConversionReport,
) -> anyhow::Result<Model> {
    let mut context = ConversionContext::new()?;
    context.register_scene(scene, report);

    let mut model = Model::default();
    for (group_index, parts) in context.groups() {
        let mut group = MeshGroup::new(group_index);

        for (part_index, node) in parts {
            let Some(mesh) = node.mesh.as_ref() else {
                continue;
            };
            log::info!("Processing mesh {} as part {}.{}", node.name, group_index, part_index);

            match build_submesh(mesh, &group.bone_table, options, report) {
                Ok(built) => {
                    group.bone_table = built.bone_table;
                    group.append_submesh(built.welded, built.shapes);
                }
                Err(e) => report.error(e.code(), node.name.clone(), format!("mesh skipped: {}", e)),
            }
        }

        if group.submeshes.is_empty() {
            log::warn!("Group {} has no usable parts", group_index);
            continue;
        }
        model.groups.push(group);
    }

    log::info!(
        "Imported {} mesh groups ({} errors, {} warnings)",
        model.groups.len(),
        report.error_count,
        report.warning_count
    );
    Ok(model)
}

/// Runs one source mesh through weights, blend shapes and welding.
pub fn build_submesh(
    mesh: &SourceMesh,
    bone_table: &BoneTable,
    options: &ConvertOptions,
    report: &mut ConversionReport,
) -> Result<BuiltSubmesh, MeshError> {
    let control_point_count = mesh.control_points.len();
    if control_point_count == 0 || mesh.corner_count() == 0 {
        return Err(MeshError::Empty);
    }
    if !mesh.is_triangulated() {
        return Err(MeshError::NotTriangulated {
            corners: mesh.corner_count(),
            polygons: mesh.polygon_count(),
        });
    }
    // range check before anything indexes control points by corner
    weld::corners_by_control_point(&mesh.polygon_vertices, control_point_count)?;

    let mut bone_table = bone_table.clone();
    let weights = match mesh.skin.as_ref().filter(|skin| !skin.clusters.is_empty()) {
        Some(skin) => WeightAssigner::from_skin(skin, &mut bone_table)?,
        None if options.allow_unskinned => {
            log::debug!("Mesh {} has no skin, keeping it with zero weights", mesh.name);
            WeightAssigner::new()
        }
        None => return Err(MeshError::MissingSkin),
    };

    let overflowing = weights.overflowing();
    if overflowing > 0 {
        if options.reject_weight_overflow {
            return Err(MeshError::WeightOverflow {
                control_points: overflowing,
                limit: MAX_INFLUENCES,
            });
        }
        report.warning(
            "WEIGHT_OVERFLOW",
            mesh.name.clone(),
            format!(
                "{} control points carry more than {} influences, extra weights dropped",
                overflowing, MAX_INFLUENCES
            ),
        );
    }

    let channels = blend_shape::split_channels(mesh, &options.shape_prefix, report);
    let positions = blend_shape::apply_deformers(mesh, &channels.deformers);
    let deltas = blend_shape::extract_shape_deltas(mesh, &positions, &channels.shapes, report);

    let corners = corner_vertices(mesh, &positions, &weights);
    let welded = weld::weld_corners(&corners, &mesh.polygon_vertices, control_point_count)?;
    let shapes = blend_shape::remap_through_weld(deltas, &welded.weld_map, &mesh.name, report);

    log::debug!(
        "Mesh {}: {} corners, {} vertices, {} shapes",
        mesh.name,
        welded.indices.len(),
        welded.vertices.len(),
        shapes.len()
    );

    Ok(BuiltSubmesh {
        welded,
        shapes,
        bone_table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        math::Point4,
        mesh::source::{Skin, SkinCluster, SourceNode},
    };

    fn skinned_triangle(name: &str, bone: &str) -> SourceMesh {
        let mut mesh = SourceMesh::new(
            name,
            vec![
                Point4::new(0.0, 0.0, 0.0, 1.0),
                Point4::new(1.0, 0.0, 0.0, 1.0),
                Point4::new(0.0, 1.0, 0.0, 1.0),
            ],
            vec![vec![0, 1, 2]],
        );
        mesh.skin = Some(Skin {
            clusters: vec![SkinCluster {
                bone_name: bone.to_string(),
                influences: vec![(0, 1.0), (1, 1.0), (2, 1.0)],
            }],
        });
        mesh
    }

    #[test]
    fn unskinned_mesh_follows_option() {
        let mut mesh = skinned_triangle("Body_0", "b");
        mesh.skin = None;

        let mut report = ConversionReport::new();
        let strict = ConvertOptions::default();
        assert_eq!(
            build_submesh(&mesh, &BoneTable::new(), &strict, &mut report).unwrap_err(),
            MeshError::MissingSkin
        );

        let lenient = ConvertOptions {
            allow_unskinned: true,
            ..Default::default()
        };
        let built = build_submesh(&mesh, &BoneTable::new(), &lenient, &mut report).unwrap();
        assert!(built.bone_table.is_empty());
        assert_eq!(built.welded.vertices[0].blend_weights, [0.0; 4]);
    }

    #[test]
    fn quads_are_rejected_not_repaired() {
        let mut mesh = skinned_triangle("Body_0", "b");
        mesh.control_points.push(Point4::new(1.0, 1.0, 0.0, 1.0));
        mesh.polygon_vertices = vec![0, 1, 3, 2];
        mesh.polygon_sizes = vec![4];

        let mut report = ConversionReport::new();
        let err = build_submesh(&mesh, &BoneTable::new(), &ConvertOptions::default(), &mut report)
            .unwrap_err();
        assert_eq!(err, MeshError::NotTriangulated { corners: 4, polygons: 1 });
    }

    #[test]
    fn overflow_can_be_made_fatal() {
        let mut mesh = skinned_triangle("Body_0", "b0");
        if let Some(skin) = mesh.skin.as_mut() {
            for i in 1..5 {
                skin.clusters.push(SkinCluster {
                    bone_name: format!("b{i}"),
                    influences: vec![(0, 0.1)],
                });
            }
        }

        let mut report = ConversionReport::new();
        let built = build_submesh(&mesh, &BoneTable::new(), &ConvertOptions::default(), &mut report).unwrap();
        assert_eq!(built.bone_table.len(), 5);
        assert_eq!(report.count_code("WEIGHT_OVERFLOW"), 1);

        let strict = ConvertOptions {
            reject_weight_overflow: true,
            ..Default::default()
        };
        let err = build_submesh(&mesh, &BoneTable::new(), &strict, &mut report).unwrap_err();
        assert_eq!(err, MeshError::WeightOverflow { control_points: 1, limit: 4 });
    }

    #[test]
    fn parts_of_a_group_share_buffers_and_bone_table() {
        let mut scene = SourceScene {
            nodes: vec![
                SourceNode::with_mesh(skinned_triangle("Body_0.1", "b")),
                SourceNode::with_mesh(skinned_triangle("Body_0.0", "a")),
                SourceNode::with_mesh(skinned_triangle("Empty_1", "a")),
            ],
        };
        if let Some(mesh) = scene.nodes[2].mesh.as_mut() {
            mesh.control_points.clear();
            mesh.polygon_vertices.clear();
            mesh.polygon_sizes.clear();
        }

        let mut report = ConversionReport::new();
        let model = import_scene(&scene, &ConvertOptions::default(), &mut report).unwrap();

        assert_eq!(model.groups.len(), 1);
        let group = &model.groups[0];
        assert_eq!(group.bone_table.names(), ["a", "b"]);
        assert_eq!(group.indices, [0, 1, 2, 3, 4, 5]);
        assert_eq!(group.vertices[3].blend_indices[0], 1);
        assert!(report.has_code("EMPTY_MESH"));
    }
}

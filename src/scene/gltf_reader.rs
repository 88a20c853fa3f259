use std::{collections::HashSet, path::Path};

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    diagnostics::ConversionReport,
    math::{matrix_from_column_major_f32, Point4},
    mesh::source::{
        BlendShapeChannel, LayerElement, Skin, SkinCluster, SourceLayer, SourceMesh, SourceNode,
        SourceScene, TargetShape,
    },
};

use super::gltf_writer::TargetNamesExtras;

/// Reads a `.gltf`/`.glb` file into a source scene.
pub fn load_source_scene(
    path: &Path,
    shape_prefix: &str,
    report: &mut ConversionReport,
) -> anyhow::Result<SourceScene> {
    log::info!("Trying to import scene from {}", path.display());
    let (doc, buffers, _images) = ::gltf::import(path)?;
    Ok(source_scene_from_document(&doc, &buffers, shape_prefix, report))
}

pub fn source_scene_from_document(
    doc: &::gltf::Document,
    buffers: &[::gltf::buffer::Data],
    shape_prefix: &str,
    report: &mut ConversionReport,
) -> SourceScene {
    let roots: Vec<::gltf::Node> = match doc.default_scene().or_else(|| doc.scenes().next()) {
        Some(scene) => scene.nodes().collect(),
        None => {
            let children: HashSet<usize> = doc
                .nodes()
                .flat_map(|n| n.children().map(|c| c.index()).collect::<Vec<_>>())
                .collect();
            doc.nodes().filter(|n| !children.contains(&n.index())).collect()
        }
    };

    let reader = SceneReader {
        buffers,
        shape_prefix,
    };
    SourceScene {
        nodes: roots
            .iter()
            .map(|node| reader.read_node(node, &Matrix4::identity(), report))
            .collect(),
    }
}

struct SceneReader<'a> {
    buffers: &'a [::gltf::buffer::Data],
    shape_prefix: &'a str,
}

impl SceneReader<'_> {
    fn read_node(
        &self,
        node: &::gltf::Node,
        parent_transform: &Matrix4<f64>,
        report: &mut ConversionReport,
    ) -> SourceNode {
        let global_transform =
            parent_transform * matrix_from_column_major_f32(node.transform().matrix());
        let name = node
            .name()
            .or_else(|| node.mesh().and_then(|m| m.name()))
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", node.index()));

        let mesh = node
            .mesh()
            .map(|mesh| self.read_mesh(&name, node, &mesh, global_transform, report));

        SourceNode {
            name,
            mesh,
            children: node
                .children()
                .map(|child| self.read_node(&child, &global_transform, report))
                .collect(),
        }
    }

    fn read_mesh(
        &self,
        name: &str,
        node: &::gltf::Node,
        mesh: &::gltf::Mesh,
        global_transform: Matrix4<f64>,
        report: &mut ConversionReport,
    ) -> SourceMesh {
        let mut source = SourceMesh::new(name, vec![], vec![]);
        source.global_transform = global_transform;

        let mut primitives = mesh.primitives();
        let Some(primitive) = primitives.next() else {
            return source;
        };
        let extra = primitives.count();
        if extra > 0 {
            report.warning(
                "EXTRA_PRIMITIVE",
                name,
                format!("only the first primitive is read, {} more ignored", extra),
            );
        }

        let reader = primitive.reader(|buffer| Some(&self.buffers[buffer.index()]));

        let Some(positions) = reader.read_positions() else {
            return source;
        };
        source.control_points = positions
            .map(|p| Point4::new(p[0] as f64, p[1] as f64, p[2] as f64, 1.0))
            .collect();
        let vertex_count = source.control_points.len();

        let corners: Vec<usize> = match reader.read_indices() {
            Some(indices) => indices.into_u32().map(|i| i as usize).collect(),
            None => (0..vertex_count).collect(),
        };
        if primitive.mode() == ::gltf::mesh::Mode::Triangles {
            source.polygon_sizes = vec![3; corners.len() / 3];
            if corners.len() % 3 != 0 {
                source.polygon_sizes.push(corners.len() % 3);
            }
        } else {
            source.polygon_sizes = vec![corners.len()];
        }
        source.polygon_vertices = corners;

        let normals = reader.read_normals().map(|normals| {
            LayerElement::by_control_point(
                normals
                    .map(|n| [n[0] as f64, n[1] as f64, n[2] as f64])
                    .collect(),
            )
        });
        let colors = reader.read_colors(0).map(|colors| {
            LayerElement::by_control_point(
                colors
                    .into_rgba_f32()
                    .map(|c| c.map(|v| v as f64))
                    .collect(),
            )
        });
        let uv = |set: u32| {
            reader.read_tex_coords(set).map(|uvs| {
                LayerElement::by_control_point(
                    uvs.into_f32()
                        .map(|t| [t[0] as f64, t[1] as f64])
                        .collect(),
                )
            })
        };
        source.layers = vec![
            SourceLayer {
                normals,
                uvs: uv(0),
                colors,
            },
            SourceLayer {
                normals: None,
                uvs: uv(1),
                colors: None,
            },
        ];

        if let (Some(skin), Some(joints), Some(weights)) =
            (node.skin(), reader.read_joints(0), reader.read_weights(0))
        {
            let joints: Vec<[u16; 4]> = joints.into_u16().collect();
            let weights: Vec<[f32; 4]> = weights.into_f32().collect();
            source.skin = Some(read_skin(&skin, &joints, &weights));
        }

        let target_names: Vec<String> = mesh
            .extras()
            .as_ref()
            .and_then(|e| serde_json::from_str::<TargetNamesExtras>(e.get()).ok())
            .map(|e| e.target_names)
            .unwrap_or_default();
        let morph_weights = mesh.weights().unwrap_or(&[]);

        for (i, (displacements, _, _)) in reader.read_morph_targets().enumerate() {
            let Some(displacements) = displacements else {
                continue;
            };
            let control_points = source
                .control_points
                .iter()
                .zip(displacements)
                .map(|(base, d)| base + Point4::new(d[0] as f64, d[1] as f64, d[2] as f64, 0.0))
                .collect();
            let target_name = target_names
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("{}{}", self.shape_prefix, i));

            source.blend_shapes.push(BlendShapeChannel {
                name: target_name.clone(),
                deform_percent: morph_weights.get(i).copied().unwrap_or(0.0) as f64 * 100.0,
                targets: vec![TargetShape {
                    name: target_name,
                    control_points,
                }],
            });
        }

        log::debug!(
            "Read {}: {} control points, {} corners, {} blend shape channels",
            name,
            source.control_points.len(),
            source.corner_count(),
            source.blend_shapes.len()
        );
        source
    }
}

/// One cluster per skin joint, in joint order, listing every non-zero influence.
fn read_skin(skin: &::gltf::Skin, joints: &[[u16; 4]], weights: &[[f32; 4]]) -> Skin {
    let clusters = skin
        .joints()
        .enumerate()
        .map(|(joint_index, joint)| {
            let influences = joints
                .iter()
                .zip(weights)
                .enumerate()
                .flat_map(|(control_point, (j, w))| {
                    (0..4)
                        .filter(move |&slot| j[slot] as usize == joint_index && w[slot] > 0.0)
                        .map(move |slot| (control_point, w[slot] as f64))
                })
                .collect();
            SkinCluster {
                bone_name: joint
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("joint_{}", joint.index())),
                influences,
            }
        })
        .collect();
    Skin { clusters }
}

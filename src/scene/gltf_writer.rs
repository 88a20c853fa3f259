use std::{collections::HashMap, path::Path};

use ::gltf::json as gltf;
use ::gltf::json::{
    accessor::{ComponentType, GenericComponentType},
    validation::{Checked, USize64},
    Accessor, Index,
};
use ::gltf::Semantic;
use anyhow::Context;
use base64::{prelude::BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    math::{decompose, matrix_to_column_major_f32},
    mesh::Vertex,
    skeleton::{BoneId, BoneTree},
};

use super::{ExportPart, SceneBuilder};

/// Mesh extras carrying morph target names, the convention most glTF tools read.
#[derive(Debug, Serialize, Deserialize)]
pub struct TargetNamesExtras {
    #[serde(rename = "targetNames")]
    pub target_names: Vec<String>,
}

#[derive(Default)]
struct GltfFieldsToAggregate {
    buffer: Vec<gltf::Buffer>,
    buffer_view: Vec<gltf::buffer::View>,
    accessor: Vec<Accessor>,
}

struct AccessorSpec<'a> {
    label: &'a str,
    data: &'a [u8],
    count: usize,
    component_type: ComponentType,
    type_: gltf::accessor::Type,
    target: Option<gltf::buffer::Target>,
    min_max: Option<(serde_json::Value, serde_json::Value)>,
}

impl GltfFieldsToAggregate {
    /// One buffer, one view and one accessor per attribute stream.
    fn push_accessor(&mut self, spec: AccessorSpec) -> Index<Accessor> {
        let buffer_index = self.buffer.len();
        let buffer_view_index = self.buffer_view.len();
        let accessor_index = self.accessor.len();

        self.buffer.push(gltf::Buffer {
            byte_length: USize64(spec.data.len() as u64),
            extensions: None,
            extras: None,
            name: Some(format!("{}_buffer", spec.label)),
            uri: Some(format!(
                "data:application/octet-stream;base64,{}",
                BASE64_STANDARD.encode(spec.data)
            )),
        });

        self.buffer_view.push(gltf::buffer::View {
            buffer: Index::new(buffer_index as u32),
            byte_length: USize64(spec.data.len() as u64),
            byte_offset: Some(USize64(0)),
            byte_stride: None,
            target: spec.target.map(Checked::Valid),
            extensions: None,
            extras: None,
            name: Some(format!("{}_view", spec.label)),
        });

        let (min, max) = match spec.min_max {
            Some((min, max)) => (Some(min), Some(max)),
            None => (None, None),
        };
        self.accessor.push(Accessor {
            buffer_view: Some(Index::new(buffer_view_index as u32)),
            byte_offset: Some(USize64(0)),
            component_type: Checked::Valid(GenericComponentType(spec.component_type)),
            count: USize64(spec.count as u64),
            extensions: None,
            extras: None,
            max,
            min,
            name: Some(format!("{}_accessor", spec.label)),
            normalized: false,
            sparse: None,
            type_: Checked::Valid(spec.type_),
        });

        Index::new(accessor_index as u32)
    }

    fn push_vec3(&mut self, label: &str, values: &[[f32; 3]], with_bounds: bool) -> Index<Accessor> {
        let min_max = with_bounds.then(|| bounds(values));
        self.push_accessor(AccessorSpec {
            label,
            data: bytemuck::cast_slice(values),
            count: values.len(),
            component_type: ComponentType::F32,
            type_: gltf::accessor::Type::Vec3,
            target: Some(gltf::buffer::Target::ArrayBuffer),
            min_max,
        })
    }
}

fn bounds(values: &[[f32; 3]]) -> (serde_json::Value, serde_json::Value) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for value in values {
        for axis in 0..3 {
            min[axis] = min[axis].min(value[axis]);
            max[axis] = max[axis].max(value[axis]);
        }
    }
    if values.is_empty() {
        min = [0.0; 3];
        max = [0.0; 3];
    }
    (json!(min), json!(max))
}

/// Collects a skeleton and exported parts into one self-contained glTF document.
#[derive(Default)]
pub struct GltfSceneBuilder {
    fields: GltfFieldsToAggregate,
    nodes: Vec<gltf::Node>,
    meshes: Vec<gltf::Mesh>,
    skins: Vec<gltf::Skin>,
    scene_nodes: Vec<Index<gltf::Node>>,
    joint_of_bone: HashMap<BoneId, u16>,
}

impl GltfSceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_root(self) -> gltf::Root {
        gltf::Root {
            accessors: self.fields.accessor,
            buffers: self.fields.buffer,
            buffer_views: self.fields.buffer_view,
            meshes: self.meshes,
            nodes: self.nodes,
            skins: self.skins,
            scenes: vec![gltf::Scene {
                extensions: None,
                extras: None,
                name: Some("Scene".to_string()),
                nodes: self.scene_nodes,
            }],
            scene: Some(Index::new(0)),
            ..Default::default()
        }
    }

    pub fn write_to(self, path: &Path) -> anyhow::Result<()> {
        let root = self.into_root();
        let json = serde_json::to_string_pretty(&root)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write glTF file {}", path.display()))?;
        log::info!("Wrote {}", path.display());
        Ok(())
    }

    /// Joint index and weight for one influence slot; unknown bones lose their weight.
    fn joint_and_weight(&self, part: &ExportPart, vertex: &Vertex, slot: usize) -> (u16, f32) {
        let weight = vertex.blend_weights[slot];
        if weight == 0.0 {
            return (0, 0.0);
        }
        let bone = part
            .joints
            .get(vertex.blend_indices[slot] as usize)
            .copied()
            .flatten();
        match bone.and_then(|bone| self.joint_of_bone.get(&bone)) {
            Some(&joint) => (joint, weight),
            None => (0, 0.0),
        }
    }
}

impl SceneBuilder for GltfSceneBuilder {
    fn begin_skeleton(&mut self, skeleton: &BoneTree) -> anyhow::Result<()> {
        let first_node = self.nodes.len() as u32;
        let order = skeleton.depth_first();
        let node_of_bone: HashMap<BoneId, u32> = order
            .iter()
            .enumerate()
            .map(|(slot, &bone)| (bone, first_node + slot as u32))
            .collect();

        let mut inverse_binds: Vec<[f32; 16]> = Vec::with_capacity(order.len());
        for (slot, &id) in order.iter().enumerate() {
            let bone = skeleton.bone(id);
            let pose = decompose(&bone.pose);
            let children: Vec<Index<gltf::Node>> = bone
                .children
                .iter()
                .filter_map(|child| node_of_bone.get(child))
                .map(|&node| Index::new(node))
                .collect();

            self.nodes.push(gltf::Node {
                name: Some(bone.name.clone()),
                translation: Some(pose.translation_f32()),
                rotation: Some(gltf::scene::UnitQuaternion(pose.rotation_f32())),
                scale: Some(pose.scale_f32()),
                children: (!children.is_empty()).then_some(children),
                ..Default::default()
            });

            let joint = u16::try_from(slot).context("skeleton has too many bones for glTF joints")?;
            self.joint_of_bone.insert(id, joint);
            inverse_binds.push(matrix_to_column_major_f32(&skeleton.inverse_bind_pose(id)));
        }

        let inverse_bind_matrices = self.fields.push_accessor(AccessorSpec {
            label: "inverse_bind_matrices",
            data: bytemuck::cast_slice(&inverse_binds),
            count: inverse_binds.len(),
            component_type: ComponentType::F32,
            type_: gltf::accessor::Type::Mat4,
            target: None,
            min_max: None,
        });

        let root_node = Index::new(node_of_bone[&skeleton.root()]);
        self.skins.push(gltf::Skin {
            extensions: None,
            extras: None,
            inverse_bind_matrices: Some(inverse_bind_matrices),
            joints: order.iter().map(|bone| Index::new(node_of_bone[bone])).collect(),
            name: Some("skeleton".to_string()),
            skeleton: Some(root_node),
        });
        self.scene_nodes.push(root_node);
        Ok(())
    }

    fn add_part(&mut self, part: &ExportPart) -> anyhow::Result<()> {
        let submesh = part.submesh;
        let label = format!("part_{}_{}", part.group_index, part.part_index);

        let positions: Vec<[f32; 3]> = submesh
            .vertices
            .iter()
            .map(|v| [v.position[0], v.position[1], v.position[2]])
            .collect();
        let normals: Vec<[f32; 3]> = submesh.vertices.iter().map(|v| v.normal).collect();
        let uv0: Vec<[f32; 2]> = submesh.vertices.iter().map(|v| [v.uv[0], -v.uv[1]]).collect();
        let uv1: Vec<[f32; 2]> = submesh.vertices.iter().map(|v| [v.uv[2], -v.uv[3]]).collect();
        let colors: Vec<[f32; 4]> = submesh.vertices.iter().map(|v| v.color).collect();

        let mut attributes = std::collections::BTreeMap::new();
        attributes.insert(
            Checked::Valid(Semantic::Positions),
            self.fields.push_vec3(&format!("{label}_position"), &positions, true),
        );
        attributes.insert(
            Checked::Valid(Semantic::Normals),
            self.fields.push_vec3(&format!("{label}_normal"), &normals, false),
        );
        for (set, uvs) in [(0, &uv0), (1, &uv1)] {
            let accessor = self.fields.push_accessor(AccessorSpec {
                label: &format!("{label}_texcoord_{set}"),
                data: bytemuck::cast_slice(uvs),
                count: uvs.len(),
                component_type: ComponentType::F32,
                type_: gltf::accessor::Type::Vec2,
                target: Some(gltf::buffer::Target::ArrayBuffer),
                min_max: None,
            });
            attributes.insert(Checked::Valid(Semantic::TexCoords(set)), accessor);
        }
        attributes.insert(
            Checked::Valid(Semantic::Colors(0)),
            self.fields.push_accessor(AccessorSpec {
                label: &format!("{label}_color"),
                data: bytemuck::cast_slice(&colors),
                count: colors.len(),
                component_type: ComponentType::F32,
                type_: gltf::accessor::Type::Vec4,
                target: Some(gltf::buffer::Target::ArrayBuffer),
                min_max: None,
            }),
        );

        let skin = self.skins.first().map(|_| Index::new(0));
        if skin.is_some() {
            let mut joints: Vec<[u16; 4]> = Vec::with_capacity(submesh.vertices.len());
            let mut weights: Vec<[f32; 4]> = Vec::with_capacity(submesh.vertices.len());
            for vertex in &submesh.vertices {
                let mut j = [0u16; 4];
                let mut w = [0f32; 4];
                for slot in 0..4 {
                    (j[slot], w[slot]) = self.joint_and_weight(part, vertex, slot);
                }
                joints.push(j);
                weights.push(w);
            }

            attributes.insert(
                Checked::Valid(Semantic::Joints(0)),
                self.fields.push_accessor(AccessorSpec {
                    label: &format!("{label}_joints"),
                    data: bytemuck::cast_slice(&joints),
                    count: joints.len(),
                    component_type: ComponentType::U16,
                    type_: gltf::accessor::Type::Vec4,
                    target: Some(gltf::buffer::Target::ArrayBuffer),
                    min_max: None,
                }),
            );
            attributes.insert(
                Checked::Valid(Semantic::Weights(0)),
                self.fields.push_accessor(AccessorSpec {
                    label: &format!("{label}_weights"),
                    data: bytemuck::cast_slice(&weights),
                    count: weights.len(),
                    component_type: ComponentType::F32,
                    type_: gltf::accessor::Type::Vec4,
                    target: Some(gltf::buffer::Target::ArrayBuffer),
                    min_max: None,
                }),
            );
        }

        let indices = self.fields.push_accessor(AccessorSpec {
            label: &format!("{label}_indices"),
            data: bytemuck::cast_slice(&submesh.indices),
            count: submesh.indices.len(),
            component_type: ComponentType::U32,
            type_: gltf::accessor::Type::Scalar,
            target: Some(gltf::buffer::Target::ElementArrayBuffer),
            min_max: None,
        });

        let mut targets = vec![];
        let mut target_names = vec![];
        for shape in &submesh.shapes {
            let displacements: Vec<[f32; 3]> = shape
                .vertices
                .iter()
                .zip(&submesh.vertices)
                .map(|(shaped, base)| {
                    [
                        shaped.position[0] - base.position[0],
                        shaped.position[1] - base.position[1],
                        shaped.position[2] - base.position[2],
                    ]
                })
                .collect();
            let accessor = self.fields.push_vec3(
                &format!("{label}_target_{}", targets.len()),
                &displacements,
                true,
            );
            targets.push(gltf::mesh::MorphTarget {
                positions: Some(accessor),
                normals: None,
                tangents: None,
            });
            target_names.push(shape.name.clone());
        }

        let (extras, weights) = if targets.is_empty() {
            (None, None)
        } else {
            let extras = serde_json::value::to_raw_value(&TargetNamesExtras {
                target_names,
            })?;
            (Some(extras), Some(vec![0.0; targets.len()]))
        };

        let mesh_index = self.meshes.len() as u32;
        self.meshes.push(gltf::Mesh {
            extensions: None,
            extras,
            name: Some(part.name.clone()),
            primitives: vec![gltf::mesh::Primitive {
                attributes,
                extensions: None,
                extras: None,
                indices: Some(indices),
                material: None,
                mode: Checked::Valid(gltf::mesh::Mode::Triangles),
                targets: (!targets.is_empty()).then_some(targets),
            }],
            weights,
        });

        let node_index = self.nodes.len() as u32;
        self.nodes.push(gltf::Node {
            name: Some(part.name.clone()),
            mesh: Some(Index::new(mesh_index)),
            skin,
            ..Default::default()
        });
        self.scene_nodes.push(Index::new(node_index));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::ConversionReport,
        mesh::partition::{PartitionedShape, PartitionedSubmesh},
        skeleton::{SkeletonRecord, DEFAULT_ROOT_BONE_NAME},
    };

    fn skeleton() -> BoneTree {
        let translated = |y: f64| {
            [
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, y, //
                0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ]
        };
        let records = vec![
            SkeletonRecord { number: 0, parent: -1, name: "n_root".into(), pose_matrix: translated(0.0) },
            SkeletonRecord { number: 1, parent: 0, name: "j_kosi".into(), pose_matrix: translated(1.0) },
        ];
        BoneTree::from_records(records, DEFAULT_ROOT_BONE_NAME, &mut ConversionReport::new()).unwrap()
    }

    fn triangle() -> PartitionedSubmesh {
        let vertex = |x: f32| Vertex {
            position: [x, 0.0, 0.0, 1.0],
            normal: [0.0, 0.0, 1.0],
            uv: [0.5, -0.25, 0.0, 0.0],
            color: [1.0; 4],
            blend_weights: [1.0, 0.0, 0.0, 0.0],
            blend_indices: [1, 0, 0, 0],
        };
        let vertices = vec![vertex(0.0), vertex(1.0), vertex(2.0)];
        let mut shaped = vertices.clone();
        shaped[2].position[1] = 3.0;
        PartitionedSubmesh {
            vertices,
            source_vertex_ids: vec![0, 1, 2],
            indices: vec![0, 1, 2],
            shapes: vec![PartitionedShape {
                name: "shp_lift".to_string(),
                vertices: shaped,
            }],
        }
    }

    #[test]
    fn document_validates_and_carries_skin_and_targets() {
        let skeleton = skeleton();
        let submesh = triangle();
        let joints = [skeleton.find("n_root"), skeleton.find("j_kosi")];

        let mut builder = GltfSceneBuilder::new();
        builder.begin_skeleton(&skeleton).unwrap();
        builder
            .add_part(&ExportPart {
                name: "model Part 0.0".to_string(),
                group_index: 0,
                part_index: 0,
                submesh: &submesh,
                joints: &joints,
            })
            .unwrap();

        let bytes = serde_json::to_vec(&builder.into_root()).unwrap();
        let document = ::gltf::Gltf::from_slice(&bytes).unwrap();

        let skin = document.skins().next().unwrap();
        let joint_names: Vec<_> = skin.joints().map(|n| n.name().unwrap_or_default().to_string()).collect();
        assert_eq!(joint_names, ["n_root", "j_kosi"]);

        let mesh = document.meshes().next().unwrap();
        assert_eq!(mesh.name(), Some("model Part 0.0"));
        let primitive = mesh.primitives().next().unwrap();
        assert_eq!(primitive.morph_targets().count(), 1);
        assert!(primitive.get(&Semantic::Joints(0)).is_some());

        let extras: TargetNamesExtras =
            serde_json::from_str(mesh.extras().as_ref().unwrap().get()).unwrap();
        assert_eq!(extras.target_names, ["shp_lift"]);

        let kosi = document.nodes().find(|n| n.name() == Some("j_kosi")).unwrap();
        let (translation, _, _) = kosi.transform().decomposed();
        assert_eq!(translation, [0.0, 1.0, 0.0]);
    }
}

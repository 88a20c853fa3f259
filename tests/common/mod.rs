// Common test fixtures: small meshes and skeleton files
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use mdl_tools_lib::{
    math::Point4,
    mesh::{
        source::{BlendShapeChannel, Skin, SkinCluster, SourceMesh, SourceNode, SourceScene, TargetShape},
        Vertex,
    },
};

pub fn p(x: f64, y: f64, z: f64) -> Point4 {
    Point4::new(x, y, z, 1.0)
}

/// Unit quad as two triangles over 4 control points, control points 0 and 1
/// fully weighted to bone "b".
pub fn skinned_quad(name: &str) -> SourceMesh {
    let mut mesh = SourceMesh::new(
        name,
        vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0), p(1.0, 1.0, 0.0)],
        vec![vec![0, 1, 2], vec![2, 1, 3]],
    );
    mesh.skin = Some(Skin {
        clusters: vec![SkinCluster {
            bone_name: "b".to_string(),
            influences: vec![(0, 1.0), (1, 1.0)],
        }],
    });
    mesh
}

/// Adds a shape channel whose target moves the given control points by `offset` on z.
pub fn add_shape(mesh: &mut SourceMesh, name: &str, moved: &[usize], offset: f64) {
    let mut control_points = mesh.control_points.clone();
    for &control_point in moved {
        control_points[control_point].z += offset;
    }
    mesh.blend_shapes.push(BlendShapeChannel {
        name: name.to_string(),
        deform_percent: 0.0,
        targets: vec![TargetShape {
            name: name.to_string(),
            control_points,
        }],
    });
}

pub fn scene_of(meshes: Vec<SourceMesh>) -> SourceScene {
    SourceScene {
        nodes: meshes.into_iter().map(SourceNode::with_mesh).collect(),
    }
}

pub fn vertex_at(x: f32) -> Vertex {
    Vertex {
        position: [x, 0.0, 0.0, 1.0],
        ..Default::default()
    }
}

/// Row-major identity with a translation, as written in skeleton files.
pub fn pose_json(translation: [f64; 3]) -> String {
    format!(
        "[1,0,0,{},0,1,0,{},0,0,1,{},0,0,0,1]",
        translation[0], translation[1], translation[2]
    )
}

/// Writes a two-bone skeleton ("n_root" -> "b") into `dir`.
pub fn write_skeleton(dir: &Path) -> PathBuf {
    let path = dir.join("model.skel");
    let text = format!(
        "{{\"BoneNumber\": 0, \"BoneParent\": -1, \"BoneName\": \"n_root\", \"PoseMatrix\": {}}}\n\
         {{\"BoneNumber\": 1, \"BoneParent\": 0, \"BoneName\": \"b\", \"PoseMatrix\": {}}}\n",
        pose_json([0.0, 0.0, 0.0]),
        pose_json([0.0, 1.0, 0.0])
    );
    std::fs::write(&path, text).expect("Failed to write skeleton fixture");
    path
}

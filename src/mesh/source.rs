use cgmath::{Matrix4, SquareMatrix};

use crate::math::Point4;

/// How a layer element's values are laid out over the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingMode {
    ByControlPoint,
    ByPolygonVertex,
    ByPolygon,
    AllSame,
}

/// Whether the mapped position is the value index itself or goes through an index array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceMode {
    Direct,
    IndexToDirect,
}

/// One per-corner attribute stream (normals, one UV channel, colors).
#[derive(Debug, Clone, PartialEq)]
pub struct LayerElement<T> {
    pub mapping: MappingMode,
    pub reference: ReferenceMode,
    pub direct: Vec<T>,
    pub index: Vec<usize>,
}

impl<T: Copy> LayerElement<T> {
    /// Values stored one per control point, no index array.
    pub fn by_control_point(direct: Vec<T>) -> Self {
        Self {
            mapping: MappingMode::ByControlPoint,
            reference: ReferenceMode::Direct,
            direct,
            index: vec![],
        }
    }

    pub fn by_polygon_vertex(direct: Vec<T>) -> Self {
        Self {
            mapping: MappingMode::ByPolygonVertex,
            reference: ReferenceMode::Direct,
            direct,
            index: vec![],
        }
    }

    /// Index into `direct` for one corner, or `None` when the element cannot
    /// resolve it.
    pub fn resolve_index(&self, corner: usize, polygon: usize, control_point: usize) -> Option<usize> {
        let mapped = match self.mapping {
            MappingMode::ByControlPoint => control_point,
            MappingMode::ByPolygonVertex => corner,
            MappingMode::ByPolygon => polygon,
            MappingMode::AllSame => 0,
        };

        let resolved = match self.reference {
            ReferenceMode::Direct => mapped,
            ReferenceMode::IndexToDirect => *self.index.get(mapped)?,
        };

        (resolved < self.direct.len()).then_some(resolved)
    }

    pub fn value(&self, corner: usize, polygon: usize, control_point: usize) -> Option<T> {
        self.resolve_index(corner, polygon, control_point)
            .map(|i| self.direct[i])
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceLayer {
    pub normals: Option<LayerElement<[f64; 3]>>,
    pub uvs: Option<LayerElement<[f64; 2]>>,
    pub colors: Option<LayerElement<[f64; 4]>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkinCluster {
    pub bone_name: String,
    /// `(control point, weight)` pairs.
    pub influences: Vec<(usize, f64)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skin {
    pub clusters: Vec<SkinCluster>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetShape {
    pub name: String,
    /// Absolute positions, parallel to the base mesh's control points.
    pub control_points: Vec<Point4>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlendShapeChannel {
    pub name: String,
    /// Drive value in percent (0..=100).
    pub deform_percent: f64,
    pub targets: Vec<TargetShape>,
}

/// Raw mesh as delivered by a model reader, before welding.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMesh {
    pub name: String,
    pub global_transform: Matrix4<f64>,
    pub control_points: Vec<Point4>,
    /// Control point of every corner, polygon after polygon.
    pub polygon_vertices: Vec<usize>,
    /// Corner count of every polygon.
    pub polygon_sizes: Vec<usize>,
    pub layers: Vec<SourceLayer>,
    pub skin: Option<Skin>,
    pub blend_shapes: Vec<BlendShapeChannel>,
}

impl SourceMesh {
    /// Mesh with identity transform and no attributes, from polygon corner lists.
    pub fn new(name: impl Into<String>, control_points: Vec<Point4>, polygons: Vec<Vec<usize>>) -> Self {
        let polygon_sizes = polygons.iter().map(Vec::len).collect();
        let polygon_vertices = polygons.into_iter().flatten().collect();
        Self {
            name: name.into(),
            global_transform: Matrix4::identity(),
            control_points,
            polygon_vertices,
            polygon_sizes,
            layers: vec![],
            skin: None,
            blend_shapes: vec![],
        }
    }

    pub fn corner_count(&self) -> usize {
        self.polygon_vertices.len()
    }

    pub fn polygon_count(&self) -> usize {
        self.polygon_sizes.len()
    }

    pub fn is_triangulated(&self) -> bool {
        self.corner_count() % 3 == 0 && self.polygon_sizes.iter().all(|&size| size == 3)
    }

    /// Polygon that owns each corner.
    pub fn corner_polygons(&self) -> Vec<usize> {
        self.polygon_sizes
            .iter()
            .enumerate()
            .flat_map(|(polygon, &size)| std::iter::repeat(polygon).take(size))
            .collect()
    }

    pub fn layer(&self, layer: usize) -> Option<&SourceLayer> {
        self.layers.get(layer)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceNode {
    pub name: String,
    pub mesh: Option<SourceMesh>,
    pub children: Vec<SourceNode>,
}

impl SourceNode {
    pub fn with_mesh(mesh: SourceMesh) -> Self {
        Self {
            name: mesh.name.clone(),
            mesh: Some(mesh),
            children: vec![],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceScene {
    pub nodes: Vec<SourceNode>,
}

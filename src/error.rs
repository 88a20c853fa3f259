use thiserror::Error;

/// Reasons a single source mesh is rejected. The mesh is skipped; the run continues.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshError {
    #[error("mesh has no vertices or triangles")]
    Empty,

    #[error("mesh is not fully triangulated ({corners} corners across {polygons} polygons)")]
    NotTriangulated { corners: usize, polygons: usize },

    #[error("mesh does not have a valid skin element")]
    MissingSkin,

    #[error("corner {corner} references control point {control_point}, but the mesh only has {count}")]
    ControlPointOutOfRange {
        corner: usize,
        control_point: usize,
        count: usize,
    },

    #[error("{control_points} control points carry more than {limit} bone influences")]
    WeightOverflow { control_points: usize, limit: usize },

    #[error("bone table is full, cannot add bone '{0}'")]
    BoneTableFull(String),
}

impl MeshError {
    /// Report code for this rejection.
    pub fn code(&self) -> &'static str {
        match self {
            MeshError::Empty => "EMPTY_MESH",
            MeshError::NotTriangulated { .. } => "NOT_TRIANGULATED",
            MeshError::MissingSkin => "MISSING_SKIN",
            MeshError::ControlPointOutOfRange { .. } => "CONTROL_POINT_OUT_OF_RANGE",
            MeshError::WeightOverflow { .. } => "WEIGHT_OVERFLOW",
            MeshError::BoneTableFull(_) => "BONE_TABLE_FULL",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SkeletonError {
    #[error("skeleton has no bones")]
    NoBones,

    #[error("skeleton has no root bone")]
    NoRoot,

    #[error("skeleton has {0} parentless bones and none of them is the named root")]
    AmbiguousRoot(usize),

    #[error("root bone '{name}' has parent bone number {parent}")]
    RootHasParent { name: String, parent: i32 },
}

/// Reasons a submesh cannot be cut out of its mesh group.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PartitionError {
    #[error("submesh {submesh} does not exist")]
    NoSuchSubmesh { submesh: usize },

    #[error("submesh window [{start}, {end}) lies outside the group's {len} indices")]
    WindowOutOfRange { start: usize, end: usize, len: usize },

    #[error("index {index} references vertex {vertex}, but the group only has {count}")]
    VertexOutOfRange {
        index: usize,
        vertex: u32,
        count: usize,
    },
}

use std::{collections::HashMap, ops::Range, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    error::PartitionError,
    mesh::{blend_shape::WeldedShape, weights::BoneTable, weld::WeldedMesh, Vertex},
};

/// A converted model: mesh groups with shared buffers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub groups: Vec<MeshGroup>,
}

impl Model {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        log::info!("Trying to read model from {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model file {}", path.display()))?;
        let model = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse model file {}", path.display()))?;
        Ok(model)
    }

    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write model file {}", path.display()))?;
        Ok(())
    }

    pub fn group(&self, index: u32) -> Option<&MeshGroup> {
        self.groups.iter().find(|g| g.index == index)
    }
}

/// Index window of one part inside its group's index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submesh {
    pub index_offset: u32,
    pub index_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeValue {
    /// Position in the index buffer (same numbering as `Submesh::index_offset`).
    pub offset: u32,
    /// Group vertex holding the shaped position.
    pub replacement: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub name: String,
    pub values_start_index: u32,
    pub values: Vec<ShapeValue>,
}

/// Vertices and indices shared by all parts of one group number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshGroup {
    pub index: u32,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub submeshes: Vec<Submesh>,
    pub shapes: Vec<Shape>,
    pub bone_table: BoneTable,
}

impl MeshGroup {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    /// Appends one welded part. Its indices are shifted past the vertices already
    /// in the group, and each shape's replacement vertices go after the part's own.
    /// Returns the new submesh's position.
    pub fn append_submesh(&mut self, welded: WeldedMesh, shapes: Vec<WeldedShape>) -> usize {
        let vertex_base = self.vertices.len() as u32;
        let index_offset = self.index_base() + self.indices.len() as u32;

        self.indices
            .extend(welded.indices.iter().map(|&i| i + vertex_base));
        self.vertices.extend(welded.vertices);

        for shape in shapes {
            let mut replacements = HashMap::with_capacity(shape.vertices.len());
            for (local_id, position) in &shape.vertices {
                replacements.insert(*local_id, self.vertices.len() as u32);
                self.vertices.push(Vertex::from_position(*position));
            }

            let values = welded
                .indices
                .iter()
                .enumerate()
                .filter_map(|(corner, local_id)| {
                    replacements.get(local_id).map(|&replacement| ShapeValue {
                        offset: index_offset + corner as u32,
                        replacement,
                    })
                })
                .collect();

            self.shapes.push(Shape {
                name: shape.name,
                values_start_index: index_offset,
                values,
            });
        }

        self.submeshes.push(Submesh {
            index_offset,
            index_count: welded.indices.len() as u32,
        });
        self.submeshes.len() - 1
    }

    /// Offset of the first submesh. Submesh offsets count from here.
    pub fn index_base(&self) -> u32 {
        self.submeshes.first().map(|s| s.index_offset).unwrap_or(0)
    }

    /// Range of `self.indices` covered by `submesh`.
    pub fn submesh_window(&self, submesh: usize) -> Result<Range<usize>, PartitionError> {
        let record = self
            .submeshes
            .get(submesh)
            .ok_or(PartitionError::NoSuchSubmesh { submesh })?;

        let start = record.index_offset as usize;
        let end = start.saturating_add(record.index_count as usize);
        let base = self.index_base() as usize;
        let out_of_range = PartitionError::WindowOutOfRange {
            start,
            end,
            len: self.indices.len(),
        };

        let local_start = start.checked_sub(base).ok_or(out_of_range.clone())?;
        let local_end = end - base;
        if local_end > self.indices.len() {
            return Err(out_of_range);
        }
        Ok(local_start..local_end)
    }
}

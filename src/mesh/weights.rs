use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::MeshError;

use super::{source::Skin, Vertex, MAX_INFLUENCES};

/// Blend indices are stored in a byte.
pub const MAX_BONE_TABLE_LEN: usize = u8::MAX as usize + 1;

/// Ordered bone names of one mesh group. Vertex blend indices point into this list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct BoneTable {
    names: Vec<String>,
    lookup: HashMap<String, u8>,
}

impl BoneTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `name`, appending it the first time it is seen.
    pub fn index_of_or_insert(&mut self, name: &str) -> Result<u8, MeshError> {
        if let Some(&index) = self.lookup.get(name) {
            return Ok(index);
        }
        if self.names.len() >= MAX_BONE_TABLE_LEN {
            return Err(MeshError::BoneTableFull(name.to_string()));
        }

        let index = self.names.len() as u8;
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), index);
        Ok(index)
    }

    pub fn index_of(&self, name: &str) -> Option<u8> {
        self.lookup.get(name).copied()
    }

    pub fn name(&self, index: u8) -> Option<&str> {
        self.names.get(index as usize).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl TryFrom<Vec<String>> for BoneTable {
    type Error = MeshError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        let mut table = Self::new();
        for name in names {
            table.index_of_or_insert(&name)?;
        }
        Ok(table)
    }
}

impl From<BoneTable> for Vec<String> {
    fn from(table: BoneTable) -> Self {
        table.names
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weight {
    pub bone_index: u8,
    pub value: f64,
}

/// Per-control-point bone influences, in the order the clusters delivered them.
#[derive(Debug, Clone, Default)]
pub struct WeightAssigner {
    per_control_point: BTreeMap<usize, Vec<Weight>>,
}

impl WeightAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects every cluster of `skin`, registering its bone in `bone_table`.
    pub fn from_skin(skin: &Skin, bone_table: &mut BoneTable) -> Result<Self, MeshError> {
        let mut assigner = Self::new();
        for cluster in &skin.clusters {
            let bone_index = bone_table.index_of_or_insert(&cluster.bone_name)?;
            assigner.add_cluster(bone_index, &cluster.influences);
        }
        Ok(assigner)
    }

    pub fn add_cluster(&mut self, bone_index: u8, influences: &[(usize, f64)]) {
        for &(control_point, value) in influences {
            self.per_control_point
                .entry(control_point)
                .or_default()
                .push(Weight { bone_index, value });
        }
    }

    pub fn influences(&self, control_point: usize) -> &[Weight] {
        self.per_control_point
            .get(&control_point)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Writes the first [`MAX_INFLUENCES`] weights of `control_point` onto `vertex`;
    /// the rest are dropped.
    pub fn apply(&self, control_point: usize, vertex: &mut Vertex) {
        vertex.blend_weights = [0.0; MAX_INFLUENCES];
        vertex.blend_indices = [0; MAX_INFLUENCES];
        for (slot, weight) in self
            .influences(control_point)
            .iter()
            .take(MAX_INFLUENCES)
            .enumerate()
        {
            vertex.blend_weights[slot] = weight.value as f32;
            vertex.blend_indices[slot] = weight.bone_index;
        }
    }

    /// Number of control points carrying more influences than a vertex can hold.
    pub fn overflowing(&self) -> usize {
        self.per_control_point
            .values()
            .filter(|weights| weights.len() > MAX_INFLUENCES)
            .count()
    }
}

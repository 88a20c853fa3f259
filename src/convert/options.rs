use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::skeleton::DEFAULT_ROOT_BONE_NAME;

pub const DEFAULT_SHAPE_PREFIX: &str = "shp_";

/// Knobs for one conversion run. Missing fields in a config file take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Prefix of exported part names.
    pub model_name: String,
    pub root_bone_name: String,
    /// Keep meshes without a skin, with zero weights.
    pub allow_unskinned: bool,
    /// Reject a mesh instead of dropping influences past the fourth.
    pub reject_weight_overflow: bool,
    /// Target shapes whose name starts with this are exported as shapes;
    /// the rest are baked into the base mesh.
    pub shape_prefix: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            model_name: "model".to_string(),
            root_bone_name: DEFAULT_ROOT_BONE_NAME.to_string(),
            allow_unskinned: false,
            reject_weight_overflow: false,
            shape_prefix: DEFAULT_SHAPE_PREFIX.to_string(),
        }
    }
}

impl ConvertOptions {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let options = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(options)
    }

    pub fn part_name(&self, group: u32, part: usize) -> String {
        format!("{} Part {}.{}", self.model_name, group, part)
    }
}

use std::collections::BTreeMap;

use regex::Regex;

use crate::{
    diagnostics::ConversionReport,
    mesh::source::{SourceNode, SourceScene},
};

/// Per-run registry of mesh nodes, keyed by the group and part numbers in their names.
pub struct ConversionContext<'a> {
    name_pattern: Regex,
    groups: BTreeMap<u32, BTreeMap<u32, &'a SourceNode>>,
}

impl<'a> ConversionContext<'a> {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            // "<anything>_<group>" with an optional ".<part>" or "-<part>"
            name_pattern: Regex::new(r"^.*[_ ^]([0-9]+)(?:[.\-]([0-9]+))?$")?,
            groups: BTreeMap::new(),
        })
    }

    /// Group and part encoded in a mesh name. A missing part means part 0.
    pub fn parse_mesh_name(&self, name: &str) -> Option<(u32, u32)> {
        let captures = self.name_pattern.captures(name)?;
        let group = captures.get(1)?.as_str().parse().ok()?;
        let part = match captures.get(2) {
            Some(part) => part.as_str().parse().ok()?,
            None => 0,
        };
        Some((group, part))
    }

    pub fn register_scene(&mut self, scene: &'a SourceScene, report: &mut ConversionReport) {
        for node in &scene.nodes {
            self.register_node(node, report);
        }
    }

    fn register_node(&mut self, node: &'a SourceNode, report: &mut ConversionReport) {
        if node.mesh.is_some() {
            match self.parse_mesh_name(&node.name) {
                Some((group, part)) => {
                    let parts = self.groups.entry(group).or_default();
                    if parts.contains_key(&part) {
                        report.warning(
                            "DUPLICATE_PART",
                            node.name.clone(),
                            format!("part {}.{} is already taken, node and children skipped", group, part),
                        );
                        return;
                    }
                    log::debug!("Registered {} as part {}.{}", node.name, group, part);
                    parts.insert(part, node);
                }
                None => report.warning(
                    "UNRECOGNISED_MESH_NAME",
                    node.name.clone(),
                    "mesh name does not carry a group number, mesh skipped",
                ),
            }
        }

        for child in &node.children {
            self.register_node(child, report);
        }
    }

    /// Registered groups in ascending order, each with its parts in ascending order.
    pub fn groups(&self) -> impl Iterator<Item = (u32, Vec<(u32, &'a SourceNode)>)> + '_ {
        self.groups.iter().map(|(&group, parts)| {
            (group, parts.iter().map(|(&part, &node)| (part, node)).collect())
        })
    }
}

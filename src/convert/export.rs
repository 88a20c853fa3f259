use crate::{
    diagnostics::ConversionReport,
    mesh::partition::partition_submesh,
    model::Model,
    scene::{ExportPart, SceneBuilder},
    skeleton::{BoneId, BoneTree},
};

use super::options::ConvertOptions;

/// Feeds `skeleton` and every submesh of `model` to `builder`.
///
/// Submeshes that cannot be partitioned are reported and skipped. Errors from the
/// builder itself abort the export.
pub fn export_model<B: SceneBuilder>(
    model: &Model,
    skeleton: &BoneTree,
    options: &ConvertOptions,
    builder: &mut B,
    report: &mut ConversionReport,
) -> anyhow::Result<()> {
    builder.begin_skeleton(skeleton)?;

    let mut exported = 0;
    for group in &model.groups {
        let joints = resolve_bone_table(group.index, group.bone_table.names(), skeleton, report);

        for part_index in 0..group.submeshes.len() {
            let name = options.part_name(group.index, part_index);
            let submesh = match partition_submesh(group, part_index, report) {
                Ok(submesh) => submesh,
                Err(e) => {
                    report.error("SUBMESH_OUT_OF_RANGE", name, format!("part skipped: {}", e));
                    continue;
                }
            };

            log::info!(
                "Adding {} ({} vertices, {} shapes)",
                name,
                submesh.vertices.len(),
                submesh.shapes.len()
            );
            builder.add_part(&ExportPart {
                name,
                group_index: group.index,
                part_index,
                submesh: &submesh,
                joints: &joints,
            })?;
            exported += 1;
        }
    }

    log::info!("Exported {} parts", exported);
    Ok(())
}

/// Skeleton bone for every bone-table entry. Unknown names are reported once per group.
fn resolve_bone_table(
    group_index: u32,
    names: &[String],
    skeleton: &BoneTree,
    report: &mut ConversionReport,
) -> Vec<Option<BoneId>> {
    let joints: Vec<Option<BoneId>> = names.iter().map(|name| skeleton.find(name)).collect();

    let missing: Vec<&str> = names
        .iter()
        .zip(&joints)
        .filter(|(_, joint)| joint.is_none())
        .map(|(name, _)| name.as_str())
        .collect();
    if !missing.is_empty() {
        report.warning(
            "MISSING_BONE",
            format!("group {}", group_index),
            format!("skeleton has no bone named {}, influences dropped", missing.join(", ")),
        );
    }

    joints
}

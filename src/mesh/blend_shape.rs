use std::collections::{BTreeMap, HashSet};

use crate::{
    diagnostics::ConversionReport,
    math::{nearly_equal, transform_point, Point4, SHAPE_EPSILON},
};

use super::{
    source::{BlendShapeChannel, SourceMesh, TargetShape},
    weld::WeldMap,
};

/// Sparse world-space positions of one shape, keyed by control point.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeDelta {
    pub name: String,
    pub control_points: BTreeMap<usize, Point4>,
}

/// A [`ShapeDelta`] expanded through the weld map, keyed by welded vertex id.
#[derive(Debug, Clone, PartialEq)]
pub struct WeldedShape {
    pub name: String,
    pub vertices: BTreeMap<u32, Point4>,
}

/// Channels of a mesh, split by use.
pub struct ChannelSplit<'a> {
    /// Baked into the base mesh before welding.
    pub deformers: Vec<(&'a BlendShapeChannel, &'a TargetShape)>,
    /// Exported as sparse shapes.
    pub shapes: Vec<(&'a BlendShapeChannel, &'a TargetShape)>,
}

/// Sorts channels into deformers and shapes by their target's name. A channel
/// must have exactly one target; anything else is reported and skipped.
pub fn split_channels<'a>(
    mesh: &'a SourceMesh,
    shape_prefix: &str,
    report: &mut ConversionReport,
) -> ChannelSplit<'a> {
    let mut split = ChannelSplit {
        deformers: vec![],
        shapes: vec![],
    };

    for channel in &mesh.blend_shapes {
        let target = match channel.targets.as_slice() {
            [target] => target,
            [] => {
                log::debug!("Channel {} on {} has no target shape", channel.name, mesh.name);
                continue;
            }
            targets => {
                report.warning(
                    "MULTI_TARGET_CHANNEL",
                    format!("{}/{}", mesh.name, channel.name),
                    format!("channel has {} target shapes, expected 1", targets.len()),
                );
                continue;
            }
        };

        if target.name.starts_with(shape_prefix) {
            split.shapes.push((channel, target));
        } else {
            split.deformers.push((channel, target));
        }
    }

    split
}

/// Bakes every active deformer into a copy of the base control points.
///
/// Offsets are measured against the undeformed base, so the order of deformers
/// does not matter. Control points missing from a short target are left alone.
pub fn apply_deformers(
    mesh: &SourceMesh,
    deformers: &[(&BlendShapeChannel, &TargetShape)],
) -> Vec<Point4> {
    let base = &mesh.control_points;
    let mut deformed = base.clone();

    for (channel, target) in deformers {
        if channel.deform_percent == 0.0 {
            continue;
        }
        log::info!(
            "Applying blend shape {} ({}%) to {}",
            target.name,
            channel.deform_percent,
            mesh.name
        );

        let factor = channel.deform_percent / 100.0;
        for ((vertex, original), moved) in deformed
            .iter_mut()
            .zip(base.iter())
            .zip(target.control_points.iter())
        {
            *vertex += (moved - original) * factor;
        }
    }

    deformed
}

/// Records, per shape, the control points whose target position differs from
/// `base` beyond [`SHAPE_EPSILON`] on any of the four components. The stored
/// position is the target transformed into world space.
///
/// A shape name that was already seen on this mesh is reported and skipped.
/// Results are ordered by name.
pub fn extract_shape_deltas(
    mesh: &SourceMesh,
    base: &[Point4],
    shapes: &[(&BlendShapeChannel, &TargetShape)],
    report: &mut ConversionReport,
) -> Vec<ShapeDelta> {
    let mut seen = HashSet::new();
    let mut deltas = vec![];

    for (_, target) in shapes {
        if !seen.insert(target.name.as_str()) {
            report.warning(
                "DUPLICATE_SHAPE",
                format!("{}/{}", mesh.name, target.name),
                "shape included more than once, only the first is kept",
            );
            continue;
        }

        let control_points = base
            .iter()
            .zip(target.control_points.iter())
            .enumerate()
            .filter(|(_, (original, moved))| !nearly_equal(**original, **moved, SHAPE_EPSILON))
            .map(|(control_point, (_, moved))| {
                (control_point, transform_point(&mesh.global_transform, *moved))
            })
            .collect();

        deltas.push(ShapeDelta {
            name: target.name.clone(),
            control_points,
        });
    }

    deltas.sort_by(|a, b| a.name.cmp(&b.name));
    deltas
}

/// Expands control-point deltas to every welded vertex they produced. Shapes that
/// end up touching no vertex are reported and dropped.
pub fn remap_through_weld(
    deltas: Vec<ShapeDelta>,
    weld_map: &WeldMap,
    mesh_name: &str,
    report: &mut ConversionReport,
) -> Vec<WeldedShape> {
    let mut shapes = Vec::with_capacity(deltas.len());

    for delta in deltas {
        let mut vertices = BTreeMap::new();
        for (control_point, position) in &delta.control_points {
            let Some(ids) = weld_map.get(control_point) else {
                continue;
            };
            for &id in ids {
                vertices.insert(id, *position);
            }
        }

        if vertices.is_empty() {
            report.info(
                "EMPTY_SHAPE",
                format!("{}/{}", mesh_name, delta.name),
                "shape does not move any vertex, dropped",
            );
            continue;
        }

        shapes.push(WeldedShape {
            name: delta.name,
            vertices,
        });
    }

    shapes
}

pub mod gltf_reader;
pub mod gltf_writer;

use crate::{
    mesh::partition::PartitionedSubmesh,
    skeleton::{BoneId, BoneTree},
};

/// One partitioned submesh on its way out.
pub struct ExportPart<'a> {
    pub name: String,
    pub group_index: u32,
    pub part_index: usize,
    pub submesh: &'a PartitionedSubmesh,
    /// Skeleton bone for every bone-table index of the group; `None` when the
    /// skeleton does not have that bone.
    pub joints: &'a [Option<BoneId>],
}

/// Receiver of finished buffers. Implementations own all file-format concerns.
pub trait SceneBuilder {
    fn begin_skeleton(&mut self, skeleton: &BoneTree) -> anyhow::Result<()>;

    fn add_part(&mut self, part: &ExportPart) -> anyhow::Result<()>;
}

mod loader;

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use cgmath::{Matrix4, SquareMatrix};
use ptree::{item::StringItem, TreeBuilder};

pub use loader::{read_records, read_records_from_file, SkeletonRecord};

use crate::{diagnostics::ConversionReport, error::SkeletonError, math::matrix_from_row_major};

pub const DEFAULT_ROOT_BONE_NAME: &str = "n_root";

/// Position of a bone inside its [`BoneTree`].
pub type BoneId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub number: i32,
    pub parent: Option<BoneId>,
    pub children: Vec<BoneId>,
    /// Local pose relative to the parent.
    pub pose: Matrix4<f64>,
}

/// Skeleton hierarchy. Bones live in one arena and refer to each other by index;
/// the tree is built once and only read afterwards.
#[derive(Debug, Clone)]
pub struct BoneTree {
    bones: Vec<Bone>,
    root: BoneId,
    by_name: HashMap<String, BoneId>,
    /// Bones reachable from the root, parents before children.
    depth_first: Vec<BoneId>,
}

impl BoneTree {
    /// Builds the tree from flat records. A record may appear before its parent.
    pub fn from_records(
        records: Vec<SkeletonRecord>,
        root_name: &str,
        report: &mut ConversionReport,
    ) -> Result<Self, SkeletonError> {
        if records.is_empty() {
            return Err(SkeletonError::NoBones);
        }

        // first record wins for a duplicated number
        let mut by_number: BTreeMap<i32, SkeletonRecord> = BTreeMap::new();
        for record in records {
            if by_number.contains_key(&record.number) {
                report.warning(
                    "DUPLICATE_BONE_NUMBER",
                    record.name.clone(),
                    format!("bone number {} already exists, record skipped", record.number),
                );
                continue;
            }
            by_number.insert(record.number, record);
        }

        let mut bones = Vec::with_capacity(by_number.len());
        let mut id_of_number = HashMap::new();
        for (number, record) in &by_number {
            id_of_number.insert(*number, bones.len());
            bones.push(Bone {
                name: record.name.clone(),
                number: *number,
                parent: None,
                children: vec![],
                pose: matrix_from_row_major(&record.pose_matrix),
            });
        }

        // second pass, ascending bone number so children come out ordered
        for (number, record) in &by_number {
            let Some(parent_number) = record.parent_number() else {
                continue;
            };
            let id = id_of_number[number];
            match id_of_number.get(&parent_number) {
                Some(&parent_id) if parent_id != id => {
                    bones[id].parent = Some(parent_id);
                    bones[parent_id].children.push(id);
                }
                _ => report.warning(
                    "UNKNOWN_PARENT_BONE",
                    record.name.clone(),
                    format!("parent bone number {} cannot be resolved", parent_number),
                ),
            }
        }

        let root = Self::pick_root(&bones, root_name)?;

        let mut depth_first = Vec::with_capacity(bones.len());
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            depth_first.push(id);
            stack.extend(bones[id].children.iter().rev());
        }

        let mut by_name = HashMap::new();
        for &id in &depth_first {
            by_name.entry(bones[id].name.clone()).or_insert(id);
        }

        if depth_first.len() != bones.len() {
            for (id, bone) in bones.iter().enumerate() {
                if !depth_first.contains(&id) {
                    report.warning(
                        "DETACHED_BONE",
                        bone.name.clone(),
                        "bone is not connected to the root and will not be exported",
                    );
                }
            }
        }

        Ok(Self {
            bones,
            root,
            by_name,
            depth_first,
        })
    }

    pub fn from_file(
        path: &Path,
        root_name: &str,
        report: &mut ConversionReport,
    ) -> anyhow::Result<Self> {
        let records = read_records_from_file(path, report)?;
        Ok(Self::from_records(records, root_name, report)?)
    }

    /// The root never has a parent, so the walk from it cannot re-enter a cycle.
    fn pick_root(bones: &[Bone], root_name: &str) -> Result<BoneId, SkeletonError> {
        if let Some(id) = bones.iter().position(|b| b.name == root_name) {
            return match bones[id].parent {
                None => Ok(id),
                Some(parent) => Err(SkeletonError::RootHasParent {
                    name: root_name.to_string(),
                    parent: bones[parent].number,
                }),
            };
        }

        let parentless: Vec<BoneId> = bones
            .iter()
            .enumerate()
            .filter(|(_, b)| b.parent.is_none())
            .map(|(id, _)| id)
            .collect();

        match parentless.as_slice() {
            [] => Err(SkeletonError::NoRoot),
            [only] => Ok(*only),
            many => Err(SkeletonError::AmbiguousRoot(many.len())),
        }
    }

    pub fn root(&self) -> BoneId {
        self.root
    }

    pub fn bone(&self, id: BoneId) -> &Bone {
        &self.bones[id]
    }

    /// Finds a bone connected to the root by name.
    pub fn find(&self, name: &str) -> Option<BoneId> {
        self.by_name.get(name).copied()
    }

    /// Bones reachable from the root, each parent before its children.
    pub fn depth_first(&self) -> &[BoneId] {
        &self.depth_first
    }

    pub fn len(&self) -> usize {
        self.depth_first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth_first.is_empty()
    }

    /// Bind pose of a bone in skeleton space. Detached bones may form a parent
    /// cycle, so the walk stops after visiting every bone once.
    pub fn global_pose(&self, id: BoneId) -> Matrix4<f64> {
        let mut pose = self.bones[id].pose;
        let mut current = self.bones[id].parent;
        for _ in 0..self.bones.len() {
            let Some(parent) = current else {
                break;
            };
            pose = self.bones[parent].pose * pose;
            current = self.bones[parent].parent;
        }
        pose
    }

    pub fn inverse_bind_pose(&self, id: BoneId) -> Matrix4<f64> {
        self.global_pose(id)
            .invert()
            .unwrap_or_else(Matrix4::identity)
    }

    pub fn to_ptree(&self) -> StringItem {
        let mut tree = TreeBuilder::new(format!("skeleton ({} bones)", self.len()));
        self.add_bone_to_tree(self.root, &mut tree);
        tree.build()
    }

    fn add_bone_to_tree(&self, id: BoneId, tree: &mut TreeBuilder) {
        let bone = &self.bones[id];
        let label = format!("[{}] {}", bone.number, bone.name);
        if bone.children.is_empty() {
            tree.add_empty_child(label);
        } else {
            tree.begin_child(label);
            for &child in &bone.children {
                self.add_bone_to_tree(child, tree);
            }
            tree.end_child();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Vector3, Vector4};

    fn record(number: i32, parent: i32, name: &str, translation: [f64; 3]) -> SkeletonRecord {
        SkeletonRecord {
            number,
            parent,
            name: name.to_string(),
            pose_matrix: [
                1.0, 0.0, 0.0, translation[0], //
                0.0, 1.0, 0.0, translation[1], //
                0.0, 0.0, 1.0, translation[2], //
                0.0, 0.0, 0.0, 1.0,
            ],
        }
    }

    #[test]
    fn children_resolve_when_listed_before_parent() {
        let records = vec![
            record(2, 1, "j_sebo_a", [0.0, 1.0, 0.0]),
            record(1, 0, "j_kosi", [0.0, 1.0, 0.0]),
            record(0, -1, "n_root", [0.0, 0.0, 0.0]),
            record(3, 1, "j_asi_a_l", [0.5, 0.0, 0.0]),
        ];
        let mut report = ConversionReport::new();
        let tree = BoneTree::from_records(records, DEFAULT_ROOT_BONE_NAME, &mut report).unwrap();

        assert!(report.is_clean());
        assert_eq!(tree.bone(tree.root()).name, "n_root");
        let kosi = tree.find("j_kosi").unwrap();
        assert_eq!(tree.bone(kosi).parent, Some(tree.root()));

        let children: Vec<&str> = tree
            .bone(kosi)
            .children
            .iter()
            .map(|&c| tree.bone(c).name.as_str())
            .collect();
        assert_eq!(children, ["j_sebo_a", "j_asi_a_l"]);

        let order: Vec<i32> = tree.depth_first().iter().map(|&id| tree.bone(id).number).collect();
        assert_eq!(order, [0, 1, 2, 3]);
    }

    #[test]
    fn global_pose_chains_parents() {
        let records = vec![
            record(0, -1, "n_root", [0.0, 0.0, 0.0]),
            record(1, 0, "j_kosi", [0.0, 1.0, 0.0]),
            record(2, 1, "j_sebo_a", [0.0, 2.0, 0.0]),
        ];
        let mut report = ConversionReport::new();
        let tree = BoneTree::from_records(records, DEFAULT_ROOT_BONE_NAME, &mut report).unwrap();
        let sebo = tree.find("j_sebo_a").unwrap();

        let origin = tree.global_pose(sebo) * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert_eq!(origin.truncate(), Vector3::new(0.0, 3.0, 0.0));

        let back = tree.inverse_bind_pose(sebo) * origin;
        assert_eq!(back.truncate(), Vector3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn unnamed_root_falls_back_to_single_parentless_bone() {
        let records = vec![
            record(5, -1, "Bip01", [0.0, 0.0, 0.0]),
            record(6, 5, "Bip01 Pelvis", [0.0, 1.0, 0.0]),
        ];
        let mut report = ConversionReport::new();
        let tree = BoneTree::from_records(records, DEFAULT_ROOT_BONE_NAME, &mut report).unwrap();
        assert_eq!(tree.bone(tree.root()).name, "Bip01");
    }

    #[test]
    fn two_parentless_bones_without_named_root_is_fatal() {
        let records = vec![
            record(0, -1, "a", [0.0, 0.0, 0.0]),
            record(1, -1, "b", [0.0, 0.0, 0.0]),
        ];
        let mut report = ConversionReport::new();
        let err = BoneTree::from_records(records, DEFAULT_ROOT_BONE_NAME, &mut report).unwrap_err();
        assert!(matches!(err, SkeletonError::AmbiguousRoot(2)));
    }

    #[test]
    fn orphans_are_reported_and_not_found() {
        let records = vec![
            record(0, -1, "n_root", [0.0, 0.0, 0.0]),
            record(1, 0, "j_kosi", [0.0, 1.0, 0.0]),
            record(7, 42, "j_lost", [0.0, 0.0, 0.0]),
            record(7, 0, "j_duplicate", [0.0, 0.0, 0.0]),
        ];
        let mut report = ConversionReport::new();
        let tree = BoneTree::from_records(records, DEFAULT_ROOT_BONE_NAME, &mut report).unwrap();

        assert_eq!(tree.len(), 2);
        assert!(tree.find("j_lost").is_none());
        assert!(tree.find("j_duplicate").is_none());
        assert!(report.has_code("UNKNOWN_PARENT_BONE"));
        assert!(report.has_code("DETACHED_BONE"));
        assert!(report.has_code("DUPLICATE_BONE_NUMBER"));
    }

    #[test]
    fn root_inside_a_parent_cycle_is_fatal() {
        let records = vec![
            record(0, 1, "n_root", [0.0, 0.0, 0.0]),
            record(1, 0, "a", [0.0, 1.0, 0.0]),
        ];
        let mut report = ConversionReport::new();
        let err = BoneTree::from_records(records, DEFAULT_ROOT_BONE_NAME, &mut report).unwrap_err();
        assert_eq!(
            err,
            SkeletonError::RootHasParent {
                name: "n_root".to_string(),
                parent: 1
            }
        );
    }

    #[test]
    fn detached_cycle_does_not_stall_pose_lookup() {
        let records = vec![
            record(0, -1, "n_root", [0.0, 0.0, 0.0]),
            record(1, 2, "loop_a", [0.0, 1.0, 0.0]),
            record(2, 1, "loop_b", [0.0, 1.0, 0.0]),
        ];
        let mut report = ConversionReport::new();
        let tree = BoneTree::from_records(records, DEFAULT_ROOT_BONE_NAME, &mut report).unwrap();

        assert_eq!(tree.len(), 1);
        assert_eq!(report.count_code("DETACHED_BONE"), 2);
        // ids follow ascending bone number
        let origin = tree.global_pose(1) * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!(origin.y > 0.0);
    }

    #[test]
    fn ptree_lists_every_connected_bone() {
        let records = vec![
            record(0, -1, "n_root", [0.0, 0.0, 0.0]),
            record(1, 0, "j_kosi", [0.0, 1.0, 0.0]),
            record(2, 1, "j_sebo_a", [0.0, 1.0, 0.0]),
        ];
        let mut report = ConversionReport::new();
        let tree = BoneTree::from_records(records, DEFAULT_ROOT_BONE_NAME, &mut report).unwrap();

        let mut out = Vec::new();
        ptree::write_tree(&tree.to_ptree(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[0] n_root"));
        assert!(text.contains("[2] j_sebo_a"));
    }
}

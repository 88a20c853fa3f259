// Skeleton file loading

use std::io::Write;

use mdl_tools_lib::{diagnostics::ConversionReport, error::SkeletonError, skeleton::BoneTree};

#[path = "common/mod.rs"]
mod common;

use common::{pose_json, write_skeleton};

#[test]
fn skeleton_file_builds_tree() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_skeleton(dir.path());

    let mut report = ConversionReport::new();
    let tree = BoneTree::from_file(&path, "n_root", &mut report).unwrap();

    assert!(report.is_clean());
    assert_eq!(tree.len(), 2);
    let b = tree.find("b").unwrap();
    assert_eq!(tree.bone(b).parent, Some(tree.root()));

    let mut out = Vec::new();
    ptree::write_tree(&tree.to_ptree(), &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("skeleton (2 bones)"));
}

#[test]
fn malformed_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.skel");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "{{\"BoneNumber\": 0, \"BoneParent\": -1, \"BoneName\": \"n_root\", \"PoseMatrix\": {}}}",
        pose_json([0.0, 0.0, 0.0])
    )
    .unwrap();
    writeln!(file, "{{\"BoneNumber\": 1,").unwrap();
    drop(file);

    let mut report = ConversionReport::new();
    let tree = BoneTree::from_file(&path, "n_root", &mut report).unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(report.count_code("MALFORMED_SKELETON_RECORD"), 1);
}

#[test]
fn file_without_bones_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.skel");
    std::fs::write(&path, "\n\n").unwrap();

    let mut report = ConversionReport::new();
    let err = BoneTree::from_file(&path, "n_root", &mut report).unwrap_err();
    assert!(matches!(err.downcast_ref::<SkeletonError>(), Some(SkeletonError::NoBones)));

    let missing = BoneTree::from_file(&dir.path().join("nope.skel"), "n_root", &mut report);
    assert!(missing.is_err());
}

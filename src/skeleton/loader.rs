use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::diagnostics::ConversionReport;

/// One line of a skeleton file.
///
/// ```json
/// {"BoneNumber": 1, "BoneParent": 0, "BoneName": "j_kosi", "PoseMatrix": [1.0, 0.0, ...]}
/// ```
///
/// `BoneParent` is -1 for a bone without a parent. `PoseMatrix` holds 16 values row by row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonRecord {
    #[serde(rename = "BoneNumber")]
    pub number: i32,
    #[serde(rename = "BoneParent")]
    pub parent: i32,
    #[serde(rename = "BoneName")]
    pub name: String,
    #[serde(rename = "PoseMatrix")]
    pub pose_matrix: [f64; 16],
}

impl SkeletonRecord {
    pub fn parent_number(&self) -> Option<i32> {
        (self.parent != -1).then_some(self.parent)
    }
}

/// Parses line-delimited skeleton records. Blank lines are ignored; a line that
/// fails to parse is reported and skipped.
pub fn read_records<R: BufRead>(
    reader: R,
    report: &mut ConversionReport,
) -> std::io::Result<Vec<SkeletonRecord>> {
    let mut records = vec![];

    for (line_idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<SkeletonRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => report.error(
                "MALFORMED_SKELETON_RECORD",
                format!("line {}", line_idx + 1),
                format!("parse error at column {}: {}", e.column(), e),
            ),
        }
    }

    Ok(records)
}

pub fn read_records_from_file(
    path: &Path,
    report: &mut ConversionReport,
) -> anyhow::Result<Vec<SkeletonRecord>> {
    log::info!("Trying to read skeleton from {}", path.display());
    let file = File::open(path)
        .with_context(|| format!("failed to open skeleton file {}", path.display()))?;
    let records = read_records(BufReader::new(file), report)
        .with_context(|| format!("failed to read skeleton file {}", path.display()))?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: &str = "[1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1]";

    #[test]
    fn bad_lines_are_skipped_not_fatal() {
        let text = format!(
            "{{\"BoneNumber\": 0, \"BoneParent\": -1, \"BoneName\": \"n_root\", \"PoseMatrix\": {IDENTITY}}}\n\
             this is not json\n\
             \n\
             {{\"BoneNumber\": 1, \"BoneParent\": 0, \"BoneName\": \"j_kosi\"}}\n\
             {{\"BoneNumber\": 2, \"BoneParent\": 0, \"BoneName\": \"j_short\", \"PoseMatrix\": [1, 2, 3]}}\n\
             {{\"BoneNumber\": 3, \"BoneParent\": 0, \"BoneName\": \"j_sebo_a\", \"PoseMatrix\": {IDENTITY}}}\n"
        );

        let mut report = ConversionReport::new();
        let records = read_records(text.as_bytes(), &mut report).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "n_root");
        assert_eq!(records[0].parent_number(), None);
        assert_eq!(records[1].name, "j_sebo_a");
        assert_eq!(records[1].parent_number(), Some(0));
        assert_eq!(report.count_code("MALFORMED_SKELETON_RECORD"), 3);
    }
}

//! On-disk artifact layout, keyed by fetch offset:
//!
//! ```text
//! <root>/sample_<offset>/<dataset>_dataset_offset_<offset>.csv
//! <root>/sample_<offset>/<dataset>_dataset_offset_<offset>.json
//! ```

use std::path::{Path, PathBuf};

const SAMPLE_PREFIX: &str = "sample_";

/// Directory holding both artifacts of one batch.
pub fn sample_dir(root: &Path, offset: u64) -> PathBuf {
    root.join(format!("{SAMPLE_PREFIX}{offset}"))
}

fn base_name(dataset: &str, offset: u64) -> String {
    format!("{dataset}_dataset_offset_{offset}")
}

/// Cleaned tabular artifact written by the pipeline.
pub fn csv_path(root: &Path, dataset: &str, offset: u64) -> PathBuf {
    sample_dir(root, offset).join(format!("{}.csv", base_name(dataset, offset)))
}

/// Line-delimited sibling written by the converter.
pub fn jsonl_path(root: &Path, dataset: &str, offset: u64) -> PathBuf {
    sample_dir(root, offset).join(format!("{}.json", base_name(dataset, offset)))
}

/// Offset encoded in a `sample_<offset>` directory name.
pub fn parse_sample_dir(name: &str) -> Option<u64> {
    let digits = name.strip_prefix(SAMPLE_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// All batch directories under `root`, sorted by offset.
///
/// A missing root yields an empty list.
pub fn list_samples(root: &Path) -> std::io::Result<Vec<(u64, PathBuf)>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut samples = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if let Some(offset) = name.to_str().and_then(parse_sample_dir) {
            samples.push((offset, entry.path()));
        }
    }
    samples.sort_by_key(|(offset, _)| *offset);
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn artifact_paths() {
        let root = Path::new("data");
        assert_eq!(
            csv_path(root, "breathe", 1000),
            PathBuf::from("data/sample_1000/breathe_dataset_offset_1000.csv")
        );
        assert_eq!(
            jsonl_path(root, "breathe", 0),
            PathBuf::from("data/sample_0/breathe_dataset_offset_0.json")
        );
    }

    #[test]
    fn parse_sample_dir_names() {
        assert_eq!(parse_sample_dir("sample_0"), Some(0));
        assert_eq!(parse_sample_dir("sample_2000"), Some(2000));
        assert_eq!(parse_sample_dir("sample_"), None);
        assert_eq!(parse_sample_dir("sample_-1"), None);
        assert_eq!(parse_sample_dir("sample_1a"), None);
        assert_eq!(parse_sample_dir("other_1"), None);
    }

    #[test]
    fn list_samples_sorted_numerically() {
        let dir = TempDir::new().unwrap();
        for name in ["sample_2000", "sample_0", "sample_1000", "notes", "sample_x"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("sample_3000"), "a file, not a dir").unwrap();

        let offsets: Vec<u64> = list_samples(dir.path())
            .unwrap()
            .into_iter()
            .map(|(o, _)| o)
            .collect();
        assert_eq!(offsets, vec![0, 1000, 2000]);
    }

    #[test]
    fn list_samples_missing_root() {
        assert!(list_samples(Path::new("/nonexistent/breathe")).unwrap().is_empty());
    }
}

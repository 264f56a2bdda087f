//! Artifact inventory for `breathe status`

use std::path::Path;

use anyhow::{Context, Result};

use crate::layout;

/// What `status` knows about one batch CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvState {
    Missing,
    Rows(usize),
    /// Present but not readable as CSV; holds the reason
    Unreadable(String),
}

/// State of one `sample_<offset>` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleStatus {
    pub offset: u64,
    pub csv: CsvState,
    pub has_json: bool,
}

fn count_rows(path: &Path) -> Result<usize> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut count = 0;
    for record in reader.records() {
        record.with_context(|| format!("Failed to read {}", path.display()))?;
        count += 1;
    }
    Ok(count)
}

fn csv_state(path: &Path) -> CsvState {
    if !path.is_file() {
        return CsvState::Missing;
    }
    match count_rows(path) {
        Ok(rows) => CsvState::Rows(rows),
        Err(e) => {
            log::warn!("{e:#}");
            CsvState::Unreadable(format!("{e:#}"))
        }
    }
}

/// List every batch under `root` with its artifact state, in offset order.
///
/// A broken CSV is reported on its own row; only an unreadable root fails.
pub fn inspect(root: &Path, dataset: &str) -> Result<Vec<SampleStatus>> {
    let samples = layout::list_samples(root)
        .with_context(|| format!("Failed to list {}", root.display()))?;
    Ok(samples
        .into_iter()
        .map(|(offset, _)| SampleStatus {
            offset,
            csv: csv_state(&layout::csv_path(root, dataset, offset)),
            has_json: layout::jsonl_path(root, dataset, offset).is_file(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reports_each_sample() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(layout::sample_dir(root, 0)).unwrap();
        std::fs::create_dir_all(layout::sample_dir(root, 1000)).unwrap();
        std::fs::write(
            layout::csv_path(root, "breathe", 0),
            "id,title,abstract,authors,keywords,organization_affiliated\n1,t,a,au,k,o\n2,t,a,au,k,o\n",
        )
        .unwrap();
        std::fs::write(layout::jsonl_path(root, "breathe", 0), "{}\n{}\n").unwrap();

        let status = inspect(root, "breathe").unwrap();
        assert_eq!(
            status,
            vec![
                SampleStatus {
                    offset: 0,
                    csv: CsvState::Rows(2),
                    has_json: true
                },
                SampleStatus {
                    offset: 1000,
                    csv: CsvState::Missing,
                    has_json: false
                },
            ]
        );
    }

    #[test]
    fn broken_csv_is_reported_per_row() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for offset in [0, 1000] {
            std::fs::create_dir_all(layout::sample_dir(root, offset)).unwrap();
        }
        std::fs::write(
            layout::csv_path(root, "breathe", 0),
            "id,title,abstract,authors,keywords,organization_affiliated\n1,t\n",
        )
        .unwrap();
        std::fs::write(
            layout::csv_path(root, "breathe", 1000),
            "id,title,abstract,authors,keywords,organization_affiliated\n1,t,a,au,k,o\n",
        )
        .unwrap();

        let status = inspect(root, "breathe").unwrap();
        assert!(matches!(status[0].csv, CsvState::Unreadable(_)));
        assert_eq!(status[1].csv, CsvState::Rows(1));
    }
}

//! Directory mirroring: every file under a root becomes one object.

use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use breathe_core::{ProgressContext, fmt_num};

use crate::store::ObjectStore;

/// Files uploaded (or planned, in a dry run).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MirrorSummary {
    pub files: usize,
    pub bytes: u64,
    /// `(key, local path)` in upload order
    pub keys: Vec<(String, PathBuf)>,
}

/// Absolute, symlink-free form of `root`; glob drops a leading `./` from its
/// matches, so keys must be taken relative to a resolved root.
fn resolve_root(root: &Path) -> Result<PathBuf> {
    if !root.is_dir() {
        bail!("Not a directory: {}", root.display());
    }
    root.canonicalize()
        .with_context(|| format!("Failed to resolve {}", root.display()))
}

/// Every regular file under `root`, sorted, excluding in-flight `*.tmp` files.
///
/// Paths are returned under the resolved (absolute) root.
pub fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let root = resolve_root(root)?;
    let pattern = format!(
        "{}/**/*",
        glob::Pattern::escape(&root.to_string_lossy())
    );
    let mut files = Vec::new();
    for entry in glob::glob(&pattern).context("Invalid glob pattern")? {
        let path = entry.context("Failed to read directory entry")?;
        if !path.is_file() {
            continue;
        }
        if path.extension().is_some_and(|ext| ext == "tmp") {
            log::debug!("Skipping in-flight file {}", path.display());
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// `<prefix>/<path relative to root>` with forward slashes.
pub fn object_key(prefix: &str, root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{} is not under {}", path.display(), root.display()))?;

    let mut parts: Vec<String> = prefix
        .split('/')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    for component in relative.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_string_lossy().into_owned()),
            Component::CurDir => {}
            other => bail!("unexpected path component {other:?} in {}", path.display()),
        }
    }
    Ok(parts.join("/"))
}

/// Upload every file under `root` to `store` under `prefix`.
///
/// Stops at the first failed upload; re-running overwrites the same keys.
pub fn mirror_dir(
    root: &Path,
    prefix: &str,
    store: &dyn ObjectStore,
    dry_run: bool,
    progress: &ProgressContext,
) -> Result<MirrorSummary> {
    let start = Instant::now();
    let root = resolve_root(root)?;
    let files = collect_files(&root)?;
    log::info!(
        "Publishing {} files from {} to {}/{}",
        fmt_num(files.len() as u64),
        root.display(),
        store.describe(),
        prefix.trim_matches('/')
    );

    let pb = progress.count_bar("upload", files.len() as u64);
    let mut summary = MirrorSummary::default();
    for path in files {
        let key = object_key(prefix, &root, &path)?;
        let size = path.metadata().map(|m| m.len()).unwrap_or(0);
        pb.set_message(key.clone());

        if dry_run {
            log::info!("[dry-run] {} -> {}/{key}", path.display(), store.describe());
        } else {
            store
                .put_file(&key, &path, &pb)
                .with_context(|| format!("Failed to upload {}", path.display()))?;
            log::info!("Uploaded {} -> {}/{key}", path.display(), store.describe());
        }

        summary.files += 1;
        summary.bytes += size;
        summary.keys.push((key, path));
        pb.inc(1);
    }
    pb.finish_and_clear();

    log::info!(
        "Published {} files ({} bytes) in {:.1}s",
        fmt_num(summary.files as u64),
        fmt_num(summary.bytes),
        start.elapsed().as_secs_f64()
    );
    Ok(summary)
}

//! Crash-safe output sinks: every file is written as `<name>.tmp`, fsynced,
//! then atomically renamed onto its final path.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Buffered file writer with atomic tmp→rename.
///
/// Dropping it without calling [`AtomicFile::finalize`] removes the tmp file,
/// so a failed write never leaves anything at the final path.
pub struct AtomicFile {
    writer: Option<BufWriter<File>>,
    tmp_path: PathBuf,
    final_path: PathBuf,
}

impl std::fmt::Debug for AtomicFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicFile")
            .field("final_path", &self.final_path)
            .finish_non_exhaustive()
    }
}

impl AtomicFile {
    /// Start writing `final_path` via a sibling tmp file.
    pub fn create(final_path: &Path) -> io::Result<Self> {
        let file_name = final_path.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a file path: {}", final_path.display()),
            )
        })?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = final_path.with_file_name(tmp_name);

        // Clean up stale tmp file
        if tmp_path.exists() {
            fs::remove_file(&tmp_path)?;
        }

        let file = File::create(&tmp_path)?;
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            tmp_path,
            final_path: final_path.to_path_buf(),
        })
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Flush, fsync, and atomically rename tmp → final.
    pub fn finalize(mut self) -> io::Result<PathBuf> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| io::Error::other("sink already finalized"))?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&self.tmp_path, &self.final_path) {
            let _ = fs::remove_file(&self.tmp_path);
            return Err(e);
        }
        sync_parent_dir(&self.final_path)?;
        Ok(self.final_path.clone())
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writer.as_mut() {
            Some(w) => w.write(buf),
            None => Err(io::Error::other("sink already finalized")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

/// Make the rename itself durable.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => File::open(dir)?.sync_all(),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Serialize `value` as JSON and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    let mut file = AtomicFile::create(path)?;
    serde_json::to_writer(&mut file, value).map_err(io::Error::other)?;
    file.finalize()?;
    Ok(())
}

/// CSV writer with an explicit header row, backed by [`AtomicFile`].
pub struct CsvSink {
    writer: csv::Writer<AtomicFile>,
    row_count: usize,
}

impl CsvSink {
    pub fn create(final_path: &Path, header: &[&str]) -> io::Result<Self> {
        let file = AtomicFile::create(final_path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(header).map_err(io::Error::other)?;
        Ok(Self {
            writer,
            row_count: 0,
        })
    }

    /// Write one serde row; field order must match the header.
    pub fn write_row<S: Serialize>(&mut self, row: &S) -> io::Result<()> {
        self.writer.serialize(row).map_err(io::Error::other)?;
        self.row_count += 1;
        Ok(())
    }

    /// Finalize: flush and atomically rename tmp → final. Returns rows written.
    pub fn finalize(self) -> io::Result<usize> {
        let row_count = self.row_count;
        let file = self.writer.into_inner().map_err(|e| e.into_error())?;
        file.finalize()?;
        Ok(row_count)
    }
}

/// One-JSON-object-per-line writer, backed by [`AtomicFile`].
pub struct JsonLinesSink {
    file: AtomicFile,
    row_count: usize,
}

impl JsonLinesSink {
    pub fn create(final_path: &Path) -> io::Result<Self> {
        Ok(Self {
            file: AtomicFile::create(final_path)?,
            row_count: 0,
        })
    }

    pub fn write_row<S: Serialize>(&mut self, row: &S) -> io::Result<()> {
        serde_json::to_writer(&mut self.file, row).map_err(io::Error::other)?;
        self.file.write_all(b"\n")?;
        self.row_count += 1;
        Ok(())
    }

    pub fn finalize(self) -> io::Result<usize> {
        let row_count = self.row_count;
        self.file.finalize()?;
        Ok(row_count)
    }
}

/// Remove stale .tmp files in a directory, returning how many were removed.
pub fn cleanup_tmp_files(dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "tmp") {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

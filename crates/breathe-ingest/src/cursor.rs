//! Progress cursor: how many qualifying rows have already been consumed.
//!
//! The offset only moves after a batch is durably written. The JSON file
//! store replaces its file atomically (tmp + fsync + rename), so a torn
//! write is never read back as a valid offset.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Durable single-value offset storage.
pub trait OffsetStore {
    /// Last durably written offset, or 0 if nothing was ever written.
    fn read(&self) -> Result<u64>;

    /// Atomically replace the stored offset.
    fn write(&mut self, offset: u64) -> Result<()>;
}

/// On-disk shape: `{"offset": <integer>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorState {
    pub offset: u64,
}

/// Offset kept in a small JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OffsetStore for JsonFileStore {
    fn read(&self) -> Result<u64> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No cursor at {}, starting at 0", self.path.display());
                return Ok(0);
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read cursor {}", self.path.display()));
            }
        };
        // A corrupt cursor is never silently reset: that would re-fetch from 0
        let state: CursorState = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt cursor file {}", self.path.display()))?;
        Ok(state.offset)
    }

    fn write(&mut self, offset: u64) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        breathe_core::write_json_atomic(&self.path, &CursorState { offset })
            .with_context(|| format!("Failed to write cursor {}", self.path.display()))?;
        log::debug!("Cursor {} -> {offset}", self.path.display());
        Ok(())
    }
}

/// Process-local store (tests, dry runs).
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    offset: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(offset: u64) -> Self {
        Self {
            offset: Some(offset),
        }
    }
}

impl OffsetStore for MemoryStore {
    fn read(&self) -> Result<u64> {
        Ok(self.offset.unwrap_or(0))
    }

    fn write(&mut self, offset: u64) -> Result<()> {
        self.offset = Some(offset);
        Ok(())
    }
}

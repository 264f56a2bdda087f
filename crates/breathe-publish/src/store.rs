//! Object store seam

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use breathe_core::RemoteError;
use indicatif::ProgressBar;

/// Destination for uploaded files.
pub trait ObjectStore {
    /// `gs://bucket` style location for logs.
    fn describe(&self) -> String;

    /// Upload the file at `path` under `key`, replacing any existing object.
    fn put_file(&self, key: &str, path: &Path, pb: &ProgressBar) -> Result<(), RemoteError>;
}

/// Keeps uploads in memory (tests, dry runs).
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of stored objects, sorted by key.
    pub fn objects(&self) -> BTreeMap<String, Vec<u8>> {
        self.objects
            .lock()
            .map(|objects| objects.clone())
            .unwrap_or_default()
    }
}

impl ObjectStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn put_file(&self, key: &str, path: &Path, _pb: &ProgressBar) -> Result<(), RemoteError> {
        let bytes = std::fs::read(path)?;
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| RemoteError::Decode("object map poisoned".into()))?;
        objects.insert(key.to_string(), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_store_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        let store = MemoryStore::new();
        let pb = ProgressBar::hidden();

        std::fs::write(&path, "one").unwrap();
        store.put_file("k", &path, &pb).unwrap();
        std::fs::write(&path, "two").unwrap();
        store.put_file("k", &path, &pb).unwrap();

        let objects = store.objects();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects["k"], b"two");
    }

    #[test]
    fn missing_file_is_io_error() {
        let store = MemoryStore::new();
        let err = store
            .put_file("k", Path::new("/nonexistent/file"), &ProgressBar::hidden())
            .unwrap_err();
        assert!(matches!(err, RemoteError::Io(_)));
    }
}

//! breathe-publish: mirror a local directory tree into object storage
//!
//! Keys are `<prefix>/<path relative to the local root>`, so re-publishing
//! the same tree overwrites the same objects.

pub mod gcs;
pub mod mirror;
pub mod store;

pub use gcs::{GcsConfig, GcsStore};
pub use mirror::{MirrorSummary, collect_files, mirror_dir, object_key};
pub use store::{MemoryStore, ObjectStore};

//! Object sources for the batch pipeline.
//!
//! - S3 (`S3ObjectStore`), the production backend
//! - A local directory tree (`FilesystemObjectStore`) for offline runs
//!
//! Listing order is lexicographic by key on both backends.

mod filesystem;
mod s3;

use anyhow::Result;
use std::path::{Component, Path, PathBuf};

pub use filesystem::FilesystemObjectStore;
pub use s3::{parse_list_objects, ListObjectsPage, S3ObjectStore};

/// One listed object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

pub trait ObjectStore {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    /// Every object in the bucket.
    fn list_objects(&mut self, bucket: &str) -> Result<Vec<ObjectSummary>>;

    /// Writes the object body to `dest`, replacing any existing file.
    fn download_object(&mut self, bucket: &str, key: &str, dest: &Path) -> Result<()>;
}

/// Local path for `key` under `root`. Separators in the key become
/// directories; `..`, root and prefix components are dropped so a key cannot
/// escape `root`.
pub fn local_path_for_key(root: &Path, key: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for component in Path::new(key).components() {
        if let Component::Normal(part) = component {
            path.push(part);
        }
    }
    path
}

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::{local_path_for_key, ObjectStore, ObjectSummary};

/// Buckets as directories under a root: `<root>/<bucket>/<key>`.
#[derive(Clone, Debug)]
pub struct FilesystemObjectStore {
    root: PathBuf,
}

impl FilesystemObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        local_path_for_key(&self.root, bucket)
    }
}

impl ObjectStore for FilesystemObjectStore {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    fn list_objects(&mut self, bucket: &str) -> Result<Vec<ObjectSummary>> {
        let dir = self.bucket_dir(bucket);
        if !dir.is_dir() {
            return Err(anyhow!("bucket directory {} does not exist", dir.display()));
        }
        let mut objects = Vec::new();
        collect_files(&dir, &dir, &mut objects)?;
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn download_object(&mut self, bucket: &str, key: &str, dest: &Path) -> Result<()> {
        let src = local_path_for_key(&self.bucket_dir(bucket), key);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create download dir {}", parent.display()))?;
        }
        fs::copy(&src, dest)
            .with_context(|| format!("copy {} to {}", src.display(), dest.display()))?;
        Ok(())
    }
}

fn collect_files(base: &Path, dir: &Path, out: &mut Vec<ObjectSummary>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("read directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(base, &path, out)?;
        } else if file_type.is_file() {
            let rel = path
                .strip_prefix(base)
                .map_err(|_| anyhow!("{} escaped bucket dir", path.display()))?;
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push(ObjectSummary {
                key,
                size: entry.metadata()?.len(),
            });
        }
    }
    Ok(())
}

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::detect::backend::{ImageRef, LabelDetector};
use crate::labels::{DetectLabelsOutput, Label};
use crate::store::local_path_for_key;

/// Offline backend serving canned `DetectLabels` responses.
///
/// The response for `bucket/key` is read from `<dir>/<key>.json`. A missing
/// file means the service found nothing. The bucket is ignored.
#[derive(Clone, Debug)]
pub struct FixtureDetector {
    dir: PathBuf,
}

impl FixtureDetector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn fixture_path(&self, key: &str) -> PathBuf {
        local_path_for_key(&self.dir, &format!("{}.json", key))
    }
}

impl LabelDetector for FixtureDetector {
    fn name(&self) -> &'static str {
        "fixture"
    }

    fn detect_labels(&mut self, image: &ImageRef, max_labels: u32) -> Result<Vec<Label>> {
        let path = self.fixture_path(&image.key);
        if !path.exists() {
            log::debug!("no fixture for {} at {}", image, path.display());
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("read label fixture {}", path.display()))?;
        let output: DetectLabelsOutput = serde_json::from_str(&raw)
            .with_context(|| format!("parse label fixture {}", path.display()))?;
        let mut labels = output.labels;
        labels.truncate(max_labels as usize);
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serves_and_truncates_fixture() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join("cam"))?;
        std::fs::write(
            dir.path().join("cam").join("x.jpg.json"),
            r#"{"Labels": [
                {"Name": "Car", "Confidence": 99.0, "Instances": []},
                {"Name": "Road", "Confidence": 95.0},
                {"Name": "Tree", "Confidence": 90.0}
            ]}"#,
        )?;
        let mut detector = FixtureDetector::new(dir.path());
        let labels = detector.detect_labels(&ImageRef::new("b", "cam/x.jpg"), 2)?;
        let names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Car", "Road"]);
        Ok(())
    }

    #[test]
    fn missing_fixture_means_no_labels() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut detector = FixtureDetector::new(dir.path());
        assert!(detector
            .detect_labels(&ImageRef::new("b", "none.jpg"), 10)?
            .is_empty());
        Ok(())
    }
}

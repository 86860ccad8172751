use anyhow::Result;
use std::fmt;

use crate::labels::Label;

/// An image stored in the object store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRef {
    pub bucket: String,
    pub key: String,
}

impl ImageRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Label detection backend.
///
/// Backends read the image straight from the object store by reference, so
/// the caller never uploads pixels. Labels come back in service order.
pub trait LabelDetector {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Detect up to `max_labels` labels for the image.
    fn detect_labels(&mut self, image: &ImageRef, max_labels: u32) -> Result<Vec<Label>>;
}

use anyhow::{Context, Result};
use serde_json::json;

use crate::aws::AwsClient;
use crate::detect::backend::{ImageRef, LabelDetector};
use crate::labels::{DetectLabelsOutput, Label};

const SERVICE: &str = "rekognition";
const JSON_VERSION: &str = "1.1";
const DETECT_LABELS_TARGET: &str = "RekognitionService.DetectLabels";

/// Amazon Rekognition `DetectLabels`, reading the image from S3.
pub struct RekognitionDetector {
    client: AwsClient,
}

impl RekognitionDetector {
    pub fn new(client: AwsClient) -> Self {
        Self { client }
    }
}

/// Request body for `DetectLabels` against an S3 object.
pub fn detect_labels_request(image: &ImageRef, max_labels: u32) -> serde_json::Value {
    json!({
        "Image": {
            "S3Object": {
                "Bucket": image.bucket,
                "Name": image.key,
            }
        },
        "MaxLabels": max_labels,
    })
}

impl LabelDetector for RekognitionDetector {
    fn name(&self) -> &'static str {
        "rekognition"
    }

    fn detect_labels(&mut self, image: &ImageRef, max_labels: u32) -> Result<Vec<Label>> {
        let payload = detect_labels_request(image, max_labels);
        let output: DetectLabelsOutput = self
            .client
            .call_json(SERVICE, JSON_VERSION, DETECT_LABELS_TARGET, &payload)
            .with_context(|| format!("detect labels for {}", image))?;
        log::debug!("{}: {} labels", image, output.labels.len());
        Ok(output.labels)
    }
}

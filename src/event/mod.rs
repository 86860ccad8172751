//! Upload-event handler: label one freshly uploaded object and store the
//! labels, one row per label.

mod lambda;
mod s3_notification;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::detect::{ImageRef, LabelDetector};
use crate::storage::{LabelRecord, LabelTable};

pub use lambda::{Invocation, LambdaRuntime};
pub use s3_notification::{parse_upload_event, UploadEvent};

/// Function response in the API Gateway proxy shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// JSON-encoded message, so a plain string arrives quoted.
    pub body: String,
}

impl HandlerResponse {
    pub fn ok(message: &str) -> Result<Self> {
        Ok(Self {
            status_code: 200,
            body: serde_json::to_string(message)?,
        })
    }
}

/// Detects labels for the uploaded object and writes one row per label.
///
/// No labels means no writes. Detector and table errors abort the event.
pub fn handle_upload_event(
    payload: &[u8],
    detector: &mut dyn LabelDetector,
    table: &mut dyn LabelTable,
    max_labels: u32,
) -> Result<HandlerResponse> {
    let event = parse_upload_event(payload)?;
    let image = ImageRef::new(&event.bucket, &event.key);
    log::info!("Processing upload {}", image);

    let labels = detector
        .detect_labels(&image, max_labels)
        .with_context(|| format!("detect labels for {}", image))?;

    if labels.is_empty() {
        log::info!("No labels found for {}", event.key);
    } else {
        for label in &labels {
            table.put_label(&LabelRecord {
                image_name: event.key.clone(),
                label_name: label.name.clone(),
                confidence: label.confidence,
            })?;
        }
        log::info!(
            "Labels stored for {} ({} rows, {} table)",
            event.key,
            labels.len(),
            table.name()
        );
    }

    HandlerResponse::ok(&format!("Processing complete for {}", event.key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_body_is_json_string() {
        let response = HandlerResponse::ok("Processing complete for x.jpg").expect("response");
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "\"Processing complete for x.jpg\"");
        let wire = serde_json::to_value(&response).expect("json");
        assert_eq!(wire["statusCode"], 200);
    }
}

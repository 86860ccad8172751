use anyhow::{anyhow, Result};
use serde_json::json;

use traffic_labels::{
    handle_upload_event, ImageRef, InMemoryLabelTable, Label, LabelDetector, LabelRecord,
    SqliteLabelTable,
};

/// Returns fixed labels and remembers what it was asked for.
struct StaticDetector {
    labels: Vec<Label>,
    calls: Vec<(ImageRef, u32)>,
}

impl StaticDetector {
    fn new(labels: Vec<Label>) -> Self {
        Self {
            labels,
            calls: Vec::new(),
        }
    }
}

impl LabelDetector for StaticDetector {
    fn name(&self) -> &'static str {
        "static"
    }

    fn detect_labels(&mut self, image: &ImageRef, max_labels: u32) -> Result<Vec<Label>> {
        self.calls.push((image.clone(), max_labels));
        Ok(self.labels.clone())
    }
}

struct FailingDetector;

impl LabelDetector for FailingDetector {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn detect_labels(&mut self, _image: &ImageRef, _max_labels: u32) -> Result<Vec<Label>> {
        Err(anyhow!("service unavailable"))
    }
}

fn label(name: &str, confidence: f64) -> Label {
    Label {
        name: name.to_string(),
        confidence,
        instances: Vec::new(),
    }
}

fn notification(bucket: &str, key: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "Records": [{
            "eventName": "ObjectCreated:Put",
            "s3": {
                "bucket": { "name": bucket },
                "object": { "key": key }
            }
        }]
    }))
    .expect("payload")
}

#[test]
fn two_labels_two_writes() {
    let mut detector = StaticDetector::new(vec![label("Car", 99.1), label("Road", 87.5)]);
    let mut table = InMemoryLabelTable::new();

    let response = handle_upload_event(
        &notification("trafficlabels", "x.jpg"),
        &mut detector,
        &mut table,
        10,
    )
    .expect("handle");

    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, "\"Processing complete for x.jpg\"");
    assert_eq!(table.writes(), 2);
    assert_eq!(
        table.records(),
        &[
            LabelRecord {
                image_name: "x.jpg".to_string(),
                label_name: "Car".to_string(),
                confidence: 99.1
            },
            LabelRecord {
                image_name: "x.jpg".to_string(),
                label_name: "Road".to_string(),
                confidence: 87.5
            },
        ]
    );
    assert_eq!(
        detector.calls,
        vec![(ImageRef::new("trafficlabels", "x.jpg"), 10)]
    );
}

#[test]
fn no_labels_no_writes() {
    let mut detector = StaticDetector::new(Vec::new());
    let mut table = InMemoryLabelTable::new();
    let response = handle_upload_event(
        &notification("trafficlabels", "empty+lot.jpg"),
        &mut detector,
        &mut table,
        10,
    )
    .expect("handle");
    assert_eq!(table.writes(), 0);
    assert_eq!(response.body, "\"Processing complete for empty lot.jpg\"");
}

#[test]
fn redelivered_event_overwrites_rows() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("labels.db");
    let mut table = SqliteLabelTable::open(db.to_str().expect("utf8 path"))?;
    let payload = notification("trafficlabels", "x.jpg");

    let mut detector = StaticDetector::new(vec![label("Car", 90.0), label("Truck", 70.0)]);
    handle_upload_event(&payload, &mut detector, &mut table, 10)?;
    let mut detector = StaticDetector::new(vec![label("Car", 92.0), label("Truck", 71.0)]);
    handle_upload_event(&payload, &mut detector, &mut table, 10)?;

    let rows = table.labels_for_image("x.jpg")?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].confidence, 92.0);
    assert_eq!(rows[1].confidence, 71.0);
    Ok(())
}

#[test]
fn errors_propagate_without_writes() {
    let mut table = InMemoryLabelTable::new();
    let result = handle_upload_event(
        &notification("trafficlabels", "x.jpg"),
        &mut FailingDetector,
        &mut table,
        10,
    );
    assert!(result.is_err());
    assert_eq!(table.writes(), 0);

    let mut detector = StaticDetector::new(vec![label("Car", 99.0)]);
    assert!(handle_upload_event(br#"{"Records": []}"#, &mut detector, &mut table, 10).is_err());
    assert!(detector.calls.is_empty());
}

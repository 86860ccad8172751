use std::fs;
use std::path::Path;

use image::RgbImage;
use tempfile::TempDir;

use traffic_labels::config::{LabelerConfig, RenderSettings};
use traffic_labels::report::{TOTAL_PER_TYPE_ROW, TOTAL_VEHICLES_ROW};
use traffic_labels::{
    process_bucket, FilesystemObjectStore, FixtureDetector, Renderer, VehicleType,
};

const BUCKET: &str = "trafficlabels";

struct Workspace {
    _dir: TempDir,
    cfg: LabelerConfig,
    objects_root: std::path::PathBuf,
    labels_dir: std::path::PathBuf,
}

fn workspace() -> Workspace {
    let dir = tempfile::tempdir().expect("tempdir");
    let objects_root = dir.path().join("buckets");
    let labels_dir = dir.path().join("labels");
    fs::create_dir_all(objects_root.join(BUCKET)).expect("bucket dir");
    fs::create_dir_all(&labels_dir).expect("labels dir");

    let mut cfg = LabelerConfig::default();
    cfg.bucket = BUCKET.to_string();
    cfg.output_dir = dir.path().join("out");
    cfg.download_dir = dir.path().join("downloads");
    Workspace {
        _dir: dir,
        cfg,
        objects_root,
        labels_dir,
    }
}

fn renderer() -> Renderer {
    Renderer::new(&RenderSettings {
        font_path: "/nonexistent/font.ttf".into(),
        font_size: 10.0,
    })
    .expect("renderer")
}

fn add_image(ws: &Workspace, key: &str, labels_json: Option<&str>) {
    let path = ws.objects_root.join(BUCKET).join(key);
    RgbImage::new(64, 48).save(&path).expect("save image");
    if let Some(json) = labels_json {
        fs::write(ws.labels_dir.join(format!("{}.json", key)), json).expect("fixture");
    }
}

fn instance(left: f32, top: f32) -> String {
    format!(
        r#"{{"BoundingBox": {{"Left": {}, "Top": {}, "Width": 0.5, "Height": 0.5}}, "Confidence": 97.0}}"#,
        left, top
    )
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn counts_annotates_and_exports() {
    let ws = workspace();
    add_image(
        &ws,
        "a.png",
        Some(&format!(
            r#"{{"Labels": [{{"Name": "Car", "Confidence": 98.5, "Instances": [{}]}}]}}"#,
            instance(0.25, 0.25)
        )),
    );
    add_image(
        &ws,
        "b.png",
        Some(&format!(
            r#"{{"Labels": [
                {{"Name": "Car", "Confidence": 95.0, "Instances": [{}, {}]}},
                {{"Name": "Bus", "Confidence": 90.0, "Instances": [{}]}},
                {{"Name": "Road", "Confidence": 99.0}}
            ]}}"#,
            instance(0.0, 0.0),
            instance(0.5, 0.5),
            instance(0.1, 0.4)
        )),
    );
    add_image(&ws, "c.png", None);

    let mut store = FilesystemObjectStore::new(ws.objects_root.clone());
    let mut detector = FixtureDetector::new(ws.labels_dir.clone());
    let outcome =
        process_bucket(&ws.cfg, &mut store, &mut detector, &renderer()).expect("pipeline");

    let report = &outcome.report;
    let photos: Vec<&str> = report.rows().iter().map(|r| r.photo.as_str()).collect();
    assert_eq!(photos, vec!["a.png", "b.png", "c.png"]);
    assert_eq!(report.totals().get(VehicleType::Car), 3);
    assert_eq!(report.totals().get(VehicleType::Bus), 1);
    assert_eq!(report.totals().get(VehicleType::Truck), 0);
    assert_eq!(report.grand_total(), 4);
    assert!(report.rows()[2].counts.is_zero());

    let lines = report.lines();
    assert_eq!(lines[3].photo, TOTAL_PER_TYPE_ROW);
    assert_eq!(lines[4].photo, TOTAL_VEHICLES_ROW);
    assert_eq!(lines[4].total, Some(4));

    assert_eq!(
        file_names(&ws.cfg.output_dir),
        vec![
            "output_a.png",
            "output_b.png",
            "output_c.png",
            "vehicle_stats_with_totals.xlsx"
        ]
    );
    assert_eq!(outcome.annotated.len(), 3);
    assert_eq!(outcome.report_path, Some(ws.cfg.report_path()));

    // Left edge of the box at (16, 12)-(48, 36) on the 64x48 image.
    let annotated = image::open(ws.cfg.output_dir.join("output_a.png"))
        .expect("open annotated")
        .into_rgb8();
    assert_eq!(annotated.get_pixel(16, 24).0, [255, 0, 0]);
    assert_eq!(annotated.get_pixel(32, 24).0, [0, 0, 0]);

    // Originals were downloaded into the working directory.
    assert!(ws.cfg.download_dir.join("b.png").is_file());
}

#[test]
fn empty_bucket_writes_nothing() {
    let ws = workspace();
    let mut store = FilesystemObjectStore::new(ws.objects_root.clone());
    let mut detector = FixtureDetector::new(ws.labels_dir.clone());

    let outcome =
        process_bucket(&ws.cfg, &mut store, &mut detector, &renderer()).expect("pipeline");

    assert!(outcome.report.is_empty());
    assert!(outcome.annotated.is_empty());
    assert!(outcome.report_path.is_none());
    assert!(!ws.cfg.output_dir.exists());
}

#[test]
fn missing_bucket_fails() {
    let mut ws = workspace();
    ws.cfg.bucket = "no-such-bucket".to_string();
    let mut store = FilesystemObjectStore::new(ws.objects_root.clone());
    let mut detector = FixtureDetector::new(ws.labels_dir.clone());
    assert!(process_bucket(&ws.cfg, &mut store, &mut detector, &renderer()).is_err());
}

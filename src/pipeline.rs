//! Batch pipeline: list a bucket, label every object, annotate local copies
//! and export the vehicle counts.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::config::LabelerConfig;
use crate::detect::{ImageRef, LabelDetector};
use crate::filter::filter_vehicle_labels;
use crate::render::Renderer;
use crate::report::VehicleReport;
use crate::store::{local_path_for_key, ObjectStore};

/// What one batch run produced.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub report: VehicleReport,
    pub annotated: Vec<PathBuf>,
    /// `None` when the bucket was empty and nothing was exported.
    pub report_path: Option<PathBuf>,
}

/// Progress hooks for front ends. All methods default to no-ops.
pub trait BatchObserver {
    fn listed(&mut self, _objects: usize) {}
    fn object_done(&mut self, _key: &str) {}
}

impl BatchObserver for () {}

pub fn process_bucket(
    cfg: &LabelerConfig,
    store: &mut dyn ObjectStore,
    detector: &mut dyn LabelDetector,
    renderer: &Renderer,
) -> Result<BatchOutcome> {
    process_bucket_with(cfg, store, detector, renderer, &mut ())
}

/// Runs the pipeline sequentially, one object at a time. The first failing
/// object aborts the run.
pub fn process_bucket_with(
    cfg: &LabelerConfig,
    store: &mut dyn ObjectStore,
    detector: &mut dyn LabelDetector,
    renderer: &Renderer,
    observer: &mut dyn BatchObserver,
) -> Result<BatchOutcome> {
    let objects = store
        .list_objects(&cfg.bucket)
        .with_context(|| format!("list bucket {}", cfg.bucket))?;
    observer.listed(objects.len());
    if objects.is_empty() {
        log::warn!("No files found in bucket {}", cfg.bucket);
        return Ok(BatchOutcome::default());
    }
    log::info!(
        "{} objects in bucket {} ({} store, {} detector)",
        objects.len(),
        cfg.bucket,
        store.name(),
        detector.name()
    );

    let mut outcome = BatchOutcome::default();
    for object in &objects {
        log::info!("Processing file: {}", object.key);
        let local = local_path_for_key(&cfg.download_dir, &object.key);
        store.download_object(&cfg.bucket, &object.key, &local)?;

        let image = ImageRef::new(&cfg.bucket, &object.key);
        let labels = detector
            .detect_labels(&image, cfg.max_labels)
            .with_context(|| format!("detect labels for {}", image))?;
        if labels.is_empty() {
            log::warn!("No labels found for {}", object.key);
        }

        let counts = filter_vehicle_labels(&labels);
        outcome.report.record(&object.key, counts);
        let annotated = renderer.annotate_file(&local, &labels, &cfg.output_dir)?;
        outcome.annotated.push(annotated);
        observer.object_done(&object.key);
    }

    outcome.report.log_statistics();
    let report_path = cfg.report_path();
    outcome.report.write_xlsx(&report_path)?;
    outcome.report_path = Some(report_path);
    Ok(outcome)
}

//! label_bucket - label every image in a bucket and export vehicle counts
//!
//! Runs against S3 and Rekognition by default. With `--local-root` the bucket
//! is a directory and labels come from canned `DetectLabels` responses.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use traffic_labels::aws::AwsClient;
use traffic_labels::config::LocalSettings;
use traffic_labels::{
    process_bucket_with, FilesystemObjectStore, FixtureDetector, LabelDetector, LabelerConfig,
    ObjectStore, RekognitionDetector, Renderer, S3ObjectStore,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (TOML or JSON).
    #[arg(long, env = "LABELER_CONFIG")]
    config: Option<PathBuf>,
    /// Bucket to label.
    #[arg(long)]
    bucket: Option<String>,
    /// Directory for annotated images and the spreadsheet.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Read buckets from this directory instead of S3.
    #[arg(long)]
    local_root: Option<PathBuf>,
    /// Canned label responses for local runs (default: <local-root>/labels).
    #[arg(long, requires = "local_root")]
    labels_dir: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let cfg = {
        let _stage = ui.stage("Load config");
        load_config(&args)?
    };

    let (mut store, mut detector) = {
        let _stage = ui.stage("Connect backends");
        backends(&cfg)?
    };
    let renderer = Renderer::new(&cfg.render)?;

    let mut progress = ui.objects();
    let outcome = process_bucket_with(
        &cfg,
        store.as_mut(),
        detector.as_mut(),
        &renderer,
        &mut progress,
    )?;
    drop(progress);

    match &outcome.report_path {
        Some(path) => println!(
            "{} images, {} vehicles, report {}",
            outcome.report.rows().len(),
            outcome.report.grand_total(),
            path.display()
        ),
        None => println!("bucket {} is empty; nothing written", cfg.bucket),
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<LabelerConfig> {
    let mut cfg = LabelerConfig::load_from(args.config.as_deref())?;
    if let Some(bucket) = &args.bucket {
        cfg.bucket = bucket.clone();
    }
    if let Some(dir) = &args.output_dir {
        cfg.output_dir = dir.clone();
    }
    if let Some(root) = &args.local_root {
        let labels_dir = args
            .labels_dir
            .clone()
            .unwrap_or_else(|| root.join("labels"));
        cfg.local = Some(LocalSettings {
            objects_root: root.clone(),
            labels_dir,
        });
    }
    cfg.validate()?;
    Ok(cfg)
}

type Backends = (Box<dyn ObjectStore>, Box<dyn LabelDetector>);

fn backends(cfg: &LabelerConfig) -> Result<Backends> {
    if let Some(local) = &cfg.local {
        if !local.objects_root.is_dir() {
            return Err(anyhow!(
                "local root {} is not a directory",
                local.objects_root.display()
            ));
        }
        log::info!(
            "local backends: objects {} labels {}",
            local.objects_root.display(),
            local.labels_dir.display()
        );
        return Ok((
            Box::new(FilesystemObjectStore::new(local.objects_root.clone())),
            Box::new(FixtureDetector::new(local.labels_dir.clone())),
        ));
    }
    let client = AwsClient::from_settings(&cfg.aws)?;
    log::info!("aws backends in {}", client.region());
    Ok((
        Box::new(S3ObjectStore::new(client.clone())),
        Box::new(RekognitionDetector::new(client)),
    ))
}

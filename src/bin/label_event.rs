//! label_event - upload-event handler
//!
//! Inside Lambda it serves invocations from the runtime API. With
//! `--event-file` it handles one S3 notification from disk and prints the
//! response.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use traffic_labels::aws::AwsClient;
use traffic_labels::event::LambdaRuntime;
use traffic_labels::{
    handle_upload_event, DynamoLabelTable, FixtureDetector, LabelDetector, LabelTable,
    LabelerConfig, RekognitionDetector, SqliteLabelTable,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (TOML or JSON).
    #[arg(long, env = "LABELER_CONFIG")]
    config: Option<PathBuf>,
    /// Handle a single notification from this file instead of the runtime API.
    #[arg(long)]
    event_file: Option<PathBuf>,
    /// Canned label responses instead of Rekognition.
    #[arg(long)]
    labels_dir: Option<PathBuf>,
    /// SQLite label table instead of DynamoDB.
    #[arg(long)]
    db_path: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let cfg = LabelerConfig::load_from(args.config.as_deref())?;
    let max_labels = cfg.event.max_labels;

    let mut detector = detector(&args, &cfg)?;
    let mut table = table(&args, &cfg)?;
    log::info!(
        "label_event ready (detector={}, table={}, max_labels={})",
        detector.name(),
        table.name(),
        max_labels
    );

    if let Some(path) = &args.event_file {
        let payload =
            std::fs::read(path).with_context(|| format!("read event file {}", path.display()))?;
        let response =
            handle_upload_event(&payload, detector.as_mut(), table.as_mut(), max_labels)?;
        println!("{}", serde_json::to_string(&response)?);
        return Ok(());
    }

    let runtime = LambdaRuntime::from_env()?;
    runtime.run(|invocation| {
        let response = handle_upload_event(
            &invocation.payload,
            detector.as_mut(),
            table.as_mut(),
            max_labels,
        )?;
        Ok(serde_json::to_vec(&response)?)
    })
}

fn detector(args: &Args, cfg: &LabelerConfig) -> Result<Box<dyn LabelDetector>> {
    match &args.labels_dir {
        Some(dir) => Ok(Box::new(FixtureDetector::new(dir.clone()))),
        None => Ok(Box::new(RekognitionDetector::new(AwsClient::from_settings(
            &cfg.aws,
        )?))),
    }
}

fn table(args: &Args, cfg: &LabelerConfig) -> Result<Box<dyn LabelTable>> {
    match &args.db_path {
        Some(path) => Ok(Box::new(SqliteLabelTable::open(path)?)),
        None => Ok(Box::new(DynamoLabelTable::new(
            AwsClient::from_settings(&cfg.aws)?,
            cfg.event.table.clone(),
        ))),
    }
}

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BUCKET: &str = "trafficlabels";
const DEFAULT_OUTPUT_DIR: &str = "./processed_results";
const DEFAULT_REPORT_NAME: &str = "vehicle_stats_with_totals.xlsx";
const DEFAULT_MAX_LABELS: u32 = 20;
const DEFAULT_EVENT_MAX_LABELS: u32 = 10;
const DEFAULT_TABLE: &str = "trafficlabels";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_FONT_PATH: &str = "/Library/Fonts/Arial.ttf";
const DEFAULT_FONT_SIZE: f32 = 10.0;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize, Default)]
struct LabelerConfigFile {
    bucket: Option<String>,
    output_dir: Option<PathBuf>,
    download_dir: Option<PathBuf>,
    report_name: Option<String>,
    max_labels: Option<u32>,
    aws: Option<AwsConfigFile>,
    render: Option<RenderConfigFile>,
    event: Option<EventConfigFile>,
    local: Option<LocalConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct AwsConfigFile {
    region: Option<String>,
    profile: Option<String>,
    endpoint_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    font_path: Option<PathBuf>,
    font_size: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct EventConfigFile {
    table: Option<String>,
    max_labels: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct LocalConfigFile {
    objects_root: Option<PathBuf>,
    labels_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct LabelerConfig {
    pub bucket: String,
    pub output_dir: PathBuf,
    /// Working directory for downloaded originals.
    pub download_dir: PathBuf,
    pub report_name: String,
    /// `MaxLabels` for the batch pipeline.
    pub max_labels: u32,
    pub aws: AwsSettings,
    pub render: RenderSettings,
    pub event: EventSettings,
    /// When set, the batch pipeline reads from local backends instead of AWS.
    pub local: Option<LocalSettings>,
}

#[derive(Debug, Clone)]
pub struct AwsSettings {
    pub region: String,
    /// Shared-credentials profile. `None` means env credentials first.
    pub profile: Option<String>,
    /// Endpoint override for every service (LocalStack, MinIO). S3 switches
    /// to path-style addressing.
    pub endpoint_url: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub font_path: PathBuf,
    pub font_size: f32,
}

#[derive(Debug, Clone)]
pub struct EventSettings {
    pub table: String,
    pub max_labels: u32,
}

#[derive(Debug, Clone)]
pub struct LocalSettings {
    /// Directory holding one subdirectory per bucket.
    pub objects_root: PathBuf,
    /// Canned `DetectLabels` responses, one `<key>.json` per object.
    pub labels_dir: PathBuf,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self::from_file(LabelerConfigFile::default())
    }
}

impl LabelerConfig {
    /// Loads `LABELER_CONFIG` (if set), applies env overrides, validates.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("LABELER_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like [`LabelerConfig::load`] with an explicit file path.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Path of the spreadsheet written by the batch pipeline.
    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(&self.report_name)
    }

    fn from_file(file: LabelerConfigFile) -> Self {
        let aws = AwsSettings {
            region: file
                .aws
                .as_ref()
                .and_then(|aws| aws.region.clone())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            profile: file.aws.as_ref().and_then(|aws| aws.profile.clone()),
            endpoint_url: file.aws.as_ref().and_then(|aws| aws.endpoint_url.clone()),
            timeout: Duration::from_secs(
                file.aws
                    .as_ref()
                    .and_then(|aws| aws.timeout_secs)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        };
        let render = RenderSettings {
            font_path: file
                .render
                .as_ref()
                .and_then(|render| render.font_path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FONT_PATH)),
            font_size: file
                .render
                .as_ref()
                .and_then(|render| render.font_size)
                .unwrap_or(DEFAULT_FONT_SIZE),
        };
        let event = EventSettings {
            table: file
                .event
                .as_ref()
                .and_then(|event| event.table.clone())
                .unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            max_labels: file
                .event
                .as_ref()
                .and_then(|event| event.max_labels)
                .unwrap_or(DEFAULT_EVENT_MAX_LABELS),
        };
        let local = file.local.and_then(|local| {
            let objects_root = local.objects_root?;
            let labels_dir = local
                .labels_dir
                .unwrap_or_else(|| objects_root.join("labels"));
            Some(LocalSettings {
                objects_root,
                labels_dir,
            })
        });
        Self {
            bucket: file.bucket.unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            output_dir: file
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            download_dir: file.download_dir.unwrap_or_else(std::env::temp_dir),
            report_name: file
                .report_name
                .unwrap_or_else(|| DEFAULT_REPORT_NAME.to_string()),
            max_labels: file.max_labels.unwrap_or(DEFAULT_MAX_LABELS),
            aws,
            render,
            event,
            local,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(bucket) = non_empty_env("LABELER_BUCKET") {
            self.bucket = bucket;
        }
        if let Some(dir) = non_empty_env("LABELER_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = non_empty_env("LABELER_DOWNLOAD_DIR") {
            self.download_dir = PathBuf::from(dir);
        }
        if let Some(raw) = non_empty_env("LABELER_MAX_LABELS") {
            self.max_labels = raw
                .parse()
                .map_err(|_| anyhow!("LABELER_MAX_LABELS must be a positive integer"))?;
        }
        if let Some(path) = non_empty_env("LABELER_FONT_PATH") {
            self.render.font_path = PathBuf::from(path);
        }
        if let Some(table) = non_empty_env("LABELER_TABLE") {
            self.event.table = table;
        }
        if let Some(url) = non_empty_env("LABELER_ENDPOINT_URL") {
            self.aws.endpoint_url = Some(url);
        }
        if let Some(region) =
            non_empty_env("AWS_REGION").or_else(|| non_empty_env("AWS_DEFAULT_REGION"))
        {
            self.aws.region = region;
        }
        if let Some(profile) = non_empty_env("AWS_PROFILE") {
            self.aws.profile = Some(profile);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(anyhow!("bucket must not be empty"));
        }
        if self.report_name.trim().is_empty() {
            return Err(anyhow!("report_name must not be empty"));
        }
        if self.max_labels == 0 || self.event.max_labels == 0 {
            return Err(anyhow!("max_labels must be at least 1"));
        }
        if self.event.table.trim().is_empty() {
            return Err(anyhow!("event table name must not be empty"));
        }
        if self.aws.region.trim().is_empty() {
            return Err(anyhow!("aws region must not be empty"));
        }
        if self.render.font_size.is_nan() || self.render.font_size <= 0.0 {
            return Err(anyhow!("font_size must be greater than zero"));
        }
        if self.aws.timeout.is_zero() {
            return Err(anyhow!("request timeout must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<LabelerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_batch_tool() {
        let cfg = LabelerConfig::default();
        assert_eq!(cfg.bucket, "trafficlabels");
        assert_eq!(cfg.max_labels, 20);
        assert_eq!(cfg.event.max_labels, 10);
        assert_eq!(cfg.event.table, "trafficlabels");
        assert_eq!(
            cfg.report_path(),
            PathBuf::from("./processed_results/vehicle_stats_with_totals.xlsx")
        );
        assert!(cfg.local.is_none());
        cfg.validate().expect("defaults are valid");
    }

    #[test]
    fn local_labels_dir_defaults_under_root() {
        let cfg = LabelerConfig::from_file(LabelerConfigFile {
            local: Some(LocalConfigFile {
                objects_root: Some(PathBuf::from("/data/buckets")),
                labels_dir: None,
            }),
            ..Default::default()
        });
        let local = cfg.local.expect("local settings");
        assert_eq!(local.labels_dir, PathBuf::from("/data/buckets/labels"));
    }

    #[test]
    fn validate_rejects_zero_max_labels() {
        let mut cfg = LabelerConfig::default();
        cfg.max_labels = 0;
        assert!(cfg.validate().is_err());
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub s3: S3Config,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub watermark: WatermarkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    /// Key prefix the load balancer writes under, without the date suffix.
    pub base_path: String,
    /// First date to ingest when no successful run has ever been recorded.
    pub start_date: NaiveDate,
    pub region: Option<String>,
    /// Non-AWS endpoints (minio, localstack) for dev profiles.
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatermarkConfig {
    #[serde(default)]
    pub backend: WatermarkBackend,
    /// Only read when backend = file.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            backend: WatermarkBackend::default(),
            state_file: default_state_file(),
        }
    }
}

fn default_state_file() -> PathBuf {
    PathBuf::from("last_sync.json")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkBackend {
    /// Run history rows in the same database as the ingested records.
    #[default]
    Database,
    /// Legacy single-host JSON state file.
    File,
}

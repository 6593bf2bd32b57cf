pub mod file;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

pub use file::JsonFileWatermark;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("state file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid date in state file: {year}-{month}-{day}")]
    InvalidDate { year: i32, month: u32, day: u32 },

    #[error("run history error: {0}")]
    Database(String),
}

/// Persisted record of how far ingestion has gotten. The orchestrator reads
/// the last fully-successful run date at startup and records one outcome per
/// processed date. Backends: the run-history table in the ingest database
/// (authoritative, shares its durability boundary with the record writes) and
/// a legacy JSON state file.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Most recent date recorded with success = true, or `None` if no
    /// successful run has ever completed.
    async fn last_successful_run_date(&self) -> Result<Option<NaiveDate>, WatermarkError>;

    /// Record the outcome for one date. Idempotent: recording the same
    /// date + outcome again has no additional effect.
    async fn record_run_outcome(
        &self,
        date: NaiveDate,
        success: bool,
    ) -> Result<(), WatermarkError>;
}

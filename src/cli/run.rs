use crate::config::{load_config, resolve_profile_path, WatermarkBackend};
use crate::parser::AlbLineParser;
use crate::pipeline::runner::{run as run_pipeline, IngestPipeline, RunOutcome};
use crate::source::S3ObjectStore;
use crate::storage::{DuckDbStorage, LogSink};
use crate::watermark::{JsonFileWatermark, WatermarkStore};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::runner::RunError),

    #[error("ingestion failed at {date}: {reason}")]
    DateFailed {
        date: chrono::NaiveDate,
        reason: String,
    },
}

pub async fn run(
    env_name: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let profile_path = resolve_profile_path(env_name.as_deref(), config_path.as_deref());
    run_ingestion(env_name.as_deref(), &profile_path)
        .await
        .map_err(|e| e.into())
}

async fn run_ingestion(env_name: Option<&str>, profile_path: &Path) -> Result<(), RunError> {
    info!(
        env = env_name.unwrap_or("local"),
        profile = %profile_path.display(),
        "Loading configuration profile"
    );

    // Config problems are fatal before any I/O happens
    let config = load_config(profile_path)?;

    info!(path = %config.database.path.display(), "Opening ingest database");
    let storage = Arc::new(DuckDbStorage::new(&config.database.path)?);
    storage.init_schema().await?;

    let watermark: Arc<dyn WatermarkStore> = match config.watermark.backend {
        WatermarkBackend::Database => storage.clone(),
        WatermarkBackend::File => {
            warn!(
                state_file = %config.watermark.state_file.display(),
                "Using legacy file watermark backend; it does not share the \
                 database's durability boundary"
            );
            Arc::new(JsonFileWatermark::new(config.watermark.state_file.clone()))
        }
    };

    info!(bucket = %config.s3.bucket, "Connecting to object storage");
    let objects = Arc::new(S3ObjectStore::from_config(&config.s3).await);

    let pipeline = IngestPipeline {
        objects,
        sink: storage.clone(),
        watermark,
        parser: AlbLineParser::new(),
        base_path: config.s3.base_path.clone(),
        fallback_start: config.s3.start_date,
    };

    // Ctrl+C flips the shutdown flag; the pipeline stops at the next date
    // boundary without recording a false success.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let today = Utc::now().date_naive();
    let summary = run_pipeline(&pipeline, today, &shutdown_rx).await?;

    match summary.outcome {
        RunOutcome::NoOp => {
            info!("Already up to date, no dates to process");
        }
        RunOutcome::Completed => {
            info!(
                records = summary.records_ingested,
                dropped = summary.lines_dropped,
                objects = summary.objects_processed,
                dates = summary.dates_completed,
                watermark = ?summary.watermark,
                "Ingestion run complete"
            );
        }
        RunOutcome::Cancelled => {
            info!(
                records = summary.records_ingested,
                dates = summary.dates_completed,
                watermark = ?summary.watermark,
                "Ingestion run cancelled cleanly"
            );
        }
        RunOutcome::Failed { date, error } => {
            error!(
                date = %date,
                error = %error,
                watermark = ?summary.watermark,
                "Ingestion halted; the failed date will be retried next run"
            );
            return Err(RunError::DateFailed {
                date,
                reason: error.to_string(),
            });
        }
    }

    Ok(())
}

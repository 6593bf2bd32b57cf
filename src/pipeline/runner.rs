use crate::parser::AlbLineParser;
use crate::pipeline::dates::{prefix_for_date, sync_window};
use crate::source::{fetch_lines, FetchError, ObjectStore};
use crate::storage::{LogSink, StorageError};
use crate::watermark::{WatermarkError, WatermarkStore};
use chrono::NaiveDate;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Failure of one date's processing. Halts the run at that date; the
/// watermark stays at the last fully-completed date and the failing date is
/// retried wholesale on the next invocation.
#[derive(Debug, Error)]
pub enum DateError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("write failed: {0}")]
    Write(#[from] StorageError),
}

/// Errors outside the per-date failure protocol. These abort the run
/// immediately: if run bookkeeping itself cannot be trusted, continuing
/// could corrupt the watermark.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("watermark error: {0}")]
    Watermark(#[from] WatermarkError),
}

#[derive(Debug)]
pub enum RunOutcome {
    /// Nothing to do: the computed start date was after yesterday.
    NoOp,
    /// Every date in the window completed and advanced the watermark.
    Completed,
    /// Shutdown requested; stopped cleanly at a date boundary.
    Cancelled,
    /// Processing halted at this date. Earlier dates' advances are durable.
    Failed { date: NaiveDate, error: DateError },
}

/// What a run did, for reporting. A successful run carries the record count
/// and the new watermark; a failed one names the date to resume from.
#[derive(Debug)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub records_ingested: usize,
    pub lines_dropped: usize,
    pub objects_processed: usize,
    pub dates_completed: usize,
    pub watermark: Option<NaiveDate>,
}

/// The ingestion driver. All collaborators are injected so the pipeline runs
/// identically against S3 + a database file and against in-memory doubles.
pub struct IngestPipeline {
    pub objects: Arc<dyn ObjectStore>,
    pub sink: Arc<dyn LogSink>,
    pub watermark: Arc<dyn WatermarkStore>,
    pub parser: AlbLineParser,
    pub base_path: String,
    pub fallback_start: NaiveDate,
}

struct DateTally {
    records: usize,
    dropped: usize,
    objects: usize,
}

impl IngestPipeline {
    /// Process everything a single object contributes: fetch, decompress,
    /// parse line by line, then write the batch in one transaction.
    async fn process_object(&self, key: &str) -> Result<(usize, usize), DateError> {
        let lines = fetch_lines(self.objects.as_ref(), key).await?;

        let mut records = Vec::with_capacity(lines.len());
        let mut dropped = 0usize;
        for line in &lines {
            match self.parser.parse(line) {
                Some(mut record) => {
                    record.source_file = key.to_string();
                    records.push(record);
                }
                None => {
                    dropped += 1;
                    debug!(key = %key, line = %line, "Line does not match grammar, dropping");
                }
            }
        }

        if dropped > 0 {
            warn!(
                key = %key,
                dropped = dropped,
                total = lines.len(),
                "Some lines did not match the access-log grammar"
            );
        }

        let inserted = self.sink.write_object_batch(key, &records).await?;
        Ok((inserted, dropped))
    }

    /// Process every discovered object for one date. The date only counts as
    /// successful if each object was fetched, parsed and written.
    async fn process_date(&self, date: NaiveDate) -> Result<DateTally, DateError> {
        let prefix = prefix_for_date(&self.base_path, date);
        let keys = self.objects.list(&prefix).await?;
        info!(date = %date, prefix = %prefix, objects = keys.len(), "Processing date");

        let mut tally = DateTally {
            records: 0,
            dropped: 0,
            objects: 0,
        };

        for key in &keys {
            let (inserted, dropped) = self.process_object(key).await?;
            debug!(key = %key, inserted = inserted, "Object written");
            tally.records += inserted;
            tally.dropped += dropped;
            tally.objects += 1;
        }

        Ok(tally)
    }
}

/// Run one ingestion pass: resume from the watermark (or the configured
/// fallback on a first run), process each date through yesterday in order,
/// and advance the watermark date by date. `today` is passed in so runs are
/// reproducible in tests; callers use `Utc::now().date_naive()`.
pub async fn run(
    pipeline: &IngestPipeline,
    today: NaiveDate,
    shutdown: &watch::Receiver<bool>,
) -> Result<RunSummary, RunError> {
    let last_successful = pipeline.watermark.last_successful_run_date().await?;
    match last_successful {
        Some(date) => info!(watermark = %date, "Resuming from last successful run date"),
        None => info!(
            fallback = %pipeline.fallback_start,
            "No successful run recorded, starting from fallback date"
        ),
    }

    let window = sync_window(last_successful, pipeline.fallback_start, today);

    let mut summary = RunSummary {
        outcome: RunOutcome::NoOp,
        records_ingested: 0,
        lines_dropped: 0,
        objects_processed: 0,
        dates_completed: 0,
        watermark: last_successful,
    };

    if window.is_empty() {
        info!("Sync is already up to date, nothing to process");
        return Ok(summary);
    }

    summary.outcome = RunOutcome::Completed;

    for date in window {
        // Cancellation point: only between dates, so a date is either fully
        // processed and recorded, or untouched.
        if *shutdown.borrow() {
            info!(date = %date, "Shutdown requested, stopping before date");
            summary.outcome = RunOutcome::Cancelled;
            break;
        }

        match pipeline.process_date(date).await {
            Ok(tally) => {
                pipeline.watermark.record_run_outcome(date, true).await?;
                summary.records_ingested += tally.records;
                summary.lines_dropped += tally.dropped;
                summary.objects_processed += tally.objects;
                summary.dates_completed += 1;
                summary.watermark = Some(date);
                info!(
                    date = %date,
                    records = tally.records,
                    dropped = tally.dropped,
                    "Date completed, watermark advanced"
                );
            }
            Err(error) => {
                pipeline.watermark.record_run_outcome(date, false).await?;
                warn!(date = %date, error = %error, "Date failed, halting run");
                summary.outcome = RunOutcome::Failed { date, error };
                break;
            }
        }
    }

    Ok(summary)
}

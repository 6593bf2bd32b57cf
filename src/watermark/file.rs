use super::{WatermarkError, WatermarkStore};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// On-disk shape of the legacy state file. Field names are load-bearing:
/// existing deployments already have files in this format.
#[derive(Debug, Serialize, Deserialize)]
struct LastSyncState {
    last_sync_year: i32,
    last_sync_month: u32,
    last_sync_day: u32,
}

/// JSON state-file watermark backend.
///
/// Unlike the run-history table this does not share a durability boundary
/// with the record writes: a crash between the final batch commit and the
/// state-file write loses the watermark advance (the date is re-ingested on
/// the next run, which the delete-before-insert write guard makes safe).
/// The file only tracks successes; failed outcomes are not persisted.
pub struct JsonFileWatermark {
    path: PathBuf,
}

impl JsonFileWatermark {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_state(&self) -> Result<Option<LastSyncState>, WatermarkError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }
}

#[async_trait]
impl WatermarkStore for JsonFileWatermark {
    async fn last_successful_run_date(&self) -> Result<Option<NaiveDate>, WatermarkError> {
        let Some(state) = self.read_state()? else {
            return Ok(None);
        };

        let date = NaiveDate::from_ymd_opt(
            state.last_sync_year,
            state.last_sync_month,
            state.last_sync_day,
        )
        .ok_or(WatermarkError::InvalidDate {
            year: state.last_sync_year,
            month: state.last_sync_month,
            day: state.last_sync_day,
        })?;

        Ok(Some(date))
    }

    async fn record_run_outcome(
        &self,
        date: NaiveDate,
        success: bool,
    ) -> Result<(), WatermarkError> {
        if !success {
            // The file format has no failure rows; leaving the previous
            // state in place keeps the watermark at the last good date.
            return Ok(());
        }

        // Never move the watermark backwards
        if let Some(existing) = self.last_successful_run_date().await? {
            if date <= existing {
                return Ok(());
            }
        }

        let state = LastSyncState {
            last_sync_year: date.year(),
            last_sync_month: date.month(),
            last_sync_day: date.day(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&state)?)?;
        Ok(())
    }
}

use super::traits::{LogSink, StorageError};
use crate::parser::LogRecord;
use crate::watermark::{WatermarkError, WatermarkStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use duckdb::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

const INSERT_LOG_SQL: &str = "INSERT INTO alb_logs (
        log_type, timestamp, elb,
        client_ip, client_port, target_ip, target_port,
        request_processing_time, target_processing_time, response_processing_time,
        elb_status_code, target_status_code, received_bytes, sent_bytes,
        request_verb, request_url, request_proto,
        user_agent, ssl_cipher, ssl_protocol,
        target_group_arn, trace_id, domain_name, chosen_cert_arn,
        matched_rule_priority, request_creation_time, actions_executed,
        redirect_url, extra_fields, source_file
     ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

/// DuckDB store holding both the ingested records and the run history, so a
/// watermark advance and the data it vouches for share one database file.
pub struct DuckDbStorage {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path.as_ref())?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory instance for tests.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Total rows ingested from one object key.
    pub async fn rows_for_source(&self, source_file: &str) -> Result<usize, StorageError> {
        let conn = self.conn.clone();
        let source_file = source_file.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let count: i64 = conn.query_row(
                "SELECT count(*) FROM alb_logs WHERE source_file = ?",
                duckdb::params![source_file],
                |row| row.get(0),
            )?;
            Ok::<usize, StorageError>(count as usize)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    pub async fn total_rows(&self) -> Result<usize, StorageError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            let count: i64 =
                conn.query_row("SELECT count(*) FROM alb_logs", [], |row| row.get(0))?;
            Ok::<usize, StorageError>(count as usize)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl LogSink for DuckDbStorage {
    async fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            // All log columns are VARCHAR: the parser preserves '-' and '-1'
            // sentinels verbatim and typing them here would coerce them.
            conn.execute(
                "CREATE TABLE IF NOT EXISTS alb_logs (
                    log_type VARCHAR NOT NULL,
                    timestamp VARCHAR NOT NULL,
                    elb VARCHAR NOT NULL,
                    client_ip VARCHAR NOT NULL,
                    client_port VARCHAR NOT NULL,
                    target_ip VARCHAR NOT NULL,
                    target_port VARCHAR NOT NULL,
                    request_processing_time VARCHAR NOT NULL,
                    target_processing_time VARCHAR NOT NULL,
                    response_processing_time VARCHAR NOT NULL,
                    elb_status_code VARCHAR NOT NULL,
                    target_status_code VARCHAR NOT NULL,
                    received_bytes VARCHAR NOT NULL,
                    sent_bytes VARCHAR NOT NULL,
                    request_verb VARCHAR NOT NULL,
                    request_url VARCHAR NOT NULL,
                    request_proto VARCHAR NOT NULL,
                    user_agent VARCHAR NOT NULL,
                    ssl_cipher VARCHAR NOT NULL,
                    ssl_protocol VARCHAR NOT NULL,
                    target_group_arn VARCHAR NOT NULL,
                    trace_id VARCHAR NOT NULL,
                    domain_name VARCHAR NOT NULL,
                    chosen_cert_arn VARCHAR NOT NULL,
                    matched_rule_priority VARCHAR NOT NULL,
                    request_creation_time VARCHAR NOT NULL,
                    actions_executed VARCHAR NOT NULL,
                    redirect_url VARCHAR NOT NULL,
                    extra_fields VARCHAR NOT NULL,
                    source_file VARCHAR NOT NULL
                )",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_alb_logs_source ON alb_logs(source_file)",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS run_history (
                    run_date VARCHAR PRIMARY KEY,
                    success BOOLEAN NOT NULL,
                    recorded_at TIMESTAMPTZ NOT NULL DEFAULT current_timestamp
                )",
                [],
            )?;

            Ok::<(), StorageError>(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn write_object_batch(
        &self,
        source_file: &str,
        records: &[LogRecord],
    ) -> Result<usize, StorageError> {
        let conn = self.conn.clone();
        let source_file = source_file.to_string();
        let records = records.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap();
            let tx = conn.transaction()?;

            // Replace-not-append: a retried date rewrites each object's rows
            tx.execute(
                "DELETE FROM alb_logs WHERE source_file = ?",
                duckdb::params![source_file],
            )?;

            let inserted = {
                let mut stmt = tx.prepare(INSERT_LOG_SQL)?;
                for record in &records {
                    stmt.execute(duckdb::params![
                        record.log_type,
                        record.timestamp,
                        record.elb,
                        record.client_ip,
                        record.client_port,
                        record.target_ip,
                        record.target_port,
                        record.request_processing_time,
                        record.target_processing_time,
                        record.response_processing_time,
                        record.elb_status_code,
                        record.target_status_code,
                        record.received_bytes,
                        record.sent_bytes,
                        record.request_verb,
                        record.request_url,
                        record.request_proto,
                        record.user_agent,
                        record.ssl_cipher,
                        record.ssl_protocol,
                        record.target_group_arn,
                        record.trace_id,
                        record.domain_name,
                        record.chosen_cert_arn,
                        record.matched_rule_priority,
                        record.request_creation_time,
                        record.actions_executed,
                        record.redirect_url,
                        record.extra_fields,
                        source_file,
                    ])?;
                }
                records.len()
            };

            tx.commit()?;
            Ok::<usize, StorageError>(inserted)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl WatermarkStore for DuckDbStorage {
    async fn last_successful_run_date(&self) -> Result<Option<NaiveDate>, WatermarkError> {
        let conn = self.conn.clone();

        let date_str: Option<String> = tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.query_row(
                "SELECT max(run_date) FROM run_history WHERE success",
                [],
                |row| row.get::<_, Option<String>>(0),
            )
            .map_err(|e| WatermarkError::Database(e.to_string()))
        })
        .await
        .map_err(|e| WatermarkError::Database(format!("Task join error: {}", e)))??;

        match date_str {
            Some(s) => {
                let date = NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .map_err(|e| WatermarkError::Database(format!("bad run_date '{}': {}", s, e)))?;
                Ok(Some(date))
            }
            None => Ok(None),
        }
    }

    async fn record_run_outcome(
        &self,
        date: NaiveDate,
        success: bool,
    ) -> Result<(), WatermarkError> {
        let conn = self.conn.clone();
        let date_str = date.format("%Y-%m-%d").to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "INSERT INTO run_history (run_date, success) VALUES (?, ?)
                 ON CONFLICT (run_date) DO UPDATE
                 SET success = excluded.success, recorded_at = now()",
                duckdb::params![date_str, success],
            )
            .map_err(|e| WatermarkError::Database(e.to_string()))?;
            Ok::<(), WatermarkError>(())
        })
        .await
        .map_err(|e| WatermarkError::Database(format!("Task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::AlbLineParser;

    const SAMPLE_LINE: &str = "http 2023-01-01T00:00:00.000000Z my-alb 192.168.1.1:2817 \
        10.0.0.1:80 0.001 0.002 0.000 200 200 34 366 \
        \"GET http://example.com:80/ HTTP/1.1\" \"curl/7.46.0\" - - \
        arn:aws:elasticloadbalancing:us-east-1:1:targetgroup/tg/abc";

    fn sample_records(n: usize) -> Vec<LogRecord> {
        let parser = AlbLineParser::new();
        (0..n).map(|_| parser.parse(SAMPLE_LINE).unwrap()).collect()
    }

    async fn setup() -> DuckDbStorage {
        let storage = DuckDbStorage::in_memory().unwrap();
        storage.init_schema().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_write_batch_and_count() {
        let storage = setup().await;
        let inserted = storage
            .write_object_batch("2023/01/01/a.log.gz", &sample_records(3))
            .await
            .unwrap();
        assert_eq!(inserted, 3);
        assert_eq!(
            storage.rows_for_source("2023/01/01/a.log.gz").await.unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn test_rewrite_replaces_rows_for_object() {
        let storage = setup().await;
        storage
            .write_object_batch("2023/01/01/a.log.gz", &sample_records(5))
            .await
            .unwrap();
        // Retry of the same object must not duplicate rows
        storage
            .write_object_batch("2023/01/01/a.log.gz", &sample_records(2))
            .await
            .unwrap();

        assert_eq!(
            storage.rows_for_source("2023/01/01/a.log.gz").await.unwrap(),
            2
        );
        assert_eq!(storage.total_rows().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_still_clears_stale_rows() {
        let storage = setup().await;
        storage
            .write_object_batch("k.log.gz", &sample_records(4))
            .await
            .unwrap();
        storage.write_object_batch("k.log.gz", &[]).await.unwrap();
        assert_eq!(storage.rows_for_source("k.log.gz").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_watermark_empty_history() {
        let storage = setup().await;
        assert_eq!(storage.last_successful_run_date().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_watermark_tracks_latest_success() {
        let storage = setup().await;
        let d1 = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        let d3 = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();

        storage.record_run_outcome(d1, true).await.unwrap();
        storage.record_run_outcome(d2, true).await.unwrap();
        storage.record_run_outcome(d3, false).await.unwrap();

        // Failed dates do not advance the watermark
        assert_eq!(storage.last_successful_run_date().await.unwrap(), Some(d2));
    }

    #[tokio::test]
    async fn test_record_outcome_idempotent() {
        let storage = setup().await;
        let d = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();

        storage.record_run_outcome(d, true).await.unwrap();
        storage.record_run_outcome(d, true).await.unwrap();
        assert_eq!(storage.last_successful_run_date().await.unwrap(), Some(d));
    }

    #[tokio::test]
    async fn test_failed_then_retried_date_recovers() {
        let storage = setup().await;
        let d = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();

        storage.record_run_outcome(d, false).await.unwrap();
        assert_eq!(storage.last_successful_run_date().await.unwrap(), None);

        storage.record_run_outcome(d, true).await.unwrap();
        assert_eq!(storage.last_successful_run_date().await.unwrap(), Some(d));
    }
}

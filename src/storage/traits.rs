use crate::parser::LogRecord;
use async_trait::async_trait;

/// Destination for parsed log records. One implementation (DuckDB); the
/// trait keeps the orchestrator testable against doubles.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn init_schema(&self) -> Result<(), StorageError>;

    /// Write all records parsed from one log object as a single transaction.
    ///
    /// The write first deletes any rows previously ingested from the same
    /// object key, so retrying a failed date replaces rather than duplicates.
    /// Returns the number of rows inserted.
    async fn write_object_batch(
        &self,
        source_file: &str,
        records: &[LogRecord],
    ) -> Result<usize, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
}

impl From<duckdb::Error> for StorageError {
    fn from(e: duckdb::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

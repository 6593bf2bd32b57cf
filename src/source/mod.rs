pub mod memory;
pub mod s3;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use std::io::{BufRead, BufReader};
use thiserror::Error;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("corrupt gzip stream in {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("storage transport error: {0}")]
    Transport(String),
}

/// Capability view of the object store: list keys under a prefix, fetch an
/// object's raw bytes. Implemented by the S3 backend and by an in-memory
/// double for tests.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// All keys under the prefix. Zero matches is an empty vec, not an error.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, FetchError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetch one gzip-compressed log object and split it into lines.
///
/// A truncated or otherwise corrupt stream surfaces as `FetchError::Corrupt`,
/// distinct from an object that decompresses to zero lines.
pub async fn fetch_lines(store: &dyn ObjectStore, key: &str) -> Result<Vec<String>, FetchError> {
    let bytes = store.get(key).await?;

    let reader = BufReader::new(GzDecoder::new(bytes.as_slice()));
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| FetchError::Corrupt {
            key: key.to_string(),
            source: e,
        })?;
        lines.push(line);
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[tokio::test]
    async fn test_fetch_lines_splits_on_newlines() {
        let store = MemoryObjectStore::new();
        store.put("logs/a.log.gz", gzip("line one\nline two\nline three\n"));

        let lines = fetch_lines(&store, "logs/a.log.gz").await.unwrap();
        assert_eq!(lines, vec!["line one", "line two", "line three"]);
    }

    #[tokio::test]
    async fn test_fetch_empty_object_is_zero_lines() {
        let store = MemoryObjectStore::new();
        store.put("logs/empty.log.gz", gzip(""));

        let lines = fetch_lines(&store, "logs/empty.log.gz").await.unwrap();
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_missing_object() {
        let store = MemoryObjectStore::new();
        let err = fetch_lines(&store, "logs/nope.log.gz").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_fetch_truncated_gzip_is_corrupt() {
        let store = MemoryObjectStore::new();
        let mut bytes = gzip("a perfectly fine log line\n");
        bytes.truncate(bytes.len() / 2);
        store.put("logs/bad.log.gz", bytes);

        let err = fetch_lines(&store, "logs/bad.log.gz").await.unwrap_err();
        assert!(matches!(err, FetchError::Corrupt { .. }));
    }
}

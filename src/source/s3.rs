use super::{FetchError, ObjectStore};
use crate::config::S3Config;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client as S3Client;
use tracing::debug;

/// S3-backed object store. The client is constructed once and passed in;
/// no process-wide session state.
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Build a client from the config profile, with credentials resolved
    /// through the SDK's default provider chain (env vars, instance roles).
    pub async fn from_config(config: &S3Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = S3Client::from_conf(builder.build());
        Self::new(client, config.bucket.clone())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, FetchError> {
        debug!(bucket = %self.bucket, prefix = %prefix, "Listing objects");

        let mut keys = Vec::new();
        let mut continuation_token = None;
        loop {
            let mut cmd = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = continuation_token {
                cmd = cmd.continuation_token(token);
            }
            let output = cmd
                .send()
                .await
                .map_err(|e| FetchError::Transport(format!("list_objects_v2: {}", e)))?;

            if let Some(contents) = output.contents {
                keys.extend(contents.into_iter().filter_map(|o| o.key));
            }
            match output.next_continuation_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        debug!(count = keys.len(), "Listing complete");
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, FetchError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    FetchError::NotFound {
                        key: key.to_string(),
                    }
                } else {
                    FetchError::Transport(format!("get_object {}: {}", key, service_error))
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| FetchError::Transport(format!("read body of {}: {}", key, e)))?;

        Ok(data.into_bytes().to_vec())
    }
}

use crate::adapters::Probe;
use crate::adapters::storage::MediaSigner;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use std::time::Duration;

/// Presigns time-limited GET URLs for objects in a single bucket.
#[derive(Clone, Debug)]
pub struct S3Signer {
    client: Client,
    bucket: String,
    ttl: Duration,
}

impl S3Signer {
    #[must_use]
    pub const fn new(client: Client, bucket: String, ttl: Duration) -> Self {
        Self { client, bucket, ttl }
    }
}

#[async_trait]
impl MediaSigner for S3Signer {
    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn sign(&self, key: &str) -> Result<String> {
        let presigning = PresigningConfig::expires_in(self.ttl)
            .map_err(|e| AppError::Storage(format!("Invalid presign configuration: {e}")))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to presign object {key}: {e:?}")))?;

        Ok(request.uri().to_string())
    }
}

#[async_trait]
impl Probe for S3Signer {
    async fn ping(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Storage connection failed for bucket {}: {e:?}", self.bucket)))?;
        Ok(())
    }
}

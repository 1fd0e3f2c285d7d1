//! Object storage for mirrored card images.
//!
//! Keys are content-addressed (`{prefix}/{sha256[..16]}.{ext}`), so the same
//! image always lands under the same key and re-uploads are harmless.

mod s3;

pub use s3::{derive_signing_key, S3ObjectStore};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::rate_limit::{RetryPolicy, Retryable};

/// Key prefix for mirrored card images.
pub const CARDS_PREFIX: &str = "cards";

/// One-year cache lifetime for content-addressed objects.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000";

/// Errors from object storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage not configured: {0}")]
    Config(String),

    #[error("network error uploading {key}: {source}")]
    Request {
        key: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} uploading {key}: {body}")]
    Status {
        status: u16,
        key: String,
        body: String,
    },
}

impl Retryable for StorageError {
    fn status(&self) -> Option<u16> {
        match self {
            StorageError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Content-addressed object key: `{prefix}/{first 16 hex of sha256}.{extension}`.
pub fn generate_key(bytes: &[u8], prefix: &str, extension: &str) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    format!("{}/{}.{}", prefix, &digest[..16], extension)
}

/// Where an uploaded object can be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub key: String,
    pub url: String,
    pub size: usize,
}

/// A bucket that accepts PUTs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), StorageError>;
}

/// Uploads image bytes and reports their public URL.
#[derive(Clone)]
pub struct ObjectMirror {
    store: Arc<dyn ObjectStore>,
    public_domain: String,
    retry: RetryPolicy,
}

impl ObjectMirror {
    pub fn new(store: Arc<dyn ObjectStore>, public_domain: impl Into<String>) -> Self {
        let public_domain: String = public_domain.into();
        Self {
            store,
            public_domain: public_domain.trim_end_matches('/').to_string(),
            retry: RetryPolicy::new(2, Duration::from_millis(1000)).with_label("object upload"),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Public URL for a key. Plain http is used only for `localhost`.
    pub fn public_url(&self, key: &str) -> String {
        let scheme = if self.public_domain == "localhost" {
            "http"
        } else {
            "https"
        };
        format!("{}://{}/{}", scheme, self.public_domain, key)
    }

    /// Upload bytes under `key` with a one-year cache lifetime.
    pub async fn upload(
        &self,
        bytes: &[u8],
        key: &str,
        content_type: &str,
    ) -> Result<UploadResult, StorageError> {
        self.retry
            .run(|| {
                self.store
                    .put_object(key, bytes, content_type, IMMUTABLE_CACHE_CONTROL)
            })
            .await?;

        Ok(UploadResult {
            key: key.to_string(),
            url: self.public_url(key),
            size: bytes.len(),
        })
    }

    /// Upload an image fetched from `source_url` under the cards prefix.
    pub async fn mirror(
        &self,
        source_url: &str,
        bytes: &[u8],
        extension: &str,
        content_type: &str,
    ) -> Result<UploadResult, StorageError> {
        let key = generate_key(bytes, CARDS_PREFIX, extension);
        let result = self.upload(bytes, &key, content_type).await?;
        debug!("Mirrored {} to {} ({} bytes)", source_url, result.url, result.size);
        Ok(result)
    }
}

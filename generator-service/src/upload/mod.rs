pub mod s3;

use std::{path::Path, sync::Arc};

use crate::timestamp;

pub use s3::S3BlobStore;

#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },
    #[error("object store rejected {key}: {message}")]
    Store { key: String, message: String },
}

/// Opaque "put these bytes under this key" capability of a remote object store.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_file(&self, key: &str, path: &Path) -> Result<(), UploadError>;
}

/// `<prefix><YYYY-MM-DD>/<basename>`
pub fn object_key(prefix: &str, date: &str, path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{prefix}{date}/{name}")
}

/// Pushes staged files to a blob store under date-partitioned keys.
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn BlobStore>,
    key_prefix: String,
}

impl Uploader {
    pub fn new(store: Arc<dyn BlobStore>, key_prefix: impl Into<String>) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
        }
    }

    /// Same store, different key prefix.
    pub fn with_prefix(&self, key_prefix: impl Into<String>) -> Self {
        Self {
            store: self.store.clone(),
            key_prefix: key_prefix.into(),
        }
    }

    /// Upload one file. Failures are logged and reported as `false`.
    pub async fn upload(&self, path: &Path) -> bool {
        let date = timestamp::date_partition(timestamp::now());
        let key = object_key(&self.key_prefix, &date, path);

        match self.store.put_file(&key, path).await {
            Ok(()) => {
                metrics::counter!("blob_uploads_total").increment(1);
                tracing::info!(file = %path.display(), key = %key, "uploaded");
                true
            }
            Err(e) => {
                metrics::counter!("blob_upload_failures_total").increment(1);
                tracing::error!(file = %path.display(), key = %key, error = %e, "upload failed");
                false
            }
        }
    }
}

use std::path::Path;

use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};

use super::{BlobStore, UploadError};
use crate::config::S3Config;

/// `BlobStore` backed by an S3 bucket, authenticated with static credentials.
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(cfg: &S3Config) -> Self {
        let credentials = Credentials::new(
            cfg.access_key_id.clone(),
            cfg.secret_access_key.clone(),
            None,
            None,
            "generator-config",
        );
        let conf = aws_sdk_s3::Config::builder()
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(credentials)
            .build();

        Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
        }
    }
}

#[async_trait::async_trait]
impl BlobStore for S3BlobStore {
    async fn put_file(&self, key: &str, path: &Path) -> Result<(), UploadError> {
        let body = ByteStream::from_path(path).await.map_err(|e| UploadError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::Store {
                key: key.to_string(),
                message: aws_sdk_s3::error::DisplayErrorContext(&e).to_string(),
            })?;

        Ok(())
    }
}

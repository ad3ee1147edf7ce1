// src/builder/deploy.rs

//! Release deployment
//!
//! The content server is an object store; all the pipeline needs from it
//! is "put this archive under this key with its checksum attached", so
//! that is the whole capability interface. Tests substitute an in-memory
//! store.

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Abstract blob uploader
pub trait BlobStore {
    /// Upload `file` under `key`, attaching its base64 SHA-256 digest
    fn put_object(&self, key: &str, file: &Path, checksum_b64: &str) -> Result<()>;
}

/// HTTP PUT against the content server, checksum in the
/// `x-amz-checksum-sha256` header
pub struct HttpBlobStore {
    client: Client,
    base_url: String,
}

impl HttpBlobStore {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| Error::InitError(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl BlobStore for HttpBlobStore {
    fn put_object(&self, key: &str, file: &Path, checksum_b64: &str) -> Result<()> {
        let url = format!("{}/{key}", self.base_url);
        let body = File::open(file)
            .map_err(|e| Error::IoError(format!("failed to open {}: {e}", file.display())))?;
        let rsp = self
            .client
            .put(&url)
            .header("x-amz-checksum-sha256", checksum_b64)
            .body(body)
            .send()
            .map_err(|e| Error::PushError(format!("upload to {url} failed: {e}")))?;
        if !rsp.status().is_success() {
            return Err(Error::PushError(format!(
                "upload to {url} failed with status {}",
                rsp.status().as_u16()
            )));
        }
        info!("deployed {key}");
        Ok(())
    }
}

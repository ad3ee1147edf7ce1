// src/client.rs

//! HTTP client for distribution downloads
//!
//! Wraps reqwest with the two timeout policies the crate needs: metadata
//! and availability calls are bounded at 10 seconds, archive downloads are
//! unbounded (large archives on slow links). Downloads always stream to
//! disk, never buffering the whole body.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout for HEAD probes and `.sum` fetches (10 seconds)
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// How much of an error body to keep in the error message
const BODY_PREFIX_LEN: usize = 512;

/// Distribution-facing HTTP client
pub struct DistClient {
    /// Bounded client for probes
    probe: Client,
    /// Unbounded client for archive downloads
    download: Client,
}

impl DistClient {
    pub fn new() -> Result<Self> {
        let probe = Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| Error::InitError(format!("failed to create HTTP client: {e}")))?;
        let download = Client::builder()
            .build()
            .map_err(|e| Error::InitError(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { probe, download })
    }

    /// The bounded client, for availability HEAD probes
    pub fn probe_client(&self) -> &Client {
        &self.probe
    }

    /// Download `url` into `dest`, truncating any previous content.
    ///
    /// Returns the number of bytes written. Non-200 responses carry the
    /// status and a prefix of the body.
    pub fn download_to(&self, url: &str, dest: &Path, show_progress: bool) -> Result<u64> {
        debug!("GET {url}");
        let rsp = self.download.get(url).send().map_err(|e| Error::DownloadFailed {
            url: url.to_string(),
            status: 0,
            body: e.to_string(),
        })?;
        let status = rsp.status();
        if status != reqwest::StatusCode::OK {
            let body = rsp.text().unwrap_or_default();
            return Err(Error::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
                body: body.chars().take(BODY_PREFIX_LEN).collect(),
            });
        }

        let total = rsp.content_length().unwrap_or(0);
        let bar = if show_progress {
            let bar = if total > 0 {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::with_template(
                        "{msg} [{bar:30}] {bytes}/{total_bytes} ({eta})",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                bar
            } else {
                ProgressBar::new_spinner()
            };
            bar.set_message(
                dest.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            );
            Some(bar)
        } else {
            None
        };

        let mut file = File::create(dest)
            .map_err(|e| Error::IoError(format!("failed to create {}: {e}", dest.display())))?;
        let mut body = rsp;
        let mut buffer = [0u8; STREAM_BUFFER_SIZE];
        let mut downloaded: u64 = 0;
        loop {
            let n = body
                .read(&mut buffer)
                .map_err(|e| Error::IoError(format!("failed to read response: {e}")))?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n])
                .map_err(|e| Error::IoError(format!("failed to write data: {e}")))?;
            downloaded += n as u64;
            if let Some(bar) = &bar {
                bar.set_position(downloaded);
            }
        }
        if let Some(bar) = &bar {
            bar.finish_and_clear();
        }
        debug!("downloaded {downloaded} bytes from {url}");
        Ok(downloaded)
    }

    /// Fetch the companion `.sum` digest for a distribution URL.
    ///
    /// `Ok(Some(_))` only on a 200 response; anything else reads as "no
    /// checksum published" and the caller skips verification.
    pub fn fetch_checksum(&self, dist_url: &str) -> Result<Option<String>> {
        let url = format!("{dist_url}.sum");
        let rsp = match self.probe.get(&url).send() {
            Ok(rsp) => rsp,
            Err(e) => {
                warn!("checksum fetch failed for {url}: {e}");
                return Ok(None);
            }
        };
        if rsp.status() != reqwest::StatusCode::OK {
            debug!("no checksum at {url} ({})", rsp.status());
            return Ok(None);
        }
        let body = rsp
            .text()
            .map_err(|e| Error::IoError(format!("failed to read checksum body: {e}")))?;
        let sum = body.trim().to_string();
        if sum.is_empty() {
            return Ok(None);
        }
        Ok(Some(sum))
    }
}

/// Base64-encoded SHA-256 digest of a file
pub fn sha256_base64(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .map_err(|e| Error::IoError(format!("failed to open {}: {e}", path.display())))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)
        .map_err(|e| Error::IoError(format!("failed to read {}: {e}", path.display())))?;
    Ok(BASE64.encode(hasher.finalize()))
}

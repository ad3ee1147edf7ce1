// src/error.rs

//! Central error type for the neopkg crate
//!
//! Every fallible operation in the library returns [`Result`]. The binary
//! wraps these in `anyhow` at the CLI edge; the library itself stays on the
//! typed enum so callers can match on failure kinds.

use std::io;
use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// All failure kinds surfaced by the library
#[derive(Error, Debug)]
pub enum Error {
    /// Descriptor, cache or availability file is absent
    #[error("not found: {0}")]
    NotFound(String),

    /// `distributable.github` is not `<org>/<repo>`
    #[error("invalid github path: {0}")]
    InvalidGithubPath(String),

    /// Release name does not parse as semver
    #[error("release name is not a valid semver: {0} (refer to https://semver.org/)")]
    InvalidRelease(String),

    /// Non-2xx from the release host
    #[error("unexpected status code: {status}\nURL: {url}\n{body}")]
    UpstreamError {
        status: u16,
        url: String,
        body: String,
    },

    /// Non-2xx from the distribution server
    #[error("failed to download {url:?}: {status} {body}")]
    DownloadFailed {
        url: String,
        status: u16,
        body: String,
    },

    /// `.sum` companion present and disagrees with the downloaded archive
    #[error("checksum mismatch, expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Archive extension is neither `.tar.gz`/`.tgz` nor `.zip`
    #[error("unknown archive type: {0}")]
    UnknownArchiveType(String),

    /// Malformed archive or an entry escaping the destination
    #[error("extract error: {0}")]
    ExtractError(String),

    /// Non-zero exit from a build/test/install/uninstall recipe
    #[error("{kind} recipe failed: {detail}")]
    RecipeFailed { kind: &'static str, detail: String },

    /// No distribution variant matches the runtime platform
    #[error("no distribution for {0}")]
    NoDistributionForPlatform(String),

    /// Uninstall refuses a path outside the dist tree
    #[error("invalid installed path: {0:?}")]
    InvalidInstalledPath(String),

    /// A descriptor failed an audit check
    #[error("audit: {0}")]
    AuditFailed(String),

    /// Catalog clone/pull failure
    #[error("sync error: {0}")]
    SyncError(String),

    /// Catalog commit/push failure
    #[error("push error: {0}")]
    PushError(String),

    /// Invalid platform tag, package name or template
    #[error("parse error: {0}")]
    ParseError(String),

    /// Component construction failure (HTTP client, paths)
    #[error("init error: {0}")]
    InitError(String),

    /// I/O failure with added context
    #[error("I/O error: {0}")]
    IoError(String),

    /// I/O failure passed through unchanged
    #[error(transparent)]
    Io(#[from] io::Error),

    /// YAML (de)serialization failure
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// True when the error means "the file simply is not there"
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

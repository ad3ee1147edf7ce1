// src/config.rs

//! Configuration values for the roster and its collaborators
//!
//! Everything that was a constant in earlier revisions lives here as data:
//! the roster→repository map, the distribution endpoint, and the audit
//! policy. The library never reads environment variables; `from_env`
//! constructors are provided for the CLI, which passes the resulting values
//! down.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the default catalog source
pub const ROSTER_CENTRAL: &str = "central";

/// Full configuration consumed by [`crate::Roster`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    /// Catalog sources: roster name → git repository URL
    #[serde(default = "default_rosters")]
    pub rosters: BTreeMap<String, String>,

    /// Content server the distribution archives are fetched from
    #[serde(default)]
    pub dist: DistConfig,

    /// Audit policy knobs
    #[serde(default)]
    pub audit: AuditConfig,

    /// Credentials, injected by the caller
    #[serde(skip)]
    pub credentials: Credentials,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            rosters: default_rosters(),
            dist: DistConfig::default(),
            audit: AuditConfig::default(),
            credentials: Credentials::default(),
        }
    }
}

fn default_rosters() -> BTreeMap<String, String> {
    let mut m = BTreeMap::new();
    m.insert(
        ROSTER_CENTRAL.to_string(),
        "https://github.com/neopkg/neo-pkg.git".to_string(),
    );
    m
}

/// Where prebuilt archives live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistConfig {
    /// Object-store bucket name
    pub bucket: String,
    /// Object-store region
    pub region: String,
    /// Key prefix under the bucket
    pub prefix: String,
    /// Endpoint override for S3-compatible stores; the AWS virtual-hosted
    /// URL is derived from bucket and region when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Default for DistConfig {
    fn default() -> Self {
        Self {
            bucket: "p-edge-packages".to_string(),
            region: "ap-northeast-2".to_string(),
            prefix: "neo-pkg".to_string(),
            endpoint: None,
        }
    }
}

impl DistConfig {
    /// Base URL of the content server
    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.region),
        }
    }

    /// Full URL for one archive of one repository
    pub fn archive_url(&self, org: &str, repo: &str, archive_base: &str) -> String {
        format!("{}/{}/{org}/{repo}/{archive_base}", self.base_url(), self.prefix)
    }

    /// Object key for one archive of one repository
    pub fn object_key(&self, org: &str, repo: &str, archive_base: &str) -> String {
        format!("{}/{org}/{repo}/{archive_base}", self.prefix)
    }
}

/// Audit policy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Organizations whose repositories may omit a license
    #[serde(default)]
    pub license_exempt_orgs: Vec<String>,
}

/// Secrets passed in by the façade; never serialized
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Release-host bearer token, also used for catalog pushes
    pub github_token: Option<String>,
    /// Object-store credentials; deployment is skipped when absent
    pub blob_access_key: Option<String>,
    pub blob_secret_key: Option<String>,
}

impl Credentials {
    /// Collect credentials from the process environment.
    ///
    /// Only the CLI calls this; library code receives the values.
    pub fn from_env() -> Self {
        Self {
            github_token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            blob_access_key: std::env::var("AWS_ACCESS_KEY_ID").ok().filter(|t| !t.is_empty()),
            blob_secret_key: std::env::var("AWS_SECRET_ACCESS_KEY")
                .ok()
                .filter(|t| !t.is_empty()),
        }
    }

    /// True when both object-store credentials are present
    pub fn has_blob_store(&self) -> bool {
        self.blob_access_key.is_some() && self.blob_secret_key.is_some()
    }
}

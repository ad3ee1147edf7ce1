// src/github.rs

//! Release-host client
//!
//! Queries repository metadata and release info over the GitHub REST API.
//! The [`ReleaseHost`] trait is the seam the rest of the crate depends on;
//! tests substitute an in-memory implementation, production wiring uses
//! [`GithubClient`]. The bearer token is injected by the caller — nothing
//! here touches the environment.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Timeout for metadata requests (10 seconds)
const API_TIMEOUT: Duration = Duration::from_secs(10);

/// Default API endpoint
const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Split `<org>/<repo>` into its two parts
pub fn split_github_path(path: &str) -> Result<(String, String)> {
    let toks: Vec<&str> = path.split('/').collect();
    if toks.len() != 2 || toks[0].is_empty() || toks[1].is_empty() {
        return Err(Error::InvalidGithubPath(path.to_string()));
    }
    Ok((toks[0].to_string(), toks[1].to_string()))
}

/// Repository metadata snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoInfo {
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub owner: Option<RepoOwner>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub forks_count: i64,
    #[serde(default)]
    pub forks: i64,
    #[serde(default)]
    pub stargazers_count: i64,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub license: Option<RepoLicense>,
    #[serde(default)]
    pub default_branch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoOwner {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub site_admin: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoLicense {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub spdx_id: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// One release of a repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub tarball_url: String,
    #[serde(default)]
    pub prerelease: bool,
}

/// Capability interface for release metadata lookups
pub trait ReleaseHost {
    /// `GET /repos/{org}/{repo}`
    fn repo_info(&self, org: &str, repo: &str) -> Result<RepoInfo>;
    /// `GET /repos/{org}/{repo}/releases/latest`
    fn latest_release(&self, org: &str, repo: &str) -> Result<ReleaseInfo>;
    /// `GET /repos/{org}/{repo}/releases/tags/{ver}`
    fn release(&self, org: &str, repo: &str, ver: &str) -> Result<ReleaseInfo>;
}

/// HTTP-backed release host
pub struct GithubClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GithubClient {
    /// Create a client against the public API
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_base_url(DEFAULT_API_BASE, token)
    }

    /// Create a client against an alternative endpoint (tests)
    pub fn with_base_url(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .map_err(|e| Error::InitError(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        debug!("GET {url}");
        let mut req = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-Github-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let rsp = req
            .send()
            .map_err(|e| Error::DownloadFailed {
                url: url.to_string(),
                status: 0,
                body: e.to_string(),
            })?;
        let status = rsp.status();
        let body = rsp
            .text()
            .map_err(|e| Error::IoError(format!("failed to read response body: {e}")))?;
        if status != reqwest::StatusCode::OK {
            return Err(Error::UpstreamError {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }
        serde_json::from_str(&body)
            .map_err(|e| Error::ParseError(format!("invalid response from {url}: {e}")))
    }

    fn parse_release(&self, org: &str, repo: &str, value: serde_json::Value) -> Result<ReleaseInfo> {
        let mut info: ReleaseInfo = serde_json::from_value(value)
            .map_err(|e| Error::ParseError(format!("invalid release info: {e}")))?;
        info.organization = org.to_lowercase();
        info.repo = repo.to_lowercase();
        Ok(info)
    }
}

impl ReleaseHost for GithubClient {
    fn repo_info(&self, org: &str, repo: &str) -> Result<RepoInfo> {
        let url = format!("{}/repos/{org}/{repo}", self.base_url);
        let mut info: RepoInfo = serde_json::from_value(self.get_json(&url)?)
            .map_err(|e| Error::ParseError(format!("invalid repo info: {e}")))?;
        info.organization = org.to_lowercase();
        info.repo = repo.to_lowercase();
        Ok(info)
    }

    fn latest_release(&self, org: &str, repo: &str) -> Result<ReleaseInfo> {
        let url = format!("{}/repos/{org}/{repo}/releases/latest", self.base_url);
        self.parse_release(org, repo, self.get_json(&url)?)
    }

    fn release(&self, org: &str, repo: &str, ver: &str) -> Result<ReleaseInfo> {
        let url = format!("{}/repos/{org}/{repo}/releases/tags/{ver}", self.base_url);
        self.parse_release(org, repo, self.get_json(&url)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_path() {
        let (org, repo) = split_github_path("acme/widget").unwrap();
        assert_eq!(org, "acme");
        assert_eq!(repo, "widget");
    }

    #[test]
    fn split_path_rejects_bad_shapes() {
        assert!(split_github_path("acme").is_err());
        assert!(split_github_path("acme/widget/extra").is_err());
        assert!(split_github_path("/widget").is_err());
        assert!(split_github_path("acme/").is_err());
    }

    #[test]
    fn repo_info_parses_api_payload() {
        let body = serde_json::json!({
            "name": "widget",
            "full_name": "Acme/widget",
            "owner": {"login": "Acme", "id": 7, "type": "Organization"},
            "private": false,
            "description": "a widget",
            "homepage": "https://acme.dev",
            "forks_count": 3,
            "forks": 3,
            "stargazers_count": 42,
            "language": "Rust",
            "license": {"key": "apache-2.0", "name": "Apache License 2.0", "spdx_id": "Apache-2.0"},
            "default_branch": "main"
        });
        let mut info: RepoInfo = serde_json::from_value(body).unwrap();
        info.organization = "acme".into();
        info.repo = "widget".into();
        assert_eq!(info.default_branch, "main");
        assert_eq!(info.license.as_ref().unwrap().spdx_id, "Apache-2.0");
        assert_eq!(info.owner.as_ref().unwrap().login, "Acme");
        assert!(!info.private);
    }

    #[test]
    fn release_info_parses_api_payload() {
        let body = serde_json::json!({
            "name": "v1.2.3",
            "tag_name": "v1.2.3",
            "published_at": "2024-07-29T05:17:51Z",
            "html_url": "https://github.com/acme/widget/releases/tag/v1.2.3",
            "tarball_url": "https://api.github.com/repos/acme/widget/tarball/v1.2.3",
            "prerelease": false
        });
        let info: ReleaseInfo = serde_json::from_value(body).unwrap();
        assert_eq!(info.tag_name, "v1.2.3");
        assert_eq!(
            info.published_at.unwrap().to_rfc3339(),
            "2024-07-29T05:17:51+00:00"
        );
    }
}

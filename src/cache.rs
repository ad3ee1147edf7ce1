// src/cache.rs

//! Derived per-package records
//!
//! Cache records (`cache.yml`) snapshot upstream release metadata; the
//! availability files (`<version>.yml`) certify which platform variants of
//! a release actually respond on the content server. Both live under
//! `meta/<roster>/.cache/<name>/` and are the only catalog paths this crate
//! writes.

use crate::error::{Error, Result};
use crate::github::RepoInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Derived snapshot of one package's upstream state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageCache {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub github: Option<RepoInfo>,
    /// Release tag with at most one leading `v`/`V` removed
    #[serde(default)]
    pub latest_version: String,
    #[serde(default)]
    pub latest_release: String,
    #[serde(default)]
    pub latest_release_tag: String,
    #[serde(default)]
    pub latest_release_size: i64,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Rendered distribution URL when the descriptor templates one
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default)]
    pub strip_components: usize,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub cached_at: Option<DateTime<Utc>>,

    // Annotations filled from the install tree; never persisted.
    #[serde(skip)]
    pub roster_name: String,
    #[serde(skip)]
    pub installed_version: String,
    #[serde(skip)]
    pub installed_path: String,
    #[serde(skip)]
    pub has_backend: bool,
    #[serde(skip)]
    pub has_frontend: bool,
    #[serde(skip)]
    pub work_in_progress: bool,
}

impl PackageCache {
    /// True when the package can install on `os/arch`
    pub fn supports(&self, os: &str, arch: &str) -> bool {
        if self.platforms.is_empty() {
            return true;
        }
        let demand = format!("{os}/{arch}");
        self.platforms.iter().any(|p| p == "/" || *p == demand)
    }
}

/// One row of a release's availability file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Availability {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub platform_os: String,
    #[serde(default)]
    pub platform_arch: String,
    #[serde(default)]
    pub dist_url: String,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub content_length: i64,
}

/// Reader/writer for one roster's `.cache` directory
pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    /// `cache_dir` is `meta/<roster>/.cache`
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(name).join("cache.yml")
    }

    fn availability_path(&self, name: &str, version: &str) -> PathBuf {
        self.cache_dir.join(name).join(format!("{version}.yml"))
    }

    /// Read `cache.yml`; the roster name is recovered from the path
    pub fn read_cache(&self, name: &str) -> Result<PackageCache> {
        let path = self.cache_path(name);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("cache for {name:?}"))
            } else {
                Error::IoError(format!("failed to read {}: {e}", path.display()))
            }
        })?;
        let mut cache: PackageCache = serde_yaml::from_str(&content)?;
        cache.roster_name = roster_from_cache_path(&path);
        Ok(cache)
    }

    /// Write `cache.yml`, creating the package directory as needed
    pub fn write_cache(&self, cache: &PackageCache) -> Result<()> {
        let path = self.cache_path(&cache.name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(cache)?;
        std::fs::write(&path, content)?;
        debug!("wrote {}", path.display());
        Ok(())
    }

    /// Read the availability rows of one release
    pub fn read_availability(&self, name: &str, version: &str) -> Result<Vec<Availability>> {
        let path = self.availability_path(name, version);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("availability for {name:?} {version}"))
            } else {
                Error::IoError(format!("failed to read {}: {e}", path.display()))
            }
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Write the availability rows of one release, preserving order
    pub fn write_availability(
        &self,
        name: &str,
        version: &str,
        rows: &[Availability],
    ) -> Result<()> {
        let path = self.availability_path(name, version);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(rows)?;
        std::fs::write(&path, content)?;
        debug!("wrote {}", path.display());
        Ok(())
    }

    /// Walk cached package names in lexicographic order; the callback
    /// returns false to stop early.
    pub fn walk_entries(&self, mut cb: impl FnMut(&str) -> bool) -> Result<()> {
        for name in sorted_subdirs(&self.cache_dir)? {
            if !cb(&name) {
                return Ok(());
            }
        }
        Ok(())
    }
}

/// `meta/<roster>/.cache/<name>/cache.yml` → `<roster>`
fn roster_from_cache_path(path: &Path) -> String {
    path.ancestors()
        .nth(3)
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Sorted directory names under `dir`; an absent `dir` reads as empty
pub fn sorted_subdirs(dir: &Path) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::IoError(format!("failed to read {}: {e}", dir.display()))),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cache() -> PackageCache {
        PackageCache {
            name: "widget".into(),
            github: Some(RepoInfo {
                organization: "acme".into(),
                repo: "widget".into(),
                full_name: "acme/widget".into(),
                default_branch: "main".into(),
                ..Default::default()
            }),
            latest_version: "1.2.3".into(),
            latest_release: "v1.2.3".into(),
            latest_release_tag: "v1.2.3".into(),
            latest_release_size: 1024,
            published_at: Some("2024-07-29T05:17:51Z".parse().unwrap()),
            strip_components: 1,
            platforms: vec!["linux/amd64".into()],
            ..Default::default()
        }
    }

    #[test]
    fn cache_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CacheManager::new(tmp.path().join("meta/central/.cache"));
        let cache = sample_cache();
        mgr.write_cache(&cache).unwrap();

        let read = mgr.read_cache("widget").unwrap();
        assert_eq!(read.roster_name, "central");
        // Field-by-field equality, annotations aside.
        let mut read = read;
        read.roster_name = String::new();
        assert_eq!(read, cache);
    }

    #[test]
    fn read_missing_cache_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CacheManager::new(tmp.path().join(".cache"));
        let err = mgr.read_cache("ghost").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn availability_round_trip_preserves_order() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CacheManager::new(tmp.path().join(".cache"));
        let rows = vec![
            Availability {
                name: "widget".into(),
                version: "1.2.3".into(),
                platform_os: "linux".into(),
                platform_arch: "amd64".into(),
                dist_url: "https://dist/widget-1.2.3-linux-amd64.tar.gz".into(),
                status_code: 200,
                available: true,
                content_length: 2048,
            },
            Availability {
                name: "widget".into(),
                version: "1.2.3".into(),
                platform_os: "darwin".into(),
                platform_arch: "arm64".into(),
                dist_url: "https://dist/widget-1.2.3-darwin-arm64.tar.gz".into(),
                status_code: 404,
                available: false,
                content_length: 0,
            },
        ];
        mgr.write_availability("widget", "1.2.3", &rows).unwrap();
        let read = mgr.read_availability("widget", "1.2.3").unwrap();
        assert_eq!(read, rows);
    }

    #[test]
    fn supports_matches_platforms() {
        let mut cache = sample_cache();
        assert!(cache.supports("linux", "amd64"));
        assert!(!cache.supports("windows", "amd64"));
        cache.platforms.clear();
        assert!(cache.supports("windows", "amd64"));
        cache.platforms = vec!["/".into()];
        assert!(cache.supports("plan9", "mips"));
    }

    #[test]
    fn walk_stops_early() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = CacheManager::new(tmp.path().to_path_buf());
        for name in ["alpha", "beta", "gamma"] {
            std::fs::create_dir_all(tmp.path().join(name)).unwrap();
        }
        let mut seen = Vec::new();
        mgr.walk_entries(|name| {
            seen.push(name.to_string());
            name != "beta"
        })
        .unwrap();
        assert_eq!(seen, vec!["alpha", "beta"]);
    }
}

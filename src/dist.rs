// src/dist.rs

//! Distribution variants and their resolution
//!
//! A distribution is one downloadable archive for one
//! `(package, version, platform)`. Variants either come from a templated
//! descriptor URL or are derived deterministically against the content
//! server.

use crate::cache::{Availability, PackageCache};
use crate::config::DistConfig;
use crate::error::{Error, Result};
use crate::platform::PlatformTag;
use reqwest::blocking::Client;
use tracing::debug;

/// One downloadable archive variant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageDistribution {
    pub name: String,
    pub platform_os: String,
    pub platform_arch: String,
    pub url: String,
    pub archive_base: String,
    pub archive_ext: String,
    pub archive_size: i64,
    /// Directory the archive extracts into, under `dist/<name>/`
    pub unarchive_dir: String,
    pub strip_components: usize,
    pub roster_name: String,
}

/// Archive extension of a file name, treating `.tar.gz`/`.tgz` as one unit.
///
/// A naive last-dot split would classify `foo.tar.gz` as `.gz` and defeat
/// the installer's dispatch.
pub fn archive_ext(base: &str) -> String {
    let lower = base.to_lowercase();
    if lower.ends_with(".tar.gz") {
        return ".tar.gz".to_string();
    }
    if lower.ends_with(".tgz") {
        return ".tgz".to_string();
    }
    match lower.rfind('.') {
        Some(idx) if idx > 0 => base[idx..].to_string(),
        _ => String::new(),
    }
}

fn basename(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

impl PackageDistribution {
    /// Variant backed by an explicit (already rendered) URL
    pub fn from_url(cache: &PackageCache, platform: &PlatformTag, url: &str) -> Self {
        let archive_base = basename(url);
        let ext = archive_ext(&archive_base);
        let unarchive_dir = archive_base
            .strip_suffix(ext.as_str())
            .unwrap_or(&archive_base)
            .to_string();
        Self {
            name: cache.name.clone(),
            platform_os: platform.os.clone(),
            platform_arch: platform.arch.clone(),
            url: url.to_string(),
            archive_base,
            archive_ext: ext,
            archive_size: cache.latest_release_size,
            unarchive_dir,
            strip_components: cache.strip_components,
            roster_name: cache.roster_name.clone(),
        }
    }

    /// Variant derived against the content server
    pub fn from_content_server(
        cache: &PackageCache,
        platform: &PlatformTag,
        dist_cfg: &DistConfig,
    ) -> Result<Self> {
        let github = cache.github.as_ref().ok_or_else(|| {
            Error::ParseError(format!("cache for {:?} has no repository info", cache.name))
        })?;
        let version = &cache.latest_version;
        let archive_base = if platform.is_agnostic() {
            format!("{}-{}.tar.gz", github.repo, version)
        } else {
            format!(
                "{}-{}-{}-{}.tar.gz",
                github.repo, version, platform.os, platform.arch
            )
        };
        let url = dist_cfg.archive_url(&github.organization, &github.repo, &archive_base);
        Ok(Self {
            name: cache.name.clone(),
            platform_os: platform.os.clone(),
            platform_arch: platform.arch.clone(),
            url,
            archive_base,
            archive_ext: ".tar.gz".to_string(),
            archive_size: cache.latest_release_size,
            unarchive_dir: version.clone(),
            strip_components: cache.strip_components,
            roster_name: cache.roster_name.clone(),
        })
    }

    /// HEAD-probe the variant's URL and report what came back
    pub fn check_availability(&self, client: &Client) -> Result<Availability> {
        debug!("HEAD {}", self.url);
        let rsp = client.head(&self.url).send().map_err(|e| Error::DownloadFailed {
            url: self.url.clone(),
            status: 0,
            body: e.to_string(),
        })?;
        let status = rsp.status().as_u16();
        let mut row = Availability {
            name: self.name.clone(),
            version: self.unarchive_dir.clone(),
            platform_os: self.platform_os.clone(),
            platform_arch: self.platform_arch.clone(),
            dist_url: self.url.clone(),
            status_code: status,
            available: false,
            content_length: 0,
        };
        if status == 200 {
            if let Some(len) = rsp
                .headers()
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<i64>().ok())
            {
                row.content_length = len;
                row.available = true;
            }
        }
        Ok(row)
    }
}

/// Declared platform tags of a cache record; the single agnostic tag when
/// none are declared
pub fn declared_platforms(cache: &PackageCache) -> Result<Vec<PlatformTag>> {
    if cache.platforms.is_empty() {
        return Ok(vec![PlatformTag::default()]);
    }
    cache.platforms.iter().map(|p| PlatformTag::parse(p)).collect()
}

/// All distribution variants of a cache record
pub fn remote_distributions(
    cache: &PackageCache,
    dist_cfg: &DistConfig,
) -> Result<Vec<PackageDistribution>> {
    declared_platforms(cache)?
        .iter()
        .map(|platform| {
            if cache.url.is_empty() {
                PackageDistribution::from_content_server(cache, platform, dist_cfg)
            } else {
                Ok(PackageDistribution::from_url(cache, platform, &cache.url))
            }
        })
        .collect()
}

/// Pick the variant for the given runtime platform.
///
/// An exact `(os, arch)` match wins, the agnostic variant is the fallback,
/// anything else is an error.
pub fn resolve(
    cache: &PackageCache,
    os: &str,
    arch: &str,
    dist_cfg: &DistConfig,
) -> Result<PackageDistribution> {
    let variants = remote_distributions(cache, dist_cfg)?;
    if let Some(exact) = variants
        .iter()
        .find(|d| d.platform_os == os && d.platform_arch == arch)
    {
        return Ok(exact.clone());
    }
    if let Some(agnostic) = variants
        .iter()
        .find(|d| d.platform_os.is_empty() && d.platform_arch.is_empty())
    {
        return Ok(agnostic.clone());
    }
    Err(Error::NoDistributionForPlatform(format!("{os}/{arch}")))
}

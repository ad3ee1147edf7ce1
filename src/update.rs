// src/update.rs

//! Cache updater
//!
//! Turns a package descriptor into a fresh cache record by querying the
//! release host, and probes every declared platform variant for
//! availability. The `{tag, version, os, arch}` URL template is rendered
//! with runtime values for the cache record and re-rendered per platform
//! for availability rows.

use crate::cache::{Availability, PackageCache};
use crate::client::DistClient;
use crate::config::DistConfig;
use crate::dist::{declared_platforms, PackageDistribution};
use crate::error::{Error, Result};
use crate::github::{split_github_path, ReleaseHost};
use crate::meta::PackageMeta;
use crate::platform::PlatformTag;
use chrono::Utc;
use tracing::debug;

/// Remove at most one leading `v` or `V`; idempotent on stripped input
pub fn strip_version_prefix(tag: &str) -> String {
    tag.strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(tag)
        .to_string()
}

/// Parse a release name the way the catalog accepts versions.
///
/// A leading `v`/`V` is tolerated, as is a missing patch (or minor)
/// component; anything else fails [`Error::InvalidRelease`].
pub fn parse_release_version(name: &str) -> Result<semver::Version> {
    let bare = strip_version_prefix(name.trim());
    if let Ok(v) = semver::Version::parse(&bare) {
        return Ok(v);
    }
    // major or major.minor shorthand
    let parts: Vec<&str> = bare.split('.').collect();
    if (1..=2).contains(&parts.len()) && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit())) {
        let padded = match parts.len() {
            1 => format!("{}.0.0", parts[0]),
            _ => format!("{}.{}.0", parts[0], parts[1]),
        };
        if let Ok(v) = semver::Version::parse(&padded) {
            return Ok(v);
        }
    }
    Err(Error::InvalidRelease(name.to_string()))
}

/// Render a distribution URL template.
///
/// Recognized variables: `{tag}`, `{version}`, `{os}`, `{arch}`.
pub fn render_url_template(template: &str, tag: &str, version: &str, os: &str, arch: &str) -> String {
    template
        .replace("{tag}", tag)
        .replace("{version}", version)
        .replace("{os}", os)
        .replace("{arch}", arch)
}

/// Compute a fresh cache record for a descriptor
pub fn update_package_cache(meta: &PackageMeta, host: &dyn ReleaseHost) -> Result<PackageCache> {
    let (org, repo) = split_github_path(&meta.distributable.github)?;
    let repo_info = host.repo_info(&org, &repo)?;
    let release = host.latest_release(&org, &repo)?;
    parse_release_version(&release.name)?;

    let latest_version = strip_version_prefix(&release.tag_name);
    let mut cache = PackageCache {
        name: meta.pkg_name.clone(),
        github: Some(repo_info),
        latest_version: latest_version.clone(),
        latest_release: release.name.clone(),
        latest_release_tag: release.tag_name.clone(),
        published_at: release.published_at,
        strip_components: meta.distributable.strip_components,
        platforms: meta.platforms.clone(),
        cached_at: Some(Utc::now()),
        roster_name: meta.roster_name.clone(),
        ..Default::default()
    };

    if !meta.distributable.url.is_empty() {
        let runtime = PlatformTag::runtime();
        cache.url = render_url_template(
            &meta.distributable.url,
            &release.tag_name,
            &latest_version,
            &runtime.os,
            &runtime.arch,
        );
    }
    debug!(
        "updated cache for {}: {} ({})",
        cache.name, cache.latest_release, cache.latest_release_tag
    );
    Ok(cache)
}

/// HEAD-probe every declared platform variant of a release.
///
/// Templated URLs are rendered with each row's own os/arch, so rows for
/// other platforms do not inherit the current host's values.
pub fn probe_availability(
    meta: &PackageMeta,
    cache: &PackageCache,
    dist_cfg: &DistConfig,
    client: &DistClient,
) -> Result<Vec<Availability>> {
    let mut rows = Vec::new();
    for platform in declared_platforms(cache)? {
        let dist = distribution_for_platform(meta, cache, &platform, dist_cfg)?;
        rows.push(dist.check_availability(client.probe_client())?);
    }
    Ok(rows)
}

/// The distribution variant one platform row addresses
pub fn distribution_for_platform(
    meta: &PackageMeta,
    cache: &PackageCache,
    platform: &PlatformTag,
    dist_cfg: &DistConfig,
) -> Result<PackageDistribution> {
    if meta.distributable.url.is_empty() {
        return PackageDistribution::from_content_server(cache, platform, dist_cfg);
    }
    let url = render_url_template(
        &meta.distributable.url,
        &cache.latest_release_tag,
        &cache.latest_version,
        &platform.os,
        &platform.arch,
    );
    Ok(PackageDistribution::from_url(cache, platform, &url))
}

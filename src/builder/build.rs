// src/builder/build.rs

//! Release build
//!
//! Fetches the tagged source tree of a package, runs its build (and test)
//! recipes, archives the `provides` entries and, when a blob store is
//! supplied, deploys the archive with its checksum.

use crate::archive;
use crate::builder::BlobStore;
use crate::client::{sha256_base64, DistClient};
use crate::config::DistConfig;
use crate::error::Result;
use crate::github::{split_github_path, ReleaseHost};
use crate::meta::PackageMeta;
use crate::platform::PlatformTag;
use crate::recipe::{run_recipe, BUILD_TIMEOUT};
use crate::update::strip_version_prefix;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Source tarballs extract with their single top-level directory dropped
const SOURCE_STRIP_COMPONENTS: usize = 1;

/// Build one package into `dest`; returns the archive path, or `None`
/// when the package distributes through a direct URL and has no build
/// step.
///
/// `version` selects a tagged release; `None` (or `"latest"`) builds the
/// latest one.
pub fn build(
    meta: &PackageMeta,
    version: Option<&str>,
    dest: &Path,
    host: &dyn ReleaseHost,
    store: Option<&dyn BlobStore>,
    dist_cfg: &DistConfig,
    output: &mut dyn Write,
) -> Result<Option<PathBuf>> {
    if !meta.distributable.url.is_empty() {
        writeln!(output, "Distribution URL: {}", meta.distributable.url).ok();
        writeln!(output, "Skip Build.").ok();
        return Ok(None);
    }

    let (org, repo) = split_github_path(&meta.distributable.github)?;
    let repo_info = host.repo_info(&org, &repo)?;
    let latest = match version {
        Some(ver) if !ver.is_empty() && !ver.eq_ignore_ascii_case("latest") => {
            host.release(&org, &repo, ver)?
        }
        _ => host.latest_release(&org, &repo)?,
    };
    writeln!(
        output,
        "Build {} {} {}",
        repo_info.organization, repo_info.repo, latest.tag_name
    )
    .ok();

    std::fs::create_dir_all(dest)?;

    // Fetch and unpack the tagged source tree.
    let src_url = format!(
        "https://github.com/{org}/{repo}/archive/refs/tags/{}.tar.gz",
        latest.tag_name
    );
    let src_tarball = dest.join("src.tar.gz");
    let client = DistClient::new()?;
    client.download_to(&src_url, &src_tarball, true)?;
    archive::extract(&src_tarball, dest, SOURCE_STRIP_COMPONENTS)?;

    run_recipe(&meta.build, "build", dest, dest, &[], output, BUILD_TIMEOUT)?;
    if let Some(test) = &meta.test {
        run_recipe(test, "test", dest, dest, &[], output, BUILD_TIMEOUT)?;
    }

    let version = strip_version_prefix(&latest.tag_name);
    let archive_base = if meta.platforms.is_empty() {
        format!("{}-{}.tar.gz", repo_info.repo, version)
    } else {
        let runtime = PlatformTag::runtime();
        format!(
            "{}-{}-{}-{}.tar.gz",
            repo_info.repo, version, runtime.os, runtime.arch
        )
    };
    let archive_path = dest.join(&archive_base);
    archive::archive(dest, &archive_path, &meta.provides)?;
    writeln!(output, "Built {archive_base}").ok();

    match store {
        Some(store) => {
            let checksum = sha256_base64(&archive_path)?;
            let key = dist_cfg.object_key(&repo_info.organization, &repo_info.repo, &archive_base);
            store.put_object(&key, &archive_path, &checksum)?;
            writeln!(output, "Deployed. sha-256: {checksum}").ok();
            info!("deployed {archive_base} as {key}");
        }
        None => {
            writeln!(output, "Skip deploy.").ok();
        }
    }
    Ok(Some(archive_path))
}

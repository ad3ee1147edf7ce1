// src/install.rs

//! Atomic package installation
//!
//! One install walks Download → Checksum → Extract → Activate → Recipe →
//! Cleanup, fail-fast at every step. The `wip` sentinel exists for the
//! whole walk and is removed on every exit path; outside readers observe
//! the `current` pointer rewrite atomically, after the new version
//! directory exists and before the install recipe runs.

use crate::archive;
use crate::cache::PackageCache;
use crate::client::{sha256_base64, DistClient};
use crate::config::{DistConfig, ROSTER_CENTRAL};
use crate::dist;
use crate::error::{Error, Result};
use crate::link;
use crate::meta::{split_package_name, PackageMeta};
use crate::platform::PlatformTag;
use crate::recipe::{run_recipe, HOOK_TIMEOUT};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// What is currently active for one package
#[derive(Debug, Clone, Default)]
pub struct InstalledVersion {
    pub name: String,
    pub version: String,
    /// Version directory the `current` pointer resolves to
    pub path: PathBuf,
    pub current_path: PathBuf,
    pub has_backend: bool,
    pub has_frontend: bool,
    pub work_in_progress: bool,
}

/// Per-package outcome of an install or upgrade
#[derive(Debug)]
pub struct InstallStatus {
    pub pkg_name: String,
    pub err: Option<Error>,
    pub installed: Option<InstalledVersion>,
}

impl InstallStatus {
    pub fn success(&self) -> bool {
        self.err.is_none()
    }
}

/// Removes the `wip` sentinel on every exit path
struct WipSentinel {
    path: PathBuf,
}

impl WipSentinel {
    fn create(path: PathBuf, dist_url: &str) -> Result<Self> {
        if path.exists() {
            warn!(
                "stale wip sentinel at {}; previous install did not finish",
                path.display()
            );
        }
        fs::write(&path, dist_url.as_bytes())?;
        Ok(Self { path })
    }
}

impl Drop for WipSentinel {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Installer for one `dist/` tree
pub struct Installer {
    dist_dir: PathBuf,
    dist_cfg: DistConfig,
    client: DistClient,
}

impl Installer {
    pub fn new(dist_dir: PathBuf, dist_cfg: DistConfig) -> Result<Self> {
        Ok(Self {
            dist_dir: absolute(&dist_dir)?,
            dist_cfg,
            client: DistClient::new()?,
        })
    }

    pub fn dist_dir(&self) -> &Path {
        &self.dist_dir
    }

    /// `dist/<name>` for central packages, `dist/<roster>/<name>` otherwise
    pub fn package_dir(&self, pkg_name: &str) -> PathBuf {
        let (roster, name) = split_package_name(pkg_name);
        if roster == ROSTER_CENTRAL {
            self.dist_dir.join(name)
        } else {
            self.dist_dir.join(roster).join(name)
        }
    }

    /// Names of packages with an active `current` pointer
    pub fn installed_packages(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = match fs::read_dir(&self.dist_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => {
                return Err(Error::IoError(format!(
                    "failed to read {}: {e}",
                    self.dist_dir.display()
                )))
            }
        };
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if entry.path().join("current").exists() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Resolve the active version of one package
    pub fn installed_version(&self, pkg_name: &str) -> Result<InstalledVersion> {
        let pkg_dir = self.package_dir(pkg_name);
        let current = pkg_dir.join("current");
        if fs::metadata(&current).is_err() {
            return Err(Error::NotFound(format!("package {pkg_name:?} not installed")));
        }
        let target = link::readlink(&current)
            .map_err(|_| Error::NotFound("package current link not found".to_string()))?;
        let version = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let path = pkg_dir.join(&version);
        Ok(InstalledVersion {
            name: pkg_name.to_string(),
            version,
            current_path: current,
            has_backend: path.join(".backend.yml").exists(),
            has_frontend: path.join("index.html").exists(),
            work_in_progress: pkg_dir.join("wip").exists(),
            path,
        })
    }

    /// Run the install state machine for one package.
    ///
    /// `meta` and `cache` are the loaded descriptor and cache record;
    /// `caller_env` is merged over the recipe environment.
    pub fn install(
        &self,
        meta: &PackageMeta,
        cache: &PackageCache,
        output: &mut dyn Write,
        caller_env: &[String],
    ) -> Result<()> {
        let runtime = PlatformTag::runtime();
        let dist = dist::resolve(cache, &runtime.os, &runtime.arch, &self.dist_cfg)?;

        let pkg_dir = self.package_dir(&cache.name);
        let archive_file = pkg_dir.join(&dist.archive_base);
        let unarchive_dir = pkg_dir.join(&dist.unarchive_dir);
        let current = pkg_dir.join("current");
        fs::create_dir_all(&unarchive_dir)?;

        let _wip = WipSentinel::create(pkg_dir.join("wip"), &dist.url)?;

        // Download
        self.client.download_to(&dist.url, &archive_file, true)?;
        writeln!(output, "downloaded {}", dist.archive_base).ok();

        // Checksum, when the distribution publishes one
        if let Some(expected) = self.client.fetch_checksum(&dist.url)? {
            let actual = sha256_base64(&archive_file)?;
            if actual != expected {
                return Err(Error::ChecksumMismatch { expected, actual });
            }
            writeln!(output, "checksum {actual}").ok();
        }

        // Extract
        match dist.archive_ext.to_lowercase().as_str() {
            ".zip" => extract_zip(&archive_file, &unarchive_dir, output)?,
            ".tar.gz" | ".tgz" => {
                archive::extract(&archive_file, &unarchive_dir, dist.strip_components)?
            }
            other => return Err(Error::UnknownArchiveType(other.to_string())),
        }

        // Activate: drop the old pointer, drop the superseded version
        // directory, point `current` at the new tree.
        let previous = self.installed_version(&cache.name).ok();
        if fs::symlink_metadata(&current).is_ok() {
            link::remove(&current)?;
        }
        if let Some(prev) = previous {
            if prev.path != unarchive_dir && prev.path.exists() {
                debug!("removing superseded version at {}", prev.path.display());
                fs::remove_dir_all(&prev.path).map_err(|e| {
                    Error::IoError(format!("failed to remove {}: {e}", prev.path.display()))
                })?;
            }
        }
        let target = absolute(&unarchive_dir)?;
        link::symlink(&target, &current)?;
        info!("{} activated at {}", cache.name, target.display());

        // Install recipe, free to inspect `current`
        if let Some(install_recipe) = &meta.install {
            run_recipe(
                install_recipe,
                "install",
                &unarchive_dir,
                &unarchive_dir,
                caller_env,
                output,
                HOOK_TIMEOUT,
            )?;
        }

        // Cleanup
        if let Err(e) = fs::remove_file(&archive_file) {
            warn!("cleaning download file {}: {e}", archive_file.display());
        }
        Ok(())
    }

    /// Remove the active version of one package
    pub fn uninstall(
        &self,
        meta: &PackageMeta,
        output: &mut dyn Write,
        caller_env: &[String],
    ) -> Result<()> {
        let inst = self.installed_version(&meta.pkg_name)?;
        self.uninstall_version(meta, &inst, output, caller_env)
    }

    /// Remove a resolved installed version.
    ///
    /// The installed path must be absolute and resolve inside this dist
    /// tree; anything else is refused before any script runs or any file
    /// is touched.
    pub fn uninstall_version(
        &self,
        meta: &PackageMeta,
        inst: &InstalledVersion,
        output: &mut dyn Write,
        caller_env: &[String],
    ) -> Result<()> {
        if !inst.path.is_absolute() {
            return Err(Error::InvalidInstalledPath(inst.path.display().to_string()));
        }
        let canon = inst
            .path
            .canonicalize()
            .map_err(|_| Error::InvalidInstalledPath(inst.path.display().to_string()))?;
        let dist_canon = self
            .dist_dir
            .canonicalize()
            .map_err(|e| Error::IoError(format!("failed to resolve dist dir: {e}")))?;
        if !canon.starts_with(&dist_canon) || canon == dist_canon {
            return Err(Error::InvalidInstalledPath(inst.path.display().to_string()));
        }

        if let Some(uninstall_recipe) = &meta.uninstall {
            run_recipe(
                uninstall_recipe,
                "uninstall",
                &inst.path,
                &inst.path,
                caller_env,
                output,
                HOOK_TIMEOUT,
            )?;
        }

        fs::remove_dir_all(&inst.path)
            .map_err(|e| Error::IoError(format!("failed to remove {}: {e}", inst.path.display())))?;
        // The package dir also holds `current`; clear it so the directory
        // removal below can succeed, then best-effort remove the dir.
        if let Some(parent) = inst.path.parent() {
            let _ = link::remove(&parent.join("current"));
            let _ = fs::remove_dir_all(parent);
        }
        info!("uninstalled {}", meta.pkg_name);
        Ok(())
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Extract a zip archive with the platform-native tool
fn extract_zip(archive_file: &Path, dest: &Path, output: &mut dyn Write) -> Result<()> {
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("powershell");
        c.arg("-Command")
            .arg("Expand-Archive")
            .arg("-Path")
            .arg(archive_file)
            .arg("-DestinationPath")
            .arg(dest);
        c
    } else {
        let mut c = Command::new("unzip");
        c.arg("-o").arg("-d").arg(dest).arg(archive_file);
        c
    };
    let captured = cmd
        .output()
        .map_err(|e| Error::ExtractError(format!("failed to run zip extractor: {e}")))?;
    output.write_all(&captured.stdout).ok();
    output.write_all(&captured.stderr).ok();
    if !captured.status.success() {
        return Err(Error::ExtractError(format!(
            "zip extraction failed with exit code {}",
            captured.status.code().unwrap_or(-1)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_installer(dist_dir: &Path) -> Installer {
        Installer::new(dist_dir.to_path_buf(), DistConfig::default()).unwrap()
    }

    #[test]
    fn package_dir_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let installer = test_installer(tmp.path());
        assert_eq!(installer.package_dir("widget"), tmp.path().join("widget"));
        assert_eq!(
            installer.package_dir("extra/widget"),
            tmp.path().join("extra/widget")
        );
    }

    #[test]
    fn installed_version_reads_the_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg_dir = tmp.path().join("widget");
        let ver_dir = pkg_dir.join("1.2.3");
        fs::create_dir_all(&ver_dir).unwrap();
        fs::write(ver_dir.join("index.html"), "<html>").unwrap();
        link::symlink(&ver_dir, &pkg_dir.join("current")).unwrap();

        let installer = test_installer(tmp.path());
        let inst = installer.installed_version("widget").unwrap();
        assert_eq!(inst.version, "1.2.3");
        assert!(inst.has_frontend);
        assert!(!inst.has_backend);
        assert!(!inst.work_in_progress);
        assert_eq!(inst.path, ver_dir);
    }

    #[test]
    fn installed_version_sees_wip() {
        let tmp = tempfile::tempdir().unwrap();
        let pkg_dir = tmp.path().join("widget");
        let ver_dir = pkg_dir.join("1.2.3");
        fs::create_dir_all(&ver_dir).unwrap();
        link::symlink(&ver_dir, &pkg_dir.join("current")).unwrap();
        fs::write(pkg_dir.join("wip"), "https://example/pkg.tar.gz").unwrap();

        let installer = test_installer(tmp.path());
        assert!(installer.installed_version("widget").unwrap().work_in_progress);
    }

    #[test]
    fn missing_package_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let installer = test_installer(tmp.path());
        assert!(installer.installed_version("ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn installed_packages_lists_active_only() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("alpha/1.0.0");
        fs::create_dir_all(&a).unwrap();
        link::symlink(&a, &tmp.path().join("alpha/current")).unwrap();
        fs::create_dir_all(tmp.path().join("beta/1.0.0")).unwrap();

        let installer = test_installer(tmp.path());
        assert_eq!(installer.installed_packages().unwrap(), vec!["alpha"]);
    }

    #[test]
    fn uninstall_rejects_outside_path() {
        let tmp = tempfile::tempdir().unwrap();
        let installer = test_installer(tmp.path());
        let meta = PackageMeta {
            pkg_name: "widget".into(),
            ..Default::default()
        };
        let inst = InstalledVersion {
            name: "widget".into(),
            version: "passwd".into(),
            path: PathBuf::from("/etc/passwd"),
            ..Default::default()
        };
        let mut out = Vec::new();
        let err = installer
            .uninstall_version(&meta, &inst, &mut out, &[])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInstalledPath(_)));
        assert!(Path::new("/etc/passwd").exists());
    }

    #[test]
    fn uninstall_rejects_relative_path() {
        let tmp = tempfile::tempdir().unwrap();
        let installer = test_installer(tmp.path());
        let meta = PackageMeta {
            pkg_name: "widget".into(),
            ..Default::default()
        };
        let inst = InstalledVersion {
            name: "widget".into(),
            path: PathBuf::from("widget/1.2.3"),
            ..Default::default()
        };
        let mut out = Vec::new();
        let err = installer
            .uninstall_version(&meta, &inst, &mut out, &[])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInstalledPath(_)));
    }

    #[test]
    fn uninstall_rejects_escape_via_parent_components() {
        let tmp = tempfile::tempdir().unwrap();
        let installer = test_installer(tmp.path());
        let meta = PackageMeta {
            pkg_name: "widget".into(),
            ..Default::default()
        };
        fs::create_dir_all(tmp.path().join("widget")).unwrap();
        // lexically under dist/, resolves to dist/ itself
        let inst = InstalledVersion {
            name: "widget".into(),
            path: tmp.path().join("widget").join(".."),
            ..Default::default()
        };
        let mut out = Vec::new();
        let err = installer
            .uninstall_version(&meta, &inst, &mut out, &[])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInstalledPath(_)));
        assert!(tmp.path().join("widget").exists());
    }
}

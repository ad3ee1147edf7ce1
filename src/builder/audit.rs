// src/builder/audit.rs

//! Descriptor audit
//!
//! Validates one `package.yml` against the catalog's acceptance rules.
//! Each check reports a line to `output`; the first failing check aborts
//! the audit for that package.

use crate::config::AuditConfig;
use crate::error::{Error, Result};
use crate::github::{split_github_path, ReleaseHost, ReleaseInfo, RepoInfo};
use crate::meta::{PackageMeta, Script};
use crate::platform::{PlatformTag, KNOWN_OS};
use crate::update::parse_release_version;
use std::io::Write;

/// Audit a parsed descriptor
pub fn audit(
    meta: &PackageMeta,
    host: &dyn ReleaseHost,
    policy: &AuditConfig,
    output: &mut dyn Write,
) -> Result<()> {
    audit_platforms(meta)?;
    writeln!(output, ">> Distributable").ok();
    writeln!(output, "    Github: {}", meta.distributable.github).ok();
    writeln!(output, "    Url: {}", meta.distributable.url).ok();
    writeln!(
        output,
        "    StripComponents: {}",
        meta.distributable.strip_components
    )
    .ok();

    audit_description(meta)?;
    writeln!(output, ">> Description:").ok();
    let desc = meta.description.trim().replace('\n', "\n    ");
    writeln!(output, "    {desc}").ok();

    let (org, repo) = split_github_path(&meta.distributable.github)?;
    let repo_info = host.repo_info(&org, &repo)?;
    writeln!(output, ">> Github").ok();
    writeln!(output, "    Organization {}", repo_info.organization).ok();
    writeln!(output, "    Repository {}", repo_info.repo).ok();

    if repo_info.private {
        return Err(Error::AuditFailed("repository is private".to_string()));
    }

    audit_license(&repo_info, policy)?;
    match &repo_info.license {
        Some(license) if !license.spdx_id.is_empty() => {
            writeln!(output, "    License {}", license.spdx_id).ok();
        }
        _ => {
            writeln!(output, "    License not specified").ok();
        }
    }

    audit_default_branch(&repo_info)?;
    writeln!(output, "    DefaultBranch {}", repo_info.default_branch).ok();

    let latest = host.latest_release(&org, &repo)?;
    audit_latest_release(&latest)?;
    writeln!(output, ">> LatestRelease: {}", latest.name).ok();
    writeln!(output, "    tag: {}", latest.tag_name).ok();
    if let Some(published) = latest.published_at {
        writeln!(output, "    Published: {}", published.to_rfc3339()).ok();
    }

    audit_scripts("build", &meta.build.scripts)?;
    writeln!(output, ">> Build Script").ok();

    if let Some(test) = &meta.test {
        if !test.scripts.is_empty() {
            audit_scripts("test", &test.scripts)?;
            writeln!(output, ">> Test Script").ok();
        }
    }
    if let Some(install) = &meta.install {
        if !install.scripts.is_empty() {
            audit_scripts("install", &install.scripts)?;
            writeln!(output, ">> Install Script").ok();
        }
    }
    if let Some(uninstall) = &meta.uninstall {
        if !uninstall.scripts.is_empty() {
            audit_scripts("uninstall", &uninstall.scripts)?;
            writeln!(output, ">> Uninstall Script").ok();
        }
    }
    Ok(())
}

fn audit_platforms(meta: &PackageMeta) -> Result<()> {
    for platform in &meta.platforms {
        PlatformTag::parse_strict(platform)
            .map_err(|_| Error::AuditFailed(format!("platform {platform:?} is invalid")))?;
    }
    Ok(())
}

fn audit_description(meta: &PackageMeta) -> Result<()> {
    if meta.description.trim().is_empty() {
        return Err(Error::AuditFailed("description is empty".to_string()));
    }
    Ok(())
}

fn audit_license(info: &RepoInfo, policy: &AuditConfig) -> Result<()> {
    let has_license = info
        .license
        .as_ref()
        .map(|l| !l.spdx_id.is_empty())
        .unwrap_or(false);
    if !has_license && !policy.license_exempt_orgs.contains(&info.organization) {
        return Err(Error::AuditFailed(
            "license is not specified. (refer to https://spdx.org/licenses/)".to_string(),
        ));
    }
    Ok(())
}

fn audit_default_branch(info: &RepoInfo) -> Result<()> {
    if info.default_branch.is_empty() {
        return Err(Error::AuditFailed(
            "default branch is not specified".to_string(),
        ));
    }
    Ok(())
}

fn audit_latest_release(info: &ReleaseInfo) -> Result<()> {
    if info.tag_name.is_empty() {
        return Err(Error::AuditFailed("latest release is not found".to_string()));
    }
    parse_release_version(&info.name)
        .map_err(|_| Error::InvalidRelease(info.name.clone()))?;
    Ok(())
}

fn audit_scripts(name: &str, scripts: &[Script]) -> Result<()> {
    if scripts.is_empty() {
        return Err(Error::AuditFailed(format!("{name} script is empty")));
    }
    for script in scripts {
        if script.run.is_empty() {
            return Err(Error::AuditFailed(format!("{name} script is empty")));
        }
        // An empty `on` means "any OS"; anything else must be a known one.
        if !script.platform.is_empty() && !KNOWN_OS.contains(&script.platform.as_str()) {
            return Err(Error::AuditFailed(format!(
                "{name} script platform {:?} is invalid",
                script.platform
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::github::RepoLicense;
    use crate::meta::{Distributable, Recipe};

    struct FakeHost {
        repo: RepoInfo,
        release: ReleaseInfo,
    }

    impl ReleaseHost for FakeHost {
        fn repo_info(&self, _org: &str, _repo: &str) -> Result<RepoInfo> {
            Ok(self.repo.clone())
        }
        fn latest_release(&self, _org: &str, _repo: &str) -> Result<ReleaseInfo> {
            Ok(self.release.clone())
        }
        fn release(&self, org: &str, repo: &str, _ver: &str) -> Result<ReleaseInfo> {
            self.latest_release(org, repo)
        }
    }

    fn good_host() -> FakeHost {
        FakeHost {
            repo: RepoInfo {
                organization: "acme".into(),
                repo: "widget".into(),
                default_branch: "main".into(),
                license: Some(RepoLicense {
                    spdx_id: "Apache-2.0".into(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            release: ReleaseInfo {
                name: "v1.2.3".into(),
                tag_name: "v1.2.3".into(),
                ..Default::default()
            },
        }
    }

    fn good_meta() -> PackageMeta {
        PackageMeta {
            distributable: Distributable {
                github: "acme/widget".into(),
                ..Default::default()
            },
            description: "a widget".into(),
            platforms: vec!["linux/amd64".into()],
            build: Recipe {
                scripts: vec![Script {
                    run: "make".into(),
                    platform: String::new(),
                }],
                env: vec![],
            },
            pkg_name: "widget".into(),
            ..Default::default()
        }
    }

    #[test]
    fn good_descriptor_passes() {
        let mut out = Vec::new();
        audit(&good_meta(), &good_host(), &AuditConfig::default(), &mut out).unwrap();
        let report = String::from_utf8(out).unwrap();
        assert!(report.contains(">> Distributable"));
        assert!(report.contains("License Apache-2.0"));
        assert!(report.contains(">> Build Script"));
    }

    #[test]
    fn private_repo_fails() {
        let mut host = good_host();
        host.repo.private = true;
        let mut out = Vec::new();
        let err = audit(&good_meta(), &host, &AuditConfig::default(), &mut out).unwrap_err();
        assert!(err.to_string().contains("private"));
    }

    #[test]
    fn missing_license_fails_unless_exempt() {
        let mut host = good_host();
        host.repo.license = None;
        let mut out = Vec::new();
        assert!(audit(&good_meta(), &host, &AuditConfig::default(), &mut out).is_err());

        let policy = AuditConfig {
            license_exempt_orgs: vec!["acme".into()],
        };
        let mut out = Vec::new();
        audit(&good_meta(), &host, &policy, &mut out).unwrap();
    }

    #[test]
    fn invalid_platform_fails() {
        let mut meta = good_meta();
        meta.platforms = vec!["linux".into()];
        let mut out = Vec::new();
        assert!(audit(&meta, &good_host(), &AuditConfig::default(), &mut out).is_err());
    }

    #[test]
    fn non_semver_release_fails() {
        let mut host = good_host();
        host.release.name = "spring release".into();
        let mut out = Vec::new();
        let err = audit(&good_meta(), &host, &AuditConfig::default(), &mut out).unwrap_err();
        assert!(matches!(err, Error::InvalidRelease(_)));
    }

    #[test]
    fn empty_build_script_fails() {
        let mut meta = good_meta();
        meta.build.scripts.clear();
        let mut out = Vec::new();
        assert!(audit(&meta, &good_host(), &AuditConfig::default(), &mut out).is_err());
    }

    #[test]
    fn script_with_unknown_os_fails() {
        let mut meta = good_meta();
        meta.build.scripts[0].platform = "plan9".into();
        let mut out = Vec::new();
        assert!(audit(&meta, &good_host(), &AuditConfig::default(), &mut out).is_err());
    }
}

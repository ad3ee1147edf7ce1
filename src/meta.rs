// src/meta.rs

//! Package descriptors
//!
//! The authoritative YAML for one package lives in the catalog at
//! `meta/<roster>/projects/<name>/package.yml`. Descriptors are only ever
//! mutated by catalog sync; everything else reads them.

use crate::config::ROSTER_CENTRAL;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Authoritative description of one package
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageMeta {
    #[serde(default)]
    pub distributable: Distributable,
    #[serde(default)]
    pub description: String,
    /// Declared platform tags; empty means platform-agnostic
    #[serde(default)]
    pub platforms: Vec<String>,
    /// Paths (relative to the build tree) that go into the release archive
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub build: Recipe,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<Recipe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<Recipe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uninstall: Option<Recipe>,

    #[serde(skip)]
    pub roster_name: String,
    #[serde(skip)]
    pub pkg_name: String,
}

/// Where the prebuilt archives come from.
///
/// Exactly one of `github` and `url` is the primary source. A templated
/// `url` may reference `{tag}`, `{version}`, `{os}` and `{arch}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Distributable {
    #[serde(default)]
    pub github: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub strip_components: usize,
}

/// A set of shell script lines plus environment for one lifecycle phase
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub scripts: Vec<Script>,
    #[serde(default)]
    pub env: Vec<String>,
}

/// One script line, optionally constrained to an OS
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub run: String,
    #[serde(default, rename = "on", skip_serializing_if = "String::is_empty")]
    pub platform: String,
}

/// Pick the script for `platform_os`.
///
/// A single script always wins. Otherwise the script whose `on` matches the
/// OS is preferred, falling back to the one with an empty `on`.
pub fn find_script(scripts: &[Script], platform_os: &str) -> String {
    if scripts.len() == 1 {
        return scripts[0].run.clone();
    }
    let mut fallback = String::new();
    for script in scripts {
        if script.platform.is_empty() {
            fallback = script.run.clone();
            continue;
        }
        if script.platform == platform_os {
            return script.run.clone();
        }
    }
    fallback
}

/// The featured-package list, `meta/<roster>/projects.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturedList {
    #[serde(default)]
    pub featured: Vec<String>,
}

/// Split `<roster>/<name>` into its parts; a bare name belongs to `central`
pub fn split_package_name(pkg_name: &str) -> (String, String) {
    match pkg_name.split_once('/') {
        Some((roster, name)) => (roster.to_string(), name.to_string()),
        None => (ROSTER_CENTRAL.to_string(), pkg_name.to_string()),
    }
}

/// Parse a `package.yml`, recovering package and roster names from the path
/// (`meta/<roster>/projects/<name>/package.yml`).
pub fn parse_package_meta_file(path: &Path) -> Result<PackageMeta> {
    let content = std::fs::read_to_string(path)?;
    let mut meta: PackageMeta = serde_yaml::from_str(&content)?;
    meta.pkg_name = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    meta.roster_name = path
        .ancestors()
        .nth(3)
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| ROSTER_CENTRAL.to_string());
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
distributable:
  github: acme/widget
  strip_components: 1
description: |
  An example widget service.
platforms:
  - linux/amd64
  - darwin/arm64
provides:
  - build/
build:
  scripts:
    - run: make release
  env:
    - CGO_ENABLED=0
install:
  scripts:
    - run: ./setup.sh
      on: linux
    - run: ./setup-mac.sh
      on: darwin
"#;

    #[test]
    fn parse_descriptor() {
        let meta: PackageMeta = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(meta.distributable.github, "acme/widget");
        assert_eq!(meta.distributable.strip_components, 1);
        assert_eq!(meta.platforms, vec!["linux/amd64", "darwin/arm64"]);
        assert_eq!(meta.build.scripts.len(), 1);
        assert_eq!(meta.build.env, vec!["CGO_ENABLED=0"]);
        assert!(meta.test.is_none());
        let install = meta.install.unwrap();
        assert_eq!(install.scripts[0].platform, "linux");
    }

    #[test]
    fn find_script_selection() {
        let scripts = vec![
            Script {
                run: "anywhere".into(),
                platform: String::new(),
            },
            Script {
                run: "on-linux".into(),
                platform: "linux".into(),
            },
        ];
        assert_eq!(find_script(&scripts, "linux"), "on-linux");
        assert_eq!(find_script(&scripts, "darwin"), "anywhere");

        let single = vec![Script {
            run: "only".into(),
            platform: "windows".into(),
        }];
        // A single script is taken regardless of its constraint.
        assert_eq!(find_script(&single, "linux"), "only");
        assert_eq!(find_script(&[], "linux"), "");
    }

    #[test]
    fn split_names() {
        assert_eq!(
            split_package_name("widget"),
            ("central".to_string(), "widget".to_string())
        );
        assert_eq!(
            split_package_name("extra/widget"),
            ("extra".to_string(), "widget".to_string())
        );
    }

    #[test]
    fn meta_file_recovers_names_from_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("meta/central/projects/widget");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("package.yml"), SAMPLE).unwrap();

        let meta = parse_package_meta_file(&dir.join("package.yml")).unwrap();
        assert_eq!(meta.pkg_name, "widget");
        assert_eq!(meta.roster_name, "central");
    }
}

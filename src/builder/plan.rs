// src/builder/plan.rs

//! Build-matrix planning
//!
//! Expands each descriptor's platform list into CI build jobs and emits
//! the matrix as a single `matrix=<json>` line, the shape the pipeline's
//! workflow consumes.

use crate::error::{Error, Result};
use crate::meta::{parse_package_meta_file, PackageMeta};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;

/// One job of the build matrix
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BuildPlan {
    pub platform: BuildPlatform,
    pub pkg: String,
}

/// Runner (and optional container) a job executes on
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BuildPlatform {
    pub os: Vec<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

fn runner_for(platform: &str) -> Result<BuildPlatform> {
    let invalid = || Error::ParseError(format!("platform {platform:?} is invalid"));
    let (os, arch) = platform.split_once('/').ok_or_else(invalid)?;
    match (os.to_lowercase().as_str(), arch.to_lowercase().as_str()) {
        ("linux", "amd64") => Ok(BuildPlatform {
            os: vec!["ubuntu-latest".into()],
            name: "linux+amd64".into(),
            container: Some("ubuntu:22.04".into()),
        }),
        ("linux", "arm64") => Ok(BuildPlatform {
            os: vec!["ubuntu-latest".into()],
            name: "linux+arm64".into(),
            container: Some("arm64v8/ubuntu:22.04".into()),
        }),
        ("linux", "arm" | "arm32" | "armv7") => Ok(BuildPlatform {
            os: vec!["ubuntu-latest".into()],
            name: "linux+arm".into(),
            container: Some("armv7/armhf-ubuntu".into()),
        }),
        ("darwin", "arm64") => Ok(BuildPlatform {
            os: vec!["macos-latest".into()],
            name: "macos+arm64".into(),
            container: None,
        }),
        ("darwin", "amd64") => Ok(BuildPlatform {
            os: vec!["macos-13".into()],
            name: "macos+amd64".into(),
            container: None,
        }),
        ("windows", "amd64") => Ok(BuildPlatform {
            os: vec!["windows-latest".into()],
            name: "windows+amd64".into(),
            container: None,
        }),
        _ => Err(invalid()),
    }
}

/// Jobs for one descriptor, in the order its platforms are declared.
///
/// A platform-agnostic descriptor expands to a single `linux+noarch` job.
pub fn expand_platforms(meta: &PackageMeta) -> Result<Vec<BuildPlan>> {
    let mut plans = Vec::new();
    for platform in &meta.platforms {
        plans.push(BuildPlan {
            platform: runner_for(platform)?,
            pkg: meta.pkg_name.clone(),
        });
    }
    if meta.platforms.is_empty() {
        plans.push(BuildPlan {
            platform: BuildPlatform {
                os: vec!["ubuntu-latest".into()],
                name: "linux+noarch".into(),
                container: Some("ubuntu:22.04".into()),
            },
            pkg: meta.pkg_name.clone(),
        });
    }
    Ok(plans)
}

/// Expand all descriptors and write the `matrix=<json>` line
pub fn plan(descriptor_paths: &[PathBuf], output: &mut dyn Write) -> Result<()> {
    let mut plans = Vec::new();
    for path in descriptor_paths {
        let meta = parse_package_meta_file(path)?;
        plans.extend(expand_platforms(&meta)?);
    }
    let json = serde_json::to_string(&plans)
        .map_err(|e| Error::ParseError(format!("failed to encode matrix: {e}")))?;
    writeln!(output, "matrix={json}")
        .map_err(|e| Error::IoError(format!("failed to write matrix: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_with(platforms: &[&str]) -> PackageMeta {
        PackageMeta {
            platforms: platforms.iter().map(|s| s.to_string()).collect(),
            pkg_name: "pkgA".into(),
            ..Default::default()
        }
    }

    #[test]
    fn expansion_keeps_declaration_order() {
        let plans = expand_platforms(&meta_with(&["linux/amd64", "darwin/arm64"])).unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].platform.os, vec!["ubuntu-latest"]);
        assert_eq!(plans[0].platform.name, "linux+amd64");
        assert_eq!(plans[1].platform.os, vec!["macos-latest"]);
        assert_eq!(plans[1].platform.name, "macos+arm64");
    }

    #[test]
    fn agnostic_descriptor_gets_noarch_job() {
        let plans = expand_platforms(&meta_with(&[])).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].platform.name, "linux+noarch");
        assert_eq!(plans[0].platform.container.as_deref(), Some("ubuntu:22.04"));
    }

    #[test]
    fn invalid_platform_is_rejected() {
        assert!(expand_platforms(&meta_with(&["linux/mips"])).is_err());
        assert!(expand_platforms(&meta_with(&["linux"])).is_err());
    }

    #[test]
    fn matrix_line_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("meta/central/projects/pkgA");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("package.yml"),
            "description: test\nplatforms:\n  - linux/amd64\n  - darwin/arm64\n",
        )
        .unwrap();

        let mut out = Vec::new();
        plan(&[dir.join("package.yml")], &mut out).unwrap();
        let line = String::from_utf8(out).unwrap();
        assert_eq!(
            line,
            "matrix=[{\"platform\":{\"os\":[\"ubuntu-latest\"],\"name\":\"linux+amd64\",\"container\":\"ubuntu:22.04\"},\"pkg\":\"pkgA\"},{\"platform\":{\"os\":[\"macos-latest\"],\"name\":\"macos+arm64\"},\"pkg\":\"pkgA\"}]\n"
        );
    }

    #[test]
    fn windows_runner_mapping() {
        let plans = expand_platforms(&meta_with(&["windows/amd64"])).unwrap();
        assert_eq!(plans[0].platform.os, vec!["windows-latest"]);
        assert!(plans[0].platform.container.is_none());
    }
}

// src/commands.rs
//! CLI command implementations
//!
//! The only place that reads environment variables: tokens and credentials
//! are collected here and handed to the library as values.

use anyhow::{Context, Result};
use neopkg::{Credentials, Roster, RosterConfig, RosterOptions};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

fn open_roster(dir: &Path, experimental: bool, sync_when_initialized: bool) -> Result<Roster> {
    let config = RosterConfig {
        credentials: Credentials::from_env(),
        ..RosterConfig::default()
    };
    let opts = RosterOptions {
        config,
        sync_when_initialized,
        experimental,
        ..Default::default()
    };
    Roster::new(dir, opts).context("failed to open the package roster")
}

/// Resolve a descriptor argument: a literal path to `package.yml`, or a
/// package name under `$PKGS_PATH/projects/<name>/package.yml`
fn descriptor_path(arg: &str) -> PathBuf {
    let looks_like_file = arg.ends_with("package.yml") || arg.ends_with("package.yaml");
    if looks_like_file {
        return PathBuf::from(arg);
    }
    match std::env::var("PKGS_PATH") {
        Ok(root) if !root.is_empty() => PathBuf::from(root)
            .join("projects")
            .join(arg)
            .join("package.yml"),
        _ => PathBuf::from(arg),
    }
}

/// The matrix sink: `$GITHUB_OUTPUT` when set, stdout otherwise
fn matrix_sink() -> Result<Box<dyn Write>> {
    match std::env::var("GITHUB_OUTPUT") {
        Ok(path) if !path.is_empty() => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open {path}"))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(std::io::stdout())),
    }
}

pub fn search(dir: &Path, package: &str, experimental: bool) -> Result<()> {
    let roster = open_roster(dir, experimental, true)?;
    let result = roster.search(package, 10)?;

    if let Some(exact) = &result.exact_match {
        println!("{}", serde_yaml::to_string(exact)?);
        if !exact.installed_version.is_empty() {
            println!("installed: {} ({})", exact.installed_version, exact.installed_path);
        }
        return Ok(());
    }

    println!("Package {package:?} not found");
    if result.possibles.is_empty() {
        return Ok(());
    }
    println!("\nWhat you are looking for might be:");
    for cache in &result.possibles {
        let addr = cache
            .github
            .as_ref()
            .map(|g| format!("https://github.com/{}", g.full_name))
            .unwrap_or_default();
        if cache.installed_version.is_empty() {
            println!("  {:24} {addr}  -", cache.name);
        } else {
            println!(
                "  {:24} {addr}  installed: {}",
                cache.name, cache.installed_version
            );
        }
    }
    Ok(())
}

pub fn update(dir: &Path) -> Result<()> {
    let roster = open_roster(dir, false, true)?;
    let updates = roster.update()?;
    if updates.upgradable.is_empty() {
        println!("no upgradable packages");
        return Ok(());
    }
    println!("Upgradable packages:");
    for pkg in &updates.upgradable {
        println!(
            "   {} {} --> {} available",
            pkg.pkg_name,
            pkg.installed_version,
            pkg.latest_release.trim_start_matches('v')
        );
    }
    Ok(())
}

pub fn install(dir: &Path, packages: &[String]) -> Result<()> {
    let roster = open_roster(dir, false, true)?;
    let mut failed = false;
    for name in packages {
        let mut output = std::io::stdout();
        let status = roster.install(name, &mut output, &[]);
        match (&status.err, &status.installed) {
            (None, Some(inst)) => {
                println!("{} installed {} {}", name, inst.version, inst.path.display())
            }
            (Some(err), _) => {
                eprintln!("{name} install failed: {err}");
                failed = true;
            }
            _ => {}
        }
    }
    if failed {
        anyhow::bail!("one or more installs failed");
    }
    Ok(())
}

pub fn uninstall(dir: &Path, package: &str) -> Result<()> {
    let roster = open_roster(dir, false, true)?;
    roster.uninstall(package, &mut std::io::stdout(), &[])?;
    println!("Uninstalled {package}");
    Ok(())
}

pub fn audit(descriptor: &str) -> Result<()> {
    let path = descriptor_path(descriptor);
    anyhow::ensure!(path.is_file(), "package descriptor not found: {}", path.display());
    // Audit runs against descriptor files outside any roster checkout; a
    // scratch base directory keeps it hermetic.
    let scratch = tempfile::tempdir()?;
    let roster = open_roster(scratch.path(), false, false)?;
    roster.audit(&path, &mut std::io::stdout())?;
    Ok(())
}

pub fn plan(packages: &[String]) -> Result<()> {
    let scratch = tempfile::tempdir()?;
    let roster = open_roster(scratch.path(), false, false)?;

    let mut files = Vec::new();
    for name in packages {
        let path = descriptor_path(name);
        if !path.is_file() {
            println!("Package not found {}", path.display());
            continue;
        }
        if let Err(e) = roster.audit(&path, &mut std::io::stdout()) {
            println!("Audit failed {e}");
            continue;
        }
        files.push(path);
    }

    let mut sink = matrix_sink()?;
    roster.plan(&files, sink.as_mut())?;
    Ok(())
}

pub fn build(descriptor: &Path, version: Option<&str>, dest: &Path) -> Result<()> {
    anyhow::ensure!(
        descriptor.is_file(),
        "package descriptor not found: {}",
        descriptor.display()
    );
    let scratch = tempfile::tempdir()?;
    let roster = open_roster(scratch.path(), false, false)?;
    roster.build(descriptor, version, dest, &mut std::io::stdout())?;
    Ok(())
}

pub fn rebuild_plan(dir: &Path) -> Result<()> {
    let roster = open_roster(dir, false, true)?;
    let mut sink = matrix_sink()?;
    roster.rebuild_plan(sink.as_mut())?;
    Ok(())
}

pub fn rebuild_cache(dir: &Path) -> Result<()> {
    let roster = open_roster(dir, false, true)?;
    roster.rebuild_cache(&mut std::io::stdout())?;
    Ok(())
}

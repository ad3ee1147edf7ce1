// src/recipe.rs

//! Recipe script execution
//!
//! Build, test, install and uninstall recipes are shell fragments from the
//! catalog. They are materialized as script files next to the tree they
//! operate on and run through `sh -c` (`cmd /c` on Windows) with the
//! process environment, the recipe environment and the caller environment
//! merged. The catalog is assumed curated; there is no sandbox.

use crate::error::{Error, Result};
use crate::meta::{find_script, Recipe};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Ceiling for build/test recipes (1 hour)
pub const BUILD_TIMEOUT: Duration = Duration::from_secs(3600);

/// Ceiling for install/uninstall recipes (60 seconds)
pub const HOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// How much stderr to keep in a failure message
const STDERR_TAIL: usize = 1024;

#[cfg(windows)]
const SCRIPT_EXT: &str = "cmd";
#[cfg(not(windows))]
const SCRIPT_EXT: &str = "sh";

/// Write the script lines to `<dir>/__<kind>__.sh` (`.cmd` on Windows).
///
/// POSIX scripts get a `set -e` prologue so the first failing line aborts
/// the recipe.
pub fn make_script_file(lines: &[String], dir: &Path, kind: &str) -> Result<PathBuf> {
    // Absolute, so `sh -c` resolves it regardless of the child's cwd.
    let dir = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(dir)
    };
    let path = dir.join(format!("__{kind}__.{SCRIPT_EXT}"));
    let mut content = String::new();
    if cfg!(not(windows)) {
        content.push_str("set -e\n");
    }
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    fs::write(&path, content)
        .map_err(|e| Error::IoError(format!("failed to write {}: {e}", path.display())))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    }
    Ok(path)
}

fn apply_env(cmd: &mut Command, vars: &[String]) {
    for var in vars {
        if let Some((key, value)) = var.split_once('=') {
            cmd.env(key, value);
        }
    }
}

/// Run one materialized script and pipe its output to `output`.
///
/// The child inherits the process environment, then `recipe_env`, then
/// `caller_env` (later wins). A non-zero exit or a timeout surfaces as
/// [`Error::RecipeFailed`] carrying the stderr tail.
pub fn run_script_file(
    script: &Path,
    kind: &'static str,
    cwd: &Path,
    recipe_env: &[String],
    caller_env: &[String],
    output: &mut dyn Write,
    timeout: Duration,
) -> Result<()> {
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/c").arg(script);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(script.to_string_lossy().as_ref());
        c
    };
    cmd.current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    apply_env(&mut cmd, recipe_env);
    apply_env(&mut cmd, caller_env);

    debug!("running {kind} script {}", script.display());
    let mut child = cmd.spawn().map_err(|e| Error::RecipeFailed {
        kind,
        detail: format!("failed to spawn: {e}"),
    })?;

    let status = child.wait_timeout(timeout).map_err(|e| Error::RecipeFailed {
        kind,
        detail: format!("wait failed: {e}"),
    })?;
    let Some(status) = status else {
        let _ = child.kill();
        let _ = child.wait();
        return Err(Error::RecipeFailed {
            kind,
            detail: format!("timed out after {}s", timeout.as_secs()),
        });
    };

    let captured = child.wait_with_output().map_err(|e| Error::RecipeFailed {
        kind,
        detail: format!("failed to collect output: {e}"),
    })?;
    output.write_all(&captured.stdout).ok();
    output.write_all(&captured.stderr).ok();

    if !status.success() {
        let stderr = String::from_utf8_lossy(&captured.stderr);
        let tail_start = stderr.len().saturating_sub(STDERR_TAIL);
        let tail = stderr
            .get(tail_start..)
            .unwrap_or(&stderr)
            .trim()
            .to_string();
        return Err(Error::RecipeFailed {
            kind,
            detail: format!("exit code {}: {tail}", status.code().unwrap_or(-1)),
        });
    }
    Ok(())
}

/// Materialize and run a recipe's script for the current OS, cleaning the
/// script file up afterwards.
pub fn run_recipe(
    recipe: &Recipe,
    kind: &'static str,
    script_dir: &Path,
    cwd: &Path,
    caller_env: &[String],
    output: &mut dyn Write,
    timeout: Duration,
) -> Result<()> {
    let run = find_script(&recipe.scripts, crate::platform::PlatformTag::runtime().os.as_str());
    if run.is_empty() {
        debug!("no {kind} script for this platform, skipping");
        return Ok(());
    }
    let script = make_script_file(&[run], script_dir, kind)?;
    let result = run_script_file(
        &script,
        kind,
        cwd,
        &recipe.env,
        caller_env,
        output,
        timeout,
    );
    if let Err(e) = fs::remove_file(&script) {
        warn!("failed to clean {}: {e}", script.display());
    }
    result
}

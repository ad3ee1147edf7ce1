// src/link.rs

//! Portable version pointer
//!
//! `dist/<name>/current` must be observable as "points at the active
//! version directory". Where the OS supports symlinks that is a symlink;
//! elsewhere it is a plain file whose content is the absolute path of the
//! target. Consumers go through [`readlink`] and never assume an OS
//! symlink.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

#[cfg(unix)]
pub fn symlink(original: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(original, link).map_err(|e| {
        Error::IoError(format!(
            "symlink {:?} -> {:?}: {e}",
            original.display(),
            link.display()
        ))
    })
}

#[cfg(unix)]
pub fn readlink(link: &Path) -> Result<PathBuf> {
    std::fs::read_link(link).map_err(|e| {
        Error::IoError(format!("readlink {:?}: {e}", link.display()))
    })
}

#[cfg(not(unix))]
pub fn symlink(original: &Path, link: &Path) -> Result<()> {
    // Pointer file: the absolute target path as content.
    std::fs::write(link, original.to_string_lossy().as_bytes()).map_err(|e| {
        Error::IoError(format!(
            "pointer file {:?} -> {:?}: {e}",
            original.display(),
            link.display()
        ))
    })
}

#[cfg(not(unix))]
pub fn readlink(link: &Path) -> Result<PathBuf> {
    let content = std::fs::read_to_string(link)
        .map_err(|e| Error::IoError(format!("readlink {:?}: {e}", link.display())))?;
    let target = content.trim();
    if target.is_empty() {
        return Err(Error::IoError(format!("{:?} is not a version pointer", link.display())));
    }
    Ok(PathBuf::from(target))
}

/// Remove a version pointer regardless of its representation
pub fn remove(link: &Path) -> Result<()> {
    std::fs::remove_file(link)
        .map_err(|e| Error::IoError(format!("remove {:?}: {e}", link.display())))
}

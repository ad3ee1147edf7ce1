// src/archive.rs

//! Tar + gzip archive codec with strip-components extraction
//!
//! Creates the release archives the builder publishes and unpacks the
//! distribution archives the installer downloads. Entry names are
//! slash-normalized, permission bits and mtimes are preserved, and owner
//! ids fall back to the current process where the platform has no POSIX
//! owners.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Drop the first `n` slash-separated components of a tar entry name.
///
/// Empty components are ignored when counting, a trailing slash survives,
/// and an entry fully consumed by the strip comes back empty (the caller
/// skips it).
pub fn strip_components(name: &str, n: usize) -> String {
    if n == 0 {
        return name.to_string();
    }
    let trailing = name.ends_with('/');
    let parts: Vec<&str> = name.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() <= n {
        return String::new();
    }
    let mut out = parts[n..].join("/");
    if trailing {
        out.push('/');
    }
    out
}

/// Reject entry names that would land outside the extraction root
fn sanitize_entry(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    for comp in path.components() {
        match comp {
            Component::ParentDir => {
                return Err(Error::ExtractError(format!(
                    "entry {name:?} escapes the destination"
                )))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(Error::ExtractError(format!("entry {name:?} is absolute")))
            }
            _ => {}
        }
    }
    Ok(path.to_path_buf())
}

fn is_gzip_path(path: &Path) -> bool {
    let s = path.to_string_lossy();
    s.ends_with(".tar.gz") || s.ends_with(".tgz") || s.ends_with(".gz")
}

#[cfg(unix)]
fn owner_ids(meta: &fs::Metadata) -> (u64, u64) {
    use std::os::unix::fs::MetadataExt;
    (meta.uid() as u64, meta.gid() as u64)
}

#[cfg(not(unix))]
fn owner_ids(_meta: &fs::Metadata) -> (u64, u64) {
    (0, 0)
}

#[cfg(unix)]
fn mode_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_bits(meta: &fs::Metadata) -> u32 {
    if meta.is_dir() {
        0o755
    } else {
        0o644
    }
}

fn mtime_secs(meta: &fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Create a tar archive at `dest` from `entries`, each resolved under `root`.
///
/// Directories are walked recursively. When `dest` ends in `.tar.gz` or
/// `.tgz` the stream is gzip-framed at the highest compression level.
pub fn archive<P: AsRef<Path>>(root: &Path, dest: &Path, entries: &[P]) -> Result<()> {
    let out = File::create(dest)
        .map_err(|e| Error::IoError(format!("failed to create {}: {e}", dest.display())))?;
    let out = BufWriter::new(out);

    if is_gzip_path(dest) {
        let encoder = GzEncoder::new(out, Compression::best());
        let mut builder = tar::Builder::new(encoder);
        append_entries(&mut builder, root, entries)?;
        let encoder = builder
            .into_inner()
            .map_err(|e| Error::IoError(format!("failed to finish archive: {e}")))?;
        let mut out = encoder
            .finish()
            .map_err(|e| Error::IoError(format!("failed to finish gzip stream: {e}")))?;
        out.flush()
            .map_err(|e| Error::IoError(format!("failed to flush {}: {e}", dest.display())))?;
    } else {
        let mut builder = tar::Builder::new(out);
        append_entries(&mut builder, root, entries)?;
        let mut out = builder
            .into_inner()
            .map_err(|e| Error::IoError(format!("failed to finish archive: {e}")))?;
        out.flush()
            .map_err(|e| Error::IoError(format!("failed to flush {}: {e}", dest.display())))?;
    }
    debug!("archived {} entries into {}", entries.len(), dest.display());
    Ok(())
}

fn append_entries<W: Write, P: AsRef<Path>>(
    builder: &mut tar::Builder<W>,
    root: &Path,
    entries: &[P],
) -> Result<()> {
    for entry in entries {
        let rel = entry.as_ref();
        let meta = fs::metadata(root.join(rel))
            .map_err(|e| Error::IoError(format!("failed to stat {}: {e}", rel.display())))?;
        if meta.is_dir() {
            append_dir(builder, root, rel)?;
        } else {
            append_file(builder, root, rel)?;
        }
    }
    Ok(())
}

fn slash_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn append_dir<W: Write>(builder: &mut tar::Builder<W>, root: &Path, rel: &Path) -> Result<()> {
    let full = root.join(rel);
    let meta = fs::metadata(&full)?;
    let (uid, gid) = owner_ids(&meta);

    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Directory);
    header.set_size(0);
    header.set_mode(mode_bits(&meta));
    header.set_mtime(mtime_secs(&meta));
    header.set_uid(uid);
    header.set_gid(gid);
    builder
        .append_data(&mut header, format!("{}/", slash_name(rel)), std::io::empty())
        .map_err(|e| Error::IoError(format!("failed to append {}: {e}", rel.display())))?;

    let mut children: Vec<_> = fs::read_dir(&full)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|d| d.file_name())
        .collect();
    children.sort();
    for child in children {
        let child_rel = rel.join(&child);
        let child_meta = fs::metadata(root.join(&child_rel))?;
        if child_meta.is_dir() {
            append_dir(builder, root, &child_rel)?;
        } else {
            append_file(builder, root, &child_rel)?;
        }
    }
    Ok(())
}

fn append_file<W: Write>(builder: &mut tar::Builder<W>, root: &Path, rel: &Path) -> Result<()> {
    let full = root.join(rel);
    let meta = fs::metadata(&full)?;
    let (uid, gid) = owner_ids(&meta);

    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(meta.len());
    header.set_mode(mode_bits(&meta));
    header.set_mtime(mtime_secs(&meta));
    header.set_uid(uid);
    header.set_gid(gid);
    let mut file = File::open(&full)
        .map_err(|e| Error::IoError(format!("failed to open {}: {e}", full.display())))?;
    builder
        .append_data(&mut header, slash_name(rel), &mut file)
        .map_err(|e| Error::IoError(format!("failed to append {}: {e}", rel.display())))?;
    Ok(())
}

/// Extract a tar (optionally gzip-framed) archive into `dest`, dropping the
/// first `strip` path components of every entry.
///
/// Entries fully consumed by the strip are skipped; names containing `..`
/// or absolute names are rejected. Regular files keep their permission bits
/// and mtime, symlink entries are recreated as symlinks.
pub fn extract(archive_path: &Path, dest: &Path, strip: usize) -> Result<()> {
    let file = File::open(archive_path)
        .map_err(|e| Error::IoError(format!("failed to open {}: {e}", archive_path.display())))?;
    let mut reader = BufReader::new(file);

    // Gzip is detected from the magic bytes, not the file name, so a
    // mislabeled archive still extracts.
    let mut magic = Vec::with_capacity(2);
    reader
        .by_ref()
        .take(2)
        .read_to_end(&mut magic)
        .map_err(|e| Error::ExtractError(format!("short read: {e}")))?;
    let is_gzip = magic == [0x1f, 0x8b];
    let head = std::io::Cursor::new(magic).chain(reader);
    let stream: Box<dyn Read> = if is_gzip {
        Box::new(GzDecoder::new(head))
    } else {
        Box::new(head)
    };

    let mut ar = tar::Archive::new(stream);
    ar.set_preserve_permissions(true);
    ar.set_preserve_mtime(true);

    fs::create_dir_all(dest)?;
    for entry in ar
        .entries()
        .map_err(|e| Error::ExtractError(format!("invalid archive: {e}")))?
    {
        let mut entry = entry.map_err(|e| Error::ExtractError(format!("invalid header: {e}")))?;
        let raw = entry
            .path()
            .map_err(|e| Error::ExtractError(format!("invalid entry name: {e}")))?
            .to_string_lossy()
            .replace('\\', "/");
        let stripped = strip_components(&raw, strip);
        if stripped.is_empty() {
            continue;
        }
        let rel = sanitize_entry(&stripped)?;
        let target = dest.join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        entry
            .unpack(&target)
            .map_err(|e| Error::ExtractError(format!("failed to unpack {raw:?}: {e}")))?;
    }
    Ok(())
}

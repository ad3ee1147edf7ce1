// src/platform.rs

//! Platform tags: `<os>/<arch>` pairs naming a distribution variant
//!
//! The empty tag (serialized as `""` or `"/"`) is platform-agnostic: a
//! package that carries it installs everywhere.

use crate::error::{Error, Result};
use std::fmt;

/// Operating systems the catalog knows how to target
pub const KNOWN_OS: &[&str] = &["linux", "darwin", "windows"];

/// CPU architectures the catalog knows how to target
pub const KNOWN_ARCH: &[&str] = &["amd64", "arm64", "arm"];

/// One `<os>/<arch>` pair; both parts empty means platform-agnostic
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PlatformTag {
    pub os: String,
    pub arch: String,
}

impl PlatformTag {
    pub fn new(os: &str, arch: &str) -> Self {
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }

    /// Parse a tag without validating the os/arch vocabulary.
    ///
    /// `""` and `"/"` both parse to the agnostic tag; anything else must
    /// contain exactly one `/`.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() || s == "/" {
            return Ok(Self::default());
        }
        match s.split_once('/') {
            Some((os, arch)) => Ok(Self::new(os, arch)),
            None => Err(Error::ParseError(format!("invalid platform: {s}"))),
        }
    }

    /// Parse and reject tags outside the known os/arch vocabulary
    pub fn parse_strict(s: &str) -> Result<Self> {
        let tag = Self::parse(s)?;
        if tag.is_agnostic() {
            return Ok(tag);
        }
        let os = tag.os.to_lowercase();
        let arch = tag.arch.to_lowercase();
        if !KNOWN_OS.contains(&os.as_str()) || !KNOWN_ARCH.contains(&arch.as_str()) {
            return Err(Error::ParseError(format!("platform {s:?} is invalid")));
        }
        Ok(Self { os, arch })
    }

    /// True for the empty tag
    pub fn is_agnostic(&self) -> bool {
        self.os.is_empty() && self.arch.is_empty()
    }

    /// Tag of the running host, in catalog vocabulary (amd64/arm64/arm)
    pub fn runtime() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            other => other,
        };
        Self::new(os, arch)
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_tag() {
        let tag = PlatformTag::parse("linux/amd64").unwrap();
        assert_eq!(tag.os, "linux");
        assert_eq!(tag.arch, "amd64");
        assert!(!tag.is_agnostic());
    }

    #[test]
    fn parse_agnostic_forms() {
        assert!(PlatformTag::parse("").unwrap().is_agnostic());
        assert!(PlatformTag::parse("/").unwrap().is_agnostic());
    }

    #[test]
    fn parse_rejects_missing_separator() {
        assert!(PlatformTag::parse("linux").is_err());
    }

    #[test]
    fn strict_rejects_unknown_vocabulary() {
        assert!(PlatformTag::parse_strict("plan9/mips").is_err());
        assert!(PlatformTag::parse_strict("linux/arm64").is_ok());
        assert!(PlatformTag::parse_strict("").is_ok());
    }

    #[test]
    fn runtime_uses_catalog_vocabulary() {
        let tag = PlatformTag::runtime();
        assert!(!tag.os.is_empty());
        assert_ne!(tag.arch, "x86_64");
        assert_ne!(tag.arch, "aarch64");
    }
}

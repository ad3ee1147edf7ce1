// src/lib.rs

//! Neo Package Manager
//!
//! Package-catalog + cache + install engine for the neo server ecosystem.
//!
//! # Architecture
//!
//! - Two-layer metadata: authoritative descriptors synced from a git
//!   catalog, derived cache records computed from release-host queries
//! - Platform-aware distribution resolution against the content server
//! - Atomic installs: download, checksum, extract, swap the `current`
//!   pointer, run the install recipe
//! - A developer pipeline that audits descriptors, plans a cross-platform
//!   build matrix, builds release archives and deploys them

pub mod archive;
pub mod builder;
pub mod cache;
pub mod catalog;
pub mod client;
pub mod config;
pub mod dist;
mod error;
pub mod github;
pub mod install;
pub mod link;
pub mod meta;
pub mod platform;
pub mod recipe;
pub mod roster;
pub mod search;
pub mod update;

pub use cache::{Availability, CacheManager, PackageCache};
pub use catalog::{CatalogSource, GitCatalog, SyncStatus};
pub use config::{AuditConfig, Credentials, DistConfig, RosterConfig, ROSTER_CENTRAL};
pub use error::{Error, Result};
pub use github::{GithubClient, ReleaseHost, ReleaseInfo, RepoInfo};
pub use install::{InstallStatus, InstalledVersion, Installer};
pub use meta::{FeaturedList, PackageMeta, Recipe, Script};
pub use platform::PlatformTag;
pub use roster::{Roster, RosterOptions, Updates};
pub use search::{SearchResult, Searcher};

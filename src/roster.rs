// src/roster.rs

//! The roster façade
//!
//! Owns the on-disk layout (`meta/` and `dist/` under one base directory),
//! wires the capability implementations together and exposes the public
//! operations: sync, update, search, install, uninstall, upgrade, audit,
//! plan, build and the cache rebuild used by CI.

use crate::builder;
use crate::cache::{CacheManager, PackageCache};
use crate::catalog::{CatalogSource, GitCatalog, SyncStatus};
use crate::client::DistClient;
use crate::config::{RosterConfig, ROSTER_CENTRAL};
use crate::error::{Error, Result};
use crate::github::{GithubClient, ReleaseHost};
use crate::install::{InstallStatus, InstalledVersion, Installer};
use crate::meta::{parse_package_meta_file, split_package_name, FeaturedList, PackageMeta};
use crate::search::{SearchResult, Searcher};
use crate::update::{probe_availability, update_package_cache};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Construction options for [`Roster`]
pub struct RosterOptions {
    pub config: RosterConfig,
    /// Run a catalog sync when the layout is created for the first time
    pub sync_when_initialized: bool,
    /// Include alpha releases in search results
    pub experimental: bool,
    /// Release-host override, for tests
    pub release_host: Option<Box<dyn ReleaseHost>>,
    /// Catalog override, for tests
    pub catalog: Option<Box<dyn CatalogSource>>,
}

impl Default for RosterOptions {
    fn default() -> Self {
        Self {
            config: RosterConfig::default(),
            sync_when_initialized: false,
            experimental: false,
            release_host: None,
            catalog: None,
        }
    }
}

/// Result of an update run
#[derive(Debug, Default)]
pub struct Updates {
    pub updated: Vec<Updated>,
    pub upgradable: Vec<Upgradable>,
}

/// A package whose cache moved to a new release
#[derive(Debug)]
pub struct Updated {
    pub roster_name: String,
    pub pkg_name: String,
    pub latest_release: String,
}

/// An installed package with a newer release available
#[derive(Debug)]
pub struct Upgradable {
    pub roster_name: String,
    pub pkg_name: String,
    pub latest_release: String,
    pub installed_version: String,
}

/// Package-catalog + cache + install engine rooted at one base directory
pub struct Roster {
    meta_dir: PathBuf,
    config: RosterConfig,
    experimental: bool,
    catalog: Box<dyn CatalogSource>,
    host: Box<dyn ReleaseHost>,
    installer: Installer,
    cache_managers: BTreeMap<String, CacheManager>,
    client: DistClient,
}

impl Roster {
    pub fn new(base_dir: &Path, opts: RosterOptions) -> Result<Self> {
        let base_dir = if base_dir.is_absolute() {
            base_dir.to_path_buf()
        } else {
            std::env::current_dir()?.join(base_dir)
        };
        let meta_dir = base_dir.join("meta");
        let dist_dir = base_dir.join("dist");
        let first_run = !meta_dir.exists() || !dist_dir.exists();
        std::fs::create_dir_all(&meta_dir)?;
        std::fs::create_dir_all(&dist_dir)?;

        let config = opts.config;
        let token = config.credentials.github_token.clone();
        let catalog = opts
            .catalog
            .unwrap_or_else(|| Box::new(GitCatalog::new(token.clone())));
        let host: Box<dyn ReleaseHost> = match opts.release_host {
            Some(host) => host,
            None => Box::new(GithubClient::new(token)?),
        };

        let mut cache_managers = BTreeMap::new();
        for roster in config.rosters.keys() {
            let cache_dir = meta_dir.join(roster).join(".cache");
            std::fs::create_dir_all(&cache_dir)?;
            cache_managers.insert(roster.clone(), CacheManager::new(cache_dir));
        }

        let roster = Self {
            installer: Installer::new(dist_dir, config.dist.clone())?,
            meta_dir,
            config,
            experimental: opts.experimental,
            catalog,
            host,
            cache_managers,
            client: DistClient::new()?,
        };

        if first_run && opts.sync_when_initialized {
            // First-run sync is best-effort: a missing network must not
            // prevent construction.
            if let Err(e) = roster.sync() {
                warn!("initial catalog sync failed: {e}");
            }
        }
        Ok(roster)
    }

    /// `meta/<roster>`
    pub fn meta_dir(&self, roster: &str) -> PathBuf {
        self.meta_dir.join(roster)
    }

    pub fn dist_dir(&self) -> &Path {
        self.installer.dist_dir()
    }

    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    fn cache_manager(&self, roster: &str) -> Result<&CacheManager> {
        self.cache_managers
            .get(roster)
            .ok_or_else(|| Error::NotFound(format!("roster {roster:?}")))
    }

    // ---------------------------------------------------------------- sync

    /// Divergence status for every configured roster
    pub fn sync_check(&self) -> Result<Vec<SyncStatus>> {
        let mut statuses = Vec::new();
        for (roster, url) in &self.config.rosters {
            statuses.push(self.catalog.sync_check(roster, &self.meta_dir(roster), url)?);
        }
        Ok(statuses)
    }

    /// Clone-or-pull every configured roster
    pub fn sync(&self) -> Result<()> {
        for (roster, url) in &self.config.rosters {
            self.catalog.sync(&self.meta_dir(roster), url)?;
        }
        Ok(())
    }

    /// Commit and push cache updates of every configured roster
    pub fn push_cache(&self) -> Result<()> {
        for (roster, url) in &self.config.rosters {
            self.catalog.push_cache(&self.meta_dir(roster), url)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------- loading

    /// Load a descriptor; `Ok(None)` when the package has none
    pub fn load_package_meta(&self, pkg_name: &str) -> Result<Option<PackageMeta>> {
        let (roster, name) = split_package_name(pkg_name);
        let project_dir = self.meta_dir(&roster).join("projects").join(&name);
        let mut path = project_dir.join("package.yml");
        if !path.is_file() {
            path = project_dir.join("package.yaml");
            if !path.is_file() {
                return Ok(None);
            }
        }
        parse_package_meta_file(&path).map(Some)
    }

    /// Load a cache record from disk
    pub fn load_package_cache(&self, pkg_name: &str) -> Result<PackageCache> {
        let (roster, name) = split_package_name(pkg_name);
        self.cache_manager(&roster)?.read_cache(&name)
    }

    /// Walk descriptor names of every roster in lexicographic order
    pub fn walk_package_meta(&self, mut cb: impl FnMut(&str) -> bool) -> Result<()> {
        for roster in self.config.rosters.keys() {
            let projects = self.meta_dir(roster).join("projects");
            for name in crate::cache::sorted_subdirs(&projects)? {
                let pkg_name = qualified_name(roster, &name);
                if !cb(&pkg_name) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Walk cached package names of every roster
    pub fn walk_package_cache(&self, mut cb: impl FnMut(&str) -> bool) -> Result<()> {
        for (roster, manager) in &self.cache_managers {
            let mut stop = false;
            manager.walk_entries(|name| {
                let pkg_name = qualified_name(roster, name);
                if !cb(&pkg_name) {
                    stop = true;
                    return false;
                }
                true
            })?;
            if stop {
                return Ok(());
            }
        }
        Ok(())
    }

    /// The central roster's featured-package list
    pub fn featured_list(&self) -> Result<FeaturedList> {
        let path = self.meta_dir(ROSTER_CENTRAL).join("projects.yml");
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    // -------------------------------------------------------------- update

    /// Refresh one package's cache record from the release host and write
    /// it back
    pub fn update_package_cache(&self, meta: &PackageMeta) -> Result<PackageCache> {
        let cache = update_package_cache(meta, self.host.as_ref())?;
        self.cache_manager(&meta.roster_name)?.write_cache(&cache)?;
        Ok(cache)
    }

    /// Sync diverged rosters, refresh every cache and report what moved
    pub fn update(&self) -> Result<Updates> {
        let mut updates = Updates::default();
        for (roster, url) in &self.config.rosters {
            let check = self.catalog.sync_check(roster, &self.meta_dir(roster), url)?;
            if check.need_sync {
                self.catalog.sync(&self.meta_dir(roster), url)?;
            }
        }
        self.walk_package_meta(|pkg_name| {
            let Ok(Some(meta)) = self.load_package_meta(pkg_name) else {
                return true;
            };
            let old = self.load_package_cache(pkg_name).ok();
            let new = match self.update_package_cache(&meta) {
                Ok(cache) => cache,
                Err(e) => {
                    warn!("{pkg_name} cache update failed: {e}");
                    return true;
                }
            };
            let moved = old
                .as_ref()
                .map(|o| o.latest_release_tag != new.latest_release_tag)
                .unwrap_or(true);
            if moved {
                updates.updated.push(Updated {
                    roster_name: meta.roster_name.clone(),
                    pkg_name: pkg_name.to_string(),
                    latest_release: new.latest_release_tag.clone(),
                });
            }
            if let Ok(inst) = self.installer.installed_version(pkg_name) {
                if inst.version != new.latest_version {
                    updates.upgradable.push(Upgradable {
                        roster_name: meta.roster_name.clone(),
                        pkg_name: pkg_name.to_string(),
                        latest_release: new.latest_release_tag.clone(),
                        installed_version: inst.version,
                    });
                }
            }
            true
        })?;
        Ok(updates)
    }

    /// Rebuild every cache record and availability file, then push the
    /// result back to the catalog. Per-package failures are logged and
    /// skipped.
    pub fn rebuild_cache(&self, output: &mut dyn Write) -> Result<()> {
        self.walk_package_meta(|pkg_name| {
            if let Err(e) = self.rebuild_one_cache(pkg_name, output) {
                writeln!(output, "{pkg_name} cache rebuild failed: {e}").ok();
            }
            true
        })?;
        self.push_cache()
    }

    fn rebuild_one_cache(&self, pkg_name: &str, output: &mut dyn Write) -> Result<()> {
        let meta = self
            .load_package_meta(pkg_name)?
            .ok_or_else(|| Error::NotFound(format!("descriptor for {pkg_name:?}")))?;
        let cache = self.update_package_cache(&meta)?;
        let rows = probe_availability(&meta, &cache, &self.config.dist, &self.client)?;
        for row in &rows {
            writeln!(
                output,
                "{} {} {} {} {}",
                row.name, row.version, row.dist_url, row.status_code, row.content_length
            )
            .ok();
        }
        self.cache_manager(&meta.roster_name)?.write_availability(
            &cache.name,
            &cache.latest_version,
            &rows,
        )
    }

    /// Sync, refresh caches and probe availability; descriptors with an
    /// unavailable variant become the build plan written to `output`.
    pub fn rebuild_plan(&self, output: &mut dyn Write) -> Result<()> {
        self.sync()?;
        let mut targets = Vec::new();
        self.walk_package_meta(|pkg_name| {
            let Ok(Some(meta)) = self.load_package_meta(pkg_name) else {
                return true;
            };
            let cache = match self.update_package_cache(&meta) {
                Ok(cache) => cache,
                Err(e) => {
                    writeln!(output, "{pkg_name} cache update failed: {e}").ok();
                    return true;
                }
            };
            let rows = match probe_availability(&meta, &cache, &self.config.dist, &self.client) {
                Ok(rows) => rows,
                Err(e) => {
                    writeln!(output, "{pkg_name} availability check failed: {e}").ok();
                    return true;
                }
            };
            let manager = match self.cache_manager(&meta.roster_name) {
                Ok(m) => m,
                Err(_) => return true,
            };
            if let Err(e) = manager.write_availability(&cache.name, &cache.latest_version, &rows) {
                writeln!(output, "{pkg_name} availability write failed: {e}").ok();
                return true;
            }
            if rows.iter().any(|r| !r.available) {
                let (roster, name) = split_package_name(pkg_name);
                targets.push(
                    self.meta_dir(&roster)
                        .join("projects")
                        .join(name)
                        .join("package.yml"),
                );
            }
            true
        })?;
        builder::plan(&targets, output)
    }

    // -------------------------------------------------------------- search

    /// Search the central roster
    pub fn search(&self, query: &str, max_possibles: usize) -> Result<SearchResult> {
        let central = self.meta_dir(ROSTER_CENTRAL);
        let searcher = Searcher::new(
            &central,
            self.cache_manager(ROSTER_CENTRAL)?,
            &self.installer,
            self.experimental,
        );
        searcher.search(query, max_possibles)
    }

    // ------------------------------------------------------------- install

    /// Install one package; the outcome carries the read-back install state
    pub fn install(
        &self,
        pkg_name: &str,
        output: &mut dyn Write,
        env: &[String],
    ) -> InstallStatus {
        match self.install_inner(pkg_name, output, env) {
            Ok(()) => match self.installer.installed_version(pkg_name) {
                Ok(inst) => InstallStatus {
                    pkg_name: pkg_name.to_string(),
                    err: None,
                    installed: Some(inst),
                },
                Err(e) => InstallStatus {
                    pkg_name: pkg_name.to_string(),
                    err: Some(e),
                    installed: None,
                },
            },
            Err(e) => InstallStatus {
                pkg_name: pkg_name.to_string(),
                err: Some(e),
                installed: None,
            },
        }
    }

    fn install_inner(&self, pkg_name: &str, output: &mut dyn Write, env: &[String]) -> Result<()> {
        let meta = self
            .load_package_meta(pkg_name)?
            .ok_or_else(|| Error::NotFound(format!("package {pkg_name:?}")))?;
        let cache = self.load_package_cache(pkg_name)?;
        self.installer.install(&meta, &cache, output, env)
    }

    /// Remove one package's active version
    pub fn uninstall(&self, pkg_name: &str, output: &mut dyn Write, env: &[String]) -> Result<()> {
        let meta = self
            .load_package_meta(pkg_name)?
            .ok_or_else(|| Error::NotFound(format!("package {pkg_name:?}")))?;
        self.installer.uninstall(&meta, output, env)
    }

    /// Install each named package, collecting per-package outcomes
    pub fn upgrade(&self, pkg_names: &[String], env: &[String]) -> Vec<InstallStatus> {
        let mut results = Vec::with_capacity(pkg_names.len());
        for name in pkg_names {
            let mut output = Vec::new();
            let status = self.install(name, &mut output, env);
            if let Some(err) = &status.err {
                warn!("upgrade of {name} failed: {err}");
            } else {
                info!("upgraded {name}");
            }
            results.push(status);
        }
        results
    }

    /// The active install state of one package
    pub fn installed_version(&self, pkg_name: &str) -> Result<InstalledVersion> {
        self.installer.installed_version(pkg_name)
    }

    // ------------------------------------------------------------- builder

    /// Audit a descriptor file
    pub fn audit(&self, descriptor: &Path, output: &mut dyn Write) -> Result<()> {
        let meta = parse_package_meta_file(descriptor)?;
        builder::audit(&meta, self.host.as_ref(), &self.config.audit, output)
    }

    /// Expand descriptors into the build matrix line
    pub fn plan(&self, descriptors: &[PathBuf], output: &mut dyn Write) -> Result<()> {
        builder::plan(descriptors, output)
    }

    /// Build a descriptor's release archive; deploys when blob-store
    /// credentials were provided
    pub fn build(
        &self,
        descriptor: &Path,
        version: Option<&str>,
        dest: &Path,
        output: &mut dyn Write,
    ) -> Result<()> {
        let meta = parse_package_meta_file(descriptor)?;
        let store = if self.config.credentials.has_blob_store() {
            Some(builder::HttpBlobStore::new(&self.config.dist.base_url())?)
        } else {
            None
        };
        builder::build(
            &meta,
            version,
            dest,
            self.host.as_ref(),
            store.as_ref().map(|s| s as &dyn builder::BlobStore),
            &self.config.dist,
            output,
        )?;
        Ok(())
    }
}

fn qualified_name(roster: &str, name: &str) -> String {
    if roster == ROSTER_CENTRAL {
        name.to_string()
    } else {
        format!("{roster}/{name}")
    }
}

// src/search.rs

//! Package search
//!
//! An empty query lists what is installed plus the featured packages; a
//! non-empty query tries the exact name first and then ranks every cached
//! package by a Sørensen–Dice coefficient over character bigrams. Results
//! are annotated with install state and the availability row for the
//! runtime platform.

use crate::cache::{CacheManager, PackageCache};
use crate::error::Result;
use crate::install::Installer;
use crate::meta::FeaturedList;
use crate::platform::PlatformTag;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Minimum similarity for a fuzzy candidate
const SCORE_FLOOR: f32 = 0.1;

/// Outcome of one search
#[derive(Debug, Default)]
pub struct SearchResult {
    pub exact_match: Option<PackageCache>,
    pub possibles: Vec<PackageCache>,
    pub installed: Vec<PackageCache>,
    /// Installed or featured names whose cache could not be read
    pub broken: Vec<String>,
}

/// Dice coefficient over character bigrams, counted with multiplicities.
///
/// Symmetric; 1.0 for identical strings, 0.0 when the bigram sets are
/// disjoint or either string is shorter than two characters.
pub fn dice_coefficient(a: &str, b: &str) -> f32 {
    if a == b {
        return 1.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.len() < 2 || b_chars.len() < 2 {
        return 0.0;
    }
    let mut counts: HashMap<(char, char), i32> = HashMap::new();
    for w in a_chars.windows(2) {
        *counts.entry((w[0], w[1])).or_insert(0) += 1;
    }
    let mut overlap = 0i32;
    for w in b_chars.windows(2) {
        if let Some(c) = counts.get_mut(&(w[0], w[1])) {
            if *c > 0 {
                *c -= 1;
                overlap += 1;
            }
        }
    }
    let total = (a_chars.len() - 1) + (b_chars.len() - 1);
    2.0 * overlap as f32 / total as f32
}

struct Candidate {
    score: f32,
    cache: PackageCache,
}

/// Search over one roster's caches and install tree
pub struct Searcher<'a> {
    meta_roster_dir: &'a Path,
    caches: &'a CacheManager,
    installer: &'a Installer,
    experimental: bool,
}

impl<'a> Searcher<'a> {
    pub fn new(
        meta_roster_dir: &'a Path,
        caches: &'a CacheManager,
        installer: &'a Installer,
        experimental: bool,
    ) -> Self {
        Self {
            meta_roster_dir,
            caches,
            installer,
            experimental,
        }
    }

    /// Run a search; `max_possibles` clips the fuzzy (or featured) list
    pub fn search(&self, query: &str, max_possibles: usize) -> Result<SearchResult> {
        let runtime = PlatformTag::runtime();
        let mut result = if query.is_empty() {
            self.list_installed_and_featured(max_possibles, &runtime)?
        } else {
            self.search_by_name(query, max_possibles, &runtime)?
        };

        let exact = result.exact_match.iter_mut();
        let possibles = result.possibles.iter_mut();
        let installed = result.installed.iter_mut();
        for cache in exact.chain(possibles).chain(installed) {
            self.annotate_installed(cache);
            self.annotate_availability(cache, &runtime);
        }
        Ok(result)
    }

    fn list_installed_and_featured(
        &self,
        max_possibles: usize,
        runtime: &PlatformTag,
    ) -> Result<SearchResult> {
        let mut result = SearchResult::default();
        let installed = self.installer.installed_packages()?;
        for name in &installed {
            match self.caches.read_cache(name) {
                Ok(cache) if cache.supports(&runtime.os, &runtime.arch) => {
                    result.installed.push(cache)
                }
                Ok(_) => {}
                Err(_) => result.broken.push(name.clone()),
            }
        }

        let featured = self.featured_list()?;
        for name in &featured.featured {
            if installed.contains(name) {
                continue;
            }
            if max_possibles > 0 && result.possibles.len() >= max_possibles {
                break;
            }
            match self.caches.read_cache(name) {
                Ok(cache) if cache.supports(&runtime.os, &runtime.arch) => {
                    result.possibles.push(cache)
                }
                Ok(_) => {}
                Err(_) => result.broken.push(name.clone()),
            }
        }
        Ok(result)
    }

    fn search_by_name(
        &self,
        query: &str,
        max_possibles: usize,
        runtime: &PlatformTag,
    ) -> Result<SearchResult> {
        let mut result = SearchResult::default();
        if self.has_descriptor(query) {
            let cache = self.caches.read_cache(query)?;
            if cache.supports(&runtime.os, &runtime.arch) {
                result.exact_match = Some(cache);
            }
        }
        if max_possibles == 0 {
            return Ok(result);
        }

        let needle = query.to_lowercase();
        let mut candidates: Vec<Candidate> = Vec::new();
        self.caches.walk_entries(|name| {
            if let Some(exact) = &result.exact_match {
                if exact.name == name {
                    return true;
                }
            }
            let Ok(cache) = self.caches.read_cache(name) else {
                return true;
            };
            if !self.experimental && cache.latest_version.contains("alpha") {
                return true;
            }
            let score = dice_coefficient(&name.to_lowercase(), &needle);
            if score > SCORE_FLOOR && cache.supports(&runtime.os, &runtime.arch) {
                debug!("candidate {name} score {score:.3}");
                candidates.push(Candidate { score, cache });
            }
            true
        })?;

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(max_possibles);
        result.possibles = candidates.into_iter().map(|c| c.cache).collect();
        Ok(result)
    }

    fn has_descriptor(&self, name: &str) -> bool {
        let dir = self.meta_roster_dir.join("projects").join(name);
        dir.join("package.yml").is_file() || dir.join("package.yaml").is_file()
    }

    fn featured_list(&self) -> Result<FeaturedList> {
        let path = self.meta_roster_dir.join("projects.yml");
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    fn annotate_installed(&self, cache: &mut PackageCache) {
        if let Ok(inst) = self.installer.installed_version(&cache.name) {
            cache.installed_version = inst.version;
            cache.installed_path = inst.path.to_string_lossy().to_string();
            cache.has_backend = inst.has_backend;
            cache.has_frontend = inst.has_frontend;
            cache.work_in_progress = inst.work_in_progress;
        }
    }

    fn annotate_availability(&self, cache: &mut PackageCache, runtime: &PlatformTag) {
        let Ok(rows) = self
            .caches
            .read_availability(&cache.name, &cache.latest_version)
        else {
            return;
        };
        for row in rows {
            let agnostic = row.platform_os.is_empty() && row.platform_arch.is_empty();
            if agnostic || (row.platform_os == runtime.os && row.platform_arch == runtime.arch) {
                cache.latest_release_size = row.content_length;
                break;
            }
        }
    }
}

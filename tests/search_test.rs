// tests/search_test.rs

//! Search scenarios: exact match, fuzzy ranking, featured listing and
//! install-state annotation.

mod common;

use common::{cache_record, seed_cache, seed_package};
use neopkg::{link, Availability, CacheManager, Roster, RosterOptions};
use std::path::Path;

const DESCRIPTOR: &str = r#"
distributable:
  github: o/pkgA
description: test package
build:
  scripts:
    - run: make
"#;

fn open_roster(base: &Path, experimental: bool) -> Roster {
    Roster::new(
        base,
        RosterOptions {
            experimental,
            ..Default::default()
        },
    )
    .expect("open roster")
}

fn write_featured(base: &Path, names: &[&str]) {
    let mut content = String::from("featured:\n");
    for name in names {
        content.push_str(&format!("  - {name}\n"));
    }
    std::fs::write(base.join("meta/central/projects.yml"), content).unwrap();
}

/// Fake an installed package without running a real install
fn fake_install(base: &Path, name: &str, version: &str) {
    let pkg_dir = base.join("dist").join(name);
    let ver_dir = pkg_dir.join(version);
    std::fs::create_dir_all(&ver_dir).unwrap();
    link::symlink(&ver_dir, &pkg_dir.join("current")).unwrap();
}

#[test]
fn exact_name_wins() {
    let tmp = tempfile::tempdir().unwrap();
    let roster = open_roster(tmp.path(), false);
    seed_package(tmp.path(), "pkgA", DESCRIPTOR, &cache_record("pkgA", "o", "1.2.3", &[]));
    seed_cache(tmp.path(), &cache_record("pkg-b", "o", "1.0.0", &[]));
    seed_cache(tmp.path(), &cache_record("zeta", "o", "1.0.0", &[]));

    let result = roster.search("pkgA", 5).unwrap();
    assert_eq!(result.exact_match.unwrap().name, "pkgA");
}

#[test]
fn fuzzy_candidates_rank_by_bigram_overlap() {
    let tmp = tempfile::tempdir().unwrap();
    let roster = open_roster(tmp.path(), false);
    seed_cache(tmp.path(), &cache_record("pkgAA", "o", "1.0.0", &[]));
    seed_cache(tmp.path(), &cache_record("pkg-abc", "o", "1.0.0", &[]));
    seed_cache(tmp.path(), &cache_record("zeta", "o", "1.0.0", &[]));

    let result = roster.search("pkgA", 3).unwrap();
    assert!(result.exact_match.is_none());
    let names: Vec<&str> = result.possibles.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["pkgAA", "pkg-abc"]);
}

#[test]
fn max_possibles_clips_the_list() {
    let tmp = tempfile::tempdir().unwrap();
    let roster = open_roster(tmp.path(), false);
    seed_cache(tmp.path(), &cache_record("pkgAA", "o", "1.0.0", &[]));
    seed_cache(tmp.path(), &cache_record("pkgAB", "o", "1.0.0", &[]));
    seed_cache(tmp.path(), &cache_record("pkgAC", "o", "1.0.0", &[]));

    let result = roster.search("pkgA", 2).unwrap();
    assert_eq!(result.possibles.len(), 2);
}

#[test]
fn alpha_versions_hide_unless_experimental() {
    let tmp = tempfile::tempdir().unwrap();
    seed_cache(tmp.path(), &cache_record("pkgAA", "o", "1.0.0-alpha.2", &[]));
    seed_cache(tmp.path(), &cache_record("pkgAB", "o", "1.0.0", &[]));

    let roster = open_roster(tmp.path(), false);
    let result = roster.search("pkgA", 5).unwrap();
    let names: Vec<&str> = result.possibles.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["pkgAB"]);

    let roster = open_roster(tmp.path(), true);
    let result = roster.search("pkgA", 5).unwrap();
    assert_eq!(result.possibles.len(), 2);
}

#[test]
fn platform_mismatch_excludes_exact_match() {
    let tmp = tempfile::tempdir().unwrap();
    let roster = open_roster(tmp.path(), false);
    // a platform nothing runs on
    seed_package(
        tmp.path(),
        "pkgA",
        DESCRIPTOR,
        &cache_record("pkgA", "o", "1.2.3", &["windows/arm"]),
    );

    let result = roster.search("pkgA", 0).unwrap();
    assert!(result.exact_match.is_none());
}

#[test]
fn empty_query_lists_installed_then_featured() {
    let tmp = tempfile::tempdir().unwrap();
    let roster = open_roster(tmp.path(), false);
    seed_package(tmp.path(), "pkgA", DESCRIPTOR, &cache_record("pkgA", "o", "1.2.3", &[]));
    seed_cache(tmp.path(), &cache_record("featured-one", "o", "1.0.0", &[]));
    seed_cache(tmp.path(), &cache_record("featured-two", "o", "1.0.0", &[]));
    write_featured(tmp.path(), &["pkgA", "featured-one", "featured-two"]);
    fake_install(tmp.path(), "pkgA", "1.2.3");

    let result = roster.search("", 5).unwrap();
    let installed: Vec<&str> = result.installed.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(installed, vec!["pkgA"]);
    let possibles: Vec<&str> = result.possibles.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(possibles, vec!["featured-one", "featured-two"]);
    assert_eq!(result.installed[0].installed_version, "1.2.3");
}

#[test]
fn unreadable_cache_reports_broken() {
    let tmp = tempfile::tempdir().unwrap();
    let roster = open_roster(tmp.path(), false);
    write_featured(tmp.path(), &["mangled"]);
    let cache_dir = tmp.path().join("meta/central/.cache/mangled");
    std::fs::create_dir_all(&cache_dir).unwrap();
    std::fs::write(cache_dir.join("cache.yml"), "{not yaml: [").unwrap();

    let result = roster.search("", 5).unwrap();
    assert_eq!(result.broken, vec!["mangled"]);
    assert!(result.possibles.is_empty());
}

#[test]
fn results_carry_availability_size() {
    let tmp = tempfile::tempdir().unwrap();
    let roster = open_roster(tmp.path(), false);
    seed_package(tmp.path(), "pkgA", DESCRIPTOR, &cache_record("pkgA", "o", "1.2.3", &[]));
    CacheManager::new(tmp.path().join("meta/central/.cache"))
        .write_availability(
            "pkgA",
            "1.2.3",
            &[Availability {
                name: "pkgA".into(),
                version: "1.2.3".into(),
                dist_url: "https://dist/pkgA-1.2.3.tar.gz".into(),
                status_code: 200,
                available: true,
                content_length: 2048,
                ..Default::default()
            }],
        )
        .unwrap();

    let result = roster.search("pkgA", 0).unwrap();
    assert_eq!(result.exact_match.unwrap().latest_release_size, 2048);
}

#[test]
fn work_in_progress_is_visible() {
    let tmp = tempfile::tempdir().unwrap();
    let roster = open_roster(tmp.path(), false);
    seed_package(tmp.path(), "pkgA", DESCRIPTOR, &cache_record("pkgA", "o", "1.2.3", &[]));
    fake_install(tmp.path(), "pkgA", "1.2.3");
    std::fs::write(tmp.path().join("dist/pkgA/wip"), "https://dist/pkgA.tar.gz").unwrap();

    let result = roster.search("pkgA", 0).unwrap();
    assert!(result.exact_match.unwrap().work_in_progress);
}

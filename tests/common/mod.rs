// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use neopkg::{CacheManager, PackageCache, RepoInfo};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;

/// One canned HTTP response
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }
}

/// Minimal loopback HTTP server for distribution GET/HEAD traffic.
///
/// Serves fixed responses by path; HEAD requests get the headers (with
/// Content-Length) and no body. The accept thread is detached and dies
/// with the test process.
pub struct MockDistServer {
    pub base_url: String,
}

impl MockDistServer {
    pub fn start(routes: HashMap<String, Response>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let routes = Arc::new(routes);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let routes = Arc::clone(&routes);
                thread::spawn(move || serve_one(stream, &routes));
            }
        });
        Self {
            base_url: format!("http://{addr}"),
        }
    }
}

fn serve_one(mut stream: TcpStream, routes: &HashMap<String, Response>) {
    let Ok(peer) = stream.try_clone() else { return };
    let mut reader = BufReader::new(peer);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("").to_string();
    loop {
        let mut header = String::new();
        match reader.read_line(&mut header) {
            Ok(0) | Err(_) => break,
            Ok(_) if header == "\r\n" || header == "\n" => break,
            Ok(_) => {}
        }
    }

    let not_found = Response {
        status: 404,
        body: b"not found".to_vec(),
    };
    let response = routes.get(&path).unwrap_or(&not_found);
    let reason = if response.status == 200 { "OK" } else { "Error" };
    let head = format!(
        "HTTP/1.1 {} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    if method != "HEAD" {
        let _ = stream.write_all(&response.body);
    }
    let _ = stream.flush();
}

/// A gzip-framed tar stream holding the given `(name, content)` files
pub fn targz_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_mtime(1_700_000_000);
        builder
            .append_data(&mut header, *name, *content)
            .expect("append tar entry");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}

/// A cache record for the common test package shape
pub fn cache_record(name: &str, org: &str, version: &str, platforms: &[&str]) -> PackageCache {
    PackageCache {
        name: name.to_string(),
        github: Some(RepoInfo {
            organization: org.to_string(),
            repo: name.to_string(),
            full_name: format!("{org}/{name}"),
            default_branch: "main".to_string(),
            ..Default::default()
        }),
        latest_version: version.to_string(),
        latest_release: format!("v{version}"),
        latest_release_tag: format!("v{version}"),
        platforms: platforms.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

/// Seed one package (descriptor + cache record) into a roster base dir
pub fn seed_package(base: &Path, name: &str, descriptor_yaml: &str, cache: &PackageCache) {
    let project_dir = base.join("meta/central/projects").join(name);
    std::fs::create_dir_all(&project_dir).expect("create project dir");
    std::fs::write(project_dir.join("package.yml"), descriptor_yaml).expect("write descriptor");
    CacheManager::new(base.join("meta/central/.cache"))
        .write_cache(cache)
        .expect("write cache");
}

/// Seed only a cache record, no descriptor
pub fn seed_cache(base: &Path, cache: &PackageCache) {
    CacheManager::new(base.join("meta/central/.cache"))
        .write_cache(cache)
        .expect("write cache");
}

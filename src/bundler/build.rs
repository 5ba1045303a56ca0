//! One build pass
//!
//! Runs synchronously on a blocking thread. Entries are rewritten first, then
//! their local references are followed, then only changed outputs are written.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use walkdir::WalkDir;

use super::assets::{css_references, process_html, resolve_reference};
use super::manifest::{fingerprint, key_for, Manifest};
use super::BundleReport;
use crate::config::BundleConfig;
use crate::error::BuildError;

/// Result of a successful build
#[derive(Debug)]
pub struct BuildOutput {
    pub manifest: Manifest,
    pub report: BundleReport,
}

/// Build everything under `config.source_dir` into `config.out_dir`.
///
/// `previous` is the manifest of the last successful build; it decides which
/// writes can be skipped and which old outputs must be removed.
pub fn run(config: &BundleConfig, previous: &Manifest) -> Result<BuildOutput, BuildError> {
    let started = Instant::now();
    if !config.source_dir.is_dir() {
        return Err(BuildError::SourceMissing(config.source_dir.clone()));
    }

    let entries = discover_entries(config)?;
    let public_base = config.public_url_base();

    // Output-relative path -> bytes to write
    let mut outputs: BTreeMap<PathBuf, Vec<u8>> = BTreeMap::new();
    let mut pending: Vec<(PathBuf, String)> = Vec::new();

    for relative in &entries {
        let path = config.source_dir.join(relative);
        let html = fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
        let processed = process_html(&html, &public_base)
            .map_err(|message| BuildError::Html { path, message })?;
        pending.extend(
            processed
                .references
                .into_iter()
                .map(|reference| (relative.clone(), reference)),
        );
        outputs.insert(relative.clone(), processed.html.into_bytes());
    }

    let entry_set: HashSet<&PathBuf> = entries.iter().collect();
    let mut assets = 0;
    while let Some((from, reference)) = pending.pop() {
        let Some(asset) = resolve_reference(&from, &reference) else {
            continue;
        };
        if entry_set.contains(&asset) || outputs.contains_key(&asset) {
            continue;
        }
        let path = config.source_dir.join(&asset);
        if is_excluded(config, &path) || !path.is_file() {
            continue;
        }

        let bytes = fs::read(&path).map_err(|e| BuildError::io(&path, e))?;
        if is_stylesheet(&asset) {
            if let Ok(css) = std::str::from_utf8(&bytes) {
                pending.extend(
                    css_references(css)
                        .into_iter()
                        .map(|reference| (asset.clone(), reference)),
                );
            }
        }
        outputs.insert(asset, bytes);
        assets += 1;
    }

    let mut manifest = Manifest::default();
    let mut report = BundleReport {
        entries: entries.len(),
        assets,
        ..BundleReport::default()
    };

    for (relative, bytes) in &outputs {
        let key = key_for(relative);
        let hash = fingerprint(bytes);
        let target = config.out_dir.join(relative);

        if config.cache && previous.fingerprint_of(&key) == Some(hash.as_str()) && target.is_file()
        {
            report.unchanged += 1;
        } else {
            write_output(&target, bytes)?;
            report.written += 1;
        }
        manifest.outputs.insert(key, hash);
    }

    for key in previous.outputs.keys() {
        if manifest.outputs.contains_key(key) || !is_safe_key(key) {
            continue;
        }
        let target = config.out_dir.join(key);
        match fs::remove_file(&target) {
            Ok(()) => report.removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(BuildError::io(target, e)),
        }
    }

    if config.cache {
        manifest.save(&config.manifest_path())?;
    }

    report.elapsed = started.elapsed();
    Ok(BuildOutput { manifest, report })
}

/// Entry documents relative to the source root, in path order
fn discover_entries(config: &BundleConfig) -> Result<Vec<PathBuf>, BuildError> {
    let mut entries = Vec::new();
    let walker = WalkDir::new(&config.source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_excluded(config, entry.path()));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map_or_else(|| config.source_dir.clone(), Path::to_path_buf);
            BuildError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() || !is_entry(config, entry.path()) {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(&config.source_dir) {
            entries.push(relative.to_path_buf());
        }
    }
    Ok(entries)
}

fn is_entry(config: &BundleConfig, path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    config
        .entry_extensions
        .iter()
        .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

/// Output and cache directories may live inside the source directory
fn is_excluded(config: &BundleConfig, path: &Path) -> bool {
    path.starts_with(&config.out_dir) || path.starts_with(&config.cache_dir)
}

fn is_stylesheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("css"))
}

/// Manifest keys come from disk; never let one point outside the output root
fn is_safe_key(key: &str) -> bool {
    !key.is_empty() && key.split('/').all(|s| !s.is_empty() && s != "." && s != "..")
}

fn write_output(target: &Path, bytes: &[u8]) -> Result<(), BuildError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    fs::write(target, bytes).map_err(|e| BuildError::io(target, e))
}

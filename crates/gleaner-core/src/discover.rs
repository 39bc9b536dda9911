//! Source file discovery.
//!
//! Enumerates `<root>/<source-id>/sessions/*.jsonl`, applying the
//! configured exclusion rules. The listing is re-queried fresh on every
//! pass; nothing is cached across runs. A missing or unreadable root
//! yields an empty listing, never an error — discovery is a collaborator
//! of the core, not part of its correctness contract.

use crate::config::DiscoveryConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// List `(source_id, path)` pairs for files eligible for tailing,
/// ordered by source id and then file name.
///
/// Skipped: excluded source ids; names not ending in `.jsonl`; reset
/// snapshots (`.reset.` in the name — historical, we focus on live
/// tails); lock files; tombstoned files (`.deleted.`); non-files.
#[must_use]
pub fn discover_sources(root: &Path, config: &DiscoveryConfig) -> Vec<(String, PathBuf)> {
    let mut results = Vec::new();

    for source_dir in sorted_entries(root) {
        if !source_dir.is_dir() {
            continue;
        }
        let Some(source_id) = file_name(&source_dir) else {
            continue;
        };
        if config.excluded_sources.iter().any(|s| s == &source_id) {
            tracing::debug!(source = %source_id, "source excluded from discovery");
            continue;
        }

        for file in sorted_entries(&source_dir.join("sessions")) {
            if !file.is_file() {
                continue;
            }
            let Some(name) = file_name(&file) else {
                continue;
            };
            if !name.ends_with(".jsonl") {
                continue;
            }
            if name.contains(".reset.") || name.contains(".deleted.") || name.ends_with(".lock") {
                continue;
            }
            results.push((source_id.clone(), file));
        }
    }

    results
}

/// Directory entries sorted by path; empty when the directory is
/// missing or unreadable.
fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    paths.sort();
    paths
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_string())
}

//! Immutable batch artifacts.
//!
//! A batch is one unit of handoff to the downstream consumer: the
//! extracted records grouped by source, plus the offset pair each
//! touched file was derived from. The coordinator owns the artifact
//! until a commit transfers the obligation downstream; after commit the
//! file is stale data and its deletion is best-effort.

use crate::cursor::FileIdentity;
use crate::decode::Record;
use crate::error::{GleanError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk format version of batch artifacts.
pub const BATCH_FORMAT_VERSION: u32 = 1;

/// Records extracted for one source within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecords {
    pub source_id: String,
    pub records: Vec<Record>,
}

/// Offset provenance for one file that contributed to a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchedFile {
    pub path: String,
    pub source_id: String,
    pub identity: FileIdentity,
    /// Offset already acknowledged before this extraction.
    pub committed: u64,
    /// Offset this extraction reached; becomes `committed` on commit.
    pub pending: u64,
    /// File size observed at extraction time.
    pub size: u64,
}

/// One immutable batch artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub version: u32,
    pub created_at_ms: i64,
    pub sources: Vec<SourceRecords>,
    pub touched_files: Vec<TouchedFile>,
}

/// Path of the artifact for `batch_id` inside `batches_dir`.
#[must_use]
pub fn artifact_path(batches_dir: &Path, batch_id: &str) -> PathBuf {
    batches_dir.join(format!("batch-{batch_id}.json"))
}

impl Batch {
    /// Write this batch as `batch-<id>.json` under `batches_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`GleanError::BatchWrite`] if the directory or file
    /// cannot be created, [`GleanError::Encode`] on serialization
    /// failure.
    pub fn write(&self, batches_dir: &Path, batch_id: &str) -> Result<PathBuf> {
        fs::create_dir_all(batches_dir).map_err(|source| GleanError::BatchWrite {
            path: batches_dir.display().to_string(),
            source,
        })?;

        let path = artifact_path(batches_dir, batch_id);
        let body = serde_json::to_vec_pretty(self)?;
        fs::write(&path, body).map_err(|source| GleanError::BatchWrite {
            path: path.display().to_string(),
            source,
        })?;

        Ok(path)
    }

    /// Load a batch artifact back from disk.
    ///
    /// # Errors
    ///
    /// Returns [`GleanError::BatchWrite`] if the file cannot be read and
    /// [`GleanError::BatchCorrupt`] if it does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| GleanError::BatchWrite {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| GleanError::BatchCorrupt {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Delete a committed batch artifact. Failure is ignored: once the
/// cursor store has been advanced the artifact is stale data, safe to
/// garbage-collect later.
pub fn remove_artifact(batches_dir: &Path, batch_id: &str) {
    let path = artifact_path(batches_dir, batch_id);
    if let Err(err) = fs::remove_file(&path) {
        tracing::debug!(path = %path.display(), %err, "leaving stale batch artifact behind");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::FileIdentity;

    fn sample() -> Batch {
        Batch {
            version: BATCH_FORMAT_VERSION,
            created_at_ms: 1_756_400_000_000,
            sources: vec![SourceRecords {
                source_id: "agent-a".to_string(),
                records: vec![Record {
                    ts: Some("2026-08-29T10:00:00Z".to_string()),
                    role: "user".to_string(),
                    text: "hello".to_string(),
                }],
            }],
            touched_files: vec![TouchedFile {
                path: "/tmp/a.jsonl".to_string(),
                source_id: "agent-a".to_string(),
                identity: FileIdentity { dev: 1, ino: 2 },
                committed: 100,
                pending: 150,
                size: 150,
            }],
        }
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = sample().write(dir.path(), "20260829-120000").expect("write");
        assert!(path.ends_with("batch-20260829-120000.json"));

        let loaded = Batch::load(&path).expect("load");
        assert_eq!(loaded.version, BATCH_FORMAT_VERSION);
        assert_eq!(loaded.sources.len(), 1);
        assert_eq!(loaded.sources[0].records[0].text, "hello");
        assert_eq!(loaded.touched_files[0].pending, 150);
    }

    #[test]
    fn artifact_layout_uses_camel_case_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = sample().write(dir.path(), "id").expect("write");
        let raw = fs::read_to_string(&path).expect("read back");
        assert!(raw.contains("\"createdAtMs\""));
        assert!(raw.contains("\"touchedFiles\""));
        assert!(raw.contains("\"sourceId\""));
    }

    #[test]
    fn remove_missing_artifact_is_silent() {
        let dir = tempfile::tempdir().expect("tempdir");
        remove_artifact(dir.path(), "never-written");
    }

    #[test]
    fn remove_deletes_the_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = sample().write(dir.path(), "x").expect("write");
        assert!(path.exists());
        remove_artifact(dir.path(), "x");
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_artifact_is_a_typed_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = artifact_path(dir.path(), "bad");
        fs::write(&path, b"{").expect("write garbage");
        let err = Batch::load(&path).expect_err("must fail");
        assert!(matches!(err, GleanError::BatchCorrupt { .. }));
    }
}

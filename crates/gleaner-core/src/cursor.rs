//! Durable per-file offset cursors.
//!
//! The cursor store is the single source of truth for how far every
//! watched file has been consumed. It is passed by value into each
//! operation and rewritten wholesale on every mutation: serialize to a
//! sibling `.tmp` file, then `rename` into place, so a crash mid-write
//! never leaves a half-written store observable. No cross-process
//! locking is provided; callers serialize invocations.

use crate::error::{GleanError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, Metadata};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// On-disk format version of the cursor store document.
pub const CURSOR_FORMAT_VERSION: u32 = 1;

/// Stable identity of an underlying file, independent of its path.
///
/// A path whose identity changes has been rotated: it is a different
/// file that happens to live under the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIdentity {
    pub dev: u64,
    pub ino: u64,
}

impl FileIdentity {
    /// Derive the identity from file metadata.
    #[must_use]
    pub fn of(meta: &Metadata) -> Self {
        Self {
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }
}

/// Tracked state for one watched file.
///
/// Invariants: `committed <= pending` whenever `pending` is set;
/// `pending <= last_size`; `pending` and `pending_batch` are set and
/// cleared together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCursor {
    /// Source this file belongs to; used for batch grouping.
    pub source_id: String,
    /// Identity of the file the offsets below refer to.
    pub identity: FileIdentity,
    /// Byte offset up to which records have been durably handed off.
    pub committed: u64,
    /// Offset of an extraction materialized into a batch but not yet
    /// acknowledged. `None` when no batch is outstanding for this file.
    #[serde(default)]
    pub pending: Option<u64>,
    /// Id of the batch artifact holding this file's pending extraction.
    #[serde(default)]
    pub pending_batch: Option<String>,
    /// Most recent observed file size; diagnostics only.
    pub last_size: u64,
    pub updated_at_ms: i64,
}

impl FileCursor {
    /// A cursor with no outstanding extraction, committed at `offset`.
    #[must_use]
    pub fn settled(source_id: &str, identity: FileIdentity, offset: u64, size: u64) -> Self {
        Self {
            source_id: source_id.to_string(),
            identity,
            committed: offset,
            pending: None,
            pending_batch: None,
            last_size: size,
            updated_at_ms: now_ms(),
        }
    }
}

/// The full collection of file cursors, persisted as one JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorStore {
    pub version: u32,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    #[serde(default)]
    pub files: BTreeMap<String, FileCursor>,
}

impl Default for CursorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CursorStore {
    /// A fresh, empty store.
    #[must_use]
    pub fn new() -> Self {
        let now = now_ms();
        Self {
            version: CURSOR_FORMAT_VERSION,
            created_at_ms: now,
            updated_at_ms: now,
            files: BTreeMap::new(),
        }
    }

    /// Load the store from `path`, or return a fresh one if no store
    /// exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`GleanError::StoreRead`] if the file exists but cannot
    /// be read, and [`GleanError::StoreCorrupt`] if it does not parse —
    /// both fatal, since continuing with a guessed store risks double
    /// delivery.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let bytes = fs::read(path).map_err(|source| GleanError::StoreRead {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_slice(&bytes).map_err(|source| GleanError::StoreCorrupt {
            path: path.display().to_string(),
            source,
        })
    }

    /// Atomically replace the store at `path` with this one.
    ///
    /// Refreshes `updated_at_ms`, writes to `<path>.tmp`, then renames
    /// over the target.
    ///
    /// # Errors
    ///
    /// Returns [`GleanError::StorePersist`] if the document cannot be
    /// written or moved into place.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.updated_at_ms = now_ms();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| GleanError::StorePersist {
                path: path.display().to_string(),
                source,
            })?;
        }

        let body = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|source| GleanError::StorePersist {
            path: tmp.display().to_string(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| GleanError::StorePersist {
            path: path.display().to_string(),
            source,
        })?;

        Ok(())
    }

    /// Ids of all outstanding pending batches, sorted and deduplicated.
    ///
    /// A non-empty result means a previous extraction has not been
    /// committed yet; extraction must not read new data.
    #[must_use]
    pub fn pending_batch_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .files
            .values()
            .filter_map(|c| c.pending_batch.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Current wall-clock time in milliseconds since the epoch.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

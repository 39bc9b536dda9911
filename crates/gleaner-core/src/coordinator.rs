//! The extraction state machine.
//!
//! One coordinator drives the three operations of the command surface:
//! `initialize` (seed cursors at end-of-stream), `extract` (one pass
//! over all watched files, producing at most one batch artifact), and
//! `commit` (acknowledge a batch and advance committed offsets).
//!
//! Extraction is two-phase: a produced batch leaves every touched
//! cursor's `committed` untouched and records the reached offset as
//! `pending`. Only an explicit commit advances `committed`, so a crash
//! or an unacknowledged batch can never lose or double-deliver bytes.
//! A pending-batch gate enforces at most one outstanding batch
//! globally: the downstream consumer always faces a single backlog.

use crate::batch::{Batch, BATCH_FORMAT_VERSION, SourceRecords, TouchedFile, remove_artifact};
use crate::config::GleanConfig;
use crate::cursor::{CursorStore, FileCursor, FileIdentity, now_ms};
use crate::decode::{Record, decode_line};
use crate::discover::discover_sources;
use crate::error::Result;
use crate::rotation::start_offset;
use crate::tail::read_tail;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Outcome of one extraction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// One or more batches are already outstanding; no data was read.
    Pending { batch_ids: Vec<String> },
    /// Nothing usable was staged; offset-only advances were persisted.
    Noop,
    /// A new batch artifact was materialized and is awaiting commit.
    Created {
        batch_id: String,
        batch_path: PathBuf,
        sources: usize,
        records: usize,
    },
}

/// Result of one extraction pass, including isolated per-file errors.
#[derive(Debug)]
pub struct ExtractReport {
    pub outcome: ExtractOutcome,
    /// Per-file failures that did not abort the pass.
    pub errors: Vec<String>,
}

/// Result of seeding the cursor store.
#[derive(Debug)]
pub struct InitReport {
    pub cursor_path: PathBuf,
    pub tracked_files: usize,
}

/// Result of committing a batch.
#[derive(Debug)]
pub struct CommitReport {
    pub batch_id: String,
    pub committed_files: usize,
}

/// Orchestrates extraction passes and commits over one state directory.
#[derive(Debug)]
pub struct Coordinator {
    state_dir: PathBuf,
    sources_dir: PathBuf,
    config: GleanConfig,
}

impl Coordinator {
    #[must_use]
    pub fn new(state_dir: PathBuf, sources_dir: PathBuf, config: GleanConfig) -> Self {
        Self {
            state_dir,
            sources_dir,
            config,
        }
    }

    /// Path of the persisted cursor store.
    #[must_use]
    pub fn cursor_path(&self) -> PathBuf {
        self.state_dir.join("cursor.json")
    }

    /// Directory holding batch artifacts awaiting commit.
    #[must_use]
    pub fn batches_dir(&self) -> PathBuf {
        self.state_dir.join("batches")
    }

    /// Seed the cursor store at current end-of-stream for every
    /// discovered file, so the historical backlog is never ingested.
    ///
    /// Idempotent: re-running refreshes identity and size for files
    /// already tracked. Files that cannot be stat-ed are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor store cannot be loaded or
    /// persisted.
    pub fn initialize(&self) -> Result<InitReport> {
        let cursor_path = self.cursor_path();
        let mut store = CursorStore::load(&cursor_path)?;

        for (source_id, path) in discover_sources(&self.sources_dir, &self.config.discovery) {
            let meta = match fs::metadata(&path) {
                Ok(meta) => meta,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "skipping unreadable file");
                    continue;
                }
            };
            let size = meta.len();
            store.files.insert(
                path.to_string_lossy().to_string(),
                FileCursor::settled(&source_id, FileIdentity::of(&meta), size, size),
            );
        }

        let tracked_files = store.files.len();
        store.save(&cursor_path)?;
        tracing::info!(tracked_files, "cursor store initialized at end-of-stream");

        Ok(InitReport {
            cursor_path,
            tracked_files,
        })
    }

    /// Run one extraction pass across all watched files.
    ///
    /// # Errors
    ///
    /// Returns an error only for store-level failures (unreadable or
    /// unpersistable cursor store, unwritable batch artifact). Per-file
    /// read errors are isolated into the report.
    pub fn extract(&self) -> Result<ExtractReport> {
        let cursor_path = self.cursor_path();
        let mut store = CursorStore::load(&cursor_path)?;

        // Exclusivity gate: an uncommitted batch means this pass reads
        // nothing and simply points the caller back at it.
        let outstanding = store.pending_batch_ids();
        if !outstanding.is_empty() {
            tracing::info!(batches = ?outstanding, "pending batch outstanding; reading nothing");
            return Ok(ExtractReport {
                outcome: ExtractOutcome::Pending {
                    batch_ids: outstanding,
                },
                errors: Vec::new(),
            });
        }

        let mut errors = Vec::new();
        let mut per_source: BTreeMap<String, Vec<Record>> = BTreeMap::new();
        let mut staged: Vec<TouchedFile> = Vec::new();

        for (source_id, path) in discover_sources(&self.sources_dir, &self.config.discovery) {
            let key = path.to_string_lossy().to_string();

            let meta = match fs::metadata(&path) {
                Ok(meta) => meta,
                Err(err) => {
                    errors.push(format!("failed to stat {key}: {err}"));
                    continue;
                }
            };
            let identity = FileIdentity::of(&meta);
            let size = meta.len();
            let start = start_offset(store.files.get(&key), identity, size);

            if size <= start {
                // Nothing new; refresh identity and observed size.
                store
                    .files
                    .insert(key, FileCursor::settled(&source_id, identity, start, size));
                continue;
            }

            let (lines, end) = match read_tail(&path, start, self.config.limits.max_bytes_per_file)
            {
                Ok(result) => result,
                Err(err) => {
                    errors.push(format!("failed to read {key}: {err}"));
                    continue;
                }
            };

            if lines.is_empty() {
                if end > start {
                    // Only blank lines in the window: consume the bytes
                    // so they are never rescanned.
                    store
                        .files
                        .insert(key, FileCursor::settled(&source_id, identity, end, size));
                } else {
                    // A record larger than the read ceiling: stall, do
                    // not advance, retry once the writer flushes the
                    // newline.
                    tracing::warn!(path = %key, start, "no complete record in read window; stalling");
                }
                continue;
            }

            let extracted: Vec<Record> = lines
                .iter()
                .filter_map(|line| decode_line(line, &self.config.filter))
                .collect();

            if extracted.is_empty() {
                // Pure noise: advance committed directly so the same
                // bytes are never rescanned. Nothing was delivered, so
                // no pending state is created.
                store
                    .files
                    .insert(key, FileCursor::settled(&source_id, identity, end, size));
                continue;
            }

            per_source
                .entry(source_id.clone())
                .or_default()
                .extend(extracted);
            staged.push(TouchedFile {
                path: key,
                source_id,
                identity,
                committed: start,
                pending: end,
                size,
            });
        }

        // Cap records per source to keep batch size stable; only the
        // most recent survive in this batch.
        let cap = self.config.limits.max_records_per_source;
        for records in per_source.values_mut() {
            if records.len() > cap {
                records.drain(..records.len() - cap);
            }
        }

        if per_source.is_empty() {
            store.save(&cursor_path)?;
            tracing::debug!("extraction pass produced no records");
            return Ok(ExtractReport {
                outcome: ExtractOutcome::Noop,
                errors,
            });
        }

        let batch_id = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        let records = per_source.values().map(Vec::len).sum();
        let sources = per_source.len();

        let batch = Batch {
            version: BATCH_FORMAT_VERSION,
            created_at_ms: now_ms(),
            sources: per_source
                .into_iter()
                .map(|(source_id, records)| SourceRecords { source_id, records })
                .collect(),
            touched_files: staged.clone(),
        };
        let batch_path = batch.write(&self.batches_dir(), &batch_id)?;

        // Mark touched cursors pending only after the artifact exists;
        // committed stays put until the batch is acknowledged.
        let now = now_ms();
        for tf in staged {
            store.files.insert(
                tf.path.clone(),
                FileCursor {
                    source_id: tf.source_id,
                    identity: tf.identity,
                    committed: tf.committed,
                    pending: Some(tf.pending),
                    pending_batch: Some(batch_id.clone()),
                    last_size: tf.size,
                    updated_at_ms: now,
                },
            );
        }
        store.save(&cursor_path)?;

        tracing::info!(batch_id, sources, records, "batch created");
        Ok(ExtractReport {
            outcome: ExtractOutcome::Created {
                batch_id,
                batch_path,
                sources,
                records,
            },
            errors,
        })
    }

    /// Acknowledge `batch_id`: advance every cursor it covers and
    /// delete the artifact (best effort).
    ///
    /// The store update is what commit's correctness depends on; it is
    /// persisted before the artifact is touched. An unknown or
    /// already-committed id advances zero files and is not an error, so
    /// an unreliable caller may safely retry.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor store cannot be loaded or
    /// persisted.
    pub fn commit(&self, batch_id: &str) -> Result<CommitReport> {
        let cursor_path = self.cursor_path();
        let mut store = CursorStore::load(&cursor_path)?;

        let mut committed_files = 0;
        for cursor in store.files.values_mut() {
            if cursor.pending_batch.as_deref() != Some(batch_id) {
                continue;
            }
            if let Some(pending) = cursor.pending.take() {
                cursor.committed = pending;
                committed_files += 1;
            }
            cursor.pending_batch = None;
            cursor.updated_at_ms = now_ms();
        }

        store.save(&cursor_path)?;
        remove_artifact(&self.batches_dir(), batch_id);

        tracing::info!(batch_id, committed_files, "batch committed");
        Ok(CommitReport {
            batch_id: batch_id.to_string(),
            committed_files,
        })
    }
}

//! gleaner-core: incremental, exactly-once harvesting of appended
//! records from growing, rotating JSONL session logs.
//!
//! The core is a cursor/tailing state machine: durable byte-offset
//! cursors per file, bounded newline-aligned reads, identity-based
//! rotation and truncation detection, and a two-phase pending/commit
//! protocol that makes the handoff to a downstream consumer idempotent
//! and crash-safe.
//!
//! # Conventions
//!
//! - **Errors**: typed [`error::GleanError`] for fatal store/batch
//!   failures; `anyhow::Result` at configuration seams. Per-file
//!   failures are isolated into reports, never propagated.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).
//! - **Persistence**: whole-document JSON, replaced atomically via
//!   temp file + rename. Never an in-place partial update.

pub mod batch;
pub mod config;
pub mod coordinator;
pub mod cursor;
pub mod decode;
pub mod discover;
pub mod error;
pub mod rotation;
pub mod tail;

pub use config::{GleanConfig, load_config};
pub use coordinator::{CommitReport, Coordinator, ExtractOutcome, ExtractReport, InitReport};
pub use error::{GleanError, Result};

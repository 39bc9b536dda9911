//! Rotation and truncation detection.
//!
//! Given the stored cursor for a path (if any) and the file's current
//! identity and size, decide where reading may safely begin. Rotation
//! and truncation are expected lifecycle events, not errors.

use crate::cursor::{FileCursor, FileIdentity};

/// Compute the valid starting offset for a file.
///
/// - No stored cursor: the file is newly discovered; start at its
///   current end so the historical backlog is never ingested.
/// - Same identity, grown or unchanged: resume from `committed`.
/// - Same identity, shrunk below `committed`: truncated in place;
///   restart from zero.
/// - Different identity: rotated (new file under the same path);
///   restart from zero.
#[must_use]
pub fn start_offset(stored: Option<&FileCursor>, identity: FileIdentity, size: u64) -> u64 {
    let Some(cursor) = stored else {
        return size;
    };

    if cursor.identity != identity {
        tracing::info!(
            committed = cursor.committed,
            "file rotated; restarting from offset 0"
        );
        return 0;
    }

    if size < cursor.committed {
        tracing::info!(
            committed = cursor.committed,
            size,
            "file truncated; restarting from offset 0"
        );
        return 0;
    }

    cursor.committed
}

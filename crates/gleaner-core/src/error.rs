//! Error types for the harvesting core.
//!
//! Only failures that make continuing unsafe are represented here: a
//! cursor store that cannot be read or atomically replaced, and a batch
//! artifact that cannot be written. Everything else — an unparseable
//! record line, a single unreadable source file, a leftover artifact
//! after commit — is isolated or ignored at the call site.

/// Fatal errors for cursor-store and batch-artifact operations.
#[derive(Debug, thiserror::Error)]
pub enum GleanError {
    /// The cursor store exists but could not be read.
    #[error("failed to read cursor store {path}: {source}")]
    StoreRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The cursor store exists but does not parse. Proceeding would risk
    /// double delivery, so this aborts the operation.
    #[error("cursor store {path} is corrupt: {source}")]
    StoreCorrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The cursor store could not be atomically replaced on disk.
    #[error("failed to persist cursor store {path}: {source}")]
    StorePersist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A batch artifact could not be written or read back.
    #[error("failed to write batch artifact {path}: {source}")]
    BatchWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A batch artifact exists but does not parse.
    #[error("batch artifact {path} is corrupt: {source}")]
    BatchCorrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A persisted document failed to serialize.
    #[error("failed to encode state document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, GleanError>;

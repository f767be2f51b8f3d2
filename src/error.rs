//! Error types for archive operations.

use thiserror::Error;

/// Errors produced by the archive engine and its I/O backends.
#[derive(Debug, Error)]
pub enum Error {
    /// Header signature or version does not match this engine
    #[error("Invalid archive format: {0}")]
    Format(String),

    /// File is shorter than the header or catalog claims
    #[error("Truncated archive: expected {expected} bytes at offset {offset}, got {actual}")]
    TruncatedArchive {
        /// Offset of the range being read
        offset: u64,
        /// Bytes requested
        expected: u64,
        /// Bytes available before end of file
        actual: u64,
    },

    /// Catalog block could not be decoded
    #[error("Catalog is corrupt: {0}")]
    CatalogCorrupt(String),

    /// Entry block is not a valid gzip stream
    #[error("Entry {name} is corrupt: {reason}")]
    CorruptEntry {
        /// User-facing entry name
        name: String,
        /// Decoder error
        reason: String,
    },

    /// No entry with this name in the catalog
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Entry name normalizes to the reserved catalog key
    #[error("Invalid entry name: {0:?}")]
    InvalidName(String),

    /// Underlying write accepted fewer bytes than requested
    #[error("Short write at offset {offset}: wrote {written} of {requested} bytes")]
    ShortWrite {
        /// Offset of the failed write
        offset: u64,
        /// Bytes handed to the backend
        requested: usize,
        /// Bytes the backend reported as written
        written: usize,
    },

    /// Operation attempted after `close`
    #[error("Archive is closed")]
    ArchiveClosed,

    /// Write attempted on an archive opened read-only
    #[error("Archive was opened read-only")]
    ReadOnly,

    /// Entry content is not valid UTF-8
    #[error("Entry is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Entry content is not valid JSON
    #[error("Entry is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Remote source misbehaved
    #[error("Remote error: {0}")]
    Remote(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

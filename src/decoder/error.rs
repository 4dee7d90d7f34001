//! Error types for tar stream decoding.

use std::str::Utf8Error;

use thiserror::Error;

/// Errors that can occur while decoding a tar stream.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// I/O error from the underlying reader.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A numeric header field could not be parsed.
    #[error("invalid header at position {pos}: {source}")]
    Header {
        /// Position of the offending header in the stream.
        pos: u64,
        /// Parse error reported for the field.
        #[source]
        source: std::io::Error,
    },

    /// Stored header checksum doesn't match the header contents.
    #[error("header checksum mismatch at position {pos}: stored {stored}, computed {computed}")]
    Checksum {
        /// Position of the offending header in the stream.
        pos: u64,
        /// Checksum recorded in the header.
        stored: u32,
        /// Checksum computed from the header bytes.
        computed: u32,
    },

    /// Invalid UTF-8 in PAX key.
    #[error("invalid UTF-8 in PAX key: {0}")]
    InvalidUtf8(#[from] Utf8Error),

    /// Path exceeds configured maximum length.
    #[error("path exceeds limit: {len} bytes > {limit} bytes")]
    PathTooLong {
        /// Actual path length.
        len: usize,
        /// Configured limit.
        limit: usize,
    },

    /// PAX extended header exceeds configured maximum size.
    #[error("PAX header exceeds limit: {size} bytes > {limit} bytes")]
    PaxTooLarge {
        /// Actual PAX header size.
        size: u64,
        /// Configured limit.
        limit: u64,
    },

    /// GNU long name/link exceeds configured maximum size.
    #[error("GNU long name/link exceeds limit: {size} bytes > {limit} bytes")]
    GnuLongTooLarge {
        /// Actual GNU long name/link size.
        size: u64,
        /// Configured limit.
        limit: u64,
    },

    /// Metadata records (GNU long name, PAX, etc.) found but no actual entry followed.
    #[error("metadata entries without a following actual entry")]
    OrphanedMetadata,

    /// Too many consecutive metadata records.
    #[error("too many pending metadata entries: {count} > {limit}")]
    TooManyPendingEntries {
        /// Number of pending metadata records.
        count: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Entry size in header is invalid (overflow when computing padded size).
    #[error("invalid entry size: {0}")]
    InvalidSize(u64),

    /// Unexpected EOF while reading a header, entry content or padding.
    #[error("unexpected EOF at position {pos}")]
    UnexpectedEof {
        /// Position in the stream where EOF occurred.
        pos: u64,
    },
}

/// Result type for decoding operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

//! Error types for tar iteration, lookup and extraction.
//!
//! # Error Categories
//!
//! - **Stream errors**: [`Decode`] (malformed tar, returned unwrapped)
//! - **Visitor errors**: [`Visit`] (any failure raised while handling an entry,
//!   wrapped with that entry's name)
//! - **Lookup errors**: [`NotFound`]
//! - **Extraction errors**: [`PathTraversal`], [`ReadLimitExceeded`], [`Copy`]
//! - **System errors**: [`Io`], [`Other`]
//!
//! [`Decode`]: Error::Decode
//! [`Visit`]: Error::Visit
//! [`NotFound`]: Error::NotFound
//! [`PathTraversal`]: Error::PathTraversal
//! [`ReadLimitExceeded`]: Error::ReadLimitExceeded
//! [`Copy`]: Error::Copy
//! [`Io`]: Error::Io
//! [`Other`]: Error::Other

use std::path::PathBuf;

use crate::decoder::DecodeError;

/// Result type alias for operations that may return an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by iteration, lookup and extraction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The tar stream itself is malformed or couldn't be read.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A visitor failed while handling an entry.
    #[error("failed to visit tar entry={entry:?} : {source}")]
    Visit {
        /// Logical name of the entry being visited.
        entry: String,
        /// The visitor's error.
        #[source]
        source: Box<Error>,
    },

    /// No entry with the requested logical path exists in the stream.
    #[error("file not found (path={0})")]
    NotFound(String),

    /// An entry would land outside the extraction destination.
    #[error("potential path traversal attack with entry: {0:?}")]
    PathTraversal(String),

    /// A regular file reached the per-file read limit during extraction.
    #[error(
        "read limit hit for entry {entry:?} (potential decompression bomb attack): \
         {copied} >= {limit} bytes"
    )]
    ReadLimitExceeded {
        /// Logical name of the offending entry.
        entry: String,
        /// Bytes written before the limit stopped the copy.
        copied: u64,
        /// Configured per-file limit.
        limit: u64,
    },

    /// Copying an entry's content to its destination failed.
    #[error("unable to copy file {path:?}: {source}")]
    Copy {
        /// Destination path of the file being written.
        path: PathBuf,
        /// Underlying read or write error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error from the destination filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by a caller-supplied visitor.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Strip [`Error::Visit`] wrapping and return the error raised by the visitor.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Visit { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

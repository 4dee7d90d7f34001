//! Per-file read limit for extraction.
//!
//! Every regular file written by the extractor is copied through a reader
//! bounded by a [`ReadLimit`], so a small compressed layer can't expand into
//! an arbitrarily large file on disk.  The limit is configured as a string
//! (environment variable or command-line flag) and parsed once:
//!
//! ```
//! use tarutil::config::ReadLimit;
//!
//! assert_eq!(ReadLimit::parse("1048576").get(), 1048576);
//! // invalid or non-positive values keep the default
//! assert_eq!(ReadLimit::parse("-5"), ReadLimit::default());
//! assert_eq!(ReadLimit::parse("lots"), ReadLimit::default());
//! ```

use std::fmt;

use log::debug;
use once_cell::sync::Lazy;

/// Bytes in a gigabyte.
pub const GB: u64 = 1 << 30;

/// Environment variable holding the per-file read limit in bytes.
pub const READ_LIMIT_ENV: &str = "TARUTIL_PER_FILE_READ_LIMIT";

static PROCESS_READ_LIMIT: Lazy<ReadLimit> = Lazy::new(ReadLimit::from_env);

/// Maximum number of bytes extracted for a single regular file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReadLimit(u64);

impl ReadLimit {
    /// The built-in limit: 2 gigabytes.
    pub const DEFAULT: ReadLimit = ReadLimit(2 * GB);

    /// A limit of `bytes`, or `None` if it is zero.
    pub fn new(bytes: u64) -> Option<Self> {
        (bytes > 0).then_some(Self(bytes))
    }

    /// Parse a limit in bytes.
    ///
    /// Values that aren't a positive integer leave [`ReadLimit::DEFAULT`] in
    /// effect.
    pub fn parse(value: &str) -> Self {
        match value.trim().parse::<i64>() {
            Ok(bytes) if bytes > 0 => Self(bytes as u64),
            _ => {
                debug!("ignoring per-file read limit {value:?}, using {}", Self::DEFAULT);
                Self::DEFAULT
            }
        }
    }

    /// Read the limit from `$TARUTIL_PER_FILE_READ_LIMIT`.
    pub fn from_env() -> Self {
        match std::env::var(READ_LIMIT_ENV) {
            Ok(value) => Self::parse(&value),
            Err(_) => Self::DEFAULT,
        }
    }

    /// The process-wide limit.
    ///
    /// Read from the environment on first use and fixed for the rest of the
    /// process lifetime.
    pub fn process_default() -> Self {
        *PROCESS_READ_LIMIT
    }

    /// The limit in bytes.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for ReadLimit {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ReadLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

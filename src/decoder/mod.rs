//! Sequential tar decoding.
//!
//! [`TarDecoder`] turns a byte stream into an ordered sequence of entry
//! headers, each numbered from 0 in stream order, and serves the content of
//! the most recent entry through its [`Read`](std::io::Read) implementation.
//!
//! GNU long name/link records and PAX extended headers are applied to the
//! entry they precede and never surface as entries of their own.  The
//! decoder applies configurable [`Limits`] so that a hostile archive can't
//! make it buffer unbounded metadata.
//!
//! # Example
//!
//! ```
//! use std::io::{Cursor, Read};
//! use tarutil::decoder::TarDecoder;
//!
//! let mut builder = tar::Builder::new(Vec::new());
//! let mut header = tar::Header::new_gnu();
//! header.set_size(2);
//! builder.append_data(&mut header, "hello.txt", &b"hi"[..]).unwrap();
//! let data = builder.into_inner().unwrap();
//!
//! let mut decoder = TarDecoder::with_defaults(Cursor::new(data));
//! let (sequence, header) = decoder.next_header().unwrap().unwrap();
//! assert_eq!((sequence, header.name.as_str()), (0, "hello.txt"));
//!
//! let mut content = String::new();
//! decoder.read_to_string(&mut content).unwrap();
//! assert_eq!(content, "hi");
//! assert!(decoder.next_header().unwrap().is_none());
//! ```

mod error;
mod header;
mod limits;
mod parser;

pub use error::{DecodeError, Result};
pub use header::EntryHeader;
pub use limits::Limits;
pub use parser::{TarDecoder, BLOCK_SIZE};

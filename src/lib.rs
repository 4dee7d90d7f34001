//! Streaming access to tar archives such as container image layers.
//!
//! The crate reads a tar stream one entry at a time and offers three ways to
//! use it:
//!
//! - [`iterate`]: hand every entry, in order, to a visitor that can stop
//!   early or fail
//! - [`reader_from_tar`] and [`metadata_from_tar`]: find one entry by its
//!   logical path
//! - [`untar_to_directory`] and [`TarExtractor`]: unpack directories and
//!   regular files below a destination, refusing anything that would land
//!   outside of it and bounding the size of every file written
//!
//! # Example
//!
//! ```
//! use std::io::{Cursor, Read};
//! use tarutil::{iterate, reader_from_tar, Visit};
//!
//! let mut builder = tar::Builder::new(Vec::new());
//! let mut header = tar::Header::new_gnu();
//! header.set_size(5);
//! builder.append_data(&mut header, "etc/hostname", &b"box\n\n"[..]).unwrap();
//! let layer = builder.into_inner().unwrap();
//!
//! let mut names = Vec::new();
//! iterate(Cursor::new(&layer), |entry| {
//!     names.push(entry.header.name);
//!     Ok(Visit::Continue)
//! })
//! .unwrap();
//! assert_eq!(names, ["etc/hostname"]);
//!
//! let mut content = String::new();
//! reader_from_tar(Cursor::new(&layer), "etc/hostname")
//!     .unwrap()
//!     .read_to_string(&mut content)
//!     .unwrap();
//! assert_eq!(content, "box\n\n");
//! ```

pub mod config;
pub mod decoder;
pub mod error;
pub mod extract;
pub mod filesystem;
pub mod iterate;
pub mod lookup;
pub mod metadata;


pub use config::ReadLimit;
pub use error::{Error, Result};
pub use extract::{untar_to_directory, TarExtractor};
pub use iterate::{iterate, TarEntry, Visit};
pub use lookup::{metadata_from_tar, reader_from_tar, TarFileReader};
pub use metadata::Metadata;

//! Finding a single entry in a tar stream by its logical path.
//!
//! Both lookups stop reading the stream as soon as the entry is found.  Paths
//! are compared exactly as recorded in the archive: `./etc/passwd`,
//! `etc/passwd` and `/etc/passwd` are three different names.

use std::io::{self, Read};

use log::trace;

use crate::{
    decoder::TarDecoder,
    error::{Error, Result},
    iterate::{iterate_decoder, Visit},
    metadata::Metadata,
};

/// The content of one tar entry, owning the stream it is read from.
///
/// Dropping this (or calling [`close`](TarFileReader::close)) closes the
/// original stream.
#[derive(Debug)]
pub struct TarFileReader<R> {
    decoder: TarDecoder<R>,
}

impl<R: Read> TarFileReader<R> {
    /// Bytes of the entry not yet read.
    pub fn remaining(&self) -> u64 {
        self.decoder.remaining()
    }

    /// Give back the original stream, positioned somewhere inside the archive.
    pub fn into_inner(self) -> R {
        self.decoder.into_inner()
    }

    /// Close the original stream.
    pub fn close(self) {
        drop(self.into_inner());
    }
}

impl<R: Read> Read for TarFileReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}

/// Find the entry named `path` and return a reader for its content.
///
/// The returned reader takes ownership of `reader`.  If no entry matches, the
/// whole stream is consumed and [`Error::NotFound`] is returned.
pub fn reader_from_tar<R: Read>(reader: R, path: &str) -> Result<TarFileReader<R>> {
    let mut decoder = TarDecoder::with_defaults(reader);
    let mut found = false;

    iterate_decoder(&mut decoder, |entry| {
        if entry.header.name == path {
            trace!("found tar entry {path:?} at sequence {}", entry.sequence);
            found = true;
            return Ok(Visit::Stop);
        }
        Ok(Visit::Continue)
    })?;

    if !found {
        return Err(Error::NotFound(path.to_string()));
    }
    Ok(TarFileReader { decoder })
}

/// Find the entry named `path` and describe it.
///
/// Entries with a declared size above zero have their content read to fill in
/// [`Metadata::digest`].  Pass `&mut reader` to keep ownership of the stream.
pub fn metadata_from_tar<R: Read>(reader: R, path: &str) -> Result<Metadata> {
    let mut metadata = None;

    crate::iterate::iterate(reader, |entry| {
        if entry.header.name != path {
            return Ok(Visit::Continue);
        }

        let content = (entry.header.size > 0).then_some(entry.content);
        metadata = Some(Metadata::new(&entry.header, content)?);
        Ok(Visit::Stop)
    })?;

    metadata.ok_or_else(|| Error::NotFound(path.to_string()))
}

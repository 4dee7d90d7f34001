//! Visiting the entries of a tar stream in order.
//!
//! [`iterate`] decodes a stream and hands each entry to a visitor.  The
//! visitor decides whether iteration goes on ([`Visit::Continue`]), ends
//! successfully ([`Visit::Stop`]), or fails (an `Err`, which is wrapped with
//! the entry's name and aborts iteration).

use std::io::Read;

use crate::{
    decoder::{EntryHeader, TarDecoder},
    error::{Error, Result},
};

/// What a visitor wants to happen after it has handled an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Proceed to the next entry.
    Continue,
    /// Halt iteration; this is a success, not an error.
    Stop,
}

/// One entry of a tar stream, as seen by a visitor.
///
/// The content reader borrows the decoder, so it can't be used once the
/// visitor has returned and the decoder has moved on.
pub struct TarEntry<'a> {
    /// 0-based position of the entry in the stream.
    pub sequence: u64,
    pub header: EntryHeader,
    /// The entry's content, positioned at its first byte.
    pub content: &'a mut dyn Read,
}

impl std::fmt::Debug for TarEntry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TarEntry")
            .field("sequence", &self.sequence)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

/// Visit every entry of the tar stream read from `reader`.
///
/// Returns `Ok(())` at the end of the stream or when the visitor asks to
/// stop.  Decode errors are returned as they are; visitor errors come back as
/// [`Error::Visit`] naming the entry.  The reader is borrowed, not closed.
pub fn iterate<R, F>(reader: R, visitor: F) -> Result<()>
where
    R: Read,
    F: FnMut(TarEntry<'_>) -> Result<Visit>,
{
    iterate_decoder(&mut TarDecoder::with_defaults(reader), visitor)
}

/// Like [`iterate`], but on an existing decoder.
///
/// When the visitor stops iteration, the decoder is left positioned at the
/// start of the content of the entry that was being visited (minus whatever
/// the visitor read), so the caller can keep reading it.
pub fn iterate_decoder<R, F>(decoder: &mut TarDecoder<R>, mut visitor: F) -> Result<()>
where
    R: Read,
    F: FnMut(TarEntry<'_>) -> Result<Visit>,
{
    while let Some((sequence, header)) = decoder.next_header()? {
        // headers without a name carry nothing to visit
        if header.name.is_empty() {
            continue;
        }

        let entry = header.name.clone();
        match visitor(TarEntry {
            sequence,
            header,
            content: &mut *decoder,
        }) {
            Ok(Visit::Continue) => {}
            Ok(Visit::Stop) => return Ok(()),
            Err(err) => {
                return Err(Error::Visit {
                    entry,
                    source: Box::new(err),
                })
            }
        }
    }
    Ok(())
}

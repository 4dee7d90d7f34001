//! Streaming tar decoder with GNU and PAX extension support.

use std::{
    cmp,
    io::{self, ErrorKind, Read},
};

use log::trace;
use tar::{EntryType, Header, PaxExtensions};

use super::error::{DecodeError, Result};
use super::header::EntryHeader;
use super::limits::Limits;

/// Size of a tar header block, and the unit entry content is padded to.
pub const BLOCK_SIZE: usize = 512;

/// Byte range of the checksum field within a header block.
const CHECKSUM_FIELD: std::ops::Range<usize> = 148..156;

/// Offset of the type flag within a header block.
const TYPEFLAG_OFFSET: usize = 156;

/// Metadata records accumulated until the entry they describe arrives.
#[derive(Debug, Default)]
struct PendingMetadata {
    gnu_long_name: Option<Vec<u8>>,
    gnu_long_link: Option<Vec<u8>>,
    pax_extensions: Option<Vec<u8>>,
    count: usize,
}

impl PendingMetadata {
    fn is_empty(&self) -> bool {
        self.gnu_long_name.is_none()
            && self.gnu_long_link.is_none()
            && self.pax_extensions.is_none()
    }
}

/// Sequential tar decoder.
///
/// Each call to [`next_header`] yields the next actual entry (file, directory,
/// link, ...) together with its 0-based sequence number, handling GNU long
/// name/link records and PAX extended headers transparently.
///
/// After a header is returned, reading from the decoder (it implements
/// [`Read`]) yields that entry's content and nothing more.  Content that
/// hasn't been read when [`next_header`] is called again is discarded, along
/// with the block padding.
///
/// [`next_header`]: TarDecoder::next_header
#[derive(Debug)]
pub struct TarDecoder<R> {
    reader: R,
    limits: Limits,
    pending: PendingMetadata,
    header_buf: [u8; BLOCK_SIZE],
    /// Current position in the stream (for error messages)
    pos: u64,
    /// Unread content bytes of the current entry
    remaining: u64,
    /// Padding that follows the current entry's content
    padding: u64,
    next_sequence: u64,
    done: bool,
}

impl<R: Read> TarDecoder<R> {
    /// Create a new decoder with the given reader and limits.
    pub fn new(reader: R, limits: Limits) -> Self {
        Self {
            reader,
            limits,
            pending: PendingMetadata::default(),
            header_buf: [0u8; BLOCK_SIZE],
            pos: 0,
            remaining: 0,
            padding: 0,
            next_sequence: 0,
            done: false,
        }
    }

    /// Create a new decoder with default limits.
    pub fn with_defaults(reader: R) -> Self {
        Self::new(reader, Limits::default())
    }

    /// Current position in the underlying stream.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Number of content bytes of the current entry not yet read.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Get the next entry header and its sequence number.
    ///
    /// Returns `Ok(None)` at the end of the archive (zero block or a clean EOF
    /// before a header).
    pub fn next_header(&mut self) -> Result<Option<(u64, EntryHeader)>> {
        if self.done {
            return Ok(None);
        }

        self.skip_current()?;

        loop {
            if self.pending.count > self.limits.max_pending_entries {
                return Err(DecodeError::TooManyPendingEntries {
                    count: self.pending.count,
                    limit: self.limits.max_pending_entries,
                });
            }

            let header_pos = self.pos;
            if !self.read_block()? || self.header_buf.iter().all(|&b| b == 0) {
                self.done = true;
                if !self.pending.is_empty() {
                    return Err(DecodeError::OrphanedMetadata);
                }
                return Ok(None);
            }

            let header = Header::from_byte_slice(&self.header_buf);
            verify_checksum(header, header_pos)?;

            let size = numeric_field(&header.as_old().size, || header.entry_size()).map_err(
                |source| DecodeError::Header {
                    pos: header_pos,
                    source,
                },
            )?;
            let padded_size = size
                .checked_next_multiple_of(BLOCK_SIZE as u64)
                .ok_or(DecodeError::InvalidSize(size))?;

            match header.entry_type() {
                EntryType::GNULongName => {
                    let data = self.read_gnu_long(size, padded_size)?;
                    self.pending.gnu_long_name = Some(data);
                    self.pending.count += 1;
                }
                EntryType::GNULongLink => {
                    let data = self.read_gnu_long(size, padded_size)?;
                    self.pending.gnu_long_link = Some(data);
                    self.pending.count += 1;
                }
                EntryType::XHeader => {
                    if size > self.limits.max_pax_size {
                        return Err(DecodeError::PaxTooLarge {
                            size,
                            limit: self.limits.max_pax_size,
                        });
                    }
                    let data = self.read_vec(size)?;
                    self.skip_bytes(padded_size - size)?;
                    self.pending.pax_extensions = Some(data);
                    self.pending.count += 1;
                }
                EntryType::XGlobalHeader => {
                    // global defaults aren't merged; the record is skipped
                    self.skip_bytes(padded_size)?;
                }
                _ => {
                    let pending = std::mem::take(&mut self.pending);
                    let header = self.resolve_header(header_pos, pending)?;

                    self.remaining = header.content_size();
                    self.padding = self
                        .remaining
                        .checked_next_multiple_of(BLOCK_SIZE as u64)
                        .ok_or(DecodeError::InvalidSize(self.remaining))?
                        - self.remaining;

                    let sequence = self.next_sequence;
                    self.next_sequence += 1;
                    trace!("decoded tar entry {sequence}: {:?}", header.name);
                    return Ok(Some((sequence, header)));
                }
            }
        }
    }

    /// Consume the decoder and return the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Discard whatever is left of the current entry's content and padding.
    fn skip_current(&mut self) -> Result<()> {
        let len = self.remaining + self.padding;
        self.remaining = 0;
        self.padding = 0;
        self.skip_bytes(len)
    }

    /// Read one header block.  Returns false on a clean EOF.
    fn read_block(&mut self) -> Result<bool> {
        let mut total = 0;
        while total < BLOCK_SIZE {
            match self.reader.read(&mut self.header_buf[total..]) {
                Ok(0) if total == 0 => return Ok(false),
                Ok(0) => {
                    return Err(DecodeError::UnexpectedEof {
                        pos: self.pos + total as u64,
                    })
                }
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.pos += BLOCK_SIZE as u64;
        Ok(true)
    }

    fn read_vec(&mut self, size: u64) -> Result<Vec<u8>> {
        let len = usize::try_from(size).map_err(|_| DecodeError::InvalidSize(size))?;
        let mut buf = vec![0u8; len];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(DecodeError::UnexpectedEof { pos: self.pos })
            }
            Err(e) => return Err(e.into()),
        }
        self.pos += len as u64;
        Ok(buf)
    }

    fn skip_bytes(&mut self, len: u64) -> Result<()> {
        let skipped = io::copy(&mut (&mut self.reader).take(len), &mut io::sink())?;
        self.pos += skipped;
        if skipped < len {
            return Err(DecodeError::UnexpectedEof { pos: self.pos });
        }
        Ok(())
    }

    fn read_gnu_long(&mut self, size: u64, padded_size: u64) -> Result<Vec<u8>> {
        if size > self.limits.max_gnu_long_size {
            return Err(DecodeError::GnuLongTooLarge {
                size,
                limit: self.limits.max_gnu_long_size,
            });
        }

        let mut data = self.read_vec(size)?;
        self.skip_bytes(padded_size - size)?;

        // the name runs up to the first NUL
        if let Some(end) = data.iter().position(|&b| b == 0) {
            data.truncate(end);
        }
        self.check_path_len(data.len())?;
        Ok(data)
    }

    fn check_path_len(&self, len: usize) -> Result<()> {
        if len > self.limits.max_path_len {
            return Err(DecodeError::PathTooLong {
                len,
                limit: self.limits.max_path_len,
            });
        }
        Ok(())
    }

    fn resolve_header(&self, pos: u64, pending: PendingMetadata) -> Result<EntryHeader> {
        let header = Header::from_byte_slice(&self.header_buf);
        let field = |source| DecodeError::Header { pos, source };

        let mut path = header.path_bytes().into_owned();
        let mut link_target = header.link_name_bytes().map(|name| name.into_owned());
        let fields = header.as_old();
        let mut size = numeric_field(&fields.size, || header.entry_size()).map_err(field)?;
        let mut uid = numeric_field(&fields.uid, || header.uid()).map_err(field)?;
        let mut gid = numeric_field(&fields.gid, || header.gid()).map_err(field)?;
        let mut mtime = numeric_field(&fields.mtime, || header.mtime()).map_err(field)?;
        let mode = numeric_field(&fields.mode, || header.mode()).map_err(field)?;
        let mut uname = header.username_bytes().map(<[u8]>::to_vec);
        let mut gname = header.groupname_bytes().map(<[u8]>::to_vec);

        if let Some(long_name) = pending.gnu_long_name {
            path = long_name;
        }
        if let Some(long_link) = pending.gnu_long_link {
            link_target = Some(long_link);
        }

        if let Some(ref pax) = pending.pax_extensions {
            for ext in PaxExtensions::new(pax) {
                let ext = ext?;
                let value = ext.value_bytes();
                match ext.key()? {
                    "path" => {
                        self.check_path_len(value.len())?;
                        path = value.to_vec();
                    }
                    "linkpath" => {
                        self.check_path_len(value.len())?;
                        link_target = Some(value.to_vec());
                    }
                    "size" => {
                        if let Some(v) = parse_pax_number(ext.value()) {
                            size = v;
                        }
                    }
                    "uid" => {
                        if let Some(v) = parse_pax_number(ext.value()) {
                            uid = v;
                        }
                    }
                    "gid" => {
                        if let Some(v) = parse_pax_number(ext.value()) {
                            gid = v;
                        }
                    }
                    "mtime" => {
                        // PAX mtime may carry a fractional part
                        if let Some(v) =
                            parse_pax_number(ext.value().map(|v| v.split('.').next().unwrap_or(v)))
                        {
                            mtime = v;
                        }
                    }
                    "uname" => uname = Some(value.to_vec()),
                    "gname" => gname = Some(value.to_vec()),
                    _ => {}
                }
            }
        }

        self.check_path_len(path.len())?;

        let mut entry_type = header.entry_type();
        // old-style regular files with a trailing slash are directories
        if self.header_buf[TYPEFLAG_OFFSET] == 0 && path.ends_with(b"/") {
            entry_type = EntryType::Directory;
        }

        Ok(EntryHeader {
            name: lossy(path),
            entry_type,
            size,
            mode,
            uid,
            gid,
            mtime,
            link_name: link_target.filter(|t| !t.is_empty()).map(lossy),
            user_name: uname.filter(|n| !n.is_empty()).map(lossy),
            group_name: gname.filter(|n| !n.is_empty()).map(lossy),
        })
    }
}

impl<R: Read> Read for TarDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let max = cmp::min(buf.len() as u64, self.remaining) as usize;
        let n = self.reader.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                ErrorKind::UnexpectedEof,
                DecodeError::UnexpectedEof { pos: self.pos },
            ));
        }
        self.remaining -= n as u64;
        self.pos += n as u64;
        Ok(n)
    }
}

/// Parse a numeric header field, reading a blank one (only NULs or spaces
/// before the first NUL) as zero.
fn numeric_field<T: Default>(
    raw: &[u8],
    parse: impl FnOnce() -> io::Result<T>,
) -> io::Result<T> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    if raw[..end].iter().all(|&b| b == b' ') {
        return Ok(T::default());
    }
    parse()
}

fn parse_pax_number(value: std::result::Result<&str, std::str::Utf8Error>) -> Option<u64> {
    value.ok()?.parse().ok()
}

fn lossy(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Check the stored checksum against both the unsigned and the (historic) signed sum of the
/// header bytes, with the checksum field itself counted as spaces.
fn verify_checksum(header: &Header, pos: u64) -> Result<()> {
    let stored = header
        .cksum()
        .map_err(|source| DecodeError::Header { pos, source })?;

    let bytes = header.as_bytes();
    let (mut unsigned, mut signed) = (0u32, 0i64);
    for (i, &b) in bytes.iter().enumerate() {
        let b = if CHECKSUM_FIELD.contains(&i) { b' ' } else { b };
        unsigned += u32::from(b);
        signed += i64::from(b as i8);
    }

    if stored != unsigned && i64::from(stored) != signed {
        return Err(DecodeError::Checksum {
            pos,
            stored,
            computed: unsigned,
        });
    }
    Ok(())
}

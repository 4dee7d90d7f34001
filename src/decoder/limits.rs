//! Bounds on the metadata a tar decoder will buffer.

/// Upper bounds applied while decoding.
///
/// GNU long name/link records and PAX headers are buffered in memory until the
/// entry they describe arrives, so each of them is capped, as is the number of
/// such records allowed in a row.
///
/// ```
/// use tarutil::decoder::Limits;
///
/// let short_paths = Limits {
///     max_path_len: 1024,
///     ..Default::default()
/// };
/// assert_eq!(short_paths.max_pax_size, Limits::default().max_pax_size);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Longest entry name or link target, in bytes.
    pub max_path_len: usize,
    /// Largest PAX extended header record, in bytes.
    pub max_pax_size: u64,
    /// Largest GNU long name or long link record, in bytes.
    pub max_gnu_long_size: u64,
    /// Metadata records allowed before the entry they describe.
    pub max_pending_entries: usize,
}

impl Default for Limits {
    /// PATH_MAX sized names, 1 MiB of PAX data, 16 pending records.
    fn default() -> Self {
        Self {
            max_path_len: 4096,
            max_pax_size: 1 << 20,
            max_gnu_long_size: 4096,
            max_pending_entries: 16,
        }
    }
}

impl Limits {
    /// Tighter bounds for layers from sources that aren't trusted at all.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            max_path_len: 1024,
            max_pax_size: 64 << 10,
            max_gnu_long_size: 1024,
            max_pending_entries: 8,
        }
    }
}

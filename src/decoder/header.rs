//! Decoded tar entry header with extensions applied.

use tar::EntryType;

/// A fully-resolved tar entry header.
///
/// This is the "logical" header after GNU long name/link records and PAX
/// extensions have been applied.  It is owned, so it stays valid after the
/// decoder moves on to the next entry (unlike the entry content).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// The logical path of the entry, exactly as recorded in the archive.
    ///
    /// Priority: PAX `path` > GNU long name > header `name` (+ UStar `prefix`).
    pub name: String,

    /// The entry type (Regular, Directory, Symlink, etc.).
    pub entry_type: EntryType,

    /// Declared content size in bytes (PAX `size` overrides the header).
    pub size: u64,

    /// Permission bits and file mode from the header.
    pub mode: u32,

    /// Owner UID (PAX `uid` overrides header).
    pub uid: u64,

    /// Owner GID (PAX `gid` overrides header).
    pub gid: u64,

    /// Modification time as Unix timestamp, in whole seconds.
    pub mtime: u64,

    /// Link target for symlinks and hard links.
    pub link_name: Option<String>,

    /// Owner user name, if recorded.
    pub user_name: Option<String>,

    /// Owner group name, if recorded.
    pub group_name: Option<String>,
}

impl EntryHeader {
    /// Check if this is a regular file entry.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.entry_type.is_file()
    }

    /// Check if this is a directory entry.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.entry_type.is_dir()
    }

    /// Check if this is a symbolic link or a hard link.
    #[must_use]
    pub fn is_link(&self) -> bool {
        self.entry_type.is_symlink() || self.entry_type.is_hard_link()
    }

    /// Number of content bytes that follow the header in the stream.
    ///
    /// Links, devices, directories and fifos carry no payload regardless of
    /// the size they declare.
    #[must_use]
    pub fn content_size(&self) -> u64 {
        match self.entry_type {
            EntryType::Link
            | EntryType::Symlink
            | EntryType::Char
            | EntryType::Block
            | EntryType::Directory
            | EntryType::Fifo => 0,
            _ => self.size,
        }
    }
}

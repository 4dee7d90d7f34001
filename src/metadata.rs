//! Metadata records for tar entries.

use std::io::{self, Read};

use sha2::{Digest, Sha256};
use tar::EntryType;

use crate::decoder::EntryHeader;

/// The type of a tar entry, as reported in [`Metadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Regular,
    HardLink,
    Symlink,
    CharacterDevice,
    BlockDevice,
    Directory,
    Fifo,
    Other,
}

impl From<EntryType> for FileType {
    fn from(entry_type: EntryType) -> Self {
        match entry_type {
            EntryType::Regular | EntryType::Continuous => FileType::Regular,
            EntryType::Link => FileType::HardLink,
            EntryType::Symlink => FileType::Symlink,
            EntryType::Char => FileType::CharacterDevice,
            EntryType::Block => FileType::BlockDevice,
            EntryType::Directory => FileType::Directory,
            EntryType::Fifo => FileType::Fifo,
            _ => FileType::Other,
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FileType::Regular => "file",
            FileType::HardLink => "hardlink",
            FileType::Symlink => "symlink",
            FileType::CharacterDevice => "chardev",
            FileType::BlockDevice => "blockdev",
            FileType::Directory => "dir",
            FileType::Fifo => "fifo",
            FileType::Other => "other",
        })
    }
}

/// Everything known about one tar entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub path: String,
    pub link_destination: Option<String>,
    pub size: u64,
    pub mode: u32,
    pub file_type: FileType,
    pub uid: u64,
    pub gid: u64,
    pub user_name: Option<String>,
    pub group_name: Option<String>,
    /// Modification time in seconds since the epoch.
    pub mod_time: u64,
    /// Hex SHA-256 of the content; only computed when a content reader was
    /// supplied.
    pub digest: Option<String>,
}

impl Metadata {
    /// Build a record from a header and, optionally, the entry's content.
    ///
    /// Pass `None` for entries without content; the digest is then left unset.
    pub fn new(header: &EntryHeader, content: Option<&mut dyn Read>) -> io::Result<Self> {
        let digest = match content {
            Some(reader) => {
                let mut hasher = Sha256::new();
                io::copy(reader, &mut hasher)?;
                Some(hex::encode(hasher.finalize()))
            }
            None => None,
        };

        Ok(Self {
            path: header.name.clone(),
            link_destination: header.link_name.clone(),
            size: header.size,
            mode: header.mode,
            file_type: header.entry_type.into(),
            uid: header.uid,
            gid: header.gid,
            user_name: header.user_name.clone(),
            group_name: header.group_name.clone(),
            mod_time: header.mtime,
            digest,
        })
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(entry_type: EntryType, size: u64) -> EntryHeader {
        EntryHeader {
            name: "etc/os-release".into(),
            entry_type,
            size,
            mode: 0o644,
            uid: 0,
            gid: 0,
            mtime: 1234567890,
            link_name: None,
            user_name: Some("root".into()),
            group_name: None,
        }
    }

    #[test]
    fn test_metadata_without_content() {
        let metadata = Metadata::new(&header(EntryType::Directory, 0), None).unwrap();
        assert!(metadata.is_dir());
        assert_eq!(metadata.digest, None);
        assert_eq!(metadata.user_name.as_deref(), Some("root"));
    }

    #[test]
    fn test_metadata_digest() {
        let mut content: &[u8] = b"hello";
        let metadata = Metadata::new(&header(EntryType::Regular, 5), Some(&mut content)).unwrap();
        assert_eq!(metadata.file_type, FileType::Regular);
        assert_eq!(
            metadata.digest.as_deref(),
            Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
        );
    }
}

//! Unpacking a tar stream onto a filesystem.
//!
//! This is meant for image layers from untrusted sources, not for general
//! purpose archives: only directories and regular files are materialized.
//! Symlinks and hard links are skipped so they can't be used to escape the
//! destination, and device nodes, fifos and other special entries are
//! ignored.
//!
//! Every entry must land strictly inside the destination directory; an entry
//! that would resolve anywhere else aborts the whole extraction.  The content
//! of each regular file is copied through a reader bounded by a [`ReadLimit`],
//! and reaching that limit also aborts.  Files written before a fatal entry
//! are left in place.

use std::{
    io::{self, ErrorKind, Read, Write},
    path::{Component, Path, PathBuf},
};

use log::{debug, error, trace};
use tar::EntryType;

use crate::{
    config::ReadLimit,
    error::{Error, Result},
    filesystem::{FileHandle, Filesystem, OsFilesystem},
    iterate::{iterate, TarEntry, Visit},
};

/// Lexically normalize a path: drop `.` components and resolve `..` against
/// preceding components, without looking at the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // ".." at the root is the root
                Some(Component::RootDir | Component::Prefix(_)) => {}
                Some(Component::ParentDir | Component::CurDir) | None => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// The entry naming the root of the archive itself.
fn is_root_marker(name: &str) -> bool {
    name == "."
}

/// Copy at most `limit` bytes, reporting how many were written even on error.
fn copy_bounded(reader: &mut dyn Read, writer: &mut impl Write, limit: u64) -> (u64, io::Result<()>) {
    let mut reader = reader.take(limit);
    let mut buf = [0u8; 32 * 1024];
    let mut copied = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return (copied, Ok(())),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return (copied, Err(e)),
        };
        if let Err(e) = writer.write_all(&buf[..n]) {
            return (copied, Err(e));
        }
        copied += n as u64;
    }
}

/// Extracts the entries of a tar stream below a destination directory.
///
/// Used as a visitor with [`iterate`], or directly through
/// [`unpack`](TarExtractor::unpack).
#[derive(Debug)]
pub struct TarExtractor<F> {
    fs: F,
    destination: PathBuf,
    read_limit: ReadLimit,
}

impl<F: Filesystem> TarExtractor<F> {
    /// Create an extractor writing below `destination` on `fs`.
    ///
    /// A relative `destination` is resolved against the current directory,
    /// then normalized lexically.  An empty one is an error.
    pub fn new(fs: F, destination: impl AsRef<Path>, read_limit: ReadLimit) -> Result<Self> {
        let destination = normalize(&std::path::absolute(destination.as_ref())?);
        Ok(Self {
            fs,
            destination,
            read_limit,
        })
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn read_limit(&self) -> ReadLimit {
        self.read_limit
    }

    /// Extract every entry read from `reader`.
    pub fn unpack(&self, reader: impl Read) -> Result<()> {
        iterate(reader, |entry| self.visit(entry))
    }

    /// Handle a single entry.
    pub fn visit(&self, entry: TarEntry<'_>) -> Result<Visit> {
        let name = entry.header.name.as_str();
        let target = normalize(&self.destination.join(name));
        let root_marker = is_root_marker(name);

        // nothing may land outside of the destination; the root itself is only
        // reachable through the "." marker
        let contained = target.starts_with(&self.destination) && target != self.destination;
        if !contained && !root_marker {
            return Err(Error::PathTraversal(name.to_string()));
        }

        match entry.header.entry_type {
            EntryType::Symlink | EntryType::Link => {
                trace!("skipping symlink/link entry {name:?}");
            }
            EntryType::Directory => {
                if root_marker {
                    return Ok(Visit::Continue);
                }
                if self.fs.stat(&target).is_err() {
                    debug!("creating directory {target:?}");
                    self.fs.mkdir_all(&target, 0o755)?;
                }
            }
            EntryType::Regular => self.write_file(&target, entry)?,
            other => {
                trace!("skipping {other:?} entry {name:?}");
            }
        }

        Ok(Visit::Continue)
    }

    fn write_file(&self, target: &Path, entry: TarEntry<'_>) -> Result<()> {
        let mut file = self.fs.open_for_write(target, entry.header.mode)?;

        let limit = self.read_limit.get();
        let (copied, result) = copy_bounded(entry.content, &mut file, limit);

        // Reaching the limit is fatal even when the content ends exactly there:
        // the bounded reader can't tell the two cases apart.
        if copied >= limit {
            return Err(Error::ReadLimitExceeded {
                entry: entry.header.name,
                copied,
                limit,
            });
        }
        result.map_err(|source| Error::Copy {
            path: target.to_path_buf(),
            source,
        })?;

        let path = file.name().to_path_buf();
        if let Err(err) = file.close() {
            error!("failed to close file during untar of path={path:?}: {err}");
        }
        Ok(())
    }
}

/// Unpack a tar stream into `destination` on the real filesystem.
///
/// Regular files are limited to [`ReadLimit::process_default`] bytes each.
/// Links and special files are not extracted.
pub fn untar_to_directory(reader: impl Read, destination: impl AsRef<Path>) -> Result<()> {
    TarExtractor::new(OsFilesystem, destination, ReadLimit::process_default())?.unpack(reader)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use similar_asserts::assert_eq;

    use super::*;
    use crate::{
        filesystem::{MemoryFilesystem, MemoryNode},
        test::{append_dir, append_file, append_link, append_raw, create_tar_with},
    };

    fn extractor(limit: u64) -> (MemoryFilesystem, TarExtractor<MemoryFilesystem>) {
        let fs = MemoryFilesystem::new();
        fs.mkdir_all(Path::new("/out"), 0o755).unwrap();
        let extractor =
            TarExtractor::new(fs.clone(), "/out", ReadLimit::new(limit).unwrap()).unwrap();
        (fs, extractor)
    }

    fn paths(fs: &MemoryFilesystem) -> Vec<String> {
        fs.paths()
            .into_iter()
            .map(|p| p.display().to_string())
            .collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/out/a/../b")), PathBuf::from("/out/b"));
        assert_eq!(normalize(Path::new("/out/./a/")), PathBuf::from("/out/a"));
        assert_eq!(normalize(Path::new("/out/../../..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("out/../../x")), PathBuf::from("../x"));
        assert_eq!(normalize(Path::new("../../x")), PathBuf::from("../../x"));
    }

    #[test]
    fn test_root_marker() {
        assert!(is_root_marker("."));
        assert!(!is_root_marker("./"));
        assert!(!is_root_marker("./."));
        assert!(!is_root_marker(""));
        assert!(!is_root_marker("./a"));
        assert!(!is_root_marker(".."));
    }

    #[test]
    fn test_extract_dir_and_file() {
        let data = create_tar_with(|b| {
            append_dir(b, "a/");
            append_file(b, "a/b.txt", b"hi");
        });
        let (fs, extractor) = extractor(1024);
        extractor.unpack(Cursor::new(data)).unwrap();

        assert_eq!(paths(&fs), vec!["/", "/out", "/out/a", "/out/a/b.txt"]);
        assert_eq!(fs.node("/out/a"), Some(MemoryNode::Directory { mode: 0o755 }));
        assert_eq!(
            fs.node("/out/a/b.txt"),
            Some(MemoryNode::File {
                mode: 0o644,
                data: b"hi".to_vec()
            })
        );
    }

    #[test]
    fn test_nested_directory_creates_ancestors() {
        let data = create_tar_with(|b| append_dir(b, "x/y/z/"));
        let (fs, extractor) = extractor(1024);
        extractor.unpack(Cursor::new(data)).unwrap();
        assert_eq!(paths(&fs), vec!["/", "/out", "/out/x", "/out/x/y", "/out/x/y/z"]);
    }

    #[test]
    fn test_existing_directory_untouched() {
        let (fs, extractor) = extractor(1024);
        fs.mkdir_all(Path::new("/out/keep"), 0o700).unwrap();

        let data = create_tar_with(|b| append_dir(b, "keep/"));
        extractor.unpack(Cursor::new(data)).unwrap();
        assert_eq!(fs.node("/out/keep"), Some(MemoryNode::Directory { mode: 0o700 }));
    }

    #[test]
    fn test_path_traversal_rejected() {
        for name in ["../escape", "a/../../escape", "a/..", "/etc/passwd", "/out2/x"] {
            let data = create_tar_with(|b| {
                append_file(b, "before", b"ok");
                append_file(b, name, b"evil");
                append_file(b, "after", b"never");
            });
            let (fs, extractor) = extractor(1024);
            let err = extractor.unpack(Cursor::new(data)).unwrap_err();

            assert!(
                matches!(err.root_cause(), Error::PathTraversal(n) if n == name),
                "{name}: {err}"
            );
            assert!(matches!(&err, Error::Visit { entry, .. } if entry == name));
            // the file before the hostile entry stays, nothing after is written
            assert_eq!(paths(&fs), vec!["/", "/out", "/out/before"], "{name}");
        }
    }

    #[test]
    fn test_root_marker_is_noop() {
        let data = create_tar_with(|b| {
            append_dir(b, ".");
            append_file(b, "./inside", b"x");
        });
        let (fs, extractor) = extractor(1024);
        extractor.unpack(Cursor::new(data)).unwrap();
        assert_eq!(paths(&fs), vec!["/", "/out", "/out/inside"]);
    }

    #[test]
    fn test_dot_slash_is_traversal() {
        for name in ["./", "./."] {
            let data = create_tar_with(|b| append_dir(b, name));
            let (fs, extractor) = extractor(1024);
            let err = extractor.unpack(Cursor::new(data)).unwrap_err();
            assert!(
                matches!(err.root_cause(), Error::PathTraversal(n) if n == name),
                "{name}: {err}"
            );
            assert_eq!(paths(&fs), vec!["/", "/out"]);
        }
    }

    #[test]
    fn test_relative_destination_is_resolved() {
        let cwd = std::env::current_dir().unwrap();
        let extractor =
            TarExtractor::new(MemoryFilesystem::new(), ".", ReadLimit::default()).unwrap();
        assert_eq!(extractor.destination(), normalize(&cwd));
        assert!(extractor.destination().is_absolute());

        for name in ["../escape", "/etc/passwd"] {
            let data = create_tar_with(|b| append_file(b, name, b"evil"));
            let err = extractor.unpack(Cursor::new(data)).unwrap_err();
            assert!(
                matches!(err.root_cause(), Error::PathTraversal(n) if n == name),
                "{name}: {err}"
            );
        }
    }

    #[test]
    fn test_empty_destination_is_rejected() {
        let err =
            TarExtractor::new(MemoryFilesystem::new(), "", ReadLimit::default()).unwrap_err();
        assert!(matches!(err, Error::Io(_)), "{err}");
    }

    #[test]
    fn test_links_are_skipped() {
        let data = create_tar_with(|b| {
            append_link(b, "sym", EntryType::Symlink, "/etc/shadow");
            append_link(b, "hard", EntryType::Link, "../../etc/shadow");
            append_link(b, "rel", EntryType::Symlink, "sym");
            append_file(b, "after", b"still here");
        });
        let (fs, extractor) = extractor(1024);
        extractor.unpack(Cursor::new(data)).unwrap();
        assert_eq!(paths(&fs), vec!["/", "/out", "/out/after"]);
    }

    #[test]
    fn test_special_files_are_skipped() {
        let data = create_tar_with(|b| {
            append_raw(b, "dev/null", EntryType::Char, 0o666, b"");
            append_raw(b, "fifo", EntryType::Fifo, 0o644, b"");
            append_raw(b, "contiguous", EntryType::Continuous, 0o644, b"data");
        });
        let (fs, extractor) = extractor(1024);
        extractor.unpack(Cursor::new(data)).unwrap();
        assert_eq!(paths(&fs), vec!["/", "/out"]);
    }

    #[test]
    fn test_file_under_limit() {
        let data = create_tar_with(|b| append_file(b, "f", &[1u8; 99]));
        let (fs, extractor) = extractor(100);
        extractor.unpack(Cursor::new(data)).unwrap();
        assert_eq!(fs.read("/out/f").unwrap().len(), 99);
    }

    #[test]
    fn test_file_over_limit() {
        let data = create_tar_with(|b| {
            append_file(b, "bomb", &[0u8; 5000]);
            append_file(b, "after", b"x");
        });
        let (fs, extractor) = extractor(1000);
        let err = extractor.unpack(Cursor::new(data)).unwrap_err();

        assert!(
            matches!(
                err.root_cause(),
                Error::ReadLimitExceeded { entry, copied: 1000, limit: 1000 } if entry == "bomb"
            ),
            "{err}"
        );
        // the partial file is left behind
        assert_eq!(fs.read("/out/bomb").unwrap().len(), 1000);
        assert_eq!(fs.node("/out/after"), None);
    }

    /// A file of exactly the limit is indistinguishable from a larger one to
    /// the bounded copy, so it is rejected too.
    #[test]
    fn test_file_exactly_at_limit_is_rejected() {
        let data = create_tar_with(|b| append_file(b, "exact", &[7u8; 100]));
        let (_, extractor) = extractor(100);
        let err = extractor.unpack(Cursor::new(data)).unwrap_err();
        assert!(matches!(err.root_cause(), Error::ReadLimitExceeded { copied: 100, .. }));
    }

    #[test]
    fn test_truncated_content_is_copy_error() {
        let data = create_tar_with(|b| append_file(b, "f", &[1u8; 800]));
        let (fs, extractor) = extractor(4096);
        let err = extractor
            .unpack(Cursor::new(data[..512 + 300].to_vec()))
            .unwrap_err();

        match err.root_cause() {
            Error::Copy { path, source } => {
                assert_eq!(path, Path::new("/out/f"));
                assert_eq!(source.kind(), ErrorKind::UnexpectedEof);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs.read("/out/f").unwrap().len(), 300);
    }

    #[test]
    fn test_missing_parent_is_error() {
        let data = create_tar_with(|b| append_file(b, "no/parent", b"x"));
        let (_, extractor) = extractor(1024);
        let err = extractor.unpack(Cursor::new(data)).unwrap_err();
        assert!(matches!(err.root_cause(), Error::Io(e) if e.kind() == ErrorKind::NotFound));
    }

    #[test]
    fn test_close_failure_is_not_fatal() {
        let data = create_tar_with(|b| {
            append_file(b, "one", b"1");
            append_file(b, "two", b"2");
        });
        let (fs, extractor) = extractor(1024);
        fs.fail_close(true);
        extractor.unpack(Cursor::new(data)).unwrap();
        assert_eq!(fs.read("/out/one").unwrap(), b"1");
        assert_eq!(fs.read("/out/two").unwrap(), b"2");
    }

    #[test]
    fn test_untar_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let data = create_tar_with(|b| {
            append_dir(b, "a/");
            append_file(b, "a/b.txt", b"hi");
            append_link(b, "a/link", EntryType::Symlink, "b.txt");
        });
        untar_to_directory(Cursor::new(data), dir.path()).unwrap();

        assert!(dir.path().join("a").is_dir());
        assert_eq!(std::fs::read(dir.path().join("a/b.txt")).unwrap(), b"hi");
        assert!(std::fs::symlink_metadata(dir.path().join("a/link")).is_err());
    }
}

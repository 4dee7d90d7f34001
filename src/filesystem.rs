//! Destination filesystem capability used by extraction.
//!
//! The extractor only ever needs three operations on the destination: check
//! whether something exists, create a directory with its missing ancestors,
//! and open a file for writing.  [`OsFilesystem`] performs them on the real
//! filesystem; [`MemoryFilesystem`] keeps everything in memory so extraction
//! can be tested without touching a disk.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use rustix::{
    fs::{mkdirat, openat, stat, FileType, Mode, OFlags, CWD},
    io::Errno,
};

/// What kind of node exists at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
    Other,
}

/// A file opened for writing by a [`Filesystem`].
pub trait FileHandle: Write {
    /// The path the file was opened at.
    fn name(&self) -> &Path;

    /// Flush and close the file, reporting any error doing so.
    fn close(self) -> io::Result<()>;
}

/// The operations extraction performs on its destination.
pub trait Filesystem {
    type File: FileHandle;

    /// Report what exists at `path`, or an error if nothing does.
    fn stat(&self, path: &Path) -> io::Result<NodeKind>;

    /// Create `path` and any missing ancestors with the given permission bits.
    fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Open `path` for writing, creating it with `mode` if needed and
    /// truncating it if it already exists.
    fn open_for_write(&self, path: &Path, mode: u32) -> io::Result<Self::File>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFilesystem;

/// A file on the real filesystem.
#[derive(Debug)]
pub struct OsFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl Write for OsFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl FileHandle for OsFile {
    fn name(&self) -> &Path {
        &self.path
    }

    fn close(self) -> io::Result<()> {
        let file = self.writer.into_inner().map_err(|e| e.into_error())?;
        drop(file);
        Ok(())
    }
}

impl Filesystem for OsFilesystem {
    type File = OsFile;

    fn stat(&self, path: &Path) -> io::Result<NodeKind> {
        let buf = stat(path)?;
        Ok(match FileType::from_raw_mode(buf.st_mode) {
            FileType::Directory => NodeKind::Directory,
            FileType::RegularFile => NodeKind::File,
            _ => NodeKind::Other,
        })
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut ancestors: Vec<&Path> = path
            .ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        ancestors.reverse();

        for dir in ancestors {
            match mkdirat(CWD, dir, Mode::from(mode)) {
                Ok(()) | Err(Errno::EXIST) => {}
                Err(e) => Err(e)?,
            }
        }

        match self.stat(path)? {
            NodeKind::Directory => Ok(()),
            _ => Err(Errno::NOTDIR.into()),
        }
    }

    fn open_for_write(&self, path: &Path, mode: u32) -> io::Result<Self::File> {
        let fd = openat(
            CWD,
            path,
            OFlags::CREATE | OFlags::RDWR | OFlags::TRUNC | OFlags::CLOEXEC,
            Mode::from(mode & 0o7777),
        )?;
        Ok(OsFile {
            path: path.to_path_buf(),
            writer: BufWriter::new(File::from(fd)),
        })
    }
}

/// A node stored by [`MemoryFilesystem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryNode {
    Directory { mode: u32 },
    File { mode: u32, data: Vec<u8> },
}

#[derive(Debug, Default)]
struct MemoryState {
    nodes: BTreeMap<PathBuf, MemoryNode>,
    fail_close: bool,
}

/// An in-memory filesystem.
///
/// Clones share the same state, so a test can hand one clone to an extractor
/// and inspect the result through another.  The root directory `/` always
/// exists.
#[derive(Debug, Clone)]
pub struct MemoryFilesystem {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        state
            .nodes
            .insert(PathBuf::from("/"), MemoryNode::Directory { mode: 0o755 });
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Make every subsequent [`FileHandle::close`] fail.
    pub fn fail_close(&self, fail: bool) {
        self.lock().fail_close = fail;
    }

    /// The node stored at `path`, if any.
    pub fn node(&self, path: impl AsRef<Path>) -> Option<MemoryNode> {
        self.lock().nodes.get(path.as_ref()).cloned()
    }

    /// The contents of the file at `path`, if it is a file.
    pub fn read(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.node(path)? {
            MemoryNode::File { data, .. } => Some(data),
            MemoryNode::Directory { .. } => None,
        }
    }

    /// All stored paths, in sorted order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().nodes.keys().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_a_directory(path: &Path) -> io::Error {
    io::Error::other(format!("{} is not a directory", path.display()))
}

impl Filesystem for MemoryFilesystem {
    type File = MemoryFile;

    fn stat(&self, path: &Path) -> io::Result<NodeKind> {
        match self.lock().nodes.get(path) {
            Some(MemoryNode::Directory { .. }) => Ok(NodeKind::Directory),
            Some(MemoryNode::File { .. }) => Ok(NodeKind::File),
            None => Err(ErrorKind::NotFound.into()),
        }
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut state = self.lock();
        let mut ancestors: Vec<&Path> = path
            .ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        ancestors.reverse();

        for dir in ancestors {
            match state.nodes.get(dir) {
                Some(MemoryNode::Directory { .. }) => {}
                Some(MemoryNode::File { .. }) => return Err(not_a_directory(dir)),
                None => {
                    state
                        .nodes
                        .insert(dir.to_path_buf(), MemoryNode::Directory { mode });
                }
            }
        }
        Ok(())
    }

    fn open_for_write(&self, path: &Path, mode: u32) -> io::Result<Self::File> {
        let mut state = self.lock();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            match state.nodes.get(parent) {
                Some(MemoryNode::Directory { .. }) => {}
                Some(MemoryNode::File { .. }) => return Err(not_a_directory(parent)),
                None => return Err(ErrorKind::NotFound.into()),
            }
        }

        match state.nodes.get_mut(path) {
            Some(MemoryNode::Directory { .. }) => {
                return Err(io::Error::other(format!(
                    "{} is a directory",
                    path.display()
                )))
            }
            // existing files keep their mode, as with O_CREAT
            Some(MemoryNode::File { data, .. }) => data.clear(),
            None => {
                state.nodes.insert(
                    path.to_path_buf(),
                    MemoryNode::File {
                        mode: mode & 0o7777,
                        data: Vec::new(),
                    },
                );
            }
        }

        Ok(MemoryFile {
            fs: self.clone(),
            path: path.to_path_buf(),
        })
    }
}

/// A file in a [`MemoryFilesystem`].  Writes go straight to the shared state.
#[derive(Debug)]
pub struct MemoryFile {
    fs: MemoryFilesystem,
    path: PathBuf,
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.fs.lock().nodes.get_mut(&self.path) {
            Some(MemoryNode::File { data, .. }) => {
                data.extend_from_slice(buf);
                Ok(buf.len())
            }
            _ => Err(ErrorKind::NotFound.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FileHandle for MemoryFile {
    fn name(&self) -> &Path {
        &self.path
    }

    fn close(self) -> io::Result<()> {
        if self.fs.lock().fail_close {
            return Err(io::Error::other("injected close failure"));
        }
        Ok(())
    }
}

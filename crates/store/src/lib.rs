#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `store` defines the hierarchical stream-store contract that the freezer
//! log is written against, together with the two backends bundled with the
//! workspace: [`FsStore`] over the local filesystem and [`MemStore`], an
//! in-memory tree used by tests and embedders. A store is a tree of named
//! directories and byte streams; streams are written once through a
//! [`WriteCloser`] and read back as plain [`std::io::Read`] values.
//!
//! # Design
//!
//! The [`StreamStore`] trait mirrors the handful of POSIX-ish operations the
//! log needs: `stat`/`lstat`, ordered `read_dir`, `mkdir`, `remove`, and the
//! stream constructors `open_read`/`create_write`. All operations return
//! [`std::io::Result`] so that backends map directly onto [`std::fs`] and
//! callers can detect "does not exist" uniformly through
//! [`std::io::ErrorKind::NotFound`]. Decorating stores (for example the
//! compression layers in the `compress` crate) implement the same trait over
//! an inner store, so the log never knows which concrete backend it runs on.
//!
//! # Invariants
//!
//! - `read_dir` yields entries in ascending name order on every backend.
//! - `create_write` truncates an existing stream; the data is durably
//!   committed when [`WriteCloser::close`] returns `Ok`.
//! - Readers are released by dropping them; nothing in the contract seeks.
//! - [`FileInfo::size`] panics when a decorating store has withheld the
//!   size. Backends always populate it.
//!
//! # Examples
//!
//! ```
//! use std::io::Read;
//! use std::path::Path;
//! use store::{MemStore, StreamStore, mkdir_all};
//!
//! # fn main() -> std::io::Result<()> {
//! let store = MemStore::new();
//! mkdir_all(&store, Path::new("/logs"), 0o755)?;
//!
//! let mut w = store.create_write(Path::new("/logs/batch"))?;
//! std::io::Write::write_all(&mut w, b"payload")?;
//! w.close()?;
//!
//! let mut buf = Vec::new();
//! store.open_read(Path::new("/logs/batch"))?.read_to_end(&mut buf)?;
//! assert_eq!(buf, b"payload");
//! # Ok(())
//! # }
//! ```

use std::io::{self, Read, Write};
use std::path::Path;
use std::time::SystemTime;

mod fs;
mod mem;

pub use fs::FsStore;
pub use mem::MemStore;

/// Metadata for one store entry, as returned by [`StreamStore::stat`],
/// [`StreamStore::lstat`] and [`StreamStore::read_dir`].
#[derive(Clone, Debug)]
pub struct FileInfo {
    name: String,
    size: Option<u64>,
    mode: u32,
    modified: SystemTime,
    is_dir: bool,
}

impl FileInfo {
    /// Creates an entry description with a known size.
    pub fn new(
        name: impl Into<String>,
        size: u64,
        mode: u32,
        modified: SystemTime,
        is_dir: bool,
    ) -> Self {
        Self {
            name: name.into(),
            size: Some(size),
            mode,
            modified,
            is_dir,
        }
    }

    /// Returns a copy of this entry with the size withheld.
    ///
    /// Decorating stores that transform stream contents (compression layers)
    /// use this: the inner store only knows the transformed size, which must
    /// not leak to callers.
    #[must_use]
    pub fn without_size(mut self) -> Self {
        self.size = None;
        self
    }

    /// The entry's base name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The entry's size in bytes.
    ///
    /// # Panics
    ///
    /// Panics if the size was withheld by a decorating store. Asking a
    /// compressed store for a size is a programming error, not a runtime
    /// condition.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
            .expect("size is not available through this store layer")
    }

    /// Unix permission bits of the entry.
    #[must_use]
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Last modification time of the entry.
    #[must_use]
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    /// Whether the entry is a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }
}

/// A byte stream being written into a store.
///
/// Closing is the durability point: data may not be observable (or may be
/// observable only partially) until [`close`](WriteCloser::close) returns
/// `Ok`. Dropping a writer without closing it abandons the stream in a
/// backend-defined state.
pub trait WriteCloser: Write + Send {
    /// Flushes any remaining state and durably commits the stream.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// A hierarchical store of named byte streams.
///
/// "Does not exist" is reported as [`io::ErrorKind::NotFound`] from every
/// operation that resolves a path.
pub trait StreamStore: Send + Sync {
    /// Describes the entry at `path`, following symlinks where the backend
    /// has them.
    fn stat(&self, path: &Path) -> io::Result<FileInfo>;

    /// Describes the entry at `path` without following symlinks.
    fn lstat(&self, path: &Path) -> io::Result<FileInfo>;

    /// Lists the directory at `path`, in ascending name order.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>>;

    /// Creates the directory at `path`. The parent must already exist.
    fn mkdir(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Removes the file or empty directory at `path`.
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Opens the stream at `path` for reading from the start.
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// Creates (or truncates) the stream at `path` and opens it for writing.
    fn create_write(&self, path: &Path) -> io::Result<Box<dyn WriteCloser>>;
}

/// Creates the directory at `path` together with any missing ancestors.
///
/// Existing directories along the way are accepted; an existing non-directory
/// entry is reported as [`io::ErrorKind::NotADirectory`].
pub fn mkdir_all(store: &dyn StreamStore, path: &Path, mode: u32) -> io::Result<()> {
    match store.stat(path) {
        Ok(info) if info.is_dir() => return Ok(()),
        Ok(info) => {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("'{}' exists and is not a directory", info.name()),
            ));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            mkdir_all(store, parent, mode)?;
        }
    }
    match store.mkdir(path, mode) {
        Ok(()) => Ok(()),
        // Lost a race against a concurrent creator; the directory is there.
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

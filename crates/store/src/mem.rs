//! In-memory store backend.
//!
//! The tree lives behind a single mutex; file contents live behind their own
//! per-file locks so readers and writers of one stream never hold the tree
//! lock. Files become visible at creation time and readers observe bytes as
//! writers append them, matching local-filesystem tail-read semantics.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::path::{Component, Path};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::SystemTime;

use crate::{FileInfo, StreamStore, WriteCloser};

/// An in-memory [`StreamStore`].
///
/// Cloning is cheap and clones share the same tree, so a producer and a
/// consumer on different threads can be handed "the same store".
#[derive(Clone, Default)]
pub struct MemStore {
    root: Arc<Mutex<Dir>>,
}

struct Dir {
    entries: BTreeMap<String, Node>,
    mode: u32,
    modified: SystemTime,
}

enum Node {
    Dir(Dir),
    File(Arc<MemFile>),
}

struct MemFile {
    mode: u32,
    data: RwLock<FileData>,
}

struct FileData {
    bytes: Vec<u8>,
    modified: SystemTime,
}

impl Default for Dir {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            mode: 0o755,
            modified: SystemTime::now(),
        }
    }
}

impl MemStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn components(path: &Path) -> io::Result<Vec<&str>> {
    let mut out = Vec::new();
    for comp in path.components() {
        match comp {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(os) => {
                let name = os.to_str().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "path is not valid UTF-8")
                })?;
                out.push(name);
            }
            Component::ParentDir | Component::Prefix(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "path may not contain '..' or a prefix component",
                ));
            }
        }
    }
    Ok(out)
}

fn not_found(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("'{name}' does not exist"))
}

fn not_a_directory(name: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotADirectory,
        format!("'{name}' is not a directory"),
    )
}

fn is_a_directory(name: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::IsADirectory,
        format!("'{name}' is a directory"),
    )
}

enum NodeRef<'a> {
    Dir(&'a Dir),
    File(&'a Arc<MemFile>),
}

fn walk<'a>(root: &'a Dir, comps: &[&str]) -> io::Result<NodeRef<'a>> {
    let mut cur = root;
    let mut comps = comps.iter();
    while let Some(name) = comps.next() {
        match cur.entries.get(*name) {
            Some(Node::Dir(d)) => cur = d,
            Some(Node::File(f)) => {
                return if comps.next().is_none() {
                    Ok(NodeRef::File(f))
                } else {
                    Err(not_a_directory(name))
                };
            }
            None => return Err(not_found(name)),
        }
    }
    Ok(NodeRef::Dir(cur))
}

fn walk_dir_mut<'a>(root: &'a mut Dir, comps: &[&str]) -> io::Result<&'a mut Dir> {
    let mut cur = root;
    for name in comps {
        match cur.entries.get_mut(*name) {
            Some(Node::Dir(d)) => cur = d,
            Some(Node::File(_)) => return Err(not_a_directory(name)),
            None => return Err(not_found(name)),
        }
    }
    Ok(cur)
}

fn file_info(name: &str, file: &MemFile) -> FileInfo {
    let data = file.data.read().unwrap_or_else(PoisonError::into_inner);
    FileInfo::new(name, data.bytes.len() as u64, file.mode, data.modified, false)
}

fn dir_info(name: &str, dir: &Dir) -> FileInfo {
    FileInfo::new(name, 0, dir.mode, dir.modified, true)
}

impl StreamStore for MemStore {
    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        let comps = components(path)?;
        let root = self.root.lock().unwrap_or_else(PoisonError::into_inner);
        let name = comps.last().copied().unwrap_or("/");
        match walk(&root, &comps)? {
            NodeRef::Dir(d) => Ok(dir_info(name, d)),
            NodeRef::File(f) => Ok(file_info(name, f)),
        }
    }

    fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        // No symlinks in the in-memory tree.
        self.stat(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        let comps = components(path)?;
        let root = self.root.lock().unwrap_or_else(PoisonError::into_inner);
        match walk(&root, &comps)? {
            NodeRef::File(_) => Err(not_a_directory(comps.last().copied().unwrap_or("/"))),
            NodeRef::Dir(d) => Ok(d
                .entries
                .iter()
                .map(|(name, node)| match node {
                    Node::Dir(d) => dir_info(name, d),
                    Node::File(f) => file_info(name, f),
                })
                .collect()),
        }
    }

    fn mkdir(&self, path: &Path, mode: u32) -> io::Result<()> {
        let comps = components(path)?;
        let Some((name, parents)) = comps.split_last() else {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "'/' already exists",
            ));
        };
        let mut root = self.root.lock().unwrap_or_else(PoisonError::into_inner);
        let parent = walk_dir_mut(&mut root, parents)?;
        if parent.entries.contains_key(*name) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("'{name}' already exists"),
            ));
        }
        parent.entries.insert(
            (*name).to_owned(),
            Node::Dir(Dir {
                entries: BTreeMap::new(),
                mode,
                modified: SystemTime::now(),
            }),
        );
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let comps = components(path)?;
        let Some((name, parents)) = comps.split_last() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot remove '/'",
            ));
        };
        let mut root = self.root.lock().unwrap_or_else(PoisonError::into_inner);
        let parent = walk_dir_mut(&mut root, parents)?;
        match parent.entries.get(*name) {
            None => return Err(not_found(name)),
            Some(Node::Dir(d)) if !d.entries.is_empty() => {
                return Err(io::Error::new(
                    io::ErrorKind::DirectoryNotEmpty,
                    format!("'{name}' is not empty"),
                ));
            }
            Some(_) => {}
        }
        parent.entries.remove(*name);
        Ok(())
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        let comps = components(path)?;
        let root = self.root.lock().unwrap_or_else(PoisonError::into_inner);
        match walk(&root, &comps)? {
            NodeRef::Dir(_) => Err(is_a_directory(comps.last().copied().unwrap_or("/"))),
            NodeRef::File(f) => Ok(Box::new(MemReader {
                file: Arc::clone(f),
                pos: 0,
            })),
        }
    }

    fn create_write(&self, path: &Path) -> io::Result<Box<dyn WriteCloser>> {
        let comps = components(path)?;
        let Some((name, parents)) = comps.split_last() else {
            return Err(is_a_directory("/"));
        };
        let mut root = self.root.lock().unwrap_or_else(PoisonError::into_inner);
        let parent = walk_dir_mut(&mut root, parents)?;
        if let Some(Node::Dir(_)) = parent.entries.get(*name) {
            return Err(is_a_directory(name));
        }
        let file = Arc::new(MemFile {
            mode: 0o644,
            data: RwLock::new(FileData {
                bytes: Vec::new(),
                modified: SystemTime::now(),
            }),
        });
        parent
            .entries
            .insert((*name).to_owned(), Node::File(Arc::clone(&file)));
        Ok(Box::new(MemWriter { file }))
    }
}

struct MemReader {
    file: Arc<MemFile>,
    pos: usize,
}

impl Read for MemReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.file.data.read().unwrap_or_else(PoisonError::into_inner);
        let Some(remaining) = data.bytes.len().checked_sub(self.pos).filter(|r| *r > 0) else {
            return Ok(0);
        };
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&data.bytes[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

struct MemWriter {
    file: Arc<MemFile>,
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut data = self
            .file
            .data
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        data.bytes.extend_from_slice(buf);
        data.modified = SystemTime::now();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl WriteCloser for MemWriter {
    fn close(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}

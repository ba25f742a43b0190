//! Local-filesystem store backend over [`std::fs`].

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::SystemTime;

use crate::{FileInfo, StreamStore, WriteCloser};

/// A [`StreamStore`] rooted in the local filesystem.
///
/// Paths given to store operations are used verbatim, so callers address
/// files exactly as they would with [`std::fs`].
#[derive(Clone, Copy, Debug, Default)]
pub struct FsStore;

impl FsStore {
    /// Creates a filesystem store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "/".to_owned(), |n| n.to_string_lossy().into_owned())
}

#[cfg(unix)]
fn mode_of(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn mode_of(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o555
    } else {
        0o755
    }
}

fn info_from(name: String, metadata: &fs::Metadata) -> FileInfo {
    FileInfo::new(
        name,
        metadata.len(),
        mode_of(metadata),
        metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        metadata.is_dir(),
    )
}

impl StreamStore for FsStore {
    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        let metadata = fs::metadata(path)?;
        Ok(info_from(entry_name(path), &metadata))
    }

    fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        let metadata = fs::symlink_metadata(path)?;
        Ok(info_from(entry_name(path), &metadata))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            entries.push(info_from(
                entry.file_name().to_string_lossy().into_owned(),
                &metadata,
            ));
        }
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(entries)
    }

    #[cfg(unix)]
    fn mkdir(&self, path: &Path, mode: u32) -> io::Result<()> {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().mode(mode).create(path)
    }

    #[cfg(not(unix))]
    fn mkdir(&self, path: &Path, _mode: u32) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        if fs::symlink_metadata(path)?.is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(path)?))
    }

    fn create_write(&self, path: &Path) -> io::Result<Box<dyn WriteCloser>> {
        Ok(Box::new(FsWriter {
            file: File::create(path)?,
        }))
    }
}

struct FsWriter {
    file: File,
}

impl Write for FsWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl WriteCloser for FsWriter {
    fn close(self: Box<Self>) -> io::Result<()> {
        self.file.sync_all()
    }
}

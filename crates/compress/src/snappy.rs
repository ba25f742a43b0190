//! Snappy frame-format layer over a stream store.

use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use snap::read::FrameDecoder;
use snap::write::FrameEncoder;
use store::{FileInfo, StreamStore, WriteCloser};

/// A [`StreamStore`] decorator that snappy-compresses every stream.
#[derive(Clone)]
pub struct SnappyStore {
    inner: Arc<dyn StreamStore>,
}

impl SnappyStore {
    /// Wraps `inner` with transparent snappy compression.
    pub fn new(inner: Arc<dyn StreamStore>) -> Self {
        Self { inner }
    }
}

impl StreamStore for SnappyStore {
    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        self.inner.stat(path).map(FileInfo::without_size)
    }

    fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        self.inner.lstat(path).map(FileInfo::without_size)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        self.inner.read_dir(path)
    }

    fn mkdir(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.inner.mkdir(path, mode)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.inner.remove(path)
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        let inner = self.inner.open_read(path)?;
        Ok(Box::new(FrameDecoder::new(inner)))
    }

    fn create_write(&self, path: &Path) -> io::Result<Box<dyn WriteCloser>> {
        let inner = self.inner.create_write(path)?;
        Ok(Box::new(SnappyWriter {
            encoder: FrameEncoder::new(inner),
        }))
    }
}

struct SnappyWriter {
    encoder: FrameEncoder<Box<dyn WriteCloser>>,
}

impl Write for SnappyWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

impl WriteCloser for SnappyWriter {
    fn close(self: Box<Self>) -> io::Result<()> {
        match self.encoder.into_inner() {
            Ok(inner) => inner.close(),
            // The pending frame could not be written; the inner writer is
            // released without committing and the frame error is surfaced.
            Err(e) => Err(io::Error::new(e.error().kind(), e.error().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::MemStore;

    fn decorated() -> (MemStore, SnappyStore) {
        let backend = MemStore::new();
        let store = SnappyStore::new(Arc::new(backend.clone()));
        (backend, store)
    }

    #[test]
    fn round_trips_through_the_decorator() {
        let (_, store) = decorated();
        let mut w = store.create_write(Path::new("/f")).unwrap();
        w.write_all(b"snappy payload").unwrap();
        w.close().unwrap();

        let mut buf = Vec::new();
        store
            .open_read(Path::new("/f"))
            .unwrap()
            .read_to_end(&mut buf)
            .unwrap();
        assert_eq!(buf, b"snappy payload");
    }

    #[test]
    fn bytes_at_rest_are_compressed() {
        let (backend, store) = decorated();
        let payload = vec![7u8; 4096];
        let mut w = store.create_write(Path::new("/f")).unwrap();
        w.write_all(&payload).unwrap();
        w.close().unwrap();

        let stored = backend.stat(Path::new("/f")).unwrap().size();
        assert!(stored > 0);
        assert!(stored < payload.len() as u64);
    }

    #[test]
    #[should_panic(expected = "size is not available")]
    fn stat_withholds_the_size() {
        let (_, store) = decorated();
        store.create_write(Path::new("/f")).unwrap().close().unwrap();
        let _ = store.stat(Path::new("/f")).unwrap().size();
    }

    #[test]
    fn directory_operations_pass_through() {
        let (backend, store) = decorated();
        store.mkdir(Path::new("/d"), 0o755).unwrap();
        assert!(backend.stat(Path::new("/d")).unwrap().is_dir());

        let names: Vec<_> = store
            .read_dir(Path::new("/"))
            .unwrap()
            .into_iter()
            .map(|e| e.name().to_owned())
            .collect();
        assert_eq!(names, ["d"]);
    }
}

//! Zstandard layer over a stream store.

use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use store::{FileInfo, StreamStore, WriteCloser};
use zstd::stream::read::Decoder as ZstdDecoder;
use zstd::stream::write::Encoder as ZstdEncoder;

// 0 selects the zstd library default level.
const LEVEL: i32 = 0;

/// A [`StreamStore`] decorator that zstd-compresses every stream.
#[derive(Clone)]
pub struct ZstdStore {
    inner: Arc<dyn StreamStore>,
}

impl ZstdStore {
    /// Wraps `inner` with transparent zstd compression.
    pub fn new(inner: Arc<dyn StreamStore>) -> Self {
        Self { inner }
    }
}

impl StreamStore for ZstdStore {
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
        Ok(Box::new(ZstdDecoder::new(inner)?))
    }

    fn create_write(&self, path: &Path) -> io::Result<Box<dyn WriteCloser>> {
        let inner = self.inner.create_write(path)?;
        Ok(Box::new(ZstdWriter {
            encoder: ZstdEncoder::new(inner, LEVEL)?,
        }))
    }
}

struct ZstdWriter {
    encoder: ZstdEncoder<'static, Box<dyn WriteCloser>>,
}

impl Write for ZstdWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

impl WriteCloser for ZstdWriter {
    fn close(self: Box<Self>) -> io::Result<()> {
        // finish writes the zstd epilogue; on failure the inner writer is
        // released without committing and the epilogue error is surfaced.
        let inner = self.encoder.finish()?;
        inner.close()
    }
}

//! The batch file format.
//!
//! A batch is a run of records, each a little-endian `u32` length followed
//! by that many payload bytes, terminated by a zero length. Nothing may
//! follow the terminator; a zero-length record is therefore unrepresentable
//! and the sink rejects empty messages.

use std::io::{self, Read, Write};
use std::path::PathBuf;

use store::WriteCloser;

use crate::error::SourceError;

/// The end-of-batch marker: a record length of zero.
const SENTINEL: [u8; 4] = [0, 0, 0, 0];

/// Writes records into one batch stream.
pub(crate) struct FrameWriter {
    inner: Box<dyn WriteCloser>,
}

impl FrameWriter {
    pub(crate) fn new(inner: Box<dyn WriteCloser>) -> Self {
        Self { inner }
    }

    /// Appends one record.
    pub(crate) fn write_frame(&mut self, payload: &[u8]) -> io::Result<()> {
        let len = u32::try_from(payload.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "message does not fit in a 32-bit record",
            )
        })?;
        self.inner.write_all(&len.to_le_bytes())?;
        self.inner.write_all(payload)
    }

    /// Terminates the batch and commits the stream.
    pub(crate) fn close(self) -> io::Result<()> {
        let Self { mut inner } = self;
        inner.write_all(&SENTINEL)?;
        inner.close()
    }
}

/// One step of reading a batch stream.
#[derive(Debug)]
pub(crate) enum ReadOutcome {
    /// A complete record payload.
    Frame(Vec<u8>),
    /// The terminator was read and the stream ended cleanly behind it.
    EndOfBatch,
    /// The stream ended cleanly where the next length prefix would start:
    /// the batch is still being written.
    Pending,
}

/// Reads records from one batch stream.
///
/// The reader tolerates a growing stream: a clean EOF in place of a length
/// prefix reports [`ReadOutcome::Pending`] and the next call resumes from
/// the same position.
pub(crate) struct FrameReader {
    inner: Box<dyn Read + Send>,
    path: PathBuf,
}

impl FrameReader {
    pub(crate) fn new(inner: Box<dyn Read + Send>, path: PathBuf) -> Self {
        Self { inner, path }
    }

    pub(crate) fn read_frame(&mut self) -> Result<ReadOutcome, SourceError> {
        let mut len_bytes = [0u8; 4];
        match read_until_eof(self.inner.as_mut(), &mut len_bytes) {
            Ok(0) => return Ok(ReadOutcome::Pending),
            Ok(n) if n == len_bytes.len() => {}
            Ok(_) => return Err(SourceError::ReadLength("unexpected EOF".to_owned())),
            Err(e) => return Err(SourceError::ReadLength(cause(&e))),
        }

        let len = u32::from_le_bytes(len_bytes);
        if len == 0 {
            return self.confirm_end_of_batch();
        }

        let mut payload = vec![0u8; len as usize];
        if let Err(e) = self.inner.read_exact(&mut payload) {
            return Err(SourceError::ReadPayload {
                path: self.path.display().to_string(),
                len,
                cause: cause(&e),
            });
        }
        Ok(ReadOutcome::Frame(payload))
    }

    /// After the terminator the stream must end; any further byte (or read
    /// failure) means the file was not produced by the sink.
    fn confirm_end_of_batch(&mut self) -> Result<ReadOutcome, SourceError> {
        let mut probe = [0u8; 1];
        loop {
            match self.inner.read(&mut probe) {
                Ok(0) => return Ok(ReadOutcome::EndOfBatch),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                _ => return Err(SourceError::ReadPastEndMarker),
            }
        }
    }
}

/// Fills `buf` from `r`, stopping early at EOF. Returns the bytes read.
fn read_until_eof<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Renders a read failure the way the diagnostics expect it.
fn cause(e: &io::Error) -> String {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        "unexpected EOF".to_owned()
    } else {
        e.to_string()
    }
}

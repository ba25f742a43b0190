//! Error types for the sink and source halves of the log.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::dirs::SequenceError;

/// Errors reported by [`MessageSink`](crate::MessageSink) and
/// [`MessageSinkAutoFlush`](crate::MessageSinkAutoFlush).
///
/// The sink's writer loop latches its exit error and every caller that
/// arrives after termination observes the same value, so the type is
/// cloneable; I/O causes are shared behind an [`Arc`].
#[derive(Clone, Debug, Error)]
pub enum SinkError {
    /// A zero-length message was put. The empty frame is the batch
    /// terminator on disk, so empty messages are unrepresentable.
    #[error("freezer does not support messages of 0 length")]
    ZeroLengthMessage,
    /// The sink was closed before (or while) the call was handled.
    #[error("already closed")]
    AlreadyClosed,
    /// Sequence discovery found a foreign entry on the log path.
    #[error("'{0}' is not a directory")]
    NotADirectory(String),
    /// The underlying store failed. The writer loop has terminated and
    /// every subsequent call reports this same error.
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),
}

impl From<io::Error> for SinkError {
    fn from(e: io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

impl From<SequenceError> for SinkError {
    fn from(e: SequenceError) -> Self {
        match e {
            SequenceError::NotADirectory(name) => Self::NotADirectory(name),
            SequenceError::Io(e) => Self::Io(Arc::new(e)),
        }
    }
}

/// Errors reported by
/// [`MessageSource::consume_messages`](crate::MessageSource::consume_messages).
#[derive(Debug, Error)]
pub enum SourceError {
    /// A record length prefix was cut short mid-batch.
    #[error("Could not read length ({0})")]
    ReadLength(String),
    /// A record payload was cut short.
    #[error("Could not read payload from {path}. Expected len was {len}. ({cause})")]
    ReadPayload {
        /// Batch file being read.
        path: String,
        /// Length announced by the record prefix.
        len: u32,
        /// Underlying read failure.
        cause: String,
    },
    /// Bytes follow the end-of-batch marker. The file was not produced by
    /// the sink, or was corrupted afterwards.
    #[error("Was able to read past end marker. This is broken, bailing out.")]
    ReadPastEndMarker,
    /// The underlying store failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The message handler rejected a message.
    #[error("{0}")]
    Handler(Box<dyn std::error::Error + Send + Sync>),
}

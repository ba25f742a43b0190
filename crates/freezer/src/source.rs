//! The replaying message source.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use store::StreamStore;
use tracing::trace;

use crate::cancel::CancelToken;
use crate::config::{DEFAULT_POLL_PERIOD, SourceConfig};
use crate::dirs::seq_to_path;
use crate::error::SourceError;
use crate::frame::{FrameReader, ReadOutcome};

/// The error type a message handler may fail with.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// An append-only message log consumer.
///
/// Replays every message under the log root in the order it was produced,
/// then keeps following the log as new batches appear.
pub struct MessageSource {
    store: Arc<dyn StreamStore>,
    path: PathBuf,
    poll_period: Duration,
}

impl MessageSource {
    /// Opens a source over `store` rooted at `config.path`.
    #[must_use]
    pub fn new(store: Arc<dyn StreamStore>, config: SourceConfig) -> Self {
        let SourceConfig {
            path,
            poll_period,
            compression,
        } = config;
        let poll_period = if poll_period.is_zero() {
            DEFAULT_POLL_PERIOD
        } else {
            poll_period
        };
        Self {
            store: compression.wrap(store),
            path,
            poll_period,
        }
    }

    /// Replays all messages from the start of the log, then tails it.
    ///
    /// `handler` is invoked once per message, in order. The call blocks
    /// until `cancel` fires during one of the poll sleeps (returning
    /// `Ok(())`), the handler fails, or the log turns out to be corrupt.
    /// Batches still being written are waited on, not treated as errors.
    ///
    /// Cancellation is only observed while waiting for data; a handler
    /// processing a long backlog of complete records will not notice it
    /// until the next wait.
    pub fn consume_messages<H>(
        &self,
        cancel: &CancelToken,
        mut handler: H,
    ) -> Result<(), SourceError>
    where
        H: FnMut(Vec<u8>) -> Result<(), HandlerError>,
    {
        let mut seq: u64 = 0;
        loop {
            let path = seq_to_path(&self.path, seq);
            let reader = loop {
                match self.store.open_read(&path) {
                    Ok(reader) => break reader,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        trace!(path = %path.display(), "batch file not present yet");
                        if cancel.sleep(self.poll_period) {
                            return Ok(());
                        }
                    }
                    Err(e) => return Err(e.into()),
                }
            };
            let mut frames = FrameReader::new(reader, path);
            loop {
                match frames.read_frame()? {
                    ReadOutcome::Pending => {
                        if cancel.sleep(self.poll_period) {
                            return Ok(());
                        }
                    }
                    ReadOutcome::Frame(payload) => {
                        handler(payload).map_err(SourceError::Handler)?;
                    }
                    ReadOutcome::EndOfBatch => break,
                }
            }
            trace!(seq, "batch complete, advancing");
            seq += 1;
        }
    }
}

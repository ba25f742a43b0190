//! The manually flushed message sink.
//!
//! One dedicated worker thread owns the currently open batch writer and
//! consumes put/flush/close requests from a channel. Callers block on a
//! per-request acknowledgement, so writes land on disk in exactly the order
//! the calls returned, without any locking around the writer.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use store::{StreamStore, mkdir_all};
use tracing::{debug, warn};

use crate::config::SinkConfig;
use crate::dirs::{next_sequence, seq_to_path};
use crate::error::SinkError;
use crate::frame::FrameWriter;

const DIR_MODE: u32 = 0o755;

/// Latches a worker loop's exit outcome.
///
/// The loop stores its result here before any request channel disconnects,
/// so a caller that observes a disconnect always finds the outcome latched.
pub(crate) struct ExitCell(OnceLock<Option<SinkError>>);

impl ExitCell {
    pub(crate) fn new() -> Self {
        Self(OnceLock::new())
    }

    /// Records the loop outcome. Only the first latch sticks.
    pub(crate) fn latch(&self, err: Option<SinkError>) {
        let _ = self.0.set(err);
    }

    /// The error a put/flush caller observes after termination.
    pub(crate) fn error(&self) -> SinkError {
        match self.0.get() {
            Some(Some(e)) => e.clone(),
            _ => SinkError::AlreadyClosed,
        }
    }

    /// The outcome reported by `close`.
    pub(crate) fn result(&self) -> Result<(), SinkError> {
        match self.0.get() {
            Some(Some(e)) => Err(e.clone()),
            _ => Ok(()),
        }
    }
}

enum Request {
    Put { payload: Vec<u8>, done: Sender<()> },
    Flush { done: Sender<()> },
    Close,
}

/// An append-only message log producer with manual flush control.
///
/// Messages put between two flushes land in one batch file; `flush` seals
/// the batch and the next put starts the next one. All methods may be
/// called concurrently from any thread.
pub struct MessageSink {
    reqs: Sender<Request>,
    exit: Arc<ExitCell>,
    close_called: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MessageSink {
    /// Opens a sink over `store` rooted at `config.path`.
    ///
    /// The root directory is created if absent, and the next batch sequence
    /// number is discovered from the files already present.
    pub fn new(store: Arc<dyn StreamStore>, config: SinkConfig) -> Result<Self, SinkError> {
        let SinkConfig { path, compression } = config;
        match store.stat(&path) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                mkdir_all(store.as_ref(), &path, DIR_MODE)?;
                store.stat(&path)?;
            }
            Err(e) => return Err(e.into()),
        }
        let store = compression.wrap(store);
        let next_seq = next_sequence(store.as_ref(), &path)?;

        let (reqs_tx, reqs_rx) = unbounded();
        let exit = Arc::new(ExitCell::new());
        let state = WriterLoop {
            store,
            root: path,
            next_seq,
            writer: None,
            written: 0,
        };
        let worker = {
            let exit = Arc::clone(&exit);
            thread::Builder::new()
                .name("freezer-sink".to_owned())
                .spawn(move || run(&exit, &reqs_rx, state))
                .map_err(SinkError::from)?
        };
        Ok(Self {
            reqs: reqs_tx,
            exit,
            close_called: AtomicBool::new(false),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Appends `message` to the current batch, opening one if needed.
    ///
    /// Blocks until the message has been handed to the store. Zero-length
    /// messages are rejected: the empty record is the batch terminator.
    pub fn put_message(&self, message: &[u8]) -> Result<(), SinkError> {
        if message.is_empty() {
            return Err(SinkError::ZeroLengthMessage);
        }
        self.request(|done| Request::Put {
            payload: message.to_vec(),
            done,
        })
    }

    /// Seals the current batch, if one is open, and advances the sequence.
    pub fn flush(&self) -> Result<(), SinkError> {
        self.request(|done| Request::Flush { done })
    }

    /// Seals the current batch and terminates the writer.
    ///
    /// Returns the writer's exit error if it terminated on a store failure.
    /// A second call reports [`SinkError::AlreadyClosed`].
    pub fn close(&self) -> Result<(), SinkError> {
        if self.close_called.swap(true, Ordering::SeqCst) {
            return Err(SinkError::AlreadyClosed);
        }
        let _ = self.reqs.send(Request::Close);
        self.join_worker();
        self.exit.result()
    }

    fn request(&self, make: impl FnOnce(Sender<()>) -> Request) -> Result<(), SinkError> {
        let (done_tx, done_rx) = bounded(1);
        if self.reqs.send(make(done_tx)).is_err() {
            return Err(self.exit.error());
        }
        match done_rx.recv() {
            Ok(()) => Ok(()),
            Err(_) => Err(self.exit.error()),
        }
    }

    fn join_worker(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for MessageSink {
    fn drop(&mut self) {
        if !self.close_called.swap(true, Ordering::SeqCst) {
            let _ = self.reqs.send(Request::Close);
            self.join_worker();
        }
    }
}

struct WriterLoop {
    store: Arc<dyn StreamStore>,
    root: PathBuf,
    next_seq: u64,
    writer: Option<FrameWriter>,
    written: u64,
}

impl WriterLoop {
    fn append(&mut self, payload: &[u8]) -> Result<(), SinkError> {
        match self.writer.as_mut() {
            Some(writer) => writer.write_frame(payload)?,
            None => {
                let path = seq_to_path(&self.root, self.next_seq);
                if let Some(parent) = path.parent() {
                    mkdir_all(self.store.as_ref(), parent, DIR_MODE)?;
                }
                debug!(path = %path.display(), seq = self.next_seq, "opening batch file");
                let mut writer = FrameWriter::new(self.store.create_write(&path)?);
                writer.write_frame(payload)?;
                self.writer = Some(writer);
                self.written = 0;
            }
        }
        self.written += 1;
        Ok(())
    }

    /// Seals the open batch. A flush with no open batch is a no-op.
    fn flush(&mut self) -> Result<(), SinkError> {
        if let Some(writer) = self.writer.take() {
            writer.close()?;
            debug!(seq = self.next_seq, messages = self.written, "sealed batch");
            self.next_seq += 1;
            self.written = 0;
        }
        Ok(())
    }
}

fn run(exit: &ExitCell, reqs: &Receiver<Request>, mut state: WriterLoop) {
    loop {
        let Ok(req) = reqs.recv() else {
            // The handle was dropped without close. Seal the batch anyway so
            // consumers are not left waiting on an unterminated file.
            let result = state.flush();
            if let Err(e) = &result {
                warn!(error = %e, "sink worker failed while sealing final batch");
            }
            exit.latch(result.err());
            return;
        };
        match req {
            Request::Put { payload, done } => {
                if let Err(e) = state.append(&payload) {
                    warn!(error = %e, "sink worker terminating");
                    exit.latch(Some(e));
                    return;
                }
                let _ = done.send(());
            }
            Request::Flush { done } => {
                if let Err(e) = state.flush() {
                    warn!(error = %e, "sink worker terminating");
                    exit.latch(Some(e));
                    return;
                }
                let _ = done.send(());
            }
            Request::Close => {
                let result = state.flush();
                if let Err(e) = &result {
                    warn!(error = %e, "sink worker failed while sealing final batch");
                }
                exit.latch(result.err());
                return;
            }
        }
    }
}

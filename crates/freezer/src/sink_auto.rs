//! Time- and count-based batching on top of the plain sink.
//!
//! The wrapper owns a [`MessageSink`] and runs its own loop: puts are
//! forwarded to the inner sink, and a countdown timer or a message-count
//! threshold decides when to issue the inner flush. Keeping the policy out
//! of the plain sink keeps both state machines small.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, after, bounded, never, select, unbounded};
use store::StreamStore;
use tracing::{debug, warn};

use crate::config::{AutoFlushConfig, DEFAULT_MAX_UNFLUSHED_TIME, SinkConfig};
use crate::error::SinkError;
use crate::sink::{ExitCell, MessageSink};

enum Request {
    Put { payload: Vec<u8>, done: Sender<()> },
    Close,
}

/// An append-only message log producer that flushes on its own.
///
/// Batches are sealed when the configured message count is reached or when
/// the oldest unflushed message has been pending for the configured time,
/// whichever comes first. There is no manual `flush`; close seals whatever
/// is outstanding.
pub struct MessageSinkAutoFlush {
    reqs: Sender<Request>,
    exit: Arc<ExitCell>,
    close_called: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MessageSinkAutoFlush {
    /// Opens an auto-flushing sink over `store` rooted at `config.path`.
    pub fn new(store: Arc<dyn StreamStore>, config: AutoFlushConfig) -> Result<Self, SinkError> {
        let AutoFlushConfig {
            path,
            max_unflushed_time,
            max_unflushed_messages,
            compression,
        } = config;
        let max_unflushed_time = if max_unflushed_time.is_zero() {
            DEFAULT_MAX_UNFLUSHED_TIME
        } else {
            max_unflushed_time
        };
        let inner = MessageSink::new(store, SinkConfig { path, compression })?;

        let (reqs_tx, reqs_rx) = unbounded();
        let exit = Arc::new(ExitCell::new());
        let worker = {
            let exit = Arc::clone(&exit);
            thread::Builder::new()
                .name("freezer-autoflush".to_owned())
                .spawn(move || {
                    run(
                        &exit,
                        &reqs_rx,
                        &inner,
                        max_unflushed_time,
                        max_unflushed_messages,
                    );
                    // The wrapper owns the inner sink; release its worker no
                    // matter how the loop above ended.
                    exit.latch(inner.close().err());
                })
                .map_err(SinkError::from)?
        };
        Ok(Self {
            reqs: reqs_tx,
            exit,
            close_called: AtomicBool::new(false),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Appends `message`, flushing afterwards if a threshold is reached.
    ///
    /// Blocks until the inner sink has accepted the message. Zero-length
    /// messages are rejected: the empty record is the batch terminator.
    pub fn put_message(&self, message: &[u8]) -> Result<(), SinkError> {
        if message.is_empty() {
            return Err(SinkError::ZeroLengthMessage);
        }
        let (done_tx, done_rx) = bounded(1);
        let req = Request::Put {
            payload: message.to_vec(),
            done: done_tx,
        };
        if self.reqs.send(req).is_err() {
            return Err(self.exit.error());
        }
        match done_rx.recv() {
            Ok(()) => Ok(()),
            Err(_) => Err(self.exit.error()),
        }
    }

    /// Seals any outstanding batch and terminates both loops.
    ///
    /// Returns the exit error if either loop terminated on a store failure.
    /// A second call reports [`SinkError::AlreadyClosed`].
    pub fn close(&self) -> Result<(), SinkError> {
        if self.close_called.swap(true, Ordering::SeqCst) {
            return Err(SinkError::AlreadyClosed);
        }
        let _ = self.reqs.send(Request::Close);
        self.join_worker();
        self.exit.result()
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

impl Drop for MessageSinkAutoFlush {
    fn drop(&mut self) {
        if !self.close_called.swap(true, Ordering::SeqCst) {
            let _ = self.reqs.send(Request::Close);
            self.join_worker();
        }
    }
}

fn run(
    exit: &ExitCell,
    reqs: &Receiver<Request>,
    inner: &MessageSink,
    max_unflushed_time: Duration,
    max_unflushed_messages: u64,
) {
    let mut unflushed: u64 = 0;
    let mut timer: Option<Receiver<Instant>> = None;
    let disarmed = never::<Instant>();
    loop {
        let mut flush_needed = false;
        let timer_rx = timer.clone().unwrap_or_else(|| disarmed.clone());
        select! {
            recv(reqs) -> req => {
                match req {
                    Ok(Request::Put { payload, done }) => {
                        if let Err(e) = inner.put_message(&payload) {
                            warn!(error = %e, "auto-flush worker terminating");
                            exit.latch(Some(e));
                            return;
                        }
                        let _ = done.send(());
                        unflushed += 1;
                        if unflushed == max_unflushed_messages {
                            flush_needed = true;
                        } else if timer.is_none() {
                            timer = Some(after(max_unflushed_time));
                        }
                    }
                    Ok(Request::Close) | Err(_) => {
                        if unflushed > 0 {
                            if let Err(e) = inner.flush() {
                                warn!(error = %e, "auto-flush worker failed to seal final batch");
                                exit.latch(Some(e));
                            }
                        }
                        return;
                    }
                }
            }
            recv(timer_rx) -> _ => {
                debug!(messages = unflushed, "flush timer fired");
                timer = None;
                flush_needed = true;
            }
        }
        if flush_needed {
            if let Err(e) = inner.flush() {
                warn!(error = %e, "auto-flush worker terminating");
                exit.latch(Some(e));
                return;
            }
            unflushed = 0;
            timer = None;
        }
    }
}

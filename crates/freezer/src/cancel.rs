//! Cooperative cancellation for blocking consumers.
//!
//! [`MessageSource::consume_messages`](crate::MessageSource::consume_messages)
//! blocks indefinitely while waiting for data, so callers hand it a
//! [`CancelToken`] and observe cancellation at the documented wait points.
//! Cancelling — whether by hand or by deadline — is a normal shutdown, not
//! an error.

use std::cell::Cell;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};

/// Cancels the paired [`CancelToken`], either explicitly or when dropped.
#[derive(Debug)]
pub struct Canceller {
    // Cancellation is the disconnect observed by the receiving side when
    // this sender drops; nothing is ever sent.
    _tx: Sender<()>,
}

impl Canceller {
    /// Cancels the paired token.
    pub fn cancel(self) {
        drop(self);
    }
}

/// A cancellation signal observed by blocking loops.
#[derive(Debug)]
pub struct CancelToken {
    kind: Kind,
}

#[derive(Debug)]
enum Kind {
    Never,
    Manual(Receiver<()>),
    Deadline {
        rx: Receiver<Instant>,
        fired: Cell<bool>,
    },
}

impl CancelToken {
    /// A token that is never cancelled.
    #[must_use]
    pub fn never() -> Self {
        Self { kind: Kind::Never }
    }

    /// A token that cancels itself once `deadline` has elapsed.
    #[must_use]
    pub fn after(deadline: Duration) -> Self {
        Self {
            kind: Kind::Deadline {
                rx: crossbeam_channel::after(deadline),
                fired: Cell::new(false),
            },
        }
    }

    /// A token cancelled by its paired [`Canceller`].
    #[must_use]
    pub fn manual() -> (Canceller, Self) {
        let (tx, rx) = bounded(0);
        (
            Canceller { _tx: tx },
            Self {
                kind: Kind::Manual(rx),
            },
        )
    }

    /// Whether the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match &self.kind {
            Kind::Never => false,
            Kind::Manual(rx) => matches!(rx.try_recv(), Err(TryRecvError::Disconnected)),
            Kind::Deadline { rx, fired } => {
                if rx.try_recv().is_ok() {
                    fired.set(true);
                }
                fired.get()
            }
        }
    }

    /// Sleeps for `period`, waking early on cancellation.
    ///
    /// Returns `true` when the token was (or became) cancelled.
    #[must_use]
    pub fn sleep(&self, period: Duration) -> bool {
        match &self.kind {
            Kind::Never => {
                thread::sleep(period);
                false
            }
            Kind::Manual(rx) => {
                matches!(rx.recv_timeout(period), Err(RecvTimeoutError::Disconnected))
            }
            Kind::Deadline { rx, fired } => {
                if fired.get() {
                    return true;
                }
                if rx.recv_timeout(period).is_ok() {
                    fired.set(true);
                }
                fired.get()
            }
        }
    }
}

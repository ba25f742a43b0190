#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `freezer` is an append-only message log over a hierarchical stream store.
//! Producers push opaque byte-string messages through a [`MessageSink`] (or
//! its self-flushing sibling [`MessageSinkAutoFlush`]); consumers replay the
//! whole log in production order through a [`MessageSource`] and keep
//! following it as new data lands. The log is a densely numbered run of
//! immutable batch files below a single root directory, so it works the
//! same over the bundled filesystem and in-memory backends or any other
//! [`store::StreamStore`] implementation.
//!
//! # Design
//!
//! Each batch file is a run of length-prefixed records closed by a zero
//! sentinel; a flush seals the current file and the next message starts the
//! next one. Sequence numbers render as seven two-digit path components
//! (see [`dirs::seq_to_path`]), which keeps directory fan-out at 100 per
//! level however long the log grows, and lets [`dirs::next_sequence`]
//! rediscover the write position at startup by descending the tree.
//!
//! Every sink owns one dedicated writer thread fed over a channel, which
//! serialises concurrent producers without locks and gives each of them a
//! synchronous, in-order acknowledgement. The source runs on its caller's
//! thread and polls — for the next file, or for more bytes in a file still
//! being written — observing a [`CancelToken`] while it waits.
//!
//! Transparent per-file compression comes from the `compress` crate's store
//! decorators and is selected with [`Compression`]; both ends of a log must
//! use the same setting.
//!
//! # Invariants
//!
//! - A consumer sees exactly the flushed messages, in put order, with no
//!   duplicates, gaps, or framing errors, even while a producer is mid-batch.
//! - Batch files, once sealed, are never modified.
//! - Zero-length messages are rejected; the empty record is the terminator.
//! - A sink that hit a store error reports that same error from every
//!   subsequent call.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use freezer::{CancelToken, MessageSink, MessageSource, SinkConfig, SourceConfig};
//! use store::MemStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mem = MemStore::new();
//!
//! let sink = MessageSink::new(Arc::new(mem.clone()), SinkConfig::new("/logs/events"))?;
//! sink.put_message(b"first")?;
//! sink.put_message(b"second")?;
//! sink.close()?;
//!
//! let source = MessageSource::new(Arc::new(mem), SourceConfig::new("/logs/events"));
//! let mut seen = Vec::new();
//! source.consume_messages(&CancelToken::after(Duration::from_millis(50)), |m| {
//!     seen.push(m);
//!     Ok(())
//! })?;
//! assert_eq!(seen, vec![b"first".to_vec(), b"second".to_vec()]);
//! # Ok(())
//! # }
//! ```
//!
//! # See also
//!
//! - [`store`] for the stream-store contract and the bundled backends.
//! - [`compress`] for the snappy and zstd store decorators used by
//!   [`Compression`].

pub mod cancel;
pub mod config;
pub mod dirs;
mod error;
mod frame;
mod sink;
mod sink_auto;
mod source;

pub use cancel::{CancelToken, Canceller};
pub use config::{
    AutoFlushConfig, Compression, DEFAULT_MAX_UNFLUSHED_TIME, DEFAULT_POLL_PERIOD, SinkConfig,
    SourceConfig,
};
pub use error::{SinkError, SourceError};
pub use sink::MessageSink;
pub use sink_auto::MessageSinkAutoFlush;
pub use source::{HandlerError, MessageSource};

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `compress` provides transparent compression layers for the stream-store
//! contract defined in the [`store`] crate. Each layer wraps an inner
//! [`store::StreamStore`] and implements the same trait, compressing streams
//! created through [`store::StreamStore::create_write`] and decompressing
//! streams opened through [`store::StreamStore::open_read`]. Code written
//! against the contract keeps working unchanged when a layer is slipped in
//! between it and the backend.
//!
//! # Design
//!
//! The [`snappy`] and [`zstd`] modules wrap the streaming encoders and
//! decoders of [`snap`](https://docs.rs/snap) and
//! [`zstd`](https://docs.rs/zstd) respectively. Closing a decorated writer
//! finishes the codec stream first and only then closes the inner writer, so
//! a truncated trailer is always surfaced to the caller; when both steps
//! fail, the trailer error wins.
//!
//! # Invariants
//!
//! - Reads are strictly streaming. The decorated reader exposes no seeking
//!   surface, so random access is impossible by construction.
//! - `stat` and `lstat` results carry no size: the inner store only knows
//!   the compressed size, which would be wrong to report. Asking for it
//!   panics (see [`store::FileInfo::size`]).
//! - Directory operations, `read_dir` and `remove` pass through unmodified.
//!
//! # Examples
//!
//! ```
//! use std::io::{Read, Write};
//! use std::path::Path;
//! use std::sync::Arc;
//! use compress::snappy::SnappyStore;
//! use store::{MemStore, StreamStore};
//!
//! # fn main() -> std::io::Result<()> {
//! let store = SnappyStore::new(Arc::new(MemStore::new()));
//! let mut w = store.create_write(Path::new("/data"))?;
//! w.write_all(b"compressed transparently")?;
//! w.close()?;
//!
//! let mut buf = Vec::new();
//! store.open_read(Path::new("/data"))?.read_to_end(&mut buf)?;
//! assert_eq!(buf, b"compressed transparently");
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "snappy")]
pub mod snappy;
#[cfg(feature = "zstd")]
pub mod zstd;

#[cfg(feature = "snappy")]
pub use snappy::SnappyStore;
#[cfg(feature = "zstd")]
pub use zstd::ZstdStore;

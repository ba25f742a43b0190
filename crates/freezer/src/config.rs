//! Configuration for sinks and sources.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use store::StreamStore;

/// Time a batch may stay open before an auto-flushing sink flushes it.
pub const DEFAULT_MAX_UNFLUSHED_TIME: Duration = Duration::from_secs(10);

/// Interval at which a source re-checks for data that does not exist yet.
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_secs(5);

/// Compression applied transparently to every batch file.
///
/// The selected codec wraps the store handed to the sink or source; both
/// sides of a log must agree on it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Compression {
    /// Batch files are stored as written.
    #[default]
    None,
    /// Snappy frame format.
    Snappy,
    /// Zstandard.
    Zstd,
}

impl Compression {
    pub(crate) fn wrap(self, store: Arc<dyn StreamStore>) -> Arc<dyn StreamStore> {
        match self {
            Self::None => store,
            Self::Snappy => Arc::new(compress::SnappyStore::new(store)),
            Self::Zstd => Arc::new(compress::ZstdStore::new(store)),
        }
    }
}

/// Configuration for a manually flushed [`MessageSink`](crate::MessageSink).
#[derive(Clone, Debug)]
pub struct SinkConfig {
    /// Log root directory. Created (with ancestors) if absent.
    pub path: PathBuf,
    /// Compression codec for batch files.
    pub compression: Compression,
}

impl SinkConfig {
    /// Configuration for a log rooted at `path` with the default settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            compression: Compression::None,
        }
    }
}

/// Configuration for an auto-flushing
/// [`MessageSinkAutoFlush`](crate::MessageSinkAutoFlush).
#[derive(Clone, Debug)]
pub struct AutoFlushConfig {
    /// Log root directory. Created (with ancestors) if absent.
    pub path: PathBuf,
    /// Longest time a batch may stay open once it holds a message. A zero
    /// duration selects [`DEFAULT_MAX_UNFLUSHED_TIME`].
    pub max_unflushed_time: Duration,
    /// Flush after this many messages. Zero disables the count threshold.
    pub max_unflushed_messages: u64,
    /// Compression codec for batch files.
    pub compression: Compression,
}

impl AutoFlushConfig {
    /// Configuration for a log rooted at `path` with the default settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_unflushed_time: DEFAULT_MAX_UNFLUSHED_TIME,
            max_unflushed_messages: 0,
            compression: Compression::None,
        }
    }
}

/// Configuration for a [`MessageSource`](crate::MessageSource).
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Log root directory.
    pub path: PathBuf,
    /// Sleep between polls for a batch file (or batch data) that does not
    /// exist yet. A zero duration selects [`DEFAULT_POLL_PERIOD`].
    pub poll_period: Duration,
    /// Compression codec the log was written with.
    pub compression: Compression,
}

impl SourceConfig {
    /// Configuration for a log rooted at `path` with the default settings.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_period: DEFAULT_POLL_PERIOD,
            compression: Compression::None,
        }
    }
}

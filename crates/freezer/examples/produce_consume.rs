//! Writes a handful of messages into a log under a scratch directory, then
//! replays them.
//!
//! Run with `RUST_LOG=freezer=debug` to watch the sink and source loops.

use std::sync::Arc;
use std::time::Duration;

use freezer::{AutoFlushConfig, CancelToken, MessageSinkAutoFlush, MessageSource, SourceConfig};
use store::FsStore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let scratch = tempfile::tempdir()?;
    let root = scratch.path().join("log");

    let sink = MessageSinkAutoFlush::new(
        Arc::new(FsStore::new()),
        AutoFlushConfig {
            max_unflushed_messages: 2,
            ..AutoFlushConfig::new(&root)
        },
    )?;
    for i in 0..5 {
        sink.put_message(format!("hello number {i}").as_bytes())?;
    }
    sink.close()?;

    let source = MessageSource::new(
        Arc::new(FsStore::new()),
        SourceConfig {
            poll_period: Duration::from_millis(100),
            ..SourceConfig::new(&root)
        },
    );
    source.consume_messages(&CancelToken::after(Duration::from_millis(500)), |m| {
        println!("message is: {}", String::from_utf8_lossy(&m));
        Ok(())
    })?;
    Ok(())
}

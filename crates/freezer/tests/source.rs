//! Source behaviour: corruption detection, tail following, cancellation.

use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use freezer::{CancelToken, MessageSink, MessageSource, SinkConfig, SourceConfig, SourceError};
use store::{FileInfo, MemStore, StreamStore, WriteCloser};

/// A store that serves the same fixed bytes for every open, standing in for
/// a single hand-crafted batch file.
struct FixedStore {
    bytes: Vec<u8>,
}

impl StreamStore for FixedStore {
    fn stat(&self, _path: &Path) -> io::Result<FileInfo> {
        unimplemented!("not used by the source")
    }

    fn lstat(&self, _path: &Path) -> io::Result<FileInfo> {
        unimplemented!("not used by the source")
    }

    fn read_dir(&self, _path: &Path) -> io::Result<Vec<FileInfo>> {
        unimplemented!("not used by the source")
    }

    fn mkdir(&self, _path: &Path, _mode: u32) -> io::Result<()> {
        unimplemented!("not used by the source")
    }

    fn remove(&self, _path: &Path) -> io::Result<()> {
        unimplemented!("not used by the source")
    }

    fn open_read(&self, _path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.bytes.clone())))
    }

    fn create_write(&self, _path: &Path) -> io::Result<Box<dyn WriteCloser>> {
        unimplemented!("not used by the source")
    }
}

const SENTINEL: [u8; 4] = [0, 0, 0, 0];

fn length(len: usize) -> Vec<u8> {
    u32::try_from(len).unwrap().to_le_bytes().to_vec()
}

fn consume_fixed(bytes: Vec<u8>) -> Result<(), SourceError> {
    let source = MessageSource::new(
        Arc::new(FixedStore { bytes }),
        SourceConfig::new("/foo/bar/baz"),
    );
    source.consume_messages(&CancelToken::never(), |_| Ok(()))
}

#[test]
fn trailing_garbage_after_the_end_marker_is_fatal() {
    let mut bytes = SENTINEL.to_vec();
    bytes.extend_from_slice(b"trailing stuff");
    assert_eq!(
        consume_fixed(bytes).unwrap_err().to_string(),
        "Was able to read past end marker. This is broken, bailing out."
    );
}

#[test]
fn overlong_record_length_is_fatal() {
    let payload = b"payload";
    let mut bytes = length(payload.len() + 1);
    bytes.extend_from_slice(payload);
    bytes.extend_from_slice(&SENTINEL);
    assert_eq!(
        consume_fixed(bytes).unwrap_err().to_string(),
        "Could not read length (unexpected EOF)"
    );
}

#[test]
fn truncated_length_prefix_is_fatal() {
    assert_eq!(
        consume_fixed(vec![0, 0]).unwrap_err().to_string(),
        "Could not read length (unexpected EOF)"
    );
}

#[test]
fn truncated_payload_is_fatal_and_names_the_file() {
    let mut bytes = length(7);
    bytes.extend_from_slice(b"short");
    assert_eq!(
        consume_fixed(bytes).unwrap_err().to_string(),
        "Could not read payload from /foo/bar/baz/00/00/00/00/00/00/00. \
         Expected len was 7. (unexpected EOF)"
    );
}

#[test]
fn follows_a_log_that_starts_empty() {
    let store = MemStore::new();
    let source_store = store.clone();
    let (messages_tx, messages_rx) = mpsc::channel();
    let (canceller, token) = CancelToken::manual();

    let consumer = thread::spawn(move || {
        let source = MessageSource::new(
            Arc::new(source_store),
            SourceConfig {
                poll_period: Duration::from_millis(10),
                ..SourceConfig::new("/log")
            },
        );
        source.consume_messages(&token, move |m| {
            messages_tx.send(m).unwrap();
            Ok(())
        })
    });

    let sink = MessageSink::new(Arc::new(store), SinkConfig::new("/log")).unwrap();
    sink.put_message(b"fresh").unwrap();
    sink.flush().unwrap();

    let first = messages_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("message arrives within a few poll periods");
    assert_eq!(first, b"fresh");

    canceller.cancel();
    consumer
        .join()
        .unwrap()
        .expect("cancellation is a clean shutdown");
    sink.close().unwrap();
}

#[test]
fn cancellation_during_a_half_written_batch_is_clean() {
    let store = MemStore::new();

    // One complete record, no end marker: the batch looks still-in-progress.
    store.mkdir(Path::new("/log"), 0o755).unwrap();
    let path = freezer::dirs::seq_to_path(Path::new("/log"), 0);
    store::mkdir_all(&store, path.parent().unwrap(), 0o755).unwrap();
    let mut w = store.create_write(&path).unwrap();
    w.write_all(&length(3)).unwrap();
    w.write_all(b"abc").unwrap();
    w.close().unwrap();

    let (canceller, token) = CancelToken::manual();
    let (seen_tx, seen_rx) = mpsc::channel();
    let consumer = thread::spawn(move || {
        let source = MessageSource::new(
            Arc::new(store),
            SourceConfig {
                poll_period: Duration::from_millis(10),
                ..SourceConfig::new("/log")
            },
        );
        source.consume_messages(&token, move |m| {
            seen_tx.send(m).unwrap();
            Ok(())
        })
    });

    // The record before the gap is delivered, then the source polls.
    assert_eq!(
        seen_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        b"abc"
    );
    canceller.cancel();
    consumer
        .join()
        .unwrap()
        .expect("mid-batch cancellation returns cleanly");
}

#[test]
fn deadline_during_the_file_wait_is_clean() {
    let store = MemStore::new();
    store.mkdir(Path::new("/log"), 0o755).unwrap();
    let source = MessageSource::new(
        Arc::new(store),
        SourceConfig {
            poll_period: Duration::from_millis(5),
            ..SourceConfig::new("/log")
        },
    );
    source
        .consume_messages(&CancelToken::after(Duration::from_millis(40)), |_| Ok(()))
        .expect("deadline expiry is a clean shutdown");
}

#[test]
fn handler_errors_abort_the_consumer() {
    let store = MemStore::new();
    let sink = MessageSink::new(Arc::new(store.clone()), SinkConfig::new("/log")).unwrap();
    sink.put_message(b"poison").unwrap();
    sink.close().unwrap();

    let source = MessageSource::new(Arc::new(store), SourceConfig::new("/log"));
    let err = source
        .consume_messages(&CancelToken::never(), |_| Err("handler rejected it".into()))
        .unwrap_err();
    assert!(matches!(err, SourceError::Handler(_)));
    assert_eq!(err.to_string(), "handler rejected it");
}

//! Sink behaviour: directory bootstrap, flush policies, lifecycle errors.

use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use freezer::{AutoFlushConfig, MessageSink, MessageSinkAutoFlush, SinkConfig, SinkError};
use store::{FileInfo, MemStore, StreamStore, WriteCloser};

fn batch_names(store: &MemStore, dir: &str) -> Vec<String> {
    store
        .read_dir(Path::new(dir))
        .expect("leaf directory exists")
        .into_iter()
        .map(|e| e.name().to_owned())
        .collect()
}

#[test]
fn sink_creates_the_log_root() {
    let store = MemStore::new();
    let sink = MessageSinkAutoFlush::new(
        Arc::new(store.clone()),
        AutoFlushConfig::new("/foo/bar/baz"),
    )
    .expect("sink opens");
    sink.close().expect("clean close");

    let info = store.stat(Path::new("/foo/bar/baz")).expect("root exists");
    assert!(info.is_dir());
    assert_eq!(info.name(), "baz");
}

#[test]
fn flushes_when_the_unflushed_time_expires() {
    let store = MemStore::new();
    let sink = MessageSinkAutoFlush::new(
        Arc::new(store.clone()),
        AutoFlushConfig {
            max_unflushed_time: Duration::from_millis(5),
            ..AutoFlushConfig::new("/foo/")
        },
    )
    .expect("sink opens");

    sink.put_message(&[1]).unwrap();
    thread::sleep(Duration::from_millis(7));
    sink.put_message(&[2]).unwrap();
    sink.close().unwrap();

    assert_eq!(batch_names(&store, "/foo/00/00/00/00/00/00"), ["00", "01"]);
}

#[test]
fn flushes_when_the_message_count_is_reached() {
    let store = MemStore::new();
    let sink = MessageSinkAutoFlush::new(
        Arc::new(store.clone()),
        AutoFlushConfig {
            max_unflushed_time: Duration::from_secs(5),
            max_unflushed_messages: 1,
            ..AutoFlushConfig::new("/foo/")
        },
    )
    .expect("sink opens");

    sink.put_message(&[1]).unwrap();
    sink.put_message(&[2]).unwrap();
    sink.close().unwrap();

    assert_eq!(batch_names(&store, "/foo/00/00/00/00/00/00"), ["00", "01"]);
}

#[test]
fn rejects_zero_length_messages_without_touching_the_store() {
    let store = MemStore::new();
    let sink = MessageSink::new(Arc::new(store.clone()), SinkConfig::new("/log")).unwrap();

    let err = sink.put_message(&[]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "freezer does not support messages of 0 length"
    );
    assert!(batch_names(&store, "/log").is_empty());

    // The sink is still healthy afterwards.
    sink.put_message(&[1]).unwrap();
    sink.close().unwrap();
}

#[test]
fn auto_flush_sink_also_rejects_zero_length_messages() {
    let store = MemStore::new();
    let sink =
        MessageSinkAutoFlush::new(Arc::new(store), AutoFlushConfig::new("/log")).unwrap();

    let err = sink.put_message(&[]).unwrap_err();
    assert!(matches!(err, SinkError::ZeroLengthMessage));

    sink.put_message(&[1]).unwrap();
    sink.close().unwrap();
}

#[test]
fn flush_without_an_open_batch_is_a_no_op() {
    let store = MemStore::new();
    let sink = MessageSink::new(Arc::new(store.clone()), SinkConfig::new("/log")).unwrap();

    sink.flush().expect("no-op flush");
    sink.close().unwrap();

    assert!(batch_names(&store, "/log").is_empty());
}

#[test]
fn manual_flush_seals_one_batch_per_window() {
    let store = MemStore::new();
    let sink = MessageSink::new(Arc::new(store.clone()), SinkConfig::new("/log")).unwrap();

    sink.put_message(b"a").unwrap();
    sink.put_message(b"b").unwrap();
    sink.flush().unwrap();
    sink.put_message(b"c").unwrap();
    sink.close().unwrap();

    assert_eq!(batch_names(&store, "/log/00/00/00/00/00/00"), ["00", "01"]);
}

#[test]
fn resumes_numbering_after_the_existing_log() {
    let store = MemStore::new();

    let sink = MessageSink::new(Arc::new(store.clone()), SinkConfig::new("/log")).unwrap();
    sink.put_message(b"one").unwrap();
    sink.close().unwrap();

    // A fresh sink over the same root continues at the next sequence.
    let sink = MessageSink::new(Arc::new(store.clone()), SinkConfig::new("/log")).unwrap();
    sink.put_message(b"two").unwrap();
    sink.close().unwrap();

    assert_eq!(batch_names(&store, "/log/00/00/00/00/00/00"), ["00", "01"]);
}

#[test]
fn second_close_reports_already_closed() {
    let store = MemStore::new();
    let sink = MessageSink::new(Arc::new(store), SinkConfig::new("/log")).unwrap();

    sink.close().expect("first close succeeds");
    let err = sink.close().unwrap_err();
    assert_eq!(err.to_string(), "already closed");
}

#[test]
fn put_after_close_reports_already_closed() {
    let store = MemStore::new();
    let sink = MessageSink::new(Arc::new(store), SinkConfig::new("/log")).unwrap();

    sink.close().unwrap();
    assert!(matches!(
        sink.put_message(b"late").unwrap_err(),
        SinkError::AlreadyClosed
    ));
    assert!(matches!(sink.flush().unwrap_err(), SinkError::AlreadyClosed));
}

/// A store whose stream creation always fails, for exercising the latched
/// exit error.
struct BrokenStore {
    inner: MemStore,
}

impl StreamStore for BrokenStore {
    fn stat(&self, path: &Path) -> io::Result<FileInfo> {
        self.inner.stat(path)
    }

    fn lstat(&self, path: &Path) -> io::Result<FileInfo> {
        self.inner.lstat(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<FileInfo>> {
        self.inner.read_dir(path)
    }

    fn mkdir(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.inner.mkdir(path, mode)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.inner.remove(path)
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        self.inner.open_read(path)
    }

    fn create_write(&self, _path: &Path) -> io::Result<Box<dyn WriteCloser>> {
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "store is read-only",
        ))
    }
}

#[test]
fn store_errors_latch_and_repeat_for_every_caller() {
    let store = BrokenStore {
        inner: MemStore::new(),
    };
    let sink = MessageSink::new(Arc::new(store), SinkConfig::new("/log")).unwrap();

    let first = sink.put_message(b"doomed").unwrap_err();
    assert!(matches!(first, SinkError::Io(_)));
    assert!(first.to_string().contains("store is read-only"));

    // Every later call observes the same latched error.
    let again = sink.flush().unwrap_err();
    assert_eq!(again.to_string(), first.to_string());
    let on_close = sink.close().unwrap_err();
    assert_eq!(on_close.to_string(), first.to_string());

    // Only a repeated close reports the lifecycle error.
    assert!(matches!(sink.close().unwrap_err(), SinkError::AlreadyClosed));
}

#[test]
fn concurrent_producers_all_land_in_the_log() {
    let store = MemStore::new();
    let sink = Arc::new(
        MessageSink::new(Arc::new(store.clone()), SinkConfig::new("/log")).unwrap(),
    );

    let mut handles = Vec::new();
    for t in 0..4u8 {
        let sink = Arc::clone(&sink);
        handles.push(thread::spawn(move || {
            for i in 0..25u8 {
                sink.put_message(&[t, i]).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    sink.close().unwrap();

    // 100 records of 2 bytes, each with a 4-byte prefix, plus the sentinel.
    let size = store
        .stat(Path::new("/log/00/00/00/00/00/00/00"))
        .unwrap()
        .size();
    assert_eq!(size, 100 * 6 + 4);
}

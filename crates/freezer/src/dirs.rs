//! Sequence-number addressing.
//!
//! A log is a dense run of batch files numbered from 0. Each sequence number
//! is rendered as a 14-digit decimal split into seven two-digit path
//! components, which bounds directory fan-out to 100 entries per level no
//! matter how long the log grows.

use std::io;
use std::path::{Path, PathBuf};

use store::StreamStore;
use thiserror::Error;

/// Number of two-digit components in a rendered sequence path.
const LEVELS: usize = 7;

/// Errors from [`next_sequence`] discovery.
#[derive(Debug, Error)]
pub enum SequenceError {
    /// An entry on the sequence path is not a directory. The log root is
    /// expected to contain nothing but the sink's nested layout.
    #[error("'{0}' is not a directory")]
    NotADirectory(String),
    /// The underlying store failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Renders `seq` as a nested path below `root`.
///
/// `seq` is formatted as a zero-padded 14-digit decimal and split into seven
/// two-digit components, so sequence numbers up to 10^14 - 1 are
/// addressable:
///
/// ```
/// use std::path::{Path, PathBuf};
/// use freezer::dirs::seq_to_path;
///
/// assert_eq!(
///     seq_to_path(Path::new("/foo"), 1),
///     PathBuf::from("/foo/00/00/00/00/00/00/01"),
/// );
/// ```
#[must_use]
pub fn seq_to_path(root: &Path, seq: u64) -> PathBuf {
    let digits = format!("{seq:014}");
    let mut path = root.to_path_buf();
    for level in 0..LEVELS {
        path.push(&digits[level * 2..level * 2 + 2]);
    }
    path
}

fn two_digit_value(name: &str) -> Option<u64> {
    let &[a, b] = name.as_bytes() else {
        return None;
    };
    if a.is_ascii_digit() && b.is_ascii_digit() {
        Some(u64::from(a - b'0') * 10 + u64::from(b - b'0'))
    } else {
        None
    }
}

/// Finds the smallest sequence number with no batch file under `root`.
///
/// Descends the nested layout picking the greatest two-digit entry at each
/// level. Every entry at a non-leaf level must be a directory; anything else
/// means the root is not a sink-produced log and discovery fails. An empty
/// (or absent) root yields 0; a dense log yields `max + 1`.
pub fn next_sequence(store: &dyn StreamStore, root: &Path) -> Result<u64, SequenceError> {
    let mut dir = root.to_path_buf();
    let mut seq: u64 = 0;
    for level in 0..LEVELS {
        let entries = match store.read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound && level == 0 => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        if level < LEVELS - 1 {
            if let Some(entry) = entries.iter().find(|e| !e.is_dir()) {
                return Err(SequenceError::NotADirectory(entry.name().to_owned()));
            }
        }
        // Entries arrive in ascending name order, so the last candidate is
        // the greatest.
        let best = entries
            .iter()
            .rev()
            .find_map(|e| two_digit_value(e.name()).map(|v| (e.name(), v)));
        match best {
            Some((name, value)) => {
                seq = seq * 100 + value;
                dir.push(name);
            }
            None => {
                // No batch below this point: the zero-filled remainder of
                // the current prefix is the first unused sequence.
                for _ in level..LEVELS {
                    seq *= 100;
                }
                return Ok(seq);
            }
        }
    }
    Ok(seq + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use store::{MemStore, mkdir_all};

    #[test]
    fn renders_nested_paths() {
        assert_eq!(
            seq_to_path(Path::new("/foo"), 1),
            PathBuf::from("/foo/00/00/00/00/00/00/01"),
        );
        assert_eq!(
            seq_to_path(Path::new("/foo"), 99_999_999_999_999),
            PathBuf::from("/foo/99/99/99/99/99/99/99"),
        );
    }

    #[test]
    fn empty_store_starts_at_zero() {
        let store = MemStore::new();
        assert_eq!(next_sequence(&store, Path::new("/foo/")).unwrap(), 0);
    }

    #[test]
    fn dense_log_yields_max_plus_one() {
        let store = MemStore::new();
        for seq in 0..12345 {
            let path = seq_to_path(Path::new("/foo/"), seq);
            mkdir_all(&store, path.parent().unwrap(), 0o755).unwrap();
            let mut w = store.create_write(&path).unwrap();
            w.write_all(&[0]).unwrap();
            w.close().unwrap();
        }
        assert_eq!(next_sequence(&store, Path::new("/foo/")).unwrap(), 12345);
    }

    #[test]
    fn stray_file_on_the_descent_fails() {
        let store = MemStore::new();
        mkdir_all(&store, &seq_to_path(Path::new("/foo/"), 0), 0o777).unwrap();
        let mut w = store.create_write(Path::new("/foo/00/bar")).unwrap();
        w.write_all(&[1]).unwrap();
        w.close().unwrap();

        let err = next_sequence(&store, Path::new("/foo/")).unwrap_err();
        assert_eq!(err.to_string(), "'bar' is not a directory");
    }

    #[test]
    fn two_digit_names_are_the_only_candidates() {
        assert_eq!(two_digit_value("00"), Some(0));
        assert_eq!(two_digit_value("37"), Some(37));
        assert_eq!(two_digit_value("99"), Some(99));
        assert_eq!(two_digit_value("7"), None);
        assert_eq!(two_digit_value("100"), None);
        assert_eq!(two_digit_value("a7"), None);
    }
}

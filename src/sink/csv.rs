//! Append-only CSV sink.
//!
//! The header row is written once, when the file is created (or found
//! empty). Each append writes the whole row with a single `write_all` while
//! holding an exclusive lock, so concurrent requests never interleave rows.
//! A failed write is truncated back to the previous length.

use crate::core::{header, SessionRecord};
use crate::sink::{RecordSink, SinkError};
use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub struct CsvSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: std::io::Error) -> SinkError {
        SinkError::Csv(format!("{}: {e}", self.path.display()))
    }
}

impl RecordSink for CsvSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn append(&self, record: &SessionRecord) -> Result<(), SinkError> {
        // A panic elsewhere cannot leave a partial row behind, so a poisoned
        // lock is still usable.
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        let start = file.metadata().map_err(|e| self.io_error(e))?.len();
        let is_new = start == 0;

        let mut buf = String::new();
        if is_new {
            buf.push_str(&encode_row(header()));
        }
        let fields: Vec<String> = record
            .cells()
            .into_iter()
            .map(|(_, cell)| cell.to_string())
            .collect();
        buf.push_str(&encode_row(&fields));

        write_or_rollback(&mut file, buf.as_bytes(), |f| f.set_len(start))
            .map_err(|e| self.io_error(e))?;

        tracing::debug!(path = %self.path.display(), header = is_new, "Appended CSV row");
        Ok(())
    }
}

/// Write `bytes` in full, or undo whatever part of them reached `out`.
fn write_or_rollback<W, F>(out: &mut W, bytes: &[u8], rollback: F) -> io::Result<()>
where
    W: Write,
    F: FnOnce(&mut W) -> io::Result<()>,
{
    let result = out.write_all(bytes).and_then(|_| out.flush());
    if let Err(e) = result {
        if let Err(rollback_err) = rollback(out) {
            tracing::error!("Could not truncate partial CSV row: {}", rollback_err);
        }
        return Err(e);
    }
    Ok(())
}

/// Encode one CSV line, newline-terminated.
pub fn encode_row<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = fields
        .into_iter()
        .map(|f| escape_field(f.as_ref()).into_owned())
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

/// Quote a field when it contains a delimiter, quote or line break.
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{bind_record, CaptureContext, ExtractedFeatures, SCHEMA};
    use std::sync::Arc;

    fn record(session_id: &str, user_agent: &str) -> SessionRecord {
        bind_record(
            &ExtractedFeatures::new(),
            Some(session_id.to_string()),
            &CaptureContext::now(user_agent),
        )
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_encode_row() {
        assert_eq!(encode_row(["a", "b,c", ""]), "a,\"b,c\",\n");
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path().join("nested").join("login_behavior.csv"));

        sink.append(&record("one", "Mozilla/5.0 (X11; Linux x86_64)"))
            .unwrap();
        sink.append(&record("two", "curl/8.0")).unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], header().join(","));
        assert!(lines[1].starts_with("one,"));
        assert!(lines[1].contains("\"Mozilla/5.0 (X11; Linux x86_64)\""));
        assert!(lines[2].starts_with("two,"));
        assert_eq!(lines[2].split(',').count(), SCHEMA.len());
    }

    #[test]
    fn test_concurrent_appends_produce_whole_rows() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(CsvSink::new(dir.path().join("rows.csv")));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for j in 0..10 {
                        sink.append(&record(&format!("s{i}-{j}"), "agent"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 161);
        assert_eq!(lines.iter().filter(|l| l.starts_with("session_id,")).count(), 1);
        assert!(lines
            .iter()
            .all(|l| l.split(',').count() == SCHEMA.len()));
    }

    #[test]
    fn test_unwritable_path_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvSink::new(dir.path());

        let err = sink.append(&record("x", "agent")).unwrap_err();
        assert!(matches!(err, SinkError::Csv(_)));
    }

    /// Accepts `capacity` bytes, then fails every write.
    struct ShortWriter {
        data: Vec<u8>,
        capacity: usize,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.capacity.saturating_sub(self.data.len());
            if room == 0 {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "disk full"));
            }
            let n = room.min(buf.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_write_leaves_no_partial_row() {
        let existing = b"session_id,timestamp_utc\n".to_vec();
        let start = existing.len();
        let mut out = ShortWriter {
            data: existing.clone(),
            capacity: start + 5,
        };

        let result = write_or_rollback(&mut out, b"abc,2024-01-01\n", |w| {
            w.data.truncate(start);
            Ok(())
        });

        assert!(result.is_err());
        assert_eq!(out.data, existing);
    }

    #[test]
    fn test_complete_write_is_kept() {
        let mut out = ShortWriter {
            data: Vec::new(),
            capacity: 64,
        };

        write_or_rollback(&mut out, b"a,b\n", |_| panic!("no rollback expected")).unwrap();
        assert_eq!(out.data, b"a,b\n");
    }
}

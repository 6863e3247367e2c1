//! Persistence targets for session records.
//!
//! Two independent, append-only sinks receive every record: a CSV file and a
//! SQLite store. A failure in one sink never blocks or rolls back the other.
//! The writer keeps the already-bound record, so retries never recompute
//! features.

pub mod csv;
pub mod store;

use crate::core::SessionRecord;
use std::sync::Arc;

pub use self::csv::CsvSink;
pub use self::store::SqliteStore;

/// Errors raised by a sink.
#[derive(Debug, Clone)]
pub enum SinkError {
    /// CSV file could not be opened or written
    Csv(String),
    /// Store insert failed
    Store(String),
    /// Blocking write task panicked or was cancelled
    Task(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Csv(e) => write!(f, "CSV sink error: {e}"),
            SinkError::Store(e) => write!(f, "Store sink error: {e}"),
            SinkError::Task(e) => write!(f, "Sink task error: {e}"),
        }
    }
}

impl std::error::Error for SinkError {}

/// An append-only record destination.
///
/// Implementations must make each `append` atomic with respect to concurrent
/// callers.
pub trait RecordSink: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Append one record.
    fn append(&self, record: &SessionRecord) -> Result<(), SinkError>;
}

/// Stands in for a sink that could not be opened. Every append fails with
/// the original error, so the outage shows up per request while the other
/// sinks keep writing.
pub struct UnavailableSink {
    name: &'static str,
    reason: SinkError,
}

impl UnavailableSink {
    pub fn new(name: &'static str, reason: SinkError) -> Self {
        Self { name, reason }
    }
}

impl RecordSink for UnavailableSink {
    fn name(&self) -> &'static str {
        self.name
    }

    fn append(&self, _record: &SessionRecord) -> Result<(), SinkError> {
        Err(self.reason.clone())
    }
}

/// Outcome of writing one record to one sink.
#[derive(Debug)]
pub struct SinkOutcome {
    pub sink: &'static str,
    pub result: Result<(), SinkError>,
}

/// Per-sink outcomes for one record.
#[derive(Debug, Default)]
pub struct SinkReport {
    pub outcomes: Vec<SinkOutcome>,
}

impl SinkReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&'static str, &SinkError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.sink, e)))
    }

    /// One-line description of every failed sink.
    pub fn failure_summary(&self) -> String {
        self.failures()
            .map(|(sink, e)| format!("{sink}: {e}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Fans a record out to every configured sink.
#[derive(Clone, Default)]
pub struct SinkWriter {
    sinks: Vec<Arc<dyn RecordSink>>,
    retries: u32,
}

impl SinkWriter {
    /// Create a writer that retries each failed sink `retries` extra times.
    pub fn new(retries: u32) -> Self {
        Self {
            sinks: Vec::new(),
            retries,
        }
    }

    /// Add a sink.
    pub fn with_sink(mut self, sink: impl RecordSink + 'static) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Write to every sink in turn on the current thread.
    pub fn write_blocking(&self, record: &SessionRecord) -> SinkReport {
        let outcomes = self
            .sinks
            .iter()
            .map(|sink| SinkOutcome {
                sink: sink.name(),
                result: append_with_retry(sink.as_ref(), record, self.retries),
            })
            .collect();
        SinkReport { outcomes }
    }

    /// Write to every sink concurrently on the blocking thread pool.
    pub async fn write(&self, record: Arc<SessionRecord>) -> SinkReport {
        let tasks: Vec<_> = self
            .sinks
            .iter()
            .map(|sink| {
                let sink = Arc::clone(sink);
                let record = Arc::clone(&record);
                let retries = self.retries;
                let name = sink.name();
                let task = tokio::task::spawn_blocking(move || {
                    append_with_retry(sink.as_ref(), &record, retries)
                });
                (name, task)
            })
            .collect();

        let mut report = SinkReport::default();
        for (sink, task) in tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(SinkError::Task(e.to_string())),
            };
            report.outcomes.push(SinkOutcome { sink, result });
        }
        report
    }
}

fn append_with_retry(
    sink: &dyn RecordSink,
    record: &SessionRecord,
    retries: u32,
) -> Result<(), SinkError> {
    let mut attempt = 0;
    loop {
        match sink.append(record) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < retries => {
                attempt += 1;
                tracing::warn!(sink = sink.name(), attempt, "Sink write failed, retrying: {}", e);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{bind_record, CaptureContext, ExtractedFeatures};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails a fixed number of times, then succeeds.
    struct FlakySink {
        failures_left: AtomicU32,
        appended: AtomicU32,
    }

    impl FlakySink {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                appended: AtomicU32::new(0),
            }
        }
    }

    impl RecordSink for Arc<FlakySink> {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn append(&self, _record: &SessionRecord) -> Result<(), SinkError> {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(SinkError::Store("unavailable".to_string()));
            }
            self.appended.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn record() -> SessionRecord {
        bind_record(
            &ExtractedFeatures::new(),
            Some("s".to_string()),
            &CaptureContext::now("test"),
        )
    }

    #[test]
    fn test_retry_reuses_record() {
        let sink = Arc::new(FlakySink::new(1));
        let writer = SinkWriter::new(1).with_sink(Arc::clone(&sink));

        let report = writer.write_blocking(&record());
        assert!(report.is_success());
        assert_eq!(sink.appended.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_does_not_block_other_sinks() {
        let broken = Arc::new(FlakySink::new(10));
        let healthy = Arc::new(FlakySink::new(0));
        let writer = SinkWriter::new(0)
            .with_sink(Arc::clone(&broken))
            .with_sink(Arc::clone(&healthy));

        let report = writer.write_blocking(&record());
        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 1);
        assert!(report.failure_summary().contains("unavailable"));
        assert_eq!(healthy.appended.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_async_write_reports_every_sink() {
        let first = Arc::new(FlakySink::new(0));
        let second = Arc::new(FlakySink::new(0));
        let writer = SinkWriter::new(0)
            .with_sink(Arc::clone(&first))
            .with_sink(Arc::clone(&second));

        let report = writer.write(Arc::new(record())).await;
        assert!(report.is_success());
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(first.appended.load(Ordering::SeqCst), 1);
        assert_eq!(second.appended.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_async_write_isolates_failing_sink() {
        let healthy = Arc::new(FlakySink::new(0));
        let writer = SinkWriter::new(2)
            .with_sink(UnavailableSink::new(
                "store",
                SinkError::Store("database is locked".to_string()),
            ))
            .with_sink(Arc::clone(&healthy));

        let report = writer.write(Arc::new(record())).await;
        assert!(!report.is_success());
        let failures: Vec<_> = report.failures().map(|(sink, _)| sink).collect();
        assert_eq!(failures, vec!["store"]);
        assert_eq!(report.failure_summary(), "store: Store sink error: database is locked");
        assert_eq!(healthy.appended.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_async_write_retries_flaky_sink() {
        let flaky = Arc::new(FlakySink::new(1));
        let writer = SinkWriter::new(1).with_sink(Arc::clone(&flaky));

        let report = writer.write(Arc::new(record())).await;
        assert!(report.is_success());
        assert_eq!(flaky.appended.load(Ordering::SeqCst), 1);
        assert_eq!(writer.sink_names(), vec!["flaky"]);
    }
}

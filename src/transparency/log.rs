//! Ingest transparency log.
//!
//! Tracks what the agent has received and persisted, as plain counters. No
//! session identifiers or event contents are kept here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Ingest counters for the running process.
#[derive(Debug)]
pub struct IngestLog {
    /// Beacons received, accepted or not
    beacons_received: AtomicU64,
    /// Beacons rejected as malformed
    beacons_rejected: AtomicU64,
    /// Records written to every sink
    records_saved: AtomicU64,
    /// Records with at least one failed sink
    sink_failures: AtomicU64,
    /// Raw events across all channels of accepted beacons
    events_processed: AtomicU64,
    /// Process start time
    started_at: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl IngestLog {
    pub fn new() -> Self {
        Self {
            beacons_received: AtomicU64::new(0),
            beacons_rejected: AtomicU64::new(0),
            records_saved: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            events_processed: AtomicU64::new(0),
            started_at: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that resumes from, and saves to, `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous ingest stats: {}", e);
        }

        log
    }

    pub fn record_received(&self) {
        self.beacons_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.beacons_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_saved(&self) {
        self.records_saved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_events(&self, count: u64) {
        self.events_processed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            beacons_received: self.beacons_received.load(Ordering::Relaxed),
            beacons_rejected: self.beacons_rejected.load(Ordering::Relaxed),
            records_saved: self.records_saved.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            events_processed: self.events_processed.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Counters in their persisted form.
    pub fn snapshot(&self) -> PersistedStats {
        let stats = self.stats();
        PersistedStats {
            beacons_received: stats.beacons_received,
            beacons_rejected: stats.beacons_rejected,
            records_saved: stats.records_saved,
            sink_failures: stats.sink_failures,
            events_processed: stats.events_processed,
            last_updated: Utc::now(),
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        self.snapshot().summary()
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let json =
                serde_json::to_string_pretty(&self.snapshot()).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let persisted = PersistedStats::read(path)?;

                self.beacons_received
                    .store(persisted.beacons_received, Ordering::Relaxed);
                self.beacons_rejected
                    .store(persisted.beacons_rejected, Ordering::Relaxed);
                self.records_saved
                    .store(persisted.records_saved, Ordering::Relaxed);
                self.sink_failures
                    .store(persisted.sink_failures, Ordering::Relaxed);
                self.events_processed
                    .store(persisted.events_processed, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for IngestLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of ingest statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestStats {
    pub beacons_received: u64,
    pub beacons_rejected: u64,
    pub records_saved: u64,
    pub sink_failures: u64,
    pub events_processed: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedStats {
    pub beacons_received: u64,
    pub beacons_rejected: u64,
    pub records_saved: u64,
    pub sink_failures: u64,
    pub events_processed: u64,
    pub last_updated: DateTime<Utc>,
}

impl PersistedStats {
    /// Read previously saved stats.
    pub fn read(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(std::io::Error::other)
    }

    pub fn summary(&self) -> String {
        format!(
            "Ingest Statistics:\n\
             - Beacons received: {}\n\
             - Beacons rejected (malformed): {}\n\
             - Records saved: {}\n\
             - Records with sink failures: {}\n\
             - Events processed: {}\n\
             - Last updated: {}",
            self.beacons_received,
            self.beacons_rejected,
            self.records_saved,
            self.sink_failures,
            self.events_processed,
            self.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// Thread-safe shared ingest log.
pub type SharedIngestLog = Arc<IngestLog>;

pub fn create_shared_log() -> SharedIngestLog {
    Arc::new(IngestLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedIngestLog {
    Arc::new(IngestLog::with_persistence(path))
}

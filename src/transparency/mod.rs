//! Transparency module for the login sensor.
//!
//! Tracks how many beacons were received, rejected and persisted so
//! operators can tell client errors from storage failures.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, IngestLog, IngestStats,
    PersistedStats, SharedIngestLog,
};

//! Synheart Login Sensor - Behavioral feature extraction for login sessions.
//!
//! The login page streams raw interaction telemetry (keyboard, mouse,
//! scroll, focus, clipboard and touch channels) in a single beacon. This
//! library reduces each beacon to a fixed-schema feature vector and appends
//! it to a CSV file and a SQLite store for offline analysis.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Synheart Login Sensor                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Beacon    │──▶│  Features   │──▶│   Schema    │       │
//! │  │ (normalize) │   │  (extract)  │   │   (bind)    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                             │               │
//! │                                             ▼               │
//! │  ┌─────────────┐                     ┌─────────────┐       │
//! │  │   Ingest    │                     │    Sinks    │       │
//! │  │    Stats    │                     │ CSV + SQLite│       │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use synheart_login_sensor::{beacon::Beacon, core};
//!
//! let body = br#"{"session_id": "s-1", "keyboard": [], "mouse": []}"#;
//! let beacon = Beacon::from_slice(body).unwrap();
//! let record = core::build_record(&beacon, &core::CaptureContext::now("Mozilla/5.0"));
//!
//! assert_eq!(record.cells().len(), core::SCHEMA.len());
//! ```

pub mod beacon;
pub mod config;
pub mod core;
pub mod logging;
pub mod sink;
pub mod transparency;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use beacon::{normalize, Beacon, BeaconError, ChannelBatch, NormalizedChannels};
pub use config::{Config, ConfigError};
pub use core::{
    build_record, extract_features, CaptureContext, Column, FeatureVector, SessionRecord, SCHEMA,
};
pub use sink::{CsvSink, RecordSink, SinkError, SinkWriter, SqliteStore, UnavailableSink};
pub use transparency::{IngestLog, IngestStats, SharedIngestLog};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

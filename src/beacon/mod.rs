//! Inbound login beacons.
//!
//! This module decodes the raw telemetry beacon and normalizes its six event
//! channels into the typed sub-lists used by feature extraction.

pub mod normalizer;
pub mod types;

// Re-export commonly used types
pub use normalizer::{normalize, ChannelLengths, NormalizedChannels};
pub use types::{
    ActivityEvent, Beacon, BeaconError, ChannelBatch, ClipboardEvent, KeyboardEvent, MouseEvent,
    Tagged,
};

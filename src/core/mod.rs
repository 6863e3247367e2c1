//! Core functionality for the login sensor.
//!
//! This module contains:
//! - The frozen output schema
//! - Feature extraction from normalized channels
//! - Binding of features and capture metadata into session records

pub mod features;
pub mod record;
pub mod schema;

use crate::beacon::{normalize, Beacon};

// Re-export commonly used types
pub use features::{compute_features, extract_features, LoginFeatures};
pub use record::{bind_record, is_mobile_user_agent, CaptureContext, Cell, SessionRecord};
pub use schema::{
    header, Column, ColumnKind, ExtractedFeatures, FeatureValue, FeatureVector, ValueType,
    SCHEMA,
};

/// Run one beacon through normalization, extraction and binding.
pub fn build_record(beacon: &Beacon, context: &CaptureContext) -> SessionRecord {
    let channels = normalize(&beacon.channels);
    let features = extract_features(&channels);
    bind_record(&features, beacon.session_id.clone(), context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn context(user_agent: &str) -> CaptureContext {
        CaptureContext::new(Utc.with_ymd_and_hms(2024, 1, 22, 10, 0, 0).unwrap(), user_agent)
    }

    fn number(record: &SessionRecord, column: Column) -> f64 {
        match record.cell(column) {
            Cell::Number(v) => v,
            other => panic!("{column} is not numeric: {other:?}"),
        }
    }

    #[test]
    fn test_single_key_press_record() {
        let beacon = Beacon::from_slice(
            br#"{"session_id": "A", "keyboard": [
                {"type": "keydown", "key": "a", "code": "KeyA", "time": 100},
                {"type": "keyup", "code": "KeyA", "time": 150}
            ]}"#,
        )
        .unwrap();
        let record = build_record(&beacon, &context("Mozilla/5.0"));

        assert_eq!(number(&record, Column::KeystrokeCounter), 1.0);
        assert_eq!(number(&record, Column::EraseKeysPercentage), 0.0);
        assert_eq!(number(&record, Column::KeyDwellMean), 50.0);
        assert_eq!(number(&record, Column::KeyDwellStd), 0.0);
        assert_eq!(number(&record, Column::KeyDwellMedian), 50.0);
        assert_eq!(number(&record, Column::WordCounter), 1.0);
        assert_eq!(number(&record, Column::JsEventRate), 2.0);
        assert!(!record.is_mobile_device);
    }

    #[test]
    fn test_empty_mobile_beacon_is_all_zero() {
        let beacon = Beacon::from_slice(b"{}").unwrap();
        let record = build_record(&beacon, &context("Mozilla/5.0 (Linux; Android 14) Mobile"));

        assert!(record.is_mobile_device);
        for (column, cell) in record.cells() {
            match column.kind() {
                ColumnKind::Metadata => continue,
                _ => assert!(
                    matches!(cell, Cell::Number(v) if v == 0.0) || cell == Cell::Flag(false),
                    "{column} = {cell:?}"
                ),
            }
        }
    }

    #[test]
    fn test_build_record_is_deterministic() {
        let body = br#"{"session_id": "D", "keyboard": [
            {"type": "keydown", "key": " ", "code": "Space", "time": 10},
            {"type": "keydown", "key": "Backspace", "code": "Backspace", "time": 25},
            {"type": "keyup", "code": "Space", "time": 40}
        ], "mouse": [{"type": "click", "button": 0}], "touch": [{}, {}]}"#;
        let ctx = context("Mobile");

        let first = serde_json::to_string(&build_record(&Beacon::from_slice(body).unwrap(), &ctx))
            .unwrap();
        let second = serde_json::to_string(&build_record(&Beacon::from_slice(body).unwrap(), &ctx))
            .unwrap();
        assert_eq!(first, second);
    }
}

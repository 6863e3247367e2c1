//! Session records: a bound feature vector plus capture metadata.
//!
//! Binding is the only place that enforces "every schema column is present".
//! It performs no numeric computation.

use crate::core::schema::{Column, ExtractedFeatures, FeatureValue, FeatureVector, SCHEMA};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// User-agent substring marking a mobile device. Case-sensitive.
pub const MOBILE_MARKER: &str = "Mobile";

/// Metadata supplied by the caller for one beacon.
#[derive(Debug, Clone)]
pub struct CaptureContext {
    /// When the beacon was received
    pub captured_at: DateTime<Utc>,
    /// Raw User-Agent header, empty when absent
    pub user_agent: String,
}

impl CaptureContext {
    pub fn new(captured_at: DateTime<Utc>, user_agent: impl Into<String>) -> Self {
        Self {
            captured_at,
            user_agent: user_agent.into(),
        }
    }

    /// Context stamped with the current time.
    pub fn now(user_agent: impl Into<String>) -> Self {
        Self::new(Utc::now(), user_agent)
    }
}

/// One persisted row: metadata plus the full feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub session_id: Option<String>,
    pub timestamp_utc: DateTime<Utc>,
    pub user_agent: String,
    pub is_mobile_device: bool,
    pub features: FeatureVector,
}

/// A single cell of a session record.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(Option<String>),
    Flag(bool),
    Number(f64),
}

impl From<FeatureValue> for Cell {
    fn from(value: FeatureValue) -> Self {
        match value {
            FeatureValue::Number(v) => Cell::Number(v),
            FeatureValue::Flag(b) => Cell::Flag(b),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(Some(s)) => f.write_str(s),
            Cell::Text(None) => Ok(()),
            Cell::Flag(b) => write!(f, "{b}"),
            Cell::Number(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Cell::Text(Some(s)) => serializer.serialize_str(s),
            Cell::Text(None) => serializer.serialize_none(),
            Cell::Flag(b) => serializer.serialize_bool(*b),
            Cell::Number(v) => serializer.serialize_f64(*v),
        }
    }
}

impl SessionRecord {
    /// Capture timestamp as ISO-8601 UTC.
    pub fn timestamp_iso(&self) -> String {
        self.timestamp_utc
            .to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Value of one column.
    pub fn cell(&self, column: Column) -> Cell {
        match column {
            Column::SessionId => Cell::Text(self.session_id.clone()),
            Column::TimestampUtc => Cell::Text(Some(self.timestamp_iso())),
            Column::UserAgent => Cell::Text(Some(self.user_agent.clone())),
            Column::IsMobileDevice => Cell::Flag(self.is_mobile_device),
            feature => self
                .features
                .get(feature)
                .unwrap_or_else(|| feature.default_value())
                .into(),
        }
    }

    /// All cells in schema order.
    pub fn cells(&self) -> Vec<(Column, Cell)> {
        SCHEMA.iter().map(|&c| (c, self.cell(c))).collect()
    }
}

/// Records serialize as a JSON object whose keys follow schema order.
impl Serialize for SessionRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(SCHEMA.len()))?;
        for (column, cell) in self.cells() {
            map.serialize_entry(column.name(), &cell)?;
        }
        map.end()
    }
}

/// Whether a user agent identifies a mobile device.
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    user_agent.contains(MOBILE_MARKER)
}

/// Merge extracted features into the frozen schema and attach metadata.
pub fn bind_record(
    features: &ExtractedFeatures,
    session_id: Option<String>,
    context: &CaptureContext,
) -> SessionRecord {
    SessionRecord {
        session_id,
        timestamp_utc: context.captured_at,
        user_agent: context.user_agent.clone(),
        is_mobile_device: is_mobile_user_agent(&context.user_agent),
        features: FeatureVector::bind(features),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn context(user_agent: &str) -> CaptureContext {
        CaptureContext::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(), user_agent)
    }

    #[test]
    fn test_mobile_detection_is_case_sensitive() {
        assert!(is_mobile_user_agent("Mozilla/5.0 (iPhone) Mobile/15E148"));
        assert!(!is_mobile_user_agent("mozilla mobile"));
        assert!(!is_mobile_user_agent(""));
    }

    #[test]
    fn test_bind_sets_metadata() {
        let record = bind_record(
            &ExtractedFeatures::new(),
            Some("sess-1".to_string()),
            &context("Android Mobile Safari"),
        );

        assert_eq!(record.session_id.as_deref(), Some("sess-1"));
        assert!(record.is_mobile_device);
        assert_eq!(record.timestamp_iso(), "2024-05-01T12:30:00.000000Z");
        assert_eq!(
            record.cell(Column::TimestampUtc),
            Cell::Text(Some("2024-05-01T12:30:00.000000Z".to_string()))
        );
    }

    #[test]
    fn test_cells_cover_schema_in_order() {
        let record = bind_record(&ExtractedFeatures::new(), None, &context("curl/8.0"));
        let cells = record.cells();

        assert_eq!(cells.len(), SCHEMA.len());
        for ((column, _), expected) in cells.iter().zip(SCHEMA.iter()) {
            assert_eq!(column, expected);
        }
        assert_eq!(cells[0].1, Cell::Text(None));
        assert_eq!(record.cell(Column::GeoIpChangeFlag), Cell::Flag(false));
        assert_eq!(record.cell(Column::ClickDepth), Cell::Number(0.0));
    }

    #[test]
    fn test_json_keys_follow_schema_order() {
        let record = bind_record(&ExtractedFeatures::new(), None, &context(""));
        let json = serde_json::to_string(&record).unwrap();

        let mut last = 0;
        for column in SCHEMA {
            let pos = json
                .find(&format!("\"{}\":", column.name()))
                .unwrap_or_else(|| panic!("{column} missing"));
            assert!(pos >= last, "{column} out of order");
            last = pos;
        }
        assert!(json.starts_with("{\"session_id\":null"));
    }
}

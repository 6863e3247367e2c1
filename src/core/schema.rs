//! The frozen login-behavior schema.
//!
//! [`SCHEMA`] is the single ordered column list shared by the record binder,
//! the CSV header and the structured store. Its order is part of the external
//! contract and must never change.

use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// One column of the frozen schema.
///
/// Variants are declared in schema order, so `column as usize` is the column
/// position in [`SCHEMA`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    SessionId,
    TimestampUtc,
    UserAgent,
    IsMobileDevice,

    KeystrokeCounter,
    EraseKeysPercentage,
    PressPressAverageInterval,
    WordCounter,

    KeyDwellMean,
    KeyDwellStd,
    KeyDwellMedian,

    FlightTimeMean,
    FlightTimeStd,

    TypingBurstCount,
    PasteEventsCount,
    CopyEventsCount,
    ModifierKeyUsageRatio,

    MouseActionClickLeft,
    MouseActionClickRight,
    MouseClickInterarrivalMean,
    MouseClickInterarrivalStd,
    MouseAverageMovementSpeed,
    MousePathSmoothness,
    MouseJitterStd,

    TouchEventsCount,
    TouchVsMouseRatio,

    ScrollEventsCount,
    ScrollSpeedMean,
    ScrollSpeedStd,

    ElementHoverTimeMean,
    ElementHoverTimeStd,

    PageDwellSeconds,
    FormFocusRatio,
    JsEventRate,
    WindowFocusChanges,
    ClickDepth,

    ReceivedBytes,
    SentBytes,
    HttpStatusErrorRate,
    RequestsLikeNewConnections,
    GeoIpChangeFlag,
    UserAgentVariabilityFlag,
}

/// Number of leading metadata columns in [`SCHEMA`].
pub const METADATA_COLUMNS: usize = 4;

/// The frozen, ordered column list.
pub const SCHEMA: [Column; 42] = [
    Column::SessionId,
    Column::TimestampUtc,
    Column::UserAgent,
    Column::IsMobileDevice,
    Column::KeystrokeCounter,
    Column::EraseKeysPercentage,
    Column::PressPressAverageInterval,
    Column::WordCounter,
    Column::KeyDwellMean,
    Column::KeyDwellStd,
    Column::KeyDwellMedian,
    Column::FlightTimeMean,
    Column::FlightTimeStd,
    Column::TypingBurstCount,
    Column::PasteEventsCount,
    Column::CopyEventsCount,
    Column::ModifierKeyUsageRatio,
    Column::MouseActionClickLeft,
    Column::MouseActionClickRight,
    Column::MouseClickInterarrivalMean,
    Column::MouseClickInterarrivalStd,
    Column::MouseAverageMovementSpeed,
    Column::MousePathSmoothness,
    Column::MouseJitterStd,
    Column::TouchEventsCount,
    Column::TouchVsMouseRatio,
    Column::ScrollEventsCount,
    Column::ScrollSpeedMean,
    Column::ScrollSpeedStd,
    Column::ElementHoverTimeMean,
    Column::ElementHoverTimeStd,
    Column::PageDwellSeconds,
    Column::FormFocusRatio,
    Column::JsEventRate,
    Column::WindowFocusChanges,
    Column::ClickDepth,
    Column::ReceivedBytes,
    Column::SentBytes,
    Column::HttpStatusErrorRate,
    Column::RequestsLikeNewConnections,
    Column::GeoIpChangeFlag,
    Column::UserAgentVariabilityFlag,
];

/// Role of a column in the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Supplied by the binder from the capture context
    Metadata,
    /// Filled by the feature extractor
    Computed,
    /// Declared for future extractors; always holds its zero default
    Reserved,
}

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Text,
    Flag,
    Count,
    Real,
}

impl Column {
    /// Column name as written to the CSV header and the store.
    pub fn name(self) -> &'static str {
        match self {
            Column::SessionId => "session_id",
            Column::TimestampUtc => "timestamp_utc",
            Column::UserAgent => "user_agent",
            Column::IsMobileDevice => "is_mobile_device",
            Column::KeystrokeCounter => "keystroke_counter",
            Column::EraseKeysPercentage => "erase_keys_percentage",
            Column::PressPressAverageInterval => "press_press_average_interval",
            Column::WordCounter => "word_counter",
            Column::KeyDwellMean => "key_dwell_mean",
            Column::KeyDwellStd => "key_dwell_std",
            Column::KeyDwellMedian => "key_dwell_median",
            Column::FlightTimeMean => "flight_time_mean",
            Column::FlightTimeStd => "flight_time_std",
            Column::TypingBurstCount => "typing_burst_count",
            Column::PasteEventsCount => "paste_events_count",
            Column::CopyEventsCount => "copy_events_count",
            Column::ModifierKeyUsageRatio => "modifier_key_usage_ratio",
            Column::MouseActionClickLeft => "mouse_action_click_left",
            Column::MouseActionClickRight => "mouse_action_click_right",
            Column::MouseClickInterarrivalMean => "mouse_click_interarrival_mean",
            Column::MouseClickInterarrivalStd => "mouse_click_interarrival_std",
            Column::MouseAverageMovementSpeed => "mouse_average_movement_speed",
            Column::MousePathSmoothness => "mouse_path_smoothness",
            Column::MouseJitterStd => "mouse_jitter_std",
            Column::TouchEventsCount => "touch_events_count",
            Column::TouchVsMouseRatio => "touch_vs_mouse_ratio",
            Column::ScrollEventsCount => "scroll_events_count",
            Column::ScrollSpeedMean => "scroll_speed_mean",
            Column::ScrollSpeedStd => "scroll_speed_std",
            Column::ElementHoverTimeMean => "element_hover_time_mean",
            Column::ElementHoverTimeStd => "element_hover_time_std",
            Column::PageDwellSeconds => "page_dwell_seconds",
            Column::FormFocusRatio => "form_focus_ratio",
            Column::JsEventRate => "js_event_rate",
            Column::WindowFocusChanges => "window_focus_changes",
            Column::ClickDepth => "click_depth",
            Column::ReceivedBytes => "received_bytes",
            Column::SentBytes => "sent_bytes",
            Column::HttpStatusErrorRate => "http_status_error_rate",
            Column::RequestsLikeNewConnections => "requests_like_new_connections",
            Column::GeoIpChangeFlag => "geo_ip_change_flag",
            Column::UserAgentVariabilityFlag => "user_agent_variability_flag",
        }
    }

    pub fn kind(self) -> ColumnKind {
        use Column::*;
        match self {
            SessionId | TimestampUtc | UserAgent | IsMobileDevice => ColumnKind::Metadata,
            KeystrokeCounter
            | EraseKeysPercentage
            | PressPressAverageInterval
            | WordCounter
            | KeyDwellMean
            | KeyDwellStd
            | KeyDwellMedian
            | PasteEventsCount
            | CopyEventsCount
            | MouseActionClickLeft
            | MouseActionClickRight
            | TouchEventsCount
            | TouchVsMouseRatio
            | ScrollEventsCount
            | JsEventRate
            | WindowFocusChanges => ColumnKind::Computed,
            _ => ColumnKind::Reserved,
        }
    }

    pub fn value_type(self) -> ValueType {
        use Column::*;
        match self {
            SessionId | TimestampUtc | UserAgent => ValueType::Text,
            IsMobileDevice | GeoIpChangeFlag | UserAgentVariabilityFlag => ValueType::Flag,
            KeystrokeCounter
            | WordCounter
            | TypingBurstCount
            | PasteEventsCount
            | CopyEventsCount
            | MouseActionClickLeft
            | MouseActionClickRight
            | TouchEventsCount
            | ScrollEventsCount
            | JsEventRate
            | WindowFocusChanges
            | ClickDepth
            | ReceivedBytes
            | SentBytes
            | RequestsLikeNewConnections => ValueType::Count,
            _ => ValueType::Real,
        }
    }

    /// Value a feature column holds when the extractor did not fill it.
    pub fn default_value(self) -> FeatureValue {
        match self.value_type() {
            ValueType::Flag => FeatureValue::Flag(false),
            _ => FeatureValue::Number(0.0),
        }
    }

    /// Position of this column in [`SCHEMA`].
    pub fn position(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Feature columns, i.e. every column after the metadata block.
pub fn feature_columns() -> &'static [Column] {
    &SCHEMA[METADATA_COLUMNS..]
}

/// Column names in schema order, as written to the CSV header.
pub fn header() -> Vec<&'static str> {
    SCHEMA.iter().map(|c| c.name()).collect()
}

/// A single feature value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Number(f64),
    Flag(bool),
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Number(value)
    }
}

impl From<usize> for FeatureValue {
    fn from(value: usize) -> Self {
        FeatureValue::Number(value as f64)
    }
}

impl From<bool> for FeatureValue {
    fn from(value: bool) -> Self {
        FeatureValue::Flag(value)
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Number(v) => write!(f, "{v}"),
            FeatureValue::Flag(b) => write!(f, "{b}"),
        }
    }
}

impl Serialize for FeatureValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FeatureValue::Number(v) => serializer.serialize_f64(*v),
            FeatureValue::Flag(b) => serializer.serialize_bool(*b),
        }
    }
}

/// Partial feature mapping produced by the extractor.
pub type ExtractedFeatures = HashMap<Column, FeatureValue>;

/// Complete feature vector: one value for every feature column, in schema
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<FeatureValue>,
}

impl FeatureVector {
    /// Bind a partial mapping onto the schema. Columns absent from `features`
    /// take their default; metadata entries in `features` are ignored.
    pub fn bind(features: &ExtractedFeatures) -> Self {
        let values = feature_columns()
            .iter()
            .map(|column| {
                features
                    .get(column)
                    .copied()
                    .unwrap_or_else(|| column.default_value())
            })
            .collect();
        Self { values }
    }

    /// Value of a feature column. Metadata columns have no feature value.
    pub fn get(&self, column: Column) -> Option<FeatureValue> {
        column
            .position()
            .checked_sub(METADATA_COLUMNS)
            .and_then(|i| self.values.get(i))
            .copied()
    }

    /// `(column, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (Column, FeatureValue)> + '_ {
        feature_columns().iter().copied().zip(self.values.iter().copied())
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::bind(&ExtractedFeatures::new())
    }
}

//! Raw telemetry types carried by a login beacon.
//!
//! Capture scripts send loosely-typed JSON. Every event field is optional: a
//! missing or wrongly-typed field deserializes to `None` and is excluded by the
//! extractor instead of rejecting the whole beacon.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// A keyboard event (`keydown` / `keyup`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyboardEvent {
    /// Event type tag, e.g. `keydown`
    pub kind: Option<String>,
    /// Logical key value (`"a"`, `" "`, `"Backspace"`)
    pub key: Option<String>,
    /// Physical key code (`"KeyA"`, `"Space"`)
    pub code: Option<String>,
    /// Capture timestamp in milliseconds
    pub time: Option<f64>,
}

impl KeyboardEvent {
    pub fn keydown(key: &str, code: &str, time: f64) -> Self {
        Self {
            kind: Some("keydown".to_string()),
            key: Some(key.to_string()),
            code: Some(code.to_string()),
            time: Some(time),
        }
    }

    pub fn keyup(code: &str, time: f64) -> Self {
        Self {
            kind: Some("keyup".to_string()),
            key: None,
            code: Some(code.to_string()),
            time: Some(time),
        }
    }

    fn from_fields(fields: RawFields<'_>) -> Self {
        Self {
            kind: fields.string("type"),
            key: fields.string("key"),
            code: fields.string("code"),
            time: fields.number("time"),
        }
    }
}

/// A mouse event. Only clicks carry features today.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MouseEvent {
    pub kind: Option<String>,
    /// DOM button code: 0 = left, 1 = middle, 2 = right
    pub button: Option<i64>,
    pub time: Option<f64>,
}

impl MouseEvent {
    pub fn click(button: i64) -> Self {
        Self {
            kind: Some("click".to_string()),
            button: Some(button),
            time: None,
        }
    }

    fn from_fields(fields: RawFields<'_>) -> Self {
        Self {
            kind: fields.string("type"),
            button: fields.integer("button"),
            time: fields.number("time"),
        }
    }
}

/// A clipboard event (`copy`, `paste`, `cut`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipboardEvent {
    pub kind: Option<String>,
}

impl ClipboardEvent {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: Some(kind.to_string()),
        }
    }

    fn from_fields(fields: RawFields<'_>) -> Self {
        Self {
            kind: fields.string("type"),
        }
    }
}

/// Scroll, focus and touch events. These channels are only counted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityEvent {
    pub kind: Option<String>,
    pub time: Option<f64>,
}

impl ActivityEvent {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: Some(kind.to_string()),
            time: None,
        }
    }

    fn from_fields(fields: RawFields<'_>) -> Self {
        Self {
            kind: fields.string("type"),
            time: fields.number("time"),
        }
    }
}

/// Events that carry a `type` tag.
pub trait Tagged {
    fn kind(&self) -> Option<&str>;
}

macro_rules! tagged {
    ($($ty:ty),* $(,)?) => {$(
        impl Tagged for $ty {
            fn kind(&self) -> Option<&str> {
                self.kind.as_deref()
            }
        }
    )*};
}

tagged!(KeyboardEvent, MouseEvent, ClipboardEvent, ActivityEvent);

/// Read-only view over one raw JSON event.
///
/// Non-object values (a bare number or string inside a channel list) expose
/// no fields at all, so they still count as an event but match nothing.
#[derive(Clone, Copy)]
struct RawFields<'a>(Option<&'a Map<String, Value>>);

impl<'a> RawFields<'a> {
    fn of(value: &'a Value) -> Self {
        Self(value.as_object())
    }

    fn string(self, name: &str) -> Option<String> {
        self.0?.get(name)?.as_str().map(str::to_owned)
    }

    fn number(self, name: &str) -> Option<f64> {
        self.0?.get(name)?.as_f64()
    }

    fn integer(self, name: &str) -> Option<i64> {
        let value = self.0?.get(name)?;
        value.as_i64().or_else(|| {
            value
                .as_f64()
                .filter(|v| v.fract() == 0.0)
                .map(|v| v as i64)
        })
    }
}

macro_rules! loose_event {
    ($($ty:ty),* $(,)?) => {$(
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let value = Value::deserialize(deserializer)?;
                Ok(Self::from_fields(RawFields::of(&value)))
            }
        }
    )*};
}

loose_event!(KeyboardEvent, MouseEvent, ClipboardEvent, ActivityEvent);

/// Six independent event channels captured during one login session.
///
/// Order within a channel is capture order. There is no ordering between
/// channels.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelBatch {
    #[serde(default, deserialize_with = "nullable_channel")]
    pub keyboard: Vec<KeyboardEvent>,
    #[serde(default, deserialize_with = "nullable_channel")]
    pub mouse: Vec<MouseEvent>,
    #[serde(default, deserialize_with = "nullable_channel")]
    pub scroll: Vec<ActivityEvent>,
    #[serde(default, deserialize_with = "nullable_channel")]
    pub focus: Vec<ActivityEvent>,
    #[serde(default, deserialize_with = "nullable_channel")]
    pub clipboard: Vec<ClipboardEvent>,
    #[serde(default, deserialize_with = "nullable_channel")]
    pub touch: Vec<ActivityEvent>,
}

impl ChannelBatch {
    /// Total number of raw events across all channels.
    pub fn event_count(&self) -> usize {
        self.keyboard.len()
            + self.mouse.len()
            + self.scroll.len()
            + self.focus.len()
            + self.clipboard.len()
            + self.touch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.event_count() == 0
    }
}

/// `null` and a missing channel both mean "no events".
fn nullable_channel<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One beacon as submitted by the login page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Beacon {
    /// Caller-assigned session identifier
    #[serde(default, deserialize_with = "loose_session_id")]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub channels: ChannelBatch,
}

impl Beacon {
    /// Decode a beacon from a raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, BeaconError> {
        let text = std::str::from_utf8(body).map_err(|e| BeaconError::Encoding(e.to_string()))?;
        serde_json::from_str(text).map_err(|e| BeaconError::Malformed(e.to_string()))
    }
}

fn loose_session_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// A beacon body that could not be decoded.
#[derive(Debug)]
pub enum BeaconError {
    /// Body is not valid UTF-8
    Encoding(String),
    /// Body is not a JSON object of the expected shape
    Malformed(String),
}

impl std::fmt::Display for BeaconError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BeaconError::Encoding(e) => write!(f, "Beacon is not UTF-8: {e}"),
            BeaconError::Malformed(e) => write!(f, "Malformed beacon: {e}"),
        }
    }
}

impl std::error::Error for BeaconError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_channels_are_empty() {
        let beacon = Beacon::from_slice(br#"{"session_id": "abc"}"#).unwrap();
        assert_eq!(beacon.session_id.as_deref(), Some("abc"));
        assert!(beacon.channels.is_empty());
    }

    #[test]
    fn test_null_channel_is_empty() {
        let beacon = Beacon::from_slice(br#"{"keyboard": null, "touch": []}"#).unwrap();
        assert!(beacon.channels.keyboard.is_empty());
        assert!(beacon.session_id.is_none());
    }

    #[test]
    fn test_wrongly_typed_fields_become_absent() {
        let body = br#"{"keyboard": [{"type": "keydown", "key": 5, "code": "KeyA", "time": "soon"}]}"#;
        let beacon = Beacon::from_slice(body).unwrap();
        let event = &beacon.channels.keyboard[0];
        assert_eq!(event.kind.as_deref(), Some("keydown"));
        assert_eq!(event.key, None);
        assert_eq!(event.code.as_deref(), Some("KeyA"));
        assert_eq!(event.time, None);
    }

    #[test]
    fn test_non_object_events_are_kept() {
        let beacon = Beacon::from_slice(br#"{"scroll": [1, "x", {"type": "scroll"}]}"#).unwrap();
        assert_eq!(beacon.channels.scroll.len(), 3);
        assert_eq!(beacon.channels.scroll[0], ActivityEvent::default());
    }

    #[test]
    fn test_button_accepts_integral_floats() {
        let beacon =
            Beacon::from_slice(br#"{"mouse": [{"type": "click", "button": 2.0}, {"button": 0.5}]}"#)
                .unwrap();
        assert_eq!(beacon.channels.mouse[0].button, Some(2));
        assert_eq!(beacon.channels.mouse[1].button, None);
    }

    #[test]
    fn test_numeric_session_id_is_stringified() {
        let beacon = Beacon::from_slice(br#"{"session_id": 42}"#).unwrap();
        assert_eq!(beacon.session_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_malformed_payloads_are_rejected() {
        assert!(matches!(
            Beacon::from_slice(b"not json"),
            Err(BeaconError::Malformed(_))
        ));
        assert!(matches!(
            Beacon::from_slice(b"[1, 2]"),
            Err(BeaconError::Malformed(_))
        ));
        assert!(matches!(
            Beacon::from_slice(br#"{"keyboard": "abc"}"#),
            Err(BeaconError::Malformed(_))
        ));
        assert!(matches!(
            Beacon::from_slice(&[0xff, 0xfe]),
            Err(BeaconError::Encoding(_))
        ));
    }
}

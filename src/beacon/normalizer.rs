//! Channel normalization.
//!
//! Splits the raw channels into the typed sub-lists the extractor works on.
//! This is a pure filter and cannot fail: events with missing fields are kept
//! and left for the extractor to exclude.

use crate::beacon::types::{ChannelBatch, ClipboardEvent, KeyboardEvent, MouseEvent, Tagged};

/// Raw length of every channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelLengths {
    pub keyboard: usize,
    pub mouse: usize,
    pub scroll: usize,
    pub focus: usize,
    pub clipboard: usize,
    pub touch: usize,
}

impl ChannelLengths {
    pub fn total(&self) -> usize {
        self.keyboard + self.mouse + self.scroll + self.focus + self.clipboard + self.touch
    }
}

/// Typed views over one channel batch.
#[derive(Debug, Clone, Default)]
pub struct NormalizedChannels<'a> {
    pub keydowns: Vec<&'a KeyboardEvent>,
    pub keyups: Vec<&'a KeyboardEvent>,
    pub clicks: Vec<&'a MouseEvent>,
    pub pastes: Vec<&'a ClipboardEvent>,
    pub copies: Vec<&'a ClipboardEvent>,
    pub lengths: ChannelLengths,
}

/// Normalize a channel batch. Capture order is preserved in every sub-list.
pub fn normalize(batch: &ChannelBatch) -> NormalizedChannels<'_> {
    NormalizedChannels {
        keydowns: of_kind(&batch.keyboard, "keydown"),
        keyups: of_kind(&batch.keyboard, "keyup"),
        clicks: of_kind(&batch.mouse, "click"),
        pastes: of_kind(&batch.clipboard, "paste"),
        copies: of_kind(&batch.clipboard, "copy"),
        lengths: ChannelLengths {
            keyboard: batch.keyboard.len(),
            mouse: batch.mouse.len(),
            scroll: batch.scroll.len(),
            focus: batch.focus.len(),
            clipboard: batch.clipboard.len(),
            touch: batch.touch.len(),
        },
    }
}

fn of_kind<'a, T: Tagged>(events: &'a [T], kind: &str) -> Vec<&'a T> {
    events.iter().filter(|e| e.kind() == Some(kind)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::types::ActivityEvent;

    #[test]
    fn test_normalize_empty() {
        let batch = ChannelBatch::default();
        let channels = normalize(&batch);
        assert!(channels.keydowns.is_empty());
        assert!(channels.clicks.is_empty());
        assert_eq!(channels.lengths.total(), 0);
    }

    #[test]
    fn test_normalize_splits_by_type() {
        let batch = ChannelBatch {
            keyboard: vec![
                KeyboardEvent::keydown("a", "KeyA", 1.0),
                KeyboardEvent::keyup("KeyA", 2.0),
                KeyboardEvent::default(),
                KeyboardEvent::keydown("b", "KeyB", 3.0),
            ],
            mouse: vec![
                MouseEvent::click(0),
                MouseEvent {
                    kind: Some("mousemove".to_string()),
                    ..Default::default()
                },
            ],
            clipboard: vec![
                ClipboardEvent::new("paste"),
                ClipboardEvent::new("cut"),
                ClipboardEvent::new("copy"),
                ClipboardEvent::new("paste"),
            ],
            touch: vec![ActivityEvent::new("touchstart")],
            ..Default::default()
        };

        let channels = normalize(&batch);
        assert_eq!(channels.keydowns.len(), 2);
        assert_eq!(channels.keydowns[1].key.as_deref(), Some("b"));
        assert_eq!(channels.keyups.len(), 1);
        assert_eq!(channels.clicks.len(), 1);
        assert_eq!(channels.pastes.len(), 2);
        assert_eq!(channels.copies.len(), 1);
        assert_eq!(channels.lengths.keyboard, 4);
        assert_eq!(channels.lengths.mouse, 2);
        assert_eq!(channels.lengths.total(), 11);
    }
}

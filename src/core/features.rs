//! Feature extraction from a normalized channel batch.
//!
//! Extraction is a pure function of the batch. It never fails: empty channels
//! and missing fields resolve to zero instead of an error.

use crate::beacon::{ChannelLengths, ClipboardEvent, KeyboardEvent, MouseEvent, NormalizedChannels};
use crate::core::schema::{Column, ExtractedFeatures, FeatureValue};

/// Keys counted as erasures.
const ERASE_KEYS: [&str; 2] = ["Backspace", "Delete"];

/// Key value that separates words.
const WORD_SEPARATOR: &str = " ";

/// DOM button codes.
const LEFT_BUTTON: i64 = 0;
const RIGHT_BUTTON: i64 = 2;

/// Keyboard-derived features.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyboardFeatures {
    /// Number of keydown events
    pub keystroke_counter: usize,
    /// Share of keydowns that were Backspace or Delete
    pub erase_keys_percentage: f64,
    /// Mean gap between consecutive keydowns (ms)
    pub press_press_average_interval: f64,
    /// Space-separated word estimate
    pub word_counter: usize,
}

/// Key press duration statistics (ms).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DwellFeatures {
    pub mean: f64,
    /// Sample standard deviation
    pub std: f64,
    pub median: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipboardFeatures {
    pub paste_events_count: usize,
    pub copy_events_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MouseFeatures {
    pub click_left: usize,
    pub click_right: usize,
}

/// Channel volume counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeFeatures {
    pub scroll_events_count: usize,
    pub window_focus_changes: usize,
    pub touch_events_count: usize,
    pub touch_vs_mouse_ratio: f64,
    /// Total raw events across all channels. A volume, not a rate.
    pub js_event_rate: usize,
}

/// Everything the extractor computes for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoginFeatures {
    pub keyboard: KeyboardFeatures,
    pub dwell: DwellFeatures,
    pub clipboard: ClipboardFeatures,
    pub mouse: MouseFeatures,
    pub volume: VolumeFeatures,
}

impl LoginFeatures {
    /// Flatten into the column mapping consumed by the binder.
    pub fn into_columns(self) -> ExtractedFeatures {
        let entries: [(Column, FeatureValue); 16] = [
            (Column::KeystrokeCounter, self.keyboard.keystroke_counter.into()),
            (Column::EraseKeysPercentage, self.keyboard.erase_keys_percentage.into()),
            (
                Column::PressPressAverageInterval,
                self.keyboard.press_press_average_interval.into(),
            ),
            (Column::WordCounter, self.keyboard.word_counter.into()),
            (Column::KeyDwellMean, self.dwell.mean.into()),
            (Column::KeyDwellStd, self.dwell.std.into()),
            (Column::KeyDwellMedian, self.dwell.median.into()),
            (Column::PasteEventsCount, self.clipboard.paste_events_count.into()),
            (Column::CopyEventsCount, self.clipboard.copy_events_count.into()),
            (Column::MouseActionClickLeft, self.mouse.click_left.into()),
            (Column::MouseActionClickRight, self.mouse.click_right.into()),
            (Column::ScrollEventsCount, self.volume.scroll_events_count.into()),
            (Column::WindowFocusChanges, self.volume.window_focus_changes.into()),
            (Column::TouchEventsCount, self.volume.touch_events_count.into()),
            (Column::TouchVsMouseRatio, self.volume.touch_vs_mouse_ratio.into()),
            (Column::JsEventRate, self.volume.js_event_rate.into()),
        ];
        entries.into_iter().collect()
    }
}

/// Compute all features from a normalized batch.
pub fn compute_features(channels: &NormalizedChannels<'_>) -> LoginFeatures {
    LoginFeatures {
        keyboard: compute_keyboard_features(&channels.keydowns),
        dwell: compute_dwell_features(&channels.keydowns, &channels.keyups),
        clipboard: compute_clipboard_features(&channels.pastes, &channels.copies),
        mouse: compute_mouse_features(&channels.clicks),
        volume: compute_volume_features(&channels.lengths),
    }
}

/// Compute the partial column mapping for a normalized batch.
pub fn extract_features(channels: &NormalizedChannels<'_>) -> ExtractedFeatures {
    compute_features(channels).into_columns()
}

fn compute_keyboard_features(keydowns: &[&KeyboardEvent]) -> KeyboardFeatures {
    if keydowns.is_empty() {
        return KeyboardFeatures::default();
    }

    let keystroke_counter = keydowns.len();

    let erase_count = keydowns
        .iter()
        .filter(|e| matches!(e.key.as_deref(), Some(k) if ERASE_KEYS.contains(&k)))
        .count();
    let erase_keys_percentage = erase_count as f64 / keystroke_counter as f64;

    // Out-of-order timestamps produce negative gaps; those are dropped.
    let times: Vec<f64> = keydowns.iter().filter_map(|e| e.time).collect();
    let intervals: Vec<f64> = times
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .filter(|&gap| gap >= 0.0)
        .collect();

    let spaces = keydowns
        .iter()
        .filter(|e| e.key.as_deref() == Some(WORD_SEPARATOR))
        .count();

    KeyboardFeatures {
        keystroke_counter,
        erase_keys_percentage,
        press_press_average_interval: mean(&intervals),
        word_counter: spaces + 1,
    }
}

/// Pair each keydown with the first keyup (in capture order) that has the
/// same code and a time at or after the keydown.
///
/// Keyups are not consumed: one keyup can close several keydowns of the same
/// code.
fn compute_dwell_times(keydowns: &[&KeyboardEvent], keyups: &[&KeyboardEvent]) -> Vec<f64> {
    keydowns
        .iter()
        .filter_map(|down| {
            let code = down.code.as_deref()?;
            let pressed_at = down.time?;
            keyups
                .iter()
                .filter(|up| up.code.as_deref() == Some(code))
                .find_map(|up| up.time.filter(|&released_at| released_at >= pressed_at))
                .map(|released_at| released_at - pressed_at)
        })
        .collect()
}

fn compute_dwell_features(keydowns: &[&KeyboardEvent], keyups: &[&KeyboardEvent]) -> DwellFeatures {
    let dwell = compute_dwell_times(keydowns, keyups);

    DwellFeatures {
        mean: mean(&dwell),
        std: sample_std_dev(&dwell),
        median: median(&dwell),
    }
}

fn compute_clipboard_features(
    pastes: &[&ClipboardEvent],
    copies: &[&ClipboardEvent],
) -> ClipboardFeatures {
    ClipboardFeatures {
        paste_events_count: pastes.len(),
        copy_events_count: copies.len(),
    }
}

fn compute_mouse_features(clicks: &[&MouseEvent]) -> MouseFeatures {
    let count_button = |button: i64| clicks.iter().filter(|c| c.button == Some(button)).count();

    MouseFeatures {
        click_left: count_button(LEFT_BUTTON),
        click_right: count_button(RIGHT_BUTTON),
    }
}

fn compute_volume_features(lengths: &ChannelLengths) -> VolumeFeatures {
    let touch_vs_mouse_ratio = if lengths.mouse == 0 {
        0.0
    } else {
        lengths.touch as f64 / lengths.mouse as f64
    };

    VolumeFeatures {
        scroll_events_count: lengths.scroll,
        window_focus_changes: lengths.focus,
        touch_events_count: lengths.touch,
        touch_vs_mouse_ratio,
        js_event_rate: lengths.total(),
    }
}

/// Arithmetic mean, `0` for an empty slice.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1), `0` below two values.
fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let mean = mean(values);
    let variance =
        values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Median, averaging the middle pair for even lengths. `0` when empty.
fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

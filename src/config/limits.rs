//! Clamp ranges shared by every tunable in the pipeline
//!
//! One table instead of ad-hoc constants, so settings pushed by the
//! producer are bounded the same way wherever they land.

use std::ops::RangeInclusive;

/// Update batcher flush interval (ms)
pub const BATCH_INTERVAL_MS: RangeInclusive<u64> = 50..=500;

/// Density monitor threshold (updates per window)
pub const DENSITY_THRESHOLD: RangeInclusive<usize> = 1..=20;

/// Concurrently displayed paid-message cards
pub const CARD_MAX_DISPLAY: RangeInclusive<usize> = 1..=3;

/// Component rule: visible lines
pub const MAX_LINES: RangeInclusive<u32> = 4..=14;

/// Component rule: visible items
pub const MAX_ITEMS: RangeInclusive<u32> = 6..=20;

/// Component rule: full rotation cycle (seconds)
pub const CYCLE_SEC: RangeInclusive<u32> = 10..=120;

/// Component rule: time each rotating item stays up (seconds)
pub const SHOW_SEC: RangeInclusive<u32> = 3..=15;

/// Heartbeat / snapshot period from the environment (seconds); zero disables
pub const LOOP_INTERVAL_SECS: RangeInclusive<u64> = 0..=86_400;

/// Settings fetch timeout from the environment (ms)
pub const SETTINGS_TIMEOUT_MS: RangeInclusive<u64> = 100..=600_000;

/// Clamp `value` into `range`
pub fn clamp<T: PartialOrd + Copy>(value: T, range: &RangeInclusive<T>) -> T {
    if value < *range.start() {
        *range.start()
    } else if value > *range.end() {
        *range.end()
    } else {
        value
    }
}

/// Clamp a float into an integer range, rejecting NaN and infinities
///
/// Returns `None` for non-finite input so callers can keep their previous
/// value.
pub fn clamp_finite(value: f64, range: &RangeInclusive<u64>) -> Option<u64> {
    if !value.is_finite() {
        return None;
    }
    let lo = *range.start() as f64;
    let hi = *range.end() as f64;
    Some(value.max(lo).min(hi).round() as u64)
}

//! Time helpers for widgets

use std::time::Duration;

use chrono::{DateTime, TimeZone};
use tokio::time::Instant;

/// Format a wall-clock time the way the clock widget shows it
pub fn clock_text<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%H:%M").to_string()
}

/// Time-driven index rotation for widgets that cycle through items
///
/// The current index is derived from elapsed (unpaused) time rather than a
/// timer, so a paused widget simply stops advancing and nothing needs to
/// be cancelled when it is destroyed.
#[derive(Debug, Clone)]
pub struct Rotator {
    period: Duration,
    started: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl Rotator {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            started: Instant::now(),
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    /// Restart from the first item
    pub fn reset(&mut self) {
        self.started = Instant::now();
        self.paused_total = Duration::ZERO;
        if self.paused_at.is_some() {
            self.paused_at = Some(self.started);
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        match (paused, self.paused_at) {
            (true, None) => self.paused_at = Some(Instant::now()),
            (false, Some(at)) => {
                self.paused_total += at.elapsed();
                self.paused_at = None;
            }
            _ => {}
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Index into a list of `len` items
    pub fn index(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let now = self.paused_at.unwrap_or_else(Instant::now);
        let active = now
            .saturating_duration_since(self.started)
            .saturating_sub(self.paused_total);
        let step = (active.as_millis() / self.period.as_millis()) as usize;
        step % len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_clock_text() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 7, 0).unwrap();
        assert_eq!(clock_text(&at), "09:07");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotator_advances_and_pauses() {
        let mut rotator = Rotator::new(Duration::from_secs(5));
        assert_eq!(rotator.index(3), 0);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(rotator.index(3), 1);

        rotator.set_paused(true);
        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(rotator.index(3), 1);

        rotator.set_paused(false);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(rotator.index(3), 2);
    }
}

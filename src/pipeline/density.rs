//! Density Monitor
//!
//! Sliding-window overload detector. Every broadcast that lands in a
//! monitored slot is timestamped; when the number of timestamps inside the
//! window (summed across monitored slots) reaches the threshold the overlay
//! is DENSE, otherwise NORMAL. Each transition dispatches exactly one
//! `density:high` / `density:normal` event through the registry.
//!
//! ```text
//!            total >= threshold
//!   NORMAL ───────────────────────► DENSE
//!     ▲                               │
//!     └───────────────────────────────┘
//!       total < threshold (record or sweep)
//! ```
//!
//! A periodic sweep re-evaluates the window even when no updates arrive, so
//! a burst followed by silence returns to NORMAL on its own.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::limits;
use crate::registry::{UpdateObserver, WidgetEvent, WidgetRegistry};
use crate::types::SlotId;
use crate::utils::TaskGuard;

/// Settings payload sent with density transitions
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DensityProfile {
    pub level: String,
    pub max_items: Option<u32>,
    pub animations: bool,
    pub refresh_ms: u64,
}

impl DensityProfile {
    pub fn degraded() -> Self {
        Self {
            level: "high".to_string(),
            max_items: Some(6),
            animations: false,
            refresh_ms: 1000,
        }
    }

    pub fn restored() -> Self {
        Self {
            level: "normal".to_string(),
            max_items: None,
            animations: true,
            refresh_ms: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DensityConfig {
    pub threshold: usize,
    pub window: Duration,
    pub cleanup_interval: Duration,
    pub monitored_slots: Vec<SlotId>,
    pub degraded: DensityProfile,
    pub restored: DensityProfile,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            threshold: 10,
            window: Duration::from_millis(2000),
            cleanup_interval: Duration::from_millis(1000),
            monitored_slots: vec![
                SlotId::LeftMiddle,
                SlotId::LeftLower,
                SlotId::RightUpper,
                SlotId::RightLowerLeft,
                SlotId::RightLowerRight,
            ],
            degraded: DensityProfile::degraded(),
            restored: DensityProfile::restored(),
        }
    }
}

struct DensityState {
    windows: HashMap<SlotId, VecDeque<Instant>>,
    threshold: usize,
    dense: bool,
    sweep: Option<TaskGuard>,
}

impl DensityState {
    fn expunge(&mut self, now: Instant, window: Duration) {
        for stamps in self.windows.values_mut() {
            while stamps
                .front()
                .is_some_and(|at| now.saturating_duration_since(*at) > window)
            {
                stamps.pop_front();
            }
        }
    }

    fn total(&self) -> usize {
        self.windows.values().map(VecDeque::len).sum()
    }

    /// Recompute the state; returns the event to dispatch on a transition
    fn evaluate(&mut self) -> Option<WidgetEvent> {
        let dense = self.total() >= self.threshold;
        self.transition(dense)
    }

    fn transition(&mut self, dense: bool) -> Option<WidgetEvent> {
        if dense == self.dense {
            return None;
        }
        self.dense = dense;
        Some(if dense {
            WidgetEvent::DensityHigh
        } else {
            WidgetEvent::DensityNormal
        })
    }
}

pub struct DensityMonitor {
    me: Weak<DensityMonitor>,
    registry: Arc<WidgetRegistry>,
    config: DensityConfig,
    state: Mutex<DensityState>,
}

impl DensityMonitor {
    pub fn new(registry: Arc<WidgetRegistry>, config: DensityConfig) -> Arc<Self> {
        let windows = config
            .monitored_slots
            .iter()
            .map(|slot| (*slot, VecDeque::new()))
            .collect();
        let threshold = limits::clamp(config.threshold, &limits::DENSITY_THRESHOLD);

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            registry,
            config,
            state: Mutex::new(DensityState {
                windows,
                threshold,
                dense: false,
                sweep: None,
            }),
        })
    }

    /// Start the background cleanup sweep
    pub fn start(&self) {
        let me = self.me.clone();
        let sweep = TaskGuard::every(self.config.cleanup_interval, move || {
            if let Some(monitor) = me.upgrade() {
                monitor.sweep();
            }
        });
        self.state.lock().sweep = Some(sweep);
    }

    /// Record one update landing in `slot`
    pub fn record_update(&self, slot: SlotId) {
        let now = Instant::now();
        let mut state = self.state.lock();
        let Some(stamps) = state.windows.get_mut(&slot) else {
            return;
        };
        stamps.push_back(now);
        state.expunge(now, self.config.window);
        let event = state.evaluate();
        self.notify(event);
    }

    /// Drop expired timestamps and re-evaluate without new input
    pub fn sweep(&self) {
        let mut state = self.state.lock();
        state.expunge(Instant::now(), self.config.window);
        let event = state.evaluate();
        self.notify(event);
    }

    pub fn is_high_density(&self) -> bool {
        self.state.lock().dense
    }

    /// Timestamps currently inside the window across monitored slots
    pub fn total_updates(&self) -> usize {
        self.state.lock().total()
    }

    pub fn threshold(&self) -> usize {
        self.state.lock().threshold
    }

    /// Switch to DENSE regardless of measurements
    pub fn force_degraded(&self) {
        let mut state = self.state.lock();
        let event = state.transition(true);
        self.notify(event);
    }

    /// Switch to NORMAL regardless of measurements
    pub fn force_normal(&self) {
        let mut state = self.state.lock();
        let event = state.transition(false);
        self.notify(event);
    }

    /// Set the threshold, clamped to 1..=20; non-finite input is ignored
    pub fn set_threshold(&self, threshold: f64) {
        if !threshold.is_finite() {
            debug!(threshold, "ignoring non-finite density threshold");
            return;
        }
        let range = limits::DENSITY_THRESHOLD;
        let clamped = threshold.round().max(*range.start() as f64).min(*range.end() as f64) as usize;
        self.state.lock().threshold = clamped;
        info!(threshold = clamped, "density threshold updated");
    }

    /// Like `set_threshold`, ignoring non-numeric JSON
    pub fn set_threshold_value(&self, value: &Value) {
        match value.as_f64() {
            Some(threshold) => self.set_threshold(threshold),
            None => debug!(%value, "ignoring non-numeric density threshold"),
        }
    }

    /// Stop the sweep and forget all measurements
    pub fn destroy(&self) {
        let mut state = self.state.lock();
        state.sweep = None;
        for stamps in state.windows.values_mut() {
            stamps.clear();
        }
    }

    // Called with the state lock held: transitions reach widgets in the
    // order they happened. The registry never calls back into the monitor
    // from `dispatch`.
    fn notify(&self, event: Option<WidgetEvent>) {
        let Some(event) = event else {
            return;
        };
        let profile = match event {
            WidgetEvent::DensityHigh => &self.config.degraded,
            WidgetEvent::DensityNormal => &self.config.restored,
        };
        info!(%event, "density transition");
        let payload = serde_json::to_value(profile).unwrap_or(Value::Null);
        self.registry.dispatch(event, &payload);
    }
}

impl UpdateObserver for DensityMonitor {
    fn on_slot_updated(&self, slot: SlotId) {
        self.record_update(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientResult;
    use crate::registry::Widget;
    use crate::types::{WidgetConfig, WidgetKind};
    use serde_json::json;
    use tokio::time::sleep;

    struct EventLog(Arc<Mutex<Vec<WidgetEvent>>>);

    impl Widget for EventLog {
        fn render(&mut self) -> ClientResult<()> {
            Ok(())
        }
        fn update(&mut self, _data: &Value) -> ClientResult<()> {
            Ok(())
        }
        fn on_event(&mut self, event: WidgetEvent, _payload: &Value) -> ClientResult<()> {
            self.0.lock().push(event);
            Ok(())
        }
        fn view(&self) -> Vec<String> {
            Vec::new()
        }
    }

    fn setup(threshold: usize) -> (Arc<DensityMonitor>, Arc<Mutex<Vec<WidgetEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let registry = Arc::new(WidgetRegistry::new(move |_: WidgetKind, _: &WidgetConfig| {
            Ok(Box::new(EventLog(sink.clone())) as Box<dyn Widget>)
        }));
        registry.mount(SlotId::LeftMiddle, WidgetKind::ChatLog, &WidgetConfig::default());

        let config = DensityConfig {
            threshold,
            window: Duration::from_millis(2000),
            ..Default::default()
        };
        (DensityMonitor::new(registry, config), events)
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_five_dispatches_once() {
        let (monitor, events) = setup(5);

        for _ in 0..4 {
            monitor.record_update(SlotId::LeftMiddle);
            sleep(Duration::from_millis(100)).await;
        }
        assert!(!monitor.is_high_density());
        assert!(events.lock().is_empty());

        monitor.record_update(SlotId::LeftMiddle);
        assert!(monitor.is_high_density());
        assert_eq!(*events.lock(), vec![WidgetEvent::DensityHigh]);

        monitor.record_update(SlotId::LeftMiddle);
        assert_eq!(events.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_below_threshold_never_dense() {
        let (monitor, events) = setup(5);

        // Four per window, spread so old ones expire
        for _ in 0..20 {
            monitor.record_update(SlotId::LeftMiddle);
            sleep(Duration::from_millis(600)).await;
        }
        assert!(!monitor.is_high_density());
        assert!(events.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmonitored_slot_is_ignored() {
        let (monitor, _events) = setup(1);
        monitor.record_update(SlotId::CenterFull);
        assert_eq!(monitor.total_updates(), 0);
        assert!(!monitor.is_high_density());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_self_heals() {
        let (monitor, events) = setup(3);
        monitor.start();

        for _ in 0..3 {
            monitor.record_update(SlotId::LeftMiddle);
        }
        assert!(monitor.is_high_density());

        sleep(Duration::from_millis(3100)).await;
        assert!(!monitor.is_high_density());
        assert_eq!(
            *events.lock(),
            vec![WidgetEvent::DensityHigh, WidgetEvent::DensityNormal]
        );

        monitor.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_and_threshold_clamp() {
        let (monitor, events) = setup(5);

        monitor.force_degraded();
        monitor.force_degraded();
        monitor.force_normal();
        assert_eq!(
            *events.lock(),
            vec![WidgetEvent::DensityHigh, WidgetEvent::DensityNormal]
        );

        monitor.set_threshold(0.0);
        assert_eq!(monitor.threshold(), 1);
        monitor.set_threshold(99.0);
        assert_eq!(monitor.threshold(), 20);
        monitor.set_threshold(f64::NAN);
        assert_eq!(monitor.threshold(), 20);
        monitor.set_threshold_value(&json!("lots"));
        assert_eq!(monitor.threshold(), 20);
        monitor.set_threshold_value(&json!(7));
        assert_eq!(monitor.threshold(), 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_transitions_reach_widgets_in_order() {
        let (monitor, events) = setup(5);

        std::thread::scope(|scope| {
            for dense in [true, false] {
                let monitor = monitor.clone();
                scope.spawn(move || {
                    for _ in 0..500 {
                        if dense {
                            monitor.force_degraded();
                        } else {
                            monitor.force_normal();
                        }
                    }
                });
            }
        });

        let events = events.lock().clone();
        assert!(events.windows(2).all(|pair| pair[0] != pair[1]));
        let last = events.last().copied().unwrap_or(WidgetEvent::DensityNormal);
        assert_eq!(last == WidgetEvent::DensityHigh, monitor.is_high_density());
    }
}

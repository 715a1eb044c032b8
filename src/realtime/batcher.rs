//! Update batcher for coalescing high-frequency telemetry updates
//!
//! Repeated updates of the same widget kind within one tick collapse to the
//! latest payload; each tick broadcasts every pending kind exactly once.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::limits;
use crate::registry::WidgetRegistry;
use crate::types::WidgetKind;
use crate::utils::TaskGuard;

/// Default tick length (ms)
pub const DEFAULT_BATCH_INTERVAL_MS: u64 = 100;

struct BatchState {
    /// Latest payload per kind since the last flush
    pending: BTreeMap<WidgetKind, Value>,
    /// Scheduled tick, if any
    scheduled: Option<TaskGuard>,
    batch_interval: Duration,
}

/// Coalesces updates per widget kind and flushes them once per tick
pub struct UpdateBatcher {
    me: Weak<UpdateBatcher>,
    registry: Arc<WidgetRegistry>,
    state: Mutex<BatchState>,
    /// Serializes flush passes so two ticks never interleave
    flush_lock: Mutex<()>,
}

impl UpdateBatcher {
    /// Create a new update batcher
    pub fn new(registry: Arc<WidgetRegistry>) -> Arc<Self> {
        Self::with_interval(registry, DEFAULT_BATCH_INTERVAL_MS)
    }

    /// Create a new update batcher with a custom tick length
    pub fn with_interval(registry: Arc<WidgetRegistry>, batch_interval_ms: u64) -> Arc<Self> {
        let batch_interval_ms = limits::clamp(batch_interval_ms, &limits::BATCH_INTERVAL_MS);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            registry,
            state: Mutex::new(BatchState {
                pending: BTreeMap::new(),
                scheduled: None,
                batch_interval: Duration::from_millis(batch_interval_ms),
            }),
            flush_lock: Mutex::new(()),
        })
    }

    /// Queue a payload for `kind`, replacing any pending one
    pub fn queue(&self, kind: WidgetKind, data: Value) {
        let mut state = self.state.lock();
        if state.pending.insert(kind, data).is_some() {
            debug!(%kind, "coalesced pending update");
        }

        if state.scheduled.is_none() {
            let me = self.me.clone();
            state.scheduled = Some(TaskGuard::after(state.batch_interval, move || {
                if let Some(batcher) = me.upgrade() {
                    batcher.flush_tick();
                }
            }));
        }
    }

    /// Broadcast every pending kind once and clear the set
    ///
    /// Returns the number of kinds broadcast.
    pub fn flush(&self) -> usize {
        let _pass = self.flush_lock.lock();
        let pending = {
            let mut state = self.state.lock();
            state.scheduled = None;
            std::mem::take(&mut state.pending)
        };
        self.broadcast_all(pending)
    }

    /// Flush right now, cancelling the scheduled tick
    pub fn force_flush(&self) -> usize {
        let count = self.flush();
        if count > 0 {
            info!(kinds = count, "forced flush");
        }
        count
    }

    /// Set the tick length, clamped to 50..=500 ms; non-finite input is ignored
    pub fn set_batch_interval(&self, ms: f64) {
        match limits::clamp_finite(ms, &limits::BATCH_INTERVAL_MS) {
            Some(ms) => {
                self.state.lock().batch_interval = Duration::from_millis(ms);
                info!(batch_interval_ms = ms, "batch interval updated");
            }
            None => debug!(ms, "ignoring non-finite batch interval"),
        }
    }

    /// Like `set_batch_interval`, ignoring non-numeric JSON
    pub fn set_batch_interval_value(&self, value: &Value) {
        match value.as_f64() {
            Some(ms) => self.set_batch_interval(ms),
            None => debug!(%value, "ignoring non-numeric batch interval"),
        }
    }

    pub fn batch_interval(&self) -> Duration {
        self.state.lock().batch_interval
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_scheduled(&self) -> bool {
        self.state.lock().scheduled.is_some()
    }

    /// Cancel the scheduled tick and drop pending updates
    pub fn destroy(&self) {
        let mut state = self.state.lock();
        state.scheduled = None;
        state.pending.clear();
    }

    // Runs on the scheduled task itself, so its guard is released rather
    // than aborted.
    fn flush_tick(&self) {
        let _pass = self.flush_lock.lock();
        let pending = {
            let mut state = self.state.lock();
            if let Some(guard) = state.scheduled.take() {
                guard.detach();
            }
            std::mem::take(&mut state.pending)
        };
        self.broadcast_all(pending);
    }

    // Caller holds `flush_lock` from taking the pending set until here, so
    // passes broadcast in the order they took their payloads.
    fn broadcast_all(&self, pending: BTreeMap<WidgetKind, Value>) -> usize {
        if pending.is_empty() {
            return 0;
        }
        let count = pending.len();
        for (kind, data) in pending {
            self.registry.broadcast(kind, &data);
        }
        debug!(kinds = count, "flushed batched updates");
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientResult;
    use crate::registry::Widget;
    use crate::types::{SlotId, WidgetConfig};
    use serde_json::json;
    use tokio::time::sleep;

    type Seen = Arc<Mutex<Vec<(WidgetKind, Value)>>>;

    struct Recorder {
        kind: WidgetKind,
        seen: Seen,
    }

    impl Widget for Recorder {
        fn render(&mut self) -> ClientResult<()> {
            Ok(())
        }
        fn update(&mut self, data: &Value) -> ClientResult<()> {
            self.seen.lock().push((self.kind, data.clone()));
            Ok(())
        }
        fn view(&self) -> Vec<String> {
            Vec::new()
        }
    }

    fn setup() -> (Arc<UpdateBatcher>, Seen) {
        let seen = Seen::default();
        let sink = seen.clone();
        let registry = Arc::new(WidgetRegistry::new(move |kind: WidgetKind, _: &WidgetConfig| {
            Ok(Box::new(Recorder { kind, seen: sink.clone() }) as Box<dyn Widget>)
        }));
        registry.mount(SlotId::RightLowerLeft, WidgetKind::KpiBlock, &WidgetConfig::default());
        registry.mount(SlotId::LeftTopBelow, WidgetKind::WeatherWidget, &WidgetConfig::default());
        (UpdateBatcher::new(registry), seen)
    }

    #[tokio::test(start_paused = true)]
    async fn test_batcher_flushes_on_timer() {
        let (batcher, seen) = setup();

        batcher.queue(WidgetKind::KpiBlock, json!({"main": 1}));
        assert!(batcher.is_scheduled());
        assert!(seen.lock().is_empty());

        sleep(Duration::from_millis(DEFAULT_BATCH_INTERVAL_MS + 10)).await;
        assert_eq!(*seen.lock(), vec![(WidgetKind::KpiBlock, json!({"main": 1}))]);
        assert!(!batcher.is_scheduled());
        assert_eq!(batcher.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batcher_last_write_wins() {
        let (batcher, seen) = setup();

        batcher.queue(WidgetKind::KpiBlock, json!({"main": "A"}));
        batcher.queue(WidgetKind::KpiBlock, json!({"main": "B"}));
        batcher.queue(WidgetKind::WeatherWidget, json!({"temp": 20}));

        sleep(Duration::from_millis(DEFAULT_BATCH_INTERVAL_MS + 10)).await;
        let seen = seen.lock().clone();
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&(WidgetKind::KpiBlock, json!({"main": "B"}))));
        assert!(seen.contains(&(WidgetKind::WeatherWidget, json!({"temp": 20}))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batcher_force_flush_cancels_tick() {
        let (batcher, seen) = setup();

        batcher.queue(WidgetKind::KpiBlock, json!({"main": 1}));
        assert_eq!(batcher.force_flush(), 1);
        assert!(!batcher.is_scheduled());

        sleep(Duration::from_millis(1000)).await;
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(batcher.force_flush(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_interval_clamped() {
        let (batcher, _seen) = setup();

        batcher.set_batch_interval(10.0);
        assert_eq!(batcher.batch_interval(), Duration::from_millis(50));
        batcher.set_batch_interval(5000.0);
        assert_eq!(batcher.batch_interval(), Duration::from_millis(500));
        batcher.set_batch_interval(f64::INFINITY);
        assert_eq!(batcher.batch_interval(), Duration::from_millis(500));
        batcher.set_batch_interval_value(&json!("soon"));
        assert_eq!(batcher.batch_interval(), Duration::from_millis(500));
        batcher.set_batch_interval_value(&json!(200));
        assert_eq!(batcher.batch_interval(), Duration::from_millis(200));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_flushes_keep_queue_order() {
        let (batcher, seen) = setup();
        let runtime = tokio::runtime::Handle::current();

        std::thread::scope(|scope| {
            let writer = batcher.clone();
            let handle = runtime.clone();
            scope.spawn(move || {
                let _enter = handle.enter();
                for n in 0..500 {
                    writer.queue(WidgetKind::KpiBlock, json!({ "main": n }));
                    writer.flush();
                }
            });
            let flusher = batcher.clone();
            scope.spawn(move || {
                for _ in 0..500 {
                    flusher.flush();
                }
            });
        });

        let values: Vec<i64> = seen
            .lock()
            .iter()
            .filter_map(|(_, data)| data["main"].as_i64())
            .collect();
        assert!(values.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(values.last(), Some(&499));
    }
}

//! Comment Queue Manager
//!
//! Two admission paths feed the chat log:
//!
//! - **buffered** (`queue`): comments collect for `buffer_interval`, then
//!   `flush_buffer` renders them one by one, spread evenly across the next
//!   interval (`buffer_interval / count`, clamped to `min..=max`).
//! - **instant** (`add_instant`): rendered immediately when idle, otherwise
//!   drained at a fixed `instant_interval`.
//!
//! An id is accepted at most once across both paths: it is rejected while it
//! sits in any queue and, after rendering, while it is in the rotating
//! processed set.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use serde_json::json;
use tracing::{debug, info, warn};

use super::processed::RotatingIdSet;
use crate::registry::WidgetRegistry;
use crate::types::{ChatComment, WidgetKind};
use crate::utils::TaskGuard;

#[derive(Debug, Clone)]
pub struct CommentQueueConfig {
    pub buffer_interval: Duration,
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub instant_interval: Duration,
}

impl Default for CommentQueueConfig {
    fn default() -> Self {
        Self {
            buffer_interval: Duration::from_millis(5000),
            min_interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(1000),
            instant_interval: Duration::from_millis(150),
        }
    }
}

#[derive(Default)]
struct QueueState {
    buffer_queue: VecDeque<ChatComment>,
    draining: VecDeque<ChatComment>,
    instant_queue: VecDeque<ChatComment>,
    processed: RotatingIdSet,
    processing_buffer: bool,
    processing_instant: bool,
    buffer_interval: Duration,
    pace: Duration,
    flush_timer: Option<TaskGuard>,
    drain_timer: Option<TaskGuard>,
    instant_timer: Option<TaskGuard>,
}

impl QueueState {
    fn is_known(&self, id: &str) -> bool {
        let queued = |queue: &VecDeque<ChatComment>| queue.iter().any(|c| c.key() == Some(id));
        self.processed.contains(id)
            || queued(&self.buffer_queue)
            || queued(&self.draining)
            || queued(&self.instant_queue)
    }

    /// Mark `comment` processed as it leaves the queues for the chat log
    fn take_for_render(&mut self, comment: ChatComment) -> ChatComment {
        if let Some(id) = comment.key() {
            self.processed.insert(id);
        }
        comment
    }
}

pub struct CommentQueueManager {
    me: Weak<CommentQueueManager>,
    registry: Arc<WidgetRegistry>,
    config: CommentQueueConfig,
    state: Mutex<QueueState>,
}

impl CommentQueueManager {
    pub fn new(registry: Arc<WidgetRegistry>, config: CommentQueueConfig) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            registry,
            state: Mutex::new(QueueState {
                buffer_interval: config.buffer_interval,
                pace: config.max_interval,
                ..Default::default()
            }),
            config,
        })
    }

    /// Buffered path; returns `false` if the comment was rejected
    pub fn queue(&self, comment: ChatComment) -> bool {
        let mut state = self.state.lock();
        let Some(id) = comment.key() else {
            warn!("dropping buffered comment without id");
            return false;
        };
        if state.is_known(id) {
            debug!(id, "duplicate comment ignored");
            return false;
        }
        state.buffer_queue.push_back(comment);

        if state.flush_timer.is_none() {
            let me = self.me.clone();
            state.flush_timer = Some(TaskGuard::after(state.buffer_interval, move || {
                if let Some(queue) = me.upgrade() {
                    queue.flush_tick();
                }
            }));
        }
        true
    }

    /// Move the buffer into processing and start (or re-pace) the drain
    pub fn flush_buffer(&self) {
        let mut state = self.state.lock();
        state.flush_timer = None;
        self.start_draining(state);
    }

    /// Instant path; returns `false` if the comment was rejected
    pub fn add_instant(&self, comment: ChatComment) -> bool {
        let render = {
            let mut state = self.state.lock();
            let Some(id) = comment.key() else {
                warn!("dropping instant comment without id");
                return false;
            };
            if state.is_known(id) {
                debug!(id, "duplicate comment ignored");
                return false;
            }

            if state.processing_instant {
                state.instant_queue.push_back(comment);
                return true;
            }

            state.processing_instant = true;
            let me = self.me.clone();
            state.instant_timer = Some(TaskGuard::every(self.config.instant_interval, move || {
                if let Some(queue) = me.upgrade() {
                    queue.instant_tick();
                }
            }));
            state.take_for_render(comment)
        };
        self.render(&render);
        true
    }

    /// Moderation: forget `id` everywhere and take it off the chat log
    ///
    /// Returns `true` if the comment was still waiting in a queue.
    pub fn remove(&self, id: &str) -> bool {
        let was_queued = {
            let mut state = self.state.lock();
            let before = state.buffer_queue.len() + state.draining.len() + state.instant_queue.len();
            let keep = |c: &ChatComment| c.key() != Some(id);
            state.buffer_queue.retain(keep);
            state.draining.retain(keep);
            state.instant_queue.retain(keep);
            state.processed.insert(id);
            before != state.buffer_queue.len() + state.draining.len() + state.instant_queue.len()
        };
        self.registry
            .broadcast(WidgetKind::ChatLog, &json!({ "action": "remove", "id": id }));
        was_queued
    }

    /// Change the buffering window; takes effect from the next flush
    pub fn set_buffer_interval(&self, interval: Duration) {
        if interval.is_zero() {
            debug!("ignoring zero buffer interval");
            return;
        }
        self.state.lock().buffer_interval = interval;
        info!(buffer_interval_ms = interval.as_millis() as u64, "comment buffer interval updated");
    }

    pub fn buffer_interval(&self) -> Duration {
        self.state.lock().buffer_interval
    }

    pub fn is_duplicate(&self, id: &str) -> bool {
        self.state.lock().is_known(id)
    }

    /// Interval between buffered renders chosen at the last flush
    pub fn pace(&self) -> Duration {
        self.state.lock().pace
    }

    pub fn buffered_count(&self) -> usize {
        self.state.lock().buffer_queue.len()
    }

    pub fn draining_count(&self) -> usize {
        self.state.lock().draining.len()
    }

    pub fn instant_count(&self) -> usize {
        self.state.lock().instant_queue.len()
    }

    pub fn processed_count(&self) -> usize {
        self.state.lock().processed.len()
    }

    /// Cancel every timer and clear all queues
    pub fn destroy(&self) {
        let mut state = self.state.lock();
        state.flush_timer = None;
        state.drain_timer = None;
        state.instant_timer = None;
        state.buffer_queue.clear();
        state.draining.clear();
        state.instant_queue.clear();
        state.processed.clear();
        state.processing_buffer = false;
        state.processing_instant = false;
    }

    fn flush_tick(&self) {
        let mut state = self.state.lock();
        if let Some(timer) = state.flush_timer.take() {
            timer.detach();
        }
        self.start_draining(state);
    }

    fn start_draining(&self, mut state: MutexGuard<'_, QueueState>) {
        let incoming: Vec<_> = state.buffer_queue.drain(..).collect();
        state.draining.extend(incoming);
        let count = state.draining.len();
        if count == 0 {
            return;
        }

        let per_item = state.buffer_interval / count as u32;
        let pace = per_item.clamp(self.config.min_interval, self.config.max_interval);
        state.pace = pace;

        let me = self.me.clone();
        let drain = TaskGuard::every(pace, move || {
            if let Some(queue) = me.upgrade() {
                queue.drain_tick();
            }
        });

        if state.processing_buffer {
            // Re-pace the running drain from the combined remaining count
            state.drain_timer = Some(drain);
            debug!(remaining = count, pace_ms = pace.as_millis() as u64, "re-paced comment drain");
            return;
        }

        state.processing_buffer = true;
        state.drain_timer = Some(drain);
        debug!(count, pace_ms = pace.as_millis() as u64, "flushing comment buffer");
        let first = state.draining.pop_front().map(|c| state.take_for_render(c));
        if state.draining.is_empty() {
            Self::stop_draining(&mut state);
        }
        drop(state);

        if let Some(comment) = first {
            self.render(&comment);
        }
    }

    fn drain_tick(&self) {
        let next = {
            let mut state = self.state.lock();
            let next = state.draining.pop_front().map(|c| state.take_for_render(c));
            if state.draining.is_empty() {
                Self::stop_draining(&mut state);
            }
            next
        };
        if let Some(comment) = next {
            self.render(&comment);
        }
    }

    fn stop_draining(state: &mut QueueState) {
        state.processing_buffer = false;
        state.drain_timer = None;
    }

    fn instant_tick(&self) {
        let next = {
            let mut state = self.state.lock();
            match state.instant_queue.pop_front() {
                Some(comment) => Some(state.take_for_render(comment)),
                None => {
                    state.processing_instant = false;
                    state.instant_timer = None;
                    None
                }
            }
        };
        if let Some(comment) = next {
            self.render(&comment);
        }
    }

    fn render(&self, comment: &ChatComment) {
        self.registry
            .broadcast(WidgetKind::ChatLog, &json!({ "action": "add", "comment": comment }));
    }
}

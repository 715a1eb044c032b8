//! Transient Card Queue
//!
//! Bounded display for paid-message cards. At most `max_display` cards are
//! visible; the rest wait in arrival order. Removing a visible card plays an
//! exit animation first, and the slot is only handed to the next waiting
//! card once the exit completes.
//!
//! Exit completion has three possible sources: the animation timer, an
//! explicit `animation_ended` call from the host, and a fallback timeout.
//! Whichever arrives first removes the card; later arrivals find nothing
//! to complete.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::limits;
use crate::registry::WidgetRegistry;
use crate::types::{SuperchatCard, WidgetKind};
use crate::utils::TaskGuard;

#[derive(Debug, Clone)]
pub struct CardQueueConfig {
    pub max_display: usize,
    pub queue_enabled: bool,
    /// Length of the exit animation
    pub exit_animation: Duration,
    /// Upper bound on waiting for the exit to complete
    pub exit_fallback: Duration,
    /// How long a card stays up before leaving on its own; zero disables
    pub display_duration: Duration,
}

impl Default for CardQueueConfig {
    fn default() -> Self {
        Self {
            max_display: 1,
            queue_enabled: true,
            exit_animation: Duration::from_millis(400),
            exit_fallback: Duration::from_millis(1000),
            display_duration: Duration::from_secs(60),
        }
    }
}

struct DisplayedCard {
    id: String,
    /// Auto-dismiss timer
    dwell: Option<TaskGuard>,
    /// Animation and fallback timers, set once the exit has started
    exit: Option<(TaskGuard, TaskGuard)>,
}

struct CardState {
    displayed: Vec<DisplayedCard>,
    waiting: VecDeque<SuperchatCard>,
    max_display: usize,
    queue_enabled: bool,
    display_duration: Duration,
}

impl CardState {
    fn position(&self, id: &str) -> Option<usize> {
        self.displayed.iter().position(|card| card.id == id)
    }

    fn is_waiting(&self, id: &str) -> bool {
        self.waiting.iter().any(|card| card.key() == Some(id))
    }
}

pub struct TransientCardQueue {
    me: Weak<TransientCardQueue>,
    registry: Arc<WidgetRegistry>,
    exit_animation: Duration,
    exit_fallback: Duration,
    state: Mutex<CardState>,
}

impl TransientCardQueue {
    pub fn new(registry: Arc<WidgetRegistry>, config: CardQueueConfig) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            registry,
            exit_animation: config.exit_animation,
            exit_fallback: config.exit_fallback,
            state: Mutex::new(CardState {
                displayed: Vec::new(),
                waiting: VecDeque::new(),
                max_display: limits::clamp(config.max_display, &limits::CARD_MAX_DISPLAY),
                queue_enabled: config.queue_enabled,
                display_duration: config.display_duration,
            }),
        })
    }

    /// Show `card` now, or queue it if the display is full
    ///
    /// Returns `false` if the card was rejected (no id, duplicate, or the
    /// display is full with queueing disabled).
    pub fn add(&self, card: SuperchatCard) -> bool {
        let show = {
            let mut state = self.state.lock();
            let Some(id) = card.key() else {
                warn!("dropping card without id");
                return false;
            };
            if state.position(id).is_some() || state.is_waiting(id) {
                debug!(id, "duplicate card ignored");
                return false;
            }

            if state.displayed.len() < state.max_display {
                self.display(&mut state, &card);
                card
            } else if state.queue_enabled {
                debug!(id, waiting = state.waiting.len() + 1, "card queued");
                state.waiting.push_back(card);
                return true;
            } else {
                info!(id, "display full and queueing disabled, card dropped");
                return false;
            }
        };
        self.show(&show);
        true
    }

    /// Start the exit of a visible card, or drop a waiting one
    ///
    /// Returns `false` for unknown ids and cards already leaving.
    pub fn remove(&self, id: &str) -> bool {
        {
            let mut state = self.state.lock();
            if let Some(at) = state.waiting.iter().position(|card| card.key() == Some(id)) {
                state.waiting.remove(at);
                debug!(id, "waiting card removed");
                return true;
            }

            let Some(at) = state.position(id) else {
                return false;
            };
            let entry = &mut state.displayed[at];
            if entry.exit.is_some() {
                return false;
            }
            entry.dwell = None;
            entry.exit = Some((
                self.completion_after(id, self.exit_animation),
                self.completion_after(id, self.exit_fallback),
            ));
        }

        self.registry
            .broadcast(WidgetKind::SuperChatCard, &json!({ "action": "exit", "id": id }));
        true
    }

    /// Host signal that the exit animation of `id` has finished
    pub fn animation_ended(&self, id: &str) {
        self.complete_exit(id);
    }

    /// Promote waiting cards while there is room
    pub fn process_queue(&self) {
        let promoted: Vec<SuperchatCard> = {
            let mut state = self.state.lock();
            let mut promoted = Vec::new();
            while state.displayed.len() < state.max_display {
                let Some(card) = state.waiting.pop_front() else {
                    break;
                };
                self.display(&mut state, &card);
                promoted.push(card);
            }
            promoted
        };
        for card in &promoted {
            self.show(card);
        }
    }

    /// Apply new display limits live
    pub fn update_settings(&self, max_display: usize, queue_enabled: bool) {
        {
            let mut state = self.state.lock();
            state.max_display = limits::clamp(max_display, &limits::CARD_MAX_DISPLAY);
            state.queue_enabled = queue_enabled;
            info!(max_display = state.max_display, queue_enabled, "card queue settings updated");
        }
        self.process_queue();
    }

    /// Default dwell time for cards shown from now on
    pub fn set_display_duration(&self, duration: Duration) {
        self.state.lock().display_duration = duration;
    }

    pub fn displayed_count(&self) -> usize {
        self.state.lock().displayed.len()
    }

    pub fn waiting_count(&self) -> usize {
        self.state.lock().waiting.len()
    }

    pub fn max_display(&self) -> usize {
        self.state.lock().max_display
    }

    pub fn is_displayed(&self, id: &str) -> bool {
        self.state.lock().position(id).is_some()
    }

    /// Cancel all timers and forget every card
    pub fn destroy(&self) {
        let mut state = self.state.lock();
        state.displayed.clear();
        state.waiting.clear();
    }

    /// Record `card` as visible and arm its dwell timer; caller broadcasts
    fn display(&self, state: &mut CardState, card: &SuperchatCard) {
        let Some(id) = card.key() else {
            return;
        };
        let dwell = card
            .display_duration_ms
            .map(Duration::from_millis)
            .unwrap_or(state.display_duration);
        let dwell = (!dwell.is_zero()).then(|| {
            let me = self.me.clone();
            let id = id.to_string();
            TaskGuard::after(dwell, move || {
                if let Some(queue) = me.upgrade() {
                    queue.remove(&id);
                }
            })
        });
        state.displayed.push(DisplayedCard {
            id: id.to_string(),
            dwell,
            exit: None,
        });
    }

    fn completion_after(&self, id: &str, delay: Duration) -> TaskGuard {
        let me = self.me.clone();
        let id = id.to_string();
        TaskGuard::after(delay, move || {
            if let Some(queue) = me.upgrade() {
                queue.complete_exit(&id);
            }
        })
    }

    fn complete_exit(&self, id: &str) {
        {
            let mut state = self.state.lock();
            let Some(at) = state.position(id) else {
                return;
            };
            if state.displayed[at].exit.is_none() {
                return;
            }
            state.displayed.remove(at);
        }
        debug!(id, "card exit completed");
        self.registry
            .broadcast(WidgetKind::SuperChatCard, &json!({ "action": "removed", "id": id }));
        self.process_queue();
    }

    fn show(&self, card: &SuperchatCard) {
        self.registry
            .broadcast(WidgetKind::SuperChatCard, &json!({ "action": "show", "card": card }));
    }
}

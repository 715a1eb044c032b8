//! Settings Bootstrapper
//!
//! Fetches the settings document once per connection open (or page show)
//! and hands it to the overlay. Pushed `settings:update` messages bump a
//! version counter; a fetch that started before a push is stale and is
//! discarded so it cannot overwrite newer settings.

mod source;

pub use source::{HttpSettingsSource, SettingsSource};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::ClientResult;
use crate::types::OverlaySettings;

/// Receiver of a complete settings document
pub trait SettingsApplier: Send + Sync {
    fn apply_settings(&self, settings: &OverlaySettings);
}

/// Result of one `fetch_and_apply` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Already fetched, or a fetch is in flight
    Skipped,
    Applied,
    /// Fetched, but a push arrived meanwhile
    Stale,
    Failed,
}

#[derive(Debug, Default)]
struct BootState {
    in_flight: bool,
    succeeded: bool,
    /// Bumped by `reset` so a fetch from before the reset cannot touch the flags
    epoch: u64,
}

pub struct SettingsBootstrapper {
    source: Arc<dyn SettingsSource>,
    applier: Arc<dyn SettingsApplier>,
    timeout: Duration,
    state: Mutex<BootState>,
    settings_version: AtomicU64,
}

impl SettingsBootstrapper {
    pub fn new(
        source: Arc<dyn SettingsSource>,
        applier: Arc<dyn SettingsApplier>,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            applier,
            timeout,
            state: Mutex::new(BootState::default()),
            settings_version: AtomicU64::new(0),
        }
    }

    /// Fetch and apply settings unless already done or in progress
    ///
    /// Never fails: errors and timeouts are logged and leave the
    /// bootstrapper ready for another attempt.
    pub async fn fetch_and_apply(&self) -> FetchOutcome {
        let epoch = {
            let mut state = self.state.lock();
            if state.in_flight || state.succeeded {
                debug!(in_flight = state.in_flight, "settings fetch skipped");
                return FetchOutcome::Skipped;
            }
            state.in_flight = true;
            state.epoch
        };
        let flight = InFlight { owner: self, epoch };

        let started_version = self.settings_version();
        let outcome = match timeout(self.timeout, self.source.fetch()).await {
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "settings fetch timed out");
                FetchOutcome::Failed
            }
            Ok(Err(e)) => {
                warn!(error = %e, "settings fetch failed");
                FetchOutcome::Failed
            }
            Ok(Ok(_)) if self.settings_version() != started_version => {
                info!("discarding fetched settings, newer settings were pushed");
                FetchOutcome::Stale
            }
            Ok(Ok(settings)) => {
                self.applier.apply_settings(&settings);
                info!("settings applied");
                FetchOutcome::Applied
            }
        };

        flight.finish(outcome != FetchOutcome::Failed);
        outcome
    }

    /// Forget the previous fetch so the next `fetch_and_apply` runs again
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.in_flight = false;
        state.succeeded = false;
        state.epoch += 1;
    }

    /// Apply a pushed settings document
    pub fn apply_pushed(&self, payload: &Value) -> ClientResult<()> {
        let version = self.settings_version.fetch_add(1, Ordering::SeqCst) + 1;
        let settings: OverlaySettings = serde_json::from_value(payload.clone())?;
        self.applier.apply_settings(&settings);
        info!(version, "pushed settings applied");
        Ok(())
    }

    pub fn settings_version(&self) -> u64 {
        self.settings_version.load(Ordering::SeqCst)
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.lock().in_flight
    }

    pub fn has_succeeded(&self) -> bool {
        self.state.lock().succeeded
    }
}

/// Clears `in_flight` even if the fetching future is dropped midway
struct InFlight<'a> {
    owner: &'a SettingsBootstrapper,
    epoch: u64,
}

impl InFlight<'_> {
    fn finish(self, succeeded: bool) {
        {
            let mut state = self.owner.state.lock();
            if state.epoch == self.epoch {
                state.succeeded = succeeded;
            }
        }
        // Dropping `self` clears `in_flight`
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.owner.state.lock();
        if state.epoch == self.epoch {
            state.in_flight = false;
        }
    }
}

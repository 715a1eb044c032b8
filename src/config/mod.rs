//! Client configuration
//!
//! Process-level settings come from environment variables (mirroring how
//! the producer side is configured); per-component tuning lives in the
//! `Default` impls of each component's config struct.

pub mod limits;

use std::env;
use std::ops::RangeInclusive;
use std::time::Duration;

use tracing::warn;

/// Default push channel endpoint
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:19801/ws";

/// Default settings document endpoint
pub const DEFAULT_SETTINGS_URL: &str = "http://127.0.0.1:19800/api/overlay/settings";

/// Exponential reconnect backoff
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt (and after any successful open)
    pub initial_delay: Duration,
    /// Ceiling for the doubled delay
    pub max_delay: Duration,
    /// Upper bound for a single connect attempt
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Top-level configuration for the overlay client process
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub ws_url: String,
    pub settings_url: String,
    pub settings_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// How often the binary logs the rendered slot views (zero disables)
    pub snapshot_interval: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            settings_url: DEFAULT_SETTINGS_URL.to_string(),
            settings_timeout: Duration::from_millis(5000),
            heartbeat_interval: Duration::from_secs(30),
            snapshot_interval: Duration::ZERO,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Build a configuration from `OVERLAY_*` environment variables
    ///
    /// Unset variables keep their defaults; unparsable numbers are logged
    /// and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("OVERLAY_WS_URL") {
            config.ws_url = url;
        }
        if let Ok(url) = env::var("OVERLAY_SETTINGS_URL") {
            config.settings_url = url;
        }
        if let Some(ms) = read_u64("OVERLAY_SETTINGS_TIMEOUT_MS", &limits::SETTINGS_TIMEOUT_MS) {
            config.settings_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = read_u64("OVERLAY_HEARTBEAT_SECS", &limits::LOOP_INTERVAL_SECS) {
            config.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = read_u64("OVERLAY_SNAPSHOT_SECS", &limits::LOOP_INTERVAL_SECS) {
            config.snapshot_interval = Duration::from_secs(secs);
        }

        config
    }
}

/// Read a numeric variable, clamped into `range`
fn read_u64(key: &str, range: &RangeInclusive<u64>) -> Option<u64> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(v) => {
            let clamped = limits::clamp(v, range);
            if clamped != v {
                warn!(key, value = v, clamped, "numeric setting out of range");
            }
            Some(clamped)
        }
        Err(e) => {
            warn!(key, value = %raw, error = %e, "ignoring invalid numeric setting");
            None
        }
    }
}

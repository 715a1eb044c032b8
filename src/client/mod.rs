//! Overlay client entry point
//!
//! Wires the connection manager, settings bootstrapper and overlay context
//! together and runs the event loop:
//!
//! - `Opened`  → fetch settings (once per open)
//! - `Message` → route into the pipeline
//! - `Closed`  → forget the last fetch so the next open fetches again
//!
//! Host visibility arrives through `page_hide` / `page_show`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::realtime::{
    handle_server_message, ConnectionEvent, ConnectionManager, ConnectionState, Connector,
    OutboundMessage, OverlayContext, PipelineConfig, WsConnector,
};
use crate::registry::WidgetFactory;
use crate::settings::{HttpSettingsSource, SettingsApplier, SettingsBootstrapper, SettingsSource};
use crate::utils::TaskGuard;
use crate::widgets::BuiltinWidgets;

pub struct OverlayClient {
    config: ClientConfig,
    context: Arc<OverlayContext>,
    connection: Arc<ConnectionManager>,
    settings: Arc<SettingsBootstrapper>,
    events: Mutex<Option<mpsc::UnboundedReceiver<ConnectionEvent>>>,
    fetch_task: Mutex<Option<TaskGuard>>,
}

impl OverlayClient {
    /// Production client: WebSocket transport, HTTP settings, built-in widgets
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        if config.ws_url.is_empty() {
            return Err(ClientError::Config("websocket url is empty".to_string()));
        }
        let connector = Arc::new(WsConnector::new(config.reconnect.connect_timeout));
        let source = Arc::new(HttpSettingsSource::new(
            config.settings_url.clone(),
            config.settings_timeout,
        )?);
        Ok(Self::with_parts(
            config,
            BuiltinWidgets,
            connector,
            source,
            PipelineConfig::default(),
        ))
    }

    /// Client with every seam supplied by the caller
    pub fn with_parts(
        config: ClientConfig,
        factory: impl WidgetFactory + 'static,
        connector: Arc<dyn Connector>,
        source: Arc<dyn SettingsSource>,
        pipeline: PipelineConfig,
    ) -> Self {
        let context = OverlayContext::with_config(factory, pipeline);
        let applier: Arc<dyn SettingsApplier> = context.clone();
        let settings = Arc::new(SettingsBootstrapper::new(source, applier, config.settings_timeout));
        let (connection, events) =
            ConnectionManager::new(config.ws_url.clone(), connector, config.reconnect.clone());

        Self {
            config,
            context,
            connection,
            settings,
            events: Mutex::new(Some(events)),
            fetch_task: Mutex::new(None),
        }
    }

    pub fn context(&self) -> &Arc<OverlayContext> {
        &self.context
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn settings(&self) -> &Arc<SettingsBootstrapper> {
        &self.settings
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped)
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> ClientResult<()> {
        let mut events = self
            .events
            .lock()
            .take()
            .ok_or_else(|| ClientError::Config("client is already running".to_string()))?;

        self.context.start();
        self.connection.connect();

        let (mut heartbeat, heartbeat_on) = ticker(self.config.heartbeat_interval);
        let (mut snapshot, snapshot_on) = ticker(self.config.snapshot_interval);
        info!(url = %self.config.ws_url, "overlay client running");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => break,
                    }
                }
                _ = heartbeat.tick(), if heartbeat_on => self.send_heartbeat(),
                _ = snapshot.tick(), if snapshot_on => self.log_snapshot(),
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Host hid the page: drop the connection and pause widgets
    pub fn page_hide(&self) {
        info!("page hidden");
        self.connection.cleanup();
        self.context.set_paused(true);
    }

    /// Host showed the page again: reconnect, refetch settings, resume
    pub fn page_show(&self) {
        info!("page shown");
        self.settings.reset();
        let reconnecting = self.connection.reinitialize();
        if !reconnecting && self.connection.state() == ConnectionState::Open {
            // No new open event will come, so fetch now
            self.spawn_fetch();
        }
        self.context.set_paused(false);
    }

    /// Stop everything; pending batched updates are delivered first
    pub fn shutdown(&self) {
        self.fetch_task.lock().take();
        self.connection.cleanup();
        self.context.shutdown();
        info!("overlay client stopped");
    }

    fn handle_event(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => self.spawn_fetch(),
            ConnectionEvent::Message(text) => {
                handle_server_message(&self.context, &self.settings, &text);
            }
            ConnectionEvent::Closed => {
                debug!("connection closed, settings will be refetched on next open");
                self.settings.reset();
            }
        }
    }

    fn spawn_fetch(&self) {
        let mut running = self.fetch_task.lock();
        if running.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("settings fetch already running");
            return;
        }
        let settings = self.settings.clone();
        *running = Some(TaskGuard::spawn(async move {
            let outcome = settings.fetch_and_apply().await;
            debug!(?outcome, "settings bootstrap finished");
        }));
    }

    fn send_heartbeat(&self) {
        if self.connection.state() != ConnectionState::Open {
            return;
        }
        let sent = OutboundMessage::Ping
            .to_text()
            .and_then(|text| self.connection.send(text));
        if let Err(e) = sent {
            warn!(error = %e, "heartbeat failed");
        }
    }

    fn log_snapshot(&self) {
        for (slot, lines) in self.context.registry.snapshot() {
            info!(%slot, view = %lines.join(" | "), "slot");
        }
    }
}

/// Interval ticking every `period`; disabled (never polled) when zero or
/// too far out to schedule
fn ticker(period: Duration) -> (Interval, bool) {
    let now = Instant::now();
    let first = match now.checked_add(period) {
        Some(first) if !period.is_zero() => Some(first),
        Some(_) => None,
        None => {
            warn!(?period, "period too large, ticker disabled");
            None
        }
    };
    let enabled = first.is_some();
    let idle = Duration::from_secs(3600);
    let (first, period) = first.map_or((now + idle, idle), |first| (first, period));
    let mut interval = interval_at(first, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    (interval, enabled)
}

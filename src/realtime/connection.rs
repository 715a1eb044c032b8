//! Connection Manager
//!
//! Owns the single push-channel connection. Unexpected closes are retried
//! with doubling backoff; a deliberate `cleanup` (page hidden, shutdown)
//! suppresses reconnects until `reinitialize`.
//!
//! Every connect attempt gets a generation number. Callbacks from an older
//! generation (a link torn down by `cleanup`, or superseded) are ignored, so
//! a late close can never schedule a reconnect for a connection that no
//! longer exists.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::events::ConnectionEvent;
use super::transport::Connector;
use crate::config::ReconnectPolicy;
use crate::error::{ClientError, ClientResult};
use crate::utils::TaskGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

struct ConnectionInner {
    state: ConnectionState,
    reconnect_delay: Duration,
    shutting_down: bool,
    generation: u64,
    outgoing: Option<mpsc::UnboundedSender<String>>,
    /// Connect attempt followed by the read loop
    session: Option<TaskGuard>,
    reconnect_timer: Option<TaskGuard>,
}

pub struct ConnectionManager {
    me: Weak<ConnectionManager>,
    url: String,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    inner: Mutex<ConnectionInner>,
    connections_created: AtomicU64,
}

impl ConnectionManager {
    /// Create a manager; connection events arrive on the returned receiver
    pub fn new(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let manager = Arc::new_cyclic(|me| Self {
            me: me.clone(),
            url: url.into(),
            connector,
            inner: Mutex::new(ConnectionInner {
                state: ConnectionState::Closed,
                reconnect_delay: policy.initial_delay,
                shutting_down: false,
                generation: 0,
                outgoing: None,
                session: None,
                reconnect_timer: None,
            }),
            policy,
            events,
            connections_created: AtomicU64::new(0),
        });
        (manager, receiver)
    }

    /// Start a connection attempt unless one is already connecting or open
    ///
    /// Returns `true` if a new attempt was started.
    pub fn connect(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != ConnectionState::Closed {
            debug!(state = ?inner.state, "connect skipped, connection already active");
            return false;
        }
        if inner.shutting_down {
            debug!("connect skipped while shutting down");
            return false;
        }

        inner.generation += 1;
        inner.state = ConnectionState::Connecting;
        inner.reconnect_timer = None;
        self.connections_created.fetch_add(1, Ordering::SeqCst);

        let generation = inner.generation;
        let me = self.me.clone();
        let events = self.events.clone();
        let attempt = self.connector.connect(&self.url);
        info!(url = %self.url, generation, "connecting");

        inner.session = Some(TaskGuard::spawn(async move {
            let link = match attempt.await {
                Ok(link) => link,
                Err(e) => {
                    warn!(error = %e, "connect attempt failed");
                    if let Some(manager) = me.upgrade() {
                        manager.on_closed(generation);
                    }
                    return;
                }
            };

            // Dropping `_transport` (session end or abort) closes the socket
            let (mut incoming, outgoing, _transport) = link.into_parts();
            let opened = me
                .upgrade()
                .is_some_and(|manager| manager.on_open(generation, outgoing));
            if !opened {
                return;
            }

            while let Some(text) = incoming.recv().await {
                if events.send(ConnectionEvent::Message(text)).is_err() {
                    break;
                }
            }

            if let Some(manager) = me.upgrade() {
                manager.on_closed(generation);
            }
        }));
        true
    }

    /// Tear the connection down and suppress reconnects
    pub fn cleanup(&self) {
        let was_open = {
            let mut inner = self.inner.lock();
            inner.shutting_down = true;
            inner.generation += 1;
            inner.reconnect_timer = None;
            inner.session = None;
            inner.outgoing = None;
            let was_open = inner.state == ConnectionState::Open;
            inner.state = ConnectionState::Closed;
            was_open
        };
        info!("connection cleaned up");
        if was_open {
            let _ = self.events.send(ConnectionEvent::Closed);
        }
    }

    /// Allow reconnects again and connect if currently closed
    ///
    /// An existing connecting/open connection is kept as is.
    pub fn reinitialize(&self) -> bool {
        {
            let mut inner = self.inner.lock();
            inner.shutting_down = false;
            inner.reconnect_delay = self.policy.initial_delay;
            if inner.state != ConnectionState::Closed {
                debug!(state = ?inner.state, "reinitialize kept active connection");
                return false;
            }
        }
        self.connect()
    }

    /// Write `text` to the open connection
    pub fn send(&self, text: impl Into<String>) -> ClientResult<()> {
        let inner = self.inner.lock();
        match (&inner.state, &inner.outgoing) {
            (ConnectionState::Open, Some(outgoing)) => outgoing
                .send(text.into())
                .map_err(|_| ClientError::NotConnected),
            _ => Err(ClientError::NotConnected),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.lock().shutting_down
    }

    /// Delay that the next unexpected close will wait before reconnecting
    pub fn reconnect_delay(&self) -> Duration {
        self.inner.lock().reconnect_delay
    }

    /// Number of connection attempts started so far
    pub fn connections_created(&self) -> u64 {
        self.connections_created.load(Ordering::SeqCst)
    }

    fn on_open(&self, generation: u64, outgoing: mpsc::UnboundedSender<String>) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.generation != generation || inner.shutting_down {
                debug!(generation, "dropping link from a stale attempt");
                return false;
            }
            inner.state = ConnectionState::Open;
            inner.reconnect_delay = self.policy.initial_delay;
            inner.outgoing = Some(outgoing);
        }
        info!(generation, "connection open");
        let _ = self.events.send(ConnectionEvent::Opened);
        true
    }

    fn on_closed(&self, generation: u64) {
        let was_open = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return;
            }
            // Runs on the session task itself
            if let Some(session) = inner.session.take() {
                session.detach();
            }
            inner.outgoing = None;
            let was_open = inner.state == ConnectionState::Open;
            inner.state = ConnectionState::Closed;

            if !inner.shutting_down {
                let delay = inner.reconnect_delay;
                inner.reconnect_delay = (delay * 2).min(self.policy.max_delay);
                let me = self.me.clone();
                inner.reconnect_timer = Some(TaskGuard::after(delay, move || {
                    if let Some(manager) = me.upgrade() {
                        manager.reconnect();
                    }
                }));
                info!(delay_ms = delay.as_millis() as u64, "connection lost, reconnect scheduled");
            }
            was_open
        };

        if was_open {
            let _ = self.events.send(ConnectionEvent::Closed);
        }
    }

    fn reconnect(&self) {
        if let Some(timer) = self.inner.lock().reconnect_timer.take() {
            timer.detach();
        }
        self.connect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::transport::{Link, MemoryConnector, MemoryPeer};
    use futures::future::BoxFuture;
    use tokio::sync::Notify;
    use tokio::time::sleep;

    /// Connector whose attempts stay pending until the gate is opened
    struct GatedConnector {
        gate: Arc<Notify>,
        peers: Mutex<Vec<mpsc::UnboundedSender<String>>>,
    }

    impl Connector for GatedConnector {
        fn connect(&self, _url: &str) -> BoxFuture<'static, ClientResult<Link>> {
            let gate = self.gate.clone();
            let (to_client, incoming) = mpsc::unbounded_channel();
            let (outgoing, _from_client) = mpsc::unbounded_channel();
            self.peers.lock().push(to_client);
            Box::pin(async move {
                gate.notified().await;
                Ok(Link::new(incoming, outgoing))
            })
        }
    }

    fn setup() -> (
        Arc<ConnectionManager>,
        mpsc::UnboundedReceiver<ConnectionEvent>,
        MemoryConnector,
        mpsc::UnboundedReceiver<MemoryPeer>,
    ) {
        let (connector, peers) = MemoryConnector::new();
        let (manager, events) =
            ConnectionManager::new("ws://test", Arc::new(connector.clone()), ReconnectPolicy::default());
        (manager, events, connector, peers)
    }

    async fn settle() {
        sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_is_idempotent() {
        let (manager, mut events, _connector, mut peers) = setup();

        assert!(manager.connect());
        assert!(!manager.connect());
        settle().await;
        assert!(!manager.connect());

        assert_eq!(manager.connections_created(), 1);
        assert_eq!(manager.state(), ConnectionState::Open);
        assert_eq!(events.recv().await, Some(ConnectionEvent::Opened));
        assert!(peers.try_recv().is_ok());
        assert!(peers.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_flow_both_ways() {
        let (manager, mut events, _connector, mut peers) = setup();

        assert!(matches!(manager.send("early"), Err(ClientError::NotConnected)));

        manager.connect();
        settle().await;
        let mut peer = peers.recv().await.unwrap();
        assert_eq!(events.recv().await, Some(ConnectionEvent::Opened));

        peer.to_client.send("hello".to_string()).unwrap();
        assert_eq!(events.recv().await, Some(ConnectionEvent::Message("hello".to_string())));

        manager.send(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(peer.from_client.recv().await.unwrap(), r#"{"type":"ping"}"#);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_close_reconnects_with_backoff() {
        let (manager, mut events, connector, mut peers) = setup();

        manager.connect();
        settle().await;
        let peer = peers.recv().await.unwrap();
        assert_eq!(events.recv().await, Some(ConnectionEvent::Opened));

        connector.set_refusing(true);
        drop(peer);
        settle().await;
        assert_eq!(events.recv().await, Some(ConnectionEvent::Closed));
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert_eq!(manager.reconnect_delay(), Duration::from_secs(2));

        // 1s, then 2s, then 4s
        sleep(Duration::from_millis(1000)).await;
        assert_eq!(manager.connections_created(), 2);
        assert_eq!(manager.reconnect_delay(), Duration::from_secs(4));
        sleep(Duration::from_millis(2000)).await;
        assert_eq!(manager.connections_created(), 3);
        assert_eq!(manager.reconnect_delay(), Duration::from_secs(8));

        connector.set_refusing(false);
        sleep(Duration::from_millis(4000)).await;
        assert_eq!(manager.connections_created(), 4);
        assert_eq!(manager.state(), ConnectionState::Open);
        assert_eq!(manager.reconnect_delay(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_capped() {
        let (manager, _events, connector, _peers) = setup();
        connector.set_refusing(true);

        manager.connect();
        sleep(Duration::from_secs(300)).await;
        assert_eq!(manager.reconnect_delay(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_suppresses_reconnect() {
        let (manager, mut events, _connector, mut peers) = setup();

        manager.connect();
        settle().await;
        let _peer = peers.recv().await.unwrap();
        assert_eq!(events.recv().await, Some(ConnectionEvent::Opened));

        manager.cleanup();
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert_eq!(events.recv().await, Some(ConnectionEvent::Closed));
        assert!(!manager.connect());

        sleep(Duration::from_secs(60)).await;
        assert_eq!(manager.connections_created(), 1);

        assert!(manager.reinitialize());
        settle().await;
        assert_eq!(manager.connections_created(), 2);
        assert_eq!(manager.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinitialize_keeps_open_connection() {
        let (manager, _events, _connector, _peers) = setup();

        manager.connect();
        settle().await;
        assert!(!manager.reinitialize());
        assert_eq!(manager.connections_created(), 1);
        assert_eq!(manager.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinitialize_while_connecting_is_idempotent() {
        let gate = Arc::new(Notify::new());
        let connector = GatedConnector {
            gate: gate.clone(),
            peers: Mutex::new(Vec::new()),
        };
        let (manager, mut events) =
            ConnectionManager::new("ws://test", Arc::new(connector), ReconnectPolicy::default());

        assert!(manager.connect());
        settle().await;
        assert_eq!(manager.state(), ConnectionState::Connecting);

        assert!(!manager.reinitialize());
        assert!(!manager.connect());
        assert_eq!(manager.connections_created(), 1);

        gate.notify_one();
        assert_eq!(events.recv().await, Some(ConnectionEvent::Opened));
        assert_eq!(manager.state(), ConnectionState::Open);

        assert!(!manager.reinitialize());
        settle().await;
        assert_eq!(manager.connections_created(), 1);
    }
}

//! Push-channel transport
//!
//! A `Connector` turns a URL into a `Link`: a pair of text channels. The
//! connection manager only ever sees the link, so tests can drive it with
//! an in-memory connector instead of a socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::utils::TaskGuard;

/// Upper bound on the closing handshake once the link is released
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// An open text link
///
/// `incoming` yields `None` once the remote side is gone; dropping
/// `outgoing` closes the link from this side. The link also owns the tasks
/// pumping the underlying transport, so dropping it (or the `LinkTasks`
/// taken out of it) tears the transport down.
#[derive(Debug)]
pub struct Link {
    pub incoming: mpsc::UnboundedReceiver<String>,
    pub outgoing: mpsc::UnboundedSender<String>,
    tasks: LinkTasks,
}

/// Transport pumps behind a link; aborted on drop
#[derive(Debug, Default)]
pub struct LinkTasks(Vec<TaskGuard>);

impl Link {
    pub fn new(
        incoming: mpsc::UnboundedReceiver<String>,
        outgoing: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            incoming,
            outgoing,
            tasks: LinkTasks::default(),
        }
    }

    fn with_tasks(mut self, tasks: Vec<TaskGuard>) -> Self {
        self.tasks = LinkTasks(tasks);
        self
    }

    /// Split into the two channels and the guard keeping the transport alive
    pub fn into_parts(
        self,
    ) -> (
        mpsc::UnboundedReceiver<String>,
        mpsc::UnboundedSender<String>,
        LinkTasks,
    ) {
        (self.incoming, self.outgoing, self.tasks)
    }
}

pub trait Connector: Send + Sync {
    fn connect(&self, url: &str) -> BoxFuture<'static, ClientResult<Link>>;
}

/// WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Connector for WsConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, ClientResult<Link>> {
        Box::pin(open_websocket(url.to_string(), self.connect_timeout))
    }
}

async fn open_websocket(url: String, limit: Duration) -> ClientResult<Link> {
    let (stream, _response) = timeout(limit, connect_async(url.as_str()))
        .await
        .map_err(|_| ClientError::Timeout(limit))??;
    info!(%url, "websocket handshake completed");

    let (mut ws_sender, mut ws_receiver) = stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

    // Send task: forward outgoing text until the link is dropped
    let send = TaskGuard::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if ws_sender.send(Message::text(text)).await.is_err() {
                return;
            }
        }
        if timeout(CLOSE_GRACE, ws_sender.close()).await.is_err() {
            debug!("close handshake timed out");
        }
    });

    // Receive task: surface text frames until close or error
    let receive = TaskGuard::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    if in_tx.send(text.as_str().to_owned()).is_err() {
                        break;
                    }
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "server sent close frame");
                    break;
                }
                // Pings are answered by tungstenite itself
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "websocket receive failed");
                    break;
                }
            }
        }
    });

    Ok(Link::new(in_rx, out_tx).with_tasks(vec![send, receive]))
}

/// Server end of an in-process link
#[derive(Debug)]
pub struct MemoryPeer {
    pub to_client: mpsc::UnboundedSender<String>,
    pub from_client: mpsc::UnboundedReceiver<String>,
}

/// In-process connector; every successful connect hands a `MemoryPeer` to
/// whoever holds the receiver returned by `new`
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    refusing: Arc<AtomicBool>,
}

impl MemoryConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (peers, accepted) = mpsc::unbounded_channel();
        let connector = Self {
            peers,
            refusing: Arc::new(AtomicBool::new(false)),
        };
        (connector, accepted)
    }

    /// Make subsequent connects fail
    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, ClientResult<Link>> {
        let result = if self.refusing.load(Ordering::SeqCst) {
            Err(ClientError::Transport(format!("connection refused: {}", url)))
        } else {
            let (to_client, incoming) = mpsc::unbounded_channel();
            let (outgoing, from_client) = mpsc::unbounded_channel();
            self.peers
                .send(MemoryPeer { to_client, from_client })
                .map(|()| Link::new(incoming, outgoing))
                .map_err(|_| ClientError::Transport("no listener".to_string()))
        };
        Box::pin(async move { result })
    }
}

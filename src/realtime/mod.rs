//! Push channel: transport, connection lifecycle, wire messages, batching
//! and routing into the pipeline

pub mod batcher;
pub mod connection;
pub mod events;
pub mod handler;
pub mod state;
pub mod transport;

pub use batcher::{UpdateBatcher, DEFAULT_BATCH_INTERVAL_MS};
pub use connection::{ConnectionManager, ConnectionState};
pub use events::{ConnectionEvent, InboundMessage, OutboundMessage};
pub use handler::handle_server_message;
pub use state::{OverlayContext, PipelineConfig};
pub use transport::{Connector, Link, LinkTasks, MemoryConnector, MemoryPeer, WsConnector};

//! Overlay Client
//!
//! A realtime display client for stream overlays. It receives a continuous
//! stream of small, independently typed updates (viewer counts, chat, paid
//! message cards, promo text, weather, set lists) over a WebSocket and
//! renders them into a fixed set of named slots at a sustainable pace, even
//! when the producer bursts.
//!
//! # Features
//!
//! - **Reconnecting transport**: exponential backoff, suppressed while hidden
//! - **Per-kind coalescing**: telemetry updates collapse to the latest value per tick
//! - **Density detection**: sliding-window overload detector with self-healing sweep
//! - **Comment pacing**: buffered and instant paths with global dedup
//! - **Bounded cards**: at most `maxDisplay` paid cards, the rest queued FIFO
//! - **Settings bootstrap**: one fetch per connection, stale fetches discarded
//!
//! # Modules
//!
//! - `types`: slots, widget kinds, templates, payloads, settings document
//! - `registry`: widget trait, factory seam, mount/broadcast/dispatch
//! - `widgets`: built-in thin text widgets
//! - `pipeline`: density monitor, comment queue, card queue
//! - `realtime`: transport, connection manager, batcher, message routing
//! - `settings`: settings bootstrapper and sources
//! - `client`: event loop and host lifecycle signals
//! - `config`: environment configuration and clamp ranges
//! - `utils`: owned timer handles and time helpers
//!
//! # Example
//!
//! ```no_run
//! use overlay_client::{ClientConfig, OverlayClient};
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> overlay_client::ClientResult<()> {
//!     let client = OverlayClient::new(ClientConfig::from_env())?;
//!     let (_stop, shutdown) = watch::channel(false);
//!     client.run(shutdown).await
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod realtime;
pub mod registry;
pub mod settings;
pub mod types;
pub mod utils;
pub mod widgets;

// Re-export commonly used items at crate root
pub use client::OverlayClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use pipeline::{CommentQueueManager, DensityMonitor, TransientCardQueue};
pub use realtime::{ConnectionManager, ConnectionState, OverlayContext, UpdateBatcher};
pub use registry::{Widget, WidgetEvent, WidgetFactory, WidgetRegistry};
pub use settings::{FetchOutcome, SettingsBootstrapper};
pub use types::{ChatComment, OverlaySettings, SlotId, SuperchatCard, WidgetKind};
pub use widgets::BuiltinWidgets;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

//! Overlay Client - Binary Entry Point
//!
//! Connects to the overlay server named by `OVERLAY_WS_URL` and renders
//! until Ctrl+C / SIGTERM.

use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use overlay_client::{ClientConfig, ClientResult, OverlayClient, NAME, VERSION};

#[tokio::main]
async fn main() -> ClientResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("OVERLAY_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ClientConfig::from_env();
    info!(name = NAME, version = VERSION, ws_url = %config.ws_url, "starting");

    let (stop, shutdown) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = stop.send(true);
    }) {
        error!(error = %e, "failed to install signal handler");
    }

    let client = OverlayClient::new(config)?;
    client.run(shutdown).await
}

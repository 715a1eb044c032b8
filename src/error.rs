//! Error types shared across the overlay client

use std::time::Duration;

use thiserror::Error;

/// Result type for overlay client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while driving the overlay pipeline
///
/// None of these are fatal to the display: transport errors trigger a
/// reconnect, widget errors are contained at the registry boundary, and
/// settings errors leave the bootstrapper retryable.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("push channel is not connected")]
    NotConnected,

    #[error("widget error: {0}")]
    Widget(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Shorthand used by widgets to report a failed operation
    pub fn widget(msg: impl Into<String>) -> Self {
        ClientError::Widget(msg.into())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Http(e.to_string())
    }
}

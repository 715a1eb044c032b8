//! Wire messages exchanged with the overlay server

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientResult;
use crate::types::{ChatComment, RemovePayload, SuperchatCard};

/// Messages pushed by the server
///
/// Telemetry payloads stay as raw JSON: they are coalesced by kind and
/// only the widget that renders them knows their shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    /// New chat comment
    #[serde(rename = "comment:add", alias = "comment")]
    CommentAdd {
        payload: ChatComment,
        /// Bypass buffering and render right away
        #[serde(default)]
        instant: bool,
        /// Producer's preferred buffering window
        #[serde(default, skip_serializing_if = "Option::is_none")]
        buffer_interval_ms: Option<u64>,
    },

    /// Comment taken down by moderation
    #[serde(rename = "comment:remove")]
    CommentRemove { payload: RemovePayload },

    #[serde(rename = "superchat:add")]
    SuperchatAdd { payload: SuperchatCard },

    #[serde(rename = "superchat:remove")]
    SuperchatRemove { payload: RemovePayload },

    #[serde(rename = "kpi:update")]
    KpiUpdate { payload: Value },

    #[serde(rename = "queue:update")]
    QueueUpdate { payload: Value },

    #[serde(rename = "promo:update")]
    PromoUpdate { payload: Value },

    #[serde(rename = "weather:update")]
    WeatherUpdate { payload: Value },

    /// Several cities at once, rotated by the widget
    #[serde(rename = "weather:multi-update")]
    WeatherMultiUpdate { payload: Value },

    #[serde(rename = "setlist:update")]
    SetlistUpdate { payload: Value },

    /// Settings pushed after an edit; applied as a whole document
    #[serde(rename = "settings:update")]
    SettingsUpdate { payload: Value },

    /// Anything else; logged and dropped
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    pub fn parse(text: &str) -> ClientResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// The `type` tag, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CommentAdd { .. } => "comment:add",
            Self::CommentRemove { .. } => "comment:remove",
            Self::SuperchatAdd { .. } => "superchat:add",
            Self::SuperchatRemove { .. } => "superchat:remove",
            Self::KpiUpdate { .. } => "kpi:update",
            Self::QueueUpdate { .. } => "queue:update",
            Self::PromoUpdate { .. } => "promo:update",
            Self::WeatherUpdate { .. } => "weather:update",
            Self::WeatherMultiUpdate { .. } => "weather:multi-update",
            Self::SetlistUpdate { .. } => "setlist:update",
            Self::SettingsUpdate { .. } => "settings:update",
            Self::Unknown => "unknown",
        }
    }
}

/// Messages the client sends
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Heartbeat
    Ping,
}

impl OutboundMessage {
    pub fn to_text(&self) -> ClientResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// What the connection manager reports to the client loop
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Message(String),
    Closed,
}

//! Inbound item payloads that need identity (chat comments, paid cards)
//!
//! The producer owns the schema; only the fields the pipeline reads are
//! typed, everything else is carried through untouched in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A chat comment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatComment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub message: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatComment {
    pub fn new(id: impl Into<String>, author_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            author_name: author_name.into(),
            message: message.into(),
            extra: Map::new(),
        }
    }

    /// The dedup key; empty ids count as missing
    pub fn key(&self) -> Option<&str> {
        non_empty(self.id.as_deref())
    }
}

/// A paid-message card
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperchatCard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub message: String,
    /// Amount band 1-7
    #[serde(default)]
    pub tier: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_duration_ms: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SuperchatCard {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn key(&self) -> Option<&str> {
        non_empty(self.id.as_deref())
    }
}

/// Payload of removal messages (`comment:remove`, `superchat:remove`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovePayload {
    #[serde(default)]
    pub id: String,
}

fn non_empty(id: Option<&str>) -> Option<&str> {
    id.filter(|s| !s.is_empty())
}

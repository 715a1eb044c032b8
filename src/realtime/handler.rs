//! Inbound message router

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::events::InboundMessage;
use super::state::OverlayContext;
use crate::settings::SettingsBootstrapper;
use crate::types::WidgetKind;

/// Decode one text frame and route it into the pipeline
///
/// Returns `false` if the frame was dropped (malformed, unknown type, or a
/// shape the pipeline cannot use).
pub fn handle_server_message(
    context: &OverlayContext,
    settings: &SettingsBootstrapper,
    text: &str,
) -> bool {
    let message = match InboundMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "dropping malformed message");
            return false;
        }
    };
    debug!(kind = message.kind(), "inbound message");

    match message {
        InboundMessage::CommentAdd { payload, instant, buffer_interval_ms } => {
            if let Some(ms) = buffer_interval_ms {
                context.comments.set_buffer_interval(Duration::from_millis(ms));
            }
            if instant {
                context.comments.add_instant(payload)
            } else {
                context.comments.queue(payload)
            }
        }
        InboundMessage::CommentRemove { payload } => {
            if payload.id.is_empty() {
                warn!("comment:remove without id");
                return false;
            }
            context.comments.remove(&payload.id);
            true
        }
        InboundMessage::SuperchatAdd { payload } => context.cards.add(payload),
        InboundMessage::SuperchatRemove { payload } => context.cards.remove(&payload.id),
        InboundMessage::KpiUpdate { payload } => batch(context, WidgetKind::KpiBlock, payload),
        InboundMessage::QueueUpdate { payload } => batch(context, WidgetKind::QueueList, payload),
        InboundMessage::PromoUpdate { payload } => batch(context, WidgetKind::PromoPanel, payload),
        InboundMessage::SetlistUpdate { payload } => batch(context, WidgetKind::SetList, payload),
        InboundMessage::WeatherUpdate { payload } | InboundMessage::WeatherMultiUpdate { payload } => {
            batch(context, WidgetKind::WeatherWidget, payload)
        }
        InboundMessage::SettingsUpdate { payload } => match settings.apply_pushed(&payload) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "ignoring malformed settings:update");
                false
            }
        },
        InboundMessage::Unknown => {
            let kind = serde_json::from_str::<Value>(text)
                .ok()
                .and_then(|v| v.get("type").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_default();
            warn!(%kind, "dropping message of unknown type");
            false
        }
    }
}

fn batch(context: &OverlayContext, kind: WidgetKind, payload: Value) -> bool {
    context.batcher.queue(kind, payload);
    true
}

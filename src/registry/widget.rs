//! The widget contract the pipeline drives

use std::fmt;

use serde_json::Value;

use crate::error::ClientResult;
use crate::types::{SlotId, WidgetConfig, WidgetKind};

/// Events fanned out to every mounted widget via `dispatch`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetEvent {
    DensityHigh,
    DensityNormal,
}

impl WidgetEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetEvent::DensityHigh => "density:high",
            WidgetEvent::DensityNormal => "density:normal",
        }
    }
}

impl fmt::Display for WidgetEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pluggable renderer bound to one slot
///
/// `update` is an idempotent state replace for telemetry widgets and an
/// action (`{"action": ...}`) for list-like widgets. Errors and panics from
/// any method are contained by the registry.
pub trait Widget: Send {
    /// Build the initial view
    fn render(&mut self) -> ClientResult<()>;

    /// Called once the widget is attached to its slot
    fn after_mount(&mut self) -> ClientResult<()> {
        Ok(())
    }

    fn update(&mut self, data: &Value) -> ClientResult<()>;

    fn on_event(&mut self, _event: WidgetEvent, _payload: &Value) -> ClientResult<()> {
        Ok(())
    }

    fn destroy(&mut self) -> ClientResult<()> {
        Ok(())
    }

    /// Host visibility changed; widget-owned rotations stop while paused
    fn set_paused(&mut self, _paused: bool) {}

    /// Current text view of the widget
    fn view(&self) -> Vec<String>;
}

/// Constructs widget instances for the registry
pub trait WidgetFactory: Send + Sync {
    fn create(&self, kind: WidgetKind, config: &WidgetConfig) -> ClientResult<Box<dyn Widget>>;
}

impl<F> WidgetFactory for F
where
    F: Fn(WidgetKind, &WidgetConfig) -> ClientResult<Box<dyn Widget>> + Send + Sync,
{
    fn create(&self, kind: WidgetKind, config: &WidgetConfig) -> ClientResult<Box<dyn Widget>> {
        self(kind, config)
    }
}

/// Notified of every slot that received a broadcast
pub trait UpdateObserver: Send + Sync {
    fn on_slot_updated(&self, slot: SlotId);
}

//! Data types for the overlay client
//!
//! Slots, widget kinds, template entries, identified payloads and the
//! settings document.

mod component;
mod payload;
mod settings;
mod slot;

pub use component::{ComponentRules, TemplateComponent, WidgetConfig, WidgetKind};
pub use payload::{ChatComment, RemovePayload, SuperchatCard};
pub use settings::{
    default_template, CommentSettings, OverlaySettings, PerformanceSettings, SuperchatSettings,
    TemplateSettings, WidgetVisibility,
};
pub use slot::SlotId;

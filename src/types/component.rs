//! Widget kinds and template component entries

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SlotId;
use crate::config::limits;

/// The closed set of widget variants a slot can host
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WidgetKind {
    ClockWidget,
    WeatherWidget,
    ChatLog,
    SuperChatCard,
    BrandBlock,
    MainAvatarStage,
    ChannelBadge,
    SetList,
    #[serde(rename = "KPIBlock")]
    KpiBlock,
    PromoPanel,
    QueueList,
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Optional behaviour rules attached to a template component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_lines: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_sec: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_sec: Option<u32>,
}

impl ComponentRules {
    /// Return a copy with every present rule clamped to its allowed range
    pub fn clamped(&self) -> Self {
        Self {
            max_lines: self.max_lines.map(|v| limits::clamp(v, &limits::MAX_LINES)),
            max_items: self.max_items.map(|v| limits::clamp(v, &limits::MAX_ITEMS)),
            cycle_sec: self.cycle_sec.map(|v| limits::clamp(v, &limits::CYCLE_SEC)),
            show_sec: self.show_sec.map(|v| limits::clamp(v, &limits::SHOW_SEC)),
        }
    }
}

/// One entry of a layout template: which widget goes into which slot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateComponent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: WidgetKind,
    pub slot: SlotId,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<ComponentRules>,
}

impl TemplateComponent {
    pub fn new(id: impl Into<String>, kind: WidgetKind, slot: SlotId) -> Self {
        Self {
            id: id.into(),
            kind,
            slot,
            enabled: true,
            style: None,
            rules: None,
        }
    }

    /// Resolve the construction config handed to the widget factory
    pub fn widget_config(&self) -> WidgetConfig {
        WidgetConfig {
            component_id: self.id.clone(),
            rules: self.rules.as_ref().map(ComponentRules::clamped).unwrap_or_default(),
            style: self.style.clone(),
        }
    }
}

/// Construction-time configuration for a widget instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetConfig {
    pub component_id: String,
    pub rules: ComponentRules,
    pub style: Option<Value>,
}

impl WidgetConfig {
    /// Read a string field from the style object, if any
    pub fn style_str(&self, key: &str) -> Option<&str> {
        self.style.as_ref()?.get(key)?.as_str()
    }
}

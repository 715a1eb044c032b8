//! The overlay settings document (fetched at bootstrap, pushed on change)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{SlotId, TemplateComponent, WidgetKind};

/// Settings document as served by the settings endpoint and `settings:update`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<CommentSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superchat: Option<SuperchatSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<WidgetVisibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceSettings>,
    /// Styling and anything else the pipeline does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OverlaySettings {
    /// Components to mount: the explicit template if any, otherwise the
    /// default layout filtered by widget visibility
    pub fn components(&self) -> Vec<TemplateComponent> {
        match &self.template {
            Some(template) if !template.components.is_empty() => template.components.clone(),
            _ => default_template(&self.widget.clone().unwrap_or_default()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperchatSettings {
    #[serde(default = "default_max_display")]
    pub max_display: usize,
    #[serde(default = "default_display_duration_sec")]
    pub display_duration_sec: u32,
    #[serde(default = "default_true")]
    pub queue_enabled: bool,
}

impl Default for SuperchatSettings {
    fn default() -> Self {
        Self {
            max_display: default_max_display(),
            display_duration_sec: default_display_duration_sec(),
            queue_enabled: true,
        }
    }
}

/// Per-widget visibility switches used to derive the default layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetVisibility {
    #[serde(default = "default_true")]
    pub clock: bool,
    #[serde(default = "default_true")]
    pub weather: bool,
    #[serde(default = "default_true")]
    pub comment: bool,
    #[serde(default = "default_true")]
    pub superchat: bool,
    #[serde(default = "default_true")]
    pub logo: bool,
    #[serde(default = "default_true")]
    pub setlist: bool,
    #[serde(default = "default_true")]
    pub kpi: bool,
    #[serde(default = "default_true")]
    pub tanzaku: bool,
    #[serde(default = "default_true")]
    pub announcement: bool,
}

impl Default for WidgetVisibility {
    fn default() -> Self {
        Self {
            clock: true,
            weather: true,
            comment: true,
            superchat: true,
            logo: true,
            setlist: true,
            kpi: true,
            tanzaku: true,
            announcement: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSettings {
    #[serde(default)]
    pub components: Vec<TemplateComponent>,
}

/// Runtime pacing knobs; kept as raw JSON so non-numeric values can be
/// ignored instead of failing the whole document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_interval_ms: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub density_threshold: Option<Value>,
}

/// The stock three-column layout
pub fn default_template(visibility: &WidgetVisibility) -> Vec<TemplateComponent> {
    let entries = [
        ("clock", WidgetKind::ClockWidget, SlotId::LeftTop, visibility.clock),
        ("weather", WidgetKind::WeatherWidget, SlotId::LeftTopBelow, visibility.weather),
        ("chat", WidgetKind::ChatLog, SlotId::LeftMiddle, visibility.comment),
        ("superchat", WidgetKind::SuperChatCard, SlotId::LeftLower, visibility.superchat),
        ("brand", WidgetKind::BrandBlock, SlotId::LeftBottom, visibility.logo),
        ("avatar", WidgetKind::MainAvatarStage, SlotId::CenterFull, true),
        ("badge", WidgetKind::ChannelBadge, SlotId::RightTop, true),
        ("setlist", WidgetKind::SetList, SlotId::RightUpper, visibility.setlist),
        ("kpi", WidgetKind::KpiBlock, SlotId::RightLowerLeft, visibility.kpi),
        ("queue", WidgetKind::QueueList, SlotId::RightLowerRight, visibility.tanzaku),
        ("promo", WidgetKind::PromoPanel, SlotId::RightBottom, visibility.announcement),
    ];

    entries
        .into_iter()
        .map(|(id, kind, slot, enabled)| TemplateComponent {
            enabled,
            ..TemplateComponent::new(id, kind, slot)
        })
        .collect()
}

fn default_max_display() -> usize {
    1
}

fn default_display_duration_sec() -> u32 {
    60
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_template_respects_visibility() {
        let settings: OverlaySettings = serde_json::from_value(json!({
            "theme": "default",
            "widget": { "kpi": false, "weather": false }
        }))
        .unwrap();

        let components = settings.components();
        assert_eq!(components.len(), SlotId::ALL.len());
        let kpi = components.iter().find(|c| c.kind == WidgetKind::KpiBlock).unwrap();
        assert!(!kpi.enabled);
        let chat = components.iter().find(|c| c.kind == WidgetKind::ChatLog).unwrap();
        assert!(chat.enabled);
        assert_eq!(chat.slot, SlotId::LeftMiddle);
    }

    #[test]
    fn test_explicit_template_wins() {
        let settings: OverlaySettings = serde_json::from_value(json!({
            "template": { "components": [
                { "id": "only", "type": "ClockWidget", "slot": "center.full", "enabled": true }
            ]}
        }))
        .unwrap();

        let components = settings.components();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].slot, SlotId::CenterFull);
    }

    #[test]
    fn test_performance_values_stay_raw() {
        let settings: OverlaySettings = serde_json::from_value(json!({
            "performance": { "batchIntervalMs": "fast", "densityThreshold": 7 },
            "primaryColor": "#6366f1"
        }))
        .unwrap();

        let perf = settings.performance.unwrap();
        assert_eq!(perf.batch_interval_ms, Some(json!("fast")));
        assert_eq!(perf.density_threshold, Some(json!(7)));
        assert_eq!(settings.extra.get("primaryColor"), Some(&json!("#6366f1")));
    }
}

//! Shared overlay context
//!
//! Every pipeline component is built here, explicitly, around one widget
//! registry. Nothing is global: a second context is a second, fully
//! independent overlay.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::batcher::{UpdateBatcher, DEFAULT_BATCH_INTERVAL_MS};
use crate::pipeline::{
    CardQueueConfig, CommentQueueConfig, CommentQueueManager, DensityConfig, DensityMonitor,
    TransientCardQueue,
};
use crate::registry::{WidgetFactory, WidgetRegistry};
use crate::settings::SettingsApplier;
use crate::types::OverlaySettings;

/// Tuning for every pipeline component
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub batch_interval_ms: u64,
    pub density: DensityConfig,
    pub comments: CommentQueueConfig,
    pub cards: CardQueueConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_interval_ms: DEFAULT_BATCH_INTERVAL_MS,
            density: DensityConfig::default(),
            comments: CommentQueueConfig::default(),
            cards: CardQueueConfig::default(),
        }
    }
}

/// The registry and the components that feed it
pub struct OverlayContext {
    pub registry: Arc<WidgetRegistry>,
    pub batcher: Arc<UpdateBatcher>,
    pub density: Arc<DensityMonitor>,
    pub comments: Arc<CommentQueueManager>,
    pub cards: Arc<TransientCardQueue>,
}

impl OverlayContext {
    pub fn new(factory: impl WidgetFactory + 'static) -> Arc<Self> {
        Self::with_config(factory, PipelineConfig::default())
    }

    pub fn with_config(factory: impl WidgetFactory + 'static, config: PipelineConfig) -> Arc<Self> {
        let registry = Arc::new(WidgetRegistry::new(factory));
        let density = DensityMonitor::new(registry.clone(), config.density);
        registry.set_observer(&density);

        Arc::new(Self {
            batcher: UpdateBatcher::with_interval(registry.clone(), config.batch_interval_ms),
            comments: CommentQueueManager::new(registry.clone(), config.comments),
            cards: TransientCardQueue::new(registry.clone(), config.cards),
            density,
            registry,
        })
    }

    /// Start background work (the density sweep)
    pub fn start(&self) {
        self.density.start();
    }

    /// Host visibility changed
    pub fn set_paused(&self, paused: bool) {
        self.registry.set_paused(paused);
    }

    /// Deliver pending updates, then stop every component and unmount
    pub fn shutdown(&self) {
        self.batcher.force_flush();
        self.batcher.destroy();
        self.comments.destroy();
        self.cards.destroy();
        self.density.destroy();
        self.registry.unmount_all();
        info!("overlay context shut down");
    }
}

impl SettingsApplier for OverlayContext {
    fn apply_settings(&self, settings: &OverlaySettings) {
        let components = settings.components();
        let mounted = self.registry.apply_template(&components);
        info!(mounted, total = components.len(), "template applied");

        if let Some(superchat) = &settings.superchat {
            self.cards
                .update_settings(superchat.max_display, superchat.queue_enabled);
            self.cards
                .set_display_duration(Duration::from_secs(superchat.display_duration_sec as u64));
        }

        if let Some(performance) = &settings.performance {
            if let Some(value) = &performance.batch_interval_ms {
                self.batcher.set_batch_interval_value(value);
            }
            if let Some(value) = &performance.density_threshold {
                self.density.set_threshold_value(value);
            }
        }

        if let Some(ms) = settings.comment.as_ref().and_then(|c| c.buffer_interval_ms) {
            self.comments.set_buffer_interval(Duration::from_millis(ms));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SlotId, WidgetKind};
    use crate::widgets::BuiltinWidgets;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_apply_settings_document() {
        let context = OverlayContext::new(BuiltinWidgets);
        let settings: OverlaySettings = serde_json::from_value(json!({
            "widget": {"clock": false, "kpi": true},
            "superchat": {"maxDisplay": 3, "displayDurationSec": 30, "queueEnabled": false},
            "performance": {"batchIntervalMs": 250, "densityThreshold": "high"},
            "comment": {"bufferIntervalMs": 1000}
        }))
        .unwrap();

        context.apply_settings(&settings);

        assert_eq!(context.registry.kind_at(SlotId::LeftTop), None);
        assert_eq!(context.registry.kind_at(SlotId::RightLowerLeft), Some(WidgetKind::KpiBlock));
        assert_eq!(context.cards.max_display(), 3);
        assert_eq!(context.batcher.batch_interval(), Duration::from_millis(250));
        assert_eq!(context.density.threshold(), 10);
        assert_eq!(context.comments.buffer_interval(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_density_observes_registry_broadcasts() {
        let config = PipelineConfig {
            density: DensityConfig {
                threshold: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        let context = OverlayContext::with_config(BuiltinWidgets, config);
        context.apply_settings(&OverlaySettings::default());

        context.registry.broadcast(WidgetKind::KpiBlock, &json!({"main": 1}));
        assert!(!context.density.is_high_density());
        context.registry.broadcast(WidgetKind::KpiBlock, &json!({"main": 2}));
        assert!(context.density.is_high_density());

        context.shutdown();
        assert_eq!(context.registry.mounted_count(), 0);
    }
}

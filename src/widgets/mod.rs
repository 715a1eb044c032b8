//! Built-in widgets
//!
//! Thin text renderers for every `WidgetKind`. Painting is deliberately
//! minimal; the interesting behaviour lives in the pipeline that feeds them.

mod chat_log;
mod clock;
mod lists;
mod promo;
mod superchat;
mod weather;

pub use chat_log::ChatLogWidget;
pub use clock::{ClockWidget, StaticBlock};
pub use lists::{KpiWidget, ListSource, ListWidget};
pub use promo::PromoWidget;
pub use superchat::SuperchatWidget;
pub use weather::WeatherWidget;

use crate::error::ClientResult;
use crate::registry::{Widget, WidgetFactory};
use crate::types::{WidgetConfig, WidgetKind};

/// Factory for the closed set of built-in widgets
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinWidgets;

impl WidgetFactory for BuiltinWidgets {
    fn create(&self, kind: WidgetKind, config: &WidgetConfig) -> ClientResult<Box<dyn Widget>> {
        let widget: Box<dyn Widget> = match kind {
            WidgetKind::ClockWidget => Box::new(ClockWidget::new(config)),
            WidgetKind::WeatherWidget => Box::new(WeatherWidget::new()),
            WidgetKind::ChatLog => Box::new(ChatLogWidget::new(config)),
            WidgetKind::SuperChatCard => Box::new(SuperchatWidget::new()),
            WidgetKind::SetList => Box::new(ListWidget::new(ListSource::Setlist, config)),
            WidgetKind::QueueList => Box::new(ListWidget::new(ListSource::Queue, config)),
            WidgetKind::KpiBlock => Box::new(KpiWidget::new()),
            WidgetKind::PromoPanel => Box::new(PromoWidget::new(config)),
            WidgetKind::BrandBlock | WidgetKind::MainAvatarStage | WidgetKind::ChannelBadge => {
                Box::new(StaticBlock::new(kind, config))
            }
        };
        Ok(widget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::WidgetRegistry;
    use crate::types::{default_template, WidgetVisibility};

    #[test]
    fn test_default_template_mounts_everything() {
        let registry = WidgetRegistry::new(BuiltinWidgets);
        let components = default_template(&WidgetVisibility::default());
        assert_eq!(registry.apply_template(&components), components.len());
        assert_eq!(registry.snapshot().len(), components.len());
    }
}

//! Clock and fixed-content blocks

use chrono::Local;
use serde_json::Value;

use crate::error::ClientResult;
use crate::registry::Widget;
use crate::types::{WidgetConfig, WidgetKind};
use crate::utils::clock_text;

/// Wall clock; the view is computed on demand so no timer is needed
#[derive(Default)]
pub struct ClockWidget {
    label: Option<String>,
}

impl ClockWidget {
    pub fn new(config: &WidgetConfig) -> Self {
        Self {
            label: config.style_str("label").map(str::to_string),
        }
    }
}

impl Widget for ClockWidget {
    fn render(&mut self) -> ClientResult<()> {
        Ok(())
    }

    fn update(&mut self, data: &Value) -> ClientResult<()> {
        if let Some(label) = data.get("label").and_then(Value::as_str) {
            self.label = Some(label.to_string());
        }
        Ok(())
    }

    fn view(&self) -> Vec<String> {
        let time = clock_text(&Local::now());
        match &self.label {
            Some(label) => vec![format!("{} {}", label, time)],
            None => vec![time],
        }
    }
}

/// Brand block, avatar stage and channel badge: content comes from the
/// template style and only changes when the template does
pub struct StaticBlock {
    text: String,
}

impl StaticBlock {
    pub fn new(kind: WidgetKind, config: &WidgetConfig) -> Self {
        Self {
            text: config
                .style_str("text")
                .map(str::to_string)
                .unwrap_or_else(|| kind.to_string()),
        }
    }
}

impl Widget for StaticBlock {
    fn render(&mut self) -> ClientResult<()> {
        Ok(())
    }

    fn update(&mut self, data: &Value) -> ClientResult<()> {
        if let Some(text) = data.get("text").and_then(Value::as_str) {
            self.text = text.to_string();
        }
        Ok(())
    }

    fn view(&self) -> Vec<String> {
        vec![self.text.clone()]
    }
}

//! Chat log widget
//!
//! Keeps the most recent comments, trimmed to `maxLines`. Opts into density
//! events: while dense the visible line count drops to the degraded
//! profile's `maxItems`.

use std::collections::VecDeque;

use serde_json::Value;

use crate::error::{ClientError, ClientResult};
use crate::registry::{Widget, WidgetEvent};
use crate::types::{ChatComment, WidgetConfig};

const DEFAULT_MAX_LINES: usize = 10;

pub struct ChatLogWidget {
    lines: VecDeque<(String, String)>,
    max_lines: usize,
    degraded_lines: Option<usize>,
}

impl ChatLogWidget {
    pub fn new(config: &WidgetConfig) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines: config.rules.max_lines.map_or(DEFAULT_MAX_LINES, |v| v as usize),
            degraded_lines: None,
        }
    }

    fn capacity(&self) -> usize {
        match self.degraded_lines {
            Some(cap) => cap.min(self.max_lines),
            None => self.max_lines,
        }
    }

    fn trim(&mut self) {
        while self.lines.len() > self.capacity() {
            self.lines.pop_front();
        }
    }
}

impl Widget for ChatLogWidget {
    fn render(&mut self) -> ClientResult<()> {
        self.lines.clear();
        Ok(())
    }

    fn update(&mut self, data: &Value) -> ClientResult<()> {
        match data.get("action").and_then(Value::as_str) {
            Some("add") => {
                let comment: ChatComment = serde_json::from_value(data["comment"].clone())?;
                let id = comment.key().unwrap_or_default().to_string();
                self.lines.push_back((id, format!("{}: {}", comment.author_name, comment.message)));
                self.trim();
                Ok(())
            }
            Some("remove") => {
                let id = data.get("id").and_then(Value::as_str).unwrap_or_default();
                self.lines.retain(|(line_id, _)| line_id != id);
                Ok(())
            }
            other => Err(ClientError::widget(format!("unknown chat log action: {:?}", other))),
        }
    }

    fn on_event(&mut self, event: WidgetEvent, payload: &Value) -> ClientResult<()> {
        match event {
            WidgetEvent::DensityHigh => {
                self.degraded_lines = payload.get("maxItems").and_then(Value::as_u64).map(|v| v as usize);
                self.trim();
            }
            WidgetEvent::DensityNormal => self.degraded_lines = None,
        }
        Ok(())
    }

    fn destroy(&mut self) -> ClientResult<()> {
        self.lines.clear();
        Ok(())
    }

    fn view(&self) -> Vec<String> {
        self.lines.iter().map(|(_, line)| line.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ComponentRules;
    use serde_json::json;

    fn add(widget: &mut ChatLogWidget, id: &str) {
        widget
            .update(&json!({"action": "add", "comment": {"id": id, "authorName": "v", "message": id}}))
            .unwrap();
    }

    #[test]
    fn test_trims_to_max_lines() {
        let config = WidgetConfig {
            rules: ComponentRules {
                max_lines: Some(4),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut widget = ChatLogWidget::new(&config);
        for i in 0..6 {
            add(&mut widget, &format!("c{}", i));
        }
        assert_eq!(widget.view(), vec!["v: c2", "v: c3", "v: c4", "v: c5"]);
    }

    #[test]
    fn test_density_degrades_and_restores() {
        let mut widget = ChatLogWidget::new(&WidgetConfig::default());
        for i in 0..10 {
            add(&mut widget, &format!("c{}", i));
        }

        widget.on_event(WidgetEvent::DensityHigh, &json!({"maxItems": 6})).unwrap();
        assert_eq!(widget.view().len(), 6);

        widget.on_event(WidgetEvent::DensityNormal, &json!({"maxItems": null})).unwrap();
        for i in 10..14 {
            add(&mut widget, &format!("c{}", i));
        }
        assert_eq!(widget.view().len(), 10);
    }

    #[test]
    fn test_remove_by_id() {
        let mut widget = ChatLogWidget::new(&WidgetConfig::default());
        add(&mut widget, "keep");
        add(&mut widget, "drop");
        widget.update(&json!({"action": "remove", "id": "drop"})).unwrap();
        assert_eq!(widget.view(), vec!["v: keep"]);
    }
}

//! Rotating promotional text panel

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::config::limits;
use crate::error::ClientResult;
use crate::registry::{Widget, WidgetEvent};
use crate::types::WidgetConfig;
use crate::utils::Rotator;

const DEFAULT_SHOW_SEC: u32 = 6;

#[derive(Debug, Clone, Deserialize)]
struct PromoItem {
    text: String,
    #[serde(default)]
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromoPayload {
    #[serde(default)]
    items: Vec<PromoItem>,
    #[serde(default)]
    show_sec: Option<u32>,
}

pub struct PromoWidget {
    items: Vec<PromoItem>,
    rotator: Rotator,
    hidden: bool,
    dense: bool,
}

impl PromoWidget {
    pub fn new(config: &WidgetConfig) -> Self {
        let show_sec = config.rules.show_sec.unwrap_or(DEFAULT_SHOW_SEC);
        Self {
            items: Vec::new(),
            rotator: Rotator::new(Duration::from_secs(show_sec as u64)),
            hidden: false,
            dense: false,
        }
    }

    // Rotation halts while the host is hidden or the overlay is dense
    fn sync_pause(&mut self) {
        self.rotator.set_paused(self.hidden || self.dense);
    }
}

impl Widget for PromoWidget {
    fn render(&mut self) -> ClientResult<()> {
        self.items.clear();
        Ok(())
    }

    fn update(&mut self, data: &Value) -> ClientResult<()> {
        let payload: PromoPayload = serde_json::from_value(data.clone())?;
        if let Some(show_sec) = payload.show_sec {
            let show_sec = limits::clamp(show_sec, &limits::SHOW_SEC);
            self.rotator = Rotator::new(Duration::from_secs(show_sec as u64));
            self.sync_pause();
        } else {
            self.rotator.reset();
        }
        self.items = payload.items;
        Ok(())
    }

    fn on_event(&mut self, event: WidgetEvent, _payload: &Value) -> ClientResult<()> {
        self.dense = event == WidgetEvent::DensityHigh;
        self.sync_pause();
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) {
        self.hidden = paused;
        self.sync_pause();
    }

    fn view(&self) -> Vec<String> {
        self.items
            .get(self.rotator.index(self.items.len()))
            .map(|item| match &item.icon {
                Some(icon) => vec![format!("{} {}", icon, item.text)],
                None => vec![item.text.clone()],
            })
            .unwrap_or_default()
    }
}

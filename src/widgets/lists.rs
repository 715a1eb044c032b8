//! Telemetry widgets with replace-on-update state: queue list, set list, KPI

use serde::Deserialize;
use serde_json::Value;

use crate::error::ClientResult;
use crate::registry::Widget;
use crate::types::WidgetConfig;

const DEFAULT_MAX_ITEMS: usize = 10;

#[derive(Debug, Deserialize)]
struct QueueItem {
    text: String,
}

#[derive(Debug, Deserialize)]
struct QueuePayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    items: Vec<QueueItem>,
}

#[derive(Debug, Deserialize)]
struct SongItem {
    title: String,
    #[serde(default)]
    artist: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct SetlistPayload {
    #[serde(default)]
    songs: Vec<SongItem>,
}

/// Which list payload a `ListWidget` understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSource {
    Queue,
    Setlist,
}

/// A bounded list that is fully replaced on every update
pub struct ListWidget {
    source: ListSource,
    title: Option<String>,
    rows: Vec<String>,
    max_items: usize,
}

impl ListWidget {
    pub fn new(source: ListSource, config: &WidgetConfig) -> Self {
        Self {
            source,
            title: config.style_str("title").map(str::to_string),
            rows: Vec::new(),
            max_items: config.rules.max_items.map_or(DEFAULT_MAX_ITEMS, |v| v as usize),
        }
    }
}

impl Widget for ListWidget {
    fn render(&mut self) -> ClientResult<()> {
        self.rows.clear();
        Ok(())
    }

    fn update(&mut self, data: &Value) -> ClientResult<()> {
        match self.source {
            ListSource::Queue => {
                let payload: QueuePayload = serde_json::from_value(data.clone())?;
                if payload.title.is_some() {
                    self.title = payload.title;
                }
                self.rows = payload.items.into_iter().map(|item| item.text).collect();
            }
            ListSource::Setlist => {
                let payload: SetlistPayload = serde_json::from_value(data.clone())?;
                self.rows = payload
                    .songs
                    .into_iter()
                    .map(|song| {
                        let marker = if song.status == "current" { "▶" } else { " " };
                        if song.artist.is_empty() {
                            format!("{} {}", marker, song.title)
                        } else {
                            format!("{} {} / {}", marker, song.title, song.artist)
                        }
                    })
                    .collect();
            }
        }
        self.rows.truncate(self.max_items);
        Ok(())
    }

    fn view(&self) -> Vec<String> {
        self.title.iter().cloned().chain(self.rows.iter().cloned()).collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KpiPayload {
    main: Option<i64>,
    label: Option<String>,
    sub: Option<i64>,
    sub_label: Option<String>,
}

/// Viewer count style numbers
#[derive(Default)]
pub struct KpiWidget {
    current: KpiPayload,
}

impl KpiWidget {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Widget for KpiWidget {
    fn render(&mut self) -> ClientResult<()> {
        self.current = KpiPayload::default();
        Ok(())
    }

    fn update(&mut self, data: &Value) -> ClientResult<()> {
        self.current = serde_json::from_value(data.clone())?;
        Ok(())
    }

    fn view(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(main) = self.current.main {
            lines.push(format!("{} {}", self.current.label.as_deref().unwrap_or("viewers"), main));
        }
        if let Some(sub) = self.current.sub {
            lines.push(format!("{} {}", self.current.sub_label.as_deref().unwrap_or("likes"), sub));
        }
        lines
    }
}

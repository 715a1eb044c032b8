//! Paid-message card widget
//!
//! Purely presentational: which cards are visible is decided by the
//! transient card queue, which drives this widget with `show`, `exit` and
//! `removed` actions.

use serde_json::Value;

use crate::error::{ClientError, ClientResult};
use crate::registry::Widget;
use crate::types::SuperchatCard;

struct VisibleCard {
    id: String,
    card: SuperchatCard,
    leaving: bool,
}

#[derive(Default)]
pub struct SuperchatWidget {
    cards: Vec<VisibleCard>,
}

impl SuperchatWidget {
    pub fn new() -> Self {
        Self::default()
    }
}

fn action_id(data: &Value) -> ClientResult<&str> {
    data.get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::widget("card action without id"))
}

impl Widget for SuperchatWidget {
    fn render(&mut self) -> ClientResult<()> {
        self.cards.clear();
        Ok(())
    }

    fn update(&mut self, data: &Value) -> ClientResult<()> {
        match data.get("action").and_then(Value::as_str) {
            Some("show") => {
                let card: SuperchatCard = serde_json::from_value(data["card"].clone())?;
                let id = card
                    .key()
                    .ok_or_else(|| ClientError::widget("card without id"))?
                    .to_string();
                self.cards.retain(|visible| visible.id != id);
                self.cards.push(VisibleCard { id, card, leaving: false });
            }
            Some("exit") => {
                let id = action_id(data)?;
                if let Some(visible) = self.cards.iter_mut().find(|visible| visible.id == id) {
                    visible.leaving = true;
                }
            }
            Some("removed") => {
                let id = action_id(data)?;
                self.cards.retain(|visible| visible.id != id);
            }
            other => return Err(ClientError::widget(format!("unknown card action: {:?}", other))),
        }
        Ok(())
    }

    fn destroy(&mut self) -> ClientResult<()> {
        self.cards.clear();
        Ok(())
    }

    fn view(&self) -> Vec<String> {
        self.cards
            .iter()
            .map(|visible| {
                let card = &visible.card;
                let mut line = format!("[T{}] {} {}: {}", card.tier, card.author_name, card.amount, card.message);
                if visible.leaving {
                    line.push_str(" (leaving)");
                }
                line
            })
            .collect()
    }
}

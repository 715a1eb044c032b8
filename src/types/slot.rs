//! Display slots of the three-column layout

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named display region; holds at most one mounted widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SlotId {
    #[serde(rename = "left.top")]
    LeftTop,
    #[serde(rename = "left.topBelow")]
    LeftTopBelow,
    #[serde(rename = "left.middle")]
    LeftMiddle,
    #[serde(rename = "left.lower")]
    LeftLower,
    #[serde(rename = "left.bottom")]
    LeftBottom,
    #[serde(rename = "center.full")]
    CenterFull,
    #[serde(rename = "right.top")]
    RightTop,
    #[serde(rename = "right.upper")]
    RightUpper,
    #[serde(rename = "right.lowerLeft")]
    RightLowerLeft,
    #[serde(rename = "right.lowerRight")]
    RightLowerRight,
    #[serde(rename = "right.bottom")]
    RightBottom,
}

impl SlotId {
    pub const ALL: [SlotId; 11] = [
        SlotId::LeftTop,
        SlotId::LeftTopBelow,
        SlotId::LeftMiddle,
        SlotId::LeftLower,
        SlotId::LeftBottom,
        SlotId::CenterFull,
        SlotId::RightTop,
        SlotId::RightUpper,
        SlotId::RightLowerLeft,
        SlotId::RightLowerRight,
        SlotId::RightBottom,
    ];

    /// Wire name, e.g. `left.middle`
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotId::LeftTop => "left.top",
            SlotId::LeftTopBelow => "left.topBelow",
            SlotId::LeftMiddle => "left.middle",
            SlotId::LeftLower => "left.lower",
            SlotId::LeftBottom => "left.bottom",
            SlotId::CenterFull => "center.full",
            SlotId::RightTop => "right.top",
            SlotId::RightUpper => "right.upper",
            SlotId::RightLowerLeft => "right.lowerLeft",
            SlotId::RightLowerRight => "right.lowerRight",
            SlotId::RightBottom => "right.bottom",
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SlotId::ALL
            .iter()
            .copied()
            .find(|slot| slot.as_str() == s)
            .ok_or_else(|| format!("unknown slot: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_match_serde() {
        for slot in SlotId::ALL {
            let json = serde_json::to_string(&slot).unwrap();
            assert_eq!(json, format!("\"{}\"", slot.as_str()));
            assert_eq!(slot.as_str().parse::<SlotId>().unwrap(), slot);
        }
    }

    #[test]
    fn test_unknown_slot() {
        assert!("middle.nowhere".parse::<SlotId>().is_err());
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an outcome's odds relative to the last applied value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    #[default]
    Stable,
}

impl Trend {
    pub fn between(old: Decimal, new: Decimal) -> Self {
        if new > old {
            Trend::Up
        } else if new < old {
            Trend::Down
        } else {
            Trend::Stable
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Up => write!(f, "up"),
            Trend::Down => write!(f, "down"),
            Trend::Stable => write!(f, "stable"),
        }
    }
}

/// A wagerable selection within an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub id: String,
    pub name: String,
    /// Decimal payout multiplier.
    pub odds: Decimal,
    #[serde(default)]
    pub previous_odds: Option<Decimal>,
    #[serde(default)]
    pub trend: Trend,
}

impl Outcome {
    pub fn new(id: impl Into<String>, name: impl Into<String>, odds: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            odds,
            previous_odds: None,
            trend: Trend::Stable,
        }
    }
}

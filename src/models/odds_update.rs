use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ephemeral odds change for one outcome. Applied and then only kept in the
/// stream's bounded history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OddsUpdate {
    pub event_id: String,
    pub outcome_id: String,
    pub new_odds: Decimal,
    /// What the sender believed the odds were. Informational only.
    #[serde(default)]
    pub previous_odds: Option<Decimal>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl OddsUpdate {
    pub fn new(event_id: impl Into<String>, outcome_id: impl Into<String>, new_odds: Decimal) -> Self {
        Self {
            event_id: event_id.into(),
            outcome_id: outcome_id.into(),
            new_odds,
            previous_odds: None,
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for OddsUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OddsUpdate: event={} outcome={} new={}",
            self.event_id, self.outcome_id, self.new_odds,
        )
    }
}

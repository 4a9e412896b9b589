use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::BetStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettledOutcome {
    Won,
    Lost,
}

impl From<SettledOutcome> for BetStatus {
    fn from(outcome: SettledOutcome) -> Self {
        match outcome {
            SettledOutcome::Won => BetStatus::Won,
            SettledOutcome::Lost => BetStatus::Lost,
        }
    }
}

impl fmt::Display for SettledOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettledOutcome::Won => write!(f, "won"),
            SettledOutcome::Lost => write!(f, "lost"),
        }
    }
}

/// Recorded once per bet and replayed verbatim afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    pub bet_id: Uuid,
    pub status: SettledOutcome,
    pub payout: Decimal,
    #[serde(alias = "transactionHash")]
    pub proof_reference: String,
    #[serde(default = "Utc::now")]
    pub settled_at: DateTime<Utc>,
}

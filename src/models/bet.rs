use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Pending,
    Active,
    Won,
    Lost,
    Cancelled,
}

impl BetStatus {
    /// pending -> active -> (won | lost), plus pending|active -> cancelled.
    pub fn can_transition_to(self, next: BetStatus) -> bool {
        use BetStatus::*;
        matches!(
            (self, next),
            (Pending, Active) | (Active, Won) | (Active, Lost) | (Pending, Cancelled) | (Active, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BetStatus::Won | BetStatus::Lost | BetStatus::Cancelled)
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetStatus::Pending => write!(f, "pending"),
            BetStatus::Active => write!(f, "active"),
            BetStatus::Won => write!(f, "won"),
            BetStatus::Lost => write!(f, "lost"),
            BetStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One user's wager against one outcome of one event.
///
/// `odds` and `potential_return` are frozen when the bet is placed; later odds
/// movement never touches them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub id: Uuid,
    pub event_id: String,
    #[serde(default)]
    pub event_name: Option<String>,
    pub outcome_id: String,
    #[serde(default)]
    pub outcome_name: Option<String>,
    pub amount: Decimal,
    pub odds: Decimal,
    pub potential_return: Decimal,
    pub status: BetStatus,
    pub placed_at: DateTime<Utc>,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payout: Option<Decimal>,
}

/// `amount * odds`, rejected when the product does not fit in a [`Decimal`].
pub fn potential_return(amount: Decimal, odds: Decimal) -> Result<Decimal, ValidationError> {
    amount
        .checked_mul(odds)
        .ok_or(ValidationError::ReturnTooLarge { amount, odds })
}

impl Bet {
    pub fn new(
        event_id: impl Into<String>,
        outcome_id: impl Into<String>,
        amount: Decimal,
        odds: Decimal,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id: Uuid::new_v4(),
            event_id: event_id.into(),
            event_name: None,
            outcome_id: outcome_id.into(),
            outcome_name: None,
            amount,
            odds,
            potential_return: potential_return(amount, odds)?,
            status: BetStatus::Pending,
            placed_at: Utc::now(),
            settled_at: None,
            payout: None,
        })
    }

    pub fn with_status(mut self, status: BetStatus) -> Self {
        self.status = status;
        self
    }
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bet: id={} event={} outcome={} amount={} odds={} status={}",
            self.id, self.event_id, self.outcome_id, self.amount, self.odds, self.status,
        )
    }
}

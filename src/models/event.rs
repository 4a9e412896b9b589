use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Upcoming,
    Live,
    Completed,
    Cancelled,
}

impl EventStatus {
    /// Outcomes may only be wagered on while the event is upcoming or live.
    pub fn is_open(self) -> bool {
        matches!(self, EventStatus::Upcoming | EventStatus::Live)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EventStatus::Completed | EventStatus::Cancelled)
    }

    /// upcoming -> live -> completed, or -> cancelled from either open state.
    /// Re-asserting the current status is accepted.
    pub fn can_transition_to(self, next: EventStatus) -> bool {
        use EventStatus::*;
        self == next
            || matches!(
                (self, next),
                (Upcoming, Live) | (Live, Completed) | (Upcoming, Cancelled) | (Live, Cancelled)
            )
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Upcoming => write!(f, "upcoming"),
            EventStatus::Live => write!(f, "live"),
            EventStatus::Completed => write!(f, "completed"),
            EventStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A betting market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BettingEvent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    pub status: EventStatus,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
}

impl BettingEvent {
    pub fn outcome(&self, outcome_id: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.id == outcome_id)
    }
}

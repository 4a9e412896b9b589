use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::flow::machine::{FlowAction, FlowStep};
use crate::models::{BetStatus, EventStatus};

/// User-correctable input problems. Always recovered locally; the flow keeps
/// its previous state and surfaces the message next to the affected control.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Minimum stake is {min}")]
    StakeBelowMinimum { amount: Decimal, min: Decimal },

    #[error("Maximum stake is {max}")]
    StakeAboveMaximum { amount: Decimal, max: Decimal },

    #[error("Insufficient balance: total stake {total} exceeds balance {balance}")]
    InsufficientBalance { total: Decimal, balance: Decimal },

    #[error("Maximum {max} bets per event allowed")]
    TooManySelections { event_id: String, max: usize },

    #[error("No event selected")]
    MissingEvent,

    #[error("No outcome selected")]
    MissingOutcome,

    #[error("Stake must be greater than zero")]
    MissingStake,

    #[error("Potential return of {amount} at {odds} is too large")]
    ReturnTooLarge { amount: Decimal, odds: Decimal },

    #[error("Outcome {outcome_id} does not belong to event {event_id}")]
    OutcomeNotInEvent { event_id: String, outcome_id: String },

    #[error("Event {event_id} is {status} and not open for betting")]
    EventNotOpen { event_id: String, status: EventStatus },

    #[error("No selections in bet slip")]
    EmptySlip,

    #[error("These bets were just submitted")]
    DuplicateSubmission,
}

/// A collaborator (Bet API, wallet, odds source) could not be reached or
/// refused the request. Always retryable.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Message reported by the collaborator, surfaced verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Why a single odds update was not applied. Never escalates beyond the
/// update it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("unknown outcome {0}")]
    UnknownOutcome(String),

    #[error("update for event {got} delivered to stream for {expected}")]
    ForeignEvent { expected: String, got: String },

    #[error("malformed odds {odds} for outcome {outcome_id}")]
    MalformedOdds { outcome_id: String, odds: Decimal },

    #[error("stream detached")]
    Detached,
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("cannot {action} while {from}")]
    InvalidTransition { from: FlowStep, action: FlowAction },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("bet {0} not found")]
    NotFound(Uuid),

    #[error("bet {bet_id} cannot be settled: {reason}")]
    InvalidState { bet_id: Uuid, reason: String },

    #[error("bet {bet_id} cannot move from {from} to {to}")]
    InvalidBetTransition {
        bet_id: Uuid,
        from: BetStatus,
        to: BetStatus,
    },

    #[error("event {event_id} cannot move from {from} to {to}")]
    InvalidEventTransition {
        event_id: String,
        from: EventStatus,
        to: EventStatus,
    },

    #[error("settlement source unavailable, retry later: {0}")]
    Transport(#[from] TransportError),
}

impl SettlementError {
    /// True when the same call may succeed later without any state change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SettlementError::Transport(_))
    }
}

impl FlowError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FlowError::Transport(_))
    }
}

/// Reading or writing the persisted preferences file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("preferences I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("preferences file is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

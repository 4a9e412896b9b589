pub mod client;
pub mod types;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::errors::TransportError;
use crate::models::{Bet, BettingEvent, SettledOutcome, SettlementResult};

pub use client::ApiClient;
pub use types::{ApiEnvelope, PlaceBetRequest};

/// Backend collaborator for listing markets and submitting bets.
#[async_trait]
pub trait BetApi: Send + Sync {
    async fn list_events(&self) -> Result<Vec<BettingEvent>, TransportError>;

    async fn get_event(&self, event_id: &str) -> Result<BettingEvent, TransportError>;

    async fn list_bets(&self) -> Result<Vec<Bet>, TransportError>;

    async fn place_bet(&self, request: &PlaceBetRequest) -> Result<Bet, TransportError>;

    async fn settle_bet(&self, bet_id: Uuid) -> Result<SettlementResult, TransportError>;

    async fn wallet_balance(&self, address: &str) -> Result<Decimal, TransportError>;
}

/// What the source of truth says about a finished bet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleVerdict {
    pub outcome: SettledOutcome,
    /// Transaction hash or equivalent audit reference.
    pub proof_reference: String,
}

/// Authoritative resolution source (backend oracle or on-chain read).
#[async_trait]
pub trait SettlementOracle: Send + Sync {
    async fn resolve(&self, bet: &Bet) -> Result<OracleVerdict, TransportError>;
}

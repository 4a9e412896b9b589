use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::api::SettlementOracle;
use crate::errors::{SettlementError, TransportError};
use crate::models::{Bet, SettledOutcome, SettlementResult};

use super::ledger::{BetLedger, Refund, Resolution};

/// `amount * odds` for a win, zero for a loss. Always the odds frozen on the
/// bet at placement. A win whose payout does not fit in a [`Decimal`] cannot
/// be settled.
pub fn calculate_payout(bet: &Bet, outcome: SettledOutcome) -> Result<Decimal, SettlementError> {
    match outcome {
        SettledOutcome::Won => bet.amount.checked_mul(bet.odds).ok_or_else(|| SettlementError::InvalidState {
            bet_id: bet.id,
            reason: format!("payout of {} at {} overflows", bet.amount, bet.odds),
        }),
        SettledOutcome::Lost => Ok(Decimal::ZERO),
    }
}

/// Resolves active bets on completed events exactly once.
#[derive(Clone)]
pub struct SettlementResolver {
    ledger: BetLedger,
    oracle: Arc<dyn SettlementOracle>,
    timeout: Duration,
}

impl SettlementResolver {
    pub fn new(ledger: BetLedger, oracle: Arc<dyn SettlementOracle>, timeout: Duration) -> Self {
        Self {
            ledger,
            oracle,
            timeout,
        }
    }

    pub fn ledger(&self) -> &BetLedger {
        &self.ledger
    }

    /// Resolve `bet_id` to won or lost.
    ///
    /// A bet that already has a result gets that same result back with no
    /// further writes. If the oracle fails or times out the bet stays active
    /// and the error is retryable.
    pub async fn settle(&self, bet_id: Uuid) -> Result<SettlementResult, SettlementError> {
        let bet = match self.ledger.begin_resolution(bet_id).await {
            Ok(Resolution::Replay(result)) => {
                tracing::debug!(bet_id = %bet_id, "Settlement already recorded, replaying");
                return Ok(result);
            }
            Ok(Resolution::Resolve(bet)) => bet,
            Err(e) => {
                tracing::debug!(bet_id = %bet_id, error = %e, "Settlement rejected");
                return Err(e);
            }
        };

        let verdict = match tokio::time::timeout(self.timeout, self.oracle.resolve(&bet)).await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => return Err(self.fail(bet_id, e).await),
            Err(_) => return Err(self.fail(bet_id, TransportError::Timeout(self.timeout)).await),
        };

        if verdict.proof_reference.trim().is_empty() {
            let e = TransportError::Unexpected("settlement source returned no proof reference".into());
            return Err(self.fail(bet_id, e).await);
        }

        let payout = match calculate_payout(&bet, verdict.outcome) {
            Ok(payout) => payout,
            Err(e) => {
                self.ledger.abort(bet_id).await;
                tracing::error!(bet_id = %bet_id, error = %e, "Settlement abandoned, bet left active");
                return Err(e);
            }
        };

        let result = SettlementResult {
            bet_id,
            status: verdict.outcome,
            payout,
            proof_reference: verdict.proof_reference,
            settled_at: Utc::now(),
        };
        let result = self.ledger.complete(result).await?;

        counter!("bets_settled").increment(1);
        tracing::info!(
            bet_id = %bet_id,
            event_id = %bet.event_id,
            status = %result.status,
            payout = %result.payout,
            proof = %result.proof_reference,
            "Bet settled"
        );
        Ok(result)
    }

    /// Settle every active bet on `event_id`, one at a time.
    pub async fn settle_event(&self, event_id: &str) -> Vec<(Uuid, Result<SettlementResult, SettlementError>)> {
        let mut outcomes = Vec::new();
        for bet_id in self.ledger.active_bets_for_event(event_id).await {
            let result = self.settle(bet_id).await;
            outcomes.push((bet_id, result));
        }
        outcomes
    }

    pub async fn cancel_bet(&self, bet_id: Uuid) -> Result<Refund, SettlementError> {
        let refund = self.ledger.cancel_bet(bet_id).await?;
        tracing::info!(bet_id = %bet_id, refund = %refund.amount, "Bet cancelled");
        Ok(refund)
    }

    /// Upstream cancelled the event: refund every open bet on it.
    pub async fn cancel_event(&self, event_id: &str) -> Result<Vec<Refund>, SettlementError> {
        let refunds = self.ledger.cancel_event(event_id).await?;
        let total = refunds.iter().fold(Decimal::ZERO, |acc, r| acc.saturating_add(r.amount));
        tracing::info!(
            event_id = %event_id,
            bets = refunds.len(),
            refunded = %total,
            "Event cancelled, stakes refunded"
        );
        Ok(refunds)
    }

    async fn fail(&self, bet_id: Uuid, error: TransportError) -> SettlementError {
        self.ledger.abort(bet_id).await;
        counter!("settlement_failures").increment(1);
        tracing::warn!(bet_id = %bet_id, error = %error, "Settlement source unavailable, bet left active");
        SettlementError::Transport(error)
    }
}

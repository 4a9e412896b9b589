use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::SettlementError;
use crate::models::{Bet, BetStatus, BettingEvent, EventStatus, SettlementResult};

/// Stake handed back for a cancelled bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Refund {
    pub bet_id: Uuid,
    pub amount: Decimal,
}

/// What the resolver should do with a settle request.
#[derive(Debug)]
pub(crate) enum Resolution {
    /// Already resolved; hand back the stored result unchanged.
    Replay(SettlementResult),
    /// Eligible and now marked as resolving.
    Resolve(Bet),
}

/// Store of placed bets, known event statuses and settlement results.
///
/// Bets live in `live` until [`BetLedger::archive_settled`] moves the
/// terminal ones into `history`. Terminal bet state is only written through
/// the settlement paths below.
#[derive(Clone, Default)]
pub struct BetLedger {
    inner: Arc<Mutex<LedgerInner>>,
}

#[derive(Default)]
struct LedgerInner {
    live: HashMap<Uuid, Bet>,
    /// Newest first.
    history: Vec<Bet>,
    events: HashMap<String, EventStatus>,
    /// Bets with a settlement request in flight.
    resolving: HashSet<Uuid>,
    results: HashMap<Uuid, SettlementResult>,
}

impl LedgerInner {
    fn find(&self, bet_id: &Uuid) -> Option<&Bet> {
        self.live
            .get(bet_id)
            .or_else(|| self.history.iter().find(|b| b.id == *bet_id))
    }

    fn find_mut(&mut self, bet_id: &Uuid) -> Option<&mut Bet> {
        match self.live.get_mut(bet_id) {
            Some(bet) => Some(bet),
            None => self.history.iter_mut().find(|b| b.id == *bet_id),
        }
    }

    fn set_event_status(&mut self, event_id: &str, status: EventStatus) -> Result<(), SettlementError> {
        if let Some(current) = self.events.get(event_id).copied() {
            if !current.can_transition_to(status) {
                return Err(SettlementError::InvalidEventTransition {
                    event_id: event_id.to_string(),
                    from: current,
                    to: status,
                });
            }
        }
        self.events.insert(event_id.to_string(), status);
        Ok(())
    }

    fn cancel(&mut self, bet_id: Uuid) -> Result<Refund, SettlementError> {
        if self.resolving.contains(&bet_id) {
            return Err(SettlementError::InvalidState {
                bet_id,
                reason: "settlement in progress".into(),
            });
        }
        let bet = self.find_mut(&bet_id).ok_or(SettlementError::NotFound(bet_id))?;
        if !bet.status.can_transition_to(BetStatus::Cancelled) {
            return Err(SettlementError::InvalidBetTransition {
                bet_id,
                from: bet.status,
                to: BetStatus::Cancelled,
            });
        }
        bet.status = BetStatus::Cancelled;
        Ok(Refund {
            bet_id,
            amount: bet.amount,
        })
    }
}

impl BetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly placed (or freshly fetched) bet.
    pub async fn record(&self, bet: Bet) -> Result<(), SettlementError> {
        let mut inner = self.inner.lock().await;
        if inner.find(&bet.id).is_some() {
            return Err(SettlementError::InvalidState {
                bet_id: bet.id,
                reason: "bet already recorded".into(),
            });
        }
        tracing::debug!(bet_id = %bet.id, event_id = %bet.event_id, status = %bet.status, "Ledger: recorded bet");
        inner.live.insert(bet.id, bet);
        Ok(())
    }

    pub async fn get(&self, bet_id: Uuid) -> Option<Bet> {
        self.inner.lock().await.find(&bet_id).cloned()
    }

    /// Bets not yet archived, newest first.
    pub async fn live_bets(&self) -> Vec<Bet> {
        let inner = self.inner.lock().await;
        let mut bets: Vec<Bet> = inner.live.values().cloned().collect();
        bets.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        bets
    }

    pub async fn history(&self) -> Vec<Bet> {
        self.inner.lock().await.history.clone()
    }

    pub async fn result(&self, bet_id: Uuid) -> Option<SettlementResult> {
        self.inner.lock().await.results.get(&bet_id).cloned()
    }

    /// Placement confirmed: pending -> active.
    pub async fn activate(&self, bet_id: Uuid) -> Result<Bet, SettlementError> {
        let mut inner = self.inner.lock().await;
        let bet = inner.find_mut(&bet_id).ok_or(SettlementError::NotFound(bet_id))?;
        if !bet.status.can_transition_to(BetStatus::Active) {
            return Err(SettlementError::InvalidBetTransition {
                bet_id,
                from: bet.status,
                to: BetStatus::Active,
            });
        }
        bet.status = BetStatus::Active;
        Ok(bet.clone())
    }

    pub async fn set_event_status(&self, event_id: &str, status: EventStatus) -> Result<(), SettlementError> {
        let mut inner = self.inner.lock().await;
        inner.set_event_status(event_id, status)?;
        tracing::debug!(event_id = %event_id, status = %status, "Ledger: event status updated");
        Ok(())
    }

    /// Apply statuses from a fresh event listing. Transitions that would go
    /// backwards are skipped.
    pub async fn sync_events(&self, events: &[BettingEvent]) {
        let mut inner = self.inner.lock().await;
        for event in events {
            if let Err(e) = inner.set_event_status(&event.id, event.status) {
                tracing::warn!(error = %e, "Ledger: ignoring event status from listing");
            }
        }
    }

    pub async fn event_status(&self, event_id: &str) -> Option<EventStatus> {
        self.inner.lock().await.events.get(event_id).copied()
    }

    /// Move terminal bets from the live set into history. Returns how many
    /// were moved.
    pub async fn archive_settled(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let terminal: Vec<Uuid> = inner
            .live
            .values()
            .filter(|b| b.status.is_terminal())
            .map(|b| b.id)
            .collect();

        let mut archived: Vec<Bet> = terminal
            .iter()
            .filter_map(|id| inner.live.remove(id))
            .collect();
        archived.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));

        let count = archived.len();
        let older = std::mem::take(&mut inner.history);
        inner.history = archived;
        inner.history.extend(older);

        if count > 0 {
            tracing::debug!(count, "Ledger: archived settled bets");
        }
        count
    }

    pub async fn cancel_bet(&self, bet_id: Uuid) -> Result<Refund, SettlementError> {
        self.inner.lock().await.cancel(bet_id)
    }

    /// Mark the event cancelled and cancel every open bet on it.
    pub async fn cancel_event(&self, event_id: &str) -> Result<Vec<Refund>, SettlementError> {
        let mut inner = self.inner.lock().await;
        inner.set_event_status(event_id, EventStatus::Cancelled)?;

        let open: Vec<Uuid> = inner
            .live
            .values()
            .chain(inner.history.iter())
            .filter(|b| b.event_id == event_id && !b.status.is_terminal())
            .map(|b| b.id)
            .collect();

        let mut refunds = Vec::with_capacity(open.len());
        for bet_id in open {
            refunds.push(inner.cancel(bet_id)?);
        }
        Ok(refunds)
    }

    /// Ids of active bets on `event_id`.
    pub async fn active_bets_for_event(&self, event_id: &str) -> Vec<Uuid> {
        let inner = self.inner.lock().await;
        inner
            .live
            .values()
            .filter(|b| b.event_id == event_id && b.status == BetStatus::Active)
            .map(|b| b.id)
            .collect()
    }

    // --- Settlement paths (resolver only) ---

    pub(crate) async fn begin_resolution(&self, bet_id: Uuid) -> Result<Resolution, SettlementError> {
        let mut inner = self.inner.lock().await;

        if let Some(result) = inner.results.get(&bet_id) {
            return Ok(Resolution::Replay(result.clone()));
        }

        let bet = inner.find(&bet_id).ok_or(SettlementError::NotFound(bet_id))?;
        let invalid = |reason: String| SettlementError::InvalidState { bet_id, reason };

        match bet.status {
            BetStatus::Active => {}
            BetStatus::Pending => return Err(invalid("placement not yet confirmed".into())),
            BetStatus::Cancelled => return Err(invalid("bet was cancelled".into())),
            BetStatus::Won | BetStatus::Lost => {
                return Err(invalid("bet settled elsewhere without a recorded result".into()))
            }
        }

        match inner.events.get(&bet.event_id) {
            Some(EventStatus::Completed) => {}
            Some(status) => return Err(invalid(format!("event {} is {}", bet.event_id, status))),
            None => return Err(invalid(format!("status of event {} is unknown", bet.event_id))),
        }

        if inner.resolving.contains(&bet_id) {
            return Err(invalid("settlement already in progress".into()));
        }

        let bet = bet.clone();
        inner.resolving.insert(bet_id);
        Ok(Resolution::Resolve(bet))
    }

    /// Commit a resolved outcome. Status, `settled_at` and `payout` change
    /// together or not at all.
    pub(crate) async fn complete(&self, result: SettlementResult) -> Result<SettlementResult, SettlementError> {
        let mut inner = self.inner.lock().await;
        let bet_id = result.bet_id;
        inner.resolving.remove(&bet_id);

        let bet = inner.find_mut(&bet_id).ok_or(SettlementError::NotFound(bet_id))?;
        let next = BetStatus::from(result.status);
        if !bet.status.can_transition_to(next) {
            return Err(SettlementError::InvalidBetTransition {
                bet_id,
                from: bet.status,
                to: next,
            });
        }

        bet.status = next;
        bet.settled_at = Some(result.settled_at);
        bet.payout = Some(result.payout);

        inner.results.insert(bet_id, result.clone());
        Ok(result)
    }

    /// Resolution failed; the bet stays as it was.
    pub(crate) async fn abort(&self, bet_id: Uuid) {
        self.inner.lock().await.resolving.remove(&bet_id);
    }
}

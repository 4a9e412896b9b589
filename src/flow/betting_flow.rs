use metrics::counter;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{BetApi, PlaceBetRequest};
use crate::errors::{FlowError, TransportError, ValidationError};
use crate::models::bet::potential_return;
use crate::models::{Bet, BettingEvent, Outcome, SettlementResult, WalletState};

use super::dedup::{fingerprint, RecentHashes, DEFAULT_RECENT_CAPACITY};
use super::limits::{check_balance, check_stake, BettingLimits};
use super::machine::{transition, FlowAction, FlowStep};
use super::slip::{saturating_sum, BetSelection, BetSlip};

const DEFAULT_DUPLICATE_WINDOW: Duration = Duration::from_secs(10);

/// Drives one user's bet submission: event and outcome picks, the bet slip,
/// stake validation, placement through the [`BetApi`], and the local view of
/// placed bets.
///
/// The selected outcome and stake are those of the focused slip line.
#[derive(Debug)]
pub struct BettingFlow {
    limits: BettingLimits,
    step: FlowStep,
    selected_event: Option<BettingEvent>,
    error: Option<String>,
    user_balance: Decimal,
    slip: BetSlip,
    recent: RecentHashes,
    placed: Vec<Bet>,
    settlements: HashMap<Uuid, SettlementResult>,
}

impl BettingFlow {
    pub fn new(limits: BettingLimits, user_balance: Decimal) -> Self {
        Self::with_duplicate_window(limits, user_balance, DEFAULT_DUPLICATE_WINDOW)
    }

    pub fn with_duplicate_window(limits: BettingLimits, user_balance: Decimal, window: Duration) -> Self {
        Self {
            limits,
            step: FlowStep::Idle,
            selected_event: None,
            error: None,
            user_balance,
            slip: BetSlip::new(),
            recent: RecentHashes::new(DEFAULT_RECENT_CAPACITY, window),
            placed: Vec::new(),
            settlements: HashMap::new(),
        }
    }

    // --- Accessors ---

    pub fn step(&self) -> FlowStep {
        self.step
    }

    pub fn limits(&self) -> &BettingLimits {
        &self.limits
    }

    pub fn selected_event(&self) -> Option<&BettingEvent> {
        self.selected_event.as_ref()
    }

    pub fn selected_outcome(&self) -> Option<&BetSelection> {
        self.slip.focused()
    }

    pub fn bet_amount(&self) -> Decimal {
        self.slip.focused().map(|s| s.stake).unwrap_or(Decimal::ZERO)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn user_balance(&self) -> Decimal {
        self.user_balance
    }

    pub fn slip(&self) -> &BetSlip {
        &self.slip
    }

    pub fn placed_bets(&self) -> &[Bet] {
        &self.placed
    }

    pub fn settlement(&self, bet_id: Uuid) -> Option<&SettlementResult> {
        self.settlements.get(&bet_id)
    }

    /// `bet_amount * selected_outcome.odds`, zero without a selection.
    pub fn potential_return(&self) -> Decimal {
        self.slip
            .focused()
            .map(BetSelection::potential_return)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn can_place_bet(&self) -> bool {
        !matches!(self.step, FlowStep::Processing | FlowStep::Settled)
            && self.selected_event.is_some()
            && self.slip.focused().is_some()
            && self.bet_amount() > Decimal::ZERO
    }

    // --- Selection ---

    pub fn select_event(&mut self, event: &BettingEvent) -> Result<(), FlowError> {
        let next = self.guard(FlowAction::SelectEvent)?;

        if !event.status.is_open() {
            return Err(self.reject(ValidationError::EventNotOpen {
                event_id: event.id.clone(),
                status: event.status,
            }));
        }

        self.selected_event = Some(event.clone());
        self.slip.unfocus();
        self.error = None;
        self.step = next;
        debug!(event_id = %event.id, "Event selected");
        Ok(())
    }

    /// Pick `outcome` (with its current live odds) from the selected event.
    /// Adds it to the bet slip, or focuses it if it is already there.
    pub fn select_outcome(&mut self, outcome: &Outcome) -> Result<Uuid, FlowError> {
        let next = self.guard(FlowAction::SelectOutcome)?;

        let Some(event) = self.selected_event.as_ref() else {
            return Err(self.reject(ValidationError::MissingEvent));
        };
        if event.outcome(&outcome.id).is_none() {
            let err = ValidationError::OutcomeNotInEvent {
                event_id: event.id.clone(),
                outcome_id: outcome.id.clone(),
            };
            return Err(self.reject(err));
        }
        let event_id = event.id.clone();

        match self
            .slip
            .add(&event_id, &outcome.id, &outcome.name, outcome.odds, &self.limits)
        {
            Ok(id) => {
                self.error = None;
                self.step = next;
                Ok(id)
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Set the stake of the focused selection. An invalid stake leaves the
    /// previous amount in place and records the error.
    pub fn set_amount(&mut self, amount: Decimal) -> Result<(), FlowError> {
        let next = self.guard(FlowAction::SetAmount)?;

        let Some(id) = self.slip.focused().map(|s| s.id) else {
            return Err(self.reject(ValidationError::MissingOutcome));
        };

        match self
            .slip
            .set_stake(id, amount, &self.limits, self.user_balance)
        {
            Ok(()) => {
                self.error = None;
                self.step = next;
                Ok(())
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Set the stake of any slip line by id.
    pub fn set_selection_stake(&mut self, id: Uuid, amount: Decimal) -> Result<(), FlowError> {
        let next = self.guard(FlowAction::EditSlip)?;
        match self.slip.set_stake(id, amount, &self.limits, self.user_balance) {
            Ok(()) => {
                self.error = None;
                self.step = next;
                Ok(())
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    pub fn focus_selection(&mut self, id: Uuid) -> Result<bool, FlowError> {
        self.guard(FlowAction::EditSlip)?;
        Ok(self.slip.focus(id))
    }

    pub fn remove_selection(&mut self, id: Uuid) -> Result<Option<BetSelection>, FlowError> {
        self.guard(FlowAction::EditSlip)?;
        Ok(self.slip.remove(id))
    }

    pub fn clear_slip(&mut self) -> Result<(), FlowError> {
        self.guard(FlowAction::EditSlip)?;
        self.slip.clear();
        Ok(())
    }

    /// Carry live odds into unsubmitted slip lines for `event_id`.
    /// Ignored once the submission is in flight or placed.
    pub fn sync_odds(&mut self, event_id: &str, outcomes: &[Outcome]) {
        if matches!(self.step, FlowStep::Processing | FlowStep::Settled) {
            return;
        }
        for outcome in outcomes {
            self.slip.update_odds(event_id, &outcome.id, outcome.odds);
        }
    }

    // --- Submission ---

    pub fn confirm(&mut self) -> Result<(), FlowError> {
        let next = self.guard(FlowAction::Confirm)?;

        if self.selected_event.is_none() {
            return Err(self.reject(ValidationError::MissingEvent));
        }
        if self.slip.focused().is_none() {
            return Err(self.reject(ValidationError::MissingOutcome));
        }
        if self.bet_amount() <= Decimal::ZERO {
            return Err(self.reject(ValidationError::MissingStake));
        }

        self.error = None;
        self.step = next;
        Ok(())
    }

    /// Validate the whole slip and move to `Processing`. Returns the
    /// placement requests to send, in slip order.
    pub fn begin_submission(&mut self) -> Result<Vec<PlaceBetRequest>, FlowError> {
        let next = self.guard(FlowAction::Submit)?;

        if let Err(e) = self.validate_slip() {
            return Err(self.reject(e));
        }

        let requests = self
            .slip
            .selections()
            .iter()
            .map(|s| PlaceBetRequest {
                event_id: s.event_id.clone(),
                outcome_id: s.outcome_id.clone(),
                amount: s.stake,
            })
            .collect();

        self.error = None;
        self.step = next;
        Ok(requests)
    }

    fn validate_slip(&self) -> Result<(), ValidationError> {
        let selections = self.slip.selections();
        if selections.is_empty() {
            return Err(ValidationError::EmptySlip);
        }
        for selection in selections {
            if selection.stake <= Decimal::ZERO {
                return Err(ValidationError::MissingStake);
            }
            check_stake(selection.stake, &self.limits)?;
            potential_return(selection.stake, selection.odds)?;
        }
        check_balance(self.slip.total_stake(), self.user_balance)?;
        if self.recent.is_duplicate(&fingerprint(selections)) {
            return Err(ValidationError::DuplicateSubmission);
        }
        Ok(())
    }

    /// Every slip line was acknowledged by the collaborator.
    pub fn placement_succeeded(&mut self, bets: Vec<Bet>) -> Result<(), FlowError> {
        let next = self.guard(FlowAction::PlacementSucceeded)?;

        self.recent.insert(fingerprint(self.slip.selections()));
        self.record_placed(bets);
        self.slip.clear();
        self.error = None;
        self.step = next;
        Ok(())
    }

    /// Placement stopped at a failure. Lines that did go through before it
    /// are recorded and leave the slip; the rest stay for a retry.
    pub fn placement_failed(&mut self, message: &str, placed: Vec<Bet>) -> Result<(), FlowError> {
        let next = self.guard(FlowAction::PlacementFailed)?;

        for bet in &placed {
            let line = self
                .slip
                .selections()
                .iter()
                .find(|s| s.event_id == bet.event_id && s.outcome_id == bet.outcome_id)
                .map(|s| s.id);
            if let Some(id) = line {
                self.slip.remove(id);
            }
        }
        self.record_placed(placed);

        counter!("bet_placement_failures").increment(1);
        warn!(error = %message, "Bet placement failed");
        self.error = Some(message.to_string());
        self.step = next;
        Ok(())
    }

    /// Place every slip line through `api`, each bounded by `timeout`.
    /// Stops at the first failure.
    pub async fn submit(&mut self, api: &dyn BetApi, timeout: Duration) -> Result<Vec<Bet>, FlowError> {
        let requests = self.begin_submission()?;

        let mut placed = Vec::with_capacity(requests.len());
        for request in &requests {
            let result = match tokio::time::timeout(timeout, api.place_bet(request)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(timeout)),
            };
            match result {
                Ok(bet) => placed.push(bet),
                Err(e) => {
                    self.placement_failed(&e.to_string(), placed)?;
                    return Err(e.into());
                }
            }
        }

        self.placement_succeeded(placed.clone())?;
        Ok(placed)
    }

    fn record_placed(&mut self, bets: Vec<Bet>) {
        if bets.is_empty() {
            return;
        }
        let staked = saturating_sum(bets.iter().map(|b| b.amount));
        self.user_balance = (self.user_balance - staked).max(Decimal::ZERO);

        counter!("bets_placed").increment(bets.len() as u64);
        for bet in &bets {
            info!(
                bet_id = %bet.id,
                event_id = %bet.event_id,
                outcome_id = %bet.outcome_id,
                amount = %bet.amount,
                odds = %bet.odds,
                "Bet placed"
            );
        }
        self.placed.extend(bets);
    }

    // --- External state ---

    /// Record a settlement for one of our placed bets. Winning payouts are
    /// credited to the local balance the first time they are seen.
    pub fn record_settlement(&mut self, result: &SettlementResult) -> bool {
        if !self.placed.iter().any(|b| b.id == result.bet_id) {
            debug!(bet_id = %result.bet_id, "Ignoring settlement for unknown bet");
            return false;
        }
        if self.settlements.contains_key(&result.bet_id) {
            return false;
        }
        self.user_balance = self.user_balance.saturating_add(result.payout);
        self.settlements.insert(result.bet_id, result.clone());
        true
    }

    pub fn sync_wallet(&mut self, wallet: &WalletState) {
        self.user_balance = wallet.available();
    }

    pub fn set_balance(&mut self, balance: Decimal) {
        self.user_balance = balance;
    }

    /// Abort the current submission with a message (e.g. a wallet failure).
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), FlowError> {
        let next = self.guard(FlowAction::Fail)?;
        self.error = Some(message.into());
        self.step = next;
        Ok(())
    }

    /// Back to `Idle`. Clears the selection and the slip; placed bets,
    /// settlements and the local balance are kept.
    pub fn reset(&mut self) {
        self.step = FlowStep::Idle;
        self.selected_event = None;
        self.slip.clear();
        self.error = None;
    }

    // --- Internals ---

    fn guard(&self, action: FlowAction) -> Result<FlowStep, FlowError> {
        transition(self.step, action).ok_or(FlowError::InvalidTransition {
            from: self.step,
            action,
        })
    }

    fn reject(&mut self, err: ValidationError) -> FlowError {
        self.error = Some(err.to_string());
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventStatus;

    fn event() -> BettingEvent {
        BettingEvent {
            id: "E1".into(),
            name: "Race 1".into(),
            description: None,
            category: None,
            start_time: None,
            status: EventStatus::Live,
            outcomes: vec![
                Outcome::new("O1", "Thunderbolt", Decimal::new(185, 2)),
                Outcome::new("O2", "Night Owl", Decimal::new(320, 2)),
            ],
        }
    }

    fn flow() -> BettingFlow {
        BettingFlow::new(BettingLimits::default(), Decimal::from(100))
    }

    fn selecting(flow: &mut BettingFlow) {
        let event = event();
        flow.select_event(&event).unwrap();
        flow.select_outcome(&event.outcomes[0]).unwrap();
    }

    #[test]
    fn test_potential_return() {
        let mut flow = flow();
        assert_eq!(flow.potential_return(), Decimal::ZERO);
        selecting(&mut flow);
        flow.set_amount(Decimal::from(10)).unwrap();
        assert_eq!(flow.potential_return(), Decimal::new(1850, 2));
        assert!(flow.can_place_bet());
    }

    #[test]
    fn test_invalid_amount_keeps_previous() {
        let mut flow = flow();
        selecting(&mut flow);
        flow.set_amount(Decimal::from(10)).unwrap();

        let err = flow.set_amount(Decimal::new(5, 1)).unwrap_err();
        assert!(matches!(err, FlowError::Validation(ValidationError::StakeBelowMinimum { .. })));
        assert_eq!(flow.bet_amount(), Decimal::from(10));
        assert_eq!(flow.error(), Some("Minimum stake is 1"));

        flow.set_amount(Decimal::from(20)).unwrap();
        assert!(flow.error().is_none());
    }

    #[test]
    fn test_confirm_guards() {
        let mut flow = flow();
        let event = event();
        flow.select_event(&event).unwrap();

        assert!(flow.confirm().is_err());
        assert_eq!(flow.step(), FlowStep::Selecting);
        assert_eq!(flow.error(), Some("No outcome selected"));

        flow.select_outcome(&event.outcomes[1]).unwrap();
        assert!(flow.error().is_none());
        assert!(matches!(
            flow.confirm(),
            Err(FlowError::Validation(ValidationError::MissingStake))
        ));

        flow.set_amount(Decimal::from(5)).unwrap();
        flow.confirm().unwrap();
        assert_eq!(flow.step(), FlowStep::Confirming);
    }

    #[test]
    fn test_select_event_clears_outcome() {
        let mut flow = flow();
        selecting(&mut flow);
        flow.set_amount(Decimal::from(10)).unwrap();

        flow.select_event(&event()).unwrap();
        assert!(flow.selected_outcome().is_none());
        assert_eq!(flow.bet_amount(), Decimal::ZERO);
        // the slip line itself survives
        assert_eq!(flow.slip().len(), 1);
    }

    #[test]
    fn test_closed_event_rejected() {
        let mut flow = flow();
        let mut event = event();
        event.status = EventStatus::Completed;
        assert!(matches!(
            flow.select_event(&event),
            Err(FlowError::Validation(ValidationError::EventNotOpen { .. }))
        ));
        assert_eq!(flow.step(), FlowStep::Idle);
    }

    #[test]
    fn test_outcome_from_other_event_rejected() {
        let mut flow = flow();
        flow.select_event(&event()).unwrap();
        let stranger = Outcome::new("X9", "Stranger", Decimal::from(2));
        assert!(matches!(
            flow.select_outcome(&stranger),
            Err(FlowError::Validation(ValidationError::OutcomeNotInEvent { .. }))
        ));
        assert!(flow.slip().is_empty());
    }

    #[test]
    fn test_remove_focused_selection_clears_selected_outcome() {
        let mut flow = flow();
        selecting(&mut flow);
        let id = flow.selected_outcome().map(|s| s.id).unwrap();
        flow.remove_selection(id).unwrap();
        assert!(flow.selected_outcome().is_none());
        assert!(!flow.can_place_bet());
    }

    #[test]
    fn test_settled_only_allows_reset() {
        let mut flow = flow();
        selecting(&mut flow);
        flow.set_amount(Decimal::from(10)).unwrap();
        flow.begin_submission().unwrap();
        let bet = Bet::new("E1", "O1", Decimal::from(10), Decimal::new(185, 2)).unwrap();
        flow.placement_succeeded(vec![bet]).unwrap();
        assert_eq!(flow.step(), FlowStep::Settled);
        assert!(flow.slip().is_empty());
        assert_eq!(flow.user_balance(), Decimal::from(90));

        assert!(matches!(
            flow.select_event(&event()),
            Err(FlowError::InvalidTransition { from: FlowStep::Settled, .. })
        ));
        assert!(flow.fail("late").is_err());

        flow.reset();
        assert_eq!(flow.step(), FlowStep::Idle);
        assert_eq!(flow.placed_bets().len(), 1);
    }

    #[test]
    fn test_duplicate_submission_rejected() {
        let mut flow = flow();
        selecting(&mut flow);
        flow.set_amount(Decimal::from(10)).unwrap();
        flow.begin_submission().unwrap();
        let bet = Bet::new("E1", "O1", Decimal::from(10), Decimal::new(185, 2)).unwrap();
        flow.placement_succeeded(vec![bet]).unwrap();
        flow.reset();

        // same slip again straight away
        selecting(&mut flow);
        flow.set_amount(Decimal::from(10)).unwrap();
        assert!(matches!(
            flow.begin_submission(),
            Err(FlowError::Validation(ValidationError::DuplicateSubmission))
        ));
        assert_eq!(flow.step(), FlowStep::Selecting);
    }

    #[test]
    fn test_partial_placement_keeps_unplaced_lines() {
        let mut flow = flow();
        let event = event();
        flow.select_event(&event).unwrap();
        flow.select_outcome(&event.outcomes[0]).unwrap();
        flow.set_amount(Decimal::from(10)).unwrap();
        flow.select_outcome(&event.outcomes[1]).unwrap();
        flow.set_amount(Decimal::from(5)).unwrap();
        flow.begin_submission().unwrap();

        let first = Bet::new("E1", "O1", Decimal::from(10), Decimal::new(185, 2)).unwrap();
        flow.placement_failed("Bet rejected", vec![first]).unwrap();

        assert_eq!(flow.step(), FlowStep::Error);
        assert_eq!(flow.error(), Some("Bet rejected"));
        assert_eq!(flow.slip().len(), 1);
        assert_eq!(flow.slip().selections()[0].outcome_id, "O2");
        assert_eq!(flow.placed_bets().len(), 1);
    }

    #[test]
    fn test_sync_odds_moves_unsubmitted_lines() {
        let mut flow = flow();
        selecting(&mut flow);
        let mut live = event().outcomes;
        live[0].odds = Decimal::new(200, 2);
        flow.sync_odds("E1", &live);
        assert_eq!(flow.selected_outcome().map(|s| s.odds), Some(Decimal::new(200, 2)));
    }

    #[test]
    fn test_submission_rejects_unrepresentable_return() {
        let mut flow = flow();
        selecting(&mut flow);
        flow.set_amount(Decimal::from(10)).unwrap();
        let mut live = event().outcomes;
        live[0].odds = Decimal::MAX;
        flow.sync_odds("E1", &live);

        assert_eq!(flow.potential_return(), Decimal::MAX);
        assert!(matches!(
            flow.begin_submission(),
            Err(FlowError::Validation(ValidationError::ReturnTooLarge { .. }))
        ));
        assert_eq!(flow.step(), FlowStep::Selecting);
        assert_eq!(flow.error(), Some("Potential return of 10 at 79228162514264337593543950335 is too large"));
    }

    #[test]
    fn test_record_settlement_credits_once() {
        let mut flow = flow();
        selecting(&mut flow);
        flow.set_amount(Decimal::from(10)).unwrap();
        flow.begin_submission().unwrap();
        let bet = Bet::new("E1", "O1", Decimal::from(10), Decimal::new(185, 2)).unwrap();
        let bet_id = bet.id;
        flow.placement_succeeded(vec![bet]).unwrap();

        let result = SettlementResult {
            bet_id,
            status: crate::models::SettledOutcome::Won,
            payout: Decimal::new(1850, 2),
            proof_reference: "0xabc".into(),
            settled_at: chrono::Utc::now(),
        };
        assert!(flow.record_settlement(&result));
        assert!(!flow.record_settlement(&result));
        assert_eq!(flow.user_balance(), Decimal::new(10850, 2));
        assert_eq!(flow.placed_bets()[0].status, crate::models::BetStatus::Pending);
    }
}

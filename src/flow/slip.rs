use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ValidationError;
use crate::models::bet::potential_return;

use super::limits::{check_balance, check_stake, BettingLimits};

/// A not-yet-submitted line in the bet slip. Session-only identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetSelection {
    pub id: Uuid,
    pub event_id: String,
    pub outcome_id: String,
    pub outcome_name: String,
    /// Odds seen when the outcome was picked.
    pub odds: Decimal,
    /// Zero until the user sets a stake.
    pub stake: Decimal,
}

impl BetSelection {
    /// `stake * odds`, saturating at [`Decimal::MAX`].
    pub fn potential_return(&self) -> Decimal {
        self.stake.saturating_mul(self.odds)
    }
}

/// Multi-selection bet slip with one optionally focused line.
#[derive(Debug, Clone, Default)]
pub struct BetSlip {
    selections: Vec<BetSelection>,
    focused: Option<Uuid>,
}

impl BetSlip {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selections(&self) -> &[BetSelection] {
        &self.selections
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&BetSelection> {
        self.selections.iter().find(|s| s.id == id)
    }

    pub fn focused(&self) -> Option<&BetSelection> {
        self.focused.and_then(|id| self.get(id))
    }

    pub fn count_for_event(&self, event_id: &str) -> usize {
        self.selections.iter().filter(|s| s.event_id == event_id).count()
    }

    pub fn total_stake(&self) -> Decimal {
        saturating_sum(self.selections.iter().map(|s| s.stake))
    }

    pub fn potential_return(&self) -> Decimal {
        saturating_sum(self.selections.iter().map(BetSelection::potential_return))
    }

    /// Add a line for `event_id`/`outcome_id` and focus it. Picking an outcome
    /// that is already in the slip just focuses the existing line.
    pub fn add(
        &mut self,
        event_id: &str,
        outcome_id: &str,
        outcome_name: &str,
        odds: Decimal,
        limits: &BettingLimits,
    ) -> Result<Uuid, ValidationError> {
        if let Some(existing) = self
            .selections
            .iter()
            .find(|s| s.event_id == event_id && s.outcome_id == outcome_id)
        {
            self.focused = Some(existing.id);
            return Ok(existing.id);
        }

        if self.count_for_event(event_id) >= limits.max_bets_per_event {
            return Err(ValidationError::TooManySelections {
                event_id: event_id.to_string(),
                max: limits.max_bets_per_event,
            });
        }

        let selection = BetSelection {
            id: Uuid::new_v4(),
            event_id: event_id.to_string(),
            outcome_id: outcome_id.to_string(),
            outcome_name: outcome_name.to_string(),
            odds,
            stake: Decimal::ZERO,
        };
        let id = selection.id;
        self.selections.push(selection);
        self.focused = Some(id);
        Ok(id)
    }

    /// Validate and apply a stake. On error nothing changes.
    pub fn set_stake(
        &mut self,
        id: Uuid,
        amount: Decimal,
        limits: &BettingLimits,
        balance: Decimal,
    ) -> Result<(), ValidationError> {
        check_stake(amount, limits)?;

        let index = self
            .selections
            .iter()
            .position(|s| s.id == id)
            .ok_or(ValidationError::MissingOutcome)?;

        potential_return(amount, self.selections[index].odds)?;

        let total = saturating_sum(
            self.selections
                .iter()
                .map(|s| if s.id == id { amount } else { s.stake }),
        );
        check_balance(total, balance)?;

        self.selections[index].stake = amount;
        Ok(())
    }

    /// Remove a line. Removing the focused line clears focus.
    pub fn remove(&mut self, id: Uuid) -> Option<BetSelection> {
        let index = self.selections.iter().position(|s| s.id == id)?;
        if self.focused == Some(id) {
            self.focused = None;
        }
        Some(self.selections.remove(index))
    }

    /// Refresh the odds of the line for `event_id`/`outcome_id`, if any.
    pub fn update_odds(&mut self, event_id: &str, outcome_id: &str, odds: Decimal) -> bool {
        match self
            .selections
            .iter_mut()
            .find(|s| s.event_id == event_id && s.outcome_id == outcome_id)
        {
            Some(selection) => {
                selection.odds = odds;
                true
            }
            None => false,
        }
    }

    pub fn focus(&mut self, id: Uuid) -> bool {
        if self.get(id).is_some() {
            self.focused = Some(id);
            true
        } else {
            false
        }
    }

    pub fn unfocus(&mut self) {
        self.focused = None;
    }

    /// Drop every selection and the focus together.
    pub fn clear(&mut self) {
        self.selections.clear();
        self.focused = None;
    }
}

pub(crate) fn saturating_sum(values: impl Iterator<Item = Decimal>) -> Decimal {
    values.fold(Decimal::ZERO, Decimal::saturating_add)
}

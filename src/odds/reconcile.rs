use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::errors::ReconcileError;
use crate::models::{OddsUpdate, Outcome, Trend};

/// Lowest multiplier the stream will ever store (1.01).
pub const ODDS_FLOOR: Decimal = Decimal::from_parts(101, 0, 0, false, 2);

/// Highest multiplier the stream accepts. Anything above is treated as a
/// corrupt feed value so `stake * odds` always stays representable.
pub const ODDS_CEILING: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

pub fn clamp_odds(odds: Decimal) -> Decimal {
    odds.max(ODDS_FLOOR)
}

/// New value of a single outcome after moving to `new_odds`.
///
/// Trend is always computed against the outcome's last applied odds, never
/// against whatever `previous_odds` the sender attached.
pub fn reconcile_outcome(outcome: &Outcome, new_odds: Decimal) -> Outcome {
    let clamped = clamp_odds(new_odds);
    Outcome {
        id: outcome.id.clone(),
        name: outcome.name.clone(),
        previous_odds: Some(outcome.odds),
        trend: Trend::between(outcome.odds, clamped),
        odds: clamped,
    }
}

/// Apply one update to an outcome set, returning the new set.
///
/// Only the targeted outcome changes. A rejected update leaves the input
/// untouched, so one bad message can't corrupt the rest of the event.
pub fn reconcile(
    event_id: &str,
    outcomes: &[Outcome],
    update: &OddsUpdate,
) -> Result<Vec<Outcome>, ReconcileError> {
    let index = locate(event_id, outcomes, update)?;
    let mut next = outcomes.to_vec();
    next[index] = reconcile_outcome(&outcomes[index], update.new_odds);
    Ok(next)
}

/// In-place variant used by the live stream. Returns the updated outcome.
pub fn reconcile_in_place(
    event_id: &str,
    outcomes: &mut [Outcome],
    update: &OddsUpdate,
) -> Result<Outcome, ReconcileError> {
    let index = locate(event_id, outcomes, update)?;
    let updated = reconcile_outcome(&outcomes[index], update.new_odds);
    outcomes[index] = updated.clone();
    Ok(updated)
}

fn locate(event_id: &str, outcomes: &[Outcome], update: &OddsUpdate) -> Result<usize, ReconcileError> {
    if update.event_id != event_id {
        return Err(ReconcileError::ForeignEvent {
            expected: event_id.to_string(),
            got: update.event_id.clone(),
        });
    }

    if update.new_odds <= Decimal::ZERO || update.new_odds > ODDS_CEILING {
        return Err(ReconcileError::MalformedOdds {
            outcome_id: update.outcome_id.clone(),
            odds: update.new_odds,
        });
    }

    let index = outcomes
        .iter()
        .position(|o| o.id == update.outcome_id)
        .ok_or_else(|| ReconcileError::UnknownOutcome(update.outcome_id.clone()))?;

    if let Some(claimed) = update.previous_odds {
        if claimed != outcomes[index].odds {
            // Missed or reordered message; the source is authoritative.
            tracing::debug!(
                event_id,
                outcome_id = %update.outcome_id,
                claimed_previous = %claimed,
                current = %outcomes[index].odds,
                "Odds update out of sequence, overwriting"
            );
        }
    }

    Ok(index)
}

/// Prepare an initial outcome set: clamp odds into floor..=ceiling and drop
/// duplicate ids (first one wins).
pub fn normalize_outcomes(outcomes: Vec<Outcome>) -> Vec<Outcome> {
    let mut seen = HashSet::new();
    outcomes
        .into_iter()
        .filter(|o| {
            let fresh = seen.insert(o.id.clone());
            if !fresh {
                tracing::warn!(outcome_id = %o.id, "Duplicate outcome id dropped");
            }
            fresh
        })
        .map(|mut o| {
            o.odds = clamp_odds(o.odds).min(ODDS_CEILING);
            o
        })
        .collect()
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Configurable stake limits for the bet slip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BettingLimits {
    /// Smallest accepted stake (default 1).
    pub min_stake: Decimal,
    /// Largest accepted stake (default 10000).
    pub max_stake: Decimal,
    /// Max slip selections referencing the same event (default 5).
    pub max_bets_per_event: usize,
}

impl Default for BettingLimits {
    fn default() -> Self {
        Self {
            min_stake: Decimal::ONE,
            max_stake: Decimal::from(10_000),
            max_bets_per_event: 5,
        }
    }
}

/// `min_stake <= amount <= max_stake`.
pub fn check_stake(amount: Decimal, limits: &BettingLimits) -> Result<(), ValidationError> {
    if amount < limits.min_stake {
        return Err(ValidationError::StakeBelowMinimum {
            amount,
            min: limits.min_stake,
        });
    }
    if amount > limits.max_stake {
        return Err(ValidationError::StakeAboveMaximum {
            amount,
            max: limits.max_stake,
        });
    }
    Ok(())
}

/// Sum of all pending stakes must fit in the user's balance.
pub fn check_balance(total_stake: Decimal, balance: Decimal) -> Result<(), ValidationError> {
    if total_stake > balance {
        return Err(ValidationError::InsufficientBalance {
            total: total_stake,
            balance,
        });
    }
    Ok(())
}

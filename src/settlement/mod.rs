pub mod ledger;
pub mod resolver;

pub use ledger::{BetLedger, Refund};
pub use resolver::{calculate_payout, SettlementResolver};

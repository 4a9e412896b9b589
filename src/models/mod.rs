pub mod bet;
pub mod event;
pub mod odds_update;
pub mod outcome;
pub mod settlement;
pub mod wallet;

pub use bet::{Bet, BetStatus};
pub use event::{BettingEvent, EventStatus};
pub use odds_update::OddsUpdate;
pub use outcome::{Outcome, Trend};
pub use settlement::{SettledOutcome, SettlementResult};
pub use wallet::WalletState;

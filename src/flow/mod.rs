pub mod betting_flow;
pub mod dedup;
pub mod limits;
pub mod machine;
pub mod slip;

pub use betting_flow::BettingFlow;
pub use dedup::{fingerprint, RecentHashes};
pub use limits::{check_balance, check_stake, BettingLimits};
pub use machine::{transition, FlowAction, FlowStep};
pub use slip::{BetSelection, BetSlip};

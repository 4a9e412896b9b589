pub mod history;
pub mod poll_source;
pub mod reconcile;
pub mod source;
pub mod stream;
pub mod ws_source;

pub use history::RecentUpdates;
pub use poll_source::PollingOddsSource;
pub use reconcile::{clamp_odds, reconcile, ODDS_CEILING, ODDS_FLOOR};
pub use source::{FeedItem, OddsFeed, OddsSource};
pub use stream::{ConnectionStatus, OddsSnapshot, OddsStream, ReconnectPolicy};
pub use ws_source::WsOddsSource;

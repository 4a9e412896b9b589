use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use crate::api::BetApi;
use crate::errors::TransportError;
use crate::models::{OddsUpdate, Outcome};

use super::source::{FeedItem, OddsFeed, OddsSource, FEED_BUFFER};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Polling fallback: fetches the event on a fixed interval and emits an
/// update for every outcome whose odds moved since the previous poll.
#[derive(Clone)]
pub struct PollingOddsSource {
    api: Arc<dyn BetApi>,
    interval: Duration,
}

impl PollingOddsSource {
    pub fn new(api: Arc<dyn BetApi>, interval: Duration) -> Self {
        Self { api, interval }
    }
}

#[async_trait]
impl OddsSource for PollingOddsSource {
    async fn connect(&self, event_id: &str) -> Result<OddsFeed, TransportError> {
        // First fetch doubles as the connectivity check.
        let event = self.api.get_event(event_id).await?;
        let mut last_seen = odds_by_outcome(&event.outcomes);

        let (tx, rx) = mpsc::channel(FEED_BUFFER);
        let api = Arc::clone(&self.api);
        let period = self.interval;
        let event_id = event_id.to_string();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // first tick fires immediately; we already fetched

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = tx.closed() => return,
                }

                let event = match api.get_event(&event_id).await {
                    Ok(e) => e,
                    Err(e) => {
                        // Dropping the sender reports the feed as lost.
                        tracing::warn!(event_id = %event_id, error = %e, "Odds poll failed");
                        return;
                    }
                };

                let updates = diff_outcomes(&event_id, &last_seen, &event.outcomes, Utc::now());
                last_seen = odds_by_outcome(&event.outcomes);

                if !updates.is_empty() {
                    tracing::debug!(event_id = %event_id, count = updates.len(), "Odds poll found changes");
                }
                for update in updates {
                    if tx.send(FeedItem::Update(update)).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

fn odds_by_outcome(outcomes: &[Outcome]) -> HashMap<String, Decimal> {
    outcomes.iter().map(|o| (o.id.clone(), o.odds)).collect()
}

/// Updates for outcomes whose odds differ from `previous`. Outcomes seen
/// for the first time are reported against no previous value.
pub fn diff_outcomes(
    event_id: &str,
    previous: &HashMap<String, Decimal>,
    current: &[Outcome],
    now: DateTime<Utc>,
) -> Vec<OddsUpdate> {
    current
        .iter()
        .filter(|o| previous.get(&o.id) != Some(&o.odds))
        .map(|o| OddsUpdate {
            event_id: event_id.to_string(),
            outcome_id: o.id.clone(),
            new_odds: o.odds,
            previous_odds: previous.get(&o.id).copied(),
            timestamp: now,
        })
        .collect()
}

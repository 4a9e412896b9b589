use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::errors::ReconcileError;
use crate::models::{OddsUpdate, Outcome};

use super::history::RecentUpdates;
use super::reconcile::{normalize_outcomes, reconcile_in_place};
use super::source::{FeedItem, OddsSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Error => write!(f, "error"),
        }
    }
}

/// Exponential backoff between reconnection attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Retries after a lost or failed connection before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (0-based), or `None` once the
    /// budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        Some(delay.min(self.max_delay))
    }
}

/// Consistent view of one event's live odds.
#[derive(Debug, Clone)]
pub struct OddsSnapshot {
    pub event_id: String,
    pub outcomes: Vec<Outcome>,
    pub recent_updates: RecentUpdates,
    pub last_update_at: Option<DateTime<Utc>>,
}

impl OddsSnapshot {
    pub fn outcome(&self, outcome_id: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.id == outcome_id)
    }
}

/// Live odds for a single event, kept current by a background supervisor
/// that owns the transport connection.
///
/// Readers get whole snapshots from a `watch` channel, so an outcome is never
/// observed with new odds and a stale trend. The supervisor keeps a clone of
/// the handle alive until [`OddsStream::detach`] is called.
#[derive(Clone)]
pub struct OddsStream {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    event_id: String,
    snapshot: watch::Sender<OddsSnapshot>,
    status: watch::Sender<ConnectionStatus>,
    detached: AtomicBool,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    source: Arc<dyn OddsSource>,
    policy: ReconnectPolicy,
}

impl OddsStream {
    /// Start tracking `event_id`, seeded with `initial_outcomes`.
    pub async fn attach(
        event_id: impl Into<String>,
        initial_outcomes: Vec<Outcome>,
        source: Arc<dyn OddsSource>,
        policy: ReconnectPolicy,
        history_capacity: usize,
    ) -> Self {
        let event_id = event_id.into();
        let snapshot = OddsSnapshot {
            event_id: event_id.clone(),
            outcomes: normalize_outcomes(initial_outcomes),
            recent_updates: RecentUpdates::new(history_capacity),
            last_update_at: None,
        };
        let (snapshot_tx, _) = watch::channel(snapshot);
        let (status_tx, _) = watch::channel(ConnectionStatus::Connecting);

        let stream = Self {
            inner: Arc::new(StreamInner {
                event_id,
                snapshot: snapshot_tx,
                status: status_tx,
                detached: AtomicBool::new(false),
                supervisor: Mutex::new(None),
                source,
                policy,
            }),
        };

        tracing::info!(event_id = %stream.inner.event_id, "Odds stream attached");
        stream.spawn_supervisor().await;
        stream
    }

    pub fn event_id(&self) -> &str {
        &self.inner.event_id
    }

    pub fn snapshot(&self) -> OddsSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.inner.snapshot.borrow().outcomes.clone()
    }

    pub fn outcome(&self, outcome_id: &str) -> Option<Outcome> {
        self.inner.snapshot.borrow().outcome(outcome_id).cloned()
    }

    /// Copy of the recent-update history, newest first.
    pub fn recent_updates(&self) -> Vec<OddsUpdate> {
        self.inner.snapshot.borrow().recent_updates.to_vec()
    }

    pub fn last_update_at(&self) -> Option<DateTime<Utc>> {
        self.inner.snapshot.borrow().last_update_at
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.borrow()
    }

    /// Receiver that is notified after every applied update.
    pub fn subscribe(&self) -> watch::Receiver<OddsSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn status_changes(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    pub fn is_detached(&self) -> bool {
        self.inner.detached.load(Ordering::Acquire)
    }

    /// Reconcile one update into the live set. Rejected updates are logged
    /// and leave every outcome untouched.
    pub fn apply_update(&self, update: &OddsUpdate) -> Result<Outcome, ReconcileError> {
        if self.is_detached() {
            counter!("odds_updates_dropped").increment(1);
            return Err(ReconcileError::Detached);
        }

        let mut result = Err(ReconcileError::Detached);
        self.inner.snapshot.send_if_modified(|snap| {
            match reconcile_in_place(&snap.event_id, &mut snap.outcomes, update) {
                Ok(outcome) => {
                    snap.recent_updates.push(OddsUpdate {
                        new_odds: outcome.odds,
                        previous_odds: outcome.previous_odds,
                        ..update.clone()
                    });
                    snap.last_update_at = Some(Utc::now());
                    result = Ok(outcome);
                    true
                }
                Err(e) => {
                    result = Err(e);
                    false
                }
            }
        });

        match &result {
            Ok(outcome) => {
                counter!("odds_updates_applied").increment(1);
                tracing::debug!(
                    event_id = %self.inner.event_id,
                    outcome_id = %outcome.id,
                    odds = %outcome.odds,
                    trend = %outcome.trend,
                    "Odds updated"
                );
            }
            Err(ReconcileError::UnknownOutcome(id)) => {
                counter!("odds_updates_dropped").increment(1);
                tracing::warn!(event_id = %self.inner.event_id, outcome_id = %id, "Update for unknown outcome ignored");
            }
            Err(e) => {
                counter!("odds_updates_dropped").increment(1);
                tracing::debug!(event_id = %self.inner.event_id, error = %e, "Odds update dropped");
            }
        }

        result
    }

    /// Restart the connection supervisor with a fresh attempt budget. Used
    /// after the stream has settled into `Error`.
    pub async fn reconnect(&self) {
        if self.is_detached() {
            tracing::warn!(event_id = %self.inner.event_id, "Reconnect requested on detached odds stream");
            return;
        }
        tracing::info!(event_id = %self.inner.event_id, "Manual odds stream reconnect");
        self.spawn_supervisor().await;
    }

    /// Stop all background activity. Later updates are discarded. Idempotent.
    pub async fn detach(&self) {
        if self.inner.detached.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.inner.supervisor.lock().await.take() {
            handle.abort();
        }
        self.set_status(ConnectionStatus::Disconnected);
        tracing::info!(event_id = %self.inner.event_id, "Odds stream detached");
    }

    async fn spawn_supervisor(&self) {
        let mut slot = self.inner.supervisor.lock().await;
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        self.set_status(ConnectionStatus::Connecting);
        let worker = self.clone();
        *slot = Some(tokio::spawn(worker.supervise()));
    }

    fn set_status(&self, status: ConnectionStatus) {
        let changed = self.inner.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
        if changed {
            gauge!("odds_stream_connected").set(if status == ConnectionStatus::Connected { 1.0 } else { 0.0 });
            tracing::debug!(event_id = %self.inner.event_id, status = %status, "Odds stream status changed");
        }
    }

    async fn supervise(self) {
        let event_id = self.inner.event_id.clone();
        let mut attempt: u32 = 0;

        loop {
            if self.is_detached() {
                return;
            }
            self.set_status(ConnectionStatus::Connecting);
            tracing::info!(event_id = %event_id, attempt, "Connecting odds feed...");

            match self.inner.source.connect(&event_id).await {
                Ok(mut feed) => {
                    tracing::info!(event_id = %event_id, "Odds feed connected");
                    self.set_status(ConnectionStatus::Connected);
                    attempt = 0;

                    while let Some(item) = feed.recv().await {
                        if self.is_detached() {
                            return;
                        }
                        match item {
                            FeedItem::Update(update) => {
                                // Outcome is logged inside apply_update.
                                let _ = self.apply_update(&update);
                            }
                            FeedItem::Malformed(raw) => {
                                counter!("odds_updates_dropped").increment(1);
                                tracing::debug!(event_id = %event_id, raw = %raw, "Malformed odds payload dropped");
                            }
                        }
                    }
                    tracing::warn!(event_id = %event_id, "Odds feed closed");
                }
                Err(e) => {
                    tracing::warn!(event_id = %event_id, error = %e, "Odds feed connection failed");
                }
            }

            if self.is_detached() {
                return;
            }
            self.set_status(ConnectionStatus::Disconnected);

            let Some(delay) = self.inner.policy.delay_for(attempt) else {
                tracing::error!(
                    event_id = %event_id,
                    attempts = attempt,
                    "Odds feed reconnection attempts exhausted"
                );
                self.set_status(ConnectionStatus::Error);
                return;
            };
            attempt = attempt.saturating_add(1);
            counter!("odds_reconnect_attempts").increment(1);
            tracing::info!(
                event_id = %event_id,
                delay_ms = delay.as_millis() as u64,
                attempt,
                "Reconnecting odds feed..."
            );
            sleep(delay).await;
        }
    }
}

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use betflow::api::{BetApi, OracleVerdict, PlaceBetRequest, SettlementOracle};
use betflow::errors::TransportError;
use betflow::models::{
    Bet, BetStatus, BettingEvent, EventStatus, OddsUpdate, Outcome, SettledOutcome, SettlementResult,
};
use betflow::odds::{ConnectionStatus, FeedItem, OddsFeed, OddsSource, OddsStream};
use betflow::wallet::WalletCapability;

/// Decimal from a string literal, e.g. `dec("1.85")`.
#[allow(dead_code)]
pub fn dec(s: &str) -> Decimal {
    s.parse().expect("valid decimal literal")
}

/// Event E1 with outcomes O1 @ 1.85 and O2 @ 3.20.
#[allow(dead_code)]
pub fn sample_event(status: EventStatus) -> BettingEvent {
    BettingEvent {
        id: "E1".into(),
        name: "Race 1".into(),
        description: None,
        category: Some("horse-racing".into()),
        start_time: None,
        status,
        outcomes: vec![
            Outcome::new("O1", "Thunderbolt", dec("1.85")),
            Outcome::new("O2", "Night Owl", dec("3.20")),
        ],
    }
}

// --- Bet API ---

/// In-memory Bet API. Placement answers with an `active` bet at the event's
/// current odds unless a failure or delay has been scripted.
#[derive(Default)]
#[allow(dead_code)]
pub struct FakeBetApi {
    events: Mutex<HashMap<String, BettingEvent>>,
    placed: Mutex<Vec<Bet>>,
    rejections: Mutex<VecDeque<String>>,
    place_delay: Mutex<Option<Duration>>,
    balances: Mutex<HashMap<String, Decimal>>,
    get_event_failures: AtomicUsize,
}

#[allow(dead_code)]
impl FakeBetApi {
    pub fn with_event(event: BettingEvent) -> Self {
        let api = Self::default();
        api.put_event(event);
        api
    }

    pub fn put_event(&self, event: BettingEvent) {
        self.events.lock().unwrap().insert(event.id.clone(), event);
    }

    pub fn set_odds(&self, event_id: &str, outcome_id: &str, odds: Decimal) {
        let mut events = self.events.lock().unwrap();
        if let Some(outcome) = events
            .get_mut(event_id)
            .and_then(|e| e.outcomes.iter_mut().find(|o| o.id == outcome_id))
        {
            outcome.odds = odds;
        }
    }

    /// The next placement fails with `message`.
    pub fn reject_next(&self, message: &str) {
        self.rejections.lock().unwrap().push_back(message.to_string());
    }

    pub fn set_place_delay(&self, delay: Option<Duration>) {
        *self.place_delay.lock().unwrap() = delay;
    }

    pub fn set_balance(&self, address: &str, balance: Decimal) {
        self.balances.lock().unwrap().insert(address.to_string(), balance);
    }

    /// The next `n` `get_event` calls fail.
    pub fn fail_get_event(&self, n: usize) {
        self.get_event_failures.store(n, Ordering::SeqCst);
    }

    pub fn placed(&self) -> Vec<Bet> {
        self.placed.lock().unwrap().clone()
    }
}

#[async_trait]
impl BetApi for FakeBetApi {
    async fn list_events(&self) -> Result<Vec<BettingEvent>, TransportError> {
        Ok(self.events.lock().unwrap().values().cloned().collect())
    }

    async fn get_event(&self, event_id: &str) -> Result<BettingEvent, TransportError> {
        let failing = self
            .get_event_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::Rejected("API error: 503".into()));
        }
        self.events
            .lock()
            .unwrap()
            .get(event_id)
            .cloned()
            .ok_or_else(|| TransportError::Rejected("Event not found".into()))
    }

    async fn list_bets(&self) -> Result<Vec<Bet>, TransportError> {
        Ok(self.placed())
    }

    async fn place_bet(&self, request: &PlaceBetRequest) -> Result<Bet, TransportError> {
        let delay = *self.place_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.rejections.lock().unwrap().pop_front() {
            return Err(TransportError::Rejected(message));
        }

        let odds = self
            .events
            .lock()
            .unwrap()
            .get(&request.event_id)
            .and_then(|e| e.outcome(&request.outcome_id))
            .map(|o| o.odds)
            .ok_or_else(|| TransportError::Rejected("Outcome not found".into()))?;

        let bet = Bet::new(&request.event_id, &request.outcome_id, request.amount, odds)
            .map_err(|e| TransportError::Rejected(e.to_string()))?
            .with_status(BetStatus::Active);
        self.placed.lock().unwrap().push(bet.clone());
        Ok(bet)
    }

    async fn settle_bet(&self, _bet_id: Uuid) -> Result<SettlementResult, TransportError> {
        Err(TransportError::Unexpected("settle_bet is not scripted".into()))
    }

    async fn wallet_balance(&self, address: &str) -> Result<Decimal, TransportError> {
        self.balances
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .ok_or_else(|| TransportError::Rejected("Unknown wallet".into()))
    }
}

// --- Settlement oracle ---

/// Answers every bet with a fixed verdict after scripted failures/delays.
#[allow(dead_code)]
pub struct FakeOracle {
    verdict: Mutex<OracleVerdict>,
    failures: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeOracle {
    pub fn new(outcome: SettledOutcome, proof: &str) -> Self {
        Self {
            verdict: Mutex::new(OracleVerdict {
                outcome,
                proof_reference: proof.to_string(),
            }),
            failures: AtomicUsize::new(0),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn won() -> Self {
        Self::new(SettledOutcome::Won, "0x9f2c4e")
    }

    pub fn set_verdict(&self, outcome: SettledOutcome, proof: &str) {
        *self.verdict.lock().unwrap() = OracleVerdict {
            outcome,
            proof_reference: proof.to_string(),
        };
    }

    /// The next `n` calls fail as unreachable.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettlementOracle for FakeOracle {
    async fn resolve(&self, _bet: &Bet) -> Result<OracleVerdict, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::Rejected("settlement source unreachable".into()));
        }
        Ok(self.verdict.lock().unwrap().clone())
    }
}

// --- Odds source ---

/// Odds source driven by the test. Each successful `connect` opens a fresh
/// channel; the test pushes items into the latest one.
///
/// `connect` yields once before answering, so anything watching the stream's
/// status gets to see each value before the next one replaces it.
#[derive(Default)]
#[allow(dead_code)]
pub struct ChannelOddsSource {
    sender: Mutex<Option<mpsc::Sender<FeedItem>>>,
    failures: AtomicUsize,
    always_fail: std::sync::atomic::AtomicBool,
    connects: AtomicUsize,
    observed: Mutex<Option<watch::Receiver<ConnectionStatus>>>,
    status_at_connect: Mutex<Vec<ConnectionStatus>>,
}

#[allow(dead_code)]
impl ChannelOddsSource {
    /// The next `n` connects fail.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn set_always_fail(&self, fail: bool) {
        self.always_fail.store(fail, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Record the stream status seen by every later `connect` call.
    pub fn observe(&self, status: watch::Receiver<ConnectionStatus>) {
        *self.observed.lock().unwrap() = Some(status);
    }

    pub fn status_at_connect(&self) -> Vec<ConnectionStatus> {
        self.status_at_connect.lock().unwrap().clone()
    }

    pub async fn push(&self, item: FeedItem) {
        let sender = self.sender.lock().unwrap().clone();
        if let Some(tx) = sender {
            let _ = tx.send(item).await;
        }
    }

    pub async fn push_update(&self, outcome_id: &str, odds: &str) {
        self.push(FeedItem::Update(OddsUpdate::new("E1", outcome_id, dec(odds)))).await;
    }

    /// Close the current feed as if the server went away.
    pub fn drop_connection(&self) {
        self.sender.lock().unwrap().take();
    }
}

#[async_trait]
impl OddsSource for ChannelOddsSource {
    async fn connect(&self, _event_id: &str) -> Result<OddsFeed, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let status = self.observed.lock().unwrap().as_ref().map(|rx| *rx.borrow());
        if let Some(status) = status {
            self.status_at_connect.lock().unwrap().push(status);
        }
        tokio::task::yield_now().await;

        let failing = self.always_fail.load(Ordering::SeqCst)
            || self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if failing {
            return Err(TransportError::WebSocket("connection refused".into()));
        }
        let (tx, rx) = mpsc::channel(64);
        *self.sender.lock().unwrap() = Some(tx);
        Ok(rx)
    }
}

/// Wait (bounded) until the stream reports `status`.
#[allow(dead_code)]
pub async fn wait_for_status(stream: &OddsStream, status: ConnectionStatus) {
    let mut rx = stream.status_changes();
    wait_until(&mut rx, |s| *s == status).await;
}

/// Wait (bounded) until the outcome has the given odds.
#[allow(dead_code)]
pub async fn wait_for_odds(stream: &OddsStream, outcome_id: &str, odds: Decimal) {
    let mut rx = stream.subscribe();
    wait_until(&mut rx, |snap| snap.outcome(outcome_id).map(|o| o.odds) == Some(odds)).await;
}

async fn wait_until<T>(rx: &mut watch::Receiver<T>, pred: impl FnMut(&T) -> bool) {
    tokio::time::timeout(Duration::from_secs(60), rx.wait_for(pred))
        .await
        .expect("timed out waiting for stream state")
        .expect("stream dropped");
}

// --- Wallet ---

#[allow(dead_code)]
pub struct FakeWallet {
    address: String,
    refuse: std::sync::atomic::AtomicBool,
}

#[allow(dead_code)]
impl FakeWallet {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            refuse: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn refuse_connection(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl WalletCapability for FakeWallet {
    async fn connect(&self) -> Result<String, TransportError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Wallet("User rejected the request".into()));
        }
        Ok(self.address.clone())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn sign_transaction(&self, tx: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut signed = b"signed:".to_vec();
        signed.extend_from_slice(tx);
        Ok(signed)
    }
}

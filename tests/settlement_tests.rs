mod common;

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use betflow::errors::{SettlementError, TransportError};
use betflow::flow::{BettingFlow, BettingLimits};
use betflow::models::{Bet, BetStatus, EventStatus, SettledOutcome};
use betflow::settlement::{BetLedger, SettlementResolver};

use common::{dec, sample_event, FakeBetApi, FakeOracle};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Place E1/O1 @ 1.85 for 10 through the flow and record it in a ledger.
async fn placed_bet(ledger: &BetLedger) -> Bet {
    let event = sample_event(EventStatus::Live);
    let api = FakeBetApi::with_event(event.clone());
    let mut flow = BettingFlow::new(BettingLimits::default(), Decimal::from(100));
    flow.select_event(&event).unwrap();
    flow.select_outcome(&event.outcomes[0]).unwrap();
    flow.set_amount(Decimal::from(10)).unwrap();
    let bet = flow.submit(&api, TIMEOUT).await.unwrap().remove(0);

    ledger.set_event_status("E1", EventStatus::Live).await.unwrap();
    ledger.record(bet.clone()).await.unwrap();
    bet
}

fn resolver(ledger: &BetLedger, oracle: Arc<FakeOracle>) -> SettlementResolver {
    SettlementResolver::new(ledger.clone(), oracle, TIMEOUT)
}

#[tokio::test]
async fn test_settle_won_bet_after_event_completes() {
    let ledger = BetLedger::new();
    let bet = placed_bet(&ledger).await;
    let oracle = Arc::new(FakeOracle::won());
    let resolver = resolver(&ledger, oracle.clone());

    ledger.set_event_status("E1", EventStatus::Completed).await.unwrap();
    let result = resolver.settle(bet.id).await.unwrap();

    assert_eq!(result.bet_id, bet.id);
    assert_eq!(result.status, SettledOutcome::Won);
    assert_eq!(result.payout, dec("18.5"));
    assert!(!result.proof_reference.is_empty());

    let stored = ledger.get(bet.id).await.unwrap();
    assert_eq!(stored.status, BetStatus::Won);
    assert_eq!(stored.settled_at, Some(result.settled_at));
    assert_eq!(stored.payout, Some(dec("18.5")));
    assert_eq!(oracle.calls(), 1);
}

#[tokio::test]
async fn test_settle_lost_bet_pays_nothing() {
    let ledger = BetLedger::new();
    let bet = placed_bet(&ledger).await;
    let oracle = Arc::new(FakeOracle::new(SettledOutcome::Lost, "0x51de"));
    let resolver = resolver(&ledger, oracle);

    ledger.set_event_status("E1", EventStatus::Completed).await.unwrap();
    let result = resolver.settle(bet.id).await.unwrap();

    assert_eq!(result.payout, Decimal::ZERO);
    let stored = ledger.get(bet.id).await.unwrap();
    assert_eq!(stored.status, BetStatus::Lost);
    assert_eq!(stored.payout, Some(Decimal::ZERO));
}

#[tokio::test]
async fn test_settle_while_event_live_is_rejected() {
    let ledger = BetLedger::new();
    let bet = placed_bet(&ledger).await;
    let oracle = Arc::new(FakeOracle::won());
    let resolver = resolver(&ledger, oracle.clone());

    let err = resolver.settle(bet.id).await.unwrap_err();
    assert!(matches!(err, SettlementError::InvalidState { .. }));
    assert!(!err.is_retryable());

    let stored = ledger.get(bet.id).await.unwrap();
    assert_eq!(stored.status, BetStatus::Active);
    assert!(stored.settled_at.is_none());
    assert!(stored.payout.is_none());
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn test_repeat_settle_replays_identical_result() {
    let ledger = BetLedger::new();
    let bet = placed_bet(&ledger).await;
    let oracle = Arc::new(FakeOracle::won());
    let resolver = resolver(&ledger, oracle.clone());
    ledger.set_event_status("E1", EventStatus::Completed).await.unwrap();

    let first = resolver.settle(bet.id).await.unwrap();
    let after_first = ledger.get(bet.id).await.unwrap();

    // a different verdict now must not matter
    oracle.set_verdict(SettledOutcome::Lost, "0xother");
    let second = resolver.settle(bet.id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(ledger.get(bet.id).await.unwrap(), after_first);
    assert_eq!(oracle.calls(), 1);
}

#[tokio::test]
async fn test_payout_uses_odds_frozen_at_placement() {
    let ledger = BetLedger::new();
    let bet = placed_bet(&ledger).await;
    let resolver = resolver(&ledger, Arc::new(FakeOracle::won()));
    ledger.set_event_status("E1", EventStatus::Completed).await.unwrap();

    // live odds for O1 have long since moved; the bet keeps 1.85
    let stored = ledger.get(bet.id).await.unwrap();
    assert_eq!(stored.odds, dec("1.85"));

    let result = resolver.settle(bet.id).await.unwrap();
    assert_eq!(result.payout, bet.amount * bet.odds);
}

#[tokio::test]
async fn test_oracle_failure_leaves_bet_active_and_retryable() {
    let ledger = BetLedger::new();
    let bet = placed_bet(&ledger).await;
    let oracle = Arc::new(FakeOracle::won());
    oracle.fail_next(1);
    let resolver = resolver(&ledger, oracle.clone());
    ledger.set_event_status("E1", EventStatus::Completed).await.unwrap();

    let err = resolver.settle(bet.id).await.unwrap_err();
    assert!(err.is_retryable());
    let stored = ledger.get(bet.id).await.unwrap();
    assert_eq!(stored.status, BetStatus::Active);
    assert!(stored.settled_at.is_none());
    assert!(ledger.result(bet.id).await.is_none());

    let result = resolver.settle(bet.id).await.unwrap();
    assert_eq!(result.status, SettledOutcome::Won);
    assert_eq!(oracle.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_oracle_timeout_leaves_bet_active() {
    let ledger = BetLedger::new();
    let bet = placed_bet(&ledger).await;
    let oracle = Arc::new(FakeOracle::won());
    oracle.set_delay(Some(Duration::from_secs(60)));
    let resolver = resolver(&ledger, oracle.clone());
    ledger.set_event_status("E1", EventStatus::Completed).await.unwrap();

    let err = resolver.settle(bet.id).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::Transport(TransportError::Timeout(_))
    ));
    assert_eq!(ledger.get(bet.id).await.unwrap().status, BetStatus::Active);

    oracle.set_delay(None);
    assert!(resolver.settle(bet.id).await.is_ok());
}

#[tokio::test]
async fn test_unpayable_win_leaves_bet_active() {
    let ledger = BetLedger::new();
    ledger.set_event_status("E1", EventStatus::Live).await.unwrap();
    let mut bet = Bet::new("E1", "O1", Decimal::from(10), Decimal::TWO)
        .unwrap()
        .with_status(BetStatus::Active);
    bet.odds = Decimal::MAX;
    ledger.record(bet.clone()).await.unwrap();
    let resolver = resolver(&ledger, Arc::new(FakeOracle::won()));
    ledger.set_event_status("E1", EventStatus::Completed).await.unwrap();

    let err = resolver.settle(bet.id).await.unwrap_err();
    assert!(matches!(err, SettlementError::InvalidState { .. }));
    assert!(!err.is_retryable());

    let stored = ledger.get(bet.id).await.unwrap();
    assert_eq!(stored.status, BetStatus::Active);
    assert!(stored.payout.is_none());
    assert!(ledger.result(bet.id).await.is_none());
}

#[tokio::test]
async fn test_missing_proof_is_not_accepted() {
    let ledger = BetLedger::new();
    let bet = placed_bet(&ledger).await;
    let oracle = Arc::new(FakeOracle::new(SettledOutcome::Won, "  "));
    let resolver = resolver(&ledger, oracle);
    ledger.set_event_status("E1", EventStatus::Completed).await.unwrap();

    assert!(matches!(
        resolver.settle(bet.id).await,
        Err(SettlementError::Transport(TransportError::Unexpected(_)))
    ));
    assert_eq!(ledger.get(bet.id).await.unwrap().status, BetStatus::Active);
}

#[tokio::test]
async fn test_unknown_and_unconfirmed_bets() {
    let ledger = BetLedger::new();
    let resolver = resolver(&ledger, Arc::new(FakeOracle::won()));
    ledger.set_event_status("E1", EventStatus::Completed).await.unwrap();

    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        resolver.settle(missing).await,
        Err(SettlementError::NotFound(id)) if id == missing
    ));

    let pending = Bet::new("E1", "O1", Decimal::from(10), dec("1.85")).unwrap();
    ledger.record(pending.clone()).await.unwrap();
    assert!(matches!(
        resolver.settle(pending.id).await,
        Err(SettlementError::InvalidState { .. })
    ));
    assert_eq!(ledger.get(pending.id).await.unwrap().status, BetStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_settle_of_same_bet() {
    let ledger = BetLedger::new();
    let bet = placed_bet(&ledger).await;
    let oracle = Arc::new(FakeOracle::won());
    oracle.set_delay(Some(Duration::from_secs(1)));
    let resolver = resolver(&ledger, oracle.clone());
    ledger.set_event_status("E1", EventStatus::Completed).await.unwrap();

    let (first, second) = tokio::join!(resolver.settle(bet.id), resolver.settle(bet.id));

    assert!(first.is_ok());
    assert!(matches!(second, Err(SettlementError::InvalidState { .. })));
    assert_eq!(oracle.calls(), 1);

    // once resolved, further calls replay
    assert_eq!(resolver.settle(bet.id).await.unwrap(), first.unwrap());
}

#[tokio::test]
async fn test_cancelled_event_refunds_and_blocks_settlement() {
    let ledger = BetLedger::new();
    let bet = placed_bet(&ledger).await;
    let resolver = resolver(&ledger, Arc::new(FakeOracle::won()));

    let refunds = resolver.cancel_event("E1").await.unwrap();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].bet_id, bet.id);
    assert_eq!(refunds[0].amount, Decimal::from(10));

    let stored = ledger.get(bet.id).await.unwrap();
    assert_eq!(stored.status, BetStatus::Cancelled);
    assert!(stored.settled_at.is_none());
    assert!(stored.payout.is_none());

    assert!(matches!(
        ledger.set_event_status("E1", EventStatus::Completed).await,
        Err(SettlementError::InvalidEventTransition { .. })
    ));
    assert!(matches!(
        resolver.settle(bet.id).await,
        Err(SettlementError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn test_settle_event_resolves_every_active_bet() {
    let ledger = BetLedger::new();
    let first = placed_bet(&ledger).await;
    let second = Bet::new("E1", "O2", Decimal::from(4), dec("3.20")).unwrap().with_status(BetStatus::Active);
    ledger.record(second.clone()).await.unwrap();
    let resolver = resolver(&ledger, Arc::new(FakeOracle::won()));
    ledger.set_event_status("E1", EventStatus::Completed).await.unwrap();

    let outcomes = resolver.settle_event("E1").await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|(_, r)| r.is_ok()));

    assert_eq!(ledger.get(first.id).await.unwrap().status, BetStatus::Won);
    assert_eq!(ledger.get(second.id).await.unwrap().payout, Some(dec("12.80")));

    assert_eq!(ledger.archive_settled().await, 2);
    assert!(ledger.live_bets().await.is_empty());
    assert_eq!(ledger.history().await.len(), 2);
}

#[tokio::test]
async fn test_flow_records_settlement_in_local_view() {
    let ledger = BetLedger::new();
    let event = sample_event(EventStatus::Live);
    let api = FakeBetApi::with_event(event.clone());
    let mut flow = BettingFlow::new(BettingLimits::default(), Decimal::from(100));
    flow.select_event(&event).unwrap();
    flow.select_outcome(&event.outcomes[0]).unwrap();
    flow.set_amount(Decimal::from(10)).unwrap();
    let bet = flow.submit(&api, TIMEOUT).await.unwrap().remove(0);
    ledger.record(bet.clone()).await.unwrap();
    ledger.set_event_status("E1", EventStatus::Completed).await.unwrap();

    let result = resolver(&ledger, Arc::new(FakeOracle::won()))
        .settle(bet.id)
        .await
        .unwrap();
    assert!(flow.record_settlement(&result));

    assert_eq!(flow.settlement(bet.id), Some(&result));
    assert_eq!(flow.user_balance(), dec("108.5"));
    // the flow's copy of the bet is never rewritten
    assert_eq!(flow.placed_bets()[0].status, BetStatus::Active);
}

//! End-to-end lifecycle flows through the public API: signal in,
//! order out, fills, supervision, forced close, daily ledger.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

use zero_dte_core::options::{OptionContract, OptionRight, OptionsChain};
use zero_dte_core::session::{SessionClock, SessionPolicy};
use zero_dte_core::signal::{AlertSignal, SignalAction, SignalType};
use zero_dte_exec::{
    DailyRiskLedger, EngineAlert, ExecutionGateway, ExecutionMode, ManagerSettings, MarketData,
    OrderManager, OrderState, PaperGateway, PaperMarketData, PositionState, PositionTracker,
    ProcessOutcome, SignalProcessor, TrackerSettings,
};
use zero_dte_suggest::risk::RiskParams;
use zero_dte_suggest::suggester::{SuggesterConfig, TradeSuggester};

const PASSPHRASE: &str = "integration-phrase";

fn clock_at(hour_utc: u32, minute: u32) -> SessionClock {
    let at = Utc
        .with_ymd_and_hms(2026, 8, 28, hour_utc, minute, 0)
        .unwrap();
    SessionClock::new(
        SessionPolicy::default(),
        chrono::FixedOffset::west_opt(5 * 3600).unwrap(),
    )
    .frozen_at(at)
}

/// 10:15 local, prime time.
fn prime_time() -> SessionClock {
    clock_at(15, 15)
}

/// 15:45 local, danger zone.
fn danger_zone() -> SessionClock {
    clock_at(20, 45)
}

fn call_contract(code: &str, strike: rust_decimal::Decimal) -> OptionContract {
    OptionContract {
        code: code.to_string(),
        underlying: "SPX".to_string(),
        strike,
        right: OptionRight::Call,
        expiry: NaiveDate::from_ymd_opt(2026, 8, 28).unwrap(),
        bid: Some(dec!(2.40)),
        ask: Some(dec!(2.60)),
        last: None,
        delta: Some(0.50),
        volume: Some(1200),
        open_interest: Some(5000),
    }
}

fn chain() -> OptionsChain {
    OptionsChain {
        underlying: "SPX".to_string(),
        underlying_price: dec!(5910),
        expiry: NaiveDate::from_ymd_opt(2026, 8, 28).unwrap(),
        contracts: vec![call_contract("SPXW260828C05910000", dec!(5910))],
        fetched_at: Utc::now(),
    }
}

fn signal() -> AlertSignal {
    AlertSignal {
        passphrase: PASSPHRASE.to_string(),
        signal_type: SignalType::VDipLong,
        action: SignalAction::Buy,
        price: dec!(5905),
        ticker: "SPX".to_string(),
        time: Utc::now(),
        rsi: Some(23.5),
        pivot_level: None,
        vwap_distance: None,
    }
}

struct Engine {
    gateway: Arc<PaperGateway>,
    market: Arc<PaperMarketData>,
    ledger: Arc<Mutex<DailyRiskLedger>>,
    manager: Arc<OrderManager>,
    processor: SignalProcessor,
    tracker: PositionTracker,
    alerts: mpsc::Receiver<EngineAlert>,
}

/// Wire up a paper engine. The manager judges entries against
/// `manager_clock` while the tracker supervises against
/// `tracker_clock`, which lets a test open positions in prime time and
/// then run supervision as if the clock had reached the danger zone.
fn engine(manager_clock: SessionClock, tracker_clock: SessionClock) -> Engine {
    let gateway = Arc::new(PaperGateway::new());
    let market = Arc::new(PaperMarketData::new());
    let ledger = Arc::new(Mutex::new(DailyRiskLedger::new(
        NaiveDate::from_ymd_opt(2026, 8, 28).unwrap(),
        dec!(1500),
    )));
    let manager = Arc::new(OrderManager::new(
        ManagerSettings {
            max_positions: 2,
            auto_execute: false,
            submit_timeout: Duration::from_secs(2),
            submit_max_retries: 1,
            mode: ExecutionMode::Paper,
        },
        manager_clock.clone(),
        Arc::clone(&gateway) as Arc<dyn ExecutionGateway>,
        Arc::clone(&ledger),
    ));
    let suggester = TradeSuggester::new(
        SuggesterConfig {
            target_delta: 0.50,
            credit_target_delta: 0.225,
            delta_tolerance: 0.10,
            max_snapshot_age: chrono::Duration::seconds(60),
        },
        RiskParams {
            account_size: dec!(25000),
            max_risk_per_trade: 0.02,
            profit_capture: 0.55,
            stop_multiple: 2.25,
        },
    );
    let processor = SignalProcessor::new(
        PASSPHRASE.to_string(),
        manager_clock,
        suggester,
        Arc::clone(&market) as Arc<dyn MarketData>,
        Arc::clone(&manager),
        Duration::from_secs(2),
    );
    let (tx, rx) = mpsc::channel(8);
    let tracker = PositionTracker::new(
        Arc::clone(&manager),
        Arc::clone(&gateway) as Arc<dyn ExecutionGateway>,
        Arc::clone(&market) as Arc<dyn MarketData>,
        Arc::clone(&ledger),
        tracker_clock,
        TrackerSettings {
            tick: Duration::from_secs(30),
            price_timeout: Duration::from_secs(2),
            close_retry: Duration::from_millis(10),
            close_retry_max: 2,
            auto_exit_enabled: true,
        },
        tx,
    );
    Engine {
        gateway,
        market,
        ledger,
        manager,
        processor,
        tracker,
        alerts: rx,
    }
}

#[tokio::test]
async fn signal_to_closed_position_round_trip() {
    let mut e = engine(prime_time(), prime_time());
    e.market.set_quote("SPX", dec!(5910));
    e.market.set_chain(chain());

    let order = match e.processor.handle(signal()).await.unwrap() {
        ProcessOutcome::OrderCreated(order) => *order,
        other => panic!("expected an order, got {other:?}"),
    };
    assert_eq!(order.state, OrderState::PendingApproval);
    // mid of 2.40/2.60; 25000 * 2% / (2.50 * 100) = 2 contracts
    assert_eq!(order.quantity, 2);
    assert_eq!(order.limit_price, dec!(2.50));

    let order = e.manager.approve(order.id).await.unwrap();
    assert_eq!(order.state, OrderState::Submitted);

    // The paper gateway fills limit orders at the limit; the next tick
    // picks the fill up and opens the position.
    e.tracker.tick().await;
    let positions = e.manager.open_positions();
    assert_eq!(positions.len(), 1);
    let position = &positions[0];
    assert_eq!(position.entry_price, dec!(2.50));

    // Price moves to target; operator closes manually.
    e.market.set_option_quote(&position.code, dec!(3.65));
    e.gateway.set_price(&position.code, dec!(3.65));
    e.tracker.tick().await;
    let marked = e.manager.get_position(position.id).unwrap();
    assert_eq!(marked.mark_price, dec!(3.65));

    e.manager
        .request_close(position.id, zero_dte_exec::CloseReason::Manual)
        .await
        .unwrap();
    e.tracker.tick().await;

    let closed = e.manager.get_position(position.id).unwrap();
    assert_eq!(closed.state, PositionState::Closed);
    // (3.65 - 2.50) * 2 * 100
    assert_eq!(closed.realized_pnl(), Some(dec!(230)));
    assert_eq!(e.ledger.lock().unwrap().realized_pnl(), dec!(230));
    assert_eq!(e.manager.open_exposure(), 0);
}

#[tokio::test]
async fn danger_zone_tick_force_closes_and_records_the_loss() {
    let mut e = engine(prime_time(), danger_zone());
    e.market.set_quote("SPX", dec!(5910));
    e.market.set_chain(chain());

    let order = match e.processor.handle(signal()).await.unwrap() {
        ProcessOutcome::OrderCreated(order) => *order,
        other => panic!("expected an order, got {other:?}"),
    };
    e.manager.approve(order.id).await.unwrap();
    e.manager.on_gateway_fill(order.id, dec!(2.50)).unwrap();

    let position = e.manager.open_positions().remove(0);
    e.gateway.set_price(&position.code, dec!(2.05));

    // First tick issues the forced close; second confirms the fill.
    e.tracker.tick().await;
    assert_eq!(
        e.manager.get_position(position.id).unwrap().state,
        PositionState::Closing
    );
    e.tracker.tick().await;

    let closed = e.manager.get_position(position.id).unwrap();
    assert_eq!(closed.state, PositionState::Closed);
    assert_eq!(
        closed.close_reason,
        Some(zero_dte_exec::CloseReason::DangerZone)
    );
    // (2.05 - 2.50) * 2 * 100
    assert_eq!(e.ledger.lock().unwrap().realized_pnl(), dec!(-90));
}

#[tokio::test]
async fn unsubmittable_forced_close_raises_an_alert() {
    let mut e = engine(prime_time(), danger_zone());
    e.market.set_quote("SPX", dec!(5910));
    e.market.set_chain(chain());

    let order = match e.processor.handle(signal()).await.unwrap() {
        ProcessOutcome::OrderCreated(order) => *order,
        other => panic!("expected an order, got {other:?}"),
    };
    e.manager.approve(order.id).await.unwrap();
    let position = e
        .manager
        .on_gateway_fill(order.id, dec!(2.50))
        .unwrap()
        .unwrap();

    e.gateway.inject_submit_failures(u32::MAX);
    e.tracker.tick().await;

    match e.alerts.try_recv().unwrap() {
        EngineAlert::ForcedCloseFailed {
            position_id,
            attempts,
        } => {
            assert_eq!(position_id, position.id);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected a forced-close alert, got {other:?}"),
    }
    // The position is still open and later ticks do not re-escalate.
    assert_eq!(
        e.manager.get_position(position.id).unwrap().state,
        PositionState::Open
    );
    e.tracker.tick().await;
    assert!(e.alerts.try_recv().is_err());
}

#[tokio::test]
async fn daily_halt_blocks_new_signals_until_rollover() {
    let mut e = engine(prime_time(), prime_time());
    e.market.set_quote("SPX", dec!(5910));
    e.market.set_chain(chain());

    let order = match e.processor.handle(signal()).await.unwrap() {
        ProcessOutcome::OrderCreated(order) => *order,
        other => panic!("expected an order, got {other:?}"),
    };
    e.manager.approve(order.id).await.unwrap();
    // Fill far above the later exit so the close busts the loss limit.
    e.manager.on_gateway_fill(order.id, dec!(10.00)).unwrap();
    let position = e.manager.open_positions().remove(0);

    e.gateway.set_price(&position.code, dec!(2.00));
    e.manager
        .request_close(position.id, zero_dte_exec::CloseReason::Manual)
        .await
        .unwrap();
    e.tracker.tick().await;

    // (2.00 - 10.00) * 2 * 100 = -1600, past the 1500 limit.
    assert!(matches!(
        e.alerts.try_recv().unwrap(),
        EngineAlert::DailyHalt { .. }
    ));
    let err = e.processor.handle(signal()).await.unwrap_err();
    assert!(matches!(
        err,
        zero_dte_core::error::EngineError::RiskHalted { .. }
    ));
}

#[tokio::test]
async fn second_signal_for_the_same_contract_is_a_duplicate() {
    let e = engine(prime_time(), prime_time());
    e.market.set_quote("SPX", dec!(5910));
    e.market.set_chain(chain());

    match e.processor.handle(signal()).await.unwrap() {
        ProcessOutcome::OrderCreated(_) => {}
        other => panic!("expected an order, got {other:?}"),
    }
    let err = e.processor.handle(signal()).await.unwrap_err();
    assert!(matches!(
        err,
        zero_dte_core::error::EngineError::DuplicateProposal { .. }
    ));
}

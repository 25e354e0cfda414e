//! End-to-end tests of the orchestrator against in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;
use rust_decimal::Decimal;
use tokio::sync::broadcast;

use spreadwatch_analytics::GSpreadMath;
use spreadwatch_core::Date;
use spreadwatch_engine::events::{FeedMessage, GroupMessage, SpreadOutcome, SpreadResult};
use spreadwatch_engine::{
    EngineError, FixedClock, GroupState, InstrumentStatus, Orchestrator, OrchestratorBuilder,
    OrchestratorState,
};
use spreadwatch_ext_file::{
    FailingReference, MemoryGroupFeed, MemoryPriceFeed, MemoryReference, MemorySearch,
};
use spreadwatch_traits::bond_math::{BondMath, SpreadFailure};
use spreadwatch_traits::group_feed::Snapshot;
use spreadwatch_traits::price_feed::PriceTick;
use spreadwatch_traits::reference_data::ReferenceRecord;
use spreadwatch_traits::search::SearchCriteria;
use spreadwatch_traits::term_structure::TermStructure;
use spreadwatch_traits::{GroupId, InstrumentKey, TraitError};

const IDLE: Duration = Duration::from_millis(100);

const USD_CURVE: &[(&str, &str)] = &[("1Y", "4.0"), ("5Y", "4.0"), ("10Y", "4.0")];

fn today() -> Date {
    Date::from_ymd(2025, 6, 13).unwrap()
}

fn bond(key: &str, coupon: &str, maturity: &str, currency: &str) -> ReferenceRecord {
    ReferenceRecord::new(key, coupon, maturity, currency, "")
}

fn key(k: &str) -> InstrumentKey {
    InstrumentKey::new(k)
}

fn usd() -> GroupId {
    GroupId::new("USD")
}

struct Harness {
    orchestrator: Orchestrator,
    curves: Arc<MemoryGroupFeed>,
    prices: Arc<MemoryPriceFeed>,
    results: broadcast::Receiver<SpreadResult>,
}

impl Harness {
    fn new(records: Vec<ReferenceRecord>, curves: MemoryGroupFeed) -> Self {
        Self::with_math(records, curves, Arc::new(GSpreadMath::default()))
    }

    fn with_math(
        records: Vec<ReferenceRecord>,
        curves: MemoryGroupFeed,
        math: Arc<dyn BondMath>,
    ) -> Self {
        let reference = Arc::new(MemoryReference::new(records));
        let search = Arc::new(MemorySearch::new(reference.keys()));
        let curves = Arc::new(curves);
        let prices = Arc::new(MemoryPriceFeed::new());

        let orchestrator = OrchestratorBuilder::new()
            .with_search(search)
            .with_reference_data(reference)
            .with_group_feed(curves.clone())
            .with_price_feed(prices.clone())
            .with_bond_math(math)
            .with_clock(Arc::new(FixedClock::new(today())))
            .build()
            .unwrap();
        let results = orchestrator.subscribe_results();

        Self {
            orchestrator,
            curves,
            prices,
            results,
        }
    }

    async fn start(&mut self) {
        self.orchestrator.start(&SearchCriteria::all()).await.unwrap();
        self.settle().await;
    }

    async fn settle(&mut self) {
        self.orchestrator.run_until_idle(IDLE).await;
    }

    fn drain(&mut self) -> Vec<SpreadResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.results.try_recv() {
            results.push(result);
        }
        results
    }

    fn state_of(&self, group_id: &GroupId) -> Option<GroupState> {
        self.orchestrator
            .group_states()
            .into_iter()
            .find(|(id, _)| id == group_id)
            .map(|(_, state)| state)
    }
}

fn usd_feed(constituents: &[&str]) -> MemoryGroupFeed {
    let feed = MemoryGroupFeed::new();
    feed.add_group("USD", constituents.iter().copied());
    feed
}

// =============================================================================
// STARTUP
// =============================================================================

#[tokio::test]
async fn test_unusable_coupon_is_never_subscribed() {
    let mut h = Harness::new(
        vec![
            bond("K1", "5.0", "2030-06-15", "USD"),
            bond("K2", "NULL", "2030-06-15", "USD"),
        ],
        usd_feed(&["1Y"]),
    );

    let summary = h.orchestrator.start(&SearchCriteria::all()).await.unwrap();

    assert_eq!(summary.keys_found, 2);
    assert_eq!(summary.upsert.inserted, 1);
    assert_eq!(summary.upsert.dropped, 1);
    assert_eq!(summary.groups, vec![usd()]);
    assert!(h.orchestrator.instrument(&key("K1")).is_some());
    assert!(h.orchestrator.instrument(&key("K2")).is_none());
    assert_eq!(h.prices.subscribed_keys(), vec![key("K1")]);
}

#[tokio::test]
async fn test_one_subscription_per_group() {
    let curves = usd_feed(&["1Y"]);
    curves.add_group("EUR", ["1Y"]);
    let mut h = Harness::new(
        vec![
            bond("K1", "5.0", "2030-06-15", "USD"),
            bond("K2", "4.0", "2031-06-15", "usd"),
            bond("K3", "3.0", "2032-06-15", "USD "),
            bond("K4", "2.0", "2030-06-15", "EUR"),
        ],
        curves,
    );
    h.start().await;

    assert_eq!(h.curves.enumerate_calls("USD"), 1);
    assert_eq!(h.curves.subscribe_calls("USD"), 1);
    assert_eq!(h.curves.enumerate_calls("EUR"), 1);
    assert_eq!(h.orchestrator.diagnostics().hub.groups_created, 2);
    assert_eq!(h.orchestrator.diagnostics().live_groups, 2);
}

#[tokio::test]
async fn test_reference_failure_aborts_startup() {
    let curves = Arc::new(usd_feed(&["1Y"]));
    let mut orchestrator = OrchestratorBuilder::new()
        .with_search(Arc::new(MemorySearch::new(["K1"])))
        .with_reference_data(Arc::new(FailingReference::new(TraitError::Timeout)))
        .with_group_feed(curves.clone())
        .with_price_feed(Arc::new(MemoryPriceFeed::new()))
        .with_bond_math(Arc::new(GSpreadMath::default()))
        .build()
        .unwrap();

    let result = orchestrator.start(&SearchCriteria::all()).await;

    assert!(matches!(result, Err(EngineError::ReferenceFailed(_))));
    assert_eq!(orchestrator.state(), OrchestratorState::Idle);
    assert_eq!(curves.enumerate_calls("USD"), 0);
}

#[tokio::test]
async fn test_price_subscribe_failure_releases_groups() {
    let mut h = Harness::new(vec![bond("K1", "5.0", "2030-06-15", "USD")], usd_feed(&["1Y"]));
    h.prices
        .fail_subscribe(TraitError::SubscriptionFailed("entitlement".into()));

    let result = h.orchestrator.start(&SearchCriteria::all()).await;

    assert!(matches!(result, Err(EngineError::SubscriptionFailed(_))));
    assert_eq!(h.orchestrator.state(), OrchestratorState::Stopped);
    assert_eq!(h.curves.unsubscribe_calls("USD"), 1);
    assert_eq!(h.orchestrator.diagnostics().live_groups, 0);
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let mut h = Harness::new(vec![bond("K1", "5.0", "2030-06-15", "USD")], usd_feed(&["1Y"]));
    h.start().await;

    let again = h.orchestrator.start(&SearchCriteria::all()).await;
    assert!(matches!(again, Err(EngineError::AlreadyStarted)));
}

#[tokio::test]
async fn test_empty_universe_starts_cleanly() {
    let mut h = Harness::new(Vec::new(), MemoryGroupFeed::new());
    let summary = h.orchestrator.start(&SearchCriteria::all()).await.unwrap();

    assert_eq!(summary.keys_found, 0);
    assert!(summary.groups.is_empty());
    assert_eq!(h.orchestrator.state(), OrchestratorState::Running);
    assert!(h.prices.subscribed_keys().is_empty());
}

// =============================================================================
// TERM STRUCTURES
// =============================================================================

#[tokio::test]
async fn test_invalid_row_is_dropped_from_snapshot() {
    let curves = usd_feed(&["1Y", "bad"]);
    curves.publish_pairs("USD", &[("1Y", "1.5"), ("bad", "2.0")]);
    let mut h = Harness::new(vec![bond("K1", "5.0", "2030-06-15", "USD")], curves);
    h.start().await;

    let ts = h.orchestrator.term_structure(&usd()).unwrap();
    assert_eq!(ts.len(), 1);
    assert_eq!(ts.points()[0].rate, Decimal::new(15, 1));
    assert_eq!(h.state_of(&usd()), Some(GroupState::Ready));
    assert_eq!(h.orchestrator.diagnostics().hub.rows_dropped, 1);
}

#[tokio::test]
async fn test_snapshots_replace_without_merging() {
    let curves = usd_feed(&["1Y", "2Y", "5Y", "10Y"]);
    let mut h = Harness::new(vec![bond("K1", "5.0", "2030-06-15", "USD")], curves);
    h.start().await;

    h.curves
        .publish_pairs("USD", &[("1Y", "4.0"), ("5Y", "4.1"), ("10Y", "4.2")]);
    h.settle().await;
    assert_eq!(h.orchestrator.term_structure(&usd()).unwrap().len(), 3);

    h.curves.publish_pairs("USD", &[("2Y", "3.9")]);
    h.settle().await;
    let ts = h.orchestrator.term_structure(&usd()).unwrap();
    assert_eq!(ts.len(), 1);
    assert_eq!(ts.points()[0].rate, Decimal::new(39, 1));
}

#[tokio::test]
async fn test_all_invalid_snapshot_keeps_previous_curve() {
    let mut h = Harness::new(vec![bond("K1", "5.0", "2030-06-15", "USD")], usd_feed(&["1Y"]));
    h.start().await;

    h.curves.publish_pairs("USD", USD_CURVE);
    h.settle().await;
    h.curves.publish_pairs("USD", &[("1Y", "NaN"), ("??", "4.0")]);
    h.settle().await;

    assert_eq!(h.orchestrator.term_structure(&usd()).unwrap().len(), 3);
    assert_eq!(h.orchestrator.diagnostics().hub.snapshots_discarded, 1);
}

// =============================================================================
// READINESS AND RECOMPUTE
// =============================================================================

#[tokio::test]
async fn test_price_before_ready_defers_recompute() {
    let mut h = Harness::new(vec![bond("K1", "5.0", "2030-06-15", "USD")], usd_feed(&["1Y", "5Y", "10Y"]));
    h.start().await;

    h.prices.publish("K1", "100");
    h.settle().await;

    let k1 = h.orchestrator.instrument(&key("K1")).unwrap();
    assert_eq!(k1.price, Some(Decimal::new(100, 0)));
    assert_eq!(k1.settlement, None);
    assert_eq!(k1.analytic, None);
    assert_eq!(k1.status, InstrumentStatus::Pending);
    assert!(h.drain().is_empty());

    h.curves.publish_pairs("USD", USD_CURVE);
    h.settle().await;

    let results = h.drain();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].key, key("K1"));
    let bps = results[0].outcome.value().unwrap();
    assert_relative_eq!(bps, 100.0, epsilon = 10.0);

    let k1 = h.orchestrator.instrument(&key("K1")).unwrap();
    assert_eq!(k1.settlement, Some(Date::from_ymd(2025, 6, 17).unwrap()));
    assert_eq!(k1.status, InstrumentStatus::Ok);
    assert_eq!(h.orchestrator.diagnostics().recomputes, 1);
}

#[tokio::test]
async fn test_price_after_ready_recomputes_immediately() {
    let curves = usd_feed(&["1Y", "5Y", "10Y"]);
    curves.publish_pairs("USD", USD_CURVE);
    let mut h = Harness::new(vec![bond("K1", "5.0", "2030-06-15", "USD")], curves);
    h.start().await;
    assert!(h.drain().is_empty());

    h.prices.publish("K1", "101.5");
    h.settle().await;
    h.prices.publish("K1", "98.0");
    h.settle().await;

    let results = h.drain();
    assert_eq!(results.len(), 2);
    let rich = results[0].outcome.value().unwrap();
    let cheap = results[1].outcome.value().unwrap();
    assert!(cheap > rich);
}

#[tokio::test]
async fn test_curve_update_recomputes_only_priced_members() {
    let mut h = Harness::new(
        vec![
            bond("K1", "5.0", "2030-06-15", "USD"),
            bond("K2", "4.0", "2031-06-15", "USD"),
        ],
        usd_feed(&["1Y", "5Y", "10Y"]),
    );
    h.start().await;

    h.prices.publish("K1", "100");
    h.curves.publish_pairs("USD", USD_CURVE);
    h.settle().await;

    let results = h.drain();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].key, key("K1"));
    assert_eq!(
        h.orchestrator.instrument(&key("K2")).unwrap().status,
        InstrumentStatus::Pending
    );
}

/// Fails every spread for one price, otherwise defers to g-spread math.
struct PickyMath {
    inner: GSpreadMath,
    bad_price: Decimal,
}

impl BondMath for PickyMath {
    fn settlement_date(&self, today: Date, structure_code: Option<&str>, maturity: Date) -> Date {
        self.inner.settlement_date(today, structure_code, maturity)
    }

    fn spread(
        &self,
        settlement: Date,
        term_structure: &TermStructure,
        price: Decimal,
        maturity: Date,
        coupon: Decimal,
        structure_code: Option<&str>,
    ) -> Result<f64, SpreadFailure> {
        if price == self.bad_price {
            return Err(SpreadFailure::new("solver diverged"));
        }
        self.inner
            .spread(settlement, term_structure, price, maturity, coupon, structure_code)
    }
}

#[tokio::test]
async fn test_failure_is_isolated_and_keeps_last_value() {
    let curves = usd_feed(&["1Y", "5Y", "10Y"]);
    curves.publish_pairs("USD", USD_CURVE);
    let math = Arc::new(PickyMath {
        inner: GSpreadMath::default(),
        bad_price: Decimal::new(999, 0),
    });
    let mut h = Harness::with_math(
        vec![
            bond("K1", "5.0", "2030-06-15", "USD"),
            bond("K2", "4.0", "NULL", "USD"),
            bond("K3", "4.0", "2031-06-15", "USD"),
        ],
        curves,
        math,
    );
    h.start().await;

    h.prices.publish("K1", "100");
    h.prices.publish("K2", "100");
    h.prices.publish("K3", "100");
    h.settle().await;

    let k2 = h.orchestrator.instrument(&key("K2")).unwrap();
    assert!(matches!(k2.status, InstrumentStatus::Failed(_)));
    assert_eq!(k2.analytic, None);
    let k3_value = h.orchestrator.instrument(&key("K3")).unwrap().analytic;
    assert!(k3_value.is_some());

    let first = h.orchestrator.instrument(&key("K1")).unwrap().analytic;
    h.prices.publish("K1", "999");
    h.settle().await;

    let k1 = h.orchestrator.instrument(&key("K1")).unwrap();
    assert_eq!(k1.status, InstrumentStatus::Failed("solver diverged".into()));
    assert_eq!(k1.analytic, first);
    assert_eq!(h.orchestrator.instrument(&key("K3")).unwrap().analytic, k3_value);

    let failures: Vec<_> = h
        .drain()
        .into_iter()
        .filter(|r| matches!(r.outcome, SpreadOutcome::Failed(_)))
        .map(|r| r.key)
        .collect();
    assert_eq!(failures, vec![key("K2"), key("K1")]);
    assert_eq!(h.orchestrator.diagnostics().recompute_failures, 2);
}

// =============================================================================
// GROUP FAILURE
// =============================================================================

#[tokio::test]
async fn test_empty_group_fails_and_stays_pending() {
    let curves = usd_feed(&["1Y", "5Y", "10Y"]);
    curves.publish_pairs("USD", USD_CURVE);
    curves.add_group("EUR", Vec::<&str>::new());
    let mut h = Harness::new(
        vec![
            bond("K1", "5.0", "2030-06-15", "USD"),
            bond("K4", "2.0", "2030-06-15", "EUR"),
        ],
        curves,
    );
    h.start().await;

    h.prices.publish("K1", "100");
    h.prices.publish("K4", "100");
    h.settle().await;

    let eur = GroupId::new("EUR");
    assert_eq!(h.state_of(&eur), Some(GroupState::Failed));
    assert_eq!(h.state_of(&usd()), Some(GroupState::Ready));
    assert!(h.orchestrator.term_structure(&eur).is_none());
    assert_eq!(h.curves.subscribe_calls("EUR"), 0);
    assert_eq!(h.curves.unsubscribe_calls("EUR"), 1);

    let k4 = h.orchestrator.instrument(&key("K4")).unwrap();
    assert_eq!(k4.status, InstrumentStatus::Pending);
    assert_eq!(k4.price, Some(Decimal::new(100, 0)));
    assert_eq!(k4.settlement, None);

    let results = h.drain();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].key, key("K1"));
    assert_eq!(h.orchestrator.diagnostics().hub.groups_failed, 1);
}

#[tokio::test]
async fn test_feed_loss_fails_ready_group() {
    let curves = usd_feed(&["1Y", "5Y", "10Y"]);
    curves.publish_pairs("USD", USD_CURVE);
    let mut h = Harness::new(vec![bond("K1", "5.0", "2030-06-15", "USD")], curves);
    h.start().await;
    assert_eq!(h.state_of(&usd()), Some(GroupState::Ready));

    h.curves.close("USD");
    h.settle().await;
    assert_eq!(h.state_of(&usd()), Some(GroupState::Failed));
    assert_eq!(h.curves.unsubscribe_calls("USD"), 1);

    h.prices.publish("K1", "100");
    h.settle().await;
    assert!(h.drain().is_empty());
    assert_eq!(
        h.orchestrator.instrument(&key("K1")).unwrap().status,
        InstrumentStatus::Pending
    );
}

#[tokio::test]
async fn test_subscribe_failure_fails_group() {
    let curves = usd_feed(&["1Y"]);
    curves.fail_subscribe("USD", TraitError::SubscriptionFailed("no entitlement".into()));
    let mut h = Harness::new(vec![bond("K1", "5.0", "2030-06-15", "USD")], curves);
    h.start().await;

    assert_eq!(h.state_of(&usd()), Some(GroupState::Failed));
    assert_eq!(h.orchestrator.diagnostics().live_groups, 0);
}

#[tokio::test]
async fn test_late_group_message_is_dropped() {
    let mut h = Harness::new(vec![bond("K1", "5.0", "2030-06-15", "USD")], usd_feed(&["1Y"]));
    h.start().await;

    h.orchestrator
        .handle_message(FeedMessage::Group(GroupMessage::Snapshot {
            group_id: GroupId::new("JPY"),
            snapshot: Snapshot::from_pairs([("1Y", "0.5")]),
        }));

    assert_eq!(h.orchestrator.diagnostics().hub.late_messages, 1);
    assert!(h.orchestrator.term_structure(&GroupId::new("JPY")).is_none());
}

#[tokio::test]
async fn test_unknown_and_bad_prices_are_dropped() {
    let mut h = Harness::new(vec![bond("K1", "5.0", "2030-06-15", "USD")], usd_feed(&["1Y"]));
    h.start().await;

    h.orchestrator
        .handle_message(FeedMessage::Price(PriceTick::new("ZZZ", "100")));
    h.prices.publish("K1", "N/A");
    h.prices.publish("K1", "-1");
    h.settle().await;

    let prices = h.orchestrator.diagnostics().prices;
    assert_eq!(prices.dropped_unknown, 1);
    assert_eq!(prices.dropped_unparseable, 2);
    assert_eq!(h.orchestrator.instrument(&key("K1")).unwrap().price, None);
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[tokio::test]
async fn test_stuck_enumeration_is_released_on_stop() {
    let curves = MemoryGroupFeed::new();
    curves.hold_enumeration("USD");
    let mut h = Harness::new(vec![bond("K1", "5.0", "2030-06-15", "USD")], curves);
    h.start().await;

    assert_eq!(h.state_of(&usd()), Some(GroupState::Requesting));

    h.orchestrator.stop();
    assert_eq!(h.orchestrator.state(), OrchestratorState::Stopped);
    assert_eq!(h.curves.unsubscribe_calls("USD"), 1);
    assert_eq!(h.prices.unsubscribe_calls(), 1);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let mut h = Harness::new(vec![bond("K1", "5.0", "2030-06-15", "USD")], usd_feed(&["1Y"]));
    h.start().await;

    h.orchestrator.stop();
    h.orchestrator.stop();

    assert_eq!(h.curves.unsubscribe_calls("USD"), 1);
    assert_eq!(h.prices.unsubscribe_calls(), 1);

    h.orchestrator
        .handle_message(FeedMessage::Price(PriceTick::new("K1", "100")));
    assert_eq!(h.orchestrator.instrument(&key("K1")).unwrap().price, None);
}

#[tokio::test]
async fn test_run_exits_on_shutdown() {
    let curves = usd_feed(&["1Y", "5Y", "10Y"]);
    curves.publish_pairs("USD", USD_CURVE);
    let mut h = Harness::new(vec![bond("K1", "5.0", "2030-06-15", "USD")], curves);
    h.orchestrator.start(&SearchCriteria::all()).await.unwrap();
    h.prices.publish("K1", "100");

    let handle = h.orchestrator.shutdown_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.shutdown();
    });
    h.orchestrator.run().await;

    assert_eq!(h.orchestrator.state(), OrchestratorState::Stopped);
    assert_eq!(h.drain().len(), 1);
}

#[tokio::test]
async fn test_run_returns_when_shutdown_was_signalled_first() {
    let mut h = Harness::new(vec![bond("K1", "5.0", "2030-06-15", "USD")], usd_feed(&["1Y"]));
    h.start().await;

    h.orchestrator.shutdown_handle().shutdown();
    let finished = tokio::time::timeout(Duration::from_secs(2), h.orchestrator.run()).await;

    assert!(finished.is_ok(), "run kept waiting after an earlier shutdown");
    assert_eq!(h.orchestrator.state(), OrchestratorState::Stopped);
    assert_eq!(h.curves.unsubscribe_calls("USD"), 1);
    assert_eq!(h.prices.unsubscribe_calls(), 1);
}

#[tokio::test]
async fn test_rejected_unsubscribes_show_in_diagnostics() {
    let mut h = Harness::new(vec![bond("K1", "5.0", "2030-06-15", "USD")], usd_feed(&["1Y"]));
    h.start().await;
    h.curves.fail_unsubscribe("USD", TraitError::Timeout);
    h.prices.fail_unsubscribe(TraitError::Internal("session gone".into()));

    h.orchestrator.stop();
    let diagnostics = h.orchestrator.diagnostics();

    assert_eq!(diagnostics.state, OrchestratorState::Stopped);
    assert_eq!(diagnostics.hub.unsubscribe_failures, 1);
    assert_eq!(diagnostics.prices.unsubscribe_failures, 1);
}

#[tokio::test]
async fn test_price_feed_loss_shows_in_diagnostics() {
    let mut h = Harness::new(vec![bond("K1", "5.0", "2030-06-15", "USD")], usd_feed(&["1Y"]));
    h.start().await;
    assert!(!h.orchestrator.diagnostics().price_feed_closed);

    h.prices.close();
    h.settle().await;

    let diagnostics = h.orchestrator.diagnostics();
    assert!(diagnostics.price_feed_closed);
    assert_eq!(diagnostics.state, OrchestratorState::Running);
}

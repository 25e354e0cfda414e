//! The event loop: wires hub and price events into store mutations and
//! readiness-gated recomputes.
//!
//! All state lives on the [`Orchestrator`] and is mutated from one task.
//! Feed I/O runs in spawned tasks that only push [`FeedMessage`]s into the
//! orchestrator's queue.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use spreadwatch_traits::config::EngineConfig;
use spreadwatch_traits::reference_data::ReferenceCollaborator;
use spreadwatch_traits::search::{SearchCollaborator, SearchCriteria};
use spreadwatch_traits::term_structure::TermStructure;
use spreadwatch_traits::{GroupId, InstrumentKey};

use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, FeedMessage, SpreadOutcome, SpreadResult};
use crate::hub::{GroupHub, HubStats};
use crate::key_subscription::{KeyStats, KeySubscription};
use crate::recompute::RecomputeEngine;
use crate::store::{EntityStore, Instrument, StoreStats, UpsertSummary};
use crate::subscription::GroupState;

// =============================================================================
// STATE AND DIAGNOSTICS
// =============================================================================

/// Lifecycle of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    /// Built, not started
    Idle,
    /// Streaming
    Running,
    /// All subscriptions released
    Stopped,
}

/// What `start` found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSummary {
    /// Keys returned by search
    pub keys_found: usize,
    /// Records returned by the reference fetch
    pub records_fetched: usize,
    /// Effect on the store
    pub upsert: UpsertSummary,
    /// Groups subscribed
    pub groups: Vec<GroupId>,
}

/// Aggregate counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Orchestrator state
    pub state: OrchestratorState,
    /// Instruments held
    pub instruments: usize,
    /// Live group subscriptions
    pub live_groups: usize,
    /// Recomputes run
    pub recomputes: u64,
    /// Recomputes that failed
    pub recompute_failures: u64,
    /// Store counters
    pub store: StoreStats,
    /// Hub counters
    pub hub: HubStats,
    /// Price counters
    pub prices: KeyStats,
    /// The price stream ended while running
    pub price_feed_closed: bool,
}

/// Cloneable handle that asks [`Orchestrator::run`] to stop.
///
/// The request is sticky: a `run` entered after `shutdown` returns at once.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Signal shutdown.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

/// Owns the store, hub and price subscription and drives recomputes.
pub struct Orchestrator {
    config: EngineConfig,
    search: Arc<dyn SearchCollaborator>,
    reference: Arc<dyn ReferenceCollaborator>,
    store: EntityStore,
    hub: GroupHub,
    prices: KeySubscription,
    recompute: RecomputeEngine,
    clock: Arc<dyn Clock>,
    events_rx: mpsc::Receiver<FeedMessage>,
    results_tx: broadcast::Sender<SpreadResult>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    state: OrchestratorState,
    recomputes: u64,
    recompute_failures: u64,
    price_feed_closed: bool,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: EngineConfig,
        search: Arc<dyn SearchCollaborator>,
        reference: Arc<dyn ReferenceCollaborator>,
        hub: GroupHub,
        prices: KeySubscription,
        recompute: RecomputeEngine,
        clock: Arc<dyn Clock>,
        events_rx: mpsc::Receiver<FeedMessage>,
    ) -> Self {
        let (results_tx, _) = broadcast::channel(config.result_buffer);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            search,
            reference,
            store: EntityStore::new(),
            hub,
            prices,
            recompute,
            clock,
            events_rx,
            results_tx,
            shutdown_tx: Arc::new(shutdown_tx),
            state: OrchestratorState::Idle,
            recomputes: 0,
            recompute_failures: 0,
            price_feed_closed: false,
        }
    }

    /// Run the one-shot phases, then open every subscription.
    ///
    /// Search and reference failures are startup failures. If opening the
    /// subscriptions fails partway, everything opened so far is released
    /// before the error is returned.
    pub async fn start(&mut self, criteria: &SearchCriteria) -> EngineResult<StartSummary> {
        if self.state != OrchestratorState::Idle {
            return Err(EngineError::AlreadyStarted);
        }
        info!("Starting {}", self.config.name);

        let keys = self
            .search
            .query(criteria)
            .await
            .map_err(EngineError::SearchFailed)?;
        info!("Search returned {} keys", keys.len());

        let records = self
            .reference
            .fetch(&keys, &self.config.reference_fields)
            .await
            .map_err(EngineError::ReferenceFailed)?;

        let upsert = self.store.upsert_from_reference(
            &records,
            self.config.sentinels.as_slice(),
            self.config.duplicate_policy,
        );
        info!(
            "Reference data: {} records, {} inserted, {} dropped, {} duplicates",
            records.len(),
            upsert.inserted,
            upsert.dropped,
            upsert.duplicates
        );

        self.state = OrchestratorState::Running;
        if let Err(e) = self.open_subscriptions().await {
            warn!("Startup failed after subscribing, releasing: {}", e);
            self.stop();
            return Err(e);
        }

        Ok(StartSummary {
            keys_found: keys.len(),
            records_fetched: records.len(),
            upsert,
            groups: self.store.group_ids().to_vec(),
        })
    }

    async fn open_subscriptions(&mut self) -> EngineResult<()> {
        for group_id in self.store.group_ids().to_vec() {
            for key in self.store.keys_in_group(&group_id) {
                self.hub.add_member(&group_id, key)?;
            }
        }

        if self.store.is_empty() {
            warn!("No usable instruments, skipping price subscription");
            return Ok(());
        }
        self.prices.subscribe(self.store.keys()).await
    }

    /// Process events until [`ShutdownHandle::shutdown`] is signalled, then
    /// release all subscriptions.
    ///
    /// Returns immediately if shutdown was signalled before the call.
    pub async fn run(&mut self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if *shutdown_rx.borrow_and_update() {
            info!("Shutdown already requested");
            self.stop();
            return;
        }
        info!("Event loop running");

        loop {
            let next = tokio::select! {
                message = self.events_rx.recv() => message,
                _ = shutdown_rx.changed() => None,
            };
            match next {
                Some(message) => self.handle_message(message),
                None => break,
            }
        }

        self.stop();
    }

    /// Process events until none arrives for `idle`. Returns the number of
    /// messages handled. Subscriptions stay open.
    pub async fn run_until_idle(&mut self, idle: Duration) -> usize {
        let mut handled = 0;
        while let Ok(Some(message)) = tokio::time::timeout(idle, self.events_rx.recv()).await {
            self.handle_message(message);
            handled += 1;
        }
        debug!("Idle after {} messages", handled);
        handled
    }

    /// Process one feed message synchronously.
    pub fn handle_message(&mut self, message: FeedMessage) {
        if self.state == OrchestratorState::Stopped {
            debug!("Dropping message after stop");
            return;
        }

        let event = match message {
            FeedMessage::Group(message) => self.hub.handle(message),
            FeedMessage::Price(tick) => self.prices.handle(tick),
            FeedMessage::PriceFeedClosed => {
                warn!("Price feed closed");
                self.price_feed_closed = true;
                None
            }
        };

        if let Some(event) = event {
            self.dispatch(event);
        }
    }

    fn dispatch(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::GroupUpdated {
                group_id,
                term_structure,
            } => self.on_group_updated(&group_id, &term_structure),
            EngineEvent::GroupFailed { group_id, reason } => {
                warn!(
                    "Group {} unavailable ({}): {} instruments stay pending",
                    group_id,
                    reason,
                    self.store.by_group(&group_id).count()
                );
            }
            EngineEvent::PriceUpdated { key, price } => self.on_price_updated(&key, price),
        }
    }

    fn on_group_updated(&mut self, group_id: &GroupId, term_structure: &TermStructure) {
        // Recompute mutates the store, so walk a copy of the key list.
        let keys: Vec<InstrumentKey> = self
            .store
            .by_group(group_id)
            .filter(|i| i.has_price())
            .map(|i| i.key.clone())
            .collect();
        debug!("Group {} updated, recomputing {} instruments", group_id, keys.len());

        for key in keys {
            self.recompute_one(&key, term_structure);
        }
    }

    fn on_price_updated(&mut self, key: &InstrumentKey, price: Decimal) {
        let Some(group_id) = self.store.group_of(key).cloned() else {
            debug!("Price for unknown key {}", key);
            return;
        };
        let term_structure = self.hub.term_structure(&group_id);
        let today = self.clock.today();

        match self.store.apply_price(
            key,
            price,
            term_structure.is_some(),
            self.recompute.math(),
            today,
        ) {
            Ok(true) => {
                if let Some(term_structure) = term_structure {
                    self.recompute_one(key, &term_structure);
                }
            }
            Ok(false) => debug!("{} priced, group {} not ready", key, group_id),
            Err(e) => debug!("{}", e),
        }
    }

    fn recompute_one(&mut self, key: &InstrumentKey, term_structure: &TermStructure) {
        self.store
            .refresh_settlement(key, self.recompute.math(), self.clock.today());
        let Some(instrument) = self.store.get(key) else {
            return;
        };

        let outcome = self.recompute.compute(instrument, term_structure);
        let timestamp = self.clock.now();
        self.store.record(key, &outcome, timestamp);

        self.recomputes += 1;
        if let SpreadOutcome::Failed(reason) = &outcome {
            self.recompute_failures += 1;
            debug!("Recompute failed for {}: {}", key, reason);
        }

        // No subscribers is fine.
        let _ = self.results_tx.send(SpreadResult {
            key: key.clone(),
            outcome,
            timestamp,
        });
    }

    /// Release every subscription. Idempotent.
    pub fn stop(&mut self) {
        if self.state == OrchestratorState::Stopped {
            return;
        }
        self.hub.shutdown();
        self.prices.teardown();
        self.shutdown_tx.send_replace(true);
        self.state = OrchestratorState::Stopped;
        info!("{} stopped", self.config.name);
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Subscribe to the result stream.
    pub fn subscribe_results(&self) -> broadcast::Receiver<SpreadResult> {
        self.results_tx.subscribe()
    }

    /// Handle for stopping [`run`](Self::run) from elsewhere.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Read-only view of one instrument.
    pub fn instrument(&self, key: &InstrumentKey) -> Option<&Instrument> {
        self.store.get(key)
    }

    /// All instruments, grouped, in insertion order.
    pub fn instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.store.iter()
    }

    /// State of every group seen so far.
    pub fn group_states(&self) -> Vec<(GroupId, GroupState)> {
        self.hub.states()
    }

    /// Latest term structure of a ready group.
    pub fn term_structure(&self, group_id: &GroupId) -> Option<Arc<TermStructure>> {
        self.hub.term_structure(group_id)
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Aggregate counters.
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            state: self.state,
            instruments: self.store.len(),
            live_groups: self.hub.live_count(),
            recomputes: self.recomputes,
            recompute_failures: self.recompute_failures,
            store: self.store.stats(),
            hub: self.hub.stats(),
            prices: self.prices.stats(),
            price_feed_closed: self.price_feed_closed,
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

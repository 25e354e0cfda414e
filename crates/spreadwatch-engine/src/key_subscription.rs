//! Single multiplexed price subscription for the whole instrument universe.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use spreadwatch_traits::price_feed::{PriceFeedCollaborator, PriceTick};
use spreadwatch_traits::InstrumentKey;

use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, FeedMessage};

/// Price tick counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStats {
    /// Ticks turned into price events
    pub accepted: u64,
    /// Ticks for keys outside the subscribed set
    pub dropped_unknown: u64,
    /// Ticks with an unparseable or non-positive price
    pub dropped_unparseable: u64,
    /// Unsubscribe calls the feed rejected
    pub unsubscribe_failures: u64,
}

/// Price subscription over a fixed key set, registered once.
pub struct KeySubscription {
    feed: Arc<dyn PriceFeedCollaborator>,
    tx: mpsc::Sender<FeedMessage>,
    keys: HashSet<InstrumentKey>,
    subscribed: bool,
    task: Option<AbortHandle>,
    stats: KeyStats,
}

impl KeySubscription {
    /// Create an unsubscribed key subscription pushing ticks into `tx`.
    pub fn new(feed: Arc<dyn PriceFeedCollaborator>, tx: mpsc::Sender<FeedMessage>) -> Self {
        Self {
            feed,
            tx,
            keys: HashSet::new(),
            subscribed: false,
            task: None,
            stats: KeyStats::default(),
        }
    }

    /// Register the key set and start streaming.
    ///
    /// Keys cannot be added later; a second call fails with
    /// [`EngineError::AlreadySubscribed`]. A call the feed rejected may be
    /// retried.
    pub async fn subscribe(&mut self, keys: Vec<InstrumentKey>) -> EngineResult<()> {
        if self.subscribed {
            return Err(EngineError::AlreadySubscribed);
        }

        let mut rx = self.feed.subscribe(&keys).await?;
        self.subscribed = true;
        info!("Subscribed to prices for {} keys", keys.len());
        self.keys = keys.into_iter().collect();

        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            while let Some(tick) = rx.recv().await {
                if tx.send(FeedMessage::Price(tick)).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(FeedMessage::PriceFeedClosed).await;
        });
        self.task = Some(handle.abort_handle());
        Ok(())
    }

    /// Turn a raw tick into a price event.
    ///
    /// Unknown keys and bad prices are dropped with a warning.
    pub fn handle(&mut self, tick: PriceTick) -> Option<EngineEvent> {
        if !self.keys.contains(&tick.key) {
            warn!("Dropping price for unknown key {}", tick.key);
            self.stats.dropped_unknown += 1;
            return None;
        }

        match parse_price(&tick.raw_price) {
            Some(price) => {
                self.stats.accepted += 1;
                Some(EngineEvent::PriceUpdated {
                    key: tick.key,
                    price,
                })
            }
            None => {
                warn!("Dropping unusable price {:?} for {}", tick.raw_price, tick.key);
                self.stats.dropped_unparseable += 1;
                None
            }
        }
    }

    /// Whether `subscribe` has succeeded.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Number of subscribed keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True if no keys are subscribed.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Counters.
    pub fn stats(&self) -> KeyStats {
        self.stats
    }

    /// Unregister from the feed and stop the pump task. Idempotent.
    pub fn teardown(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        let keys: Vec<InstrumentKey> = self.keys.iter().cloned().collect();
        if let Err(e) = self.feed.unsubscribe(&keys) {
            error!("Failed to unsubscribe {} price keys: {}", keys.len(), e);
            self.stats.unsubscribe_failures += 1;
        }
        task.abort();
        debug!("Price subscription torn down");
    }
}

impl Drop for KeySubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn parse_price(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim())
        .ok()
        .filter(|p| p.is_sign_positive() && !p.is_zero())
}

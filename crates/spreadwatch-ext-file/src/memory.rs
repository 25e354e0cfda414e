//! In-memory collaborators for tests, demos and embedding.
//!
//! The feeds pre-create their channels, so data published before the engine
//! subscribes is buffered and delivered on subscribe.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use spreadwatch_traits::error::TraitError;
use spreadwatch_traits::group_feed::{GroupFeedCollaborator, Snapshot, SnapshotReceiver};
use spreadwatch_traits::ids::*;
use spreadwatch_traits::price_feed::{PriceFeedCollaborator, PriceReceiver, PriceTick};
use spreadwatch_traits::reference_data::{ReferenceCollaborator, ReferenceRecord};
use spreadwatch_traits::search::{SearchCollaborator, SearchCriteria};

/// Buffered messages per stream.
const STREAM_CAPACITY: usize = 1024;

// =============================================================================
// SEARCH AND REFERENCE
// =============================================================================

/// Search returning a fixed key list.
pub struct MemorySearch {
    keys: Vec<InstrumentKey>,
    calls: AtomicUsize,
}

impl MemorySearch {
    /// Search that always returns `keys`.
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<InstrumentKey>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of queries run.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchCollaborator for MemorySearch {
    async fn query(&self, criteria: &SearchCriteria) -> Result<Vec<InstrumentKey>, TraitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let limit = criteria.max_results.unwrap_or(usize::MAX);
        Ok(self.keys.iter().take(limit).cloned().collect())
    }
}

/// Reference data from a fixed record list.
pub struct MemoryReference {
    records: Vec<ReferenceRecord>,
}

impl MemoryReference {
    /// Reference source serving `records`.
    pub fn new(records: Vec<ReferenceRecord>) -> Self {
        Self { records }
    }

    /// Keys of all records, in order. Handy as the matching search result.
    pub fn keys(&self) -> Vec<InstrumentKey> {
        self.records.iter().map(|r| InstrumentKey::new(r.key.trim())).collect()
    }
}

#[async_trait]
impl ReferenceCollaborator for MemoryReference {
    async fn fetch(
        &self,
        keys: &[InstrumentKey],
        _fields: &[String],
    ) -> Result<Vec<ReferenceRecord>, TraitError> {
        let wanted: HashSet<&str> = keys.iter().map(InstrumentKey::as_str).collect();
        Ok(self
            .records
            .iter()
            .filter(|r| wanted.contains(r.key.trim()))
            .cloned()
            .collect())
    }
}

/// Reference source whose fetch always fails.
pub struct FailingReference {
    error: TraitError,
}

impl FailingReference {
    /// Fail every fetch with `error`.
    pub fn new(error: TraitError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl ReferenceCollaborator for FailingReference {
    async fn fetch(
        &self,
        _keys: &[InstrumentKey],
        _fields: &[String],
    ) -> Result<Vec<ReferenceRecord>, TraitError> {
        Err(self.error.clone())
    }
}

// =============================================================================
// GROUP FEED
// =============================================================================

fn bump(counter: &DashMap<GroupId, usize>, group_id: &GroupId) {
    *counter.entry(group_id.clone()).or_insert(0) += 1;
}

fn count(counter: &DashMap<GroupId, usize>, group_id: &str) -> usize {
    counter
        .get(&GroupId::new(group_id))
        .map(|c| *c)
        .unwrap_or(0)
}

/// Scriptable group feed.
///
/// Register groups with [`add_group`](Self::add_group), then drive them with
/// [`publish`](Self::publish) and [`close`](Self::close). Unregistered groups
/// enumerate to nothing.
#[derive(Default)]
pub struct MemoryGroupFeed {
    constituents: DashMap<GroupId, Vec<ConstituentKey>>,
    senders: DashMap<GroupId, mpsc::Sender<Snapshot>>,
    receivers: Mutex<HashMap<GroupId, mpsc::Receiver<Snapshot>>>,
    enumerate_errors: DashMap<GroupId, TraitError>,
    subscribe_errors: DashMap<GroupId, TraitError>,
    unsubscribe_errors: DashMap<GroupId, TraitError>,
    held: DashMap<GroupId, ()>,
    enumerate_calls: DashMap<GroupId, usize>,
    subscribe_calls: DashMap<GroupId, usize>,
    unsubscribe_calls: DashMap<GroupId, usize>,
}

impl MemoryGroupFeed {
    /// Empty feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group and its constituents.
    pub fn add_group<I, C>(&self, group_id: &str, constituents: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<ConstituentKey>,
    {
        let group_id = GroupId::new(group_id);
        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        self.constituents.insert(
            group_id.clone(),
            constituents.into_iter().map(Into::into).collect(),
        );
        self.senders.insert(group_id.clone(), tx);
        self.receivers.lock().insert(group_id, rx);
    }

    /// Make enumeration of `group_id` fail.
    pub fn fail_enumeration(&self, group_id: &str, error: TraitError) {
        self.enumerate_errors.insert(GroupId::new(group_id), error);
    }

    /// Make subscription to `group_id` fail.
    pub fn fail_subscribe(&self, group_id: &str, error: TraitError) {
        self.subscribe_errors.insert(GroupId::new(group_id), error);
    }

    /// Make unsubscribing from `group_id` fail.
    pub fn fail_unsubscribe(&self, group_id: &str, error: TraitError) {
        self.unsubscribe_errors.insert(GroupId::new(group_id), error);
    }

    /// Make enumeration of `group_id` never complete.
    pub fn hold_enumeration(&self, group_id: &str) {
        self.held.insert(GroupId::new(group_id), ());
    }

    /// Push a snapshot. Returns false if the group's stream is closed or full.
    pub fn publish(&self, group_id: &str, snapshot: Snapshot) -> bool {
        self.senders
            .get(&GroupId::new(group_id))
            .map(|tx| tx.try_send(snapshot).is_ok())
            .unwrap_or(false)
    }

    /// Push a snapshot of `(tenor, rate)` pairs.
    pub fn publish_pairs(&self, group_id: &str, pairs: &[(&str, &str)]) -> bool {
        self.publish(group_id, Snapshot::from_pairs(pairs.iter().copied()))
    }

    /// End the group's stream, signalling total feed loss.
    pub fn close(&self, group_id: &str) {
        self.senders.remove(&GroupId::new(group_id));
    }

    /// Enumerate calls for a group.
    pub fn enumerate_calls(&self, group_id: &str) -> usize {
        count(&self.enumerate_calls, group_id)
    }

    /// Subscribe calls for a group.
    pub fn subscribe_calls(&self, group_id: &str) -> usize {
        count(&self.subscribe_calls, group_id)
    }

    /// Unsubscribe calls for a group.
    pub fn unsubscribe_calls(&self, group_id: &str) -> usize {
        count(&self.unsubscribe_calls, group_id)
    }
}

#[async_trait]
impl GroupFeedCollaborator for MemoryGroupFeed {
    async fn enumerate(&self, group_id: &GroupId) -> Result<Vec<ConstituentKey>, TraitError> {
        bump(&self.enumerate_calls, group_id);
        if self.held.contains_key(group_id) {
            return std::future::pending().await;
        }
        if let Some(error) = self.enumerate_errors.get(group_id) {
            return Err(error.value().clone());
        }
        Ok(self
            .constituents
            .get(group_id)
            .map(|c| c.value().clone())
            .unwrap_or_default())
    }

    async fn subscribe(
        &self,
        group_id: &GroupId,
        _constituents: &[ConstituentKey],
        _fields: &[String],
    ) -> Result<SnapshotReceiver, TraitError> {
        bump(&self.subscribe_calls, group_id);
        if let Some(error) = self.subscribe_errors.get(group_id) {
            return Err(error.value().clone());
        }
        self.receivers
            .lock()
            .remove(group_id)
            .map(SnapshotReceiver::new)
            .ok_or_else(|| TraitError::SubscriptionFailed(format!("no stream for {group_id}")))
    }

    fn unsubscribe(&self, group_id: &GroupId) -> Result<(), TraitError> {
        bump(&self.unsubscribe_calls, group_id);
        match self.unsubscribe_errors.get(group_id) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

// =============================================================================
// PRICE FEED
// =============================================================================

/// Scriptable price feed.
pub struct MemoryPriceFeed {
    sender: Mutex<Option<mpsc::Sender<PriceTick>>>,
    receiver: Mutex<Option<mpsc::Receiver<PriceTick>>>,
    subscribed: Mutex<Vec<InstrumentKey>>,
    subscribe_error: Mutex<Option<TraitError>>,
    unsubscribe_error: Mutex<Option<TraitError>>,
    unsubscribe_calls: AtomicUsize,
}

impl MemoryPriceFeed {
    /// Empty feed.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            subscribed: Mutex::new(Vec::new()),
            subscribe_error: Mutex::new(None),
            unsubscribe_error: Mutex::new(None),
            unsubscribe_calls: AtomicUsize::new(0),
        }
    }

    /// Push a raw price. Returns false if the stream is closed or full.
    pub fn publish(&self, key: &str, raw_price: &str) -> bool {
        self.sender
            .lock()
            .as_ref()
            .map(|tx| tx.try_send(PriceTick::new(key, raw_price)).is_ok())
            .unwrap_or(false)
    }

    /// End the stream.
    pub fn close(&self) {
        self.sender.lock().take();
    }

    /// Make the next subscribe fail.
    pub fn fail_subscribe(&self, error: TraitError) {
        *self.subscribe_error.lock() = Some(error);
    }

    /// Make every unsubscribe fail.
    pub fn fail_unsubscribe(&self, error: TraitError) {
        *self.unsubscribe_error.lock() = Some(error);
    }

    /// Keys passed to subscribe.
    pub fn subscribed_keys(&self) -> Vec<InstrumentKey> {
        self.subscribed.lock().clone()
    }

    /// Number of unsubscribe calls.
    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }
}

impl Default for MemoryPriceFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceFeedCollaborator for MemoryPriceFeed {
    async fn subscribe(&self, keys: &[InstrumentKey]) -> Result<PriceReceiver, TraitError> {
        if let Some(error) = self.subscribe_error.lock().take() {
            return Err(error);
        }
        let rx = self
            .receiver
            .lock()
            .take()
            .ok_or_else(|| TraitError::SubscriptionFailed("already subscribed".into()))?;
        *self.subscribed.lock() = keys.to_vec();
        Ok(PriceReceiver::new(rx))
    }

    fn unsubscribe(&self, _keys: &[InstrumentKey]) -> Result<(), TraitError> {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        match self.unsubscribe_error.lock().as_ref() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_group_feed_buffers_until_subscribe() {
        let feed = MemoryGroupFeed::new();
        feed.add_group("USD", ["1Y", "5Y"]);
        assert!(feed.publish_pairs("USD", &[("1Y", "4.0")]));

        let usd = GroupId::new("USD");
        let constituents = feed.enumerate(&usd).await.unwrap();
        let mut rx = feed.subscribe(&usd, &constituents, &[]).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().rows[0].rate, "4.0");
        feed.close("USD");
        assert!(rx.recv().await.is_none());
        assert_eq!(feed.enumerate_calls("USD"), 1);
        assert_eq!(feed.subscribe_calls("USD"), 1);
    }

    #[tokio::test]
    async fn test_group_feed_scripted_failures() {
        let feed = MemoryGroupFeed::new();
        feed.fail_enumeration("EUR", TraitError::Timeout);
        assert!(feed.enumerate(&GroupId::new("EUR")).await.is_err());
        assert!(feed.enumerate(&GroupId::new("JPY")).await.unwrap().is_empty());

        feed.add_group("GBP", ["1Y"]);
        feed.fail_subscribe("GBP", TraitError::SubscriptionFailed("denied".into()));
        assert!(feed.subscribe(&GroupId::new("GBP"), &[], &[]).await.is_err());

        feed.fail_unsubscribe("GBP", TraitError::Timeout);
        assert!(feed.unsubscribe(&GroupId::new("GBP")).is_err());
        assert!(feed.unsubscribe(&GroupId::new("EUR")).is_ok());
        assert_eq!(feed.unsubscribe_calls("GBP"), 1);
    }

    #[tokio::test]
    async fn test_price_feed_single_subscription() {
        let feed = MemoryPriceFeed::new();
        assert!(feed.publish("K1", "100"));

        let mut rx = feed.subscribe(&[InstrumentKey::new("K1")]).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().raw_price, "100");
        assert!(feed.subscribe(&[]).await.is_err());
        assert_eq!(feed.subscribed_keys(), vec![InstrumentKey::new("K1")]);

        feed.close();
        assert!(rx.recv().await.is_none());
        assert!(!feed.publish("K1", "101"));
    }
}

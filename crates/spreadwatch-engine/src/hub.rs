//! Dynamic collection of group subscriptions.
//!
//! The hub creates one [`GroupSubscription`] per group id on demand, runs the
//! feed I/O for each in spawned tasks, and funnels every completion back
//! through a single queue. Downstream code sees one stream of
//! [`EngineEvent`]s keyed by group id and never learns how many groups exist.
//!
//! Feed tasks hold only a sender into the queue; the hub owns the
//! subscriptions, never the other way round.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use spreadwatch_traits::group_feed::GroupFeedCollaborator;
use spreadwatch_traits::term_structure::TermStructure;
use spreadwatch_traits::{ConstituentKey, GroupId, InstrumentKey};

use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, FeedMessage, GroupMessage};
use crate::subscription::{GroupState, GroupSubscription};

/// Hub counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubStats {
    /// Subscriptions created
    pub groups_created: u64,
    /// Groups that reached `Ready`
    pub groups_ready: u64,
    /// Groups that failed
    pub groups_failed: u64,
    /// Snapshots that replaced a term structure
    pub snapshots_applied: u64,
    /// Snapshots discarded for lack of usable rows
    pub snapshots_discarded: u64,
    /// Snapshot rows dropped
    pub rows_dropped: u64,
    /// Messages for groups no longer live
    pub late_messages: u64,
    /// Unsubscribe calls the feed rejected
    pub unsubscribe_failures: u64,
}

/// Owner of all group subscriptions.
pub struct GroupHub {
    feed: Arc<dyn GroupFeedCollaborator>,
    tx: mpsc::Sender<FeedMessage>,
    curve_fields: Vec<String>,
    groups: HashMap<GroupId, GroupSubscription>,
    /// Failed groups and their reasons; never retried
    failed: HashMap<GroupId, String>,
    stats: HubStats,
}

impl GroupHub {
    /// Create a hub pushing feed completions into `tx`.
    pub fn new(
        feed: Arc<dyn GroupFeedCollaborator>,
        tx: mpsc::Sender<FeedMessage>,
        curve_fields: Vec<String>,
    ) -> Self {
        Self {
            feed,
            tx,
            curve_fields,
            groups: HashMap::new(),
            failed: HashMap::new(),
            stats: HubStats::default(),
        }
    }

    /// Return the live subscription for `group_id`, creating and starting one
    /// if none exists.
    ///
    /// Idempotent: a second call for the same id never touches the feed.
    /// Must be called inside a tokio runtime.
    pub fn ensure_group(&mut self, group_id: &GroupId) -> EngineResult<&mut GroupSubscription> {
        if self.failed.contains_key(group_id) {
            return Err(EngineError::GroupUnavailable(group_id.clone()));
        }

        if !self.groups.contains_key(group_id) {
            info!("Creating subscription for group {}", group_id);
            let mut subscription = GroupSubscription::new(group_id.clone());
            subscription.attach_task(self.spawn_enumerate(group_id.clone()));
            self.groups.insert(group_id.clone(), subscription);
            self.stats.groups_created += 1;
        }

        self.groups
            .get_mut(group_id)
            .ok_or_else(|| EngineError::Internal(format!("group {group_id} vanished")))
    }

    /// Ensure the group exists and record `key` as a member.
    pub fn add_member(&mut self, group_id: &GroupId, key: InstrumentKey) -> EngineResult<()> {
        self.ensure_group(group_id)?.add_member(key);
        Ok(())
    }

    fn spawn_enumerate(&self, group_id: GroupId) -> tokio::task::AbortHandle {
        let feed = Arc::clone(&self.feed);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let result = feed.enumerate(&group_id).await;
            let message = FeedMessage::Group(GroupMessage::Enumerated { group_id, result });
            if tx.send(message).await.is_err() {
                debug!("Event loop gone, dropping enumeration result");
            }
        })
        .abort_handle()
    }

    fn spawn_subscribe(
        &self,
        group_id: GroupId,
        constituents: Vec<ConstituentKey>,
    ) -> tokio::task::AbortHandle {
        let feed = Arc::clone(&self.feed);
        let tx = self.tx.clone();
        let fields = self.curve_fields.clone();

        tokio::spawn(async move {
            let mut rx = match feed.subscribe(&group_id, &constituents, &fields).await {
                Ok(rx) => rx,
                Err(e) => {
                    let message = FeedMessage::Group(GroupMessage::SubscribeFailed {
                        group_id,
                        reason: e.to_string(),
                    });
                    let _ = tx.send(message).await;
                    return;
                }
            };

            while let Some(snapshot) = rx.recv().await {
                let message = FeedMessage::Group(GroupMessage::Snapshot {
                    group_id: group_id.clone(),
                    snapshot,
                });
                if tx.send(message).await.is_err() {
                    return;
                }
            }

            let _ = tx
                .send(FeedMessage::Group(GroupMessage::FeedClosed { group_id }))
                .await;
        })
        .abort_handle()
    }

    /// Apply one group message and return the resulting bus event, if any.
    ///
    /// Messages for ids that are no longer live are dropped silently.
    pub fn handle(&mut self, message: GroupMessage) -> Option<EngineEvent> {
        let group_id = message.group_id().clone();
        let Some(subscription) = self.groups.get_mut(&group_id) else {
            debug!("Dropping late message for group {}", group_id);
            self.stats.late_messages += 1;
            return None;
        };

        let was_ready = subscription.state() == GroupState::Ready;
        let event = match message {
            GroupMessage::Enumerated { result, .. } => {
                let event = subscription.on_enumerated(result);
                if subscription.state() == GroupState::Subscribing {
                    let constituents = subscription.constituents().to_vec();
                    let handle = self.spawn_subscribe(group_id.clone(), constituents);
                    if let Some(subscription) = self.groups.get_mut(&group_id) {
                        subscription.attach_task(handle);
                    }
                }
                event
            }
            GroupMessage::Snapshot { snapshot, .. } => {
                let before = subscription.stats();
                let event = subscription.on_snapshot(&snapshot);
                let after = subscription.stats();
                self.stats.snapshots_applied += after.applied - before.applied;
                self.stats.snapshots_discarded += after.discarded - before.discarded;
                self.stats.rows_dropped += after.dropped_rows - before.dropped_rows;
                if !was_ready && event.is_some() {
                    self.stats.groups_ready += 1;
                }
                event
            }
            GroupMessage::SubscribeFailed { reason, .. } => subscription.on_subscribe_failed(&reason),
            GroupMessage::FeedClosed { .. } => subscription.on_feed_closed(),
        };

        if let Some(EngineEvent::GroupFailed { reason, .. }) = &event {
            self.retire(&group_id, reason.clone());
        }
        event
    }

    /// Remove a failed group from the live set.
    fn retire(&mut self, group_id: &GroupId, reason: String) {
        if let Some(mut subscription) = self.groups.remove(group_id) {
            if subscription.teardown(self.feed.as_ref()).is_err() {
                self.stats.unsubscribe_failures += 1;
            }
        }
        self.failed.insert(group_id.clone(), reason);
        self.stats.groups_failed += 1;
    }

    /// Current term structure of a `Ready` group.
    pub fn term_structure(&self, group_id: &GroupId) -> Option<Arc<TermStructure>> {
        self.groups
            .get(group_id)
            .filter(|s| s.state() == GroupState::Ready)
            .and_then(|s| s.term_structure().cloned())
    }

    /// True if the group currently holds a valid term structure.
    pub fn is_ready(&self, group_id: &GroupId) -> bool {
        self.state(group_id) == Some(GroupState::Ready)
    }

    /// State of a live or failed group.
    pub fn state(&self, group_id: &GroupId) -> Option<GroupState> {
        if self.failed.contains_key(group_id) {
            return Some(GroupState::Failed);
        }
        self.groups.get(group_id).map(GroupSubscription::state)
    }

    /// Why a group failed.
    pub fn failure(&self, group_id: &GroupId) -> Option<&str> {
        self.failed.get(group_id).map(String::as_str)
    }

    /// All known groups and their states, sorted by id.
    pub fn states(&self) -> Vec<(GroupId, GroupState)> {
        let mut states: Vec<_> = self
            .groups
            .iter()
            .map(|(id, s)| (id.clone(), s.state()))
            .chain(self.failed.keys().map(|id| (id.clone(), GroupState::Failed)))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    /// Number of live subscriptions.
    pub fn live_count(&self) -> usize {
        self.groups.len()
    }

    /// Counters.
    pub fn stats(&self) -> HubStats {
        self.stats
    }

    /// Tear down every live subscription.
    pub fn shutdown(&mut self) {
        if self.groups.is_empty() {
            return;
        }
        info!("Tearing down {} group subscriptions", self.groups.len());
        let feed = self.feed.as_ref();
        for (_, mut subscription) in self.groups.drain() {
            if subscription.teardown(feed).is_err() {
                self.stats.unsubscribe_failures += 1;
            }
        }
    }
}

impl Drop for GroupHub {
    fn drop(&mut self) {
        if !self.groups.is_empty() {
            warn!("Group hub dropped with {} live subscriptions", self.groups.len());
            self.shutdown();
        }
    }
}

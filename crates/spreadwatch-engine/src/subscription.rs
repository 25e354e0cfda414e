//! Per-group subscription state machine.
//!
//! ```text
//! Requesting ──enumerated──> Subscribing ──first usable snapshot──> Ready ──┐
//!     │                          │                                   ^     │ snapshot
//!     │ empty/error              │ subscribe failed / feed closed    └─────┘
//!     v                          v                                   │ feed closed
//!   Failed <─────────────────────┴───────────────────────────────────┘
//! ```
//!
//! The machine is synchronous: feed I/O runs in tasks owned by the hub, and
//! their completions are fed back in through the `on_*` handlers.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use spreadwatch_core::Tenor;
use spreadwatch_traits::group_feed::{GroupFeedCollaborator, Snapshot};
use spreadwatch_traits::term_structure::{TermPoint, TermStructure};
use spreadwatch_traits::{ConstituentKey, GroupId, InstrumentKey, TraitError};

use crate::events::EngineEvent;

/// Lifecycle state of a group subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupState {
    /// Enumerating constituents
    Requesting,
    /// Constituents known, waiting for the first usable snapshot
    Subscribing,
    /// Holding a valid term structure
    Ready,
    /// Terminal
    Failed,
}

/// Per-group snapshot counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotStats {
    /// Snapshots that replaced the term structure
    pub applied: u64,
    /// Snapshots with no usable row
    pub discarded: u64,
    /// Rows dropped for an unparseable tenor or rate
    pub dropped_rows: u64,
}

/// Parse one raw snapshot into term points, returning the number of rows dropped.
pub fn parse_snapshot(snapshot: &Snapshot) -> (Vec<TermPoint>, usize) {
    let mut points = Vec::with_capacity(snapshot.rows.len());
    let mut dropped = 0;

    for row in &snapshot.rows {
        match (Tenor::parse(&row.tenor), parse_rate(&row.rate)) {
            (Ok(tenor), Some(rate)) => points.push(TermPoint::new(tenor, rate)),
            _ => {
                debug!(
                    "Dropping row {}: tenor={:?} rate={:?}",
                    row.constituent, row.tenor, row.rate
                );
                dropped += 1;
            }
        }
    }

    (points, dropped)
}

fn parse_rate(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// One group's two-phase feed subscription.
#[derive(Debug)]
pub struct GroupSubscription {
    group_id: GroupId,
    state: GroupState,
    constituents: Vec<ConstituentKey>,
    term_structure: Option<Arc<TermStructure>>,
    members: HashSet<InstrumentKey>,
    failure: Option<String>,
    stats: SnapshotStats,
    task: Option<AbortHandle>,
}

impl GroupSubscription {
    /// New subscription in `Requesting`.
    pub fn new(group_id: GroupId) -> Self {
        Self {
            group_id,
            state: GroupState::Requesting,
            constituents: Vec::new(),
            term_structure: None,
            members: HashSet::new(),
            failure: None,
            stats: SnapshotStats::default(),
            task: None,
        }
    }

    /// Group id.
    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    /// Current state.
    pub fn state(&self) -> GroupState {
        self.state
    }

    /// Latest term structure, present once `Ready`.
    pub fn term_structure(&self) -> Option<&Arc<TermStructure>> {
        self.term_structure.as_ref()
    }

    /// Constituents returned by enumeration.
    pub fn constituents(&self) -> &[ConstituentKey] {
        &self.constituents
    }

    /// Failure reason, once `Failed`.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Counters.
    pub fn stats(&self) -> SnapshotStats {
        self.stats
    }

    /// Instruments this group believes it covers. Bookkeeping only.
    pub fn members(&self) -> &HashSet<InstrumentKey> {
        &self.members
    }

    /// Record a member instrument.
    pub fn add_member(&mut self, key: InstrumentKey) {
        self.members.insert(key);
    }

    /// Attach the feed task currently working for this group, aborting any
    /// previous one.
    pub fn attach_task(&mut self, handle: AbortHandle) {
        if let Some(previous) = self.task.replace(handle) {
            previous.abort();
        }
    }

    /// Enumeration finished.
    pub fn on_enumerated(
        &mut self,
        result: Result<Vec<ConstituentKey>, TraitError>,
    ) -> Option<EngineEvent> {
        if self.state != GroupState::Requesting {
            debug!("Group {} ignoring enumeration in {:?}", self.group_id, self.state);
            return None;
        }

        match result {
            Ok(constituents) if !constituents.is_empty() => {
                info!(
                    "Group {} enumerated {} constituents",
                    self.group_id,
                    constituents.len()
                );
                self.constituents = constituents;
                self.state = GroupState::Subscribing;
                None
            }
            Ok(_) => self.fail("enumeration returned no constituents".to_string()),
            Err(e) => self.fail(format!("enumeration failed: {e}")),
        }
    }

    /// A snapshot arrived.
    ///
    /// A snapshot with at least one usable row replaces the term structure
    /// wholesale. One with none is discarded and changes nothing.
    pub fn on_snapshot(&mut self, snapshot: &Snapshot) -> Option<EngineEvent> {
        if !matches!(self.state, GroupState::Subscribing | GroupState::Ready) {
            debug!("Group {} ignoring snapshot in {:?}", self.group_id, self.state);
            return None;
        }

        let (points, dropped) = parse_snapshot(snapshot);
        self.stats.dropped_rows += dropped as u64;

        if points.is_empty() {
            self.stats.discarded += 1;
            if self.state == GroupState::Ready {
                warn!(
                    "Group {} snapshot had no usable rows, keeping previous term structure",
                    self.group_id
                );
            } else {
                debug!("Group {} snapshot had no usable rows", self.group_id);
            }
            return None;
        }

        let term_structure = Arc::new(TermStructure::from_points(points));
        if self.state == GroupState::Subscribing {
            info!(
                "Group {} ready with {} points",
                self.group_id,
                term_structure.len()
            );
        }
        self.state = GroupState::Ready;
        self.stats.applied += 1;
        self.term_structure = Some(Arc::clone(&term_structure));

        Some(EngineEvent::GroupUpdated {
            group_id: self.group_id.clone(),
            term_structure,
        })
    }

    /// The subscribe call was rejected.
    pub fn on_subscribe_failed(&mut self, reason: &str) -> Option<EngineEvent> {
        self.fail(format!("subscribe failed: {reason}"))
    }

    /// The snapshot stream ended.
    pub fn on_feed_closed(&mut self) -> Option<EngineEvent> {
        let reason = if self.state == GroupState::Ready {
            "feed lost"
        } else {
            "feed closed before any usable snapshot"
        };
        self.fail(reason.to_string())
    }

    fn fail(&mut self, reason: String) -> Option<EngineEvent> {
        if self.state == GroupState::Failed {
            return None;
        }
        warn!("Group {} failed: {}", self.group_id, reason);

        self.state = GroupState::Failed;
        self.term_structure = None;
        self.failure = Some(reason.clone());
        if let Some(task) = self.task.take() {
            task.abort();
        }

        Some(EngineEvent::GroupFailed {
            group_id: self.group_id.clone(),
            reason,
        })
    }

    /// Unregister from the feed, then stop the feed task.
    ///
    /// The task is stopped even when the feed rejects the unsubscribe; the
    /// rejection is returned so the owner can count it.
    pub fn teardown(&mut self, feed: &dyn GroupFeedCollaborator) -> Result<(), TraitError> {
        let result = feed.unsubscribe(&self.group_id);
        if let Err(e) = &result {
            error!("Failed to unsubscribe group {}: {}", self.group_id, e);
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        result
    }
}

impl Drop for GroupSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

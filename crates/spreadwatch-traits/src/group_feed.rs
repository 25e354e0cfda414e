//! Per-group term-structure feed.
//!
//! A group feed is a two-phase protocol: enumerate the group's constituents,
//! then subscribe to their fields. Each delivered [`Snapshot`] is one full
//! replacement of the group's values.
//!
//! The stream behind a [`SnapshotReceiver`] ending is the collaborator's
//! signal that the feed is lost for good.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::TraitError;
use crate::ids::{ConstituentKey, GroupId};

/// Default fields requested for every constituent.
pub const DEFAULT_CURVE_FIELDS: [&str; 2] = ["TENOR", "RATE"];

/// Raw values for one constituent inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRow {
    /// Constituent the values belong to
    pub constituent: ConstituentKey,
    /// Raw tenor value
    pub tenor: String,
    /// Raw rate value (percent)
    pub rate: String,
}

impl SnapshotRow {
    /// Create a row from raw values.
    pub fn new(
        constituent: impl Into<ConstituentKey>,
        tenor: impl Into<String>,
        rate: impl Into<String>,
    ) -> Self {
        Self {
            constituent: constituent.into(),
            tenor: tenor.into(),
            rate: rate.into(),
        }
    }
}

/// One full snapshot of a group's constituents, in feed order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Rows in feed order
    pub rows: Vec<SnapshotRow>,
}

impl Snapshot {
    /// Create a snapshot from rows.
    pub fn new(rows: Vec<SnapshotRow>) -> Self {
        Self { rows }
    }

    /// Build a snapshot from `(tenor, rate)` pairs, using the tenor as the
    /// constituent key.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            rows: pairs
                .into_iter()
                .map(|(tenor, rate)| SnapshotRow::new(tenor, tenor, rate))
                .collect(),
        }
    }
}

/// Receiver for streaming snapshots of one group.
#[derive(Debug)]
pub struct SnapshotReceiver {
    rx: mpsc::Receiver<Snapshot>,
}

impl SnapshotReceiver {
    /// Create a new snapshot receiver.
    pub fn new(rx: mpsc::Receiver<Snapshot>) -> Self {
        Self { rx }
    }

    /// Receive the next snapshot. `None` means the feed is gone.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }
}

/// Trait for per-group term-structure feed providers.
#[async_trait]
pub trait GroupFeedCollaborator: Send + Sync {
    /// List the constituents of a group (e.g. the pillars of a currency curve).
    async fn enumerate(&self, group_id: &GroupId) -> Result<Vec<ConstituentKey>, TraitError>;

    /// Subscribe to `fields` of the given constituents.
    async fn subscribe(
        &self,
        group_id: &GroupId,
        constituents: &[ConstituentKey],
        fields: &[String],
    ) -> Result<SnapshotReceiver, TraitError>;

    /// Release the group's subscription on the collaborator side.
    ///
    /// Called synchronously during teardown, before the receiver is dropped.
    fn unsubscribe(&self, _group_id: &GroupId) -> Result<(), TraitError> {
        Ok(())
    }
}

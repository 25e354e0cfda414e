//! Messages flowing into the event loop and events flowing out of it.
//!
//! Feed tasks push [`FeedMessage`]s into one bounded queue. The hub and the
//! key subscription turn them into [`EngineEvent`]s, which the orchestrator
//! consumes once. Recompute outcomes leave the engine as [`SpreadResult`]s.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use spreadwatch_traits::group_feed::Snapshot;
use spreadwatch_traits::price_feed::PriceTick;
use spreadwatch_traits::term_structure::TermStructure;
use spreadwatch_traits::{ConstituentKey, GroupId, InstrumentKey, TraitError};

// =============================================================================
// INBOUND
// =============================================================================

/// Completion of an asynchronous group-feed step.
#[derive(Debug, Clone)]
pub enum GroupMessage {
    /// Constituent enumeration finished
    Enumerated {
        /// Group
        group_id: GroupId,
        /// Constituents, or the collaborator's error
        result: Result<Vec<ConstituentKey>, TraitError>,
    },
    /// A snapshot arrived
    Snapshot {
        /// Group
        group_id: GroupId,
        /// Raw snapshot
        snapshot: Snapshot,
    },
    /// The subscribe call was rejected
    SubscribeFailed {
        /// Group
        group_id: GroupId,
        /// Collaborator's reason
        reason: String,
    },
    /// The snapshot stream ended
    FeedClosed {
        /// Group
        group_id: GroupId,
    },
}

impl GroupMessage {
    /// Group the message belongs to.
    pub fn group_id(&self) -> &GroupId {
        match self {
            GroupMessage::Enumerated { group_id, .. }
            | GroupMessage::Snapshot { group_id, .. }
            | GroupMessage::SubscribeFailed { group_id, .. }
            | GroupMessage::FeedClosed { group_id } => group_id,
        }
    }
}

/// Anything a feed task can deliver to the event loop.
#[derive(Debug, Clone)]
pub enum FeedMessage {
    /// Group-feed progress
    Group(GroupMessage),
    /// Raw price tick
    Price(PriceTick),
    /// The price stream ended
    PriceFeedClosed,
}

// =============================================================================
// BUS EVENTS
// =============================================================================

/// Hub-level and key-level events, consumed once by the orchestrator.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A group has a new term structure
    GroupUpdated {
        /// Group
        group_id: GroupId,
        /// Replacement term structure
        term_structure: Arc<TermStructure>,
    },
    /// A group will never deliver data
    GroupFailed {
        /// Group
        group_id: GroupId,
        /// Why
        reason: String,
    },
    /// An instrument has a new price
    PriceUpdated {
        /// Instrument
        key: InstrumentKey,
        /// Parsed price
        price: Decimal,
    },
}

// =============================================================================
// RESULTS
// =============================================================================

/// Outcome of one recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadOutcome {
    /// Spread in basis points
    Value(f64),
    /// Recompute failed; the previous value is kept on the instrument
    Failed(String),
}

impl SpreadOutcome {
    /// The value, if the recompute succeeded.
    pub fn value(&self) -> Option<f64> {
        match self {
            SpreadOutcome::Value(v) => Some(*v),
            SpreadOutcome::Failed(_) => None,
        }
    }
}

/// One entry on the result stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadResult {
    /// Instrument
    pub key: InstrumentKey,
    /// Value or failure reason
    pub outcome: SpreadOutcome,
    /// When the recompute ran
    pub timestamp: DateTime<Utc>,
}

//! Engine error types.

use thiserror::Error;

use spreadwatch_traits::{GroupId, InstrumentKey, TraitError};

/// A specialized Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type.
///
/// Only startup failures and API misuse surface as errors. Malformed
/// feed input, group failures and recompute failures are recorded, not raised.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The one-shot search phase failed
    #[error("search failed: {0}")]
    SearchFailed(TraitError),

    /// The one-shot reference-data phase failed
    #[error("reference data fetch failed: {0}")]
    ReferenceFailed(TraitError),

    /// A feed subscription could not be established
    #[error("subscription failed: {0}")]
    SubscriptionFailed(String),

    /// The group failed earlier and is not retried
    #[error("group unavailable: {0}")]
    GroupUnavailable(GroupId),

    /// The price key set was already registered
    #[error("price keys already subscribed")]
    AlreadySubscribed,

    /// Price for a key the store does not hold
    #[error("unknown instrument key: {0}")]
    UnknownKey(InstrumentKey),

    /// `start` called more than once
    #[error("orchestrator already started")]
    AlreadyStarted,

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TraitError> for EngineError {
    fn from(e: TraitError) -> Self {
        EngineError::SubscriptionFailed(e.to_string())
    }
}

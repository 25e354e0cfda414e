//! Multiplexed per-instrument price feed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::TraitError;
use crate::ids::InstrumentKey;

/// Raw price tick as delivered by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Instrument key
    pub key: InstrumentKey,
    /// Raw price value
    pub raw_price: String,
}

impl PriceTick {
    /// Create a new tick.
    pub fn new(key: impl Into<InstrumentKey>, raw_price: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            raw_price: raw_price.into(),
        }
    }
}

/// Receiver for streaming price ticks.
#[derive(Debug)]
pub struct PriceReceiver {
    rx: mpsc::Receiver<PriceTick>,
}

impl PriceReceiver {
    /// Create a new price receiver.
    pub fn new(rx: mpsc::Receiver<PriceTick>) -> Self {
        Self { rx }
    }

    /// Receive the next tick. `None` means the feed is gone.
    pub async fn recv(&mut self) -> Option<PriceTick> {
        self.rx.recv().await
    }
}

/// Trait for price feed providers.
#[async_trait]
pub trait PriceFeedCollaborator: Send + Sync {
    /// Subscribe to prices for a fixed key set.
    async fn subscribe(&self, keys: &[InstrumentKey]) -> Result<PriceReceiver, TraitError>;

    /// Release the subscription on the collaborator side.
    fn unsubscribe(&self, _keys: &[InstrumentKey]) -> Result<(), TraitError> {
        Ok(())
    }
}

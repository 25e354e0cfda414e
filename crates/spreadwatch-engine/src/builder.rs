//! Builder pattern for the orchestrator.

use std::sync::Arc;

use tokio::sync::mpsc;

use spreadwatch_traits::bond_math::BondMath;
use spreadwatch_traits::config::EngineConfig;
use spreadwatch_traits::group_feed::GroupFeedCollaborator;
use spreadwatch_traits::price_feed::PriceFeedCollaborator;
use spreadwatch_traits::reference_data::ReferenceCollaborator;
use spreadwatch_traits::search::SearchCollaborator;

use crate::clock::{Clock, SystemClock};
use crate::error::EngineError;
use crate::hub::GroupHub;
use crate::key_subscription::KeySubscription;
use crate::orchestrator::Orchestrator;
use crate::recompute::RecomputeEngine;

/// Builder for constructing an [`Orchestrator`].
pub struct OrchestratorBuilder {
    config: Option<EngineConfig>,
    search: Option<Arc<dyn SearchCollaborator>>,
    reference: Option<Arc<dyn ReferenceCollaborator>>,
    group_feed: Option<Arc<dyn GroupFeedCollaborator>>,
    price_feed: Option<Arc<dyn PriceFeedCollaborator>>,
    bond_math: Option<Arc<dyn BondMath>>,
    clock: Option<Arc<dyn Clock>>,
}

impl OrchestratorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: None,
            search: None,
            reference: None,
            group_feed: None,
            price_feed: None,
            bond_math: None,
            clock: None,
        }
    }

    /// Set the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the search collaborator.
    pub fn with_search(mut self, search: Arc<dyn SearchCollaborator>) -> Self {
        self.search = Some(search);
        self
    }

    /// Set the reference-data collaborator.
    pub fn with_reference_data(mut self, reference: Arc<dyn ReferenceCollaborator>) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Set the group (term-structure) feed.
    pub fn with_group_feed(mut self, feed: Arc<dyn GroupFeedCollaborator>) -> Self {
        self.group_feed = Some(feed);
        self
    }

    /// Set the price feed.
    pub fn with_price_feed(mut self, feed: Arc<dyn PriceFeedCollaborator>) -> Self {
        self.price_feed = Some(feed);
        self
    }

    /// Set the bond math.
    pub fn with_bond_math(mut self, math: Arc<dyn BondMath>) -> Self {
        self.bond_math = Some(math);
        self
    }

    /// Set the clock (defaults to [`SystemClock`]).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the orchestrator.
    pub fn build(self) -> Result<Orchestrator, EngineError> {
        let config = self.config.unwrap_or_default();
        config.validate().map_err(EngineError::ConfigError)?;

        let search = self
            .search
            .ok_or_else(|| EngineError::ConfigError("search not configured".into()))?;

        let reference = self
            .reference
            .ok_or_else(|| EngineError::ConfigError("reference_data not configured".into()))?;

        let group_feed = self
            .group_feed
            .ok_or_else(|| EngineError::ConfigError("group_feed not configured".into()))?;

        let price_feed = self
            .price_feed
            .ok_or_else(|| EngineError::ConfigError("price_feed not configured".into()))?;

        let bond_math = self
            .bond_math
            .ok_or_else(|| EngineError::ConfigError("bond_math not configured".into()))?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let (events_tx, events_rx) = mpsc::channel(config.event_buffer);
        let hub = GroupHub::new(group_feed, events_tx.clone(), config.curve_fields.clone());
        let prices = KeySubscription::new(price_feed, events_tx);

        Ok(Orchestrator::new(
            config,
            search,
            reference,
            hub,
            prices,
            RecomputeEngine::new(bond_math),
            clock,
            events_rx,
        ))
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spreadwatch_analytics::GSpreadMath;
    use spreadwatch_ext_file::{MemoryGroupFeed, MemoryPriceFeed, MemoryReference, MemorySearch};

    fn complete() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
            .with_search(Arc::new(MemorySearch::new(Vec::<&str>::new())))
            .with_reference_data(Arc::new(MemoryReference::new(Vec::new())))
            .with_group_feed(Arc::new(MemoryGroupFeed::new()))
            .with_price_feed(Arc::new(MemoryPriceFeed::new()))
            .with_bond_math(Arc::new(GSpreadMath::default()))
    }

    #[test]
    fn test_build_with_all_collaborators() {
        let orchestrator = complete().build();
        assert!(orchestrator.is_ok());
    }

    #[test]
    fn test_missing_price_feed_is_a_config_error() {
        let builder = OrchestratorBuilder::new()
            .with_search(Arc::new(MemorySearch::new(Vec::<&str>::new())))
            .with_reference_data(Arc::new(MemoryReference::new(Vec::new())))
            .with_group_feed(Arc::new(MemoryGroupFeed::new()))
            .with_bond_math(Arc::new(GSpreadMath::default()));

        assert!(matches!(
            builder.build(),
            Err(EngineError::ConfigError(msg)) if msg.contains("price_feed")
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EngineConfig {
            result_buffer: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            complete().with_config(config).build(),
            Err(EngineError::ConfigError(_))
        ));
    }
}

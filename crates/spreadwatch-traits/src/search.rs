//! One-shot instrument search.
//!
//! The search collaborator resolves the instrument universe once at startup.
//! Ranking and paging belong to the collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TraitError;
use crate::ids::InstrumentKey;

/// Search criteria passed through to the collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Free-text filter (collaborator-defined matching)
    pub text: Option<String>,
    /// Restrict to these currency codes (empty = all)
    pub currencies: Vec<String>,
    /// Maximum number of keys to return
    pub max_results: Option<usize>,
}

impl SearchCriteria {
    /// Criteria matching everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a set of currencies.
    pub fn with_currencies<I, S>(mut self, currencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.currencies = currencies.into_iter().map(Into::into).collect();
        self
    }

    /// Set a free-text filter.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Cap the number of results.
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }
}

/// Trait for search providers.
#[async_trait]
pub trait SearchCollaborator: Send + Sync {
    /// Run the search once and return matching instrument keys.
    async fn query(&self, criteria: &SearchCriteria) -> Result<Vec<InstrumentKey>, TraitError>;
}

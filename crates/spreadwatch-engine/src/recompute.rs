//! Stateless bridge from an instrument's accumulated inputs to the bond math.

use std::sync::Arc;

use tracing::trace;

use spreadwatch_traits::bond_math::BondMath;
use spreadwatch_traits::term_structure::TermStructure;

use crate::events::SpreadOutcome;
use crate::store::Instrument;

/// Computes the spread for one instrument. Holds no per-instrument state.
#[derive(Clone)]
pub struct RecomputeEngine {
    math: Arc<dyn BondMath>,
}

impl RecomputeEngine {
    /// Wrap a bond-math implementation.
    pub fn new(math: Arc<dyn BondMath>) -> Self {
        Self { math }
    }

    /// The bond math in use.
    pub fn math(&self) -> &dyn BondMath {
        self.math.as_ref()
    }

    /// Compute the spread. Missing inputs and math failures become
    /// [`SpreadOutcome::Failed`]; nothing here returns an error.
    pub fn compute(&self, instrument: &Instrument, term_structure: &TermStructure) -> SpreadOutcome {
        let Some(price) = instrument.price else {
            return SpreadOutcome::Failed("no price".to_string());
        };
        let Some(maturity) = instrument.maturity else {
            return SpreadOutcome::Failed("maturity unavailable".to_string());
        };
        let Some(settlement) = instrument.settlement else {
            return SpreadOutcome::Failed("settlement date unavailable".to_string());
        };

        let outcome = match self.math.spread(
            settlement,
            term_structure,
            price,
            maturity,
            instrument.coupon,
            instrument.structure_code.as_deref(),
        ) {
            Ok(bps) => SpreadOutcome::Value(bps),
            Err(failure) => SpreadOutcome::Failed(failure.reason),
        };
        trace!("Recomputed {}: {:?}", instrument.key, outcome);
        outcome
    }
}

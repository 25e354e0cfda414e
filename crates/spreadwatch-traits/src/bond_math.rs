//! Pure bond-math functions supplied to the engine.
//!
//! The engine never does numerical work itself; it calls a [`BondMath`]
//! implementation with the inputs it has accumulated for an instrument.

use rust_decimal::Decimal;
use thiserror::Error;

use spreadwatch_core::Date;

use crate::term_structure::TermStructure;

/// Reason a spread could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct SpreadFailure {
    /// Human-readable reason
    pub reason: String,
}

impl SpreadFailure {
    /// Create a new failure.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Settlement and spread functions.
///
/// Implementations must be pure: same inputs, same output, no side effects.
pub trait BondMath: Send + Sync {
    /// Settlement date for a trade done `today`.
    fn settlement_date(&self, today: Date, structure_code: Option<&str>, maturity: Date) -> Date;

    /// Spread in basis points of the bond over the term structure.
    fn spread(
        &self,
        settlement: Date,
        term_structure: &TermStructure,
        price: Decimal,
        maturity: Date,
        coupon: Decimal,
        structure_code: Option<&str>,
    ) -> Result<f64, SpreadFailure>;
}

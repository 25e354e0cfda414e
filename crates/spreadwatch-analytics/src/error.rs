//! Error types for the analytics functions.

use thiserror::Error;

use spreadwatch_traits::bond_math::SpreadFailure;

/// A specialized Result type for analytics operations.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// Errors raised by the bond-math functions.
#[derive(Error, Debug, Clone)]
pub enum AnalyticsError {
    /// Settlement is on or after maturity.
    #[error("Invalid settlement {settlement}: on or after maturity {maturity}")]
    InvalidSettlement {
        /// Settlement date
        settlement: String,
        /// Maturity date
        maturity: String,
    },

    /// The benchmark term structure has no points.
    #[error("Benchmark term structure is empty")]
    EmptyCurve,

    /// Price is unusable.
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Other invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Root finder did not converge.
    #[error("Convergence failed after {iterations} iterations (residual: {residual:.2e})")]
    ConvergenceFailed {
        /// Number of iterations attempted
        iterations: u32,
        /// Final residual value
        residual: f64,
    },

    /// Root is not bracketed.
    #[error("Invalid bracket: f({a}) = {fa:.2e} and f({b}) = {fb:.2e} have same sign")]
    InvalidBracket {
        /// Lower bound
        a: f64,
        /// Upper bound
        b: f64,
        /// Function value at a
        fa: f64,
        /// Function value at b
        fb: f64,
    },
}

impl From<AnalyticsError> for SpreadFailure {
    fn from(e: AnalyticsError) -> Self {
        SpreadFailure::new(e.to_string())
    }
}

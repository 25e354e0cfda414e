//! # Spreadwatch Analytics
//!
//! Default [`BondMath`](spreadwatch_traits::bond_math::BondMath) implementation
//! for the Spreadwatch engine.
//!
//! - [`conventions`]: Settlement lag and coupon frequency per structure code
//! - [`solver`]: Brent root finder
//! - [`yields`]: Clean price to yield-to-maturity
//! - [`gspread`]: Spread over an interpolated benchmark term structure
//!
//! ## Example
//!
//! ```rust
//! use rust_decimal_macros::dec;
//! use spreadwatch_analytics::GSpreadMath;
//! use spreadwatch_core::{Date, Tenor};
//! use spreadwatch_traits::bond_math::BondMath;
//! use spreadwatch_traits::term_structure::{TermPoint, TermStructure};
//!
//! let math = GSpreadMath::default();
//! let curve = TermStructure::from_points(vec![TermPoint::new(Tenor::Years(5), dec!(4.0))]);
//! let maturity = Date::from_ymd(2030, 6, 15).unwrap();
//! let settle = Date::from_ymd(2025, 6, 17).unwrap();
//!
//! let bps = math
//!     .spread(settle, &curve, dec!(100), maturity, dec!(5.0), None)
//!     .unwrap();
//! assert!(bps > 90.0 && bps < 110.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod conventions;
pub mod error;
pub mod gspread;
pub mod solver;
pub mod yields;

pub use conventions::{Convention, ConventionConfig, MAX_SETTLEMENT_DAYS};
pub use error::{AnalyticsError, AnalyticsResult};
pub use gspread::GSpreadMath;

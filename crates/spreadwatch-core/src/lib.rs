//! # Spreadwatch Core
//!
//! Domain primitives shared by every Spreadwatch crate.
//!
//! - **Types**: [`Date`] for settlement and maturity arithmetic, [`Tenor`] for
//!   term-structure pillars
//! - **Errors**: [`CoreError`] for invalid dates and tenors
//!
//! ## Example
//!
//! ```rust
//! use spreadwatch_core::prelude::*;
//!
//! let trade = Date::from_ymd(2025, 6, 13).unwrap();
//! let settle = trade.add_business_days(2);
//! assert_eq!(settle, Date::from_ymd(2025, 6, 17).unwrap());
//!
//! let tenor = Tenor::parse("6M").unwrap();
//! assert!((tenor.years() - 0.5).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod error;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use types::{Date, Tenor};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::types::{Date, Tenor};
}

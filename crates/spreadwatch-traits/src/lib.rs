//! # Spreadwatch Traits
//!
//! Trait definitions for the external collaborators of the Spreadwatch engine.
//!
//! This crate contains trait definitions and the plain value types that cross
//! them. Implementations live in extension crates.
//!
//! ## Module Structure
//!
//! - [`search`]: One-shot instrument search
//! - [`reference_data`]: One-shot bulk reference-data fetch
//! - [`group_feed`]: Per-group term-structure feeds (enumerate, then subscribe)
//! - [`price_feed`]: Multiplexed per-instrument price feed
//! - [`bond_math`]: Pure settlement and spread functions
//! - [`term_structure`]: Parsed (tenor, rate) curve snapshot
//! - [`config`]: Engine configuration
//!
//! ## Dependency Injection
//!
//! ```ignore
//! OrchestratorBuilder::new()
//!     .with_search(impl SearchCollaborator)
//!     .with_reference_data(impl ReferenceCollaborator)
//!     .with_group_feed(impl GroupFeedCollaborator)
//!     .with_price_feed(impl PriceFeedCollaborator)
//!     .with_bond_math(impl BondMath)
//!     .build()
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bond_math;
pub mod config;
pub mod error;
pub mod group_feed;
pub mod ids;
pub mod price_feed;
pub mod reference_data;
pub mod search;
pub mod term_structure;

// Re-export commonly used types
pub use error::TraitError;
pub use ids::*;

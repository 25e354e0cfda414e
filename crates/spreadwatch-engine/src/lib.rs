//! # Spreadwatch Engine
//!
//! Event aggregation and incremental recompute for spreads over currency
//! term structures.
//!
//! This crate provides:
//! - [`EntityStore`]: Instruments and their accumulated partial state
//! - [`GroupSubscription`]: Per-group `Requesting -> Subscribing -> Ready | Failed` machine
//! - [`GroupHub`]: Lazily created group subscriptions behind one event stream
//! - [`KeySubscription`]: One multiplexed price subscription
//! - [`RecomputeEngine`]: Stateless call into the bond math
//! - [`Orchestrator`]: The event loop tying it together
//!
//! ## Architecture
//!
//! ```text
//! Search ─> Reference ─> EntityStore ─┬─> GroupHub ─┬─> GroupSubscription (USD)
//!                                     │             └─> GroupSubscription (EUR) ...
//!                                     └─> KeySubscription
//!
//! feed tasks ─> mpsc ─> Orchestrator ─> EngineEvent ─> RecomputeEngine ─> SpreadResult (broadcast)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut orchestrator = OrchestratorBuilder::new()
//!     .with_search(search)
//!     .with_reference_data(reference)
//!     .with_group_feed(curves)
//!     .with_price_feed(prices)
//!     .with_bond_math(Arc::new(GSpreadMath::default()))
//!     .build()?;
//!
//! let mut results = orchestrator.subscribe_results();
//! orchestrator.start(&SearchCriteria::all()).await?;
//! orchestrator.run().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod clock;
pub mod error;
pub mod events;
pub mod hub;
pub mod key_subscription;
pub mod orchestrator;
pub mod recompute;
pub mod store;
pub mod subscription;

// Re-exports
pub use builder::OrchestratorBuilder;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, FeedMessage, GroupMessage, SpreadOutcome, SpreadResult};
pub use hub::{GroupHub, HubStats};
pub use key_subscription::{KeyStats, KeySubscription};
pub use orchestrator::{Diagnostics, Orchestrator, OrchestratorState, ShutdownHandle, StartSummary};
pub use recompute::RecomputeEngine;
pub use store::{EntityStore, Instrument, InstrumentStatus, StoreStats, UpsertSummary};
pub use subscription::{GroupState, GroupSubscription, SnapshotStats};

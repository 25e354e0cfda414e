//! Working set of instruments and their accumulated partial state.
//!
//! The store is the only owner of [`Instrument`] records and the source of
//! truth for group membership. It is mutated from the event loop only, so it
//! holds plain collections and no locks.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use spreadwatch_core::Date;
use spreadwatch_traits::bond_math::BondMath;
use spreadwatch_traits::config::DuplicatePolicy;
use spreadwatch_traits::reference_data::{is_sentinel, ReferenceRecord};
use spreadwatch_traits::{GroupId, InstrumentKey};

use crate::error::{EngineError, EngineResult};
use crate::events::SpreadOutcome;

// =============================================================================
// INSTRUMENT
// =============================================================================

/// Status of the last recompute.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentStatus {
    /// Never recomputed
    #[default]
    Pending,
    /// Last recompute succeeded
    Ok,
    /// Last recompute failed
    Failed(String),
}

/// One instrument and everything known about it so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// Unique key
    pub key: InstrumentKey,
    /// Curve group, fixed at creation
    pub group_id: GroupId,
    /// Description
    pub description: String,
    /// Annual coupon in percent
    pub coupon: Decimal,
    /// Maturity, if the reference data had a usable one
    pub maturity: Option<Date>,
    /// Structure code, if present
    pub structure_code: Option<String>,
    /// Settlement date of the last ready price
    pub settlement: Option<Date>,
    /// Last price
    pub price: Option<Decimal>,
    /// Last successfully computed spread (bps)
    pub analytic: Option<f64>,
    /// Last recompute status
    pub status: InstrumentStatus,
    /// Time of the last recompute
    pub last_updated: Option<DateTime<Utc>>,
}

impl Instrument {
    /// Build an instrument from a raw reference record.
    ///
    /// Returns `None` when the key, coupon or currency is unusable.
    pub fn from_record<S: AsRef<str>>(record: &ReferenceRecord, sentinels: &[S]) -> Option<Self> {
        let usable = |v: &str| !is_sentinel(v, sentinels);

        let key = record.key.trim();
        if !usable(key) {
            return None;
        }
        if !usable(&record.currency) {
            return None;
        }
        if !usable(&record.coupon) {
            return None;
        }
        let coupon = Decimal::from_str(record.coupon.trim()).ok()?;

        let maturity = if usable(&record.maturity) {
            match Date::parse(&record.maturity) {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!("Instrument {} has unusable maturity: {}", key, e);
                    None
                }
            }
        } else {
            None
        };
        let structure_code = usable(&record.structure_code)
            .then(|| record.structure_code.trim().to_string());

        Some(Self {
            key: InstrumentKey::new(key),
            group_id: GroupId::currency(&record.currency),
            description: record.description.trim().to_string(),
            coupon,
            maturity,
            structure_code,
            settlement: None,
            price: None,
            analytic: None,
            status: InstrumentStatus::Pending,
            last_updated: None,
        })
    }

    /// True once a price has arrived.
    pub fn has_price(&self) -> bool {
        self.price.is_some()
    }
}

// =============================================================================
// STATISTICS
// =============================================================================

/// Store counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Instruments inserted
    pub inserted: u64,
    /// Instruments whose static fields were replaced
    pub replaced: u64,
    /// Records dropped for an unusable key, coupon or currency
    pub dropped_malformed: u64,
    /// Records for known keys that were ignored
    pub duplicates: u64,
    /// Replacements rejected because they named a different group
    pub group_conflicts: u64,
    /// Prices for keys the store does not hold
    pub unknown_price_keys: u64,
}

/// What one reference batch did to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    /// New instruments
    pub inserted: usize,
    /// Replaced instruments
    pub replaced: usize,
    /// Dropped records
    pub dropped: usize,
    /// Ignored duplicates (including group conflicts)
    pub duplicates: usize,
}

// =============================================================================
// ENTITY STORE
// =============================================================================

/// Owner of all instrument records.
#[derive(Debug, Default)]
pub struct EntityStore {
    instruments: HashMap<InstrumentKey, Instrument>,
    /// Group membership in insertion order
    groups: HashMap<GroupId, Vec<InstrumentKey>>,
    /// Group ids in first-seen order
    group_order: Vec<GroupId>,
    stats: StoreStats,
}

impl EntityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert instruments from a reference batch.
    ///
    /// Malformed records are dropped one by one and counted; the batch never
    /// fails as a whole.
    pub fn upsert_from_reference<S: AsRef<str>>(
        &mut self,
        records: &[ReferenceRecord],
        sentinels: &[S],
        policy: DuplicatePolicy,
    ) -> UpsertSummary {
        let mut summary = UpsertSummary::default();

        for record in records {
            let Some(instrument) = Instrument::from_record(record, sentinels) else {
                debug!("Dropping malformed reference record {:?}", record.key);
                self.stats.dropped_malformed += 1;
                summary.dropped += 1;
                continue;
            };

            match self.instruments.get_mut(&instrument.key) {
                None => {
                    self.insert(instrument);
                    self.stats.inserted += 1;
                    summary.inserted += 1;
                }
                Some(_) if policy == DuplicatePolicy::Ignore => {
                    debug!("Ignoring duplicate reference record {}", instrument.key);
                    self.stats.duplicates += 1;
                    summary.duplicates += 1;
                }
                Some(existing) if existing.group_id != instrument.group_id => {
                    warn!(
                        "Rejecting replacement of {}: group {} differs from {}",
                        instrument.key, instrument.group_id, existing.group_id
                    );
                    self.stats.group_conflicts += 1;
                    summary.duplicates += 1;
                }
                Some(existing) => {
                    existing.description = instrument.description;
                    existing.coupon = instrument.coupon;
                    existing.maturity = instrument.maturity;
                    existing.structure_code = instrument.structure_code;
                    self.stats.replaced += 1;
                    summary.replaced += 1;
                }
            }
        }

        summary
    }

    fn insert(&mut self, instrument: Instrument) {
        let members = self.groups.entry(instrument.group_id.clone()).or_default();
        if members.is_empty() {
            self.group_order.push(instrument.group_id.clone());
        }
        members.push(instrument.key.clone());
        self.instruments.insert(instrument.key.clone(), instrument);
    }

    /// Record a price.
    ///
    /// The settlement date is refreshed only when `group_ready` is set.
    /// Returns whether the instrument is now eligible for recompute.
    pub fn apply_price(
        &mut self,
        key: &InstrumentKey,
        price: Decimal,
        group_ready: bool,
        math: &dyn BondMath,
        today: Date,
    ) -> EngineResult<bool> {
        let Some(instrument) = self.instruments.get_mut(key) else {
            self.stats.unknown_price_keys += 1;
            return Err(EngineError::UnknownKey(key.clone()));
        };

        instrument.price = Some(price);
        if group_ready {
            Self::settle(instrument, math, today);
        }
        Ok(group_ready)
    }

    /// Refresh the settlement date ahead of a recompute.
    pub fn refresh_settlement(&mut self, key: &InstrumentKey, math: &dyn BondMath, today: Date) {
        if let Some(instrument) = self.instruments.get_mut(key) {
            Self::settle(instrument, math, today);
        }
    }

    fn settle(instrument: &mut Instrument, math: &dyn BondMath, today: Date) {
        if let Some(maturity) = instrument.maturity {
            instrument.settlement = Some(math.settlement_date(
                today,
                instrument.structure_code.as_deref(),
                maturity,
            ));
        }
    }

    /// Store a recompute outcome.
    ///
    /// Success always overwrites the previous value; failure keeps it.
    pub fn record(&mut self, key: &InstrumentKey, outcome: &SpreadOutcome, at: DateTime<Utc>) {
        let Some(instrument) = self.instruments.get_mut(key) else {
            return;
        };
        match outcome {
            SpreadOutcome::Value(bps) => {
                instrument.analytic = Some(*bps);
                instrument.status = InstrumentStatus::Ok;
            }
            SpreadOutcome::Failed(reason) => {
                instrument.status = InstrumentStatus::Failed(reason.clone());
            }
        }
        instrument.last_updated = Some(at);
    }

    /// Instruments currently in `group_id`.
    ///
    /// The iterator borrows the store, so the store cannot be mutated until it
    /// is dropped. Use [`keys_in_group`](Self::keys_in_group) to mutate while
    /// walking a group.
    pub fn by_group<'a>(&'a self, group_id: &GroupId) -> impl Iterator<Item = &'a Instrument> + 'a {
        self.groups
            .get(group_id)
            .into_iter()
            .flatten()
            .filter_map(|key| self.instruments.get(key))
    }

    /// Snapshot of the keys currently in `group_id`.
    pub fn keys_in_group(&self, group_id: &GroupId) -> Vec<InstrumentKey> {
        self.groups.get(group_id).cloned().unwrap_or_default()
    }

    /// Look up an instrument.
    pub fn get(&self, key: &InstrumentKey) -> Option<&Instrument> {
        self.instruments.get(key)
    }

    /// Group of an instrument.
    pub fn group_of(&self, key: &InstrumentKey) -> Option<&GroupId> {
        self.instruments.get(key).map(|i| &i.group_id)
    }

    /// All keys, grouped, in insertion order.
    pub fn keys(&self) -> Vec<InstrumentKey> {
        self.group_order
            .iter()
            .flat_map(|g| self.keys_in_group(g))
            .collect()
    }

    /// Distinct groups in first-seen order.
    pub fn group_ids(&self) -> &[GroupId] {
        &self.group_order
    }

    /// All instruments, grouped, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.group_order.iter().flat_map(|g| self.by_group(g))
    }

    /// Number of instruments.
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// True if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Counters.
    pub fn stats(&self) -> StoreStats {
        self.stats
    }
}

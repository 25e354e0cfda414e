//! File-based curve and price feeds.
//!
//! Both feeds deliver their file contents once at subscribe time and then
//! keep the stream open until unsubscribed, like a live feed that has gone
//! quiet.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::mpsc;

use spreadwatch_traits::error::TraitError;
use spreadwatch_traits::group_feed::{GroupFeedCollaborator, Snapshot, SnapshotReceiver, SnapshotRow};
use spreadwatch_traits::ids::*;
use spreadwatch_traits::price_feed::{PriceFeedCollaborator, PriceReceiver, PriceTick};

/// Renders a JSON scalar the way a feed would deliver it: strings verbatim,
/// everything else in its JSON text form.
fn raw_value(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

// =============================================================================
// JSON CURVE FEED
// =============================================================================

#[derive(Deserialize)]
struct CurveData {
    group: String,
    points: Vec<PointData>,
}

#[derive(Deserialize)]
struct PointData {
    #[serde(default)]
    constituent: Option<String>,
    tenor: serde_json::Value,
    rate: serde_json::Value,
}

/// JSON-backed group feed.
///
/// ```json
/// [{"group": "USD", "points": [{"constituent": "USGG1YR", "tenor": "1Y", "rate": 4.1}]}]
/// ```
///
/// Constituents default to the tenor text. A group absent from the file
/// enumerates to nothing.
pub struct JsonCurveFeed {
    file_path: PathBuf,
    rows: DashMap<GroupId, Vec<SnapshotRow>>,
    streams: DashMap<GroupId, mpsc::Sender<Snapshot>>,
}

impl JsonCurveFeed {
    /// Load a JSON curve file. A missing file is an empty feed.
    pub fn new(file_path: impl AsRef<Path>) -> Result<Self, TraitError> {
        let feed = Self {
            file_path: file_path.as_ref().to_path_buf(),
            rows: DashMap::new(),
            streams: DashMap::new(),
        };
        feed.reload()?;
        Ok(feed)
    }

    /// Reload rows from file. Open streams are not re-sent.
    pub fn reload(&self) -> Result<(), TraitError> {
        if !self.file_path.exists() {
            return Ok(()); // Empty source
        }

        let content = std::fs::read_to_string(&self.file_path)?;
        let curves: Vec<CurveData> =
            serde_json::from_str(&content).map_err(|e| TraitError::ParseError(e.to_string()))?;

        self.rows.clear();
        for curve in curves {
            let rows = curve
                .points
                .into_iter()
                .map(|p| {
                    let tenor = raw_value(p.tenor);
                    let constituent = p.constituent.unwrap_or_else(|| tenor.clone());
                    SnapshotRow::new(constituent, tenor, raw_value(p.rate))
                })
                .collect();
            self.rows.insert(GroupId::currency(&curve.group), rows);
        }

        Ok(())
    }

    /// Groups present in the file.
    pub fn groups(&self) -> Vec<GroupId> {
        let mut groups: Vec<GroupId> = self.rows.iter().map(|e| e.key().clone()).collect();
        groups.sort();
        groups
    }
}

#[async_trait]
impl GroupFeedCollaborator for JsonCurveFeed {
    async fn enumerate(&self, group_id: &GroupId) -> Result<Vec<ConstituentKey>, TraitError> {
        Ok(self
            .rows
            .get(group_id)
            .map(|rows| rows.iter().map(|r| r.constituent.clone()).collect())
            .unwrap_or_default())
    }

    async fn subscribe(
        &self,
        group_id: &GroupId,
        constituents: &[ConstituentKey],
        _fields: &[String],
    ) -> Result<SnapshotReceiver, TraitError> {
        let wanted: HashSet<&ConstituentKey> = constituents.iter().collect();
        let rows: Vec<SnapshotRow> = self
            .rows
            .get(group_id)
            .map(|rows| {
                rows.iter()
                    .filter(|r| wanted.contains(&r.constituent))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let (tx, rx) = mpsc::channel(1);
        tx.try_send(Snapshot::new(rows))
            .map_err(|e| TraitError::Internal(e.to_string()))?;
        self.streams.insert(group_id.clone(), tx);
        Ok(SnapshotReceiver::new(rx))
    }

    fn unsubscribe(&self, group_id: &GroupId) -> Result<(), TraitError> {
        self.streams.remove(group_id);
        Ok(())
    }
}

// =============================================================================
// CSV PRICE FEED
// =============================================================================

#[derive(Debug, Deserialize)]
struct PriceRow {
    key: String,
    price: String,
}

/// CSV-backed price feed. Expected header: `key,price`.
///
/// Each row for a subscribed key is delivered once, in file order.
pub struct CsvPriceFeed {
    ticks: Vec<PriceTick>,
    stream: Mutex<Option<mpsc::Sender<PriceTick>>>,
}

impl CsvPriceFeed {
    /// Load a CSV price file. A missing file is an empty feed.
    pub fn new(file_path: impl AsRef<Path>) -> Result<Self, TraitError> {
        let file_path = file_path.as_ref();
        let mut ticks = Vec::new();

        if file_path.exists() {
            let mut reader = csv::ReaderBuilder::new()
                .trim(csv::Trim::All)
                .from_path(file_path)
                .map_err(|e| TraitError::IoError(e.to_string()))?;

            for result in reader.deserialize() {
                let row: PriceRow = result.map_err(|e| TraitError::ParseError(e.to_string()))?;
                ticks.push(PriceTick::new(row.key, row.price));
            }
        }

        Ok(Self {
            ticks,
            stream: Mutex::new(None),
        })
    }

    /// Loaded ticks, in file order.
    pub fn ticks(&self) -> &[PriceTick] {
        &self.ticks
    }
}

#[async_trait]
impl PriceFeedCollaborator for CsvPriceFeed {
    async fn subscribe(&self, keys: &[InstrumentKey]) -> Result<PriceReceiver, TraitError> {
        let wanted: HashSet<&InstrumentKey> = keys.iter().collect();
        let ticks: Vec<PriceTick> = self
            .ticks
            .iter()
            .filter(|t| wanted.contains(&t.key))
            .cloned()
            .collect();

        let (tx, rx) = mpsc::channel(ticks.len().max(1));
        for tick in ticks {
            tx.try_send(tick)
                .map_err(|e| TraitError::Internal(e.to_string()))?;
        }
        *self.stream.lock() = Some(tx);
        Ok(PriceReceiver::new(rx))
    }

    fn unsubscribe(&self, _keys: &[InstrumentKey]) -> Result<(), TraitError> {
        self.stream.lock().take();
        Ok(())
    }
}

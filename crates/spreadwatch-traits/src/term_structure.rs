//! Parsed term structure: an ordered set of (tenor, rate) points.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use spreadwatch_core::Tenor;

/// A single curve pillar. Rates are in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermPoint {
    /// Pillar tenor
    pub tenor: Tenor,
    /// Rate in percent (e.g. 4.25)
    pub rate: Decimal,
}

impl TermPoint {
    /// Create a new point.
    pub fn new(tenor: Tenor, rate: Decimal) -> Self {
        Self { tenor, rate }
    }
}

/// Term-structure snapshot, ordered by tenor.
///
/// Always built wholesale from one feed snapshot; there is no API to merge
/// points into an existing structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermStructure {
    points: Vec<TermPoint>,
}

impl TermStructure {
    /// Build from points in any order. Points with the same year fraction
    /// keep the one that came last.
    pub fn from_points(points: Vec<TermPoint>) -> Self {
        let mut sorted: Vec<TermPoint> = Vec::with_capacity(points.len());
        for point in points {
            let years = point.tenor.years();
            match sorted
                .iter_mut()
                .find(|p| (p.tenor.years() - years).abs() < f64::EPSILON)
            {
                Some(existing) => *existing = point,
                None => sorted.push(point),
            }
        }
        sorted.sort_by(|a, b| a.tenor.years().total_cmp(&b.tenor.years()));
        Self { points: sorted }
    }

    /// Ordered points.
    pub fn points(&self) -> &[TermPoint] {
        &self.points
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if there are no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Rate (percent) at `years`, linearly interpolated, flat beyond both ends.
    pub fn rate_at(&self, years: f64) -> Option<f64> {
        let mut prev: Option<(f64, f64)> = None;
        let mut next: Option<(f64, f64)> = None;

        for point in &self.points {
            let t = point.tenor.years();
            let r = point.rate.to_f64()?;
            if (t - years).abs() < f64::EPSILON {
                return Some(r);
            }
            if t < years {
                prev = Some((t, r));
            } else if next.is_none() {
                next = Some((t, r));
            }
        }

        match (prev, next) {
            (Some((t1, r1)), Some((t2, r2))) => {
                let weight = (years - t1) / (t2 - t1);
                Some(r1 + weight * (r2 - r1))
            }
            (Some((_, r)), None) | (None, Some((_, r))) => Some(r),
            (None, None) => None,
        }
    }
}

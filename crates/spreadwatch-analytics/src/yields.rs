//! Yield-to-maturity from clean price.
//!
//! Coupon dates are rolled back from maturity at the convention frequency.
//! Accrued interest uses the actual fraction of the current coupon period,
//! and the yield compounds at the coupon frequency (street convention).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use spreadwatch_core::Date;

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::solver::{brent, SolverConfig};

/// Yield search bracket (decimal yields).
const YIELD_LOWER: f64 = -0.9;
const YIELD_UPPER: f64 = 1.0;

/// Face value prices are quoted against.
const FACE: f64 = 100.0;

/// Remaining coupon schedule as seen from a settlement date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponSchedule {
    /// Last coupon date on or before settlement
    pub previous: Date,
    /// Coupon dates after settlement, ascending, ending at maturity
    pub remaining: Vec<Date>,
}

impl CouponSchedule {
    /// Build the schedule for a bond paying `frequency` times a year.
    pub fn build(settlement: Date, maturity: Date, frequency: u32) -> AnalyticsResult<Self> {
        if settlement >= maturity {
            return Err(AnalyticsError::InvalidSettlement {
                settlement: settlement.to_string(),
                maturity: maturity.to_string(),
            });
        }
        if frequency == 0 || 12 % frequency != 0 {
            return Err(AnalyticsError::InvalidInput(format!(
                "unsupported coupon frequency {frequency}"
            )));
        }

        let step = (12 / frequency) as i32;
        let mut remaining = vec![maturity];
        let mut periods = 1;
        let previous = loop {
            let date = maturity
                .add_months(-step * periods)
                .map_err(|e| AnalyticsError::InvalidInput(e.to_string()))?;
            if date <= settlement {
                break date;
            }
            remaining.push(date);
            periods += 1;
        };
        remaining.reverse();

        Ok(Self {
            previous,
            remaining,
        })
    }

    /// Next coupon date after settlement.
    pub fn next(&self) -> Date {
        self.remaining[0]
    }

    /// Fraction of the current coupon period already elapsed at `settlement`.
    pub fn accrued_fraction(&self, settlement: Date) -> f64 {
        let period = self.previous.days_between(&self.next()) as f64;
        if period <= 0.0 {
            return 0.0;
        }
        self.previous.days_between(&settlement) as f64 / period
    }
}

/// Accrued interest per 100 face for an annual coupon in percent.
pub fn accrued_interest(
    coupon: f64,
    frequency: u32,
    schedule: &CouponSchedule,
    settlement: Date,
) -> f64 {
    coupon / f64::from(frequency) * schedule.accrued_fraction(settlement)
}

/// Dirty price per 100 face at decimal yield `y`.
pub fn dirty_price(
    y: f64,
    coupon: f64,
    frequency: u32,
    schedule: &CouponSchedule,
    settlement: Date,
) -> f64 {
    let f = f64::from(frequency);
    let c = coupon / f;
    let base = 1.0 + y / f;
    let w = 1.0 - schedule.accrued_fraction(settlement);
    let n = schedule.remaining.len();

    let coupons: f64 = (0..n).map(|i| c / base.powf(i as f64 + w)).sum();
    coupons + FACE / base.powf((n - 1) as f64 + w)
}

/// Decimal yield-to-maturity for a clean price per 100 face.
pub fn yield_from_clean_price(
    clean_price: Decimal,
    coupon: Decimal,
    settlement: Date,
    maturity: Date,
    frequency: u32,
    solver: &SolverConfig,
) -> AnalyticsResult<f64> {
    let clean = clean_price
        .to_f64()
        .ok_or_else(|| AnalyticsError::InvalidPrice(clean_price.to_string()))?;
    if clean <= 0.0 {
        return Err(AnalyticsError::InvalidPrice(format!(
            "non-positive price {clean_price}"
        )));
    }
    let coupon = coupon
        .to_f64()
        .ok_or_else(|| AnalyticsError::InvalidInput(format!("coupon {coupon}")))?;

    let schedule = CouponSchedule::build(settlement, maturity, frequency)?;
    let dirty = clean + accrued_interest(coupon, frequency, &schedule, settlement);

    brent(
        |y| dirty_price(y, coupon, frequency, &schedule, settlement) - dirty,
        YIELD_LOWER,
        YIELD_UPPER,
        solver,
    )
}

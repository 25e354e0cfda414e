//! G-spread: bond yield over the benchmark rate interpolated at the bond's maturity.

use rust_decimal::Decimal;
use tracing::trace;

use spreadwatch_core::Date;
use spreadwatch_traits::bond_math::{BondMath, SpreadFailure};
use spreadwatch_traits::term_structure::TermStructure;

use crate::conventions::ConventionConfig;
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::solver::SolverConfig;
use crate::yields::yield_from_clean_price;

/// Days per year used to place the maturity on the benchmark curve.
const DAYS_PER_YEAR: f64 = 365.0;

/// Default [`BondMath`] implementation.
#[derive(Debug, Clone, Default)]
pub struct GSpreadMath {
    conventions: ConventionConfig,
    solver: SolverConfig,
}

impl GSpreadMath {
    /// Creates a calculator with the given convention table.
    #[must_use]
    pub fn new(conventions: ConventionConfig) -> Self {
        Self {
            conventions,
            solver: SolverConfig::default(),
        }
    }

    /// Overrides the root-finder settings.
    #[must_use]
    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// The convention table in use.
    pub fn conventions(&self) -> &ConventionConfig {
        &self.conventions
    }

    fn g_spread(
        &self,
        settlement: Date,
        curve: &TermStructure,
        price: Decimal,
        maturity: Date,
        coupon: Decimal,
        structure_code: Option<&str>,
    ) -> AnalyticsResult<f64> {
        if settlement >= maturity {
            return Err(AnalyticsError::InvalidSettlement {
                settlement: settlement.to_string(),
                maturity: maturity.to_string(),
            });
        }
        if curve.is_empty() {
            return Err(AnalyticsError::EmptyCurve);
        }

        let convention = self.conventions.resolve(structure_code);
        let ytm = yield_from_clean_price(
            price,
            coupon,
            settlement,
            maturity,
            convention.frequency,
            &self.solver,
        )?;

        let years = settlement.days_between(&maturity) as f64 / DAYS_PER_YEAR;
        let benchmark = curve.rate_at(years).ok_or(AnalyticsError::EmptyCurve)?;

        let bps = (ytm * 100.0 - benchmark) * 100.0;
        trace!(ytm, benchmark, years, bps, "g-spread");
        if bps.is_finite() {
            Ok(bps)
        } else {
            Err(AnalyticsError::InvalidInput(format!("non-finite spread {bps}")))
        }
    }
}

impl BondMath for GSpreadMath {
    fn settlement_date(&self, today: Date, structure_code: Option<&str>, maturity: Date) -> Date {
        self.conventions
            .resolve(structure_code)
            .settlement_date(today, maturity)
    }

    fn spread(
        &self,
        settlement: Date,
        term_structure: &TermStructure,
        price: Decimal,
        maturity: Date,
        coupon: Decimal,
        structure_code: Option<&str>,
    ) -> Result<f64, SpreadFailure> {
        self.g_spread(settlement, term_structure, price, maturity, coupon, structure_code)
            .map_err(SpreadFailure::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conventions::Convention;
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;
    use spreadwatch_core::Tenor;
    use spreadwatch_traits::term_structure::TermPoint;

    fn date(y: i32, m: u32, d: u32) -> Date {
        Date::from_ymd(y, m, d).unwrap()
    }

    fn flat(rate: Decimal) -> TermStructure {
        TermStructure::from_points(vec![
            TermPoint::new(Tenor::Years(1), rate),
            TermPoint::new(Tenor::Years(10), rate),
        ])
    }

    #[test]
    fn test_par_bond_over_flat_curve() {
        let math = GSpreadMath::default();
        let bps = math
            .spread(
                date(2025, 6, 15),
                &flat(dec!(4.0)),
                dec!(100),
                date(2030, 6, 15),
                dec!(5.0),
                None,
            )
            .unwrap();
        assert_relative_eq!(bps, 100.0, epsilon = 1e-5);
    }

    #[test]
    fn test_higher_price_means_tighter_spread() {
        let math = GSpreadMath::default();
        let curve = flat(dec!(4.0));
        let settle = date(2025, 6, 17);
        let maturity = date(2030, 6, 15);
        let cheap = math
            .spread(settle, &curve, dec!(98), maturity, dec!(5.0), None)
            .unwrap();
        let rich = math
            .spread(settle, &curve, dec!(102), maturity, dec!(5.0), None)
            .unwrap();
        assert!(rich < cheap);
    }

    #[test]
    fn test_empty_curve_fails() {
        let result = GSpreadMath::default().spread(
            date(2025, 6, 17),
            &TermStructure::default(),
            dec!(100),
            date(2030, 6, 15),
            dec!(5.0),
            None,
        );
        assert!(result.unwrap_err().reason.contains("empty"));
    }

    #[test]
    fn test_settlement_at_maturity_fails() {
        let result = GSpreadMath::default().spread(
            date(2030, 6, 15),
            &flat(dec!(4.0)),
            dec!(100),
            date(2030, 6, 15),
            dec!(5.0),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_settlement_uses_structure_override() {
        let math = GSpreadMath::new(
            ConventionConfig::default().with_override("UST", Convention::new(1, 2)),
        );
        let friday = date(2025, 6, 13);
        let maturity = date(2030, 6, 15);
        assert_eq!(math.settlement_date(friday, Some("UST"), maturity), date(2025, 6, 16));
        assert_eq!(math.settlement_date(friday, None, maturity), date(2025, 6, 17));
    }
}

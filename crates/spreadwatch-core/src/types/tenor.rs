//! Tenor representation for term-structure pillars.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};

/// Tenor of a term-structure pillar (e.g. `3M`, `1Y`, `10Y`, or `2.5` years).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Tenor {
    /// Days
    Days(u32),
    /// Weeks
    Weeks(u32),
    /// Months
    Months(u32),
    /// Years
    Years(u32),
    /// Plain year fraction, as quoted by feeds that publish numeric maturities
    YearFraction(f64),
}

impl Tenor {
    /// Parses a tenor from a raw feed value.
    ///
    /// Accepts plain non-negative numbers (years), `ON`/`O/N` (one day) and
    /// `<n>D`, `<n>W`, `<n>M`, `<n>Y` codes, case-insensitively.
    pub fn parse(s: &str) -> CoreResult<Self> {
        let s = s.trim().to_uppercase();
        if s.is_empty() {
            return Err(CoreError::invalid_tenor("empty tenor string"));
        }
        if s == "ON" || s == "O/N" {
            return Ok(Tenor::Days(1));
        }

        if let Ok(years) = s.parse::<f64>() {
            if years.is_finite() && years >= 0.0 {
                return Ok(Tenor::YearFraction(years));
            }
            return Err(CoreError::invalid_tenor(format!("negative or non-finite: {s}")));
        }

        let unit = s.chars().last().unwrap_or_default();
        let num_str = &s[..s.len() - unit.len_utf8()];
        let num: u32 = num_str
            .parse()
            .map_err(|_| CoreError::invalid_tenor(format!("invalid tenor number: {num_str}")))?;

        match unit {
            'D' => Ok(Tenor::Days(num)),
            'W' => Ok(Tenor::Weeks(num)),
            'M' => Ok(Tenor::Months(num)),
            'Y' => Ok(Tenor::Years(num)),
            _ => Err(CoreError::invalid_tenor(format!("invalid tenor unit: {unit}"))),
        }
    }

    /// Tenor as a year fraction (ACT/365 for day and week tenors).
    pub fn years(&self) -> f64 {
        match self {
            Tenor::Days(d) => f64::from(*d) / 365.0,
            Tenor::Weeks(w) => f64::from(*w) * 7.0 / 365.0,
            Tenor::Months(m) => f64::from(*m) / 12.0,
            Tenor::Years(y) => f64::from(*y),
            Tenor::YearFraction(y) => *y,
        }
    }
}

impl fmt::Display for Tenor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tenor::Days(d) => write!(f, "{d}D"),
            Tenor::Weeks(w) => write!(f, "{w}W"),
            Tenor::Months(m) => write!(f, "{m}M"),
            Tenor::Years(y) => write!(f, "{y}Y"),
            Tenor::YearFraction(y) => write!(f, "{y}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_parse_codes() {
        assert_eq!(Tenor::parse("1Y").unwrap(), Tenor::Years(1));
        assert_eq!(Tenor::parse("6m").unwrap(), Tenor::Months(6));
        assert_eq!(Tenor::parse(" 2W ").unwrap(), Tenor::Weeks(2));
        assert_eq!(Tenor::parse("30D").unwrap(), Tenor::Days(30));
        assert_eq!(Tenor::parse("O/N").unwrap(), Tenor::Days(1));
    }

    #[test]
    fn test_parse_numeric_years() {
        assert_eq!(Tenor::parse("2.5").unwrap(), Tenor::YearFraction(2.5));
        assert_relative_eq!(Tenor::parse("10").unwrap().years(), 10.0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Tenor::parse("bad").is_err());
        assert!(Tenor::parse("").is_err());
        assert!(Tenor::parse("Y").is_err());
        assert!(Tenor::parse("-1").is_err());
        assert!(Tenor::parse("NaN").is_err());
        assert!(Tenor::parse("5X").is_err());
        assert!(Tenor::parse("5€").is_err());
    }

    #[test]
    fn test_years() {
        assert_relative_eq!(Tenor::Months(3).years(), 0.25);
        assert_relative_eq!(Tenor::Days(365).years(), 1.0);
        assert_relative_eq!(Tenor::Weeks(1).years(), 7.0 / 365.0);
    }

    proptest! {
        #[test]
        fn prop_year_codes_round_trip_through_display(n in 0u32..100) {
            let tenor = Tenor::Years(n);
            prop_assert_eq!(Tenor::parse(&tenor.to_string()).unwrap(), tenor);
        }
    }
}

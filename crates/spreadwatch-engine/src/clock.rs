//! Source of "today" and result timestamps.

use chrono::{DateTime, NaiveTime, Utc};

use spreadwatch_core::Date;

/// Provides the current date and time to the orchestrator.
pub trait Clock: Send + Sync {
    /// Trade date used for settlement.
    fn today(&self) -> Date;

    /// Timestamp attached to results.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> Date {
        Date::today()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given date, for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    today: Date,
    now: DateTime<Utc>,
}

impl FixedClock {
    /// Clock reporting `today` at midnight UTC.
    pub fn new(today: Date) -> Self {
        Self {
            today,
            now: today.as_naive_date().and_time(NaiveTime::MIN).and_utc(),
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> Date {
        self.today
    }

    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

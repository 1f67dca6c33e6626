use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Source of "now", injected so cache expiry and relative dates are testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn today(&self) -> NaiveDate;
}

/// Wall clock; "today" is computed in the configured timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    #[must_use]
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(chrono_tz::UTC)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn today(&self) -> NaiveDate {
        let now: DateTime<Utc> = Utc::now();
        now.with_timezone(&self.tz).date_naive()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
    today: Mutex<NaiveDate>,
}

impl ManualClock {
    #[must_use]
    pub fn new(today: NaiveDate) -> Self {
        Self {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            today: Mutex::new(today),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut offset) = self.offset.lock() {
            *offset += by;
        }
    }

    pub fn set_today(&self, today: NaiveDate) {
        if let Ok(mut t) = self.today.lock() {
            *t = today;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = self.offset.lock().map(|o| *o).unwrap_or_default();
        self.start + offset
    }

    fn today(&self) -> NaiveDate {
        self.today
            .lock()
            .map(|t| *t)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

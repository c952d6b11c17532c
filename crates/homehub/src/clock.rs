//! Clocks and calendar-date helpers.
//!
//! Resources never read the system time directly; they ask a [`Clock`], so
//! tests can pin "now" with [`FixedClock`].

use std::fmt::{self, Write as _};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Duration, Months, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use homehub_core::logging::targets;
use parking_lot::RwLock;

/// Source of the current instant.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.write() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Midnight at the start of the day after `now`, in `tz`.
///
/// If midnight does not exist locally (a DST gap), the first valid instant
/// of that day is used.
pub fn start_of_next_day(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    let Some(tomorrow) = today.succ_opt() else {
        return now + Duration::days(1);
    };
    let mut local = tomorrow.and_time(NaiveTime::MIN);
    for _ in 0..4 {
        if let Some(instant) = tz.from_local_datetime(&local).earliest() {
            return instant.with_timezone(&Utc);
        }
        local += Duration::minutes(30);
    }
    now + Duration::days(1)
}

/// Same wall time one month later, clamped to the end of shorter months.
pub fn one_month_out(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .checked_add_months(Months::new(1))
        .unwrap_or(instant + Duration::days(30))
}

/// Whether `pattern` contains only strftime specifiers chrono understands.
pub fn is_valid_pattern(pattern: &str) -> bool {
    !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}

/// Format `instant` in `tz` with a strftime pattern.
///
/// An unusable pattern yields RFC 3339 text instead.
pub fn format_in(instant: DateTime<Utc>, tz: Tz, pattern: &str) -> String {
    let local = instant.with_timezone(&tz);
    let mut text = String::new();
    if write!(text, "{}", local.format(pattern)).is_err() {
        tracing::warn!(target: targets::CONFIG, pattern, "unusable time format");
        return local.to_rfc3339();
    }
    text
}

/// Short time, e.g. `"9:05 AM"`.
pub fn time_as_text(instant: DateTime<Utc>, tz: Tz) -> String {
    format_in(instant, tz, "%-I:%M %p")
}

//! Value types shared by the resources.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::error::WindowError;

// ============================================================================
// Authorization
// ============================================================================

/// Platform-reported grant level for a permissioned capability.
///
/// `FullAccess` also stands for the location service's "always" and
/// "when in use" grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// The user has not been asked yet.
    #[default]
    NotDetermined,
    /// Device policy forbids access.
    Restricted,
    /// The user refused access.
    Denied,
    /// Events may be added but not read.
    WriteOnly,
    /// Read and write access.
    FullAccess,
    /// A status this crate does not recognize.
    Unknown,
}

impl AuthorizationStatus {
    /// All statuses, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::NotDetermined,
        Self::Restricted,
        Self::Denied,
        Self::WriteOnly,
        Self::FullAccess,
        Self::Unknown,
    ];

    pub fn is_full_access(self) -> bool {
        self == Self::FullAccess
    }

    pub fn is_write_only_or_full_access(self) -> bool {
        matches!(self, Self::WriteOnly | Self::FullAccess)
    }

    /// `true` for statuses only the user or device policy can change.
    pub fn is_refused(self) -> bool {
        matches!(self, Self::Denied | Self::Restricted)
    }

    /// Stable human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Self::NotDetermined => "Access has not been requested yet.",
            Self::Restricted => "Access is restricted on this device.",
            Self::Denied => "Access was denied.",
            Self::WriteOnly => "Write-only access was granted.",
            Self::FullAccess => "Full access was granted.",
            Self::Unknown => "The access status is unknown.",
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotDetermined => "not determined",
            Self::Restricted => "restricted",
            Self::Denied => "denied",
            Self::WriteOnly => "write only",
            Self::FullAccess => "full access",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Location
// ============================================================================

/// A coordinate reported by the location service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl DeviceLocation {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite and within geographic range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for DeviceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

// ============================================================================
// Calendar
// ============================================================================

/// A calendar event as reported by the store.
///
/// The identifier is stable and used for removal. It is unique within one
/// fetch but duplicates across calendars are tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub identifier: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn new(
        identifier: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            start,
            end,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether any part of the event falls inside `window`.
    pub fn overlaps(&self, window: &FetchWindow) -> bool {
        if self.start == self.end {
            return window.contains(self.start);
        }
        self.start < window.end() && self.end > window.start()
    }

    /// Display ordering: start ascending, then identifier.
    pub fn chronological_cmp(&self, other: &Self) -> Ordering {
        self.start
            .cmp(&other.start)
            .then_with(|| self.identifier.cmp(&other.identifier))
    }

    /// `"09:00 - 09:15"` in the given zone, using a strftime pattern.
    pub fn time_range_text(&self, tz: Tz, pattern: &str) -> String {
        format!(
            "{} - {}",
            clock::format_in(self.start, tz, pattern),
            clock::format_in(self.end, tz, pattern)
        )
    }
}

/// Sort events by start, breaking ties on identifier.
pub fn sort_chronologically(events: &mut [CalendarEvent]) {
    events.sort_by(CalendarEvent::chronological_cmp);
}

/// Half-open time interval `[start, end)` bounding a calendar query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl FetchWindow {
    /// Create a window. Empty windows (`start == end`) are allowed.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError { start, end });
        }
        Ok(Self { start, end })
    }

    /// From `now` until the start of the next day in `tz`.
    pub fn until_next_day(now: DateTime<Utc>, tz: Tz) -> Self {
        Self {
            start: now,
            end: clock::start_of_next_day(now, tz),
        }
    }

    /// From `now` until the same time one month later.
    pub fn one_month(now: DateTime<Utc>) -> Self {
        Self {
            start: now,
            end: clock::one_month_out(now),
        }
    }

    /// From `now` for the next `minutes` minutes.
    pub fn next_minutes(now: DateTime<Utc>, minutes: u32) -> Self {
        Self {
            start: now,
            end: now + Duration::minutes(i64::from(minutes)),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// `start <= instant < end`.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Lifecycle of a [`CalendarResource`](crate::calendar::CalendarResource).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CalendarState {
    #[default]
    Uninitialized,
    Authorizing,
    Ready,
    Refreshing,
    Denied,
    Restricted,
    /// Write-only access; the user must grant full access.
    NeedsUpgrade,
    Unknown,
}

impl CalendarState {
    /// The state a resource settles in when `status` does not allow reads.
    pub fn for_insufficient(status: AuthorizationStatus) -> Self {
        match status {
            AuthorizationStatus::NotDetermined => Self::Uninitialized,
            AuthorizationStatus::Restricted => Self::Restricted,
            AuthorizationStatus::Denied => Self::Denied,
            AuthorizationStatus::WriteOnly => Self::NeedsUpgrade,
            AuthorizationStatus::FullAccess => Self::Ready,
            AuthorizationStatus::Unknown => Self::Unknown,
        }
    }

    /// Whether the published events reflect the store.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready | Self::Refreshing)
    }
}

// ============================================================================
// Weather
// ============================================================================

/// Symbol shown when no weather is available.
pub const UNAVAILABLE_SYMBOL: &str = "xmark";

/// A temperature reading, or the sentinel for "no data".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Temperature {
    Celsius(f64),
    Unavailable,
}

impl Temperature {
    pub fn celsius(self) -> Option<f64> {
        match self {
            Self::Celsius(value) => Some(value),
            Self::Unavailable => None,
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Celsius(value) => write!(f, "{value:.1}°C"),
            Self::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// Current conditions for the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    /// Symbol name for the condition (SF Symbols naming, e.g. `"cloud.rain"`).
    pub symbol: String,
    pub temperature: Temperature,
}

impl WeatherSnapshot {
    pub fn new(symbol: impl Into<String>, celsius: f64) -> Self {
        Self {
            symbol: symbol.into(),
            temperature: Temperature::Celsius(celsius),
        }
    }

    /// The fail-soft placeholder.
    pub fn unavailable() -> Self {
        Self {
            symbol: UNAVAILABLE_SYMBOL.to_string(),
            temperature: Temperature::Unavailable,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.temperature, Temperature::Celsius(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_window_rejects_reversed_bounds() {
        assert!(FetchWindow::new(at(10, 0), at(9, 0)).is_err());
        let empty = FetchWindow::new(at(9, 0), at(9, 0)).unwrap();
        assert!(empty.is_empty());
        assert!(!empty.contains(at(9, 0)));
    }

    #[test]
    fn test_window_is_half_open() {
        let window = FetchWindow::new(at(9, 0), at(10, 0)).unwrap();
        assert!(window.contains(at(9, 0)));
        assert!(window.contains(at(9, 59)));
        assert!(!window.contains(at(10, 0)));
    }

    #[test]
    fn test_until_next_day_uses_time_zone() {
        // 23:30 UTC on Jan 1 is already Jan 2 in Amsterdam.
        let now = at(23, 30);
        let utc = FetchWindow::until_next_day(now, Tz::UTC);
        assert_eq!(utc.end(), Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());

        let ams = FetchWindow::until_next_day(now, chrono_tz::Europe::Amsterdam);
        assert_eq!(ams.end(), Utc.with_ymd_and_hms(2024, 1, 2, 23, 0, 0).unwrap());
        assert_eq!(ams.start(), now);
    }

    #[test]
    fn test_one_month_and_next_minutes() {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(
            FetchWindow::one_month(now).end(),
            Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap()
        );
        assert_eq!(
            FetchWindow::next_minutes(now, 30).end(),
            Utc.with_ymd_and_hms(2024, 1, 31, 12, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_sort_breaks_ties_on_identifier() {
        let mut events = vec![
            CalendarEvent::new("b", "Second", at(9, 0), at(10, 0)),
            CalendarEvent::new("c", "Later", at(11, 0), at(12, 0)),
            CalendarEvent::new("a", "First", at(9, 0), at(9, 30)),
            CalendarEvent::new("a", "Duplicate", at(9, 0), at(9, 30)),
        ];
        sort_chronologically(&mut events);
        let ids: Vec<_> = events.iter().map(|e| e.identifier.as_str()).collect();
        assert_eq!(ids, ["a", "a", "b", "c"]);
    }

    #[test]
    fn test_event_helpers() {
        let event = CalendarEvent::new("x", "Standup", at(9, 0), at(9, 15));
        assert_eq!(event.duration(), Duration::minutes(15));
        assert_eq!(event.time_range_text(Tz::UTC, "%H:%M"), "09:00 - 09:15");

        let window = FetchWindow::new(at(9, 10), at(12, 0)).unwrap();
        assert!(event.overlaps(&window));
        let later = FetchWindow::new(at(9, 15), at(12, 0)).unwrap();
        assert!(!event.overlaps(&later));
    }

    #[test]
    fn test_weather_snapshot_sentinel() {
        let snapshot = WeatherSnapshot::unavailable();
        assert_eq!(snapshot.symbol, "xmark");
        assert!(!snapshot.is_available());
        assert_eq!(WeatherSnapshot::new("sun.max", 12.34).temperature.to_string(), "12.3°C");
    }

    #[test]
    fn test_status_helpers() {
        assert!(AuthorizationStatus::FullAccess.is_write_only_or_full_access());
        assert!(AuthorizationStatus::WriteOnly.is_write_only_or_full_access());
        assert!(!AuthorizationStatus::WriteOnly.is_full_access());
        assert!(AuthorizationStatus::Denied.is_refused());
        assert_eq!(
            CalendarState::for_insufficient(AuthorizationStatus::WriteOnly),
            CalendarState::NeedsUpgrade
        );
        let descriptions: std::collections::HashSet<_> = AuthorizationStatus::ALL
            .iter()
            .map(|s| s.description())
            .collect();
        assert_eq!(descriptions.len(), AuthorizationStatus::ALL.len());
    }
}

//! Hub configuration.
//!
//! Every section is optional in the TOML source; missing keys take the
//! documented defaults.
//!
//! ```toml
//! time_zone = "Europe/Amsterdam"
//!
//! [calendar]
//! window = "until_next_day"
//!
//! [location]
//! desired_accuracy_m = 3000.0
//! request_timeout_secs = 30
//!
//! [weather]
//! fallback_location = { latitude = 52.370495, longitude = 4.633083 }
//!
//! [display]
//! clock_format = "%I:%M:%S %p"
//! ```

use std::path::Path;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::error::ConfigError;
use crate::model::DeviceLocation;
use crate::weather::DEFAULT_LOCATION;

/// Top-level configuration passed to [`Hub::new`](crate::hub::Hub::new).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Zone for day boundaries and displayed times.
    pub time_zone: Tz,
    pub calendar: CalendarConfig,
    pub location: LocationConfig,
    pub weather: WeatherConfig,
    pub display: DisplayConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            time_zone: Tz::UTC,
            calendar: CalendarConfig::default(),
            location: LocationConfig::default(),
            weather: WeatherConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl HubConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        tracing::debug!(
            target: homehub_core::logging::targets::CONFIG,
            time_zone = %config.time_zone,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        Self::from_toml_str(&source)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let accuracy = self.location.desired_accuracy_m;
        if !(accuracy.is_finite() && accuracy > 0.0) {
            return Err(ConfigError::invalid(
                "location.desired_accuracy_m",
                format!("must be a positive distance, got {accuracy}"),
            ));
        }
        if self.location.request_timeout_secs == Some(0) {
            return Err(ConfigError::invalid(
                "location.request_timeout_secs",
                "must be at least one second",
            ));
        }
        if !self.weather.fallback_location.is_valid() {
            return Err(ConfigError::invalid(
                "weather.fallback_location",
                format!("{} is not a valid coordinate", self.weather.fallback_location),
            ));
        }
        if self.weather.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "weather.request_timeout_secs",
                "must be at least one second",
            ));
        }
        if self.weather.base_url.trim().is_empty() {
            return Err(ConfigError::invalid("weather.base_url", "must not be empty"));
        }
        for (field, pattern) in [
            ("display.clock_format", &self.display.clock_format),
            ("display.event_time_format", &self.display.event_time_format),
        ] {
            if !clock::is_valid_pattern(pattern) {
                return Err(ConfigError::invalid(
                    field,
                    format!("{pattern:?} is not a valid time format"),
                ));
            }
        }
        if self.display.tick_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "display.tick_interval_ms",
                "must be greater than zero",
            ));
        }
        if let CalendarWindow::NextMinutes { minutes: 0 } = self.calendar.window {
            return Err(ConfigError::invalid(
                "calendar.window.minutes",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Which window `fetch_latest_events` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarWindow {
    /// Now until the start of tomorrow.
    #[default]
    UntilNextDay,
    /// Now until one month from now.
    OneMonth,
    /// Now plus a fixed number of minutes.
    NextMinutes { minutes: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub window: CalendarWindow,
    /// Start the change listener after a successful setup.
    pub listen_for_changes: bool,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            window: CalendarWindow::UntilNextDay,
            listen_for_changes: true,
        }
    }
}

/// Hint for the location service about how the device moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    #[default]
    Other,
    Automotive,
    Fitness,
    OtherNavigation,
    Airborne,
}

/// Settings handed to the location client on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Requested accuracy in meters.
    pub desired_accuracy_m: f64,
    pub allows_background_updates: bool,
    pub activity: ActivityType,
    /// `None` waits for the platform indefinitely.
    pub request_timeout_secs: Option<u64>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            desired_accuracy_m: 3_000.0,
            allows_background_updates: false,
            activity: ActivityType::Other,
            request_timeout_secs: Some(30),
        }
    }
}

impl LocationConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Coordinate used when no device location is known.
    pub fallback_location: DeviceLocation,
    pub request_timeout_secs: u64,
    /// Open-Meteo API root.
    pub base_url: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            fallback_location: DEFAULT_LOCATION,
            request_timeout_secs: 10,
            base_url: "https://api.open-meteo.com".to_string(),
        }
    }
}

impl WeatherConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// strftime pattern for the dashboard clock.
    pub clock_format: String,
    /// strftime pattern for event start and end times.
    pub event_time_format: String,
    pub tick_interval_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            clock_format: "%I:%M:%S %p".to_string(),
            event_time_format: "%H:%M".to_string(),
            tick_interval_ms: 1_000,
        }
    }
}

impl DisplayConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = HubConfig::from_toml_str("").unwrap();
        assert_eq!(config, HubConfig::default());
        assert_eq!(config.location.desired_accuracy_m, 3_000.0);
        assert!(!config.location.allows_background_updates);
        assert_eq!(config.weather.fallback_location, DEFAULT_LOCATION);
        assert_eq!(config.display.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_sections() {
        let config = HubConfig::from_toml_str(
            r#"
            time_zone = "Europe/Amsterdam"

            [calendar]
            window = "one_month"

            [location]
            activity = "fitness"

            [weather]
            fallback_location = { latitude = 48.8566, longitude = 2.3522 }
            "#,
        )
        .unwrap();

        assert_eq!(config.time_zone, chrono_tz::Europe::Amsterdam);
        assert_eq!(config.calendar.window, CalendarWindow::OneMonth);
        assert!(config.calendar.listen_for_changes);
        assert_eq!(config.location.activity, ActivityType::Fitness);
        assert_eq!(config.location.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(
            config.weather.fallback_location,
            DeviceLocation::new(48.8566, 2.3522)
        );
    }

    #[test]
    fn test_next_minutes_window() {
        let config = HubConfig::from_toml_str(
            r#"
            [calendar]
            window = { next_minutes = { minutes = 30 } }
            "#,
        )
        .unwrap();
        assert_eq!(
            config.calendar.window,
            CalendarWindow::NextMinutes { minutes: 30 }
        );
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let err = HubConfig::from_toml_str("[location]\ndesired_accuracy_m = -1.0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "location.desired_accuracy_m",
                ..
            }
        ));

        let err = HubConfig::from_toml_str(
            "[weather]\nfallback_location = { latitude = 91.0, longitude = 0.0 }",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "weather.fallback_location",
                ..
            }
        ));

        let err = HubConfig::from_toml_str("[display]\ntick_interval_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_validation_rejects_unknown_time_formats() {
        let err = HubConfig::from_toml_str("[display]\nclock_format = \"%Q\"").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "display.clock_format",
                ..
            }
        ));

        let err =
            HubConfig::from_toml_str("[display]\nevent_time_format = \"%H:%M %Q\"").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "display.event_time_format",
                ..
            }
        ));

        let config = HubConfig::from_toml_str("[display]\nclock_format = \"%-I:%M %p\"").unwrap();
        assert_eq!(config.display.clock_format, "%-I:%M %p");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            HubConfig::from_toml_str("time_zone = \"Mars/Olympus\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            HubConfig::from_toml_str("[location]\ndesired_accuracy_m = \"far\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[weather]\nrequest_timeout_secs = 3").unwrap();
        let config = HubConfig::from_file(file.path()).unwrap();
        assert_eq!(config.weather.request_timeout(), Duration::from_secs(3));

        let missing = HubConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}

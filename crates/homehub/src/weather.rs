//! Current weather, fail-soft.
//!
//! Weather is a nice-to-have on the dashboard: backend errors and timeouts
//! degrade to [`WeatherSnapshot::unavailable`] instead of reaching callers.

use std::sync::Arc;

use async_trait::async_trait;
use homehub_core::logging::targets;
use homehub_core::{Published, Signal};

use crate::config::WeatherConfig;
use crate::error::WeatherError;
use crate::model::{DeviceLocation, UNAVAILABLE_SYMBOL, WeatherSnapshot};

/// Coordinate used when the device location is unknown.
pub const DEFAULT_LOCATION: DeviceLocation = DeviceLocation::new(52.370495, 4.633083);

/// Shown before the first weather result arrives.
pub const LOADING_TEXT: &str = "Loading Weather Data";

/// Shown when the backend could not deliver.
pub const UNAVAILABLE_TEXT: &str = "Weather unavailable";

/// A weather backend.
#[async_trait]
pub trait WeatherClient: Send + Sync {
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<WeatherSnapshot, WeatherError>;
}

/// Fetches and publishes the current weather.
pub struct WeatherResource {
    client: Box<dyn WeatherClient>,
    config: WeatherConfig,
    weather: Published<Option<WeatherSnapshot>>,
    serial: tokio::sync::Mutex<()>,
}

impl WeatherResource {
    pub fn new(client: Box<dyn WeatherClient>, config: WeatherConfig) -> Self {
        Self {
            client,
            config,
            weather: Published::new("weather.current", None),
            serial: tokio::sync::Mutex::new(()),
        }
    }

    /// Weather at `location`, or at the configured fallback coordinate.
    ///
    /// Never fails; the result is also published.
    #[tracing::instrument(skip_all, target = "homehub::weather", name = "weather.get")]
    pub async fn get_weather(&self, location: Option<DeviceLocation>) -> WeatherSnapshot {
        let _serial = self.serial.lock().await;
        let target = location.unwrap_or(self.config.fallback_location);
        let limit = self.config.request_timeout();

        let fetch = self.client.fetch(target.latitude, target.longitude);
        let snapshot = match tokio::time::timeout(limit, fetch).await {
            Ok(Ok(snapshot)) => {
                tracing::debug!(
                    target: targets::WEATHER,
                    location = %target,
                    symbol = %snapshot.symbol,
                    temperature = %snapshot.temperature,
                    "weather updated"
                );
                snapshot
            }
            Ok(Err(error)) => {
                tracing::warn!(target: targets::WEATHER, location = %target, %error, "weather fetch failed");
                WeatherSnapshot::unavailable()
            }
            Err(_) => {
                tracing::warn!(target: targets::WEATHER, location = %target, ?limit, "weather fetch timed out");
                WeatherSnapshot::unavailable()
            }
        };

        self.weather.publish(Some(snapshot.clone()));
        snapshot
    }

    pub fn weather(&self) -> Option<WeatherSnapshot> {
        self.weather.get()
    }

    pub fn weather_changed(&self) -> &Arc<Signal<Option<WeatherSnapshot>>> {
        self.weather.changed()
    }

    /// Symbol for the current conditions, `"xmark"` when none loaded.
    pub fn symbol(&self) -> String {
        self.weather.with(|weather| match weather {
            Some(snapshot) => snapshot.symbol.clone(),
            None => UNAVAILABLE_SYMBOL.to_string(),
        })
    }

    pub fn temperature_text(&self) -> String {
        self.weather.with(|weather| temperature_text(weather.as_ref()))
    }
}

impl std::fmt::Debug for WeatherResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherResource")
            .field("weather", &self.weather())
            .field("fallback_location", &self.config.fallback_location)
            .finish_non_exhaustive()
    }
}

/// Display text for an optional snapshot.
pub fn temperature_text(weather: Option<&WeatherSnapshot>) -> String {
    match weather {
        None => LOADING_TEXT.to_string(),
        Some(snapshot) => match snapshot.temperature.celsius() {
            Some(_) => snapshot.temperature.to_string(),
            None => UNAVAILABLE_TEXT.to_string(),
        },
    }
}

// ============================================================================
// Open-Meteo backend
// ============================================================================

#[cfg(feature = "open-meteo")]
pub use open_meteo::OpenMeteoWeather;

#[cfg(feature = "open-meteo")]
mod open_meteo {
    use async_trait::async_trait;
    use homehub_net::{HttpClient, OpenMeteoClient};

    use super::WeatherClient;
    use crate::config::WeatherConfig;
    use crate::error::WeatherError;
    use crate::model::WeatherSnapshot;

    /// [`WeatherClient`] backed by the Open-Meteo forecast API.
    #[derive(Debug, Clone)]
    pub struct OpenMeteoWeather {
        client: OpenMeteoClient,
    }

    impl OpenMeteoWeather {
        /// Build an HTTP client from `config` (base URL and timeout).
        pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
            let http = HttpClient::builder()
                .timeout(config.request_timeout())
                .build()?;
            Ok(Self::from_client(OpenMeteoClient::with_base_url(
                http,
                config.base_url.clone(),
            )))
        }

        pub fn from_client(client: OpenMeteoClient) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl WeatherClient for OpenMeteoWeather {
        async fn fetch(
            &self,
            latitude: f64,
            longitude: f64,
        ) -> Result<WeatherSnapshot, WeatherError> {
            let current = self.client.current(latitude, longitude).await?;
            Ok(WeatherSnapshot::new(current.symbol(), current.temperature_c))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Temperature;

    #[test]
    fn test_temperature_text() {
        assert_eq!(temperature_text(None), "Loading Weather Data");
        assert_eq!(
            temperature_text(Some(&WeatherSnapshot::unavailable())),
            "Weather unavailable"
        );
        assert_eq!(
            temperature_text(Some(&WeatherSnapshot::new("cloud", 12.3))),
            "12.3°C"
        );
        assert_eq!(
            temperature_text(Some(&WeatherSnapshot {
                symbol: "snowflake".into(),
                temperature: Temperature::Celsius(-4.3),
            })),
            "-4.3°C"
        );
    }

    #[test]
    fn test_default_location_is_valid() {
        assert!(DEFAULT_LOCATION.is_valid());
        assert_ne!(DEFAULT_LOCATION.latitude, DEFAULT_LOCATION.longitude);
    }
}

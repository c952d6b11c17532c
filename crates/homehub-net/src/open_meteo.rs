//! Open-Meteo current weather client.
//!
//! [Open-Meteo](https://open-meteo.com) serves forecasts without an API key.
//! HomeHub only needs the current temperature and condition, so this client
//! asks for exactly `temperature_2m` and `weather_code` of the `current` block.

use homehub_core::logging::targets;
use serde::Deserialize;

use crate::error::{NetworkError, Result};
use crate::http::HttpClient;

/// Public Open-Meteo endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com";

/// Current conditions at a coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    /// Air temperature two metres above ground, in degrees Celsius.
    pub temperature_c: f64,
    /// WMO weather interpretation code.
    pub weather_code: u8,
}

impl CurrentConditions {
    /// Symbol name for the condition, see [`symbol_for_code`].
    pub fn symbol(&self) -> &'static str {
        symbol_for_code(self.weather_code)
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    temperature_2m: Option<f64>,
    weather_code: Option<u8>,
}

/// Client for the Open-Meteo forecast endpoint.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    http: HttpClient,
    base_url: String,
}

impl OpenMeteoClient {
    /// Create a client against the public endpoint.
    pub fn new(http: HttpClient) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL)
    }

    /// Create a client against another endpoint (mirrors, test servers).
    pub fn with_base_url(http: HttpClient, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { http, base_url }
    }

    /// The endpoint root requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch current conditions for a coordinate.
    pub async fn current(&self, latitude: f64, longitude: f64) -> Result<CurrentConditions> {
        let url = format!("{}/v1/forecast", self.base_url);
        let query = [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current", "temperature_2m,weather_code".to_string()),
            ("timezone", "auto".to_string()),
        ];

        let response: ForecastResponse = self.http.get_json(&url, &query).await?;
        let current = response
            .current
            .ok_or_else(|| NetworkError::InvalidBody("missing `current` block".into()))?;

        let temperature_c = current
            .temperature_2m
            .ok_or_else(|| NetworkError::InvalidBody("missing `temperature_2m`".into()))?;
        let weather_code = current
            .weather_code
            .ok_or_else(|| NetworkError::InvalidBody("missing `weather_code`".into()))?;

        tracing::debug!(
            target: targets::NET,
            latitude,
            longitude,
            temperature_c,
            weather_code,
            "current conditions"
        );

        Ok(CurrentConditions {
            temperature_c,
            weather_code,
        })
    }
}

/// Map a WMO weather interpretation code to a symbol name.
///
/// Names follow the system symbol set the dashboard renders (`sun.max`,
/// `cloud.rain`, ...). Unknown codes map to `questionmark`.
pub fn symbol_for_code(code: u8) -> &'static str {
    match code {
        0 => "sun.max",
        1 | 2 => "cloud.sun",
        3 => "cloud",
        45 | 48 => "cloud.fog",
        51 | 53 | 55 | 56 | 57 => "cloud.drizzle",
        61 | 63 | 66 => "cloud.rain",
        65 | 67 | 80 | 81 | 82 => "cloud.heavyrain",
        71 | 73 | 75 | 77 | 85 | 86 => "cloud.snow",
        95 => "cloud.bolt",
        96 | 99 => "cloud.bolt.rain",
        _ => "questionmark",
    }
}

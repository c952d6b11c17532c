//! HomeHub - permission-gated calendar, location and weather resources for a
//! home dashboard.
//!
//! Each resource wraps one platform service behind a narrow trait and
//! republishes the result as observable state ([`Published`] values with
//! change signals). The [`Hub`] owns one of each and runs the startup flows.
//!
//! # Example
//!
//! ```no_run
//! use homehub::platform::{InMemoryCalendarStore, SimulatedLocationClient, StaticWeatherClient};
//! use homehub::{AuthorizationStatus, Hub, HubClients, HubConfig, WeatherSnapshot};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let location = SimulatedLocationClient::new(AuthorizationStatus::FullAccess);
//! let hub = Hub::new(
//!     HubConfig::default(),
//!     HubClients {
//!         calendar: Box::new(InMemoryCalendarStore::new(AuthorizationStatus::FullAccess)),
//!         location: Box::new(location.clone()),
//!         weather: Box::new(StaticWeatherClient::new(WeatherSnapshot::new("sun.max", 21.0))),
//!     },
//! )?;
//! location.attach(hub.location_delegate());
//!
//! let report = hub.start().await;
//! println!("{}", hub.snapshot(chrono::Utc::now()));
//! # let _ = report;
//! # Ok(())
//! # }
//! ```

pub mod authorization;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod error;
pub mod hub;
pub mod location;
pub mod model;
pub mod platform;
pub mod weather;

pub use homehub_core::{Published, Signal};

pub use authorization::{AuthorizationGate, AuthorizationProvider, Verdict};
pub use calendar::{CalendarChange, CalendarResource, CalendarStoreClient, ListenerHandle};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    ActivityType, CalendarConfig, CalendarWindow, DisplayConfig, HubConfig, LocationConfig,
    WeatherConfig,
};
pub use error::{
    AuthorizationError, ConfigError, LocationError, PlatformError, RemovalError, WeatherError,
    WindowError,
};
pub use hub::{DashboardSnapshot, EventLine, Hub, HubClients, HubStartReport};
pub use location::{LocationClient, LocationDelegate, LocationResource, RequestToken};
pub use model::{
    AuthorizationStatus, CalendarEvent, CalendarState, DeviceLocation, FetchWindow, Temperature,
    WeatherSnapshot,
};
#[cfg(feature = "open-meteo")]
pub use weather::OpenMeteoWeather;
pub use weather::{DEFAULT_LOCATION, WeatherClient, WeatherResource};

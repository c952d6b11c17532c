//! The dashboard orchestrator.
//!
//! A [`Hub`] owns one of each resource and runs the two startup flows
//! concurrently: "authorize calendar, fetch, listen" and "locate device,
//! fetch weather".

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use homehub_core::logging::targets;
use homehub_core::{Published, Signal};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::calendar::{CalendarResource, CalendarStoreClient, ListenerHandle};
use crate::clock::{self, Clock, SystemClock};
use crate::config::HubConfig;
use crate::error::{AuthorizationError, ConfigError};
use crate::location::{LocationClient, LocationDelegate, LocationResource};
use crate::model::{CalendarEvent, CalendarState, DeviceLocation, WeatherSnapshot};
use crate::weather::{self, WeatherClient, WeatherResource};

/// The platform clients a hub is built from.
pub struct HubClients {
    pub calendar: Box<dyn CalendarStoreClient>,
    pub location: Box<dyn LocationClient>,
    pub weather: Box<dyn WeatherClient>,
}

/// Outcome of [`Hub::start`].
#[derive(Debug, Clone, PartialEq)]
pub struct HubStartReport {
    pub calendar: Result<(), AuthorizationError>,
    /// Where the weather was fetched for; `None` means the fallback.
    pub location: Option<DeviceLocation>,
    pub weather: WeatherSnapshot,
    pub listening: bool,
}

/// One event line on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLine {
    pub identifier: String,
    pub title: String,
    /// Short start time, e.g. `"9:05 AM"`.
    pub starts_at: String,
    pub time_range: String,
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub time_text: String,
    pub weather_symbol: String,
    pub weather_text: String,
    pub events: Vec<EventLine>,
    pub calendar_state: CalendarState,
    /// Why events are missing, when calendar access is insufficient.
    pub calendar_message: Option<String>,
}

impl fmt::Display for DashboardSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.time_text)?;
        writeln!(f, "[{}] {}", self.weather_symbol, self.weather_text)?;
        if let Some(message) = &self.calendar_message {
            return writeln!(f, "{message}");
        }
        if self.events.is_empty() {
            return writeln!(f, "No events");
        }
        for event in &self.events {
            writeln!(f, "{}  {}", event.time_range, event.title)?;
        }
        Ok(())
    }
}

/// Owns the resources and sequences their flows.
pub struct Hub {
    config: HubConfig,
    clock: Arc<dyn Clock>,
    calendar: Arc<CalendarResource>,
    location: LocationResource,
    weather: WeatherResource,
    time_text: Published<String>,
    listener: Mutex<Option<ListenerHandle>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Hub {
    /// Build a hub reading the system clock.
    pub fn new(config: HubConfig, clients: HubClients) -> Result<Self, ConfigError> {
        Self::with_clock(config, clients, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: HubConfig,
        clients: HubClients,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let calendar = CalendarResource::new(
            clients.calendar,
            clock.clone(),
            config.calendar.clone(),
            config.time_zone,
        );
        let location = LocationResource::new(clients.location, config.location.clone());
        let weather = WeatherResource::new(clients.weather, config.weather.clone());
        let time_text = clock::format_in(clock.now(), config.time_zone, &config.display.clock_format);

        Ok(Self {
            calendar: Arc::new(calendar),
            location,
            weather,
            time_text: Published::new("hub.time_text", time_text),
            listener: Mutex::new(None),
            ticker: Mutex::new(None),
            clock,
            config,
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn calendar(&self) -> &Arc<CalendarResource> {
        &self.calendar
    }

    pub fn location(&self) -> &LocationResource {
        &self.location
    }

    /// Delegate for the platform location service to report through.
    pub fn location_delegate(&self) -> LocationDelegate {
        self.location.delegate()
    }

    pub fn weather(&self) -> &WeatherResource {
        &self.weather
    }

    /// Locate the device, then fetch weather there. Falls back to the
    /// configured coordinate when no location is available.
    #[tracing::instrument(skip_all, target = "homehub::hub", name = "hub.refresh_weather")]
    pub async fn refresh_weather(&self) -> (Option<DeviceLocation>, WeatherSnapshot) {
        let location = match self.location.request_location().await {
            Ok(location) => Some(location),
            Err(error) => {
                tracing::info!(target: targets::HUB, %error, "no device location, using fallback");
                None
            }
        };
        (location, self.weather.get_weather(location).await)
    }

    /// Authorize the calendar, load events and start the change listener.
    #[tracing::instrument(skip_all, target = "homehub::hub", name = "hub.setup_calendar")]
    pub async fn setup_calendar(&self) -> Result<(), AuthorizationError> {
        self.calendar.setup().await?;
        if self.config.calendar.listen_for_changes && self.calendar.state().is_ready() {
            let mut listener = self.listener.lock();
            let running = listener.as_ref().is_some_and(ListenerHandle::is_running);
            if !running {
                *listener = Some(self.calendar.spawn_listener());
                tracing::debug!(target: targets::HUB, "calendar listener started");
            }
        }
        Ok(())
    }

    /// Run calendar setup and the weather refresh concurrently.
    pub async fn start(&self) -> HubStartReport {
        let (calendar, (location, weather)) =
            tokio::join!(self.setup_calendar(), self.refresh_weather());
        let report = HubStartReport {
            calendar,
            location,
            weather,
            listening: self.is_listening(),
        };
        tracing::info!(
            target: targets::HUB,
            calendar_ok = report.calendar.is_ok(),
            located = report.location.is_some(),
            listening = report.listening,
            "hub started"
        );
        report
    }

    pub fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .as_ref()
            .is_some_and(ListenerHandle::is_running)
    }

    /// Dashboard clock text for `now`.
    pub fn time_text_at(&self, now: DateTime<Utc>) -> String {
        clock::format_in(now, self.config.time_zone, &self.config.display.clock_format)
    }

    /// The clock text published by the ticker.
    pub fn time_text(&self) -> String {
        self.time_text.get()
    }

    pub fn time_changed(&self) -> &Arc<Signal<String>> {
        self.time_text.changed()
    }

    /// Recompute the clock text from the hub's clock and publish it.
    pub fn tick(&self) -> String {
        let text = self.time_text_at(self.clock.now());
        self.time_text.publish(text.clone());
        text
    }

    /// Publish the clock text every `period` until the hub is dropped or
    /// shut down. Replaces a previously spawned clock.
    pub fn spawn_clock(self: &Arc<Self>, period: Duration) {
        let hub: Weak<Self> = Arc::downgrade(self);
        let period = period.max(Duration::from_millis(1));
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match hub.upgrade() {
                    Some(hub) => {
                        hub.tick();
                    }
                    None => break,
                }
            }
        });
        if let Some(previous) = self.ticker.lock().replace(task) {
            previous.abort();
        }
    }

    /// Combined state for rendering at `now`.
    pub fn snapshot(&self, now: DateTime<Utc>) -> DashboardSnapshot {
        let tz = self.config.time_zone;
        let pattern = &self.config.display.event_time_format;
        let weather = self.weather.weather();
        let calendar_state = self.calendar.state();

        let events = self
            .calendar
            .events()
            .iter()
            .map(|event: &CalendarEvent| EventLine {
                identifier: event.identifier.clone(),
                title: event.title.clone(),
                starts_at: clock::time_as_text(event.start, tz),
                time_range: event.time_range_text(tz, pattern),
            })
            .collect();

        let calendar_message = match calendar_state {
            CalendarState::Ready
            | CalendarState::Refreshing
            | CalendarState::Uninitialized
            | CalendarState::Authorizing => None,
            CalendarState::Denied
            | CalendarState::Restricted
            | CalendarState::NeedsUpgrade
            | CalendarState::Unknown => self.calendar.authorization_message(),
        };

        DashboardSnapshot {
            time_text: self.time_text_at(now),
            weather_symbol: self.weather.symbol(),
            weather_text: weather::temperature_text(weather.as_ref()),
            events,
            calendar_state,
            calendar_message,
        }
    }

    /// Stop the change listener and the clock.
    pub fn shutdown(&self) {
        if let Some(listener) = self.listener.lock().take() {
            listener.cancel();
        }
        if let Some(ticker) = self.ticker.lock().take() {
            ticker.abort();
        }
        tracing::debug!(target: targets::HUB, "hub shut down");
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.get_mut().take() {
            ticker.abort();
        }
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("calendar", &self.calendar)
            .field("location", &self.location)
            .field("weather", &self.weather)
            .field("listening", &self.is_listening())
            .finish_non_exhaustive()
    }
}

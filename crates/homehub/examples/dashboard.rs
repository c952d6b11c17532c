//! Terminal dashboard demo.
//!
//! Runs a hub against the in-memory calendar and a simulated location
//! service. Weather comes from Open-Meteo when the `open-meteo` feature is
//! enabled (the default), otherwise from a fixed snapshot.
//!
//! ```text
//! RUST_LOG=homehub=debug cargo run -p homehub --example dashboard [config.toml]
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use homehub::platform::{InMemoryCalendarStore, SimulatedLocationClient, StaticWeatherClient};
use homehub::{
    AuthorizationStatus, CalendarEvent, DeviceLocation, Hub, HubClients, HubConfig,
    WeatherClient, WeatherSnapshot,
};
use tracing_subscriber::EnvFilter;

fn static_weather() -> Box<dyn WeatherClient> {
    Box::new(StaticWeatherClient::new(WeatherSnapshot::new("cloud.sun", 14.5)))
}

#[cfg(feature = "open-meteo")]
fn weather_client(config: &HubConfig) -> Box<dyn WeatherClient> {
    match homehub::OpenMeteoWeather::new(&config.weather) {
        Ok(client) => Box::new(client),
        Err(error) => {
            tracing::warn!(%error, "Open-Meteo unavailable, using static weather");
            static_weather()
        }
    }
}

#[cfg(not(feature = "open-meteo"))]
fn weather_client(_config: &HubConfig) -> Box<dyn WeatherClient> {
    static_weather()
}

fn sample_events() -> Vec<CalendarEvent> {
    let now = Utc::now();
    let minutes = chrono::Duration::minutes;
    vec![
        CalendarEvent::new("standup", "Standup", now + minutes(20), now + minutes(35)),
        CalendarEvent::new("lunch", "Lunch with Sam", now + minutes(150), now + minutes(210)),
        CalendarEvent::new("review", "Design review", now + minutes(60), now + minutes(120)),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("homehub=info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => HubConfig::from_file(path)?,
        None => HubConfig::default(),
    };

    let store = InMemoryCalendarStore::new(AuthorizationStatus::NotDetermined)
        .with_events(sample_events());
    let location = SimulatedLocationClient::new(AuthorizationStatus::NotDetermined);
    location.grant_on_prompt(AuthorizationStatus::FullAccess);
    location.respond_with(DeviceLocation::new(52.3676, 4.9041));

    let hub = Arc::new(Hub::new(
        config.clone(),
        HubClients {
            calendar: Box::new(store.clone()),
            location: Box::new(location.clone()),
            weather: weather_client(&config),
        },
    )?);
    location.attach(hub.location_delegate());

    let report = hub.start().await;
    if let Err(error) = &report.calendar {
        tracing::warn!(%error, "calendar unavailable");
    }

    hub.spawn_clock(config.display.tick_interval());
    hub.time_changed().connect(|text: &String| tracing::debug!(%text, "tick"));
    hub.calendar()
        .events_changed()
        .connect(|events: &Vec<CalendarEvent>| tracing::info!(count = events.len(), "events changed"));

    println!("{}", hub.snapshot(Utc::now()));

    // Another app adds an event; the listener picks it up.
    let now = Utc::now();
    store.insert_event(CalendarEvent::new(
        "call",
        "Call with the plumber",
        now + chrono::Duration::minutes(5),
        now + chrono::Duration::minutes(15),
    ));
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Remove the first two events in one batch.
    let events = hub.calendar().events();
    let first_two = &events[..events.len().min(2)];
    hub.calendar().remove_events(first_two).await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    println!("{}", hub.snapshot(Utc::now()));

    tokio::time::sleep(Duration::from_secs(2)).await;
    hub.shutdown();
    Ok(())
}

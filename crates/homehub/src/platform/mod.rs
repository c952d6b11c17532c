//! Platform client implementations.
//!
//! Real calendar and location services live outside this crate and are
//! plugged in through [`CalendarStoreClient`](crate::calendar::CalendarStoreClient)
//! and [`LocationClient`](crate::location::LocationClient). The in-memory
//! versions here drive the demo and the test suite.

pub mod memory;

pub use memory::{InMemoryCalendarStore, SimulatedLocationClient, StaticWeatherClient};

//! Networking for HomeHub.
//!
//! This crate provides the HTTP plumbing behind the dashboard's weather
//! summary:
//!
//! - **HTTP Client**: A `reqwest` based JSON client with fixed timeouts
//! - **Open-Meteo**: Current temperature and condition for a coordinate
//!
//! # Example
//!
//! ```ignore
//! use homehub_net::{HttpClient, OpenMeteoClient};
//!
//! let client = OpenMeteoClient::new(HttpClient::new()?);
//! let now = client.current(52.370495, 4.633083).await?;
//! println!("{} {:.1}°C", now.symbol(), now.temperature_c);
//! ```

mod error;
pub mod http;
pub mod open_meteo;

pub use error::{NetworkError, Result};
pub use http::{HttpClient, HttpClientBuilder, HttpClientConfig};
pub use open_meteo::{CurrentConditions, OpenMeteoClient};

//! HTTP client used by the HomeHub network integrations.
//!
//! The client is a thin layer over `reqwest` that fixes the timeouts and the
//! user agent once and maps every failure into [`NetworkError`](crate::NetworkError).

mod client;

pub use client::{HttpClient, HttpClientBuilder, HttpClientConfig};

//! Logging facilities for HomeHub.
//!
//! HomeHub uses the `tracing` crate for instrumentation. To see logs, install
//! a tracing subscriber in the application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("homehub=debug,homehub_core=info")
//!     .init();
//! ```
//!
//! Every log line emitted by the workspace uses one of the [`targets`] below,
//! so filters can select a single resource.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "homehub_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "homehub_core::signal";
    /// Property system target.
    pub const PROPERTY: &str = "homehub_core::property";
    /// Authorization gate target.
    pub const AUTHORIZATION: &str = "homehub::authorization";
    /// Calendar resource target.
    pub const CALENDAR: &str = "homehub::calendar";
    /// Location resource target.
    pub const LOCATION: &str = "homehub::location";
    /// Weather resource target.
    pub const WEATHER: &str = "homehub::weather";
    /// Orchestrator target.
    pub const HUB: &str = "homehub::hub";
    /// Configuration loading target.
    pub const CONFIG: &str = "homehub::config";
    /// HTTP client target.
    pub const NET: &str = "homehub_net";
}

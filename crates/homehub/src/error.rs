//! Error types for the HomeHub resources.
//!
//! Each concern has its own enum. Authorization and removal errors reach the
//! orchestrator as typed results; weather errors never leave
//! [`WeatherResource`](crate::weather::WeatherResource).

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Instruction shown when calendar access was granted write-only.
pub const UPGRADE_INSTRUCTION: &str = "The app has write-only access to Calendar in Settings. \
     Please grant it full access so the app can fetch and delete your events.";

/// Why a gated capability cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    /// The device policy forbids access (parental controls, MDM).
    #[error("This device doesn't allow access to Calendar.")]
    Restricted,

    /// The user refused access.
    #[error("The app doesn't have permission to Calendar in Settings.")]
    Denied,

    /// Access was granted, but not enough of it.
    #[error("{instruction}")]
    InsufficientGrant { instruction: String },

    /// The platform reported a status this crate does not know, or failed
    /// while prompting.
    #[error("An unknown error occurred.")]
    Unknown,
}

impl AuthorizationError {
    /// The write-only grant error with the standard upgrade instruction.
    pub fn insufficient_grant() -> Self {
        Self::InsufficientGrant {
            instruction: UPGRADE_INSTRUCTION.to_string(),
        }
    }
}

// ============================================================================
// Platform errors
// ============================================================================

/// Failure reported by a platform client (calendar store, permission prompt).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// No event with this identifier exists in the store.
    #[error("event '{0}' not found")]
    NotFound(String),

    /// The store refuses modifications.
    #[error("calendar store is read-only")]
    ReadOnly,

    /// Any other platform failure.
    #[error("{0}")]
    Failed(String),
}

impl PlatformError {
    /// Create a generic platform failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A batch removal that was rolled back.
///
/// When this is returned the store has been reset and no event was removed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemovalError {
    /// Staging one event failed.
    #[error("failed to stage removal of event '{identifier}': {source}")]
    Stage {
        identifier: String,
        #[source]
        source: PlatformError,
    },

    /// Committing the staged batch failed.
    #[error("failed to commit event removals: {source}")]
    Commit {
        #[source]
        source: PlatformError,
    },
}

impl RemovalError {
    /// The underlying store error.
    pub fn platform_error(&self) -> &PlatformError {
        match self {
            Self::Stage { source, .. } | Self::Commit { source } => source,
        }
    }
}

/// Failure of a one-shot location request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// No usable location: access refused, empty update, or the request was
    /// abandoned.
    #[error("Something went wrong.")]
    GenericError,

    /// The location service reported an error.
    #[error("location service failed: {0}")]
    Platform(String),

    /// No answer within the configured timeout.
    #[error("location request timed out")]
    TimedOut,
}

/// Failure of a weather backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeatherError {
    /// The backend answered with an error or could not be reached.
    #[error("weather service failed: {0}")]
    Service(String),

    /// HTTP failure talking to Open-Meteo.
    #[cfg(feature = "open-meteo")]
    #[error("weather request failed: {0}")]
    Network(#[from] homehub_net::NetworkError),
}

/// A fetch window whose start lies after its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("window start {start} is after end {end}")]
pub struct WindowError {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

// ============================================================================
// Configuration errors
// ============================================================================

/// Errors loading or validating a [`HubConfig`](crate::config::HubConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML was malformed or had wrong types.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("Invalid value for '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    /// Create an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a validation error.
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

//! One-shot device location.
//!
//! The platform location service is callback based: the resource issues a
//! request on a [`LocationClient`] and the platform later reports through a
//! [`LocationDelegate`]. Each `request_location` call registers its own
//! token and oneshot sender, so overlapping calls share one platform request
//! and every caller is resumed exactly once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use homehub_core::logging::targets;
use homehub_core::{Published, Signal};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::config::LocationConfig;
use crate::error::LocationError;
use crate::model::{AuthorizationStatus, DeviceLocation};

/// The platform location service.
///
/// Completions are reported through the [`LocationDelegate`] obtained from
/// [`LocationResource::delegate`].
pub trait LocationClient: Send + Sync {
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Show the permission prompt. The answer arrives through
    /// [`LocationDelegate::did_change_authorization`].
    fn request_permission(&self);

    /// Ask for a single location fix.
    fn request_one_shot_location(&self);

    /// Apply accuracy and activity settings. Called once on construction.
    fn apply_config(&self, _config: &LocationConfig) {}
}

/// Identifies one `request_location` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(u64);

type Completion = oneshot::Sender<Result<DeviceLocation, LocationError>>;
type Outcome = oneshot::Receiver<Result<DeviceLocation, LocationError>>;

/// The platform request currently outstanding, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    Idle,
    Permission,
    Location,
}

struct Pending {
    completions: HashMap<RequestToken, Completion>,
    in_flight: InFlight,
}

impl Pending {
    /// Remove completions whose caller is gone and go idle when none remain.
    fn prune_abandoned(&mut self) {
        self.completions.retain(|_, completion| !completion.is_closed());
        if self.completions.is_empty() {
            self.in_flight = InFlight::Idle;
        }
    }
}

/// Unregisters a caller when its `request_location` future ends, including
/// when the future is dropped before completion.
struct Registration<'a> {
    shared: &'a Shared,
    token: RequestToken,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.shared.forget(self.token);
    }
}

struct Shared {
    client: Box<dyn LocationClient>,
    pending: Mutex<Pending>,
    next_token: AtomicU64,
    last_location: Published<Option<DeviceLocation>>,
    authorization_status: Published<AuthorizationStatus>,
}

impl Shared {
    /// Register a completion and decide whether a new platform request is
    /// needed for it.
    fn register(&self, wants: InFlight) -> (RequestToken, Outcome, bool) {
        let token = RequestToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();

        let mut pending = self.pending.lock();
        pending.prune_abandoned();
        pending.completions.insert(token, tx);
        let issue = matches!(
            (pending.in_flight, wants),
            (InFlight::Idle, _) | (InFlight::Permission, InFlight::Location)
        );
        if issue {
            pending.in_flight = wants;
        }
        (token, rx, issue)
    }

    /// Drop a caller that stopped waiting. With nobody left waiting, a late
    /// platform answer is ignored and the next call issues a fresh request.
    fn forget(&self, token: RequestToken) {
        let mut pending = self.pending.lock();
        pending.completions.remove(&token);
        pending.prune_abandoned();
    }

    /// Resolve every pending request with `result`.
    fn resolve_all(&self, result: Result<DeviceLocation, LocationError>) -> usize {
        let completions: Vec<Completion> = {
            let mut pending = self.pending.lock();
            pending.in_flight = InFlight::Idle;
            pending.completions.drain().map(|(_, tx)| tx).collect()
        };
        let count = completions.len();
        for completion in completions {
            // The receiver may have timed out already.
            let _ = completion.send(result.clone());
        }
        count
    }
}

/// Callback surface the platform location service reports through.
///
/// Cloneable and cheap. Calls after the resource is dropped are ignored.
#[derive(Clone)]
pub struct LocationDelegate {
    shared: Weak<Shared>,
}

impl LocationDelegate {
    /// New fixes. The first one is used; an empty list fails every pending
    /// request with [`LocationError::GenericError`].
    pub fn did_update_locations(&self, locations: Vec<DeviceLocation>) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        match locations.first().copied() {
            Some(location) => {
                shared.last_location.publish(Some(location));
                let resumed = shared.resolve_all(Ok(location));
                tracing::debug!(target: targets::LOCATION, %location, resumed, "location updated");
            }
            None => {
                let resumed = shared.resolve_all(Err(LocationError::GenericError));
                tracing::warn!(target: targets::LOCATION, resumed, "empty location update");
            }
        }
    }

    pub fn did_fail(&self, message: impl Into<String>) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let message = message.into();
        let resumed = shared.resolve_all(Err(LocationError::Platform(message.clone())));
        tracing::warn!(target: targets::LOCATION, %message, resumed, "location request failed");
    }

    /// The user answered a prompt or changed the grant in settings.
    pub fn did_change_authorization(&self, status: AuthorizationStatus) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        shared.authorization_status.publish(status);

        match status {
            AuthorizationStatus::NotDetermined => {}
            AuthorizationStatus::FullAccess => {
                let continue_with_location = {
                    let mut pending = shared.pending.lock();
                    let waiting = pending.in_flight == InFlight::Permission
                        && !pending.completions.is_empty();
                    if waiting {
                        pending.in_flight = InFlight::Location;
                    }
                    waiting
                };
                if continue_with_location {
                    tracing::debug!(target: targets::LOCATION, "permission granted, requesting location");
                    shared.client.request_one_shot_location();
                }
            }
            AuthorizationStatus::Restricted
            | AuthorizationStatus::Denied
            | AuthorizationStatus::WriteOnly
            | AuthorizationStatus::Unknown => {
                let resumed = shared.resolve_all(Err(LocationError::GenericError));
                if resumed > 0 {
                    tracing::info!(target: targets::LOCATION, %status, resumed, "location access refused");
                }
            }
        }
    }
}

impl std::fmt::Debug for LocationDelegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationDelegate")
            .field("attached", &(self.shared.strong_count() > 0))
            .finish()
    }
}

/// Produces one-shot device locations, respecting authorization.
pub struct LocationResource {
    shared: Arc<Shared>,
    config: LocationConfig,
}

impl LocationResource {
    pub fn new(client: Box<dyn LocationClient>, config: LocationConfig) -> Self {
        client.apply_config(&config);
        let status = client.authorization_status();
        Self {
            shared: Arc::new(Shared {
                client,
                pending: Mutex::new(Pending {
                    completions: HashMap::new(),
                    in_flight: InFlight::Idle,
                }),
                next_token: AtomicU64::new(1),
                last_location: Published::new("location.last_location", None),
                authorization_status: Published::new("location.authorization_status", status),
            }),
            config,
        }
    }

    /// Handle for the platform client to report through.
    pub fn delegate(&self) -> LocationDelegate {
        LocationDelegate {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn config(&self) -> &LocationConfig {
        &self.config
    }

    /// The most recent successful fix.
    pub fn last_location(&self) -> Option<DeviceLocation> {
        self.shared.last_location.get()
    }

    pub fn last_location_changed(&self) -> &Arc<Signal<Option<DeviceLocation>>> {
        self.shared.last_location.changed()
    }

    pub fn authorization_status(&self) -> AuthorizationStatus {
        self.shared.authorization_status.get()
    }

    pub fn authorization_changed(&self) -> &Arc<Signal<AuthorizationStatus>> {
        self.shared.authorization_status.changed()
    }

    /// Number of callers currently waiting for a fix.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.lock().completions.len()
    }

    /// Request one location fix.
    ///
    /// Prompts for permission first when the status is undetermined. Fails
    /// with [`LocationError::GenericError`] without contacting the location
    /// service when access is refused.
    #[tracing::instrument(skip_all, target = "homehub::location", name = "location.request")]
    pub async fn request_location(&self) -> Result<DeviceLocation, LocationError> {
        let status = self.shared.client.authorization_status();
        self.shared.authorization_status.publish(status);

        let wants = match status {
            AuthorizationStatus::FullAccess => InFlight::Location,
            AuthorizationStatus::NotDetermined => InFlight::Permission,
            AuthorizationStatus::Restricted
            | AuthorizationStatus::Denied
            | AuthorizationStatus::WriteOnly
            | AuthorizationStatus::Unknown => {
                tracing::debug!(target: targets::LOCATION, %status, "location access not available");
                return Err(LocationError::GenericError);
            }
        };

        let (token, receiver, issue) = self.shared.register(wants);
        let _registration = Registration {
            shared: &self.shared,
            token,
        };
        if issue {
            match wants {
                InFlight::Permission => self.shared.client.request_permission(),
                InFlight::Location => self.shared.client.request_one_shot_location(),
                InFlight::Idle => {}
            }
        } else {
            tracing::trace!(target: targets::LOCATION, ?token, "joined in-flight request");
        }

        let outcome = match self.config.request_timeout() {
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(target: targets::LOCATION, ?limit, "location request timed out");
                    return Err(LocationError::TimedOut);
                }
            },
            None => receiver.await,
        };

        // A dropped sender means the request was abandoned.
        outcome.unwrap_or(Err(LocationError::GenericError))
    }
}

impl std::fmt::Debug for LocationResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationResource")
            .field("authorization_status", &self.authorization_status())
            .field("last_location", &self.last_location())
            .field("pending_requests", &self.pending_requests())
            .finish()
    }
}

//! In-memory platform clients.
//!
//! Each type is a cheap clonable handle: keep one clone to script and
//! inspect the platform while the resource owns the other.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::authorization::AuthorizationProvider;
use crate::calendar::{CalendarStoreClient, ChangeNotifications};
use crate::config::LocationConfig;
use crate::error::{PlatformError, WeatherError};
use crate::location::{LocationClient, LocationDelegate};
use crate::model::{AuthorizationStatus, CalendarEvent, DeviceLocation, FetchWindow, WeatherSnapshot};
use crate::weather::WeatherClient;

// ============================================================================
// Calendar store
// ============================================================================

struct StoreState {
    status: AuthorizationStatus,
    prompt_answer: Result<AuthorizationStatus, PlatformError>,
    events: Vec<CalendarEvent>,
    staged: Vec<String>,
    failing_stage: HashSet<String>,
    fail_next_commit: bool,
    queries: usize,
    prompts: usize,
}

/// A calendar store held in memory, with change notifications and failure
/// injection.
#[derive(Clone)]
pub struct InMemoryCalendarStore {
    state: Arc<Mutex<StoreState>>,
    changes: broadcast::Sender<()>,
}

impl InMemoryCalendarStore {
    pub fn new(status: AuthorizationStatus) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            state: Arc::new(Mutex::new(StoreState {
                status,
                prompt_answer: Ok(AuthorizationStatus::FullAccess),
                events: Vec::new(),
                staged: Vec::new(),
                failing_stage: HashSet::new(),
                fail_next_commit: false,
                queries: 0,
                prompts: 0,
            })),
            changes,
        }
    }

    pub fn with_events(self, events: impl IntoIterator<Item = CalendarEvent>) -> Self {
        self.state.lock().events.extend(events);
        self
    }

    /// Change the grant as if the user edited settings. Does not notify.
    pub fn set_authorization_status(&self, status: AuthorizationStatus) {
        self.state.lock().status = status;
    }

    /// What the permission prompt answers with.
    pub fn answer_prompt_with(&self, answer: Result<AuthorizationStatus, PlatformError>) {
        self.state.lock().prompt_answer = answer;
    }

    /// Add an event from "another app" and notify subscribers.
    pub fn insert_event(&self, event: CalendarEvent) {
        self.state.lock().events.push(event);
        self.notify_change();
    }

    /// Post a change notification.
    pub fn notify_change(&self) {
        // No subscribers is fine.
        let _ = self.changes.send(());
    }

    /// Make staging the event with this identifier fail.
    pub fn fail_removal_of(&self, identifier: impl Into<String>) {
        self.state.lock().failing_stage.insert(identifier.into());
    }

    pub fn fail_next_commit(&self) {
        self.state.lock().fail_next_commit = true;
    }

    /// Every stored event, in insertion order.
    pub fn stored_events(&self) -> Vec<CalendarEvent> {
        self.state.lock().events.clone()
    }

    pub fn staged_count(&self) -> usize {
        self.state.lock().staged.len()
    }

    /// Number of `events` queries served.
    pub fn query_count(&self) -> usize {
        self.state.lock().queries
    }

    pub fn prompt_count(&self) -> usize {
        self.state.lock().prompts
    }

    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }
}

#[async_trait]
impl AuthorizationProvider for InMemoryCalendarStore {
    fn authorization_status(&self) -> AuthorizationStatus {
        self.state.lock().status
    }

    async fn request_access(&self) -> Result<bool, PlatformError> {
        let mut state = self.state.lock();
        state.prompts += 1;
        let status = state.prompt_answer.clone()?;
        state.status = status;
        Ok(status.is_full_access())
    }
}

#[async_trait]
impl CalendarStoreClient for InMemoryCalendarStore {
    async fn events(&self, window: &FetchWindow) -> Vec<CalendarEvent> {
        let mut state = self.state.lock();
        state.queries += 1;
        state
            .events
            .iter()
            .filter(|event| event.overlaps(window))
            .cloned()
            .collect()
    }

    fn stage_removal(&mut self, event: &CalendarEvent) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        if state.failing_stage.contains(&event.identifier) {
            return Err(PlatformError::failed(format!(
                "cannot remove '{}'",
                event.identifier
            )));
        }
        if !state.events.iter().any(|e| e.identifier == event.identifier) {
            return Err(PlatformError::NotFound(event.identifier.clone()));
        }
        state.staged.push(event.identifier.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), PlatformError> {
        {
            let mut state = self.state.lock();
            if std::mem::take(&mut state.fail_next_commit) {
                return Err(PlatformError::failed("commit rejected"));
            }
            let staged: HashSet<String> = state.staged.drain(..).collect();
            state.events.retain(|e| !staged.contains(&e.identifier));
        }
        self.notify_change();
        Ok(())
    }

    fn reset(&mut self) {
        self.state.lock().staged.clear();
    }

    fn change_notifications(&self) -> ChangeNotifications {
        BroadcastStream::new(self.changes.subscribe())
            .map(|_| ())
            .boxed()
    }
}

impl std::fmt::Debug for InMemoryCalendarStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryCalendarStore")
            .field("status", &state.status)
            .field("events", &state.events.len())
            .field("staged", &state.staged.len())
            .finish()
    }
}

// ============================================================================
// Location service
// ============================================================================

#[derive(Default)]
struct LocationState {
    status: AuthorizationStatus,
    delegate: Option<LocationDelegate>,
    on_permission: Option<AuthorizationStatus>,
    on_location: Option<Result<Vec<DeviceLocation>, String>>,
    applied_config: Option<LocationConfig>,
}

/// A location service answering from a script.
///
/// Without a script, requests stay pending until the test drives the
/// delegate itself.
#[derive(Clone, Default)]
pub struct SimulatedLocationClient {
    state: Arc<Mutex<LocationState>>,
    permission_requests: Arc<AtomicUsize>,
    location_requests: Arc<AtomicUsize>,
}

impl SimulatedLocationClient {
    pub fn new(status: AuthorizationStatus) -> Self {
        let client = Self::default();
        client.state.lock().status = status;
        client
    }

    /// Route answers to a resource's delegate.
    pub fn attach(&self, delegate: LocationDelegate) {
        self.state.lock().delegate = Some(delegate);
    }

    /// Answer the permission prompt with `status`.
    pub fn grant_on_prompt(&self, status: AuthorizationStatus) {
        self.state.lock().on_permission = Some(status);
    }

    /// Answer location requests with `location`.
    pub fn respond_with(&self, location: DeviceLocation) {
        self.state.lock().on_location = Some(Ok(vec![location]));
    }

    /// Answer location requests with an update carrying no fixes.
    pub fn respond_with_empty_update(&self) {
        self.state.lock().on_location = Some(Ok(Vec::new()));
    }

    pub fn fail_with(&self, message: impl Into<String>) {
        self.state.lock().on_location = Some(Err(message.into()));
    }

    /// Change the grant and report it, as if the user edited settings.
    pub fn change_authorization(&self, status: AuthorizationStatus) {
        let delegate = {
            let mut state = self.state.lock();
            state.status = status;
            state.delegate.clone()
        };
        if let Some(delegate) = delegate {
            delegate.did_change_authorization(status);
        }
    }

    /// The delegate, for tests that report by hand.
    pub fn delegate(&self) -> Option<LocationDelegate> {
        self.state.lock().delegate.clone()
    }

    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }

    pub fn location_requests(&self) -> usize {
        self.location_requests.load(Ordering::SeqCst)
    }

    pub fn applied_config(&self) -> Option<LocationConfig> {
        self.state.lock().applied_config.clone()
    }
}

impl LocationClient for SimulatedLocationClient {
    fn authorization_status(&self) -> AuthorizationStatus {
        self.state.lock().status
    }

    fn request_permission(&self) {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        let answer = {
            let mut state = self.state.lock();
            match state.on_permission {
                Some(status) => {
                    state.status = status;
                    state.delegate.clone().map(|delegate| (delegate, status))
                }
                None => None,
            }
        };
        // Report with the lock released; the delegate may call back in.
        if let Some((delegate, status)) = answer {
            delegate.did_change_authorization(status);
        }
    }

    fn request_one_shot_location(&self) {
        self.location_requests.fetch_add(1, Ordering::SeqCst);
        let answer = {
            let state = self.state.lock();
            state.delegate.clone().zip(state.on_location.clone())
        };
        match answer {
            Some((delegate, Ok(locations))) => delegate.did_update_locations(locations),
            Some((delegate, Err(message))) => delegate.did_fail(message),
            None => {}
        }
    }

    fn apply_config(&self, config: &LocationConfig) {
        self.state.lock().applied_config = Some(config.clone());
    }
}

impl std::fmt::Debug for SimulatedLocationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedLocationClient")
            .field("status", &self.state.lock().status)
            .field("permission_requests", &self.permission_requests())
            .field("location_requests", &self.location_requests())
            .finish()
    }
}

// ============================================================================
// Weather service
// ============================================================================

struct WeatherState {
    answer: Result<WeatherSnapshot, WeatherError>,
    delay: Option<Duration>,
    requests: Vec<(f64, f64)>,
}

/// A weather backend with a fixed answer.
#[derive(Clone)]
pub struct StaticWeatherClient {
    state: Arc<Mutex<WeatherState>>,
}

impl StaticWeatherClient {
    pub fn new(snapshot: WeatherSnapshot) -> Self {
        Self::with_answer(Ok(snapshot))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_answer(Err(WeatherError::Service(message.into())))
    }

    fn with_answer(answer: Result<WeatherSnapshot, WeatherError>) -> Self {
        Self {
            state: Arc::new(Mutex::new(WeatherState {
                answer,
                delay: None,
                requests: Vec::new(),
            })),
        }
    }

    /// Wait this long before answering.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().delay = Some(delay);
        self
    }

    pub fn set_answer(&self, answer: Result<WeatherSnapshot, WeatherError>) {
        self.state.lock().answer = answer;
    }

    /// `(latitude, longitude)` of every fetch, in order.
    pub fn requests(&self) -> Vec<(f64, f64)> {
        self.state.lock().requests.clone()
    }
}

#[async_trait]
impl WeatherClient for StaticWeatherClient {
    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<WeatherSnapshot, WeatherError> {
        let delay = {
            let mut state = self.state.lock();
            state.requests.push((latitude, longitude));
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state.lock().answer.clone()
    }
}

impl std::fmt::Debug for StaticWeatherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticWeatherClient")
            .field("requests", &self.state.lock().requests.len())
            .finish()
    }
}

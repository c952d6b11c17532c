//! Calendar access: fetch, batch removal and change listening.
//!
//! All store access goes through one async mutex, so a removal always
//! commits or rolls back before a concurrent fetch reads the store.

use std::collections::HashSet;
use std::pin::pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono_tz::Tz;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use homehub_core::logging::targets;
use homehub_core::{Published, Signal};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::authorization::{AuthorizationGate, AuthorizationProvider};
use crate::clock::Clock;
use crate::config::{CalendarConfig, CalendarWindow};
use crate::error::{AuthorizationError, PlatformError, RemovalError};
use crate::model::{
    AuthorizationStatus, CalendarEvent, CalendarState, FetchWindow, sort_chronologically,
};

/// Stream of change ticks from a calendar store.
pub type ChangeNotifications = BoxStream<'static, ()>;

/// The platform calendar database.
///
/// Removals are two-phase: [`stage_removal`](Self::stage_removal) marks an
/// event, [`commit`](Self::commit) applies every staged removal at once and
/// [`reset`](Self::reset) discards them.
#[async_trait]
pub trait CalendarStoreClient: AuthorizationProvider {
    /// Events overlapping `window`, in no particular order.
    async fn events(&self, window: &FetchWindow) -> Vec<CalendarEvent>;

    fn stage_removal(&mut self, event: &CalendarEvent) -> Result<(), PlatformError>;

    fn commit(&mut self) -> Result<(), PlatformError>;

    fn reset(&mut self);

    /// A fresh subscription to external change notifications.
    fn change_notifications(&self) -> ChangeNotifications;
}

/// One refresh performed by the change listener.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarChange {
    pub window: FetchWindow,
    pub events: Vec<CalendarEvent>,
}

/// Fetches, removes and watches calendar events for the dashboard.
pub struct CalendarResource {
    store: tokio::sync::Mutex<Box<dyn CalendarStoreClient>>,
    clock: Arc<dyn Clock>,
    config: CalendarConfig,
    time_zone: Tz,
    events: Published<Vec<CalendarEvent>>,
    authorization_status: Published<AuthorizationStatus>,
    state: Published<CalendarState>,
}

impl CalendarResource {
    pub fn new(
        store: Box<dyn CalendarStoreClient>,
        clock: Arc<dyn Clock>,
        config: CalendarConfig,
        time_zone: Tz,
    ) -> Self {
        let status = store.authorization_status();
        Self {
            store: tokio::sync::Mutex::new(store),
            clock,
            config,
            time_zone,
            events: Published::new("calendar.events", Vec::new()),
            authorization_status: Published::new("calendar.authorization_status", status),
            state: Published::new("calendar.state", CalendarState::Uninitialized),
        }
    }

    // =========================================================================
    // Published state
    // =========================================================================

    /// Events from the most recent fetch, in display order.
    pub fn events(&self) -> Vec<CalendarEvent> {
        self.events.get()
    }

    pub fn events_changed(&self) -> &Arc<Signal<Vec<CalendarEvent>>> {
        self.events.changed()
    }

    pub fn authorization_status(&self) -> AuthorizationStatus {
        self.authorization_status.get()
    }

    pub fn authorization_changed(&self) -> &Arc<Signal<AuthorizationStatus>> {
        self.authorization_status.changed()
    }

    pub fn state(&self) -> CalendarState {
        self.state.get()
    }

    pub fn state_changed(&self) -> &Arc<Signal<CalendarState>> {
        self.state.changed()
    }

    /// Message for the user when the published status blocks reads.
    pub fn authorization_message(&self) -> Option<String> {
        Self::message_for(self.authorization_status())
    }

    /// Stable message per status, `None` for full access.
    pub fn message_for(status: AuthorizationStatus) -> Option<String> {
        let error = match status {
            AuthorizationStatus::FullAccess => return None,
            AuthorizationStatus::NotDetermined => return Some(status.description().to_string()),
            AuthorizationStatus::Restricted => AuthorizationError::Restricted,
            AuthorizationStatus::Denied => AuthorizationError::Denied,
            AuthorizationStatus::WriteOnly => AuthorizationError::insufficient_grant(),
            AuthorizationStatus::Unknown => AuthorizationError::Unknown,
        };
        Some(error.to_string())
    }

    pub fn is_write_only_or_full_access(&self) -> bool {
        self.authorization_status().is_write_only_or_full_access()
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    // =========================================================================
    // Authorization
    // =========================================================================

    /// Check (and if needed request) full access to the store.
    pub async fn verify(&self) -> Result<bool, AuthorizationError> {
        let store = self.store.lock().await;
        let result = AuthorizationGate::new(&**store).verify().await;
        self.authorization_status
            .publish(store.authorization_status());
        result
    }

    /// Verify access, then load the current window.
    ///
    /// Leaves the resource in `Ready` on success, otherwise in the state
    /// matching the failure.
    #[tracing::instrument(skip_all, target = "homehub::calendar", name = "calendar.setup")]
    pub async fn setup(&self) -> Result<(), AuthorizationError> {
        self.state.publish(CalendarState::Authorizing);

        match self.verify().await {
            Ok(true) => {
                self.fetch_latest_events().await;
                self.state.publish(CalendarState::Ready);
                Ok(())
            }
            Ok(false) => {
                let status = self.authorization_status();
                tracing::info!(target: targets::CALENDAR, %status, "calendar access not granted");
                let state = match CalendarState::for_insufficient(status) {
                    CalendarState::Uninitialized | CalendarState::Ready => CalendarState::Denied,
                    other => other,
                };
                self.state.publish(state);
                Ok(())
            }
            Err(error) => {
                self.state.publish(state_for_error(&error));
                Err(error)
            }
        }
    }

    // =========================================================================
    // Fetching
    // =========================================================================

    /// The window `fetch_latest_events` would query right now.
    pub fn current_window(&self) -> FetchWindow {
        let now = self.clock.now();
        match self.config.window {
            CalendarWindow::UntilNextDay => FetchWindow::until_next_day(now, self.time_zone),
            CalendarWindow::OneMonth => FetchWindow::one_month(now),
            CalendarWindow::NextMinutes { minutes } => FetchWindow::next_minutes(now, minutes),
        }
    }

    /// Events starting inside `window`, sorted by start then identifier.
    ///
    /// Empty unless the store grants full access.
    pub async fn fetch_events(&self, window: &FetchWindow) -> Vec<CalendarEvent> {
        let store = self.store.lock().await;
        query(&**store, window).await
    }

    /// Fetch the current window and publish the result.
    #[tracing::instrument(skip_all, target = "homehub::calendar", name = "calendar.fetch_latest")]
    pub async fn fetch_latest_events(&self) -> Vec<CalendarEvent> {
        let window = self.current_window();
        let events = self.fetch_events(&window).await;
        tracing::debug!(
            target: targets::CALENDAR,
            %window,
            count = events.len(),
            "fetched events"
        );
        self.events.publish_always(events.clone());
        events
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove `events` as one batch.
    ///
    /// Any failure resets the store and nothing is removed.
    #[tracing::instrument(
        skip_all,
        target = "homehub::calendar",
        name = "calendar.remove",
        fields(count = events.len())
    )]
    pub async fn remove_events(&self, events: &[CalendarEvent]) -> Result<(), RemovalError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut store = self.store.lock().await;
        for event in events {
            if let Err(source) = store.stage_removal(event) {
                store.reset();
                tracing::warn!(
                    target: targets::CALENDAR,
                    identifier = %event.identifier,
                    error = %source,
                    "staging removal failed, batch rolled back"
                );
                return Err(RemovalError::Stage {
                    identifier: event.identifier.clone(),
                    source,
                });
            }
        }
        if let Err(source) = store.commit() {
            store.reset();
            tracing::warn!(
                target: targets::CALENDAR,
                error = %source,
                "commit failed, batch rolled back"
            );
            return Err(RemovalError::Commit { source });
        }
        drop(store);

        let removed: HashSet<&str> = events.iter().map(|e| e.identifier.as_str()).collect();
        self.events
            .modify(|current| current.retain(|e| !removed.contains(e.identifier.as_str())));
        tracing::info!(target: targets::CALENDAR, count = removed.len(), "events removed");
        Ok(())
    }

    // =========================================================================
    // Change listening
    // =========================================================================

    /// Subscribe to store changes.
    ///
    /// The subscription opens when the stream is first polled. Each
    /// notification re-checks authorization: without full access the stream
    /// ends, otherwise the current window is refetched, published and
    /// yielded. The stream holds only a weak reference and ends once the
    /// resource is dropped.
    pub fn listen_for_changes(
        self: &Arc<Self>,
    ) -> impl Stream<Item = CalendarChange> + Send + use<> {
        let resource = Arc::downgrade(self);
        async_stream::stream! {
            let subscription = match resource.upgrade() {
                Some(strong) => Some(strong.store.lock().await.change_notifications()),
                None => None,
            };
            if let Some(mut notifications) = subscription {
                while notifications.next().await.is_some() {
                    let change = match resource.upgrade() {
                        Some(strong) => strong.refresh_after_change().await,
                        None => {
                            tracing::debug!(target: targets::CALENDAR, "resource dropped, listener ending");
                            None
                        }
                    };
                    match change {
                        Some(change) => yield change,
                        None => break,
                    }
                }
            }
        }
    }

    /// Run [`listen_for_changes`](Self::listen_for_changes) on the tokio
    /// runtime until cancelled.
    pub fn spawn_listener(self: &Arc<Self>) -> ListenerHandle {
        let changes = self.listen_for_changes();
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut changes = pin!(changes);
            let drain = async {
                while let Some(change) = changes.next().await {
                    tracing::trace!(
                        target: targets::CALENDAR,
                        count = change.events.len(),
                        "listener refreshed events"
                    );
                }
            };
            tokio::select! {
                _ = drain => tracing::debug!(target: targets::CALENDAR, "listener stream ended"),
                _ = cancel_rx => tracing::debug!(target: targets::CALENDAR, "listener cancelled"),
            }
        });

        ListenerHandle {
            cancel: Mutex::new(Some(cancel_tx)),
            task: Some(task),
        }
    }

    async fn refresh_after_change(&self) -> Option<CalendarChange> {
        let store = self.store.lock().await;
        let status = store.authorization_status();
        self.authorization_status.publish(status);

        if !status.is_full_access() {
            tracing::debug!(
                target: targets::CALENDAR,
                %status,
                "access lost, listener ending"
            );
            self.state.publish(CalendarState::for_insufficient(status));
            return None;
        }

        self.state.publish(CalendarState::Refreshing);
        let window = self.current_window();
        let events = query(&**store, &window).await;
        drop(store);

        self.events.publish_always(events.clone());
        self.state.publish(CalendarState::Ready);
        Some(CalendarChange { window, events })
    }
}

impl std::fmt::Debug for CalendarResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarResource")
            .field("state", &self.state())
            .field("authorization_status", &self.authorization_status())
            .field("events", &self.events.with(Vec::len))
            .finish_non_exhaustive()
    }
}

/// State to settle in after `setup` fails with `error`.
pub fn state_for_error(error: &AuthorizationError) -> CalendarState {
    match error {
        AuthorizationError::Restricted => CalendarState::Restricted,
        AuthorizationError::Denied => CalendarState::Denied,
        AuthorizationError::InsufficientGrant { .. } => CalendarState::NeedsUpgrade,
        AuthorizationError::Unknown => CalendarState::Unknown,
    }
}

async fn query(store: &dyn CalendarStoreClient, window: &FetchWindow) -> Vec<CalendarEvent> {
    if !store.authorization_status().is_full_access() {
        return Vec::new();
    }
    let mut events = store.events(window).await;
    events.retain(|event| window.contains(event.start));
    sort_chronologically(&mut events);
    events
}

/// Handle to a spawned change listener. Dropping it cancels the listener.
#[derive(Debug)]
pub struct ListenerHandle {
    cancel: Mutex<Option<oneshot::Sender<()>>>,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Ask the listener to stop. Returns `false` if it was already stopped.
    pub fn cancel(&self) -> bool {
        match self.cancel.lock().take() {
            Some(sender) => sender.send(()).is_ok(),
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Wait for the listener task to finish.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!(target: targets::CALENDAR, %error, "listener task failed");
            }
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

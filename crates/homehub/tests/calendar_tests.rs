//! Integration tests for the calendar resource.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use futures_util::StreamExt;
use homehub::platform::InMemoryCalendarStore;
use homehub::{
    AuthorizationError, AuthorizationStatus, CalendarConfig, CalendarEvent, CalendarResource,
    CalendarState, FetchWindow, FixedClock, PlatformError, RemovalError,
};

fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, h, m, 0).unwrap()
}

fn event(id: &str, title: &str, start: DateTime<Utc>) -> CalendarEvent {
    CalendarEvent::new(id, title, start, start + chrono::Duration::minutes(30))
}

fn resource(store: &InMemoryCalendarStore) -> Arc<CalendarResource> {
    Arc::new(CalendarResource::new(
        Box::new(store.clone()),
        Arc::new(FixedClock::new(utc(1, 0, 0))),
        CalendarConfig::default(),
        Tz::UTC,
    ))
}

fn titles(events: &[CalendarEvent]) -> Vec<&str> {
    events.iter().map(|e| e.title.as_str()).collect()
}

/// Poll until `check` holds or a second passes.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

// ============================================================================
// Fetching
// ============================================================================

#[tokio::test]
async fn test_fetch_returns_only_events_starting_in_window() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::FullAccess).with_events([
        event("3", "OutOfWindow", utc(3, 9, 0)),
        event("2", "Review", utc(1, 14, 0)),
        event("1", "Standup", utc(1, 9, 0)),
    ]);
    let calendar = resource(&store);

    let window = FetchWindow::new(utc(1, 0, 0), utc(2, 0, 0)).unwrap();
    let events = calendar.fetch_events(&window).await;

    assert_eq!(titles(&events), ["Standup", "Review"]);
}

#[tokio::test]
async fn test_fetch_excludes_events_starting_before_window() {
    // Overlaps the window but starts before it.
    let store = InMemoryCalendarStore::new(AuthorizationStatus::FullAccess).with_events([
        CalendarEvent::new("early", "Overnight", utc(1, 23, 0), utc(2, 2, 0)),
        event("edge", "AtEnd", utc(3, 0, 0)),
        event("in", "Breakfast", utc(2, 8, 0)),
    ]);
    let calendar = resource(&store);

    let window = FetchWindow::new(utc(2, 0, 0), utc(3, 0, 0)).unwrap();
    assert_eq!(titles(&calendar.fetch_events(&window).await), ["Breakfast"]);
}

#[tokio::test]
async fn test_fetch_breaks_ties_on_identifier() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::FullAccess).with_events([
        event("b", "Second", utc(1, 9, 0)),
        event("a", "First", utc(1, 9, 0)),
        event("a", "FirstAgain", utc(1, 9, 0)),
    ]);
    let calendar = resource(&store);

    let window = FetchWindow::new(utc(1, 0, 0), utc(2, 0, 0)).unwrap();
    let events = calendar.fetch_events(&window).await;
    let ids: Vec<_> = events.iter().map(|e| e.identifier.as_str()).collect();
    assert_eq!(ids, ["a", "a", "b"]);
}

#[tokio::test]
async fn test_fetch_is_empty_without_full_access() {
    for status in [
        AuthorizationStatus::NotDetermined,
        AuthorizationStatus::WriteOnly,
        AuthorizationStatus::Denied,
    ] {
        let store = InMemoryCalendarStore::new(status)
            .with_events([event("1", "Standup", utc(1, 9, 0))]);
        let calendar = resource(&store);

        let window = FetchWindow::new(utc(1, 0, 0), utc(2, 0, 0)).unwrap();
        assert!(calendar.fetch_events(&window).await.is_empty());
        assert_eq!(store.query_count(), 0);
    }
}

#[tokio::test]
async fn test_fetch_latest_publishes_current_window() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::FullAccess).with_events([
        event("1", "Today", utc(1, 9, 0)),
        event("2", "Tomorrow", utc(2, 9, 0)),
    ]);
    let calendar = resource(&store);

    let published = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = published.clone();
    calendar
        .events_changed()
        .connect(move |events: &Vec<CalendarEvent>| sink.lock().push(events.len()));

    let events = calendar.fetch_latest_events().await;
    assert_eq!(titles(&events), ["Today"]);
    assert_eq!(calendar.events(), events);
    assert_eq!(*published.lock(), vec![1]);
}

// ============================================================================
// Setup and authorization
// ============================================================================

#[tokio::test]
async fn test_setup_with_full_access_loads_events() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::FullAccess)
        .with_events([event("1", "Standup", utc(1, 9, 0))]);
    let calendar = resource(&store);

    assert_eq!(calendar.state(), CalendarState::Uninitialized);
    calendar.setup().await.unwrap();

    assert_eq!(calendar.state(), CalendarState::Ready);
    assert_eq!(titles(&calendar.events()), ["Standup"]);
    assert_eq!(calendar.authorization_message(), None);
    assert_eq!(store.prompt_count(), 0);
}

#[tokio::test]
async fn test_setup_prompts_when_not_determined() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::NotDetermined)
        .with_events([event("1", "Standup", utc(1, 9, 0))]);
    let calendar = resource(&store);

    calendar.setup().await.unwrap();

    assert_eq!(store.prompt_count(), 1);
    assert_eq!(calendar.authorization_status(), AuthorizationStatus::FullAccess);
    assert_eq!(calendar.events().len(), 1);
}

#[tokio::test]
async fn test_setup_refused_prompt_settles_in_denied() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::NotDetermined);
    store.answer_prompt_with(Ok(AuthorizationStatus::Denied));
    let calendar = resource(&store);

    assert_eq!(calendar.setup().await, Ok(()));
    assert_eq!(calendar.state(), CalendarState::Denied);
    assert_eq!(store.query_count(), 0);
}

#[tokio::test]
async fn test_setup_prompt_failure_is_unknown() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::NotDetermined);
    store.answer_prompt_with(Err(PlatformError::failed("prompt unavailable")));
    let calendar = resource(&store);

    assert_eq!(calendar.setup().await, Err(AuthorizationError::Unknown));
    assert_eq!(calendar.state(), CalendarState::Unknown);
}

#[tokio::test]
async fn test_setup_maps_refusals_to_states_and_messages() {
    let cases = [
        (
            AuthorizationStatus::Restricted,
            AuthorizationError::Restricted,
            CalendarState::Restricted,
        ),
        (
            AuthorizationStatus::Denied,
            AuthorizationError::Denied,
            CalendarState::Denied,
        ),
        (
            AuthorizationStatus::WriteOnly,
            AuthorizationError::insufficient_grant(),
            CalendarState::NeedsUpgrade,
        ),
        (
            AuthorizationStatus::Unknown,
            AuthorizationError::Unknown,
            CalendarState::Unknown,
        ),
    ];

    for (status, error, state) in cases {
        let store = InMemoryCalendarStore::new(status);
        let calendar = resource(&store);

        assert_eq!(calendar.setup().await, Err(error.clone()));
        assert_eq!(calendar.state(), state);
        assert_eq!(calendar.authorization_message(), Some(error.to_string()));
        assert_eq!(store.prompt_count(), 0);
    }
}

// ============================================================================
// Removal
// ============================================================================

#[tokio::test]
async fn test_remove_events_commits_batch() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::FullAccess).with_events([
        event("1", "Standup", utc(1, 9, 0)),
        event("2", "Review", utc(1, 14, 0)),
        event("3", "Retro", utc(1, 16, 0)),
    ]);
    let calendar = resource(&store);
    let events = calendar.fetch_latest_events().await;

    calendar.remove_events(&events[..2]).await.unwrap();

    assert_eq!(titles(&store.stored_events()), ["Retro"]);
    assert_eq!(titles(&calendar.events()), ["Retro"]);
    assert_eq!(store.staged_count(), 0);
}

#[tokio::test]
async fn test_remove_rolls_back_when_second_stage_fails() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::FullAccess).with_events([
        event("1", "Standup", utc(1, 9, 0)),
        event("2", "Review", utc(1, 14, 0)),
        event("3", "Retro", utc(1, 16, 0)),
    ]);
    store.fail_removal_of("2");
    let calendar = resource(&store);
    let before = store.stored_events();
    let events = calendar.fetch_latest_events().await;

    let err = calendar.remove_events(&events).await.unwrap_err();

    assert!(matches!(&err, RemovalError::Stage { identifier, .. } if identifier == "2"));
    assert_eq!(store.stored_events(), before);
    assert_eq!(store.staged_count(), 0);
    assert_eq!(calendar.events().len(), 3);
}

#[tokio::test]
async fn test_remove_rolls_back_when_commit_fails() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::FullAccess)
        .with_events([event("1", "Standup", utc(1, 9, 0))]);
    store.fail_next_commit();
    let calendar = resource(&store);
    let events = calendar.fetch_latest_events().await;

    let err = calendar.remove_events(&events).await.unwrap_err();

    assert!(matches!(err, RemovalError::Commit { .. }));
    assert_eq!(store.stored_events().len(), 1);
    assert_eq!(store.staged_count(), 0);

    // The failure is one-shot; a retry succeeds.
    calendar.remove_events(&events).await.unwrap();
    assert!(store.stored_events().is_empty());
}

#[tokio::test]
async fn test_remove_unknown_event_is_stage_error() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::FullAccess)
        .with_events([event("1", "Standup", utc(1, 9, 0))]);
    let calendar = resource(&store);

    let ghost = event("ghost", "Ghost", utc(1, 10, 0));
    let err = calendar
        .remove_events(&[event("1", "Standup", utc(1, 9, 0)), ghost])
        .await
        .unwrap_err();

    assert_eq!(
        err.platform_error(),
        &PlatformError::NotFound("ghost".to_string())
    );
    assert_eq!(store.stored_events().len(), 1);
}

#[tokio::test]
async fn test_remove_with_duplicate_identifiers_keeps_store_and_events_consistent() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::FullAccess).with_events([
        event("dup", "Morning", utc(1, 9, 0)),
        event("2", "Review", utc(1, 14, 0)),
        event("dup", "Evening", utc(1, 17, 0)),
    ]);
    let calendar = resource(&store);
    let events = calendar.fetch_latest_events().await;
    assert_eq!(titles(&events), ["Morning", "Review", "Evening"]);

    // The same event twice in one batch.
    let morning = events[0].clone();
    calendar
        .remove_events(&[morning.clone(), morning])
        .await
        .unwrap();

    assert_eq!(titles(&store.stored_events()), ["Review"]);
    assert_eq!(calendar.events(), store.stored_events());
    assert_eq!(store.staged_count(), 0);

    // Refetching agrees with what was published.
    assert_eq!(titles(&calendar.fetch_latest_events().await), ["Review"]);
}

#[tokio::test]
async fn test_failed_removal_with_duplicate_identifiers_changes_nothing() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::FullAccess).with_events([
        event("dup", "Morning", utc(1, 9, 0)),
        event("dup", "Evening", utc(1, 17, 0)),
    ]);
    store.fail_next_commit();
    let calendar = resource(&store);
    let events = calendar.fetch_latest_events().await;

    let err = calendar.remove_events(&events).await.unwrap_err();

    assert!(matches!(err, RemovalError::Commit { .. }));
    assert_eq!(titles(&store.stored_events()), ["Morning", "Evening"]);
    assert_eq!(titles(&calendar.events()), ["Morning", "Evening"]);
    assert_eq!(store.staged_count(), 0);
}

#[tokio::test]
async fn test_remove_empty_batch_is_noop() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::FullAccess);
    store.fail_next_commit();
    let calendar = resource(&store);
    assert_eq!(calendar.remove_events(&[]).await, Ok(()));
}

// ============================================================================
// Change listening
// ============================================================================

#[tokio::test]
async fn test_listener_refetches_on_change() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::FullAccess)
        .with_events([event("1", "Standup", utc(1, 9, 0))]);
    let calendar = resource(&store);
    calendar.setup().await.unwrap();

    let mut changes = Box::pin(calendar.listen_for_changes());
    // The subscription opens on first poll.
    let next = tokio::spawn(async move { changes.next().await });
    assert!(eventually(|| store.subscriber_count() == 1).await);

    store.insert_event(event("2", "Lunch", utc(1, 12, 0)));
    let change = next.await.unwrap().expect("a change");

    assert_eq!(titles(&change.events), ["Standup", "Lunch"]);
    assert_eq!(titles(&calendar.events()), ["Standup", "Lunch"]);
    assert_eq!(calendar.state(), CalendarState::Ready);
}

#[tokio::test]
async fn test_listener_ends_after_access_is_revoked() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::FullAccess)
        .with_events([event("1", "Standup", utc(1, 9, 0))]);
    let calendar = resource(&store);
    calendar.setup().await.unwrap();

    let mut changes = Box::pin(calendar.listen_for_changes());
    let collected = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(change) = changes.next().await {
            seen.push(change);
        }
        seen
    });
    assert!(eventually(|| store.subscriber_count() == 1).await);

    store.notify_change();
    assert!(eventually(|| store.query_count() == 2).await);

    store.set_authorization_status(AuthorizationStatus::Denied);
    store.notify_change();

    let seen = tokio::time::timeout(Duration::from_secs(1), collected)
        .await
        .expect("listener ended")
        .unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(store.query_count(), 2);
    assert_eq!(calendar.state(), CalendarState::Denied);
    assert_eq!(calendar.authorization_status(), AuthorizationStatus::Denied);
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn test_listener_ends_when_resource_is_dropped() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::FullAccess);
    let calendar = resource(&store);

    let mut changes = Box::pin(calendar.listen_for_changes());
    let next = tokio::spawn(async move { changes.next().await });
    assert!(eventually(|| store.subscriber_count() == 1).await);

    drop(calendar);
    store.notify_change();

    let result = tokio::time::timeout(Duration::from_secs(1), next)
        .await
        .expect("listener ended")
        .unwrap();
    assert!(result.is_none());
    assert_eq!(store.query_count(), 0);
}

#[tokio::test]
async fn test_each_listen_call_opens_a_fresh_subscription() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::FullAccess);
    let calendar = resource(&store);

    let first = calendar.spawn_listener();
    let second = calendar.spawn_listener();
    assert!(eventually(|| store.subscriber_count() == 2).await);

    drop(first);
    assert!(eventually(|| store.subscriber_count() == 1).await);
    assert!(second.is_running());

    assert!(second.cancel());
    assert!(!second.cancel());
    second.join().await;
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn test_spawned_listener_stops_on_revocation() {
    let store = InMemoryCalendarStore::new(AuthorizationStatus::FullAccess);
    let calendar = resource(&store);
    calendar.setup().await.unwrap();

    let listener = calendar.spawn_listener();
    assert!(eventually(|| store.subscriber_count() == 1).await);

    store.set_authorization_status(AuthorizationStatus::WriteOnly);
    store.notify_change();

    tokio::time::timeout(Duration::from_secs(1), listener.join())
        .await
        .expect("listener stopped");
    assert_eq!(calendar.state(), CalendarState::NeedsUpgrade);
}

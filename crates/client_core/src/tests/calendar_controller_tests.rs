use std::sync::Arc;

use shared::domain::EventColor;

use super::*;
use crate::{alerts::RecordingAlertSink, test_support::*};

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("date")
}

async fn settle(calendar: &mut CalendarController, done: impl Fn(&CalendarState) -> bool) {
    tokio::time::timeout(SETTLE_TIMEOUT, async {
        while !done(calendar.state()) {
            assert!(calendar.process_next().await, "message channel closed");
        }
    })
    .await
    .expect("calendar settled in time");
}

#[tokio::test]
async fn adding_an_event_shows_up_on_its_day() {
    let (_, ctx) = memory_context("u1").await;
    let alerts = Arc::new(RecordingAlertSink::default());
    let day = ymd(2025, 3, 10);
    let mut calendar = CalendarController::new(&ctx, alerts.clone(), day);
    calendar.start();

    calendar.open_add(day);
    calendar.edit_draft(|draft| {
        draft.title = "Dentist".into();
        draft.color = EventColor::Pink;
    });
    assert!(calendar.save_modal().await);
    assert!(calendar.state().modal.is_none());

    settle(&mut calendar, |s| s.events_on(day).len() == 1).await;
    let event = calendar.state().events_on(day)[0].clone();
    assert_eq!(event.title, "Dentist");
    assert_eq!(event.color, EventColor::Pink);
    assert!(event.all_day);
    assert!(alerts.messages().is_empty());
}

#[tokio::test]
async fn blank_title_is_a_silent_no_op() {
    let (_, ctx) = memory_context("u1").await;
    let alerts = Arc::new(RecordingAlertSink::default());
    let mut calendar = CalendarController::new(&ctx, alerts.clone(), ymd(2025, 3, 10));
    calendar.open_add(ymd(2025, 3, 10));

    assert!(!calendar.save_modal().await);
    assert!(calendar.state().modal.is_some());
    assert!(alerts.messages().is_empty());
    assert!(EventRepository::new(&ctx).all().await.expect("all").is_empty());
}

#[tokio::test]
async fn editing_and_deleting_go_through_the_open_event() {
    let (_, ctx) = memory_context("u1").await;
    let alerts = Arc::new(RecordingAlertSink::default());
    let day = ymd(2025, 3, 10);
    let mut calendar = CalendarController::new(&ctx, alerts, day);
    calendar.start();

    calendar.open_add(day);
    calendar.edit_draft(|draft| draft.title = "Standup".into());
    assert!(calendar.save_modal().await);
    settle(&mut calendar, |s| s.events.len() == 1).await;
    let event_id = calendar.state().events[0].id.clone();

    calendar.open_edit(&event_id);
    calendar.edit_draft(|draft| {
        draft.all_day = false;
        draft.start_time = "08:45".into();
        draft.date = "2025-03-11".into();
    });
    assert!(calendar.save_modal().await);
    settle(&mut calendar, |s| s.events.iter().any(|e| !e.all_day)).await;
    let moved = &calendar.state().events[0];
    assert_eq!(moved.date, ymd(2025, 3, 11));
    assert!(moved.updated_at.is_some());

    calendar.open_edit(&event_id);
    assert!(calendar.delete_open_event().await);
    settle(&mut calendar, |s| s.events.is_empty()).await;
}

#[tokio::test]
async fn failed_save_alerts_once_and_keeps_the_draft() {
    let store = FlakyStore::new(memory_storage().await);
    store.fail_writes(true);
    let ctx = ClientContext::new(store, identity("u1"));
    let alerts = Arc::new(RecordingAlertSink::default());
    let day = ymd(2025, 3, 10);
    let mut calendar = CalendarController::new(&ctx, alerts.clone(), day);

    calendar.open_add(day);
    calendar.edit_draft(|draft| draft.title = "Gym".into());
    assert!(!calendar.save_modal().await);
    assert_eq!(alerts.messages(), vec!["Failed to add event".to_string()]);
    assert_eq!(
        calendar.state().modal.as_ref().map(|m| m.draft().title.as_str()),
        Some("Gym")
    );
}

#[tokio::test]
async fn navigation_is_local_state_only() {
    let (_, ctx) = memory_context("u1").await;
    let alerts = Arc::new(RecordingAlertSink::default());
    let mut calendar = CalendarController::new(&ctx, alerts, ymd(2025, 3, 10));
    calendar.next();
    assert_eq!(calendar.state().anchor, ymd(2025, 4, 1));
    calendar.set_view(CalendarView::Week);
    calendar.previous();
    assert_eq!(calendar.state().anchor, ymd(2025, 3, 25));
    calendar.pick_day(ymd(2025, 3, 14));
    assert_eq!(calendar.state().view, CalendarView::Day);
}

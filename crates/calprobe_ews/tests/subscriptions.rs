// --- File: crates/calprobe_ews/tests/subscriptions.rs ---
//! Pull and streaming notification delivery while another task mutates the
//! calendar concurrently.

use calprobe_ews::fixture::TestContext;
use calprobe_ews::notify::{fetch_event_items, observe_pull, observe_streaming};
use calprobe_ews::HarnessError;
use calprobe_common::models::{
    AffectedOccurrences, ConflictResolutionMode, DeleteMode, EventKind, Field, FolderId,
    NewAppointment, PropertySet, SendCancellationsMode, SendInvitationsMode,
};
use calprobe_ews::session::Session;
use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;

fn meeting(subject: &str, offset_minutes: i64) -> NewAppointment {
    let start = Utc::now() + ChronoDuration::hours(1) + ChronoDuration::minutes(offset_minutes);
    NewAppointment::new(subject, start, start + ChronoDuration::minutes(30))
}

/// Create `count` appointments, spaced out so deliveries interleave with the
/// observer instead of landing in one burst.
async fn produce_spaced(session: Session, count: usize) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    for n in 0..count {
        session
            .create_appointment(
                meeting(&format!("Мероприятие {n}"), n as i64 * 10),
                SendInvitationsMode::SendToNone,
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
    }
}

#[tokio::test]
async fn pull_observer_collects_concurrent_creations_across_batches() {
    let context = TestContext::with_mock();
    let session = context.factory.direct_session(&context.settings().user1);

    let producer = tokio::spawn(produce_spaced(session.clone(), 10));
    let observed = observe_pull(
        &session,
        &[FolderId::calendar()],
        &[EventKind::Created],
        10,
        Duration::from_millis(20),
        Duration::from_secs(10),
    )
    .await
    .unwrap();
    producer.await.unwrap();

    assert_eq!(observed.events.len(), 10);
    assert!(observed
        .events
        .iter()
        .all(|event| event.kind == EventKind::Created));
    // Deliveries are paged, so a burst of ten never fits one batch.
    assert!(observed.batches > 1);
}

#[tokio::test]
async fn pull_reports_deletion_as_modification() {
    let context = TestContext::with_mock();
    let session = context.factory.direct_session(&context.settings().user1);

    let producer = {
        let session = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let id = session
                .create_appointment(meeting("Мероприятие", 0), SendInvitationsMode::SendToNone)
                .await
                .unwrap();

            let mut loaded = session
                .get_appointment(&id, &PropertySet::all())
                .await
                .unwrap();
            loaded.subject = Some("Новое название моего мероприятия".to_string());
            session
                .update_appointment(&loaded, ConflictResolutionMode::AlwaysOverwrite)
                .await
                .unwrap();

            session
                .delete_appointments(
                    &[id],
                    DeleteMode::HardDelete,
                    SendCancellationsMode::SendToNone,
                    AffectedOccurrences::AllOccurrences,
                )
                .await
                .unwrap();
        })
    };

    let observed = observe_pull(
        &session,
        &[FolderId::calendar()],
        &[EventKind::Created, EventKind::Modified],
        3,
        Duration::from_millis(20),
        Duration::from_secs(5),
    )
    .await
    .unwrap();
    producer.await.unwrap();

    // Create, update, delete: the deletion surfaces as a second Modified
    // on the pull path.
    let kinds: Vec<_> = observed.events.iter().map(|event| event.kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Created, EventKind::Modified, EventKind::Modified]
    );
}

#[tokio::test]
async fn correlating_pull_events_skips_already_deleted_items() {
    let context = TestContext::with_mock();
    let session = context.factory.direct_session(&context.settings().user1);

    let producer = {
        let session = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let id = session
                .create_appointment(meeting("Мероприятие", 0), SendInvitationsMode::SendToNone)
                .await
                .unwrap();
            session
                .delete_appointments(
                    &[id],
                    DeleteMode::HardDelete,
                    SendCancellationsMode::SendToNone,
                    AffectedOccurrences::AllOccurrences,
                )
                .await
                .unwrap();
        })
    };

    let observed = observe_pull(
        &session,
        &[FolderId::calendar()],
        &[EventKind::Created, EventKind::Modified],
        2,
        Duration::from_millis(20),
        Duration::from_secs(5),
    )
    .await
    .unwrap();
    producer.await.unwrap();

    // Both events reference an item that no longer exists.
    let items = fetch_event_items(&session, &observed.events, &PropertySet::of(&[Field::Subject]))
        .await
        .unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn streaming_observer_collects_concurrent_creations() {
    let context = TestContext::with_mock();
    let session = context.factory.direct_session(&context.settings().user2);

    let producer = tokio::spawn(produce_spaced(session.clone(), 10));
    let observed = observe_streaming(
        &session,
        &[FolderId::calendar()],
        &[EventKind::Created],
        10,
        Duration::from_secs(10),
    )
    .await
    .unwrap();
    producer.await.unwrap();

    assert_eq!(observed.events.len(), 10);
    assert!(observed
        .events
        .iter()
        .all(|event| event.kind == EventKind::Created));
    // Spaced producers never land in a single delivery.
    assert!(observed.batches > 1);
}

#[tokio::test]
async fn streaming_delivers_deletions_unchanged() {
    let context = TestContext::with_mock();
    let session = context.factory.direct_session(&context.settings().user3);

    let producer = {
        let session = session.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let id = session
                .create_appointment(meeting("Мероприятие", 0), SendInvitationsMode::SendToNone)
                .await
                .unwrap();
            session
                .delete_appointments(
                    &[id],
                    DeleteMode::HardDelete,
                    SendCancellationsMode::SendToNone,
                    AffectedOccurrences::AllOccurrences,
                )
                .await
                .unwrap();
        })
    };

    let observed = observe_streaming(
        &session,
        &[FolderId::calendar()],
        &[EventKind::Deleted],
        1,
        Duration::from_secs(5),
    )
    .await
    .unwrap();
    producer.await.unwrap();

    assert_eq!(observed.events.len(), 1);
    assert_eq!(observed.events[0].kind, EventKind::Deleted);
}

#[tokio::test]
async fn pull_observer_fails_cleanly_when_nothing_arrives() {
    let context = TestContext::with_mock();
    let session = context.factory.direct_session(&context.settings().user4);

    let err = observe_pull(
        &session,
        &[FolderId::calendar()],
        &[EventKind::Created],
        1,
        Duration::from_millis(20),
        Duration::from_millis(200),
    )
    .await
    .unwrap_err();
    match err {
        HarnessError::InsufficientEvents { expected, observed } => {
            assert_eq!(expected, 1);
            assert_eq!(observed, 0);
        }
        other => panic!("expected a deadline failure, got {other}"),
    }
}

#[tokio::test]
async fn unsubscribing_twice_reports_an_unknown_subscription() {
    let context = TestContext::with_mock();
    let session = context.factory.direct_session(&context.settings().user5);

    let cursor = session
        .backend()
        .subscribe_pull(
            session.info(),
            &[FolderId::calendar()],
            1,
            None,
            &[EventKind::Created],
        )
        .await
        .unwrap();
    session
        .backend()
        .unsubscribe(session.info(), &cursor.subscription_id)
        .await
        .unwrap();

    let err = session
        .backend()
        .unsubscribe(session.info(), &cursor.subscription_id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        calprobe_common::CalendarError::Subscription(_)
    ));
}

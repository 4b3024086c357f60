// --- File: crates/calprobe_ews/tests/cleanup.rs ---
//! Fixture teardown: every configured identity is swept, and one broken
//! identity never blocks cleanup of the rest.

use calprobe_ews::fixture::{mock_settings, TestContext};
use calprobe_ews::mock::MockCalendarBackend;
use calprobe_ews::permissions;
use calprobe_common::models::{
    CalendarView, FolderId, NewAppointment, PermissionLevel, PropertySet, SendInvitationsMode,
};
use chrono::{Duration, Utc};
use std::sync::Arc;

#[tokio::test]
async fn teardown_sweeps_every_identity() {
    let context = TestContext::with_mock();
    let start = Utc::now() + Duration::hours(1);

    // Leftovers in three mailboxes plus a granted permission.
    for user in [
        &context.settings().user1,
        &context.settings().user3,
        &context.settings().user5,
    ] {
        let session = context.factory.direct_session(user);
        session
            .create_appointment(
                NewAppointment::new("Остаток", start, start + Duration::hours(1)),
                SendInvitationsMode::SendToNone,
            )
            .await
            .unwrap();
    }
    let owner = context.factory.direct_session(&context.settings().user1);
    permissions::grant(
        &owner,
        &context.settings().delegation.username,
        PermissionLevel::Editor,
    )
    .await
    .unwrap();

    context.teardown().await.unwrap();

    let view = CalendarView::new(start - Duration::days(1), start + Duration::days(1), 100);
    for user in context.settings().all_users() {
        let session = context.factory.direct_session(user);
        let listed = session
            .appointments_in_window(&FolderId::calendar(), &view, &PropertySet::id_only())
            .await
            .unwrap();
        assert!(listed.is_empty(), "leftovers for {}", user.username);
    }

    // The revoked delegate can no longer read the calendar.
    let delegate = context.factory.delegated_session();
    let err = delegate
        .appointments_in_window(
            &FolderId::calendar_of(context.settings().user1.username.clone()),
            &view,
            &PropertySet::id_only(),
        )
        .await
        .unwrap_err();
    assert!(err.is_access_denied());
}

#[tokio::test]
async fn teardown_continues_past_a_failing_identity() {
    // The backend knows the real passwords; the context is configured with a
    // wrong one for user2, so that identity's cleanup fails.
    let real = mock_settings();
    let backend = Arc::new(MockCalendarBackend::seeded(&real));
    let mut skewed = mock_settings();
    skewed.user2.password = "wrong-password".to_string();
    let context = TestContext::with_settings(Arc::new(skewed), backend);
    let start = Utc::now() + Duration::hours(1);

    let survivor = context.factory.direct_session(&context.settings().user4);
    survivor
        .create_appointment(
            NewAppointment::new("Остаток", start, start + Duration::hours(1)),
            SendInvitationsMode::SendToNone,
        )
        .await
        .unwrap();

    let err = context.teardown().await.unwrap_err();
    assert_eq!(err.failures.len(), 1);
    assert_eq!(err.failures[0].0, "exuser2@airplan.local");

    // Identities after the failing one were still swept.
    let view = CalendarView::new(start - Duration::days(1), start + Duration::days(1), 100);
    let listed = survivor
        .appointments_in_window(&FolderId::calendar(), &view, &PropertySet::id_only())
        .await
        .unwrap();
    assert!(listed.is_empty());
}

// --- File: crates/calprobe_ews/tests/access.rs ---
//! The three access modes against foreign calendars: impersonation, shared
//! folder permissions for the delegate, and the owner-managed grant flow.

use calprobe_ews::fixture::TestContext;
use calprobe_ews::permissions;
use calprobe_ews::session::Session;
use calprobe_common::models::{
    login_part, CalendarView, ConflictResolutionMode, FolderId, NewAppointment, PermissionLevel,
    PropertySet, SendInvitationsMode,
};
use chrono::{DateTime, Duration, Utc};

fn day_window_around(moment: DateTime<Utc>) -> CalendarView {
    CalendarView::new(moment - Duration::days(1), moment + Duration::days(1), 100)
}

fn meeting(subject: &str, start: DateTime<Utc>) -> NewAppointment {
    NewAppointment::new(subject, start, start + Duration::hours(1))
}

async fn create_owned(session: &Session, subject: &str, start: DateTime<Utc>) {
    session
        .create_appointment(meeting(subject, start), SendInvitationsMode::SendToNone)
        .await
        .unwrap();
}

#[tokio::test]
async fn impersonated_session_works_the_target_calendar() {
    let context = TestContext::with_mock();
    let target = context.settings().user3.username.clone();
    let impersonated = context.factory.impersonated_session(&target);
    let start = Utc::now() + Duration::hours(1);

    create_owned(&impersonated, "От имени пользователя", start).await;

    // The item lives in the target's calendar and names them as organizer.
    let owner = context.factory.direct_session(&context.settings().user3);
    let listed = owner
        .appointments_in_window(
            &FolderId::calendar(),
            &day_window_around(start),
            &PropertySet::all(),
        )
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].organizer.as_deref(), Some(target.as_str()));
    assert_eq!(
        listed[0].organizer.as_deref().map(login_part),
        Some("exuser3")
    );
}

#[tokio::test]
async fn delegate_needs_a_grant_before_reading_a_foreign_calendar() {
    let context = TestContext::with_mock();
    let owner = context.factory.direct_session(&context.settings().user2);
    let delegate = context.factory.delegated_session();
    let delegate_address = context.settings().delegation.username.clone();
    let folder = FolderId::calendar_of(context.settings().user2.username.clone());
    let start = Utc::now() + Duration::hours(1);

    create_owned(&owner, "Чужая встреча", start).await;

    let err = delegate
        .appointments_in_window(&folder, &day_window_around(start), &PropertySet::id_only())
        .await
        .unwrap_err();
    assert!(err.is_access_denied());

    permissions::grant(&owner, &delegate_address, PermissionLevel::Reviewer)
        .await
        .unwrap();
    let listed = delegate
        .appointments_in_window(&folder, &day_window_around(start), &PropertySet::id_only())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    permissions::revoke(&owner, &delegate_address).await.unwrap();
    let err = delegate
        .appointments_in_window(&folder, &day_window_around(start), &PropertySet::id_only())
        .await
        .unwrap_err();
    assert!(err.is_access_denied());
}

#[tokio::test]
async fn delegate_save_makes_the_folder_owner_the_organizer() {
    let context = TestContext::with_mock();
    let owner = context.factory.direct_session(&context.settings().user1);
    let delegate = context.factory.delegated_session();
    let owner_address = context.settings().user1.username.clone();
    let folder = FolderId::calendar_of(owner_address.clone());
    let start = Utc::now() + Duration::hours(1);

    permissions::grant(
        &owner,
        &context.settings().delegation.username,
        PermissionLevel::Author,
    )
    .await
    .unwrap();

    let id = delegate
        .create_appointment_in(
            &folder,
            meeting("Запись делегата", start),
            SendInvitationsMode::SendToNone,
        )
        .await
        .unwrap();

    let fetched = owner
        .get_appointment(&id, &PropertySet::all())
        .await
        .unwrap();
    assert_eq!(fetched.organizer.as_deref(), Some(owner_address.as_str()));
}

#[tokio::test]
async fn editing_foreign_items_requires_editor_level() {
    let context = TestContext::with_mock();
    let owner = context.factory.direct_session(&context.settings().user4);
    let delegate = context.factory.delegated_session();
    let delegate_address = context.settings().delegation.username.clone();
    let start = Utc::now() + Duration::hours(1);

    create_owned(&owner, "Редактируемая встреча", start).await;
    let folder = FolderId::calendar_of(context.settings().user4.username.clone());

    // Author can read and create, but not touch the owner's items.
    permissions::grant(&owner, &delegate_address, PermissionLevel::Author)
        .await
        .unwrap();
    let mut loaded = delegate
        .appointments_in_window(&folder, &day_window_around(start), &PropertySet::all())
        .await
        .unwrap()
        .remove(0);
    loaded.subject = Some("Правка делегата".to_string());
    let err = delegate
        .update_appointment(&loaded, ConflictResolutionMode::AlwaysOverwrite)
        .await
        .unwrap_err();
    assert!(err.is_access_denied());

    permissions::grant(&owner, &delegate_address, PermissionLevel::Editor)
        .await
        .unwrap();
    delegate
        .update_appointment(&loaded, ConflictResolutionMode::AlwaysOverwrite)
        .await
        .unwrap();

    let fetched = owner
        .get_appointment(&loaded.id, &PropertySet::all())
        .await
        .unwrap();
    assert_eq!(fetched.subject.as_deref(), Some("Правка делегата"));
}

#[tokio::test]
async fn plain_user_sessions_are_confined_to_their_own_calendar() {
    let context = TestContext::with_mock();
    let session = context.factory.direct_session(&context.settings().user5);
    let start = Utc::now() + Duration::hours(1);

    create_owned(&session, "Своя встреча", start).await;
    let own = session
        .appointments_in_window(
            &FolderId::calendar(),
            &day_window_around(start),
            &PropertySet::id_only(),
        )
        .await
        .unwrap();
    assert_eq!(own.len(), 1);

    let foreign = FolderId::calendar_of(context.settings().user1.username.clone());
    let err = session
        .appointments_in_window(&foreign, &day_window_around(start), &PropertySet::id_only())
        .await
        .unwrap_err();
    assert!(err.is_access_denied());
}

// File: crates/calprobe_demo/src/main.rs
//! Console walkthrough of the appointment workflow: create, fetch, update,
//! list and delete against the in-memory backend, acting as user1 through
//! the impersonation service account.

use calprobe_common::logging;
use calprobe_common::models::{
    AffectedOccurrences, CalendarView, ConflictResolutionMode, DeleteMode, Field, FolderId,
    NewAppointment, PropertySet, SendCancellationsMode, SendInvitationsMode,
};
use calprobe_config::load_settings;
use calprobe_ews::mock::MockCalendarBackend;
use calprobe_ews::session::SessionFactory;
use chrono::{Duration, Months, Utc};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() {
    logging::init();

    let settings = Arc::new(load_settings().expect("Failed to load settings"));
    let backend = Arc::new(MockCalendarBackend::seeded(&settings));
    let factory = SessionFactory::new(Arc::clone(&settings), backend);

    let session = factory.impersonated_session(&settings.user1.username);
    info!(mailbox = session.mailbox(), "acting on calendar");

    let start = Utc::now() + Duration::hours(1);
    let id = session
        .create_appointment(
            NewAppointment::new("Моё мероприятие", start, start + Duration::hours(1))
                .body("Сделать то, потом сделать сё")
                .location("Дома"),
            SendInvitationsMode::SendToNone,
        )
        .await
        .expect("Failed to create the appointment");
    info!(%id, "created");

    tokio::time::sleep(std::time::Duration::from_secs(1)).await;

    let fetched = session
        .get_appointment(
            &id,
            &PropertySet::of(&[Field::Subject, Field::Start, Field::End, Field::Location]),
        )
        .await
        .expect("Failed to fetch the appointment");
    info!(
        subject = fetched.subject.as_deref().unwrap_or(""),
        location = fetched.location.as_deref().unwrap_or(""),
        "fetched"
    );

    let mut renamed = session
        .get_appointment(&id, &PropertySet::all())
        .await
        .expect("Failed to load the appointment for editing");
    let moved_start = start + Duration::days(1);
    renamed.subject = renamed.subject.map(|subject| format!("{subject} 1"));
    renamed.start = Some(moved_start);
    renamed.end = Some(moved_start + Duration::hours(1));
    renamed.location = Some("В офисе".to_string());
    session
        .update_appointment(&renamed, ConflictResolutionMode::AlwaysOverwrite)
        .await
        .expect("Failed to update the appointment");
    info!(%id, "renamed and moved a day ahead");

    let month = CalendarView::new(
        Utc::now() - Duration::days(1),
        Utc::now() + Months::new(1),
        50,
    );
    let listed = session
        .appointments_in_window(
            &FolderId::calendar(),
            &month,
            &PropertySet::of(&[Field::Subject, Field::Start]),
        )
        .await
        .expect("Failed to list appointments");
    for item in &listed {
        info!(
            subject = item.subject.as_deref().unwrap_or(""),
            start = ?item.start,
            "upcoming"
        );
    }

    let ids: Vec<_> = listed.into_iter().map(|item| item.id).collect();
    session
        .delete_appointments(
            &ids,
            DeleteMode::HardDelete,
            SendCancellationsMode::SendToNone,
            AffectedOccurrences::AllOccurrences,
        )
        .await
        .expect("Failed to delete appointments");
    info!(count = ids.len(), "cleaned up");
}

// --- File: crates/calprobe_common/src/services.rs ---
//! The external-collaborator contract: everything the harness needs from a
//! calendaring backend, behind a trait so tests can run against an in-memory
//! implementation while the call sequences stay the ones a real client
//! library would see.

use crate::error::CalendarError;
use crate::models::{
    AffectedOccurrences, Appointment, AppointmentId, CalendarView, ConflictResolutionMode,
    DeleteMode, EventBatch, EventKind, FolderId, ItemEvent, NewAppointment, PermissionEntry,
    PropertySet, PullCursor, SendCancellationsMode, SendInvitationsMode, SessionInfo,
    SubscriptionId, Watermark,
};
use async_trait::async_trait;

/// Callback invoked for each inbound batch of streaming events.
pub type EventCallback = Box<dyn Fn(&[ItemEvent]) + Send + Sync>;
/// Callback invoked when the server drops a streaming connection.
pub type DisconnectCallback = Box<dyn Fn() + Send + Sync>;

/// Operations of the remote calendar service.
///
/// Every method authenticates the supplied [`SessionInfo`] first: invalid
/// credentials surface here, on the first call, never at session
/// construction. Each method is one blocking round-trip from the caller's
/// point of view.
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    /// Fetch one item by id, projected to the requested fields.
    async fn bind(
        &self,
        session: &SessionInfo,
        id: &AppointmentId,
        properties: &PropertySet,
    ) -> Result<Appointment, CalendarError>;

    /// Create an appointment in `folder` (the session's own calendar when
    /// `None`). Depending on `send_mode`, attendees receive their own copies
    /// sharing the organizer's correlation identifier.
    async fn save(
        &self,
        session: &SessionInfo,
        folder: Option<&FolderId>,
        item: NewAppointment,
        send_mode: SendInvitationsMode,
    ) -> Result<AppointmentId, CalendarError>;

    /// Push local field changes back. `conflict_mode` decides what wins when
    /// the server copy changed since the item was loaded.
    async fn update(
        &self,
        session: &SessionInfo,
        item: &Appointment,
        conflict_mode: ConflictResolutionMode,
    ) -> Result<(), CalendarError>;

    /// Remove items. Unless `cancellations` suppresses it, deleting a meeting
    /// also cancels the attendees' copies.
    async fn delete(
        &self,
        session: &SessionInfo,
        ids: &[AppointmentId],
        delete_mode: DeleteMode,
        cancellations: SendCancellationsMode,
        scope: AffectedOccurrences,
    ) -> Result<(), CalendarError>;

    /// Appointments whose occurrence starts in `[view.start, view.end)`,
    /// capped at `view.limit`. Ordering is the server's default; callers must
    /// not rely on it beyond what they sort themselves.
    async fn find_appointments(
        &self,
        session: &SessionInfo,
        folder: &FolderId,
        view: &CalendarView,
        properties: &PropertySet,
    ) -> Result<Vec<Appointment>, CalendarError>;

    /// Read the full permission set of a calendar folder. Owner only.
    async fn folder_permissions(
        &self,
        session: &SessionInfo,
        folder: &FolderId,
    ) -> Result<Vec<PermissionEntry>, CalendarError>;

    /// Replace the full permission set of a calendar folder. Owner only.
    async fn set_folder_permissions(
        &self,
        session: &SessionInfo,
        folder: &FolderId,
        entries: Vec<PermissionEntry>,
    ) -> Result<(), CalendarError>;

    /// Open a pull subscription. Passing a previously returned watermark
    /// resumes an existing subscription at that point.
    async fn subscribe_pull(
        &self,
        session: &SessionInfo,
        folders: &[FolderId],
        timeout_minutes: u32,
        watermark: Option<Watermark>,
        event_kinds: &[EventKind],
    ) -> Result<PullCursor, CalendarError>;

    /// Next batch of events since the cursor's watermark. The returned batch
    /// carries the advanced watermark the caller must resupply next time.
    async fn get_events(
        &self,
        session: &SessionInfo,
        cursor: &PullCursor,
    ) -> Result<EventBatch, CalendarError>;

    async fn unsubscribe(
        &self,
        session: &SessionInfo,
        subscription: &SubscriptionId,
    ) -> Result<(), CalendarError>;

    /// Open a streaming subscription; events arrive through the returned
    /// connection's callbacks once it is opened.
    async fn subscribe_streaming(
        &self,
        session: &SessionInfo,
        folders: &[FolderId],
        event_kinds: &[EventKind],
    ) -> Result<Box<dyn StreamingConnection>, CalendarError>;
}

/// A long-lived push connection.
///
/// Callbacks must be registered before [`open`](Self::open); the caller keeps
/// the connection open for the duration of its observation and must close it
/// (and unsubscribe) on every exit path.
pub trait StreamingConnection: Send {
    fn subscription_id(&self) -> &SubscriptionId;

    fn set_on_event(&mut self, callback: EventCallback);

    fn set_on_disconnect(&mut self, callback: DisconnectCallback);

    fn open(&mut self) -> Result<(), CalendarError>;

    fn close(&mut self);
}

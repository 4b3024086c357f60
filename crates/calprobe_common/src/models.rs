// --- File: crates/calprobe_common/src/models.rs ---
//! Data model shared between the workflow helpers, the notification harness
//! and backend implementations.

use calprobe_config::UserCredentials;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of one mailbox's copy of an appointment.
///
/// Every attendee's copy of the same logical meeting has its own id; the
/// copies are correlated through [`Appointment::ical_uid`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppointmentId(pub String);

impl fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-issued subscription identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub String);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque cursor marking how far a pull consumer has read.
///
/// Callers persist and resupply it between polls but must not interpret the
/// payload; only the issuing backend knows its structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark(pub String);

/// Appointment fields a caller can request.
///
/// Partial-field fetches are a bandwidth optimization, not a convenience:
/// callers declare exactly which fields they need and the backend leaves the
/// rest unpopulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
    Subject,
    Body,
    Start,
    End,
    Location,
    Organizer,
    RequiredAttendees,
    OptionalAttendees,
    ICalUid,
    LastModified,
}

/// A set of requested fields. An empty set fetches the id only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySet(Vec<Field>);

impl PropertySet {
    /// Fetch nothing beyond the item id.
    pub fn id_only() -> Self {
        PropertySet(Vec::new())
    }

    pub fn of(fields: &[Field]) -> Self {
        PropertySet(fields.to_vec())
    }

    pub fn all() -> Self {
        PropertySet(vec![
            Field::Subject,
            Field::Body,
            Field::Start,
            Field::End,
            Field::Location,
            Field::Organizer,
            Field::RequiredAttendees,
            Field::OptionalAttendees,
            Field::ICalUid,
            Field::LastModified,
        ])
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains(&field)
    }
}

/// One mailbox's view of an appointment, projected to the requested fields.
///
/// Fields outside the projection are `None` (or empty for the attendee
/// lists), regardless of what the server holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appointment {
    pub id: AppointmentId,
    /// Correlation identifier shared by every attendee's copy of one meeting.
    pub ical_uid: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub location: Option<String>,
    /// SMTP address of the organizer.
    pub organizer: Option<String>,
    pub required_attendees: Vec<String>,
    pub optional_attendees: Vec<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Payload for creating an appointment.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub subject: String,
    pub body: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: Option<String>,
    pub required_attendees: Vec<String>,
    pub optional_attendees: Vec<String>,
}

impl NewAppointment {
    pub fn new(subject: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        NewAppointment {
            subject: subject.into(),
            body: None,
            start,
            end,
            location: None,
            required_attendees: Vec::new(),
            optional_attendees: Vec::new(),
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn require(mut self, attendee: impl Into<String>) -> Self {
        self.required_attendees.push(attendee.into());
        self
    }

    pub fn invite(mut self, attendee: impl Into<String>) -> Self {
        self.optional_attendees.push(attendee.into());
        self
    }
}

/// Whether saving a meeting delivers invitations to its attendees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendInvitationsMode {
    SendToNone,
    SendOnlyToAll,
    SendToAllAndSaveCopy,
}

/// How an update resolves against a concurrent server-side edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolutionMode {
    /// Local property changes are discarded when the server copy is newer.
    NeverOverwrite,
    /// Local changes are applied unless the server copy is more recent.
    AutoResolve,
    /// Local changes overwrite server-side changes.
    AlwaysOverwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    HardDelete,
    SoftDelete,
    MoveToDeletedItems,
}

/// Whether deleting a meeting delivers cancellations to its attendees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendCancellationsMode {
    SendToNone,
    SendOnlyToAll,
    SendToAllAndSaveCopy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffectedOccurrences {
    AllOccurrences,
    SpecifiedOccurrenceOnly,
}

/// The well-known calendar folder of a mailbox.
///
/// With no explicit mailbox the folder belongs to the session's effective
/// identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderId {
    pub mailbox: Option<String>,
}

impl FolderId {
    pub fn calendar() -> Self {
        FolderId { mailbox: None }
    }

    pub fn calendar_of(mailbox: impl Into<String>) -> Self {
        FolderId {
            mailbox: Some(mailbox.into()),
        }
    }
}

/// A window query over a calendar folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarView {
    pub start: DateTime<Utc>,
    /// Exclusive.
    pub end: DateTime<Utc>,
    pub limit: usize,
}

impl CalendarView {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, limit: usize) -> Self {
        CalendarView { start, end, limit }
    }

    /// Whether an occurrence starting at `start` falls in `[self.start, self.end)`.
    pub fn contains(&self, start: DateTime<Utc>) -> bool {
        start >= self.start && start < self.end
    }
}

/// Grants one identity a permission level on a calendar folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEntry {
    /// SMTP address of the grantee.
    pub grantee: String,
    pub level: PermissionLevel,
}

/// Folder permission levels, weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermissionLevel {
    None,
    /// Read items.
    Reviewer,
    /// Read and create items.
    Author,
    /// Read, create, edit and delete any item.
    Editor,
}

/// Kind of change reported by a notification event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Created,
    Modified,
    Deleted,
    Moved,
    Copied,
}

/// A change notification. Carries identity and kind only; consumers re-fetch
/// the referenced item to learn anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemEvent {
    pub kind: EventKind,
    pub item_id: AppointmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Resumable cursor for a pull subscription.
///
/// The caller owns this value and threads it through every `get_events` call;
/// losing the watermark causes redelivery or gaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullCursor {
    pub subscription_id: SubscriptionId,
    pub watermark: Watermark,
    pub more_available: bool,
}

/// One batch of pull events together with the advanced cursor state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBatch {
    pub events: Vec<ItemEvent>,
    pub watermark: Watermark,
    pub more_available: bool,
}

/// How a session is authorized against the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessMode {
    /// Authenticate as the identity itself.
    Direct,
    /// Authenticate as a privileged service identity, act fully as `target`.
    Impersonated { target: String },
    /// Authenticate as a service identity that relies on granted folder
    /// permissions for anything beyond its own mailbox.
    Delegated,
}

/// Everything a backend needs to authorize one session's calls.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub endpoint: String,
    pub credentials: UserCredentials,
    pub mode: AccessMode,
    /// Trust the test server's non-production certificate for this session
    /// only; never a process-wide override.
    pub accept_invalid_certs: bool,
}

impl SessionInfo {
    /// The mailbox calls act on when no folder names one explicitly.
    pub fn mailbox(&self) -> &str {
        match &self.mode {
            AccessMode::Impersonated { target } => target,
            AccessMode::Direct | AccessMode::Delegated => &self.credentials.username,
        }
    }
}

/// Login part of an SMTP address (`exuser1@airplan.local` -> `exuser1`).
pub fn login_part(smtp_address: &str) -> &str {
    let mut parts = smtp_address.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(login), Some(_), None) => login,
        _ => "",
    }
}

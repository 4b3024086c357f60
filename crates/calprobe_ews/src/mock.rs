// --- File: crates/calprobe_ews/src/mock.rs ---
//! In-memory implementation of [`CalendarBackend`] for tests and the demo.
//!
//! Holds per-mailbox appointment stores, permission tables and event logs
//! behind one mutex. Authentication is checked on every call, so a session
//! built from bad credentials fails here, on first use. Pull watermarks are
//! indexes into the per-mailbox event log, serialized opaquely; streaming
//! delivery rides a broadcast channel.
//!
//! One deliberately preserved quirk: the pull path reports deletions as
//! `Modified` events, matching the behavior observed against the real
//! service. The streaming path delivers `Deleted` unchanged.

use async_trait::async_trait;
use calprobe_common::error::{
    access_denied, auth_error, not_found, subscription_error, validation_error,
};
use calprobe_common::models::{
    AccessMode, AffectedOccurrences, Appointment, AppointmentId, CalendarView,
    ConflictResolutionMode, DeleteMode, EventBatch, EventKind, Field, FolderId, ItemEvent,
    NewAppointment, PermissionEntry, PermissionLevel, PropertySet, PullCursor,
    SendCancellationsMode, SendInvitationsMode, SessionInfo, SubscriptionId, Watermark,
};
use calprobe_common::services::{DisconnectCallback, EventCallback};
use calprobe_common::{CalendarBackend, CalendarError, StreamingConnection};
use calprobe_config::Settings;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events returned per `get_events` call. Small on purpose, so a burst of
/// changes spans several batches the way a real server pages deliveries.
const PULL_BATCH_LIMIT: usize = 3;

const STREAM_CHANNEL_CAPACITY: usize = 256;

/// Mock calendar backend. Cheap to clone handles via [`Arc`]; all state is
/// shared.
pub struct MockCalendarBackend {
    state: Arc<Mutex<ServerState>>,
    events_tx: broadcast::Sender<(String, ItemEvent)>,
}

#[derive(Default)]
struct ServerState {
    /// Valid credentials, keyed by SMTP address.
    passwords: HashMap<String, String>,
    /// Accounts allowed to impersonate arbitrary mailboxes.
    impersonation_accounts: HashSet<String>,
    mailboxes: HashMap<String, Mailbox>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
}

#[derive(Default)]
struct Mailbox {
    appointments: HashMap<AppointmentId, StoredAppointment>,
    permissions: Vec<PermissionEntry>,
    event_log: Vec<ItemEvent>,
}

#[derive(Clone)]
struct StoredAppointment {
    id: AppointmentId,
    ical_uid: String,
    subject: String,
    body: Option<String>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    location: Option<String>,
    organizer: String,
    required_attendees: Vec<String>,
    optional_attendees: Vec<String>,
    last_modified: DateTime<Utc>,
}

struct Subscription {
    mailbox: String,
    kinds: Vec<EventKind>,
}

impl Default for MockCalendarBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCalendarBackend {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(STREAM_CHANNEL_CAPACITY);
        MockCalendarBackend {
            state: Arc::new(Mutex::new(ServerState::default())),
            events_tx,
        }
    }

    /// A backend provisioned with every identity from the settings, the
    /// impersonation account marked as such.
    pub fn seeded(settings: &Settings) -> Self {
        let backend = Self::new();
        for user in settings.all_users() {
            backend.register_user(&user.username, &user.password);
        }
        backend.allow_impersonation(&settings.impersonation.username);
        backend
    }

    /// Provision a mailbox with its credentials.
    pub fn register_user(&self, username: &str, password: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .passwords
            .insert(username.to_string(), password.to_string());
        state.mailboxes.entry(username.to_string()).or_default();
    }

    pub fn allow_impersonation(&self, username: &str) {
        let mut state = self.state.lock().unwrap();
        state.impersonation_accounts.insert(username.to_string());
    }

    /// Authenticate the session and resolve the identity its calls act as.
    fn resolve_identity(
        state: &ServerState,
        session: &SessionInfo,
    ) -> Result<String, CalendarError> {
        let user = &session.credentials.username;
        match state.passwords.get(user) {
            Some(stored) if *stored == session.credentials.password => {}
            _ => return Err(auth_error(user, "invalid username or password")),
        }

        match &session.mode {
            AccessMode::Direct | AccessMode::Delegated => Ok(user.clone()),
            AccessMode::Impersonated { target } => {
                if !state.impersonation_accounts.contains(user) {
                    return Err(access_denied(
                        user,
                        target,
                        "impersonation is not enabled for this account",
                    ));
                }
                if !state.mailboxes.contains_key(target) {
                    return Err(not_found(format!("mailbox {target}")));
                }
                Ok(target.clone())
            }
        }
    }

    /// Check that `identity` holds at least `needed` on `mailbox`'s calendar.
    /// The owner (including an impersonated owner) always passes.
    fn check_access(
        state: &ServerState,
        identity: &str,
        mailbox: &str,
        needed: PermissionLevel,
    ) -> Result<(), CalendarError> {
        if identity == mailbox {
            return Ok(());
        }
        let target = state
            .mailboxes
            .get(mailbox)
            .ok_or_else(|| not_found(format!("mailbox {mailbox}")))?;
        let held = target
            .permissions
            .iter()
            .find(|entry| entry.grantee == identity)
            .map(|entry| entry.level)
            .unwrap_or(PermissionLevel::None);
        if held >= needed {
            Ok(())
        } else {
            Err(access_denied(
                identity,
                mailbox,
                format!("requires {needed:?} access, holds {held:?}"),
            ))
        }
    }

    /// The mailbox a folder refers to for this identity.
    fn target_mailbox(folder: Option<&FolderId>, identity: &str) -> String {
        folder
            .and_then(|f| f.mailbox.clone())
            .unwrap_or_else(|| identity.to_string())
    }

    fn log_event(&self, state: &mut ServerState, mailbox: &str, kind: EventKind, id: &AppointmentId) {
        let event = ItemEvent {
            kind,
            item_id: id.clone(),
            occurred_at: Utc::now(),
        };
        if let Some(target) = state.mailboxes.get_mut(mailbox) {
            target.event_log.push(event.clone());
        }
        // No receivers is fine; nobody is streaming.
        let _ = self.events_tx.send((mailbox.to_string(), event));
    }

    fn find_owning_mailbox(state: &ServerState, id: &AppointmentId) -> Option<String> {
        state
            .mailboxes
            .iter()
            .find(|(_, mailbox)| mailbox.appointments.contains_key(id))
            .map(|(name, _)| name.clone())
    }
}

/// Keep only occurrences inside the view, sorted by start ascending and
/// capped at the view's limit.
pub(crate) fn apply_view<T>(
    mut items: Vec<T>,
    view: &CalendarView,
    start_of: impl Fn(&T) -> DateTime<Utc>,
) -> Vec<T> {
    items.retain(|item| view.contains(start_of(item)));
    items.sort_by_key(|item| start_of(item));
    items.truncate(view.limit);
    items
}

fn project(stored: &StoredAppointment, properties: &PropertySet) -> Appointment {
    Appointment {
        id: stored.id.clone(),
        ical_uid: properties
            .contains(Field::ICalUid)
            .then(|| stored.ical_uid.clone()),
        subject: properties
            .contains(Field::Subject)
            .then(|| stored.subject.clone()),
        body: properties
            .contains(Field::Body)
            .then(|| stored.body.clone())
            .flatten(),
        start: properties.contains(Field::Start).then_some(stored.start),
        end: properties.contains(Field::End).then_some(stored.end),
        location: properties
            .contains(Field::Location)
            .then(|| stored.location.clone())
            .flatten(),
        organizer: properties
            .contains(Field::Organizer)
            .then(|| stored.organizer.clone()),
        required_attendees: if properties.contains(Field::RequiredAttendees) {
            stored.required_attendees.clone()
        } else {
            Vec::new()
        },
        optional_attendees: if properties.contains(Field::OptionalAttendees) {
            stored.optional_attendees.clone()
        } else {
            Vec::new()
        },
        last_modified: properties
            .contains(Field::LastModified)
            .then_some(stored.last_modified),
    }
}

fn encode_watermark(index: usize) -> Watermark {
    Watermark(format!("wm-{index:012}"))
}

fn decode_watermark(watermark: &Watermark) -> Result<usize, CalendarError> {
    watermark
        .0
        .strip_prefix("wm-")
        .and_then(|rest| rest.parse::<usize>().ok())
        .ok_or_else(|| subscription_error(format!("unreadable watermark {:?}", watermark.0)))
}

#[async_trait]
impl CalendarBackend for MockCalendarBackend {
    async fn bind(
        &self,
        session: &SessionInfo,
        id: &AppointmentId,
        properties: &PropertySet,
    ) -> Result<Appointment, CalendarError> {
        let state = self.state.lock().unwrap();
        let identity = Self::resolve_identity(&state, session)?;

        let owner = Self::find_owning_mailbox(&state, id)
            .ok_or_else(|| not_found(format!("item {id}")))?;
        Self::check_access(&state, &identity, &owner, PermissionLevel::Reviewer)?;

        let stored = &state.mailboxes[&owner].appointments[id];
        Ok(project(stored, properties))
    }

    async fn save(
        &self,
        session: &SessionInfo,
        folder: Option<&FolderId>,
        item: NewAppointment,
        send_mode: SendInvitationsMode,
    ) -> Result<AppointmentId, CalendarError> {
        if item.end <= item.start {
            return Err(validation_error("end time must be after start time"));
        }

        let mut state = self.state.lock().unwrap();
        let identity = Self::resolve_identity(&state, session)?;
        let target = Self::target_mailbox(folder, &identity);
        if !state.mailboxes.contains_key(&target) {
            return Err(not_found(format!("mailbox {target}")));
        }
        Self::check_access(&state, &identity, &target, PermissionLevel::Author)?;

        let now = Utc::now();
        let stored = StoredAppointment {
            id: AppointmentId(format!("item-{}", Uuid::new_v4())),
            ical_uid: Uuid::new_v4().to_string(),
            subject: item.subject,
            body: item.body,
            start: item.start,
            end: item.end,
            location: item.location,
            // The folder's owner organizes the meeting, even when a delegate
            // saves on their behalf.
            organizer: target.clone(),
            required_attendees: item.required_attendees.clone(),
            optional_attendees: item.optional_attendees.clone(),
            last_modified: now,
        };
        let organizer_id = stored.id.clone();

        if let Some(mailbox) = state.mailboxes.get_mut(&target) {
            mailbox.appointments.insert(organizer_id.clone(), stored.clone());
        }
        self.log_event(&mut state, &target, EventKind::Created, &organizer_id);

        // Invitation delivery: each attendee receives their own copy, with
        // its own id but the organizer's correlation identifier.
        if send_mode != SendInvitationsMode::SendToNone {
            let attendees: Vec<String> = item
                .required_attendees
                .iter()
                .chain(item.optional_attendees.iter())
                .filter(|attendee| **attendee != target)
                .cloned()
                .collect();
            for attendee in attendees {
                if !state.mailboxes.contains_key(&attendee) {
                    continue;
                }
                let copy = StoredAppointment {
                    id: AppointmentId(format!("item-{}", Uuid::new_v4())),
                    ..stored.clone()
                };
                let copy_id = copy.id.clone();
                if let Some(mailbox) = state.mailboxes.get_mut(&attendee) {
                    mailbox.appointments.insert(copy_id.clone(), copy);
                }
                self.log_event(&mut state, &attendee, EventKind::Created, &copy_id);
            }
        }

        Ok(organizer_id)
    }

    async fn update(
        &self,
        session: &SessionInfo,
        item: &Appointment,
        conflict_mode: ConflictResolutionMode,
    ) -> Result<(), CalendarError> {
        let mut state = self.state.lock().unwrap();
        let identity = Self::resolve_identity(&state, session)?;

        let owner = Self::find_owning_mailbox(&state, &item.id)
            .ok_or_else(|| not_found(format!("item {}", item.id)))?;
        Self::check_access(&state, &identity, &owner, PermissionLevel::Editor)?;

        let stored = state
            .mailboxes
            .get_mut(&owner)
            .and_then(|mailbox| mailbox.appointments.get_mut(&item.id))
            .ok_or_else(|| not_found(format!("item {}", item.id)))?;

        // Conflict detection compares the timestamp the item carried when
        // loaded against the server copy. An item loaded without
        // LastModified skips the check.
        if let Some(loaded_at) = item.last_modified {
            if stored.last_modified > loaded_at {
                match conflict_mode {
                    ConflictResolutionMode::NeverOverwrite => return Ok(()),
                    ConflictResolutionMode::AutoResolve => {
                        return Err(CalendarError::Conflict(format!(
                            "server copy of {} is more recent",
                            item.id
                        )))
                    }
                    ConflictResolutionMode::AlwaysOverwrite => {}
                }
            }
        }

        if let Some(subject) = &item.subject {
            stored.subject = subject.clone();
        }
        if let Some(body) = &item.body {
            stored.body = Some(body.clone());
        }
        if let Some(start) = item.start {
            stored.start = start;
        }
        if let Some(end) = item.end {
            stored.end = end;
        }
        if let Some(location) = &item.location {
            stored.location = Some(location.clone());
        }
        stored.last_modified = Utc::now();

        let id = item.id.clone();
        self.log_event(&mut state, &owner, EventKind::Modified, &id);
        Ok(())
    }

    async fn delete(
        &self,
        session: &SessionInfo,
        ids: &[AppointmentId],
        _delete_mode: DeleteMode,
        cancellations: SendCancellationsMode,
        _scope: AffectedOccurrences,
    ) -> Result<(), CalendarError> {
        let mut state = self.state.lock().unwrap();
        let identity = Self::resolve_identity(&state, session)?;

        for id in ids {
            let owner = Self::find_owning_mailbox(&state, id)
                .ok_or_else(|| not_found(format!("item {id}")))?;
            Self::check_access(&state, &identity, &owner, PermissionLevel::Editor)?;

            let removed = state
                .mailboxes
                .get_mut(&owner)
                .and_then(|mailbox| mailbox.appointments.remove(id))
                .ok_or_else(|| not_found(format!("item {id}")))?;
            self.log_event(&mut state, &owner, EventKind::Deleted, id);

            // Cancellation delivery removes the attendee copies of the same
            // logical meeting, unless suppressed. Only the organizer's copy
            // cancels the meeting for everyone.
            if cancellations != SendCancellationsMode::SendToNone && removed.organizer == owner {
                let mut cancelled: Vec<(String, AppointmentId)> = Vec::new();
                for (name, mailbox) in state.mailboxes.iter_mut() {
                    if *name == owner {
                        continue;
                    }
                    let copy_ids: Vec<AppointmentId> = mailbox
                        .appointments
                        .values()
                        .filter(|copy| copy.ical_uid == removed.ical_uid)
                        .map(|copy| copy.id.clone())
                        .collect();
                    for copy_id in copy_ids {
                        mailbox.appointments.remove(&copy_id);
                        cancelled.push((name.clone(), copy_id));
                    }
                }
                for (name, copy_id) in cancelled {
                    self.log_event(&mut state, &name, EventKind::Deleted, &copy_id);
                }
            }
        }
        Ok(())
    }

    async fn find_appointments(
        &self,
        session: &SessionInfo,
        folder: &FolderId,
        view: &CalendarView,
        properties: &PropertySet,
    ) -> Result<Vec<Appointment>, CalendarError> {
        let state = self.state.lock().unwrap();
        let identity = Self::resolve_identity(&state, session)?;
        let target = Self::target_mailbox(Some(folder), &identity);
        Self::check_access(&state, &identity, &target, PermissionLevel::Reviewer)?;

        let mailbox = state
            .mailboxes
            .get(&target)
            .ok_or_else(|| not_found(format!("mailbox {target}")))?;
        let matching: Vec<StoredAppointment> = mailbox.appointments.values().cloned().collect();
        let matching = apply_view(matching, view, |stored| stored.start);
        Ok(matching
            .iter()
            .map(|stored| project(stored, properties))
            .collect())
    }

    async fn folder_permissions(
        &self,
        session: &SessionInfo,
        folder: &FolderId,
    ) -> Result<Vec<PermissionEntry>, CalendarError> {
        let state = self.state.lock().unwrap();
        let identity = Self::resolve_identity(&state, session)?;
        let target = Self::target_mailbox(Some(folder), &identity);
        if identity != target {
            return Err(access_denied(
                &identity,
                &target,
                "only the folder owner can read permissions",
            ));
        }
        Ok(state
            .mailboxes
            .get(&target)
            .ok_or_else(|| not_found(format!("mailbox {target}")))?
            .permissions
            .clone())
    }

    async fn set_folder_permissions(
        &self,
        session: &SessionInfo,
        folder: &FolderId,
        entries: Vec<PermissionEntry>,
    ) -> Result<(), CalendarError> {
        let mut state = self.state.lock().unwrap();
        let identity = Self::resolve_identity(&state, session)?;
        let target = Self::target_mailbox(Some(folder), &identity);
        if identity != target {
            return Err(access_denied(
                &identity,
                &target,
                "only the folder owner can change permissions",
            ));
        }
        state
            .mailboxes
            .get_mut(&target)
            .ok_or_else(|| not_found(format!("mailbox {target}")))?
            .permissions = entries;
        Ok(())
    }

    async fn subscribe_pull(
        &self,
        session: &SessionInfo,
        folders: &[FolderId],
        _timeout_minutes: u32,
        watermark: Option<Watermark>,
        event_kinds: &[EventKind],
    ) -> Result<PullCursor, CalendarError> {
        let mut state = self.state.lock().unwrap();
        let identity = Self::resolve_identity(&state, session)?;
        // One calendar folder per subscription.
        let target = Self::target_mailbox(folders.first(), &identity);
        Self::check_access(&state, &identity, &target, PermissionLevel::Reviewer)?;

        let log_len = state
            .mailboxes
            .get(&target)
            .ok_or_else(|| not_found(format!("mailbox {target}")))?
            .event_log
            .len();

        let watermark = match watermark {
            Some(resumed) => {
                decode_watermark(&resumed)?;
                resumed
            }
            None => encode_watermark(log_len),
        };
        let position = decode_watermark(&watermark)?;

        let subscription_id = SubscriptionId(format!("sub-{}", Uuid::new_v4()));
        state.subscriptions.insert(
            subscription_id.clone(),
            Subscription {
                mailbox: target,
                kinds: event_kinds.to_vec(),
            },
        );

        Ok(PullCursor {
            subscription_id,
            watermark,
            more_available: position < log_len,
        })
    }

    async fn get_events(
        &self,
        session: &SessionInfo,
        cursor: &PullCursor,
    ) -> Result<EventBatch, CalendarError> {
        let state = self.state.lock().unwrap();
        let identity = Self::resolve_identity(&state, session)?;
        let subscription = state
            .subscriptions
            .get(&cursor.subscription_id)
            .ok_or_else(|| {
                subscription_error(format!(
                    "unknown or expired subscription {}",
                    cursor.subscription_id
                ))
            })?;
        Self::check_access(&state, &identity, &subscription.mailbox, PermissionLevel::Reviewer)?;

        let log = &state
            .mailboxes
            .get(&subscription.mailbox)
            .ok_or_else(|| not_found(format!("mailbox {}", subscription.mailbox)))?
            .event_log;
        let mut position = decode_watermark(&cursor.watermark)?.min(log.len());

        let mut events = Vec::new();
        while position < log.len() && events.len() < PULL_BATCH_LIMIT {
            let mut event = log[position].clone();
            position += 1;
            // Pull-path quirk: deletions come through as Modified.
            if event.kind == EventKind::Deleted {
                event.kind = EventKind::Modified;
            }
            if subscription.kinds.contains(&event.kind) {
                events.push(event);
            }
        }

        Ok(EventBatch {
            events,
            watermark: encode_watermark(position),
            more_available: position < log.len(),
        })
    }

    async fn unsubscribe(
        &self,
        session: &SessionInfo,
        subscription: &SubscriptionId,
    ) -> Result<(), CalendarError> {
        let mut state = self.state.lock().unwrap();
        Self::resolve_identity(&state, session)?;
        state
            .subscriptions
            .remove(subscription)
            .map(|_| ())
            .ok_or_else(|| subscription_error(format!("unknown subscription {subscription}")))
    }

    async fn subscribe_streaming(
        &self,
        session: &SessionInfo,
        folders: &[FolderId],
        event_kinds: &[EventKind],
    ) -> Result<Box<dyn StreamingConnection>, CalendarError> {
        let mut state = self.state.lock().unwrap();
        let identity = Self::resolve_identity(&state, session)?;
        let target = Self::target_mailbox(folders.first(), &identity);
        Self::check_access(&state, &identity, &target, PermissionLevel::Reviewer)?;

        let subscription_id = SubscriptionId(format!("sub-{}", Uuid::new_v4()));
        state.subscriptions.insert(
            subscription_id.clone(),
            Subscription {
                mailbox: target.clone(),
                kinds: event_kinds.to_vec(),
            },
        );

        Ok(Box::new(MockStreamingConnection {
            subscription_id,
            mailbox: target,
            kinds: event_kinds.to_vec(),
            receiver: Some(self.events_tx.subscribe()),
            on_event: None,
            on_disconnect: None,
            task: None,
        }))
    }
}

struct MockStreamingConnection {
    subscription_id: SubscriptionId,
    mailbox: String,
    kinds: Vec<EventKind>,
    receiver: Option<broadcast::Receiver<(String, ItemEvent)>>,
    on_event: Option<EventCallback>,
    on_disconnect: Option<DisconnectCallback>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl StreamingConnection for MockStreamingConnection {
    fn subscription_id(&self) -> &SubscriptionId {
        &self.subscription_id
    }

    fn set_on_event(&mut self, callback: EventCallback) {
        self.on_event = Some(callback);
    }

    fn set_on_disconnect(&mut self, callback: DisconnectCallback) {
        self.on_disconnect = Some(callback);
    }

    fn open(&mut self) -> Result<(), CalendarError> {
        let mut receiver = self
            .receiver
            .take()
            .ok_or_else(|| subscription_error("connection already opened"))?;
        let on_event = self
            .on_event
            .take()
            .ok_or_else(|| subscription_error("no event callback registered"))?;
        let on_disconnect = self.on_disconnect.take();
        let mailbox = self.mailbox.clone();
        let kinds = self.kinds.clone();

        self.task = Some(tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok((event_mailbox, event)) => {
                        if event_mailbox == mailbox && kinds.contains(&event.kind) {
                            on_event(&[event]);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        if let Some(callback) = &on_disconnect {
                            callback();
                        }
                        break;
                    }
                }
            }
        }));
        Ok(())
    }

    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for MockStreamingConnection {
    fn drop(&mut self) {
        self.close();
    }
}

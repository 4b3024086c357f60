// --- File: crates/calprobe_ews/src/appointment.rs ---
//! Appointment workflow helpers: the create / read / update / list / delete
//! call sequences the tests exercise, as thin methods over the backend.

use crate::session::Session;
use crate::HarnessError;
use calprobe_common::models::{
    AffectedOccurrences, Appointment, AppointmentId, CalendarView, ConflictResolutionMode,
    DeleteMode, FolderId, NewAppointment, PropertySet, SendCancellationsMode, SendInvitationsMode,
};
use tracing::debug;

impl Session {
    /// Create an appointment in this session's own calendar.
    pub async fn create_appointment(
        &self,
        item: NewAppointment,
        send_mode: SendInvitationsMode,
    ) -> Result<AppointmentId, HarnessError> {
        let id = self.backend().save(self.info(), None, item, send_mode).await?;
        debug!(mailbox = self.mailbox(), %id, "created appointment");
        Ok(id)
    }

    /// Create an appointment in an explicitly named calendar folder, e.g. a
    /// delegate saving into the owner's calendar. The organizer becomes the
    /// folder's owner, not the acting identity.
    pub async fn create_appointment_in(
        &self,
        folder: &FolderId,
        item: NewAppointment,
        send_mode: SendInvitationsMode,
    ) -> Result<AppointmentId, HarnessError> {
        let id = self
            .backend()
            .save(self.info(), Some(folder), item, send_mode)
            .await?;
        debug!(folder = ?folder.mailbox, %id, "created appointment in foreign calendar");
        Ok(id)
    }

    /// Fetch one appointment, populated with exactly the requested fields.
    pub async fn get_appointment(
        &self,
        id: &AppointmentId,
        properties: &PropertySet,
    ) -> Result<Appointment, HarnessError> {
        Ok(self.backend().bind(self.info(), id, properties).await?)
    }

    /// Push local field changes back. Insufficient permission level surfaces
    /// as a distinguishable access-denied error, never silently.
    pub async fn update_appointment(
        &self,
        appointment: &Appointment,
        conflict_mode: ConflictResolutionMode,
    ) -> Result<(), HarnessError> {
        Ok(self
            .backend()
            .update(self.info(), appointment, conflict_mode)
            .await?)
    }

    /// Appointments in `[view.start, view.end)`, capped at `view.limit`.
    pub async fn appointments_in_window(
        &self,
        folder: &FolderId,
        view: &CalendarView,
        properties: &PropertySet,
    ) -> Result<Vec<Appointment>, HarnessError> {
        Ok(self
            .backend()
            .find_appointments(self.info(), folder, view, properties)
            .await?)
    }

    /// Delete items; cancellation delivery to attendees follows `cancellations`.
    pub async fn delete_appointments(
        &self,
        ids: &[AppointmentId],
        delete_mode: DeleteMode,
        cancellations: SendCancellationsMode,
        scope: AffectedOccurrences,
    ) -> Result<(), HarnessError> {
        self.backend()
            .delete(self.info(), ids, delete_mode, cancellations, scope)
            .await?;
        debug!(count = ids.len(), "deleted appointments");
        Ok(())
    }
}

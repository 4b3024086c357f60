// --- File: crates/calprobe_ews/src/permissions.rs ---
//! Calendar-sharing permission management between test identities.
//!
//! Both operations read the owner's full permission set, edit it locally and
//! push the whole set back, which is how the folder-permission surface of the
//! service works. They require the owner's own direct session.

use crate::session::Session;
use crate::HarnessError;
use calprobe_common::models::{AccessMode, FolderId, PermissionEntry, PermissionLevel};
use tracing::info;

/// Grant `grantee` a permission level on the session owner's calendar.
/// Updates an existing entry in place, otherwise appends one.
pub async fn grant(
    session: &Session,
    grantee: &str,
    level: PermissionLevel,
) -> Result<(), HarnessError> {
    ensure_owner_direct(session)?;

    let folder = FolderId::calendar();
    let mut entries = session
        .backend()
        .folder_permissions(session.info(), &folder)
        .await?;
    upsert_entry(
        &mut entries,
        PermissionEntry {
            grantee: grantee.to_string(),
            level,
        },
    );
    session
        .backend()
        .set_folder_permissions(session.info(), &folder, entries)
        .await?;

    info!(owner = session.mailbox(), grantee, ?level, "granted calendar access");
    Ok(())
}

/// Remove any entry for `grantee` from the session owner's calendar.
/// An absent entry is a no-op.
pub async fn revoke(session: &Session, grantee: &str) -> Result<(), HarnessError> {
    ensure_owner_direct(session)?;

    let folder = FolderId::calendar();
    let mut entries = session
        .backend()
        .folder_permissions(session.info(), &folder)
        .await?;
    let removed = remove_entry(&mut entries, grantee);
    session
        .backend()
        .set_folder_permissions(session.info(), &folder, entries)
        .await?;

    if removed {
        info!(owner = session.mailbox(), grantee, "revoked calendar access");
    }
    Ok(())
}

fn ensure_owner_direct(session: &Session) -> Result<(), HarnessError> {
    match session.info().mode {
        AccessMode::Direct => Ok(()),
        _ => Err(HarnessError::NotOwnerSession),
    }
}

pub(crate) fn upsert_entry(entries: &mut Vec<PermissionEntry>, entry: PermissionEntry) {
    match entries.iter_mut().find(|e| e.grantee == entry.grantee) {
        Some(existing) => existing.level = entry.level,
        None => entries.push(entry),
    }
}

pub(crate) fn remove_entry(entries: &mut Vec<PermissionEntry>, grantee: &str) -> bool {
    let before = entries.len();
    entries.retain(|e| e.grantee != grantee);
    entries.len() != before
}

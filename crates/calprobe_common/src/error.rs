// --- File: crates/calprobe_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// Errors reported by a calendar backend.
///
/// The remote service is the source of truth here: every variant carries the
/// server-reported reason, and the authorization variants additionally name
/// the acting identity and the target so test assertions can match on them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    /// Wrong or unknown credentials. Surfaces on the first remote call,
    /// never at session construction.
    #[error("authentication failed for {user}: {reason}")]
    Auth { user: String, reason: String },

    /// The identity is authenticated but lacks the required permission level
    /// on the target mailbox or folder.
    #[error("access denied for {user} on {target}: {reason}")]
    AccessDenied {
        user: String,
        target: String,
        reason: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    /// A concurrent edit won under the requested conflict-resolution mode.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown, expired or otherwise unusable subscription state.
    #[error("subscription error: {0}")]
    Subscription(String),

    /// Any other failure reported by the service.
    #[error("service error: {0}")]
    Service(String),
}

impl CalendarError {
    pub fn is_auth(&self) -> bool {
        matches!(self, CalendarError::Auth { .. })
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, CalendarError::AccessDenied { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CalendarError::NotFound(_))
    }
}

// Utility constructors, matching the usage sites' vocabulary
pub fn auth_error<U: fmt::Display, R: fmt::Display>(user: U, reason: R) -> CalendarError {
    CalendarError::Auth {
        user: user.to_string(),
        reason: reason.to_string(),
    }
}

pub fn access_denied<U: fmt::Display, T: fmt::Display, R: fmt::Display>(
    user: U,
    target: T,
    reason: R,
) -> CalendarError {
    CalendarError::AccessDenied {
        user: user.to_string(),
        target: target.to_string(),
        reason: reason.to_string(),
    }
}

pub fn not_found<T: fmt::Display>(message: T) -> CalendarError {
    CalendarError::NotFound(message.to_string())
}

pub fn validation_error<T: fmt::Display>(message: T) -> CalendarError {
    CalendarError::Validation(message.to_string())
}

pub fn subscription_error<T: fmt::Display>(message: T) -> CalendarError {
    CalendarError::Subscription(message.to_string())
}

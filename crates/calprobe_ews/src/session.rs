// --- File: crates/calprobe_ews/src/session.rs ---
//! Session construction for the three access modes.
//!
//! A session binds one identity and one authorization mode to a backend
//! handle. Construction never touches the network: a session built from
//! invalid credentials is returned as a working object and the failure
//! surfaces on its first remote call.

use calprobe_common::models::{AccessMode, SessionInfo};
use calprobe_common::CalendarBackend;
use calprobe_config::{Settings, UserCredentials};
use std::sync::Arc;

/// An authenticated-connection handle scoped to one identity and access mode.
///
/// A session is affine to one logical workflow; concurrent tasks each obtain
/// their own session from the factory instead of sharing one.
#[derive(Clone)]
pub struct Session {
    backend: Arc<dyn CalendarBackend>,
    info: SessionInfo,
}

impl Session {
    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn backend(&self) -> &dyn CalendarBackend {
        self.backend.as_ref()
    }

    /// The mailbox this session's calls act on by default.
    pub fn mailbox(&self) -> &str {
        self.info.mailbox()
    }
}

/// Builds sessions against one configured service endpoint.
pub struct SessionFactory {
    settings: Arc<Settings>,
    backend: Arc<dyn CalendarBackend>,
}

impl SessionFactory {
    pub fn new(settings: Arc<Settings>, backend: Arc<dyn CalendarBackend>) -> Self {
        SessionFactory { settings, backend }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn session(&self, credentials: UserCredentials, mode: AccessMode) -> Session {
        Session {
            backend: Arc::clone(&self.backend),
            info: SessionInfo {
                endpoint: self.settings.service_url.clone(),
                credentials,
                mode,
                // Scoped to this session's connection configuration; the
                // process-wide trust store stays untouched.
                accept_invalid_certs: self.settings.accept_invalid_certs,
            },
        }
    }

    /// Authenticate as the identity itself.
    pub fn direct_session(&self, user: &UserCredentials) -> Session {
        self.session(user.clone(), AccessMode::Direct)
    }

    /// Authenticate as the impersonation service account, acting fully as
    /// `target` without that identity's password.
    pub fn impersonated_session(&self, target: &str) -> Session {
        self.session(
            self.settings.impersonation.clone(),
            AccessMode::Impersonated {
                target: target.to_string(),
            },
        )
    }

    /// Authenticate as the delegation service account. Access to other
    /// mailboxes is scoped to whatever folder permission was granted.
    pub fn delegated_session(&self) -> Session {
        self.session(self.settings.delegation.clone(), AccessMode::Delegated)
    }
}

// --- File: crates/calprobe_ews/src/fixture.rs ---
//! Shared test context: configured settings, a session factory, and the
//! cross-identity cleanup that keeps test runs independent.

use crate::session::SessionFactory;
use crate::{HarnessError, TeardownError};
use calprobe_common::models::{
    AffectedOccurrences, CalendarView, DeleteMode, FolderId, PropertySet, SendCancellationsMode,
};
use calprobe_common::CalendarBackend;
use calprobe_config::{load_settings, Settings, UserCredentials};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// How far around now teardown looks for leftover appointments.
const CLEANUP_WINDOW_DAYS: i64 = 366;
const CLEANUP_WINDOW_LIMIT: usize = 512;

/// Everything a test needs: the resolved settings and a session factory
/// bound to one backend.
pub struct TestContext {
    settings: Arc<Settings>,
    pub factory: SessionFactory,
}

impl TestContext {
    /// Context configured from the layered settings files and environment.
    pub fn new(backend: Arc<dyn CalendarBackend>) -> Result<Self, HarnessError> {
        let settings = Arc::new(load_settings()?);
        Ok(Self::with_settings(settings, backend))
    }

    pub fn with_settings(settings: Arc<Settings>, backend: Arc<dyn CalendarBackend>) -> Self {
        let factory = SessionFactory::new(Arc::clone(&settings), backend);
        TestContext { settings, factory }
    }

    /// Context over a freshly seeded in-memory backend. Cheap enough to build
    /// one per test, so state never leaks between tests.
    pub fn with_mock() -> Self {
        let settings = Arc::new(mock_settings());
        let backend = Arc::new(crate::mock::MockCalendarBackend::seeded(&settings));
        Self::with_settings(settings, backend)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Remove every appointment and granted permission for every configured
    /// identity. Failures are collected per identity; one broken mailbox
    /// never blocks cleanup of the rest.
    pub async fn teardown(&self) -> Result<(), TeardownError> {
        let mut failures = Vec::new();
        for user in self.settings.all_users() {
            if let Err(error) = self.cleanup_identity(user).await {
                warn!(identity = %user.username, %error, "cleanup failed");
                failures.push((user.username.clone(), error));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TeardownError { failures })
        }
    }

    async fn cleanup_identity(&self, user: &UserCredentials) -> Result<(), HarnessError> {
        let session = self.factory.direct_session(user);
        let now = Utc::now();
        let view = CalendarView::new(
            now - Duration::days(CLEANUP_WINDOW_DAYS),
            now + Duration::days(CLEANUP_WINDOW_DAYS),
            CLEANUP_WINDOW_LIMIT,
        );

        let leftovers = session
            .appointments_in_window(&FolderId::calendar(), &view, &PropertySet::id_only())
            .await?;
        if !leftovers.is_empty() {
            debug!(
                identity = %user.username,
                count = leftovers.len(),
                "removing leftover appointments"
            );
            let ids: Vec<_> = leftovers.into_iter().map(|item| item.id).collect();
            session
                .delete_appointments(
                    &ids,
                    DeleteMode::HardDelete,
                    SendCancellationsMode::SendToNone,
                    AffectedOccurrences::AllOccurrences,
                )
                .await?;
        }

        session
            .backend()
            .set_folder_permissions(session.info(), &FolderId::calendar(), Vec::new())
            .await?;
        Ok(())
    }
}

/// Settings for tests running against the in-memory backend: one
/// impersonation account, one delegation account and five plain users.
pub fn mock_settings() -> Settings {
    let user = |name: &str, password: &str| UserCredentials {
        username: format!("{name}@airplan.local"),
        password: password.to_string(),
    };
    Settings {
        service_url: "https://exchange.test.local/EWS/Exchange.asmx".to_string(),
        accept_invalid_certs: true,
        impersonation: user("eximpersonation", "imp-pass-1"),
        delegation: user("exdelegation", "del-pass-1"),
        user1: user("exuser1", "user-pass-1"),
        user2: user("exuser2", "user-pass-2"),
        user3: user("exuser3", "user-pass-3"),
        user4: user("exuser4", "user-pass-4"),
        user5: user("exuser5", "user-pass-5"),
    }
}

// --- File: crates/calprobe_config/src/models.rs ---

use serde::{Deserialize, Serialize};

/// Credentials for one test mailbox identity.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
}

/// Connection and credential settings for a whole test run.
///
/// Loaded once at fixture setup and never mutated afterwards. Every field
/// without a `serde(default)` is required; a missing value fails the load
/// instead of falling back silently.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Endpoint URL of the calendar service, e.g. `https://mail.local/EWS/Exchange.asmx`.
    pub service_url: String,

    /// Accept the test server's non-production TLS certificate.
    /// Carried into each session's configuration, never applied process-wide.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Service account allowed to impersonate the numbered users.
    pub impersonation: UserCredentials,
    /// Service account that acts through explicitly granted folder permissions.
    pub delegation: UserCredentials,

    pub user1: UserCredentials,
    pub user2: UserCredentials,
    pub user3: UserCredentials,
    pub user4: UserCredentials,
    pub user5: UserCredentials,
}

impl Settings {
    /// The numbered test identities, in order. Teardown iterates these.
    pub fn test_users(&self) -> [&UserCredentials; 5] {
        [&self.user1, &self.user2, &self.user3, &self.user4, &self.user5]
    }

    /// All identities known to the run, service accounts included.
    pub fn all_users(&self) -> Vec<&UserCredentials> {
        let mut users = vec![&self.impersonation, &self.delegation];
        users.extend(self.test_users());
        users
    }
}

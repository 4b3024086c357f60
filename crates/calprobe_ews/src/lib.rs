// --- File: crates/calprobe_ews/src/lib.rs ---
// Declare modules within this crate
pub mod appointment;
pub mod fixture;
pub mod mock;
pub mod notify;
pub mod permissions;
pub mod session;
#[cfg(test)]
mod view_proptest;

use calprobe_common::CalendarError;
use thiserror::Error;

/// Errors produced by the harness layer on top of backend failures.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Backend(#[from] CalendarError),

    /// The bounded wait elapsed before the expected number of events arrived.
    #[error("observed {observed} of {expected} expected events before the deadline")]
    InsufficientEvents { expected: usize, observed: usize },

    /// Permission changes go through the calendar owner's own credentials; a
    /// delegate cannot grant or revoke on a calendar it does not own.
    #[error("permission changes require the calendar owner's direct session")]
    NotOwnerSession,

    #[error("configuration error: {0}")]
    Config(#[from] calprobe_config::ConfigError),
}

impl HarnessError {
    /// Whether the underlying cause is an authorization failure.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, HarnessError::Backend(err) if err.is_access_denied())
    }
}

/// All per-identity cleanup failures collected by a fixture teardown.
///
/// Teardown never short-circuits: every identity is attempted and the
/// failures are reported together.
#[derive(Debug)]
pub struct TeardownError {
    pub failures: Vec<(String, HarnessError)>,
}

impl std::fmt::Display for TeardownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cleanup failed for {} identity(ies):", self.failures.len())?;
        for (identity, error) in &self.failures {
            write!(f, " [{}: {}]", identity, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for TeardownError {}

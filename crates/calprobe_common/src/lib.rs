// --- File: crates/calprobe_common/src/lib.rs ---
//! Shared types for the calprobe harness: the calendar backend contract,
//! the appointment data model, the common error taxonomy, and logging setup.

pub mod error;
pub mod logging;
pub mod models;
pub mod services;

pub use error::CalendarError;
pub use services::{CalendarBackend, StreamingConnection};

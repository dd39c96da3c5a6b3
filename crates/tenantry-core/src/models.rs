//! Domain models for Tenantry.
//!
//! Organizations own projects, projects own environments. Aggregates are
//! plain structs; every mutation goes through a method that refreshes
//! `updated_at` (unix seconds).

pub mod account;
pub mod deletion;
pub mod environment;
pub mod organization;
pub mod project;

/// Current wall-clock time in unix seconds.
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

//! Scheduled birthday greetings.
//!
//! Once a day the scheduler reads the recipient list, picks the entries
//! whose day-month matches today, and sends a templated greeting through
//! each entry's owning session — skipping sessions that are not ready and
//! shrugging off per-entry failures.

pub mod scheduler;
pub mod source;
pub mod types;

pub use {
    scheduler::BirthdayScheduler,
    source::{RecipientSource, TomlFileSource},
    types::BirthdayRecord,
};

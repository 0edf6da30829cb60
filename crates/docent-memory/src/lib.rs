//! `docent-memory` – Session memory.
//!
//! Holds what the robot remembers about a tour while it runs and what it
//! leaves behind once the session ends.
//!
//! # Modules
//!
//! - [`attention_log`] – [`AttentionLog`][attention_log::AttentionLog]: the
//!   session-wide, append-only log of visitor attention readings.  At most one
//!   [`AttentionWriter`][attention_log::AttentionWriter] exists at a time;
//!   any number of readers observe it concurrently.
//! - [`journal`] – [`TourJournal`][journal::TourJournal]: newline-delimited
//!   JSON persistence of attention samples and end-of-session summaries.

pub mod attention_log;
pub mod journal;

pub use attention_log::{AttentionLog, AttentionWriter};
pub use journal::{JournalError, JournalRecord, TourJournal};

//! `docent-runtime` – Tour Orchestration Engine
//!
//! Decides which exhibit to visit next, drives the robot there, and holds an
//! attention-aware conversation with the visitor while a background task
//! samples their engagement.
//!
//! # Modules
//!
//! - [`catalog`] – [`Catalog`][catalog::Catalog]: ordered exhibits with
//!   their narrative and visited flags.
//! - [`scan`] – [`OccupancyScan`][scan::OccupancyScan]: head sweep picking
//!   the first free exhibit, with first-seen fallback.
//! - [`approach`] – marker range/bearing to a rotate-translate-stop maneuver.
//! - [`monitor`] – [`AttentionMonitor`][monitor::AttentionMonitor]: face
//!   search plus periodic attention sampling on its own task.
//! - [`interaction`] – [`Interaction`][interaction::Interaction]: the
//!   per-exhibit conversation state machine.
//! - [`dialogue`] – [`Dialogue`][dialogue::Dialogue] seam and the
//!   llama.cpp-backed [`LlmDialogue`][dialogue::LlmDialogue].
//! - [`tour`] – [`TourController`][tour::TourController]: the top-level
//!   Scan → Approach → Interact → Route loop.
//! - [`phrases`] – fixed spoken lines.
//! - [`telemetry`] – `tracing` subscriber and OTLP export setup.

pub mod approach;
pub mod catalog;
pub mod dialogue;
pub mod interaction;
pub mod monitor;
pub mod phrases;
pub mod scan;
pub mod telemetry;
pub mod tour;

#[cfg(test)]
mod test_support;

//! `docent-hal` – Hardware Abstraction Layer
//!
//! The tour engine never talks to a robot SDK directly.  It only sees the
//! three device traits below, so the simulated robot used in tests and the
//! demo binary can be swapped for a real driver without touching the
//! orchestration logic.
//!
//! # Modules
//!
//! - [`actuation`] – [`Actuation`][actuation::Actuation]: base motion, head
//!   orientation, and the learned home pose.
//! - [`perception`] – [`Perception`][perception::Perception]: marker
//!   detection, face tracking, and mood/attention readings.
//! - [`voice`] – [`Voice`][voice::Voice]: text-to-speech output.
//! - [`sim`] – [`SimRobot`][sim::SimRobot]: an in-process robot implementing
//!   all three traits with a scripted world and a command log.

pub mod actuation;
pub mod perception;
pub mod sim;
pub mod voice;

pub use actuation::Actuation;
pub use perception::Perception;
pub use sim::{SimCommand, SimMarker, SimRobot, SimRobotBuilder};
pub use voice::Voice;

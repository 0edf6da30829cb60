//! `docent-services` – the wire to the backend services.
//!
//! The tour robot relies on two services running on a separate workstation:
//! an occupancy detector watching the exhibits through a fixed camera, and a
//! speech transcriber listening to the visitor.  Both speak the same
//! minimal TCP protocol:
//!
//! 1. The client connects.  Connecting is the request.
//! 2. The server computes its answer and writes it as raw bytes.
//! 3. The server closes the connection.  One exchange per connection.
//!
//! | Service | Payload | Default port |
//! |---|---|---|
//! | Occupancy | ASCII `'0'`/`'1'` per exhibit, catalog order | 5001 |
//! | Transcription | UTF-8 transcript of a fixed-length recording | 5002 |
//!
//! # Modules
//!
//! - [`occupancy`] – [`OccupancyClient`] / [`OccupancyServer`] and the
//!   [`OccupancySource`] / [`OccupancyDetector`] seams.
//! - [`transcription`] – [`TranscriptionClient`] / [`TranscriptionServer`]
//!   and the [`Transcriber`] / [`SpeechRecognizer`] seams.

pub mod occupancy;
pub mod transcription;
mod wire;

pub use occupancy::{OccupancyClient, OccupancyDetector, OccupancyServer, OccupancySource};
pub use transcription::{
    AUDIO_ERROR_REPLY, SpeechRecognizer, Transcriber, TranscriptionClient, TranscriptionServer,
};

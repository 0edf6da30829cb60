//! Generic `Perception` trait: marker detection, face tracking, and the
//! visitor's mood readings.
//!
//! Failures are reported as [`TourError::PerceptionUnavailable`]; the tour
//! engine treats them as "nothing seen" rather than as faults.

use async_trait::async_trait;
use docent_types::{AttentionSample, MarkerSighting, TourError};

#[async_trait]
pub trait Perception: Send + Sync {
    /// Markers visible at the head's current orientation.
    async fn detect_markers(&self) -> Result<Vec<MarkerSighting>, TourError>;

    /// The latest valence/attention estimate for the tracked visitor.
    async fn current_attention_sample(&self) -> Result<AttentionSample, TourError>;

    /// Register a face as the tracking target.
    async fn register_face_target(&self) -> Result<(), TourError>;

    /// Start following the registered face with the head.
    async fn track_face(&self) -> Result<(), TourError>;

    /// `true` while the registered face is in view.
    async fn is_face_acquired(&self) -> Result<bool, TourError>;

    /// Stop tracking and unregister every target.
    async fn stop_tracking(&self) -> Result<(), TourError>;
}

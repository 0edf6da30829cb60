//! Generic `Actuation` trait for the mobile base and the sensor head.
//!
//! Motion commands resolve once the driver has accepted them; callers that
//! need the robot to actually arrive follow up with
//! [`Actuation::wait_until_motion_complete`].

use async_trait::async_trait;
use docent_types::{HeadAxis, Pose, TourError};

/// Base and head motion of the tour robot.
///
/// Every method returns [`TourError::ActuationFailure`] when the command
/// cannot be applied.
#[async_trait]
pub trait Actuation: Send + Sync {
    /// Rotate the base in place by `theta` radians (positive is
    /// counter-clockwise).
    async fn rotate(&self, theta: f32) -> Result<(), TourError>;

    /// Move the base by `(x, y)` metres in its own frame, then turn by `theta`.
    async fn translate(&self, x: f32, y: f32, theta: f32) -> Result<(), TourError>;

    /// Block until the last base motion has finished.
    async fn wait_until_motion_complete(&self) -> Result<(), TourError>;

    /// Halt any base motion immediately.
    async fn stop(&self) -> Result<(), TourError>;

    /// Point a head joint at `angle` radians at the given fraction of maximum
    /// `speed`.
    async fn set_orientation(&self, axis: HeadAxis, angle: f32, speed: f32)
    -> Result<(), TourError>;

    /// Current angle of a head joint in radians.
    async fn orientation(&self, axis: HeadAxis) -> Result<f32, TourError>;

    /// Set head motor stiffness in `[0, 1]`.  Zero releases the joints.
    async fn set_head_stiffness(&self, stiffness: f32) -> Result<(), TourError>;

    /// Record the current pose as home and return it.
    async fn learn_home(&self) -> Result<Pose, TourError>;

    /// Navigate back to the pose recorded by [`learn_home`][Self::learn_home].
    async fn recall_home_pose(&self) -> Result<(), TourError>;
}

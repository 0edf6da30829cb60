//! In-process simulated robot for tests and demo runs without hardware.
//!
//! [`SimRobot`] implements [`Actuation`], [`Perception`] and [`Voice`] over a
//! small scripted world: markers pinned to head-yaw angles, an optional
//! visitor face, and a queue of attention readings.  Every command is
//! appended to a log so tests can assert on exactly what the tour engine
//! asked the hardware to do.
//!
//! # Example
//!
//! ```rust
//! use docent_hal::sim::{SimMarker, SimRobot};
//!
//! let robot = SimRobot::builder()
//!     .with_marker(SimMarker::new(84, -0.5))
//!     .with_face_at(0.0, 0.0)
//!     .with_attention([0.8, 0.3])
//!     .build();
//!
//! assert!(robot.commands().is_empty());
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use docent_types::{AttentionSample, HeadAxis, MarkerSighting, Pose, TourError};
use parking_lot::Mutex;
use tracing::debug;

use crate::actuation::Actuation;
use crate::perception::Perception;
use crate::voice::Voice;

/// Half-width of the simulated camera's horizontal field of view (rad).
///
/// Narrower than the 0.25 rad spacing of the standard sweep so a marker is
/// seen from exactly one sweep position.
const DEFAULT_HALF_FOV: f32 = 0.12;

/// Angular tolerance for a face to count as in view (rad).
const FACE_TOLERANCE: f32 = 0.05;

// ────────────────────────────────────────────────────────────────────────────
// World description
// ────────────────────────────────────────────────────────────────────────────

/// A fiducial marker placed in the simulated world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimMarker {
    pub mark_id: u32,
    /// Head yaw (rad) at which the marker sits on the optical axis.
    pub yaw: f32,
    /// Vertical offset reported with every sighting.
    pub beta: f32,
    /// Apparent angular width; 0.1 m / width gives the distance in metres.
    pub width: f32,
    pub height: f32,
}

impl SimMarker {
    /// A marker at `yaw` seen head-on from one metre away.
    pub fn new(mark_id: u32, yaw: f32) -> Self {
        Self {
            mark_id,
            yaw,
            beta: 0.0,
            width: 0.1,
            height: 0.1,
        }
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

}

/// One hardware command received by the simulator.
#[derive(Debug, Clone, PartialEq)]
pub enum SimCommand {
    Rotate(f32),
    Translate { x: f32, y: f32, theta: f32 },
    WaitMotion,
    Stop,
    SetOrientation { axis: HeadAxis, angle: f32 },
    HeadStiffness(f32),
    LearnHome,
    GoHome,
    DetectMarkers,
    RegisterFace,
    TrackFace,
    StopTracking,
    Say(String),
}

#[derive(Debug)]
struct SimState {
    head_yaw: f32,
    head_pitch: f32,
    pose: Pose,
    home: Pose,
    face_registered: bool,
    tracking: bool,
    attention: VecDeque<f32>,
    last_attention: Option<f32>,
    head_commands: usize,
    commands: Vec<SimCommand>,
}

// ────────────────────────────────────────────────────────────────────────────
// SimRobot
// ────────────────────────────────────────────────────────────────────────────

/// Simulated tour robot.  Construct through [`SimRobot::builder`].
#[derive(Debug)]
pub struct SimRobot {
    markers: Vec<SimMarker>,
    face: Option<(f32, f32)>,
    half_fov: f32,
    fail_motion: bool,
    fail_turn: Option<f32>,
    fail_head_at: Option<usize>,
    fail_detection: bool,
    fail_attention: bool,
    fail_tracking_stop: bool,
    state: Mutex<SimState>,
}

impl SimRobot {
    pub fn builder() -> SimRobotBuilder {
        SimRobotBuilder::default()
    }

    /// Snapshot of every command received so far, in order.
    pub fn commands(&self) -> Vec<SimCommand> {
        self.state.lock().commands.clone()
    }

    /// Everything passed to [`Voice::say`], in order.
    pub fn spoken(&self) -> Vec<String> {
        self.state
            .lock()
            .commands
            .iter()
            .filter_map(|c| match c {
                SimCommand::Say(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn head(&self) -> (f32, f32) {
        let s = self.state.lock();
        (s.head_yaw, s.head_pitch)
    }

    pub fn pose(&self) -> Pose {
        self.state.lock().pose
    }

    pub fn is_tracking(&self) -> bool {
        self.state.lock().tracking
    }

    fn record(&self, command: SimCommand) {
        debug!(?command, "sim command");
        self.state.lock().commands.push(command);
    }

    fn motion_guard(&self, component: &str) -> Result<(), TourError> {
        if self.fail_motion {
            Err(TourError::actuation(component, "simulated motion fault"))
        } else {
            Ok(())
        }
    }

    fn face_in_view(&self, s: &SimState) -> bool {
        match self.face {
            Some((yaw, pitch)) => {
                s.tracking
                    || ((s.head_yaw - yaw).abs() <= FACE_TOLERANCE
                        && (s.head_pitch - pitch).abs() <= FACE_TOLERANCE)
            }
            None => false,
        }
    }
}

#[async_trait]
impl Actuation for SimRobot {
    async fn rotate(&self, theta: f32) -> Result<(), TourError> {
        self.motion_guard("base")?;
        if self.fail_turn.is_some_and(|t| (t - theta).abs() < 1e-4) {
            return Err(TourError::actuation("base", "simulated turn fault"));
        }
        let mut s = self.state.lock();
        s.pose.theta += theta;
        s.commands.push(SimCommand::Rotate(theta));
        Ok(())
    }

    async fn translate(&self, x: f32, y: f32, theta: f32) -> Result<(), TourError> {
        self.motion_guard("base")?;
        let mut s = self.state.lock();
        let (sin, cos) = s.pose.theta.sin_cos();
        s.pose.x += x * cos - y * sin;
        s.pose.y += x * sin + y * cos;
        s.pose.theta += theta;
        s.commands.push(SimCommand::Translate { x, y, theta });
        Ok(())
    }

    async fn wait_until_motion_complete(&self) -> Result<(), TourError> {
        self.record(SimCommand::WaitMotion);
        Ok(())
    }

    async fn stop(&self) -> Result<(), TourError> {
        self.record(SimCommand::Stop);
        Ok(())
    }

    async fn set_orientation(
        &self,
        axis: HeadAxis,
        angle: f32,
        _speed: f32,
    ) -> Result<(), TourError> {
        let mut s = self.state.lock();
        s.head_commands += 1;
        if self.fail_head_at == Some(s.head_commands) {
            return Err(TourError::actuation("head", "simulated head fault"));
        }
        match axis {
            HeadAxis::Yaw => s.head_yaw = angle,
            HeadAxis::Pitch => s.head_pitch = angle,
        }
        s.commands.push(SimCommand::SetOrientation { axis, angle });
        Ok(())
    }

    async fn orientation(&self, axis: HeadAxis) -> Result<f32, TourError> {
        let s = self.state.lock();
        Ok(match axis {
            HeadAxis::Yaw => s.head_yaw,
            HeadAxis::Pitch => s.head_pitch,
        })
    }

    async fn set_head_stiffness(&self, stiffness: f32) -> Result<(), TourError> {
        self.record(SimCommand::HeadStiffness(stiffness));
        Ok(())
    }

    async fn learn_home(&self) -> Result<Pose, TourError> {
        let mut s = self.state.lock();
        s.home = s.pose;
        s.commands.push(SimCommand::LearnHome);
        Ok(s.home)
    }

    async fn recall_home_pose(&self) -> Result<(), TourError> {
        self.motion_guard("navigation")?;
        let mut s = self.state.lock();
        s.pose = s.home;
        s.commands.push(SimCommand::GoHome);
        Ok(())
    }
}

#[async_trait]
impl Perception for SimRobot {
    async fn detect_markers(&self) -> Result<Vec<MarkerSighting>, TourError> {
        self.record(SimCommand::DetectMarkers);
        if self.fail_detection {
            return Err(TourError::PerceptionUnavailable(
                "simulated detector offline".to_string(),
            ));
        }
        let yaw = self.state.lock().head_yaw;
        Ok(self
            .markers
            .iter()
            .filter(|m| (m.yaw - yaw).abs() <= self.half_fov)
            .map(|m| MarkerSighting {
                mark_id: m.mark_id,
                alpha: m.yaw - yaw,
                beta: m.beta,
                width: m.width,
                height: m.height,
            })
            .collect())
    }

    async fn current_attention_sample(&self) -> Result<AttentionSample, TourError> {
        if self.fail_attention {
            return Err(TourError::PerceptionUnavailable(
                "simulated mood estimator offline".to_string(),
            ));
        }
        let mut s = self.state.lock();
        let attention = match s.attention.pop_front() {
            Some(a) => {
                s.last_attention = Some(a);
                a
            }
            None => s.last_attention.unwrap_or(0.5),
        };
        Ok(AttentionSample::now(0.0, attention))
    }

    async fn register_face_target(&self) -> Result<(), TourError> {
        let mut s = self.state.lock();
        s.face_registered = true;
        s.commands.push(SimCommand::RegisterFace);
        Ok(())
    }

    async fn track_face(&self) -> Result<(), TourError> {
        let mut s = self.state.lock();
        s.tracking = s.face_registered;
        s.commands.push(SimCommand::TrackFace);
        Ok(())
    }

    async fn is_face_acquired(&self) -> Result<bool, TourError> {
        let s = self.state.lock();
        Ok(s.face_registered && self.face_in_view(&s))
    }

    async fn stop_tracking(&self) -> Result<(), TourError> {
        let mut s = self.state.lock();
        s.tracking = false;
        s.face_registered = false;
        s.commands.push(SimCommand::StopTracking);
        if self.fail_tracking_stop {
            return Err(TourError::PerceptionUnavailable(
                "simulated tracker refused to stop".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Voice for SimRobot {
    async fn say(&self, text: &str) -> Result<(), TourError> {
        self.record(SimCommand::Say(text.to_string()));
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRobotBuilder
// ────────────────────────────────────────────────────────────────────────────

/// Builder for a [`SimRobot`].
///
/// Call the `with_*` methods to describe the world, then
/// [`build`][Self::build] to obtain a shareable robot.
#[derive(Debug)]
pub struct SimRobotBuilder {
    markers: Vec<SimMarker>,
    face: Option<(f32, f32)>,
    attention: Vec<f32>,
    half_fov: f32,
    initial_yaw: f32,
    fail_motion: bool,
    fail_turn: Option<f32>,
    fail_head_at: Option<usize>,
    fail_detection: bool,
    fail_attention: bool,
    fail_tracking_stop: bool,
}

impl Default for SimRobotBuilder {
    fn default() -> Self {
        Self {
            markers: Vec::new(),
            face: None,
            attention: Vec::new(),
            half_fov: DEFAULT_HALF_FOV,
            initial_yaw: 0.0,
            fail_motion: false,
            fail_turn: None,
            fail_head_at: None,
            fail_detection: false,
            fail_attention: false,
            fail_tracking_stop: false,
        }
    }
}

impl SimRobotBuilder {
    pub fn with_marker(mut self, marker: SimMarker) -> Self {
        self.markers.push(marker);
        self
    }

    /// Place the visitor's face at the given head orientation.
    pub fn with_face_at(mut self, yaw: f32, pitch: f32) -> Self {
        self.face = Some((yaw, pitch));
        self
    }

    /// Attention readings returned in order; the last one repeats once the
    /// queue is drained.
    pub fn with_attention(mut self, readings: impl IntoIterator<Item = f32>) -> Self {
        self.attention = readings.into_iter().collect();
        self
    }

    pub fn with_half_fov(mut self, half_fov: f32) -> Self {
        self.half_fov = half_fov;
        self
    }

    pub fn with_initial_yaw(mut self, yaw: f32) -> Self {
        self.initial_yaw = yaw;
        self
    }

    /// Make every base motion command fail.
    pub fn failing_motion(mut self) -> Self {
        self.fail_motion = true;
        self
    }

    /// Make in-place turns of exactly `theta` fail; other motion succeeds.
    pub fn failing_turn(mut self, theta: f32) -> Self {
        self.fail_turn = Some(theta);
        self
    }

    /// Make the `n`-th head orientation command (1-based) fail and leave the
    /// head where it was.  Later commands succeed.
    pub fn failing_head_command(mut self, n: usize) -> Self {
        self.fail_head_at = Some(n);
        self
    }

    /// Make every marker detection fail.
    pub fn failing_detection(mut self) -> Self {
        self.fail_detection = true;
        self
    }

    /// Make every attention reading fail.
    pub fn failing_attention(mut self) -> Self {
        self.fail_attention = true;
        self
    }

    /// Make [`Perception::stop_tracking`] report an error after releasing.
    pub fn failing_tracking_stop(mut self) -> Self {
        self.fail_tracking_stop = true;
        self
    }

    pub fn build(self) -> Arc<SimRobot> {
        Arc::new(SimRobot {
            markers: self.markers,
            face: self.face,
            half_fov: self.half_fov,
            fail_motion: self.fail_motion,
            fail_turn: self.fail_turn,
            fail_head_at: self.fail_head_at,
            fail_detection: self.fail_detection,
            fail_attention: self.fail_attention,
            fail_tracking_stop: self.fail_tracking_stop,
            state: Mutex::new(SimState {
                head_yaw: self.initial_yaw,
                head_pitch: 0.0,
                pose: Pose::default(),
                home: Pose::default(),
                face_registered: false,
                tracking: false,
                attention: self.attention.into(),
                last_attention: None,
                head_commands: 0,
                commands: Vec::new(),
            }),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn marker_visible_only_near_its_yaw() {
        let robot = SimRobot::builder()
            .with_marker(SimMarker::new(84, -0.5))
            .build();

        robot.set_orientation(HeadAxis::Yaw, 0.0, 0.3).await.unwrap();
        assert!(robot.detect_markers().await.unwrap().is_empty());

        robot.set_orientation(HeadAxis::Yaw, -0.5, 0.3).await.unwrap();
        let seen = robot.detect_markers().await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].mark_id, 84);
        assert!(seen[0].alpha.abs() < 1e-6);
    }

    #[tokio::test]
    async fn attention_queue_repeats_last_reading() {
        let robot = SimRobot::builder().with_attention([0.9, 0.2]).build();
        let a = robot.current_attention_sample().await.unwrap().attention;
        let b = robot.current_attention_sample().await.unwrap().attention;
        let c = robot.current_attention_sample().await.unwrap().attention;
        assert!((a - 0.9).abs() < f32::EPSILON);
        assert!((b - 0.2).abs() < f32::EPSILON);
        assert!((c - 0.2).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn face_requires_registration_and_orientation() {
        let robot = SimRobot::builder().with_face_at(0.25, -0.25).build();
        robot.set_orientation(HeadAxis::Yaw, 0.25, 0.3).await.unwrap();
        robot.set_orientation(HeadAxis::Pitch, -0.25, 0.2).await.unwrap();
        assert!(!robot.is_face_acquired().await.unwrap());

        robot.register_face_target().await.unwrap();
        assert!(robot.is_face_acquired().await.unwrap());

        robot.track_face().await.unwrap();
        robot.set_orientation(HeadAxis::Yaw, 1.0, 0.3).await.unwrap();
        assert!(robot.is_face_acquired().await.unwrap(), "tracking follows the face");

        robot.stop_tracking().await.unwrap();
        assert!(!robot.is_tracking());
        assert!(!robot.is_face_acquired().await.unwrap());
    }

    #[tokio::test]
    async fn failing_motion_reports_actuation_failure() {
        let robot = SimRobot::builder().failing_motion().build();
        let err = robot.rotate(0.3).await.unwrap_err();
        assert!(matches!(err, TourError::ActuationFailure { .. }));
    }

    #[tokio::test]
    async fn turn_fault_hits_only_the_matching_turn() {
        let robot = SimRobot::builder().failing_turn(2.5).build();
        robot.rotate(-0.5).await.unwrap();
        let err = robot.rotate(2.5).await.unwrap_err();
        assert!(matches!(err, TourError::ActuationFailure { .. }));
        assert_eq!(robot.commands(), vec![SimCommand::Rotate(-0.5)]);
    }

    #[tokio::test]
    async fn head_fault_leaves_the_head_unmoved_once() {
        let robot = SimRobot::builder().failing_head_command(2).build();
        robot.set_orientation(HeadAxis::Yaw, 0.5, 0.3).await.unwrap();
        let err = robot
            .set_orientation(HeadAxis::Yaw, -0.5, 0.3)
            .await
            .unwrap_err();
        assert!(matches!(err, TourError::ActuationFailure { .. }));
        assert_eq!(robot.head(), (0.5, 0.0));

        robot.set_orientation(HeadAxis::Yaw, -0.5, 0.3).await.unwrap();
        assert_eq!(robot.head(), (-0.5, 0.0));
    }

    #[tokio::test]
    async fn home_round_trip_restores_pose() {
        let robot = SimRobot::builder().build();
        robot.learn_home().await.unwrap();
        robot.rotate(1.0).await.unwrap();
        robot.translate(0.5, 0.0, 0.0).await.unwrap();
        assert!(robot.pose().x.abs() > 0.1);
        robot.recall_home_pose().await.unwrap();
        assert_eq!(robot.pose(), Pose::default());
    }

    #[tokio::test]
    async fn say_is_logged() {
        let robot = SimRobot::builder().build();
        robot.say("hello").await.unwrap();
        assert_eq!(robot.spoken(), vec!["hello".to_string()]);
    }
}

//! Approach maneuver – from a marker sighting to a stop just short of it.
//!
//! The marker's real size and its apparent angular width give the range
//! (`distance = marker_size / apparent_width`).  The robot turns in place by
//! the bearing, then drives straight for the ground-plane projection of that
//! range, scaled down by a safety factor.

use docent_hal::Actuation;
use docent_types::{DetectionCandidate, TourError};
use tracing::{debug, info};

/// Geometry constants of the approach.
#[derive(Debug, Clone, PartialEq)]
pub struct ApproachConfig {
    /// Printed marker edge length (m).
    pub marker_size: f32,
    /// Fraction of the computed forward distance actually driven.
    pub safety_factor: f32,
}

impl Default for ApproachConfig {
    fn default() -> Self {
        Self {
            marker_size: 0.1,
            safety_factor: 0.6,
        }
    }
}

/// Motion plan for one approach.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TravelVector {
    /// In-place rotation (rad).
    pub rotation: f32,
    /// Straight-line range to the marker (m).
    pub distance: f32,
    /// Forward translation after the rotation, safety factor applied (m).
    pub forward: f32,
}

/// Compute the travel vector for a marker seen at `bearing`/`elevation` with
/// apparent angular `width`.
///
/// # Errors
///
/// [`TourError::InvalidGeometry`] if `width` is not a positive finite number
/// or an angle is not finite.
pub fn travel_vector(
    bearing: f32,
    elevation: f32,
    width: f32,
    config: &ApproachConfig,
) -> Result<TravelVector, TourError> {
    if !width.is_finite() || width <= 0.0 {
        return Err(TourError::InvalidGeometry(format!(
            "apparent width {width} cannot yield a distance"
        )));
    }
    if !bearing.is_finite() || !elevation.is_finite() {
        return Err(TourError::InvalidGeometry(format!(
            "non-finite angles (bearing {bearing}, elevation {elevation})"
        )));
    }
    let distance = config.marker_size / width;
    let forward = distance * elevation.cos() * bearing.cos() * config.safety_factor;
    Ok(TravelVector {
        rotation: bearing,
        distance,
        forward,
    })
}

/// Drive up to `candidate`: rotate, wait, translate, wait, stop.
///
/// Motion errors are returned as-is without any retry.
pub async fn approach_marker(
    actuation: &dyn Actuation,
    candidate: &DetectionCandidate,
    config: &ApproachConfig,
) -> Result<TravelVector, TourError> {
    let plan = travel_vector(
        candidate.bearing,
        candidate.elevation,
        candidate.apparent_width,
        config,
    )?;
    debug!(mark_id = candidate.mark_id, ?plan, "approach planned");

    actuation.rotate(plan.rotation).await?;
    actuation.wait_until_motion_complete().await?;
    actuation.translate(plan.forward, 0.0, 0.0).await?;
    actuation.wait_until_motion_complete().await?;
    actuation.stop().await?;

    info!(
        mark_id = candidate.mark_id,
        rotation = plan.rotation,
        forward = plan.forward,
        "reached exhibit marker"
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_hal::{SimCommand, SimRobot};

    fn candidate(bearing: f32, width: f32) -> DetectionCandidate {
        DetectionCandidate {
            mark_id: 84,
            bearing,
            elevation: 0.0,
            apparent_width: width,
            apparent_height: width,
        }
    }

    #[test]
    fn head_on_marker_at_one_metre() {
        let v = travel_vector(0.0, 0.0, 0.1, &ApproachConfig::default()).unwrap();
        assert!((v.distance - 1.0).abs() < 1e-6);
        assert!((v.forward - 0.6).abs() < 1e-6);
        assert_eq!(v.rotation, 0.0);
    }

    #[test]
    fn oblique_marker_projects_range() {
        let cfg = ApproachConfig {
            marker_size: 0.1,
            safety_factor: 1.0,
        };
        let v = travel_vector(0.5, 0.2, 0.05, &cfg).unwrap();
        let expected = 2.0 * 0.2f32.cos() * 0.5f32.cos();
        assert!((v.forward - expected).abs() < 1e-5);
        assert_eq!(v.rotation, 0.5);
    }

    #[test]
    fn degenerate_width_is_rejected() {
        let cfg = ApproachConfig::default();
        for width in [0.0, -0.1, f32::NAN, f32::INFINITY] {
            let err = travel_vector(0.0, 0.0, width, &cfg).unwrap_err();
            assert!(matches!(err, TourError::InvalidGeometry(_)));
        }
    }

    #[tokio::test]
    async fn issues_rotate_translate_then_stop() {
        let robot = SimRobot::builder().build();
        approach_marker(robot.as_ref(), &candidate(0.3, 0.1), &ApproachConfig::default())
            .await
            .unwrap();

        let motion: Vec<SimCommand> = robot
            .commands()
            .into_iter()
            .filter(|c| !matches!(c, SimCommand::WaitMotion))
            .collect();
        assert_eq!(motion.len(), 3);
        assert_eq!(motion[0], SimCommand::Rotate(0.3));
        match motion[1] {
            SimCommand::Translate { x, y, theta } => {
                assert!((x - 0.6 * 0.3f32.cos()).abs() < 1e-5);
                assert_eq!((y, theta), (0.0, 0.0));
            }
            ref other => panic!("expected translate, got {other:?}"),
        }
        assert_eq!(motion[2], SimCommand::Stop);
    }

    #[tokio::test]
    async fn motion_failure_propagates() {
        let robot = SimRobot::builder().failing_motion().build();
        let err = approach_marker(robot.as_ref(), &candidate(0.0, 0.1), &ApproachConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TourError::ActuationFailure { .. }));
    }

    #[tokio::test]
    async fn bad_geometry_moves_nothing() {
        let robot = SimRobot::builder().build();
        let result =
            approach_marker(robot.as_ref(), &candidate(0.0, 0.0), &ApproachConfig::default()).await;
        assert!(result.is_err());
        assert!(robot.commands().is_empty());
    }
}

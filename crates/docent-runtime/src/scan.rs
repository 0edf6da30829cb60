//! Occupancy-aware scan – sweep the head, pick the first free exhibit.
//!
//! The head visits a fixed row of yaw positions.  At each one the marker
//! detector is read and every sighting of a catalog exhibit is checked
//! against the current [`OccupancyState`]:
//!
//! - the first catalog sighting of the sweep becomes the fallback;
//! - the first *free* sighting ends the sweep immediately;
//! - a completed sweep returns the fallback, or nothing.
//!
//! Head yaw and pitch are put back to their pre-scan values whatever the
//! result, including when a head command fails half way.

use std::sync::Arc;
use std::time::Duration;

use docent_hal::{Actuation, Perception};
use docent_types::{DetectionCandidate, HeadAxis, OccupancyState, TourError};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;

/// Nine head-yaw stops across the full range, left to right (rad).
pub const SWEEP_YAWS: [f32; 9] = [-1.0, -0.75, -0.5, -0.25, 0.0, 0.25, 0.5, 0.75, 1.0];

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub yaw_positions: Vec<f32>,
    /// Head pitch held during the sweep (rad).
    pub pitch: f32,
    pub yaw_speed: f32,
    pub pitch_speed: f32,
    /// Speed used when restoring the pre-scan orientation.
    pub restore_speed: f32,
    /// Wait after each head move before reading the detector.
    pub settle: Duration,
    /// Treat already-visited exhibits like occupied ones when looking for a
    /// free target.  They can still be chosen as the fallback.
    pub prefer_unvisited: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            yaw_positions: SWEEP_YAWS.to_vec(),
            pitch: 0.0,
            yaw_speed: 0.3,
            pitch_speed: 0.2,
            restore_speed: 0.2,
            settle: Duration::from_millis(1500),
            prefer_unvisited: false,
        }
    }
}

/// Result of one sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScanOutcome {
    /// A free exhibit; the sweep stopped as soon as it was seen.
    Free(DetectionCandidate),
    /// Every sighted exhibit was occupied; this is the first one seen.
    AllOccupied(DetectionCandidate),
    NoDetection,
}

impl ScanOutcome {
    pub fn candidate(&self) -> Option<&DetectionCandidate> {
        match self {
            ScanOutcome::Free(c) | ScanOutcome::AllOccupied(c) => Some(c),
            ScanOutcome::NoDetection => None,
        }
    }
}

pub struct OccupancyScan {
    actuation: Arc<dyn Actuation>,
    perception: Arc<dyn Perception>,
    config: ScanConfig,
}

impl OccupancyScan {
    pub fn new(
        actuation: Arc<dyn Actuation>,
        perception: Arc<dyn Perception>,
        config: ScanConfig,
    ) -> Self {
        Self {
            actuation,
            perception,
            config,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Sweep once and choose a target.
    ///
    /// Detector failures count as "nothing seen" at that position.
    ///
    /// # Errors
    ///
    /// [`TourError::ActuationFailure`] if the head cannot be read, moved or
    /// restored.  The restore is attempted even when the sweep failed.
    pub async fn scan(
        &self,
        catalog: &Catalog,
        occupancy: &OccupancyState,
    ) -> Result<ScanOutcome, TourError> {
        let yaw = self.actuation.orientation(HeadAxis::Yaw).await?;
        let pitch = self.actuation.orientation(HeadAxis::Pitch).await?;

        let swept = self.sweep(catalog, occupancy).await;
        let restored = self.restore(yaw, pitch).await;

        let outcome = swept?;
        restored?;
        match &outcome {
            ScanOutcome::Free(c) => info!(mark_id = c.mark_id, "free exhibit found"),
            ScanOutcome::AllOccupied(c) => {
                info!(mark_id = c.mark_id, "all sighted exhibits occupied; using first seen")
            }
            ScanOutcome::NoDetection => info!("no exhibit marker seen during sweep"),
        }
        Ok(outcome)
    }

    async fn sweep(
        &self,
        catalog: &Catalog,
        occupancy: &OccupancyState,
    ) -> Result<ScanOutcome, TourError> {
        let cfg = &self.config;
        let mut fallback: Option<DetectionCandidate> = None;

        for &yaw in &cfg.yaw_positions {
            self.actuation
                .set_orientation(HeadAxis::Yaw, yaw, cfg.yaw_speed)
                .await?;
            self.actuation
                .set_orientation(HeadAxis::Pitch, cfg.pitch, cfg.pitch_speed)
                .await?;
            tokio::time::sleep(cfg.settle).await;

            let sightings = match self.perception.detect_markers().await {
                Ok(s) => s,
                Err(e) => {
                    warn!(yaw, error = %e, "marker detection failed; treating as nothing seen");
                    continue;
                }
            };

            for s in sightings {
                let Some(index) = catalog.index_of(s.mark_id) else {
                    debug!(mark_id = s.mark_id, "ignoring marker outside the catalog");
                    continue;
                };
                let candidate = DetectionCandidate {
                    mark_id: s.mark_id,
                    bearing: yaw + s.alpha,
                    elevation: s.beta,
                    apparent_width: s.width,
                    apparent_height: s.height,
                };
                let first = *fallback.get_or_insert(candidate);

                let occupied = occupancy.is_occupied(index);
                let skip_visited = cfg.prefer_unvisited && catalog.is_visited(s.mark_id);
                if !occupied && !skip_visited {
                    return Ok(ScanOutcome::Free(candidate));
                }
                debug!(
                    mark_id = s.mark_id,
                    occupied,
                    fallback = first.mark_id,
                    "exhibit not available; continuing sweep"
                );
            }
        }

        Ok(fallback.map_or(ScanOutcome::NoDetection, ScanOutcome::AllOccupied))
    }

    async fn restore(&self, yaw: f32, pitch: f32) -> Result<(), TourError> {
        let speed = self.config.restore_speed;
        let yaw_result = self.actuation.set_orientation(HeadAxis::Yaw, yaw, speed).await;
        let pitch_result = self
            .actuation
            .set_orientation(HeadAxis::Pitch, pitch, speed)
            .await;
        yaw_result.and(pitch_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_hal::{SimMarker, SimRobot};

    fn quick() -> ScanConfig {
        ScanConfig {
            settle: Duration::ZERO,
            ..ScanConfig::default()
        }
    }

    fn scanner(robot: &Arc<SimRobot>, config: ScanConfig) -> OccupancyScan {
        OccupancyScan::new(robot.clone(), robot.clone(), config)
    }

    fn gallery() -> Arc<SimRobot> {
        SimRobot::builder()
            .with_marker(SimMarker::new(84, -0.5))
            .with_marker(SimMarker::new(80, 0.5))
            .with_initial_yaw(0.3)
            .build()
    }

    #[tokio::test]
    async fn returns_free_exhibit_and_restores_head() {
        let robot = gallery();
        let occupancy = OccupancyState::parse("10").unwrap();
        let outcome = scanner(&robot, quick())
            .scan(&Catalog::museum_default(), &occupancy)
            .await
            .unwrap();

        match outcome {
            ScanOutcome::Free(c) => {
                assert_eq!(c.mark_id, 80);
                assert!((c.bearing - 0.5).abs() < 1e-6);
            }
            other => panic!("expected free exhibit, got {other:?}"),
        }
        assert_eq!(robot.head(), (0.3, 0.0));
    }

    #[tokio::test]
    async fn head_fault_mid_sweep_still_restores_head() {
        // Fifth head command is the yaw move to the third sweep stop.
        let robot = SimRobot::builder()
            .with_marker(SimMarker::new(84, -0.5))
            .with_marker(SimMarker::new(80, 0.5))
            .with_initial_yaw(0.3)
            .failing_head_command(5)
            .build();
        let result = scanner(&robot, quick())
            .scan(&Catalog::museum_default(), &OccupancyState::empty())
            .await;

        assert!(matches!(result, Err(TourError::ActuationFailure { .. })));
        assert_eq!(robot.head(), (0.3, 0.0));
        let commands = robot.commands();
        assert_eq!(
            &commands[commands.len() - 2..],
            &[
                docent_hal::SimCommand::SetOrientation { axis: HeadAxis::Yaw, angle: 0.3 },
                docent_hal::SimCommand::SetOrientation { axis: HeadAxis::Pitch, angle: 0.0 },
            ]
        );
    }

    #[tokio::test]
    async fn free_exhibit_short_circuits_the_sweep() {
        let robot = gallery();
        scanner(&robot, quick())
            .scan(&Catalog::museum_default(), &OccupancyState::parse("00").unwrap())
            .await
            .unwrap();
        let detections = robot
            .commands()
            .iter()
            .filter(|c| matches!(c, docent_hal::SimCommand::DetectMarkers))
            .count();
        // -1.0, -0.75, -0.5: stops at the stop where 84 comes into view.
        assert_eq!(detections, 3);
    }

    #[tokio::test]
    async fn all_occupied_falls_back_to_first_seen() {
        // 80 sits earlier in the sweep than 84 although it is second in
        // the catalog.
        let robot = SimRobot::builder()
            .with_marker(SimMarker::new(84, 0.75))
            .with_marker(SimMarker::new(80, -0.75))
            .build();
        let outcome = scanner(&robot, quick())
            .scan(&Catalog::museum_default(), &OccupancyState::parse("11").unwrap())
            .await
            .unwrap();
        assert!(matches!(outcome, ScanOutcome::AllOccupied(c) if c.mark_id == 80));
        assert_eq!(robot.head(), (0.0, 0.0));
    }

    #[tokio::test]
    async fn nothing_seen_is_no_detection() {
        let robot = SimRobot::builder().with_initial_yaw(-0.2).build();
        let outcome = scanner(&robot, quick())
            .scan(&Catalog::museum_default(), &OccupancyState::empty())
            .await
            .unwrap();
        assert_eq!(outcome, ScanOutcome::NoDetection);
        assert_eq!(robot.head(), (-0.2, 0.0));
    }

    #[tokio::test]
    async fn short_occupancy_string_reads_as_free() {
        let robot = SimRobot::builder()
            .with_marker(SimMarker::new(80, 0.0))
            .build();
        // Only 84's slot is covered; 80 (index 1) is past the end.
        let outcome = scanner(&robot, quick())
            .scan(&Catalog::museum_default(), &OccupancyState::parse("1").unwrap())
            .await
            .unwrap();
        assert!(matches!(outcome, ScanOutcome::Free(c) if c.mark_id == 80));
    }

    #[tokio::test]
    async fn unknown_markers_are_ignored() {
        let robot = SimRobot::builder()
            .with_marker(SimMarker::new(64, -1.0))
            .build();
        let outcome = scanner(&robot, quick())
            .scan(&Catalog::museum_default(), &OccupancyState::empty())
            .await
            .unwrap();
        assert_eq!(outcome, ScanOutcome::NoDetection);
    }

    #[tokio::test]
    async fn detector_failure_reads_as_nothing_seen() {
        let robot = SimRobot::builder()
            .with_marker(SimMarker::new(84, 0.0))
            .with_initial_yaw(0.1)
            .failing_detection()
            .build();
        let outcome = scanner(&robot, quick())
            .scan(&Catalog::museum_default(), &OccupancyState::empty())
            .await
            .unwrap();
        assert_eq!(outcome, ScanOutcome::NoDetection);
        assert_eq!(robot.head(), (0.1, 0.0));
    }

    #[tokio::test]
    async fn prefer_unvisited_skips_visited_free_exhibit() {
        let robot = gallery();
        let mut catalog = Catalog::museum_default();
        catalog.mark_visited(84);
        let config = ScanConfig {
            prefer_unvisited: true,
            ..quick()
        };
        let outcome = scanner(&robot, config)
            .scan(&catalog, &OccupancyState::parse("00").unwrap())
            .await
            .unwrap();
        assert!(matches!(outcome, ScanOutcome::Free(c) if c.mark_id == 80));
    }
}

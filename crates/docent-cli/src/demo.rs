//! Simulated gallery for `docent tour`.

use std::sync::Arc;

use docent_hal::{SimMarker, SimRobot};
use docent_runtime::catalog::Catalog;
use tracing::warn;

/// Head yaws at which catalog markers are hung, in catalog order.  Each is a
/// sweep position, so every marker is seen head-on.
pub const MARKER_YAWS: [f32; 9] = [-0.5, 0.5, -0.25, 0.25, -0.75, 0.75, -1.0, 1.0, 0.0];

/// Where the visitor stands relative to the robot's head.
pub const VISITOR_FACE: (f32, f32) = (0.0, -0.25);

/// Engagement of the simulated visitor over the conversation.
const ATTENTION: [f32; 4] = [0.8, 0.65, 0.5, 0.3];

/// A robot in a room holding one marker per exhibit, two metres away, and a
/// visitor whose attention slowly drifts.
pub fn demo_robot(catalog: &Catalog) -> Arc<SimRobot> {
    if catalog.len() > MARKER_YAWS.len() {
        warn!(
            exhibits = catalog.len(),
            placed = MARKER_YAWS.len(),
            "not every exhibit fits in the simulated room"
        );
    }
    catalog
        .iter()
        .zip(MARKER_YAWS)
        .fold(SimRobot::builder(), |builder, (exhibit, yaw)| {
            builder.with_marker(SimMarker::new(exhibit.id, yaw).with_size(0.05, 0.05))
        })
        .with_face_at(VISITOR_FACE.0, VISITOR_FACE.1)
        .with_attention(ATTENTION)
        .build()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use docent_runtime::scan::{OccupancyScan, ScanConfig, ScanOutcome};
    use docent_types::OccupancyState;

    use super::*;

    fn scanner(robot: &Arc<SimRobot>) -> OccupancyScan {
        OccupancyScan::new(
            robot.clone(),
            robot.clone(),
            ScanConfig {
                settle: Duration::ZERO,
                ..ScanConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn every_exhibit_is_reachable_by_a_sweep() {
        let catalog = Catalog::museum_default();
        let robot = demo_robot(&catalog);

        let first = scanner(&robot)
            .scan(&catalog, &OccupancyState::empty())
            .await
            .unwrap();
        assert!(matches!(first, ScanOutcome::Free(c) if c.mark_id == 84));

        let monet_taken = OccupancyState::parse("10").unwrap();
        let second = scanner(&robot).scan(&catalog, &monet_taken).await.unwrap();
        assert!(matches!(second, ScanOutcome::Free(c) if c.mark_id == 80));
    }

    #[test]
    fn marker_yaws_are_distinct() {
        for (i, a) in MARKER_YAWS.iter().enumerate() {
            for b in &MARKER_YAWS[i + 1..] {
                assert!((a - b).abs() > 0.2);
            }
        }
    }
}

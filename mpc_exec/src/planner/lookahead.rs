//! Lookahead point selection

use crate::loc::Pose;

/// Select the lookahead (carrot) pose from a local window.
///
/// Returns the first pose at least `lookahead_dist_m` from the robot, which sits at the origin of
/// the window's frame. If the window ends before that distance the last pose is used. Returns
/// `None` only for an empty window.
pub fn select(lookahead_dist_m: f64, poses: &[Pose]) -> Option<&Pose> {
    poses
        .iter()
        .find(|p| p.position_m.x.hypot(p.position_m.y) >= lookahead_dist_m)
        .or_else(|| poses.last())
}

#[cfg(test)]
mod test {
    use super::*;

    fn window() -> Vec<Pose> {
        vec![
            Pose::from_xy_yaw(0.0, 0.0, 0.0),
            Pose::from_xy_yaw(1.0, 0.0, 0.0),
            Pose::from_xy_yaw(2.0, 0.0, 0.0),
        ]
    }

    #[test]
    fn test_select() {
        let poses = window();

        assert_eq!(select(1.0, &poses), Some(&poses[1]));
        assert_eq!(select(0.5, &poses), Some(&poses[1]));
        assert_eq!(select(0.0, &poses), Some(&poses[0]));

        // Same inputs, same carrot
        assert_eq!(select(1.5, &poses), select(1.5, &poses));
    }

    #[test]
    fn test_select_short_window() {
        let poses = window();

        assert_eq!(select(10.0, &poses), Some(&poses[2]));
        assert_eq!(select(1.0, &[]), None);
    }

    #[test]
    fn test_select_uses_planar_distance() {
        // Off to the side rather than ahead
        let poses = vec![
            Pose::from_xy_yaw(0.3, 0.3, 0.0),
            Pose::from_xy_yaw(0.6, 0.9, 0.0),
            Pose::from_xy_yaw(2.0, 2.0, 0.0),
        ];

        assert_eq!(select(1.0, &poses), Some(&poses[1]));
    }
}

//! Optimizer request assembly and submission

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::msg::{self, OptimizerRequest};
use log::warn;

use super::PlannerError;
use crate::{
    loc::{Pose, PoseStamped},
    optimizer_client::Optimizer,
};

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build the optimizer request for this cycle.
///
/// `switch_opt` tells the optimizer to switch to its near goal behaviour.
pub fn build(
    current_pose: &PoseStamped,
    current_vel: &msg::Twist,
    carrot: &PoseStamped,
    goal: &Pose,
    switch_opt: bool,
    control_interval_s: f64,
) -> OptimizerRequest {
    OptimizerRequest {
        current_vel: *current_vel,
        carrot_pose: carrot.to_msg(),
        goal_pose: msg::Pose::from(goal),
        current_pose: current_pose.to_msg(),
        switch_opt,
        control_interval: control_interval_s,
    }
}

/// Send the request to the optimizer and wait for the velocity command.
pub fn submit(
    optimizer: &mut dyn Optimizer,
    request: &OptimizerRequest,
) -> Result<msg::TwistStamped, PlannerError> {
    optimizer.optimize(request).map_err(|e| {
        warn!("Optimizer request failed: {}", e);
        PlannerError::OptimizerUnavailable(e)
    })
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::optimizer_client::{MockOptimizer, OptimizerClientError};
    use chrono::Utc;

    fn request() -> OptimizerRequest {
        let now = Utc::now();
        build(
            &PoseStamped::new("map", now, Pose::from_xy_yaw(1.0, 2.0, 0.0)),
            &msg::Twist::planar(0.3, 0.0, 0.1),
            &PoseStamped::new("base_link", now, Pose::from_xy_yaw(0.8, 0.1, 0.2)),
            &Pose::from_xy_yaw(5.0, 2.0, 0.0),
            true,
            0.05,
        )
    }

    #[test]
    fn test_build() {
        let req = request();

        assert_eq!(req.current_pose.header.frame_id, "map");
        assert_eq!(req.current_pose.pose.position.y, 2.0);
        assert_eq!(req.carrot_pose.header.frame_id, "base_link");
        assert_eq!(req.carrot_pose.pose.position.x, 0.8);
        assert_eq!(req.goal_pose.position.x, 5.0);
        assert_eq!(req.current_vel.linear.x, 0.3);
        assert!(req.switch_opt);
        assert_eq!(req.control_interval, 0.05);
    }

    #[test]
    fn test_submit() {
        let mut optimizer = MockOptimizer::new();
        optimizer
            .expect_optimize()
            .withf(|r| r.switch_opt && r.control_interval == 0.05)
            .times(1)
            .returning(|r| {
                Ok(msg::TwistStamped {
                    header: r.carrot_pose.header.clone(),
                    twist: msg::Twist::planar(0.2, 0.0, 0.0),
                })
            });

        let vel = submit(&mut optimizer, &request()).unwrap();
        assert_eq!(vel.twist.linear.x, 0.2);
        assert_eq!(vel.header.frame_id, "base_link");
    }

    #[test]
    fn test_submit_failure() {
        let mut optimizer = MockOptimizer::new();
        optimizer
            .expect_optimize()
            .returning(|_| Err(OptimizerClientError::NotConnected));

        assert!(matches!(
            submit(&mut optimizer, &request()),
            Err(PlannerError::OptimizerUnavailable(OptimizerClientError::NotConnected))
        ));
    }
}

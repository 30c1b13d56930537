//! Plan windowing
//!
//! Consumes the global plan up to the pose closest to the robot and expresses the part of the plan
//! within range of the local cost map in the robot's base frame.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Duration, Utc};
use comms_if::msg::{self, DiagPacket};
use log::{debug, error};

use super::{Plan, PlannerError};
use crate::{
    diag_server::DiagSink,
    loc::{Pose, PoseStamped},
    tf::{transform_pose, Transformer},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Settings for a single windowing pass.
#[derive(Debug, Clone, Copy)]
pub struct WindowConfig<'a> {
    /// Frame the window is expressed in
    pub base_frame: &'a str,

    pub transform_tolerance: Duration,

    /// Plan poses further than this from the robot end the window
    pub max_transform_dist_m: f64,

    /// The robot is near the goal when it's at most this far from it
    pub close_to_goal_dist_m: f64,
}

/// The part of the global plan around the robot, in the robot's base frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalWindow {
    pub frame_id: String,

    pub stamp: DateTime<Utc>,

    /// Poses of the window in plan order. Never empty.
    pub poses: Vec<Pose>,

    /// True if the robot is within the close to goal distance of the goal
    pub near_goal: bool,
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Trim the plan to the robot's position and project the poses in range into the base frame.
///
/// Every plan pose before the one closest to the robot is discarded, even if the window turns out
/// to be empty. The window is published to `diag` before an empty window is reported.
pub fn trim_and_project(
    plan: &mut Plan,
    robot_pose: &PoseStamped,
    tf: &dyn Transformer,
    config: &WindowConfig,
    diag: &mut dyn DiagSink,
) -> Result<LocalWindow, PlannerError> {
    if plan.is_empty() {
        return Err(PlannerError::EmptyPlan);
    }

    // Robot in the plan frame
    let robot = transform_pose(tf, robot_pose, &plan.frame_id, config.transform_tolerance)
        .map_err(|e| {
            error!("Unable to transform robot pose into global plan's frame: {}", e);
            PlannerError::TransformUnavailable(e)
        })?
        .pose;

    let closest = plan.closest_index(&robot).ok_or(PlannerError::EmptyPlan)?;

    let near_goal = match plan.goal() {
        Some(goal) => robot.distance2(goal) <= config.close_to_goal_dist_m,
        None => false,
    };

    // Contiguous run of poses in range, starting at the closest
    let mut poses = Vec::new();
    for pose in plan.poses[closest..]
        .iter()
        .take_while(|p| p.distance2(&robot) <= config.max_transform_dist_m)
    {
        let stamped = PoseStamped::new(plan.frame_id.clone(), robot_pose.stamp, *pose);
        let local = transform_pose(tf, &stamped, config.base_frame, config.transform_tolerance)
            .map_err(|e| {
                error!("Unable to transform plan pose into the base frame: {}", e);
                PlannerError::TransformUnavailable(e)
            })?;
        poses.push(local.pose);
    }

    plan.consume_to(closest);

    let window = LocalWindow {
        frame_id: config.base_frame.to_string(),
        stamp: robot_pose.stamp,
        poses,
        near_goal,
    };

    if let Err(e) = diag.publish(&DiagPacket::LocalPlan(window.to_msg())) {
        debug!("Could not publish the local plan: {}", e);
    }

    if window.poses.is_empty() {
        return Err(PlannerError::EmptyWindow);
    }

    Ok(window)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LocalWindow {
    pub fn to_msg(&self) -> msg::Path {
        Plan::new(self.frame_id.clone(), self.stamp, self.poses.clone()).to_msg()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

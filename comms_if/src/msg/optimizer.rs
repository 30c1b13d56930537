//! # Optimizer Service Messages
//!
//! Request/response pair for the external trajectory optimizer. One request is sent per control
//! cycle and the cycle doesn't complete until the response arrives.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::geometry::{Pose, PoseStamped, Twist, TwistStamped};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Request sent from the planner to the optimizer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OptimizerRequest {
    /// Current velocity of the robot
    pub current_vel: Twist,

    /// The lookahead point to steer towards, in the robot's base frame
    pub carrot_pose: PoseStamped,

    /// Final pose of the global plan
    pub goal_pose: Pose,

    /// Current pose of the robot
    pub current_pose: PoseStamped,

    /// Set when the robot is within the close-to-goal distance, switching the optimizer to its
    /// goal approach behaviour
    pub switch_opt: bool,

    /// Control period in seconds
    pub control_interval: f64,
}

/// Response sent from the optimizer back to the planner.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OptimizerResponse {
    /// The velocity command to execute
    pub output_vel: TwistStamped,
}

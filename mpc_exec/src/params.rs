//! # MPC Executable Parameters
//!
//! This module provide parameters for the MPC planner executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::planner;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MpcExecParams {
    pub planner: planner::Params,

    pub net: NetParams,

    pub sim: SimParams,
}

/// Network parameters
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NetParams {
    /// Network endpoint of the trajectory optimizer
    pub optimizer_endpoint: String,

    /// Network endpoint the diagnostics are published on
    pub diag_endpoint: String,

    /// Maximum time to wait for an optimizer response, -1 waits forever
    #[serde(default = "default_optimizer_timeout_ms")]
    pub optimizer_timeout_ms: i32,

    /// Maximum time to wait for the optimizer to become available at startup, 0 waits forever
    #[serde(default)]
    pub optimizer_connect_timeout_ms: i32,
}

/// Parameters of the simulated robot and its environment
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SimParams {
    /// Frame the global plan and the robot's position are expressed in
    pub global_frame: String,

    /// Number of cells in the local cost map along X and Y
    pub costmap_num_cells: [usize; 2],

    /// Size of a cost map cell in meters
    pub costmap_resolution_m: f64,

    /// Initial robot pose as `[x, y, yaw]` in the global frame
    pub initial_pose: [f64; 3],

    /// Distance from the goal at which the run is complete
    pub goal_tolerance_m: f64,

    /// Number of cycles after which the run is abandoned
    pub max_cycles: usize,

    /// Obstacles as `[min_x, min_y, max_x, max_y]` rectangles in the global frame
    #[serde(default)]
    pub obstacles_m: Vec<[f64; 4]>,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_optimizer_timeout_ms() -> i32 {
    -1
}

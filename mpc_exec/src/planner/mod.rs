//! # Planner module
//!
//! The per-cycle local planning logic. Each cycle the stored global plan is trimmed to the part
//! around the robot, a lookahead point is chosen along it, the speed regime is updated, the
//! footprint is checked for collisions and finally the optimizer is asked for a velocity command.
//!
//! [`MpcPlanner`] owns all state carried between cycles and serialises cycles against runtime
//! parameter changes.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod collision;
pub mod lookahead;
mod params;
mod plan;
pub mod regime;
pub mod request;
mod state;
pub mod window;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use params::*;
pub use plan::Plan;
pub use regime::SpeedRegime;
pub use state::MpcPlanner;
pub use window::{LocalWindow, WindowConfig};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use crate::{optimizer_client::OptimizerClientError, tf::TfError};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Reasons a planning cycle can fail. A failed cycle produces no velocity command.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("The global plan is empty")]
    EmptyPlan,

    #[error("Could not transform the robot pose: {0}")]
    TransformUnavailable(TfError),

    #[error("No part of the global plan lies within range of the local map")]
    EmptyWindow,

    #[error("The robot's footprint is in collision (cost {0})")]
    CollisionDetected(f64),

    #[error("Could not get a velocity command from the optimizer: {0}")]
    OptimizerUnavailable(OptimizerClientError),
}

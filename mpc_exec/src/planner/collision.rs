//! Footprint collision checking

use super::PlannerError;
use crate::{
    loc::Pose,
    map::{CostMap, Footprint, LETHAL_COST},
};

/// Cost of the footprint placed at `pose`, in the cost map's frame.
pub fn footprint_cost(costmap: &dyn CostMap, pose: &Pose, footprint: &Footprint) -> f64 {
    costmap.footprint_cost_at_pose(
        pose.position_m.x,
        pose.position_m.y,
        pose.get_heading(),
        footprint,
    )
}

/// Fail if the cost means the footprint is in collision, otherwise pass the cost on.
pub fn check(cost: f64) -> Result<f64, PlannerError> {
    if cost >= LETHAL_COST as f64 {
        Err(PlannerError::CollisionDetected(cost))
    } else {
        Ok(cost)
    }
}

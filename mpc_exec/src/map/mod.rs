//! # Map module
//!
//! The planner only needs two things from the local cost map: its extent, which bounds how much of
//! the global plan is considered each cycle, and the cost of the robot's footprint at a pose. Both
//! are provided through the [`CostMap`] trait.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod grid_map;

pub use grid_map::GridCostMap;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Cost of a cell with no obstacles near it.
pub const FREE_COST: u8 = 0;

/// Cost which signals certain collision.
pub const LETHAL_COST: u8 = 255;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A local cost map centred around the robot.
pub trait CostMap {
    /// Number of cells along the X axis.
    fn size_in_cells_x(&self) -> usize;

    /// Number of cells along the Y axis.
    fn size_in_cells_y(&self) -> usize;

    /// Side length of a cell in meters.
    fn resolution_m(&self) -> f64;

    /// Get the cost of the footprint placed at (x, y) with heading `yaw_rad`.
    ///
    /// Costs are in the range `[FREE_COST, LETHAL_COST]`, `LETHAL_COST` meaning the footprint
    /// is certainly in collision.
    fn footprint_cost_at_pose(&self, x_m: f64, y_m: f64, yaw_rad: f64, footprint: &Footprint)
        -> f64;

    /// Half the largest side of the map, beyond which plan points can't be in the map.
    fn max_transform_dist_m(&self) -> f64 {
        let max_cells = self.size_in_cells_x().max(self.size_in_cells_y());
        max_cells as f64 * self.resolution_m() / 2.0
    }
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The outline of the robot as a polygon in the robot's base frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub points_m: Vec<Vector2<f64>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CostMapError {
    #[error("Cell {0:?} is outside the map")]
    CellOutsideMap(Vector2<usize>),

    #[error("A map must have at least one cell and a positive resolution")]
    InvalidDimensions,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Footprint {
    pub fn new(points_m: Vec<Vector2<f64>>) -> Self {
        Self { points_m }
    }

    /// Build a footprint from `[x, y]` pairs, as found in parameter files.
    pub fn from_pairs(pairs: &[[f64; 2]]) -> Self {
        Self::new(pairs.iter().map(|p| Vector2::new(p[0], p[1])).collect())
    }

    /// Get the footprint's points after placing it at (x, y) with heading `yaw_rad`.
    pub fn transformed(&self, x_m: f64, y_m: f64, yaw_rad: f64) -> Vec<Vector2<f64>> {
        let rot = Rotation2::new(yaw_rad);
        let offset = Vector2::new(x_m, y_m);

        self.points_m.iter().map(|p| rot * p + offset).collect()
    }
}

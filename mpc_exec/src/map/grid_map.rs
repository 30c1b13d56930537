//! # Grid cost map
//!
//! A single layer grid of `u8` costs. Cell `(0, 0)` is the cell with the lowest X and Y
//! coordinates, its lower corner lying on the map's origin.

// ------------------------------------------------------------------------------------------------
// INCLUDES
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::{CostMap, CostMapError, Footprint, LETHAL_COST};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridCostMap {
    /// Side length of each cell in meters
    resolution_m: f64,

    /// Position of the lower corner of cell (0, 0)
    origin_m: Vector2<f64>,

    /// Cell costs, indexed by x cell then y cell
    cells: Array2<u8>,
}

/// Iterates over the cells on the line between two cells, inclusive of both ends.
struct LineIterator {
    x: i64,
    y: i64,
    x_end: i64,
    y_end: i64,
    dx: i64,
    dy: i64,
    step_x: i64,
    step_y: i64,
    error: i64,
    done: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GridCostMap {
    /// Create a new map with every cell set to `default_cost`.
    pub fn new(
        num_cells: Vector2<usize>,
        resolution_m: f64,
        origin_m: Vector2<f64>,
        default_cost: u8,
    ) -> Result<Self, CostMapError> {
        if num_cells.x == 0 || num_cells.y == 0 || !(resolution_m > 0.0) {
            return Err(CostMapError::InvalidDimensions);
        }

        Ok(Self {
            resolution_m,
            origin_m,
            cells: Array2::from_elem((num_cells.x, num_cells.y), default_cost),
        })
    }

    /// Create a new map whose centre lies on `centre_m`.
    pub fn centred_on(
        num_cells: Vector2<usize>,
        resolution_m: f64,
        centre_m: Vector2<f64>,
        default_cost: u8,
    ) -> Result<Self, CostMapError> {
        let half_size_m = Vector2::new(num_cells.x as f64, num_cells.y as f64) * resolution_m / 2.0;
        Self::new(num_cells, resolution_m, centre_m - half_size_m, default_cost)
    }

    pub fn origin_m(&self) -> Vector2<f64> {
        self.origin_m
    }

    /// Get the cell containing the given position, or `None` if it's outside the map.
    pub fn world_to_map(&self, position_m: &Vector2<f64>) -> Option<Vector2<usize>> {
        let rel = (position_m - self.origin_m) / self.resolution_m;

        if rel.x < 0.0 || rel.y < 0.0 {
            return None;
        }

        let cell = Vector2::new(rel.x.floor() as usize, rel.y.floor() as usize);

        if self.contains_cell(&cell) {
            Some(cell)
        } else {
            None
        }
    }

    /// Get the position of the centre of the given cell.
    pub fn map_to_world(&self, cell: &Vector2<usize>) -> Vector2<f64> {
        self.origin_m + Vector2::new(cell.x as f64 + 0.5, cell.y as f64 + 0.5) * self.resolution_m
    }

    pub fn get_cost(&self, cell: &Vector2<usize>) -> Option<u8> {
        self.cells.get((cell.x, cell.y)).copied()
    }

    pub fn set_cost(&mut self, cell: &Vector2<usize>, cost: u8) -> Result<(), CostMapError> {
        match self.cells.get_mut((cell.x, cell.y)) {
            Some(c) => {
                *c = cost;
                Ok(())
            }
            None => Err(CostMapError::CellOutsideMap(*cell)),
        }
    }

    /// Set the cost of every cell whose centre lies within the given axis-aligned rectangle.
    pub fn fill_rect(&mut self, min_m: &Vector2<f64>, max_m: &Vector2<f64>, cost: u8) {
        let resolution_m = self.resolution_m;
        let origin_m = self.origin_m;

        for ((x, y), c) in self.cells.indexed_iter_mut() {
            let centre = origin_m + Vector2::new(x as f64 + 0.5, y as f64 + 0.5) * resolution_m;

            if centre.x >= min_m.x && centre.x <= max_m.x && centre.y >= min_m.y && centre.y <= max_m.y
            {
                *c = cost;
            }
        }
    }

    fn contains_cell(&self, cell: &Vector2<usize>) -> bool {
        let (nx, ny) = self.cells.dim();
        cell.x < nx && cell.y < ny
    }

    /// Maximum cost of the cells along a line, stopping early on a lethal cell.
    fn line_cost(&self, from: &Vector2<usize>, to: &Vector2<usize>) -> u8 {
        let mut max_cost = 0;

        for cell in LineIterator::new(from, to) {
            let cost = self.get_cost(&cell).unwrap_or(LETHAL_COST);

            if cost == LETHAL_COST {
                return LETHAL_COST;
            }
            max_cost = max_cost.max(cost);
        }

        max_cost
    }
}

impl CostMap for GridCostMap {
    fn size_in_cells_x(&self) -> usize {
        self.cells.dim().0
    }

    fn size_in_cells_y(&self) -> usize {
        self.cells.dim().1
    }

    fn resolution_m(&self) -> f64 {
        self.resolution_m
    }

    fn footprint_cost_at_pose(
        &self,
        x_m: f64,
        y_m: f64,
        yaw_rad: f64,
        footprint: &Footprint,
    ) -> f64 {
        // A footprint with no outline is treated as a point robot
        if footprint.points_m.is_empty() {
            return self
                .world_to_map(&Vector2::new(x_m, y_m))
                .and_then(|c| self.get_cost(&c))
                .unwrap_or(LETHAL_COST) as f64;
        }

        // Any vertex off the map means we can't say the footprint is safe
        let mut vertices = Vec::with_capacity(footprint.points_m.len());
        for point in footprint.transformed(x_m, y_m, yaw_rad) {
            match self.world_to_map(&point) {
                Some(c) => vertices.push(c),
                None => return LETHAL_COST as f64,
            }
        }

        // Check each edge, including the one closing the polygon
        let mut footprint_cost = 0;
        for i in 0..vertices.len() {
            let next = (i + 1) % vertices.len();
            footprint_cost = footprint_cost.max(self.line_cost(&vertices[i], &vertices[next]));

            if footprint_cost == LETHAL_COST {
                break;
            }
        }

        footprint_cost as f64
    }
}

impl LineIterator {
    fn new(from: &Vector2<usize>, to: &Vector2<usize>) -> Self {
        let (x, y) = (from.x as i64, from.y as i64);
        let (x_end, y_end) = (to.x as i64, to.y as i64);

        let dx = (x_end - x).abs();
        let dy = -(y_end - y).abs();

        Self {
            x,
            y,
            x_end,
            y_end,
            dx,
            dy,
            step_x: if x < x_end { 1 } else { -1 },
            step_y: if y < y_end { 1 } else { -1 },
            error: dx + dy,
            done: false,
        }
    }
}

impl Iterator for LineIterator {
    type Item = Vector2<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        // Both ends lie in the map so every cell on the line is non-negative
        let cell = Vector2::new(self.x as usize, self.y as usize);

        if self.x == self.x_end && self.y == self.y_end {
            self.done = true;
        } else {
            let e2 = 2 * self.error;
            if e2 >= self.dy {
                self.error += self.dy;
                self.x += self.step_x;
            }
            if e2 <= self.dx {
                self.error += self.dx;
                self.y += self.step_y;
            }
        }

        Some(cell)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::map::FREE_COST;

    fn square_footprint(half_width_m: f64) -> Footprint {
        Footprint::from_pairs(&[
            [half_width_m, half_width_m],
            [-half_width_m, half_width_m],
            [-half_width_m, -half_width_m],
            [half_width_m, -half_width_m],
        ])
    }

    #[test]
    fn test_cell_conversion() -> Result<(), CostMapError> {
        let map = GridCostMap::centred_on(Vector2::new(20, 10), 0.5, Vector2::new(0.0, 0.0), 0)?;

        assert_eq!(map.origin_m(), Vector2::new(-5.0, -2.5));
        assert_eq!(map.world_to_map(&Vector2::new(0.1, 0.1)), Some(Vector2::new(10, 5)));
        assert_eq!(map.world_to_map(&Vector2::new(-5.0, -2.5)), Some(Vector2::new(0, 0)));
        assert_eq!(map.world_to_map(&Vector2::new(5.0, 0.0)), None);
        assert_eq!(map.world_to_map(&Vector2::new(-5.1, 0.0)), None);
        assert_eq!(map.map_to_world(&Vector2::new(10, 5)), Vector2::new(0.25, 0.25));

        assert_eq!(map.max_transform_dist_m(), 5.0);

        assert!(GridCostMap::new(Vector2::new(0, 10), 0.5, Vector2::zeros(), 0).is_err());
        assert!(GridCostMap::new(Vector2::new(10, 10), 0.0, Vector2::zeros(), 0).is_err());

        Ok(())
    }

    #[test]
    fn test_line_iterator() {
        let cells: Vec<_> = LineIterator::new(&Vector2::new(0, 0), &Vector2::new(3, 1)).collect();
        assert_eq!(cells.first(), Some(&Vector2::new(0, 0)));
        assert_eq!(cells.last(), Some(&Vector2::new(3, 1)));
        assert_eq!(cells.len(), 4);

        let cells: Vec<_> = LineIterator::new(&Vector2::new(2, 5), &Vector2::new(2, 1)).collect();
        assert_eq!(cells.len(), 5);
        assert!(cells.iter().all(|c| c.x == 2));

        let single: Vec<_> = LineIterator::new(&Vector2::new(4, 4), &Vector2::new(4, 4)).collect();
        assert_eq!(single, vec![Vector2::new(4, 4)]);
    }

    #[test]
    fn test_footprint_cost() -> Result<(), CostMapError> {
        let mut map =
            GridCostMap::centred_on(Vector2::new(100, 100), 0.05, Vector2::zeros(), FREE_COST)?;
        let footprint = square_footprint(0.3);

        // Free space
        assert_eq!(map.footprint_cost_at_pose(0.0, 0.0, 0.0, &footprint), 0.0);

        // Inflated cost crossing the footprint's front edge
        map.fill_rect(&Vector2::new(0.26, -1.0), &Vector2::new(0.34, 1.0), 210);
        assert_eq!(map.footprint_cost_at_pose(0.0, 0.0, 0.0, &footprint), 210.0);

        // The cost only touches the outline, not the centre
        assert_eq!(
            map.footprint_cost_at_pose(0.0, 0.0, 0.0, &Footprint::default()),
            0.0
        );

        // Lethal obstacle under the left edge
        map.set_cost(&map.world_to_map(&Vector2::new(-0.3, 0.0)).unwrap(), LETHAL_COST)?;
        assert_eq!(
            map.footprint_cost_at_pose(0.0, 0.0, 0.0, &footprint),
            LETHAL_COST as f64
        );

        // Hanging off the edge of the map
        assert_eq!(
            map.footprint_cost_at_pose(2.4, 0.0, 0.0, &footprint),
            LETHAL_COST as f64
        );

        Ok(())
    }
}

//! # Speed regime
//!
//! The planner runs in one of two regimes. In [`SpeedRegime::Normal`] it looks far ahead along the
//! plan, in [`SpeedRegime::Slowed`] it uses a short lookahead, which keeps the robot close to the
//! plan when it's turning sharply near obstacles.
//!
//! The regime is re-evaluated every cycle from the heading of the lookahead point and the cost of
//! the robot's footprint. To stop the regime flickering at the boundary a second lookahead point,
//! chosen at the distance of the regime the cycle started in, can hold the robot in the slowed
//! regime.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::LookaheadParams;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Absolute heading of the lookahead point, in radians, from which the robot may need to slow.
pub const HEADING_DEVIATION_LIMIT_RAD: f64 = 1.0;

/// Footprint costs above this are considered close to an obstacle.
pub const HIGH_COST_THRESHOLD: f64 = 200.0;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedRegime {
    Normal,
    Slowed,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SpeedRegime {
    /// Get the regime for the next cycle.
    ///
    /// - `carrot_heading_abs_rad`: absolute heading of the lookahead point in the robot frame
    /// - `reprobe_heading_abs_rad`: absolute heading of a second lookahead point chosen at the
    ///   current regime's distance
    /// - `footprint_cost`: cost of the robot's footprint at its current pose
    pub fn evaluate(
        carrot_heading_abs_rad: f64,
        reprobe_heading_abs_rad: f64,
        footprint_cost: f64,
    ) -> Self {
        let high_cost = footprint_cost > HIGH_COST_THRESHOLD;

        if carrot_heading_abs_rad < HEADING_DEVIATION_LIMIT_RAD {
            if reprobe_heading_abs_rad >= HEADING_DEVIATION_LIMIT_RAD && high_cost {
                SpeedRegime::Slowed
            } else {
                SpeedRegime::Normal
            }
        } else if high_cost {
            SpeedRegime::Slowed
        } else {
            SpeedRegime::Normal
        }
    }

    /// Lookahead distance to use in this regime.
    ///
    /// Near the goal the close to goal distance always wins.
    pub fn lookahead_distance(&self, params: &LookaheadParams, near_goal: bool) -> f64 {
        if near_goal {
            params.close_to_goal_m
        } else {
            match self {
                SpeedRegime::Normal => params.max_m,
                SpeedRegime::Slowed => params.min_m,
            }
        }
    }
}

impl Default for SpeedRegime {
    fn default() -> Self {
        SpeedRegime::Normal
    }
}

impl std::fmt::Display for SpeedRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeedRegime::Normal => write!(f, "NORMAL"),
            SpeedRegime::Slowed => write!(f, "SLOWED"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const LOOKAHEAD: LookaheadParams = LookaheadParams {
        min_m: 0.3,
        max_m: 1.2,
        close_to_goal_m: 0.2,
    };

    #[test]
    fn test_evaluate() {
        // Straight ahead, free space
        assert_eq!(SpeedRegime::evaluate(0.1, 0.1, 0.0), SpeedRegime::Normal);

        // Sharp turn in free space
        assert_eq!(SpeedRegime::evaluate(1.5, 1.5, 50.0), SpeedRegime::Normal);

        // Sharp turn close to an obstacle
        assert_eq!(SpeedRegime::evaluate(1.5, 1.5, 210.0), SpeedRegime::Slowed);
        assert_eq!(SpeedRegime::evaluate(1.0, 0.2, 210.0), SpeedRegime::Slowed);

        // At the threshold cost is not high
        assert_eq!(SpeedRegime::evaluate(1.5, 1.5, 200.0), SpeedRegime::Normal);
    }

    #[test]
    fn test_evaluate_hysteresis() {
        // Far carrot looks fine but the near one still needs a sharp turn
        assert_eq!(SpeedRegime::evaluate(0.5, 1.2, 230.0), SpeedRegime::Slowed);

        // Only holds near obstacles
        assert_eq!(SpeedRegime::evaluate(0.5, 1.2, 100.0), SpeedRegime::Normal);

        // Both fine
        assert_eq!(SpeedRegime::evaluate(0.5, 0.6, 230.0), SpeedRegime::Normal);
    }

    #[test]
    fn test_lookahead_distance() {
        assert_eq!(SpeedRegime::Normal.lookahead_distance(&LOOKAHEAD, false), 1.2);
        assert_eq!(SpeedRegime::Slowed.lookahead_distance(&LOOKAHEAD, false), 0.3);
        assert_eq!(SpeedRegime::Normal.lookahead_distance(&LOOKAHEAD, true), 0.2);
        assert_eq!(SpeedRegime::Slowed.lookahead_distance(&LOOKAHEAD, true), 0.2);
    }
}

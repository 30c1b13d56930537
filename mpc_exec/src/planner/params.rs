//! Planner parameters
//!
//! [`Params`] is loaded once from the parameter file. The lookahead distances inside it can then
//! be changed at runtime through [`ParamUpdate`]s.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Name of the minimum lookahead distance parameter
pub const LOOKAHEAD_DIST_MIN: &str = "lookahead_dist_min";

/// Name of the maximum lookahead distance parameter
pub const LOOKAHEAD_DIST_MAX: &str = "lookahead_dist_max";

/// Name of the close to goal lookahead distance parameter
pub const LOOKAHEAD_DIST_CLOSE_TO_GOAL: &str = "lookahead_dist_close_to_goal";

/// Separator between a sub-plugin's namespace and its parameter names
pub const NAMESPACE_DELIMITER: char = '.';

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the planner
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Params {
    /// Lookahead distance used while slowed down
    #[serde(default = "default_lookahead_dist_m")]
    pub lookahead_dist_min: f64,

    /// Lookahead distance used at normal speed
    #[serde(default = "default_lookahead_dist_m")]
    pub lookahead_dist_max: f64,

    /// Lookahead distance used when close to the goal. Also the distance to the goal below which
    /// the robot is considered close to it.
    #[serde(default = "default_lookahead_dist_m")]
    pub lookahead_dist_close_to_goal: f64,

    /// Frequency of the control loop. Only used to give the optimizer its control period.
    #[serde(default = "default_controller_frequency_hz")]
    pub controller_frequency_hz: f64,

    /// How far behind a pose's stamp the transforms may be
    #[serde(default = "default_transform_tolerance_s")]
    pub transform_tolerance_s: f64,

    /// The robot's base frame, in which the local plan is expressed
    pub base_frame: String,

    /// Outline of the robot in the base frame, as `[x, y]` points
    pub footprint_m: Vec<[f64; 2]>,
}

/// The runtime adjustable lookahead distances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookaheadParams {
    pub min_m: f64,
    pub max_m: f64,
    pub close_to_goal_m: f64,
}

/// A single parameter change.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamUpdate {
    pub name: String,
    pub value: ParamValue,
}

/// Result of applying a batch of parameter changes.
#[derive(Debug, Clone, PartialEq)]
pub struct SetParamsResult {
    pub successful: bool,

    /// Why the batch was rejected, empty on success
    pub reason: String,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Double(f64),
    Integer(i64),
    Bool(bool),
    String(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("The controller frequency must be greater than 0 Hz, found {0}")]
    InvalidControllerFrequency(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check the parameters that can't be given safe defaults.
    pub fn validate(&self) -> Result<(), ParamsError> {
        // Also rejects NaN
        if !(self.controller_frequency_hz > 0.0) || self.controller_frequency_hz.is_infinite() {
            return Err(ParamsError::InvalidControllerFrequency(
                self.controller_frequency_hz,
            ));
        }

        Ok(())
    }

    /// Control period in seconds.
    pub fn control_interval_s(&self) -> f64 {
        1.0 / self.controller_frequency_hz
    }

    pub fn lookahead(&self) -> LookaheadParams {
        LookaheadParams {
            min_m: self.lookahead_dist_min,
            max_m: self.lookahead_dist_max,
            close_to_goal_m: self.lookahead_dist_close_to_goal,
        }
    }
}

impl ParamUpdate {
    pub fn double<S: Into<String>>(name: S, value: f64) -> Self {
        Self {
            name: name.into(),
            value: ParamValue::Double(value),
        }
    }

    /// True if the parameter belongs to a sub-plugin, which handles its own parameters.
    pub fn is_namespaced(&self) -> bool {
        self.name.contains(NAMESPACE_DELIMITER)
    }
}

impl SetParamsResult {
    pub fn success() -> Self {
        Self {
            successful: true,
            reason: String::new(),
        }
    }

    pub fn failure<S: Into<String>>(reason: S) -> Self {
        Self {
            successful: false,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_lookahead_dist_m() -> f64 {
    0.5
}

fn default_controller_frequency_hz() -> f64 {
    20.0
}

fn default_transform_tolerance_s() -> f64 {
    0.1
}

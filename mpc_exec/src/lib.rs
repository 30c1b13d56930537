//! # MPC planner library.
//!
//! This library provides the local planning front end of the MPC controller: plan windowing,
//! lookahead point selection, slow-down hysteresis and the request to the external trajectory
//! optimizer.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Diagnostics server - publishes the local plan and lookahead point for visualisation
pub mod diag_server;

/// Localisation types - poses of the robot and of plan points
pub mod loc;

/// Map module - cost maps and the robot footprint
pub mod map;

/// Optimizer client - sends optimization requests to the external trajectory optimizer
pub mod optimizer_client;

/// Executable parameters
pub mod params;

/// Planner module - the per-cycle local planning logic
pub mod planner;

/// Transform module - expresses poses in different reference frames
pub mod tf;

//! # Messages
//!
//! Wire representations of everything the planner sends or receives over the network. All
//! messages are serialized as JSON.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod diag;
pub mod geometry;
pub mod optimizer;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use diag::DiagPacket;
pub use geometry::*;
pub use optimizer::{OptimizerRequest, OptimizerResponse};

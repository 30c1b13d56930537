//! # Diagnostics Messages
//!
//! Best-effort visualisation data published by the planner every cycle.

use serde::{Deserialize, Serialize};

use super::geometry::{Path, PointStamped};

/// Topic of the windowed local plan
pub const LOCAL_PLAN_TOPIC: &str = "received_global_plan";

/// Topic of the lookahead point
pub const CARROT_TOPIC: &str = "lookahead_point";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum DiagPacket {
    /// The part of the global plan in range of the local map, in the robot's base frame
    LocalPlan(Path),

    /// The selected lookahead point
    Carrot(PointStamped),
}

impl DiagPacket {
    /// Get the topic this packet is published on.
    pub fn topic(&self) -> &'static str {
        match self {
            DiagPacket::LocalPlan(_) => LOCAL_PLAN_TOPIC,
            DiagPacket::Carrot(_) => CARROT_TOPIC,
        }
    }
}

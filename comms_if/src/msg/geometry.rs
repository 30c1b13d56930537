//! # Geometry Messages
//!
//! These mirror the standard robotics middleware geometry messages so that plans and velocity
//! commands can be exchanged with external tools without conversion.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Reference frame and timestamp of a stamped message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Header {
    pub frame_id: String,

    pub stamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// An orientation quaternion. The default value is the identity rotation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Pose {
    pub position: Point,
    pub orientation: Quaternion,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PoseStamped {
    pub header: Header,
    pub pose: Pose,
}

/// Linear (m/s) and angular (rad/s) velocity.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Twist {
    pub linear: Vector3,
    pub angular: Vector3,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TwistStamped {
    pub header: Header,
    pub twist: Twist,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PointStamped {
    pub header: Header,
    pub point: Point,
}

/// A sequence of poses sharing the frame given in the header.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Path {
    pub header: Header,
    pub poses: Vec<PoseStamped>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Header {
    pub fn new<S: Into<String>>(frame_id: S, stamp: DateTime<Utc>) -> Self {
        Self {
            frame_id: frame_id.into(),
            stamp,
        }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl Twist {
    /// Planar velocity with forward speed `vx`, lateral speed `vy` and yaw rate `wz`.
    pub fn planar(vx: f64, vy: f64, wz: f64) -> Self {
        Self {
            linear: Vector3 { x: vx, y: vy, z: 0.0 },
            angular: Vector3 { x: 0.0, y: 0.0, z: wz },
        }
    }
}

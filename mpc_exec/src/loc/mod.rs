//! # Localisation types
//!
//! Poses used throughout the planner. These are the internal (nalgebra based) equivalents of the
//! `comms_if` geometry messages, which are only used at the network boundary.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use comms_if::msg;
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A position and attitude within some reference frame.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// The position in the parent frame
    pub position_m: Vector3<f64>,

    /// The attitude in the parent frame
    pub attitude_q: UnitQuaternion<f64>,
}

/// A pose tagged with the frame it is expressed in and the time it is valid at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseStamped {
    pub frame_id: String,

    pub stamp: DateTime<Utc>,

    pub pose: Pose,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Create a planar pose at (x, y) rotated by `yaw_rad` about the Z axis.
    pub fn from_xy_yaw(x_m: f64, y_m: f64, yaw_rad: f64) -> Self {
        Self {
            position_m: Vector3::new(x_m, y_m, 0.0),
            attitude_q: UnitQuaternion::from_euler_angles(0.0, 0.0, yaw_rad),
        }
    }

    /// Return the heading (rotation about the Z axis) of the pose in radians, in the range
    /// [-pi, pi].
    pub fn get_heading(&self) -> f64 {
        self.attitude_q.euler_angles().2
    }

    /// Get the XY components of the position.
    pub fn position2(&self) -> Vector2<f64> {
        self.position_m.xy()
    }

    /// Planar distance between two poses.
    pub fn distance2(&self, other: &Pose) -> f64 {
        (self.position2() - other.position2()).norm()
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.position_m), self.attitude_q)
    }

    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        Self {
            position_m: iso.translation.vector,
            attitude_q: iso.rotation,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position_m: Vector3::zeros(),
            attitude_q: UnitQuaternion::identity(),
        }
    }
}

impl PoseStamped {
    pub fn new<S: Into<String>>(frame_id: S, stamp: DateTime<Utc>, pose: Pose) -> Self {
        Self {
            frame_id: frame_id.into(),
            stamp,
            pose,
        }
    }

    pub fn to_msg(&self) -> msg::PoseStamped {
        msg::PoseStamped {
            header: msg::Header::new(self.frame_id.clone(), self.stamp),
            pose: msg::Pose::from(&self.pose),
        }
    }
}

impl From<&msg::Pose> for Pose {
    fn from(pose: &msg::Pose) -> Self {
        let o = &pose.orientation;

        // A zero quaternion carries no orientation, treat it as the identity rather than
        // producing NaNs
        let attitude_q =
            UnitQuaternion::try_new(Quaternion::new(o.w, o.x, o.y, o.z), std::f64::EPSILON)
                .unwrap_or_else(UnitQuaternion::identity);

        Self {
            position_m: Vector3::new(pose.position.x, pose.position.y, pose.position.z),
            attitude_q,
        }
    }
}

impl From<&Pose> for msg::Pose {
    fn from(pose: &Pose) -> Self {
        let q = pose.attitude_q.quaternion();

        Self {
            position: msg::Point {
                x: pose.position_m.x,
                y: pose.position_m.y,
                z: pose.position_m.z,
            },
            orientation: msg::Quaternion {
                x: q.i,
                y: q.j,
                z: q.k,
                w: q.w,
            },
        }
    }
}

impl From<&msg::PoseStamped> for PoseStamped {
    fn from(pose: &msg::PoseStamped) -> Self {
        Self {
            frame_id: pose.header.frame_id.clone(),
            stamp: pose.header.stamp,
            pose: Pose::from(&pose.pose),
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

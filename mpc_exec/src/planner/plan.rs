//! Global plan storage

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use comms_if::msg;
use serde::{Deserialize, Serialize};

use crate::loc::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The global plan the planner is following.
///
/// Poses are consumed from the front as the robot advances along the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Frame every pose in the plan is expressed in
    pub frame_id: String,

    pub stamp: DateTime<Utc>,

    pub poses: Vec<Pose>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Plan {
    pub fn new<S: Into<String>>(frame_id: S, stamp: DateTime<Utc>, poses: Vec<Pose>) -> Self {
        Self {
            frame_id: frame_id.into(),
            stamp,
            poses,
        }
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// The final pose of the plan.
    pub fn goal(&self) -> Option<&Pose> {
        self.poses.last()
    }

    /// Index of the pose closest to `pose` in the plane, taking the first on a tie.
    pub fn closest_index(&self, pose: &Pose) -> Option<usize> {
        let mut closest: Option<(usize, f64)> = None;

        for (i, p) in self.poses.iter().enumerate() {
            let dist_m = p.distance2(pose);
            match closest {
                Some((_, min_m)) if dist_m >= min_m => (),
                _ => closest = Some((i, dist_m)),
            }
        }

        closest.map(|(i, _)| i)
    }

    /// Discard every pose before `index`.
    pub fn consume_to(&mut self, index: usize) {
        let index = index.min(self.poses.len());
        self.poses.drain(..index);
    }

    /// Convert to a path message, stamping each pose with the plan's frame and stamp.
    pub fn to_msg(&self) -> msg::Path {
        msg::Path {
            header: msg::Header::new(self.frame_id.clone(), self.stamp),
            poses: self
                .poses
                .iter()
                .map(|p| msg::PoseStamped {
                    header: msg::Header::new(self.frame_id.clone(), self.stamp),
                    pose: msg::Pose::from(p),
                })
                .collect(),
        }
    }
}

impl From<&msg::Path> for Plan {
    /// Per-pose headers are ignored, the path's header applies to all poses.
    fn from(path: &msg::Path) -> Self {
        Self {
            frame_id: path.header.frame_id.clone(),
            stamp: path.header.stamp,
            poses: path.poses.iter().map(|p| Pose::from(&p.pose)).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

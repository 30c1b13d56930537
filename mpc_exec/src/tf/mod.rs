//! # Transform module
//!
//! Expresses poses in different reference frames. The planner only depends on the [`Transformer`]
//! trait, so it can be backed by any transform service. [`FrameTree`] is a simple in-process
//! implementation in which every frame is defined relative to a single root frame.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use chrono::{DateTime, Duration, Utc};
use nalgebra::Isometry3;

use crate::loc::{Pose, PoseStamped};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of transforms between named reference frames.
pub trait Transformer {
    /// Express `pose` in `target_frame`.
    ///
    /// `tolerance` is how far the available transforms may lag the pose's stamp.
    fn transform(
        &self,
        pose: &PoseStamped,
        target_frame: &str,
        tolerance: Duration,
    ) -> Result<PoseStamped, TfError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A tree of frames, each one defined by its pose in the root frame.
#[derive(Debug)]
pub struct FrameTree {
    root_frame: String,

    frames: RwLock<HashMap<String, FrameEntry>>,
}

#[derive(Debug, Clone, Copy)]
struct FrameEntry {
    root_from_frame: Isometry3<f64>,

    /// Time the entry is valid at, or `None` for a static frame.
    stamp: Option<DateTime<Utc>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TfError {
    #[error("Frame \"{0}\" does not exist in the frame tree")]
    UnknownFrame(String),

    #[error("Lookup of frame \"{frame}\" would extrapolate {ahead_s:.3} s into the future")]
    Extrapolation { frame: String, ahead_s: f64 },
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Express `pose` in `target_frame`.
///
/// If the pose is already in the target frame it's returned as is without consulting the
/// transformer.
pub fn transform_pose(
    tf: &dyn Transformer,
    pose: &PoseStamped,
    target_frame: &str,
    tolerance: Duration,
) -> Result<PoseStamped, TfError> {
    if pose.frame_id == target_frame {
        return Ok(pose.clone());
    }

    tf.transform(pose, target_frame, tolerance)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FrameTree {
    /// Create a new tree containing only the root frame.
    pub fn new<S: Into<String>>(root_frame: S) -> Self {
        Self {
            root_frame: root_frame.into(),
            frames: RwLock::new(HashMap::new()),
        }
    }

    pub fn root_frame(&self) -> &str {
        &self.root_frame
    }

    /// Set a frame which never changes, such as a sensor mount.
    pub fn set_static_frame<S: Into<String>>(&self, frame: S, pose_in_root: &Pose) {
        self.insert(frame.into(), pose_in_root, None);
    }

    /// Set the pose of a moving frame at the given time, replacing any previous value.
    pub fn set_frame<S: Into<String>>(&self, frame: S, pose_in_root: &Pose, stamp: DateTime<Utc>) {
        self.insert(frame.into(), pose_in_root, Some(stamp));
    }

    fn insert(&self, frame: String, pose_in_root: &Pose, stamp: Option<DateTime<Utc>>) {
        let entry = FrameEntry {
            root_from_frame: pose_in_root.to_isometry(),
            stamp,
        };

        self.frames
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(frame, entry);
    }

    /// Get the transform taking points in `frame` into the root frame.
    fn lookup(
        &self,
        frame: &str,
        stamp: DateTime<Utc>,
        tolerance: Duration,
    ) -> Result<Isometry3<f64>, TfError> {
        if frame == self.root_frame {
            return Ok(Isometry3::identity());
        }

        let frames = self.frames.read().unwrap_or_else(PoisonError::into_inner);
        let entry = frames
            .get(frame)
            .ok_or_else(|| TfError::UnknownFrame(frame.to_string()))?;

        if let Some(entry_stamp) = entry.stamp {
            let ahead = stamp - entry_stamp;
            if ahead > tolerance {
                return Err(TfError::Extrapolation {
                    frame: frame.to_string(),
                    ahead_s: util::time::duration_to_secs(ahead).unwrap_or(std::f64::INFINITY),
                });
            }
        }

        Ok(entry.root_from_frame)
    }
}

impl Transformer for FrameTree {
    fn transform(
        &self,
        pose: &PoseStamped,
        target_frame: &str,
        tolerance: Duration,
    ) -> Result<PoseStamped, TfError> {
        let root_from_source = self.lookup(&pose.frame_id, pose.stamp, tolerance)?;
        let root_from_target = self.lookup(target_frame, pose.stamp, tolerance)?;

        let target_from_pose =
            root_from_target.inverse() * root_from_source * pose.pose.to_isometry();

        Ok(PoseStamped::new(
            target_frame,
            pose.stamp,
            Pose::from_isometry(&target_from_pose),
        ))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    /// A transformer which must never be consulted.
    struct NoTransformer;

    impl Transformer for NoTransformer {
        fn transform(&self, _: &PoseStamped, f: &str, _: Duration) -> Result<PoseStamped, TfError> {
            Err(TfError::UnknownFrame(f.to_string()))
        }
    }

    #[test]
    fn test_identity_fast_path() {
        let pose = PoseStamped::new("map", Utc::now(), Pose::from_xy_yaw(1.0, 2.0, 0.3));

        let out = transform_pose(&NoTransformer, &pose, "map", Duration::zero()).unwrap();
        assert_eq!(out, pose);

        assert_eq!(
            transform_pose(&NoTransformer, &pose, "odom", Duration::zero()),
            Err(TfError::UnknownFrame("odom".into()))
        );
    }

    #[test]
    fn test_frame_tree() {
        let now = Utc::now();
        let tree = FrameTree::new("map");

        // Robot at (1, 1) facing +Y
        tree.set_frame("base_link", &Pose::from_xy_yaw(1.0, 1.0, FRAC_PI_2), now);

        // A point 1 m ahead of the robot in the map frame
        let ahead = PoseStamped::new("map", now, Pose::from_xy_yaw(1.0, 2.0, FRAC_PI_2));
        let local = tree.transform(&ahead, "base_link", Duration::zero()).unwrap();

        assert_eq!(local.frame_id, "base_link");
        assert!((local.pose.position_m.x - 1.0).abs() < 1e-9);
        assert!(local.pose.position_m.y.abs() < 1e-9);
        assert!(local.pose.get_heading().abs() < 1e-9);

        // And back again
        let global = tree.transform(&local, "map", Duration::zero()).unwrap();
        assert!(global.pose.distance2(&ahead.pose) < 1e-9);

        // Unknown frames fail
        assert_eq!(
            tree.transform(&ahead, "odom", Duration::zero()),
            Err(TfError::UnknownFrame("odom".into()))
        );
    }

    #[test]
    fn test_frame_tree_tolerance() {
        let then = Utc::now();
        let tree = FrameTree::new("map");
        tree.set_frame("base_link", &Pose::default(), then);
        tree.set_static_frame("laser", &Pose::from_xy_yaw(0.2, 0.0, 0.0));

        let later = PoseStamped::new("map", then + Duration::milliseconds(500), Pose::default());

        // Within tolerance
        assert!(tree
            .transform(&later, "base_link", Duration::milliseconds(600))
            .is_ok());

        // Beyond tolerance
        match tree.transform(&later, "base_link", Duration::milliseconds(100)) {
            Err(TfError::Extrapolation { frame, ahead_s }) => {
                assert_eq!(frame, "base_link");
                assert!((ahead_s - 0.5).abs() < 1e-9);
            }
            r => panic!("Expected extrapolation error, got {:?}", r),
        }

        // Static frames never go stale
        let laser = tree
            .transform(&later, "laser", Duration::zero())
            .unwrap();
        assert!((laser.pose.position_m.x + 0.2).abs() < 1e-9);
    }
}

//! # Planner state
//!
//! [`MpcPlanner`] owns everything carried from one cycle to the next: the global plan, its goal,
//! the speed regime and the lookahead distances. A single lock guards all of it, held for the
//! whole of a cycle including the optimizer call. Parameter changes never wait for that lock, if
//! a cycle is running they're rejected.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use comms_if::msg::{self, DiagPacket};
use log::{debug, info, warn};

use super::{
    collision, lookahead, request,
    window::{self, WindowConfig},
    LookaheadParams, ParamUpdate, ParamValue, Params, Plan, PlannerError, SetParamsResult,
    SpeedRegime, LOOKAHEAD_DIST_CLOSE_TO_GOAL, LOOKAHEAD_DIST_MAX, LOOKAHEAD_DIST_MIN,
};
use crate::{
    diag_server::DiagSink,
    loc::{Pose, PoseStamped},
    map::{CostMap, Footprint},
    optimizer_client::Optimizer,
    tf::Transformer,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Height the published lookahead point is raised by so it's drawn above the ground plane.
const CARROT_Z_OFFSET_M: f64 = 0.01;

/// Reason given when a parameter change is rejected because a cycle is running.
const CONTROLLER_BUSY_REASON: &str =
    "Unable to dynamically change Parameters while the controller is currently running";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The MPC local planner.
pub struct MpcPlanner {
    inner: Mutex<Inner>,
}

struct Inner {
    params: Params,

    lookahead: LookaheadParams,

    footprint: Footprint,

    plan: Option<Plan>,

    /// Goal of the last plan set
    goal: Option<Pose>,

    regime: SpeedRegime,

    tf: Arc<dyn Transformer + Send + Sync>,

    costmap: Arc<dyn CostMap + Send + Sync>,

    optimizer: Box<dyn Optimizer + Send>,

    diag: Box<dyn DiagSink + Send>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MpcPlanner {
    pub fn new(
        params: Params,
        tf: Arc<dyn Transformer + Send + Sync>,
        costmap: Arc<dyn CostMap + Send + Sync>,
        optimizer: Box<dyn Optimizer + Send>,
        diag: Box<dyn DiagSink + Send>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                lookahead: params.lookahead(),
                footprint: Footprint::from_pairs(&params.footprint_m),
                params,
                plan: None,
                goal: None,
                regime: SpeedRegime::default(),
                tf,
                costmap,
                optimizer,
                diag,
            }),
        }
    }

    /// Run a single planning cycle, returning the velocity command from the optimizer.
    ///
    /// - `pose`: the robot's current pose, in any frame the transformer knows
    /// - `velocity`: the robot's current velocity
    pub fn compute_velocity_commands(
        &self,
        pose: &PoseStamped,
        velocity: &msg::Twist,
    ) -> Result<msg::TwistStamped, PlannerError> {
        self.lock().tick(pose, velocity)
    }

    /// Replace the global plan.
    ///
    /// A plan with a different goal to the previous one puts the planner into the slowed regime.
    pub fn set_plan(&self, plan: Plan) -> Result<(), PlannerError> {
        let goal = *plan.goal().ok_or(PlannerError::EmptyPlan)?;

        let mut inner = self.lock();

        if inner.goal != Some(goal) {
            info!(
                "New goal at ({:.2}, {:.2}), slowing down",
                goal.position_m.x, goal.position_m.y
            );
            inner.regime = SpeedRegime::Slowed;
        }

        info!(
            "Received plan with {} poses in frame \"{}\"",
            plan.len(),
            plan.frame_id
        );

        inner.goal = Some(goal);
        inner.plan = Some(plan);

        Ok(())
    }

    /// Apply a batch of parameter changes.
    ///
    /// If a planning cycle is in progress none of the batch is applied. Namespaced parameters
    /// belong to other components and are skipped.
    pub fn set_params(&self, updates: &[ParamUpdate]) -> SetParamsResult {
        let own: Vec<&ParamUpdate> = updates.iter().filter(|u| !u.is_namespaced()).collect();

        if own.is_empty() {
            return SetParamsResult::success();
        }

        let mut inner = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
            Err(TryLockError::WouldBlock) => {
                warn!("{}", CONTROLLER_BUSY_REASON);
                return SetParamsResult::failure(CONTROLLER_BUSY_REASON);
            }
        };

        for update in own {
            let value = match update.value {
                ParamValue::Double(v) => v,
                ref other => {
                    debug!("Ignoring non-double value {:?} for {}", other, update.name);
                    continue;
                }
            };

            let target = match update.name.as_str() {
                LOOKAHEAD_DIST_MIN => &mut inner.lookahead.min_m,
                LOOKAHEAD_DIST_MAX => &mut inner.lookahead.max_m,
                LOOKAHEAD_DIST_CLOSE_TO_GOAL => &mut inner.lookahead.close_to_goal_m,
                _ => {
                    debug!("Ignoring unknown parameter {}", update.name);
                    continue;
                }
            };

            *target = value;
            info!("Set {} to {}", update.name, value);
        }

        SetParamsResult::success()
    }

    /// Get the current speed regime.
    pub fn regime(&self) -> SpeedRegime {
        self.lock().regime
    }

    pub fn lookahead_params(&self) -> LookaheadParams {
        self.lock().lookahead
    }

    /// Number of poses left in the global plan.
    pub fn plan_len(&self) -> usize {
        self.lock().plan.as_ref().map(Plan::len).unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    fn tick(
        &mut self,
        pose: &PoseStamped,
        velocity: &msg::Twist,
    ) -> Result<msg::TwistStamped, PlannerError> {
        let plan = self.plan.as_mut().ok_or(PlannerError::EmptyPlan)?;

        let config = WindowConfig {
            base_frame: &self.params.base_frame,
            transform_tolerance: util::time::secs_to_duration(self.params.transform_tolerance_s),
            max_transform_dist_m: self.costmap.max_transform_dist_m(),
            close_to_goal_dist_m: self.lookahead.close_to_goal_m,
        };

        let window = window::trim_and_project(plan, pose, &*self.tf, &config, &mut *self.diag)?;

        let lookahead_dist_m = self.regime.lookahead_distance(&self.lookahead, window.near_goal);
        let carrot = *lookahead::select(lookahead_dist_m, &window.poses)
            .ok_or(PlannerError::EmptyWindow)?;

        let cost = collision::footprint_cost(&*self.costmap, &pose.pose, &self.footprint);

        // The second heading check uses the same distance and window, so it lands on the carrot.
        // The slow down override can only fire through the primary branch.
        let heading_abs_rad = carrot.get_heading().abs();

        let regime = SpeedRegime::evaluate(heading_abs_rad, heading_abs_rad, cost);
        if regime != self.regime {
            debug!("Speed regime {} -> {}", self.regime, regime);
        }
        self.regime = regime;

        let cost = collision::check(cost).map_err(|e| {
            warn!("Aborting cycle: {}", e);
            e
        })?;
        debug!("Footprint cost {:.0}, lookahead {:.2} m", cost, lookahead_dist_m);

        let carrot_stamped = PoseStamped::new(window.frame_id.clone(), window.stamp, carrot);

        let carrot_msg = msg::PointStamped {
            header: msg::Header::new(window.frame_id.clone(), window.stamp),
            point: msg::Point {
                x: carrot.position_m.x,
                y: carrot.position_m.y,
                z: CARROT_Z_OFFSET_M,
            },
        };
        if let Err(e) = self.diag.publish(&DiagPacket::Carrot(carrot_msg)) {
            debug!("Could not publish the lookahead point: {}", e);
        }

        let goal = self.goal.ok_or(PlannerError::EmptyPlan)?;

        let req = request::build(
            pose,
            velocity,
            &carrot_stamped,
            &goal,
            window.near_goal,
            self.params.control_interval_s(),
        );

        request::submit(&mut *self.optimizer, &req)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        diag_server::{DiagError, NullDiagSink},
        map::{GridCostMap, FREE_COST, LETHAL_COST},
        optimizer_client::MockOptimizer,
        tf::FrameTree,
    };
    use chrono::Utc;
    use comms_if::{
        msg::diag::{CARROT_TOPIC, LOCAL_PLAN_TOPIC},
        net::zmq,
    };
    use nalgebra::Vector2;
    use std::{sync::mpsc, thread};

    fn params(min_m: f64, max_m: f64, close_to_goal_m: f64) -> Params {
        Params {
            lookahead_dist_min: min_m,
            lookahead_dist_max: max_m,
            lookahead_dist_close_to_goal: close_to_goal_m,
            controller_frequency_hz: 10.0,
            transform_tolerance_s: 0.5,
            base_frame: "base_link".into(),
            footprint_m: vec![[0.2, 0.2], [-0.2, 0.2], [-0.2, -0.2], [0.2, -0.2]],
        }
    }

    /// Free 10 m square map centred on the origin.
    fn free_map() -> GridCostMap {
        GridCostMap::centred_on(Vector2::new(100, 100), 0.1, Vector2::zeros(), FREE_COST).unwrap()
    }

    fn line_plan(end_m: f64, spacing_m: f64) -> Plan {
        let num = (end_m / spacing_m).round() as usize + 1;
        Plan::new(
            "map",
            Utc::now(),
            (0..num)
                .map(|i| Pose::from_xy_yaw(i as f64 * spacing_m, 0.0, 0.0))
                .collect(),
        )
    }

    /// Optimizer which records the X position of every carrot it's sent.
    fn recording_optimizer() -> (MockOptimizer, Arc<Mutex<Vec<f64>>>) {
        let carrots = Arc::new(Mutex::new(Vec::new()));
        let carrots_clone = carrots.clone();

        let mut optimizer = MockOptimizer::new();
        optimizer.expect_optimize().returning(move |r| {
            carrots_clone
                .lock()
                .unwrap()
                .push(r.carrot_pose.pose.position.x);
            Ok(msg::TwistStamped {
                header: r.carrot_pose.header.clone(),
                twist: msg::Twist::planar(0.5, 0.0, 0.0),
            })
        });

        (optimizer, carrots)
    }

    /// Diagnostics sink which keeps every packet it's given, optionally failing each publish.
    #[derive(Default, Clone)]
    struct RecordingDiagSink {
        packets: Arc<Mutex<Vec<DiagPacket>>>,
        fail: bool,
    }

    impl DiagSink for RecordingDiagSink {
        fn publish(&mut self, packet: &DiagPacket) -> Result<(), DiagError> {
            self.packets.lock().unwrap().push(packet.clone());

            if self.fail {
                Err(DiagError::SendError(zmq::Error::EAGAIN))
            } else {
                Ok(())
            }
        }
    }

    /// Planner with the robot at the origin of the map.
    fn planner(params: Params, costmap: GridCostMap, optimizer: MockOptimizer) -> MpcPlanner {
        planner_with_diag(params, costmap, optimizer, Box::new(NullDiagSink))
    }

    fn planner_with_diag(
        params: Params,
        costmap: GridCostMap,
        optimizer: MockOptimizer,
        diag: Box<dyn DiagSink + Send>,
    ) -> MpcPlanner {
        let tf = FrameTree::new("map");
        tf.set_frame("base_link", &Pose::default(), Utc::now());

        MpcPlanner::new(params, Arc::new(tf), Arc::new(costmap), Box::new(optimizer), diag)
    }

    fn robot_pose() -> PoseStamped {
        PoseStamped::new("map", Utc::now(), Pose::default())
    }

    #[test]
    fn test_carrot_selection() {
        let (optimizer, carrots) = recording_optimizer();
        let planner = planner(params(1.0, 1.0, 1.0), free_map(), optimizer);

        planner.set_plan(line_plan(2.0, 1.0)).unwrap();
        let cmd = planner
            .compute_velocity_commands(&robot_pose(), &msg::Twist::default())
            .unwrap();

        assert_eq!(*carrots.lock().unwrap(), vec![1.0]);
        assert_eq!(cmd.twist.linear.x, 0.5);
        assert_eq!(cmd.header.frame_id, "base_link");
        assert_eq!(planner.plan_len(), 3);
    }

    #[test]
    fn test_new_goal_slows_down() {
        let (optimizer, carrots) = recording_optimizer();
        let planner = planner(params(0.5, 1.5, 0.2), free_map(), optimizer);
        let pose = robot_pose();
        let vel = msg::Twist::default();

        // First plan always slows down
        planner.set_plan(line_plan(4.0, 0.25)).unwrap();
        assert_eq!(planner.regime(), SpeedRegime::Slowed);
        planner.compute_velocity_commands(&pose, &vel).unwrap();

        // Straight plan in free space, so speed back up
        assert_eq!(planner.regime(), SpeedRegime::Normal);
        planner.compute_velocity_commands(&pose, &vel).unwrap();

        // Same goal, no change
        planner.set_plan(line_plan(4.0, 0.25)).unwrap();
        assert_eq!(planner.regime(), SpeedRegime::Normal);
        planner.compute_velocity_commands(&pose, &vel).unwrap();

        // New goal
        planner.set_plan(line_plan(4.5, 0.25)).unwrap();
        assert_eq!(planner.regime(), SpeedRegime::Slowed);
        planner.compute_velocity_commands(&pose, &vel).unwrap();

        assert_eq!(*carrots.lock().unwrap(), vec![0.5, 1.5, 1.5, 0.5]);
    }

    #[test]
    fn test_near_goal_switches_optimizer() {
        let mut optimizer = MockOptimizer::new();
        optimizer
            .expect_optimize()
            .withf(|r| r.switch_opt && r.carrot_pose.pose.position.x == 0.25)
            .times(1)
            .returning(|r| {
                Ok(msg::TwistStamped {
                    header: r.carrot_pose.header.clone(),
                    twist: msg::Twist::default(),
                })
            });
        let planner = planner(params(0.5, 1.5, 0.3), free_map(), optimizer);

        planner.set_plan(line_plan(0.25, 0.25)).unwrap();
        planner
            .compute_velocity_commands(&robot_pose(), &msg::Twist::default())
            .unwrap();
    }

    #[test]
    fn test_collision_aborts_cycle() {
        let mut optimizer = MockOptimizer::new();
        optimizer.expect_optimize().never();

        let mut map = free_map();
        map.fill_rect(&Vector2::new(0.1, -0.5), &Vector2::new(0.3, 0.5), LETHAL_COST);

        let planner = planner(params(0.5, 1.5, 0.2), map, optimizer);
        planner.set_plan(line_plan(4.0, 0.25)).unwrap();

        assert!(matches!(
            planner.compute_velocity_commands(&robot_pose(), &msg::Twist::default()),
            Err(PlannerError::CollisionDetected(c)) if c == LETHAL_COST as f64
        ));
    }

    #[test]
    fn test_empty_window_and_plan() {
        let mut optimizer = MockOptimizer::new();
        optimizer.expect_optimize().never();
        let planner = planner(params(0.5, 1.5, 0.2), free_map(), optimizer);

        // No plan yet
        assert!(matches!(
            planner.compute_velocity_commands(&robot_pose(), &msg::Twist::default()),
            Err(PlannerError::EmptyPlan)
        ));

        // Empty plans are refused
        assert!(matches!(
            planner.set_plan(Plan::new("map", Utc::now(), vec![])),
            Err(PlannerError::EmptyPlan)
        ));
        assert_eq!(planner.plan_len(), 0);

        // Plan entirely out of range of the 10 m map
        let far = Plan::new(
            "map",
            Utc::now(),
            vec![
                Pose::from_xy_yaw(6.0, 0.0, 0.0),
                Pose::from_xy_yaw(7.0, 0.0, 0.0),
            ],
        );
        planner.set_plan(far).unwrap();
        assert!(matches!(
            planner.compute_velocity_commands(&robot_pose(), &msg::Twist::default()),
            Err(PlannerError::EmptyWindow)
        ));
    }

    #[test]
    fn test_diagnostics_published() {
        let (optimizer, _) = recording_optimizer();
        let sink = RecordingDiagSink::default();
        let planner = planner_with_diag(
            params(1.0, 1.0, 0.2),
            free_map(),
            optimizer,
            Box::new(sink.clone()),
        );

        planner.set_plan(line_plan(2.0, 0.5)).unwrap();
        planner
            .compute_velocity_commands(&robot_pose(), &msg::Twist::default())
            .unwrap();

        let packets = sink.packets.lock().unwrap();
        let topics: Vec<&str> = packets.iter().map(|p| p.topic()).collect();
        assert_eq!(topics, vec![LOCAL_PLAN_TOPIC, CARROT_TOPIC]);

        match &packets[0] {
            DiagPacket::LocalPlan(path) => {
                assert_eq!(path.header.frame_id, "base_link");
                assert_eq!(path.poses.len(), 5);
            }
            p => panic!("Expected the local plan first, got {:?}", p),
        }

        match &packets[1] {
            DiagPacket::Carrot(carrot) => {
                assert_eq!(carrot.header.frame_id, "base_link");
                assert_eq!(carrot.point.x, 1.0);
                assert_eq!(carrot.point.y, 0.0);
                assert_eq!(carrot.point.z, CARROT_Z_OFFSET_M);
            }
            p => panic!("Expected the carrot second, got {:?}", p),
        }
    }

    #[test]
    fn test_diagnostics_failure_ignored() {
        let mut optimizer = MockOptimizer::new();
        optimizer.expect_optimize().times(1).returning(|r| {
            Ok(msg::TwistStamped {
                header: r.carrot_pose.header.clone(),
                twist: msg::Twist::planar(0.5, 0.0, 0.0),
            })
        });

        let sink = RecordingDiagSink {
            fail: true,
            ..Default::default()
        };
        let planner = planner_with_diag(
            params(1.0, 1.0, 0.2),
            free_map(),
            optimizer,
            Box::new(sink.clone()),
        );

        planner.set_plan(line_plan(2.0, 0.5)).unwrap();
        let cmd = planner
            .compute_velocity_commands(&robot_pose(), &msg::Twist::default())
            .unwrap();

        assert_eq!(cmd.twist.linear.x, 0.5);
        assert_eq!(sink.packets.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_high_cost_regime() {
        let (optimizer, carrots) = recording_optimizer();
        let map =
            GridCostMap::centred_on(Vector2::new(100, 100), 0.1, Vector2::zeros(), 220).unwrap();
        let planner = planner(params(0.5, 1.5, 0.2), map, optimizer);
        let pose = robot_pose();
        let vel = msg::Twist::default();

        // A straight carrot keeps normal speed even when the footprint cost is high
        planner.set_plan(line_plan(4.0, 0.25)).unwrap();
        planner.compute_velocity_commands(&pose, &vel).unwrap();
        assert_eq!(planner.regime(), SpeedRegime::Normal);

        // Same goal, but the carrot now turns sharply away from the robot's heading
        let mut turning = line_plan(4.0, 0.25);
        let last = turning.poses.len() - 1;
        for p in &mut turning.poses[..last] {
            *p = Pose::from_xy_yaw(p.position_m.x, 0.0, 1.2);
        }
        planner.set_plan(turning).unwrap();
        assert_eq!(planner.regime(), SpeedRegime::Normal);

        planner.compute_velocity_commands(&pose, &vel).unwrap();
        assert_eq!(planner.regime(), SpeedRegime::Slowed);

        assert_eq!(*carrots.lock().unwrap(), vec![0.5, 1.5]);
    }

    #[test]
    fn test_set_params() {
        let (optimizer, _) = recording_optimizer();
        let planner = planner(params(0.5, 1.5, 0.2), free_map(), optimizer);

        let result = planner.set_params(&[
            ParamUpdate::double(LOOKAHEAD_DIST_MIN, 0.4),
            ParamUpdate::double(LOOKAHEAD_DIST_CLOSE_TO_GOAL, 0.1),
            ParamUpdate::double("critic.lookahead_dist_max", 9.0),
            ParamUpdate {
                name: LOOKAHEAD_DIST_MAX.into(),
                value: ParamValue::Integer(3),
            },
            ParamUpdate::double("controller_frequency_hz", 100.0),
        ]);

        assert_eq!(result, SetParamsResult::success());
        assert_eq!(
            planner.lookahead_params(),
            LookaheadParams {
                min_m: 0.4,
                max_m: 1.5,
                close_to_goal_m: 0.1
            }
        );
    }

    #[test]
    fn test_set_params_rejected_during_cycle() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        // Optimizer which blocks until released
        let mut optimizer = MockOptimizer::new();
        optimizer.expect_optimize().times(1).returning(move |r| {
            entered_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            Ok(msg::TwistStamped {
                header: r.carrot_pose.header.clone(),
                twist: msg::Twist::default(),
            })
        });

        let planner = Arc::new(planner(params(0.5, 1.5, 0.2), free_map(), optimizer));
        planner.set_plan(line_plan(4.0, 0.25)).unwrap();

        let cycle_planner = planner.clone();
        let cycle = thread::spawn(move || {
            cycle_planner.compute_velocity_commands(&robot_pose(), &msg::Twist::default())
        });

        entered_rx.recv().unwrap();

        let result = planner.set_params(&[
            ParamUpdate::double(LOOKAHEAD_DIST_MIN, 0.1),
            ParamUpdate::double(LOOKAHEAD_DIST_MAX, 0.2),
        ]);
        assert!(!result.successful);
        assert_eq!(result.reason, CONTROLLER_BUSY_REASON);

        // Namespaced only batches don't need the lock
        assert!(planner
            .set_params(&[ParamUpdate::double("critic.weight", 1.0)])
            .successful);

        release_tx.send(()).unwrap();
        assert!(cycle.join().unwrap().is_ok());

        assert_eq!(planner.lookahead_params(), params(0.5, 1.5, 0.2).lookahead());
    }
}

//! # Plan Window Benchmark

use std::sync::Arc;

use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};

use comms_if::msg::{OptimizerRequest, Twist, TwistStamped};
use mpc_lib::{
    diag_server::NullDiagSink,
    loc::{Pose, PoseStamped},
    map::{GridCostMap, FREE_COST},
    optimizer_client::{Optimizer, OptimizerClientError},
    planner::{self, MpcPlanner, Plan, WindowConfig},
    tf::FrameTree,
};
use nalgebra::Vector2;

/// Optimizer which echoes a fixed command straight back.
struct EchoOptimizer;

impl Optimizer for EchoOptimizer {
    fn optimize(&mut self, request: &OptimizerRequest) -> Result<TwistStamped, OptimizerClientError> {
        Ok(TwistStamped {
            header: request.carrot_pose.header.clone(),
            twist: Twist::planar(0.3, 0.0, 0.0),
        })
    }
}

/// A long winding plan starting at the origin.
fn winding_plan(num_poses: usize) -> Plan {
    let poses = (0..num_poses)
        .map(|i| {
            let x = i as f64 * 0.02;
            let y = (x * 0.5).sin();
            Pose::from_xy_yaw(x, y, (0.5 * (x * 0.5).cos()).atan())
        })
        .collect();

    Plan::new("map", Utc::now(), poses)
}

fn plan_window_benchmark(c: &mut Criterion) {
    let tf = Arc::new(FrameTree::new("map"));
    tf.set_static_frame("base_link", &Pose::default());

    let costmap = GridCostMap::centred_on(Vector2::new(200, 200), 0.05, Vector2::zeros(), FREE_COST)
        .unwrap();

    let robot = PoseStamped::new("map", Utc::now(), Pose::default());
    let plan = winding_plan(10_000);

    let config = WindowConfig {
        base_frame: "base_link",
        transform_tolerance: chrono::Duration::milliseconds(100),
        max_transform_dist_m: 5.0,
        close_to_goal_dist_m: 0.5,
    };

    // Windowing alone
    c.bench_function("window::trim_and_project", |b| {
        b.iter(|| {
            let mut p = plan.clone();
            planner::window::trim_and_project(&mut p, &robot, &*tf, &config, &mut NullDiagSink)
                .unwrap()
        })
    });

    // Full cycle
    let params = planner::Params {
        lookahead_dist_min: 0.4,
        lookahead_dist_max: 1.2,
        lookahead_dist_close_to_goal: 0.3,
        controller_frequency_hz: 20.0,
        transform_tolerance_s: 0.1,
        base_frame: "base_link".into(),
        footprint_m: vec![[0.3, 0.25], [-0.3, 0.25], [-0.3, -0.25], [0.3, -0.25]],
    };
    let mpc = MpcPlanner::new(
        params,
        tf.clone(),
        Arc::new(costmap),
        Box::new(EchoOptimizer),
        Box::new(NullDiagSink),
    );
    mpc.set_plan(plan).unwrap();

    c.bench_function("MpcPlanner::compute_velocity_commands", |b| {
        b.iter(|| {
            mpc.compute_velocity_commands(&robot, &Twist::default())
                .unwrap()
        })
    });
}

criterion_group!(benches, plan_window_benchmark);
criterion_main!(benches);

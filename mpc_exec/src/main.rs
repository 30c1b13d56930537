//! Main MPC planner executable entry point.
//!
//! # Architecture
//!
//! The executable drives the planner in closed loop against a simulated robot:
//!
//!     - Initialise the session, logging and parameters
//!     - Load the global plan given on the command line
//!     - Connect to the trajectory optimizer and start the diagnostics server
//!     - Main loop:
//!         - Publish the simulated robot's pose into the frame tree
//!         - Run one planning cycle
//!         - Integrate the returned velocity command
//!
//! The run ends when the robot reaches the goal, the cycle limit is hit, or the planner reports
//! that the robot can no longer follow the plan.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, error, info, warn};
use nalgebra::Vector2;
use serde::Serialize;
use std::{
    env, fs,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

// Internal
use comms_if::msg;
use mpc_lib::{
    diag_server::DiagServer,
    loc::{Pose, PoseStamped},
    map::{GridCostMap, FREE_COST, LETHAL_COST},
    optimizer_client::OptimizerClient,
    params::{MpcExecParams, SimParams},
    planner::{MpcPlanner, Plan, PlannerError, SpeedRegime},
    tf::FrameTree,
};
use util::{
    logger::{logger_init, LevelFilter},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Distance obstacles are inflated by in the simulated cost map
const INFLATION_RADIUS_M: f64 = 0.3;

/// Cost of the inflated area around obstacles
const INFLATED_COST: u8 = 220;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// One sample of the simulated robot's trajectory.
#[derive(Serialize)]
struct TrajectorySample {
    time_s: f64,
    pose: Pose,
    cmd: msg::Twist,
    regime: SpeedRegime,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("mpc_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("MPC Planner Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: MpcExecParams =
        util::params::load("mpc_exec.toml").wrap_err("Could not load exec params")?;

    params
        .planner
        .validate()
        .wrap_err("Invalid planner parameters")?;

    info!("Exec parameters loaded");

    // ---- LOAD PLAN ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    if args.len() != 2 {
        return Err(eyre!(
            "Expected the path to a plan file as the only argument, found {} arguments",
            args.len() - 1
        ));
    }

    let plan = load_plan(&args[1])?;
    let goal = *plan
        .goal()
        .ok_or_else(|| eyre!("The plan in \"{}\" is empty", &args[1]))?;

    info!(
        "Loaded plan with {} poses, goal at ({:.2}, {:.2})",
        plan.len(),
        goal.position_m.x,
        goal.position_m.y
    );

    // ---- INITIALISE SIMULATION ----

    let sim = &params.sim;
    let mut robot = Pose::from_xy_yaw(sim.initial_pose[0], sim.initial_pose[1], sim.initial_pose[2]);

    let tf = Arc::new(FrameTree::new(sim.global_frame.clone()));
    tf.set_frame(params.planner.base_frame.clone(), &robot, chrono::Utc::now());

    let costmap = build_costmap(sim).wrap_err("Failed to create the cost map")?;

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let optimizer = {
        let c = OptimizerClient::new(&zmq_ctx, &params.net)
            .wrap_err("Failed to initialise the OptimizerClient")?;
        info!("OptimizerClient initialised");
        c
    };

    let diag = {
        let s = DiagServer::new(&zmq_ctx, &params.net)
            .wrap_err("Failed to initialise the DiagServer")?;
        info!("DiagServer initialised");
        s
    };

    info!("Network initialisation complete");

    // ---- INITIALISE PLANNER ----

    let planner = MpcPlanner::new(
        params.planner.clone(),
        tf.clone(),
        Arc::new(costmap),
        Box::new(optimizer),
        Box::new(diag),
    );
    planner.set_plan(plan).wrap_err("Failed to set the plan")?;

    // ---- MAIN LOOP ----

    let cycle_period_s = params.planner.control_interval_s();
    let mut velocity = msg::Twist::default();
    let mut trajectory = Vec::new();

    info!("Begining main loop\n");

    for num_cycles in 0..sim.max_cycles {
        // Get cycle start time
        let cycle_start_instant = Instant::now();
        let now = chrono::Utc::now();

        tf.set_frame(params.planner.base_frame.clone(), &robot, now);
        let robot_stamped = PoseStamped::new(sim.global_frame.clone(), now, robot);

        // ---- PLANNING ----

        match planner.compute_velocity_commands(&robot_stamped, &velocity) {
            Ok(cmd) => velocity = cmd.twist,
            Err(e @ PlannerError::CollisionDetected(_)) | Err(e @ PlannerError::EmptyWindow) => {
                error!("Planning failed, stopping: {}", e);
                break;
            }
            Err(e) => {
                warn!("Planning cycle failed, holding position: {}", e);
                velocity = msg::Twist::default();
            }
        }

        trajectory.push(TrajectorySample {
            time_s: session::get_elapsed_seconds(),
            pose: robot,
            cmd: velocity,
            regime: planner.regime(),
        });

        // ---- SIMULATION ----

        robot = integrate(&robot, &velocity, cycle_period_s);

        let dist_to_goal_m = robot.distance2(&goal);
        if dist_to_goal_m <= sim.goal_tolerance_m {
            info!(
                "Goal reached after {} cycles ({:.2} m away)",
                num_cycles + 1,
                dist_to_goal_m
            );
            break;
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(cycle_period_s).checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - cycle_period_s
            ),
        }
    }

    // ---- SHUTDOWN ----

    info!(
        "Final pose ({:.2}, {:.2}), {} poses left in the plan",
        robot.position_m.x,
        robot.position_m.y,
        planner.plan_len()
    );

    session
        .save_json("trajectory.json", &trajectory)
        .wrap_err("Failed to save the trajectory")?;

    info!("End of execution");

    Ok(())
}

/// Load a plan from a JSON `Path` message file.
fn load_plan(path: &str) -> Result<Plan, Report> {
    let plan_str =
        fs::read_to_string(path).wrap_err_with(|| format!("Could not read plan file {}", path))?;

    let path_msg: msg::Path =
        serde_json::from_str(&plan_str).wrap_err("Could not parse the plan file")?;

    Ok(Plan::from(&path_msg))
}

/// Build the cost map around the robot's starting position, with inflated obstacles.
fn build_costmap(sim: &SimParams) -> Result<GridCostMap, Report> {
    let mut map = GridCostMap::centred_on(
        Vector2::new(sim.costmap_num_cells[0], sim.costmap_num_cells[1]),
        sim.costmap_resolution_m,
        Vector2::new(sim.initial_pose[0], sim.initial_pose[1]),
        FREE_COST,
    )?;

    let inflation = Vector2::new(INFLATION_RADIUS_M, INFLATION_RADIUS_M);

    for o in &sim.obstacles_m {
        let min = Vector2::new(o[0], o[1]);
        let max = Vector2::new(o[2], o[3]);

        map.fill_rect(&(min - inflation), &(max + inflation), INFLATED_COST);
        map.fill_rect(&min, &max, LETHAL_COST);
    }

    info!("Cost map built with {} obstacles", sim.obstacles_m.len());

    Ok(map)
}

/// Move a unicycle robot with the given body-frame velocity for `dt_s` seconds.
fn integrate(pose: &Pose, velocity: &msg::Twist, dt_s: f64) -> Pose {
    let yaw = pose.get_heading();
    let vx = velocity.linear.x;
    let vy = velocity.linear.y;

    Pose::from_xy_yaw(
        pose.position_m.x + (vx * yaw.cos() - vy * yaw.sin()) * dt_s,
        pose.position_m.y + (vx * yaw.sin() + vy * yaw.cos()) * dt_s,
        yaw + velocity.angular.z * dt_s,
    )
}

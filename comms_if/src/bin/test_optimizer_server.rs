//! Simple optimizer server test
//!
//! Answers optimizer requests with a proportional steer-to-carrot velocity so that the planner
//! loop can be exercised without the real trajectory optimizer.

use chrono::Utc;
use comms_if::{
    msg::{Header, OptimizerRequest, OptimizerResponse, Twist, TwistStamped},
    net::{MonitoredSocket, SocketOptions},
};

/// Gain from carrot distance to forward speed
const K_LINEAR: f64 = 0.8;

/// Gain from carrot bearing to yaw rate
const K_ANGULAR: f64 = 1.5;

/// Forward speed limit in m/s
const MAX_LINEAR_MS: f64 = 0.5;

/// Forward speed limit once close to the goal in m/s
const MAX_LINEAR_NEAR_GOAL_MS: f64 = 0.2;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| String::from("tcp://*:5560"));

    // Create the context for zmq
    let ctx = zmq::Context::new();

    // Set the socket options
    let socket_options = SocketOptions {
        bind: true,
        block_on_first_connect: false,
        ..Default::default()
    };

    // Create the socket
    let socket = MonitoredSocket::new(&ctx, zmq::REP, socket_options, &endpoint)?;

    println!("Optimizer server running on {}", endpoint);

    // Respond to client requests
    loop {
        // Wait for the client to send us a message
        let msg = socket.recv_msg(0)?;

        let parsed = msg.as_str().map(serde_json::from_str::<OptimizerRequest>);

        let request = match parsed {
            Some(Ok(r)) => r,
            Some(Err(e)) => {
                println!("Could not parse request: {}", e);
                socket.send("", 0)?;
                continue;
            }
            None => {
                println!("Received no data");
                socket.send("", 0)?;
                continue;
            }
        };

        let response = OptimizerResponse {
            output_vel: TwistStamped {
                header: Header::new(request.carrot_pose.header.frame_id.clone(), Utc::now()),
                twist: steer_to_carrot(&request),
            },
        };

        socket.send(&serde_json::to_string(&response)?, 0)?;
    }
}

fn steer_to_carrot(request: &OptimizerRequest) -> Twist {
    let carrot = &request.carrot_pose.pose.position;

    let dist_m = carrot.x.hypot(carrot.y);
    let bearing_rad = carrot.y.atan2(carrot.x);

    let max_linear_ms = if request.switch_opt {
        MAX_LINEAR_NEAR_GOAL_MS
    } else {
        MAX_LINEAR_MS
    };

    // Slow right down for large bearing errors so the robot turns on the spot
    let linear_ms = (K_LINEAR * dist_m * bearing_rad.cos().max(0.0)).min(max_linear_ms);

    Twist::planar(linear_ms, 0.0, K_ANGULAR * bearing_rad)
}

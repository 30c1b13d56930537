//! # Optimizer Client
//!
//! This module provides the connection to the external trajectory optimizer, which turns the
//! planner's requests into velocity commands.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    msg::{OptimizerRequest, OptimizerResponse, TwistStamped},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};
use log::debug;

use crate::params::NetParams;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Something which can turn a request into a velocity command.
#[cfg_attr(test, mockall::automock)]
pub trait Optimizer {
    /// Send the request and wait for the resulting velocity command.
    fn optimize(&mut self, request: &OptimizerRequest) -> Result<TwistStamped, OptimizerClientError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct OptimizerClient {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum OptimizerClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the optimizer")]
    NotConnected,

    #[error("Could not send the request to the optimizer: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a response from the optimizer: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the request: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the response from the optimizer: {0}")]
    DeserializeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OptimizerClient {
    /// Create a new instance of the optimizer client.
    ///
    /// Blocks until the optimizer is available, or until `optimizer_connect_timeout_ms` elapses.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, OptimizerClientError> {
        let socket_options = SocketOptions {
            connect_timeout: params.optimizer_connect_timeout_ms,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: params.optimizer_timeout_ms,
            send_timeout: 10,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(
            ctx,
            zmq::REQ,
            socket_options,
            &params.optimizer_endpoint,
        )
        .map_err(OptimizerClientError::SocketError)?;

        debug!("Optimizer client connected to {}", socket.endpoint());

        Ok(Self { socket })
    }
}

impl Optimizer for OptimizerClient {
    fn optimize(&mut self, request: &OptimizerRequest) -> Result<TwistStamped, OptimizerClientError> {
        // If not connected return now
        if !self.socket.connected() {
            debug!("Optimizer at {} is not connected", self.socket.endpoint());
            return Err(OptimizerClientError::NotConnected);
        }

        let request_str =
            serde_json::to_string(request).map_err(OptimizerClientError::SerializationError)?;

        self.socket
            .send(&request_str, 0)
            .map_err(OptimizerClientError::SendError)?;

        // Blocks for up to the receive timeout, which may be unbounded
        let msg = self
            .socket
            .recv_msg(0)
            .map_err(OptimizerClientError::RecvError)?;

        let response: OptimizerResponse = serde_json::from_str(msg.as_str().unwrap_or(""))
            .map_err(OptimizerClientError::DeserializeError)?;

        debug!("Optimizer response: {:?}", response.output_vel.twist);

        Ok(response.output_vel)
    }
}

//! # Diagnostics Server
//!
//! Publishes the planner's local plan and lookahead point for visualisation. Publishing is best
//! effort, subscribers may miss packets and the planner never waits on them.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    msg::DiagPacket,
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};

use crate::params::NetParams;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A destination for diagnostics packets.
pub trait DiagSink {
    fn publish(&mut self, packet: &DiagPacket) -> Result<(), DiagError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Diagnostics server
pub struct DiagServer {
    socket: MonitoredSocket,
}

/// Sink which drops every packet, for running without any diagnostics output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagSink;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DiagError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send diagnostics: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the diagnostics: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DiagServer {
    /// Create a new instance of the diagnostics server.
    ///
    /// This function will not block until a subscriber connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, DiagError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            bind: true,
            linger: 1,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::PUB, socket_options, &params.diag_endpoint)
            .map_err(DiagError::SocketError)?;

        Ok(Self { socket })
    }
}

impl DiagSink for DiagServer {
    /// Send the packet prefixed by its topic, so subscribers can filter on it.
    fn publish(&mut self, packet: &DiagPacket) -> Result<(), DiagError> {
        let packet_string =
            serde_json::to_string(packet).map_err(DiagError::SerializationError)?;

        self.socket
            .send(&format!("{} {}", packet.topic(), packet_string), 0)
            .map_err(DiagError::SendError)
    }
}

impl DiagSink for NullDiagSink {
    fn publish(&mut self, _packet: &DiagPacket) -> Result<(), DiagError> {
        Ok(())
    }
}

//! # Arm Server Module
//!
//! This module abstracts over the networking side of the arm executable. Clients send one command
//! at a time on a `REP` socket and are sent a single response once the command has completed.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    cmd::{ArmCmd, ArmResponse, CmdParseError},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};
use log::warn;

use crate::params::ArmExecParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Command server.
pub struct ArmServer {
    /// REP socket which accepts commands from clients
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ArmServerError {
    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),

    #[error("Could not parse the received command: {0}")]
    CmdParseError(CmdParseError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ArmServer {
    /// Create a new instance of the server.
    ///
    /// This function will not wait for a client to connect before returning.
    pub fn new(ctx: &zmq::Context, params: &ArmExecParams) -> Result<Self, ArmServerError> {
        let socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            recv_timeout: 200,
            send_timeout: 1000,
            linger: 1,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::REP, socket_options, &params.cmd_endpoint)?;

        Ok(Self { socket })
    }

    /// Receive a single command from a client.
    ///
    /// `Ok(None)` is returned if no command arrived within the receive timeout. After a valid
    /// command is received [`ArmServer::send_response`] must be called before receiving the next
    /// one. Requests which can't be parsed are answered with [`ArmResponse::Invalid`] by this
    /// function.
    pub fn get_cmd(&self) -> Result<Option<ArmCmd>, ArmServerError> {
        let msg = match self.socket.recv_str() {
            Ok(m) => m,
            Err(MonitoredSocketError::RecvTimeout) => return Ok(None),
            Err(MonitoredSocketError::NonUtf8Message) => {
                self.send_response(&ArmResponse::Invalid {
                    message: String::from("The request is not valid UTF-8"),
                })?;
                return Err(MonitoredSocketError::NonUtf8Message.into());
            }
            Err(e) => return Err(e.into()),
        };

        match ArmCmd::from_json(&msg) {
            Ok(cmd) => Ok(Some(cmd)),
            Err(e) => {
                if let Err(se) = self.send_response(&ArmResponse::Invalid {
                    message: e.to_string(),
                }) {
                    warn!("Could not send the invalid response: {}", se);
                }

                Err(ArmServerError::CmdParseError(e))
            }
        }
    }

    /// Send the response to the last received command.
    pub fn send_response(&self, response: &ArmResponse) -> Result<(), ArmServerError> {
        self.socket.send_json(response).map_err(ArmServerError::from)
    }
}

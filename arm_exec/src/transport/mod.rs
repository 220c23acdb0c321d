//! # Controller transport
//!
//! The PF400 controller speaks a line based text protocol: each command is a single line and each
//! reply is a single line whose leading token is a numeric status code. [`Transport`] abstracts
//! over the physical link (TCP to the real controller or the built-in simulated controller), and
//! [`ControllerChannel`] implements the request/response contract on top of it.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod sim;
mod tcp;

pub use sim::SimController;
pub use tcp::TcpTransport;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, trace, warn};
use std::time::Duration;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Controller command which blocks until the current motion has completed.
pub const WAIT_FOR_EOM_CMD: &str = "waitForEom";

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A line oriented link to the arm controller.
pub trait Transport: Send {
    /// Write a single command line. The line terminator is added by the transport.
    fn write_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Read a single line, without its terminator.
    fn read_line(&mut self) -> Result<String, TransportError>;

    /// Set the maximum time a read may block for, `None` blocks forever.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Request/response channel to the controller.
pub struct ControllerChannel {
    transport: Box<dyn Transport>,

    /// Number of reads made for a single command before a malformed reply is reported
    max_read_attempts: u32,

    /// Set when a read or write failed part way through an exchange. A late reply could still
    /// arrive and be taken as the answer to the next command, so the channel refuses further use.
    poisoned: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Could not connect to the controller at {0}: {1}")]
    ConnectError(String, std::io::Error),

    #[error("Could not write to the controller: {0}")]
    WriteError(std::io::Error),

    #[error("Could not read from the controller: {0}")]
    ReadError(std::io::Error),

    #[error("Could not configure the controller connection: {0}")]
    ConfigError(std::io::Error),

    #[error("The controller closed the connection")]
    Disconnected,

    #[error("The controller link is out of step, reconfigure to reconnect")]
    Poisoned,

    #[error("No valid reply to \"{cmd}\" after {attempts} attempts, last reply: {response:?}")]
    MalformedResponse {
        cmd: String,
        attempts: u32,
        response: String,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ControllerChannel {
    pub fn new(transport: Box<dyn Transport>, max_read_attempts: u32) -> Self {
        Self {
            transport,
            max_read_attempts: max_read_attempts.max(1),
            poisoned: false,
        }
    }

    /// Send a command and return the controller's response.
    ///
    /// Replies which are empty or don't start with a status code are discarded and the next line
    /// read, up to the configured number of attempts, after which a `MalformedResponse` error
    /// carrying the last raw reply is returned.
    pub fn send(&mut self, cmd: &str) -> Result<String, TransportError> {
        self.exchange(cmd, true)
    }

    /// Send a command, returning an empty string rather than an error if no well formed reply is
    /// received. Used for best-effort status polls.
    pub fn send_lenient(&mut self, cmd: &str) -> Result<String, TransportError> {
        self.exchange(cmd, false)
    }

    /// Block until the controller reports the end of the current motion.
    pub fn wait_for_motion_complete(&mut self) -> Result<String, TransportError> {
        self.send(WAIT_FOR_EOM_CMD)
    }

    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.transport.set_read_timeout(timeout)
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn exchange(&mut self, cmd: &str, strict: bool) -> Result<String, TransportError> {
        if self.poisoned {
            return Err(TransportError::Poisoned);
        }

        trace!("-> {}", cmd);
        self.transport.write_line(cmd).map_err(|e| self.poison(cmd, e))?;

        let mut last_response = String::new();

        for attempt in 1..=self.max_read_attempts {
            let response = self.transport.read_line().map_err(|e| self.poison(cmd, e))?;
            let response = response.trim();
            trace!("<- {}", response);

            if is_well_formed(response) {
                return Ok(response.to_string());
            }

            debug!(
                "Malformed response {:?} to \"{}\" (attempt {}/{})",
                response, cmd, attempt, self.max_read_attempts
            );
            last_response = response.to_string();
        }

        if strict {
            Err(TransportError::MalformedResponse {
                cmd: cmd.to_string(),
                attempts: self.max_read_attempts,
                response: last_response,
            })
        } else {
            Ok(String::new())
        }
    }

    fn poison(&mut self, cmd: &str, e: TransportError) -> TransportError {
        warn!("Controller link lost during \"{}\": {}", cmd, e);
        self.poisoned = true;
        e
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// A well formed response starts with an integer status code.
fn is_well_formed(response: &str) -> bool {
    match response.split_whitespace().next() {
        Some(token) => token.parse::<i32>().is_ok(),
        None => false,
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed("0"));
        assert!(is_well_formed("0 -1"));
        assert!(is_well_formed("-1021 Robot not homed"));
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("   "));
        assert!(!is_well_formed("ok"));
    }

    #[test]
    fn test_retry_on_malformed() {
        let sim = SimController::new();
        let mut channel = ControllerChannel::new(Box::new(sim.clone()), 3);

        // Two bad lines then a good one are absorbed by the retries
        sim.script("hp", &["", "garbage", "0"]);
        assert_eq!(channel.send("hp 1 30").unwrap(), "0");

        // Three bad lines exhaust them
        sim.script("hp", &["", "", "nope"]);
        match channel.send("hp 1 30") {
            Err(TransportError::MalformedResponse { response, attempts, .. }) => {
                assert_eq!(response, "nope");
                assert_eq!(attempts, 3);
            }
            r => panic!("Expected a malformed response error, got {:?}", r),
        }

        // Lenient sends swallow the error
        sim.script("sysState", &["", "", ""]);
        assert_eq!(channel.send_lenient("sysState").unwrap(), "");

        assert_eq!(sim.sent(), vec!["hp 1 30", "hp 1 30", "sysState"]);
        assert!(!channel.is_poisoned());
    }

    #[test]
    fn test_late_reply_after_read_failure() {
        let sim = SimController::new();
        let mut channel = ControllerChannel::new(Box::new(sim.clone()), 3);

        // The end of motion doesn't arrive in time
        sim.script(WAIT_FOR_EOM_CMD, &[]);
        assert!(matches!(
            channel.wait_for_motion_complete(),
            Err(TransportError::ReadError(_))
        ));
        assert!(channel.is_poisoned());

        // ... and turns up once the next command is due
        sim.push_reply("0");

        assert!(matches!(
            channel.send("movej 1 400 0 180 0 120 0"),
            Err(TransportError::Poisoned)
        ));
        assert!(matches!(
            channel.send_lenient("sysState"),
            Err(TransportError::Poisoned)
        ));

        // Nothing more reached the controller and the stray reply was not consumed
        assert_eq!(sim.sent(), vec![WAIT_FOR_EOM_CMD]);
        assert_eq!(sim.pending(), vec!["0"]);
    }
}

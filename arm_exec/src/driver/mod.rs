//! # PF400 driver
//!
//! The driver issues the controller commands behind each primitive operation of the arm (moves,
//! jogs, free mode, gripper actions, motion profile registration and the power-on sequence) and
//! owns the [`RobotState`] that has to be threaded through them.
//!
//! Every command is checked against the controller's status code. Codes which describe the
//! physical state of the arm (not homed, power disabled, ...) are reported as
//! [`DriverError::PhysicalState`] so that callers can react to them specifically.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod gripper;
mod init;
mod motion;
mod state;

pub use motion::{FreeAxes, JogAxis};
pub use state::{apply_gripper_override, RobotState};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
use std::time::Duration;
use thiserror::Error;

use crate::location::{LocType, Location, LocationError};
use crate::transport::{ControllerChannel, TransportError};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// The arm has not been homed since power on.
pub const CODE_NOT_HOMED: i32 = -1021;

/// Timed out waiting for power to come on.
pub const CODE_POWER_TIMEOUT: i32 = -1025;

/// Motor power is disabled.
pub const CODE_POWER_DISABLED: i32 = -1046;

/// A joint is outside its range of motion.
pub const CODE_JOINT_OUT_OF_RANGE: i32 = -3100;

/// Number of values read from a position reply.
const NUM_AXES: usize = 6;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Driver for a single PF400 arm.
pub struct Pf400Driver {
    channel: ControllerChannel,

    state: RobotState,

    params: DriverParams,
}

/// Timing parameters of the driver.
#[derive(Debug, Clone, Copy)]
pub struct DriverParams {
    /// Read timeout for ordinary commands, which includes waiting for the end of a motion
    pub read_timeout: Duration,

    /// Read timeout used during the power-on, home and attach sequence
    pub init_timeout: Duration,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Communication with the controller failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Unexpected response to \"{cmd}\": {response:?}")]
    UnexpectedResponse { cmd: String, response: String },

    #[error("The controller rejected \"{cmd}\" with code {code}: {message}")]
    Controller {
        cmd: String,
        code: i32,
        message: String,
    },

    #[error("\"{cmd}\" failed, {description} (code {code})")]
    PhysicalState {
        cmd: String,
        code: i32,
        description: &'static str,
    },

    #[error("\"{0}\" is not a jog axis, expected one of x, y, z, yaw, pitch, roll")]
    InvalidJogAxis(String),

    #[error("{0} is not a valid axis to free, expected 0 (all) to 6")]
    InvalidFreeAxis(i32),

    #[error("Invalid location: {0}")]
    Location(#[from] LocationError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Pf400Driver {
    pub fn new(channel: ControllerChannel, params: DriverParams) -> Self {
        Self {
            channel,
            state: RobotState::default(),
            params,
        }
    }

    pub fn state(&self) -> &RobotState {
        &self.state
    }

    /// Current joint position.
    pub fn where_joint(&mut self) -> Result<Location, DriverError> {
        let reply = self.command("wherej")?;
        Ok(Location::from_controller_reply(
            LocType::Joint,
            &reply,
            NUM_AXES,
        )?)
    }

    /// Current Cartesian position.
    pub fn where_cartesian(&mut self) -> Result<Location, DriverError> {
        let reply = self.command("wherec")?;
        Ok(Location::from_controller_reply(
            LocType::Cartesian,
            &reply,
            NUM_AXES,
        )?)
    }

    /// Best-effort joint position poll, `None` if the controller didn't give one.
    pub fn poll_joint(&mut self) -> Option<Location> {
        let reply = self.channel.send_lenient("wherej").ok()?;

        match check_status("wherej", &reply) {
            Ok(values) => Location::from_controller_reply(LocType::Joint, &values, NUM_AXES).ok(),
            Err(_) => None,
        }
    }

    /// Send a command and check its status code, returning the rest of the reply.
    pub(crate) fn command(&mut self, cmd: &str) -> Result<String, DriverError> {
        debug!("Controller command: {}", cmd);
        let reply = self.channel.send(cmd)?;
        check_status(cmd, &reply)
    }

    /// Send a command then block until the motion it started has completed.
    pub(crate) fn command_and_wait(&mut self, cmd: &str) -> Result<String, DriverError> {
        let reply = self.command(cmd)?;
        self.wait_for_motion_complete()?;
        Ok(reply)
    }

    pub(crate) fn wait_for_motion_complete(&mut self) -> Result<(), DriverError> {
        let reply = self.channel.wait_for_motion_complete()?;
        check_status(crate::transport::WAIT_FOR_EOM_CMD, &reply).map(|_| ())
    }
}

impl DriverError {
    /// Classify a non-zero status code.
    fn from_code(cmd: &str, code: i32, message: &str) -> Self {
        let description = match code {
            CODE_NOT_HOMED => "the robot is not homed",
            CODE_POWER_DISABLED => "motor power is disabled",
            CODE_POWER_TIMEOUT => "timed out waiting for power",
            CODE_JOINT_OUT_OF_RANGE => "a joint is out of range",
            _ => {
                return DriverError::Controller {
                    cmd: cmd.to_string(),
                    code,
                    message: message.to_string(),
                }
            }
        };

        DriverError::PhysicalState {
            cmd: cmd.to_string(),
            code,
            description,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Split a reply into its status code and the rest, failing on a non-zero code.
fn check_status(cmd: &str, reply: &str) -> Result<String, DriverError> {
    let mut parts = reply.trim().splitn(2, char::is_whitespace);

    let code = match parts.next().and_then(|t| t.parse::<i32>().ok()) {
        Some(c) => c,
        None => {
            return Err(DriverError::UnexpectedResponse {
                cmd: cmd.to_string(),
                response: reply.to_string(),
            })
        }
    };
    let rest = parts.next().unwrap_or("").trim();

    match code {
        0 => Ok(rest.to_string()),
        c => Err(DriverError::from_code(cmd, c, rest)),
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::transport::SimController;

    /// A driver talking to a fresh simulated controller.
    pub(crate) fn sim_driver() -> (Pf400Driver, SimController) {
        let sim = SimController::new();
        let channel = ControllerChannel::new(Box::new(sim.clone()), 3);
        let driver = Pf400Driver::new(
            channel,
            DriverParams {
                read_timeout: Duration::from_secs(1),
                init_timeout: Duration::from_secs(1),
            },
        );

        (driver, sim)
    }

    #[test]
    fn test_check_status() {
        assert_eq!(check_status("wherej", "0 1 2 3").unwrap(), "1 2 3");
        assert_eq!(check_status("mode 0", "0").unwrap(), "");

        match check_status("attach 1", "-1021 Robot not homed") {
            Err(DriverError::PhysicalState { code, .. }) => assert_eq!(code, CODE_NOT_HOMED),
            r => panic!("Expected a physical state error, got {:?}", r),
        }
        match check_status("movej 1 0", "-1012 Joint out of limits") {
            Err(DriverError::Controller { code, message, .. }) => {
                assert_eq!(code, -1012);
                assert_eq!(message, "Joint out of limits");
            }
            r => panic!("Expected a controller error, got {:?}", r),
        }
        assert!(matches!(
            check_status("wherej", ""),
            Err(DriverError::UnexpectedResponse { .. })
        ));
    }

    #[test]
    fn test_where() {
        let (mut driver, sim) = sim_driver();
        sim.set_joints(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        assert_eq!(
            driver.where_joint().unwrap(),
            Location::joint(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        );

        // The configuration flag after the pose is dropped
        assert_eq!(driver.where_cartesian().unwrap().values.len(), NUM_AXES);

        sim.script("wherej", &["", "", ""]);
        assert_eq!(driver.poll_joint(), None);
    }
}

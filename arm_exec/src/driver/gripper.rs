//! Gripper primitives

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::info;

use super::{check_status, DriverError, Pf400Driver};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// How far inside the plate width the gripper axis is held while gripping, in mm.
pub const GRIPPER_CLEARANCE_MM: f64 = 10.0;

/// Flag following the status code when a grasp closed on a plate, `0` means it closed on nothing.
const GRASP_SUCCESS_FLAG: &str = "-1";

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Pf400Driver {
    /// Close the gripper on a plate.
    ///
    /// The gripper override is recorded before the grasp is sent so that every move made from
    /// here on holds the gripper at the plate. It is cleared again if the grasp fails.
    pub fn grasp_plate(&mut self, width: f64, force: f64, speed: f64) -> Result<(), DriverError> {
        self.state.gripper_axis_override_value = Some(width - GRIPPER_CLEARANCE_MM);

        if let Err(e) = self.send_grasp(width, force, speed) {
            self.state.gripper_axis_override_value = None;
            return Err(e);
        }

        info!("Plate gripped at {} mm", width);

        Ok(())
    }

    /// Open the gripper.
    pub fn release_plate(&mut self, width: f64, speed: f64) -> Result<(), DriverError> {
        self.state.gripper_axis_override_value = None;

        self.command_and_wait(&format!("releaseplate {:.3} {:.3}", width, speed))?;

        info!("Gripper released to {} mm", width);

        Ok(())
    }

    pub fn is_plate_gripped(&self) -> bool {
        self.state.is_plate_gripped()
    }

    fn send_grasp(&mut self, width: f64, force: f64, speed: f64) -> Result<(), DriverError> {
        let cmd = format!("graspplate {:.3} {:.3} {:.3}", width, speed, force);
        let reply = self.channel.send(&cmd)?;

        if check_status(&cmd, &reply)? != GRASP_SUCCESS_FLAG {
            return Err(DriverError::UnexpectedResponse { cmd, response: reply });
        }

        self.wait_for_motion_complete()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

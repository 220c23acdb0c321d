//! Motion primitives: joint and Cartesian moves, jogging and free mode

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info};
use std::str::FromStr;

use super::{apply_gripper_override, DriverError, Pf400Driver};
use crate::location::{LocType, Location, GRIPPER_AXIS, JOINT_Z_AXIS};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Axes freed by [`FreeAxes::AllButGripper`], the gripper (axis 5) is left locked so a held
/// plate isn't dropped.
const NON_GRIPPER_AXES: [i32; 5] = [1, 2, 3, 4, 6];

/// Free mode selector which locks every axis again.
const UNFREE_SELECTOR: i32 = -1;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Cartesian axis to jog along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogAxis {
    X,
    Y,
    Z,
    Yaw,
    Pitch,
    Roll,
}

/// Which axes to release in free mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeAxes {
    All,
    Single(i32),
    AllButGripper,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Pf400Driver {
    /// Move to a location with the move type given by the location.
    pub fn move_to(
        &mut self,
        location: &Location,
        motion_profile_id: i32,
    ) -> Result<(), DriverError> {
        match location.loc_type {
            LocType::Joint => self.move_joint(location, motion_profile_id),
            LocType::Cartesian => self.move_cartesian(location, motion_profile_id),
        }
    }

    /// Joint space move. The gripper axis is overridden while a plate is held.
    pub fn move_joint(
        &mut self,
        location: &Location,
        motion_profile_id: i32,
    ) -> Result<(), DriverError> {
        self.ensure_not_free()?;

        let location = apply_gripper_override(location, &self.state);

        self.command_and_wait(&format!(
            "movej {} {}",
            motion_profile_id,
            location.to_controller_string()
        ))
        .map(|_| ())
    }

    /// Cartesian move.
    pub fn move_cartesian(
        &mut self,
        location: &Location,
        motion_profile_id: i32,
    ) -> Result<(), DriverError> {
        self.ensure_not_free()?;

        self.command_and_wait(&format!(
            "movec {} {}",
            motion_profile_id,
            location.to_controller_string()
        ))
        .map(|_| ())
    }

    /// Move a distance along a single Cartesian axis from the current position.
    pub fn jog(
        &mut self,
        axis: JogAxis,
        distance: f64,
        motion_profile_id: i32,
    ) -> Result<(), DriverError> {
        let mut location = self.where_cartesian()?;

        match location.values.get_mut(axis.index()) {
            Some(v) => *v += distance,
            None => {
                return Err(DriverError::UnexpectedResponse {
                    cmd: String::from("wherec"),
                    response: location.to_controller_string(),
                })
            }
        }

        debug!("Jogging {:?} by {} to {}", axis, distance, location);

        self.move_cartesian(&location, motion_profile_id)
    }

    /// Straighten the arm out to the taught unwind location, keeping the current height and
    /// gripper position.
    pub fn unwind(
        &mut self,
        unwind_location: &Location,
        motion_profile_id: i32,
    ) -> Result<(), DriverError> {
        let current = self.where_joint()?;

        let mut target = unwind_location.clone();
        target.loc_type = LocType::Joint;
        for axis in &[JOINT_Z_AXIS, GRIPPER_AXIS] {
            if let (Some(t), Some(c)) = (target.values.get_mut(*axis), current.values.get(*axis)) {
                *t = *c;
            }
        }

        self.move_joint(&target, motion_profile_id)
    }

    /// Release axes for manual positioning.
    pub fn set_free_mode(&mut self, axes: FreeAxes) -> Result<(), DriverError> {
        match axes {
            FreeAxes::All => self.freemode(0)?,
            FreeAxes::Single(a) => self.freemode(a)?,
            FreeAxes::AllButGripper => {
                for a in NON_GRIPPER_AXES.iter() {
                    self.freemode(*a)?;
                }
            }
        }

        info!("Free mode enabled ({:?})", axes);
        self.state.is_free = true;

        Ok(())
    }

    /// Lock all axes again.
    pub fn unfree(&mut self) -> Result<(), DriverError> {
        self.freemode(UNFREE_SELECTOR)?;

        info!("Free mode disabled");
        self.state.is_free = false;

        Ok(())
    }

    /// Take the arm out of free mode before it is commanded to move.
    fn ensure_not_free(&mut self) -> Result<(), DriverError> {
        if self.state.is_free {
            debug!("Arm is in free mode, leaving it before moving");
            self.unfree()?;
        }

        Ok(())
    }

    fn freemode(&mut self, selector: i32) -> Result<(), DriverError> {
        self.command_and_wait(&format!("freemode {}", selector))
            .map(|_| ())
    }
}

impl JogAxis {
    /// Index of the axis in a Cartesian location.
    pub fn index(&self) -> usize {
        match self {
            JogAxis::X => 0,
            JogAxis::Y => 1,
            JogAxis::Z => 2,
            JogAxis::Yaw => 3,
            JogAxis::Pitch => 4,
            JogAxis::Roll => 5,
        }
    }
}

impl FromStr for JogAxis {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x" => Ok(JogAxis::X),
            "y" => Ok(JogAxis::Y),
            "z" => Ok(JogAxis::Z),
            "yaw" => Ok(JogAxis::Yaw),
            "pitch" => Ok(JogAxis::Pitch),
            "roll" => Ok(JogAxis::Roll),
            _ => Err(DriverError::InvalidJogAxis(s.to_string())),
        }
    }
}

impl FreeAxes {
    /// Select axes from a command's axis number, 0 meaning all of them.
    pub fn from_selector(axis: i32, keep_gripper: bool) -> Result<Self, DriverError> {
        match (keep_gripper, axis) {
            (true, _) => Ok(FreeAxes::AllButGripper),
            (false, 0) => Ok(FreeAxes::All),
            (false, a) if (1..=6).contains(&a) => Ok(FreeAxes::Single(a)),
            (false, a) => Err(DriverError::InvalidFreeAxis(a)),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::driver::test::sim_driver;

    #[test]
    fn test_moves() {
        let (mut driver, sim) = sim_driver();

        driver
            .move_to(&"j 400 10 170 5 120 0".parse().unwrap(), 2)
            .unwrap();
        driver
            .move_to(&"c 300 0 200 0 90 180".parse().unwrap(), 1)
            .unwrap();

        assert_eq!(
            sim.sent(),
            vec![
                "movej 2 400.000 10.000 170.000 5.000 120.000 0.000",
                "waitForEom",
                "movec 1 300.000 0.000 200.000 0.000 90.000 180.000",
                "waitForEom",
            ]
        );
    }

    #[test]
    fn test_free_mode_guard() {
        let (mut driver, sim) = sim_driver();

        driver.set_free_mode(FreeAxes::AllButGripper).unwrap();
        assert!(driver.state().is_free);
        assert_eq!(
            sim.sent_commands(),
            vec!["freemode 1", "freemode 2", "freemode 3", "freemode 4", "freemode 6"]
        );

        // Moving leaves free mode first
        sim.clear_sent();
        driver.move_joint(&Location::joint(vec![1.0]), 1).unwrap();
        assert!(!driver.state().is_free);
        assert_eq!(sim.sent_commands(), vec!["freemode -1", "movej 1 1.000"]);

        // If leaving free mode fails the move isn't sent
        driver.set_free_mode(FreeAxes::All).unwrap();
        sim.clear_sent();
        sim.script("freemode", &["-1046 Power disabled"]);
        assert!(matches!(
            driver.move_joint(&Location::joint(vec![1.0]), 1),
            Err(DriverError::PhysicalState { .. })
        ));
        assert_eq!(sim.sent_commands(), vec!["freemode -1"]);
        assert!(driver.state().is_free);
    }

    #[test]
    fn test_jog() {
        let (mut driver, sim) = sim_driver();
        sim.set_cartesian(&[300.0, 0.0, 200.0, 0.0, 90.0, 180.0]);

        driver.jog("Z".parse().unwrap(), -12.5, 1).unwrap();

        assert_eq!(
            sim.sent_commands(),
            vec![
                "wherec",
                "movec 1 300.000 0.000 187.500 0.000 90.000 180.000"
            ]
        );

        assert!(matches!(
            "w".parse::<JogAxis>(),
            Err(DriverError::InvalidJogAxis(_))
        ));
    }

    #[test]
    fn test_unwind() {
        let (mut driver, sim) = sim_driver();
        sim.set_joints(&[350.0, 200.0, -300.0, 700.0, 110.0, 20.0]);

        driver
            .unwind(&Location::joint(vec![0.0, 10.0, 170.0, 0.0, 0.0, 500.0]), 1)
            .unwrap();

        assert_eq!(
            sim.sent_commands(),
            vec![
                "wherej",
                "movej 1 350.000 10.000 170.000 0.000 110.000 500.000"
            ]
        );
    }

    #[test]
    fn test_free_selector() {
        assert_eq!(FreeAxes::from_selector(0, false).unwrap(), FreeAxes::All);
        assert_eq!(FreeAxes::from_selector(3, false).unwrap(), FreeAxes::Single(3));
        assert_eq!(
            FreeAxes::from_selector(3, true).unwrap(),
            FreeAxes::AllButGripper
        );
        assert!(FreeAxes::from_selector(7, false).is_err());
    }
}

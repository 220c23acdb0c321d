//! Power on, homing and motion profile registration

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::cmd::MotionProfile;
use log::{info, warn};

use super::{DriverError, Pf400Driver, RobotState, CODE_NOT_HOMED};

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Pf400Driver {
    /// Bring the arm up: select the command mode, power on, attach (homing first if the
    /// controller asks for it) and register the motion profiles.
    ///
    /// These steps take much longer than ordinary commands so the initialisation read timeout is
    /// used for the duration.
    pub fn initialize(&mut self, profiles: &[MotionProfile]) -> Result<(), DriverError> {
        info!("Initialising the arm");

        self.channel.set_read_timeout(Some(self.params.init_timeout))?;
        let result = self.init_sequence(profiles);
        self.channel.set_read_timeout(Some(self.params.read_timeout))?;

        if result.is_ok() {
            info!("Arm initialised");
        }

        result
    }

    /// Run the homing cycle.
    pub fn home(&mut self) -> Result<(), DriverError> {
        info!("Homing the arm");
        self.command_and_wait("home").map(|_| ())
    }

    /// Register a motion profile with the controller.
    pub fn register_motion_profile(&mut self, profile: &MotionProfile) -> Result<(), DriverError> {
        self.command(&format!(
            "profile {} {} {} {} {} {} {} {} {}",
            profile.id,
            profile.speed,
            profile.speed2,
            profile.acceleration,
            profile.deceleration,
            profile.accel_ramp,
            profile.decel_ramp,
            profile.inrange,
            if profile.straight { -1 } else { 0 }
        ))
        .map(|_| ())
    }

    fn init_sequence(&mut self, profiles: &[MotionProfile]) -> Result<(), DriverError> {
        self.command("mode 0")?;
        self.command("hp 1 30")?;

        match self.command("attach 1") {
            Ok(_) => (),
            Err(DriverError::PhysicalState { code, .. }) if code == CODE_NOT_HOMED => {
                warn!("The arm is not homed, homing before attaching");
                self.home()?;
                self.command("attach 1")?;
            }
            Err(e) => return Err(e),
        }

        for p in profiles {
            self.register_motion_profile(p)?;
        }

        self.state = RobotState::default();

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::driver::{test::sim_driver, CODE_POWER_DISABLED};

    fn profile() -> MotionProfile {
        MotionProfile {
            id: 2,
            speed: 50.0,
            speed2: 40.0,
            acceleration: 100.0,
            deceleration: 90.0,
            accel_ramp: 0.2,
            decel_ramp: 0.1,
            inrange: 1,
            straight: true,
        }
    }

    #[test]
    fn test_initialize() {
        let (mut driver, sim) = sim_driver();

        driver.initialize(&[profile()]).unwrap();

        assert_eq!(
            sim.sent_commands(),
            vec!["mode 0", "hp 1 30", "attach 1", "profile 2 50 40 100 90 0.2 0.1 1 -1"]
        );
    }

    #[test]
    fn test_initialize_homes_when_needed() {
        let (mut driver, sim) = sim_driver();
        sim.script("attach", &["-1021 Robot not homed"]);

        driver.initialize(&[]).unwrap();

        assert_eq!(
            sim.sent(),
            vec!["mode 0", "hp 1 30", "attach 1", "home", "waitForEom", "attach 1"]
        );
    }

    #[test]
    fn test_initialize_fatal_codes() {
        let (mut driver, sim) = sim_driver();
        sim.script("hp", &["-1046 Power disabled"]);

        match driver.initialize(&[profile()]) {
            Err(DriverError::PhysicalState { code, .. }) => assert_eq!(code, CODE_POWER_DISABLED),
            r => panic!("Expected a physical state error, got {:?}", r),
        }

        // Nothing after the failing step is sent
        assert_eq!(sim.sent(), vec!["mode 0", "hp 1 30"]);
    }
}

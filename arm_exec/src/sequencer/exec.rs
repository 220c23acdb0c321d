//! Execution of planned steps

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
use std::thread;

use super::{CmdError, Primitive};
use crate::driver::Pf400Driver;

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Run steps in order, stopping at the first failure.
///
/// `current_node` tracks the graph node the arm is at. After a failure the position is unknown so
/// it is cleared.
pub fn execute(
    driver: &mut Pf400Driver,
    current_node: &mut Option<String>,
    steps: &[Primitive],
) -> Result<(), CmdError> {
    for (i, step) in steps.iter().enumerate() {
        debug!("Step {}/{}: {}", i + 1, steps.len(), step);

        if let Err(e) = execute_step(driver, current_node, step) {
            *current_node = None;
            return Err(e);
        }
    }

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn execute_step(
    driver: &mut Pf400Driver,
    current_node: &mut Option<String>,
    step: &Primitive,
) -> Result<(), CmdError> {
    match step {
        Primitive::MoveTo {
            target,
            motion_profile_id,
            node,
        } => {
            driver.move_to(target, *motion_profile_id)?;
            *current_node = node.clone();
        }
        Primitive::Grasp(p) => driver.grasp_plate(p.width, p.force, p.speed)?,
        Primitive::Release(p) => driver.release_plate(p.width, p.speed)?,
        Primitive::Wait(d) => thread::sleep(*d),
        Primitive::Jog {
            axis,
            distance,
            motion_profile_id,
        } => {
            *current_node = None;
            driver.jog(*axis, *distance, *motion_profile_id)?;
        }
        Primitive::Free(axes) => {
            *current_node = None;
            driver.set_free_mode(*axes)?;
        }
        Primitive::Unfree => driver.unfree()?,
        Primitive::RegisterProfile(p) => driver.register_motion_profile(p)?,
        Primitive::Unwind {
            target,
            motion_profile_id,
        } => {
            *current_node = None;
            driver.unwind(target, *motion_profile_id)?;
        }
        Primitive::Home => {
            *current_node = None;
            driver.home()?;
        }
    }

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

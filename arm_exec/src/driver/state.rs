//! Robot state shared by the motion and gripper primitives

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;

use crate::location::{Location, GRIPPER_AXIS};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Mutable state of the arm as tracked by the driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RobotState {
    /// Axes are currently released for manual positioning
    pub is_free: bool,

    /// Gripper position substituted into joint moves while a plate is held, `None` when empty
    pub gripper_axis_override_value: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RobotState {
    pub fn is_plate_gripped(&self) -> bool {
        self.gripper_axis_override_value.is_some()
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Freeze the gripper axis of a joint location at the held width.
///
/// Taught joint locations include a gripper position, moving to one while holding a plate would
/// open or close the gripper in transit. Cartesian locations and locations without a gripper
/// axis are returned unchanged.
pub fn apply_gripper_override(location: &Location, state: &RobotState) -> Location {
    let mut location = location.clone();

    if let (true, Some(width)) = (location.is_joint(), state.gripper_axis_override_value) {
        if let Some(v) = location.values.get_mut(GRIPPER_AXIS) {
            *v = width;
        }
    }

    location
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_apply_gripper_override() {
        let joint = Location::joint(vec![400.0, 10.0, 170.0, 5.0, 120.0, 0.0]);
        let cart = Location::cartesian(vec![300.0, 0.0, 200.0, 0.0, 90.0, 180.0]);

        let empty = RobotState::default();
        assert_eq!(apply_gripper_override(&joint, &empty), joint);

        let holding = RobotState {
            is_free: false,
            gripper_axis_override_value: Some(112.0),
        };
        assert!(holding.is_plate_gripped());
        assert_eq!(
            apply_gripper_override(&joint, &holding).values,
            vec![400.0, 10.0, 170.0, 5.0, 112.0, 0.0]
        );
        assert_eq!(apply_gripper_override(&cart, &holding), cart);

        // Short joint locations have no gripper axis to override
        let short = Location::joint(vec![1.0, 2.0]);
        assert_eq!(apply_gripper_override(&short, &holding), short);
    }
}

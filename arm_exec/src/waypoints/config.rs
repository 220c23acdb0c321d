//! Workcell configuration file format

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::cmd::{CmdRecord, GraspParams, MotionProfile, ReleaseParams};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::location::Location;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Extra opening of the gripper over the grasp width when releasing, in mm.
pub const RELEASE_CLEARANCE_MM: f64 = 10.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The workcell JSON document as written on disk.
#[derive(Debug, Deserialize)]
pub(crate) struct WorkcellFile {
    pub locations: HashMap<String, Location>,

    #[serde(default)]
    pub nests: HashMap<String, Nest>,

    #[serde(default)]
    pub motion_profiles: Vec<MotionProfile>,

    #[serde(default)]
    pub grip_params: RawGripParams,

    #[serde(default)]
    pub graph_edges: Vec<(String, String)>,

    #[serde(default)]
    pub holding_motion_profile_id: Option<i32>,

    #[serde(default)]
    pub special_maneuvers: Vec<RawManeuver>,
}

/// A plate holding position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nest {
    /// Location of the plate in the nest
    pub loc: Location,

    /// Checkpoints relative to `loc`, innermost first, used to enter and leave the nest
    #[serde(default)]
    pub approach_path: Vec<Location>,

    /// Waypoint to park at before and after visiting the nest
    pub safe_loc: String,

    pub orientation: Orientation,
}

/// Grip parameters for one plate orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationGripParams {
    /// Plate width in mm
    pub width: f64,

    pub force: f64,

    pub speed: f64,
}

/// Grip parameters for both orientations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GripParams {
    pub portrait: OrientationGripParams,
    pub landscape: OrientationGripParams,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawGripParams {
    pub portrait: Option<OrientationGripParams>,
    pub landscape: Option<OrientationGripParams>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawManeuver {
    pub nest_prefix: String,
    pub commands: Vec<CmdRecord>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// How a plate sits in a nest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GripParams {
    pub fn get(&self, orientation: Orientation) -> &OrientationGripParams {
        match orientation {
            Orientation::Portrait => &self.portrait,
            Orientation::Landscape => &self.landscape,
        }
    }
}

impl OrientationGripParams {
    pub fn grasp(&self) -> GraspParams {
        GraspParams {
            width: self.width,
            force: self.force,
            speed: self.speed,
        }
    }

    pub fn release(&self) -> ReleaseParams {
        ReleaseParams {
            width: self.width + RELEASE_CLEARANCE_MM,
            speed: self.speed,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Portrait => write!(f, "portrait"),
            Orientation::Landscape => write!(f, "landscape"),
        }
    }
}

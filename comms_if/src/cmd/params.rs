//! # Command parameters
//!
//! Each arm command carries one of these parameter structures. They are read both from JSON
//! (requests and sequence files) and from the operator's command line, so every struct derives
//! `Deserialize` and `StructOpt`. Optional fields default when absent from the JSON.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use structopt::StructOpt;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Motion profile used when a command doesn't name one.
pub const DEFAULT_MOTION_PROFILE_ID: i32 = 1;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Move directly to a named waypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
pub struct MoveParams {
    /// Name of the waypoint (or nest) to move to
    pub waypoint: String,

    /// Motion profile to move with
    #[structopt(long, default_value = "1")]
    #[serde(default = "default_motion_profile_id")]
    pub motion_profile_id: i32,
}

/// Approach a nest, optionally following its approach path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
pub struct ApproachParams {
    /// Name of the nest to approach
    pub nest: String,

    #[structopt(long, default_value = "0")]
    #[serde(default)]
    pub x_offset: f64,

    #[structopt(long, default_value = "0")]
    #[serde(default)]
    pub y_offset: f64,

    #[structopt(long, default_value = "0")]
    #[serde(default)]
    pub z_offset: f64,

    #[structopt(long, default_value = "1")]
    #[serde(default = "default_motion_profile_id")]
    pub motion_profile_id: i32,

    /// Skip the nest's approach path and move straight to the nest
    #[structopt(long)]
    #[serde(default)]
    pub ignore_safepath: bool,
}

/// Leave a nest along its approach path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
pub struct LeaveParams {
    /// Name of the nest to leave
    pub nest: String,

    #[structopt(long, default_value = "0")]
    #[serde(default)]
    pub x_offset: f64,

    #[structopt(long, default_value = "0")]
    #[serde(default)]
    pub y_offset: f64,

    #[structopt(long, default_value = "0")]
    #[serde(default)]
    pub z_offset: f64,

    #[structopt(long, default_value = "1")]
    #[serde(default = "default_motion_profile_id")]
    pub motion_profile_id: i32,

    /// Leave in a single move rather than following the approach path
    #[structopt(long)]
    #[serde(default)]
    pub ignore_safepath: bool,
}

/// Gripper grasp parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, StructOpt)]
pub struct GraspParams {
    /// Plate width in mm
    pub width: f64,

    /// Grip force in percent
    pub force: f64,

    /// Gripper speed in percent
    pub speed: f64,
}

/// Gripper release parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, StructOpt)]
pub struct ReleaseParams {
    /// Open width in mm
    pub width: f64,

    /// Gripper speed in percent
    pub speed: f64,
}

/// Pick a plate up from a nest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
pub struct RetrievePlateParams {
    /// Name of the source nest
    pub nest: String,

    /// Explicit grasp parameters, used instead of the nest orientation's defaults when the width
    /// is non-zero
    #[structopt(skip)]
    #[serde(default)]
    pub grasp_params: Option<GraspParams>,

    #[structopt(long, default_value = "0")]
    #[serde(default)]
    pub x_offset: f64,

    #[structopt(long, default_value = "0")]
    #[serde(default)]
    pub y_offset: f64,

    #[structopt(long, default_value = "0")]
    #[serde(default)]
    pub z_offset: f64,

    #[structopt(long, default_value = "1")]
    #[serde(default = "default_motion_profile_id")]
    pub motion_profile_id: i32,

    /// Width to open the gripper to before approaching
    #[structopt(long)]
    #[serde(default)]
    pub grip_width: Option<f64>,

    /// Labware held in the nest
    #[structopt(long)]
    #[serde(default)]
    pub labware: Option<String>,
}

/// Put a held plate down in a nest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
pub struct DropOffPlateParams {
    /// Name of the destination nest
    pub nest: String,

    /// Explicit release parameters, used instead of the nest orientation's defaults when the
    /// width is non-zero
    #[structopt(skip)]
    #[serde(default)]
    pub release_params: Option<ReleaseParams>,

    #[structopt(long, default_value = "0")]
    #[serde(default)]
    pub x_offset: f64,

    #[structopt(long, default_value = "0")]
    #[serde(default)]
    pub y_offset: f64,

    #[structopt(long, default_value = "0")]
    #[serde(default)]
    pub z_offset: f64,

    #[structopt(long, default_value = "1")]
    #[serde(default = "default_motion_profile_id")]
    pub motion_profile_id: i32,

    /// Width to open the gripper to when releasing
    #[structopt(long)]
    #[serde(default)]
    pub grip_width: Option<f64>,

    /// Labware being placed
    #[structopt(long)]
    #[serde(default)]
    pub labware: Option<String>,
}

/// Move a plate from one nest to another. Used by both `transfer` and `smart_transfer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
pub struct TransferParams {
    /// Name of the nest holding the plate
    pub source_nest: String,

    /// Name of the nest to put the plate in
    pub destination_nest: String,

    #[structopt(long, default_value = "1")]
    #[serde(default = "default_motion_profile_id")]
    pub motion_profile_id: i32,

    #[structopt(skip)]
    #[serde(default)]
    pub grasp_params: Option<GraspParams>,

    #[structopt(skip)]
    #[serde(default)]
    pub release_params: Option<ReleaseParams>,

    #[structopt(long)]
    #[serde(default)]
    pub grip_width: Option<f64>,

    #[structopt(long)]
    #[serde(default)]
    pub labware: Option<String>,
}

/// Run a named sequence file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
pub struct RunSequenceParams {
    /// Name of the sequence (file name without the `.json` extension)
    pub sequence_name: String,

    /// Labware passed to every plate and lid step that doesn't name its own
    #[structopt(long)]
    #[serde(default)]
    pub labware: Option<String>,
}

/// Remove a lid from a plate or a lid stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
pub struct PickLidParams {
    /// Nest the lid is in
    pub nest: String,

    /// Labware the lid belongs to
    pub labware: String,

    #[structopt(long, default_value = "1")]
    #[serde(default = "default_motion_profile_id")]
    pub motion_profile_id: i32,

    /// The lid sits on a plate rather than on a lid stack
    #[structopt(long)]
    #[serde(default)]
    pub pick_from_plate: bool,
}

/// Put a held lid on a plate or a lid stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
pub struct PlaceLidParams {
    /// Nest to place the lid in
    pub nest: String,

    /// Labware the lid belongs to
    pub labware: String,

    #[structopt(long, default_value = "1")]
    #[serde(default = "default_motion_profile_id")]
    pub motion_profile_id: i32,

    /// Place the lid on a plate rather than on a lid stack
    #[structopt(long)]
    #[serde(default)]
    pub place_on_plate: bool,
}

/// Jog the arm along a single Cartesian axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
pub struct JogParams {
    /// One of `x`, `y`, `z`, `yaw`, `pitch`, `roll`
    pub axis: String,

    /// Distance in mm or degrees
    #[structopt(allow_hyphen_values = true)]
    pub distance: f64,
}

/// Release axes for manual positioning.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, StructOpt)]
pub struct FreeParams {
    /// Axis to free, 0 frees all axes
    #[structopt(long, default_value = "0")]
    #[serde(default)]
    pub axis: i32,

    /// Free every axis except the gripper
    #[structopt(long)]
    #[serde(default)]
    pub keep_gripper: bool,
}

/// Sleep between steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
pub struct WaitParams {
    pub duration_s: f64,
}

/// Motion profile registered with the controller and referenced by id on every move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
pub struct MotionProfile {
    pub id: i32,

    /// Speed in percent
    #[structopt(long, default_value = "50")]
    pub speed: f64,

    /// Cartesian rotational speed in percent
    #[structopt(long, default_value = "50")]
    pub speed2: f64,

    #[structopt(long, default_value = "50")]
    pub acceleration: f64,

    #[structopt(long, default_value = "50")]
    pub deceleration: f64,

    /// Acceleration ramp in seconds
    #[structopt(long, default_value = "0.1")]
    pub accel_ramp: f64,

    /// Deceleration ramp in seconds
    #[structopt(long, default_value = "0.1")]
    pub decel_ramp: f64,

    /// In-range tolerance, 0 means none
    #[structopt(long, default_value = "0")]
    #[serde(default)]
    pub inrange: i32,

    /// Move in straight lines in Cartesian space
    #[structopt(long)]
    #[serde(default)]
    pub straight: bool,
}

/// Load (or reload) the configuration of a workcell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
pub struct ConfigureParams {
    pub workcell: String,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_motion_profile_id() -> i32 {
    DEFAULT_MOTION_PROFILE_ID
}

/// Explicit grasp parameters only count when they carry a width.
pub fn explicit_grasp(params: &Option<GraspParams>) -> Option<GraspParams> {
    params.filter(|p| p.width != 0.0)
}

/// Explicit release parameters only count when they carry a width.
pub fn explicit_release(params: &Option<ReleaseParams>) -> Option<ReleaseParams> {
    params.filter(|p| p.width != 0.0)
}

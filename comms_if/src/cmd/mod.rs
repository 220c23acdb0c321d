//! # Arm command module
//!
//! Commands arrive at the arm executable as [`CmdRecord`]s, a command name plus a JSON parameter
//! object. The same record format is used by sequence files, so a sequence is just a list of
//! records. Records are resolved into the closed [`ArmCmd`] enum by an explicit dispatch table in
//! [`ArmCmd::from_record`], so an unknown command name is caught when the record is parsed rather
//! than when it is executed.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;
mod response;

pub use params::*;
pub use response::*;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{self, Value};
use structopt::StructOpt;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The wire format of a single command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmdRecord {
    /// Name of the command, for example `"retrieve_plate"`
    pub command: String,

    /// Parameters of the command, `null` or absent for commands without any
    #[serde(default)]
    pub params: Value,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A command that can be executed by the arm.
#[derive(Debug, Clone, PartialEq, Serialize, StructOpt)]
#[serde(tag = "command", content = "params", rename_all = "snake_case")]
pub enum ArmCmd {
    /// Move to a named waypoint
    #[structopt(name = "move")]
    Move(MoveParams),

    /// Approach a nest along its approach path
    #[structopt(name = "approach")]
    Approach(ApproachParams),

    /// Leave a nest along its approach path
    #[structopt(name = "leave")]
    Leave(LeaveParams),

    /// Close the gripper on a plate
    #[structopt(name = "grasp_plate")]
    GraspPlate(GraspParams),

    /// Open the gripper
    #[structopt(name = "release_plate")]
    ReleasePlate(ReleaseParams),

    /// Pick a plate up from a nest
    #[structopt(name = "retrieve_plate")]
    RetrievePlate(RetrievePlateParams),

    /// Put a held plate down in a nest
    #[structopt(name = "dropoff_plate")]
    #[serde(rename = "dropoff_plate")]
    DropOffPlate(DropOffPlateParams),

    /// Move a plate between two nests through their safe points
    #[structopt(name = "transfer")]
    Transfer(TransferParams),

    /// Move a plate between two nests along the shortest path through the workcell graph
    #[structopt(name = "smart_transfer")]
    SmartTransfer(TransferParams),

    /// Run a named sequence file
    #[structopt(name = "run_sequence")]
    RunSequence(RunSequenceParams),

    /// Take a lid off a plate or a lid stack
    #[structopt(name = "pick_lid")]
    PickLid(PickLidParams),

    /// Put a lid on a plate or a lid stack
    #[structopt(name = "place_lid")]
    PlaceLid(PlaceLidParams),

    /// Straighten the arm's joints without changing its height or grip
    #[structopt(name = "unwind")]
    Unwind,

    /// Jog along a single Cartesian axis
    #[structopt(name = "jog")]
    Jog(JogParams),

    /// Release axes for manual positioning
    #[structopt(name = "free")]
    Free(FreeParams),

    /// Lock all axes again
    #[structopt(name = "unfree")]
    Unfree,

    /// Register a motion profile with the controller
    #[structopt(name = "register_motion_profile")]
    RegisterMotionProfile(MotionProfile),

    /// Sleep for a number of seconds
    #[structopt(name = "wait")]
    Wait(WaitParams),

    /// Load a workcell configuration and (re)initialise the arm
    #[structopt(name = "configure")]
    Configure(ConfigureParams),

    /// Home the arm
    #[structopt(name = "home")]
    Home,

    /// Get the configured waypoints, nests, motion profiles and graph
    #[structopt(name = "get_teachpoints")]
    GetTeachpoints,

    /// Get the current joint and Cartesian positions of the arm
    #[structopt(name = "get_current_location")]
    GetCurrentLocation,

    /// Get the tool and robot state
    #[structopt(name = "get_state")]
    GetState,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum CmdParseError {
    #[error("Command contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("\"{0}\" is not a recognised command")]
    UnknownCommand(String),

    #[error("Invalid parameters for the \"{0}\" command: {1}")]
    InvalidParams(String, serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CmdRecord {
    /// Parse a record from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, CmdParseError> {
        serde_json::from_str(json_str).map_err(CmdParseError::InvalidJson)
    }
}

impl ArmCmd {
    /// Parse a command from a JSON record string.
    pub fn from_json(json_str: &str) -> Result<Self, CmdParseError> {
        let record = CmdRecord::from_json(json_str)?;
        Self::from_record(&record.command, record.params)
    }

    /// Resolve a command name and its parameters into a command.
    pub fn from_record(command: &str, params: Value) -> Result<Self, CmdParseError> {
        let cmd = match command {
            "move" => ArmCmd::Move(parse_params(command, params)?),
            "approach" => ArmCmd::Approach(parse_params(command, params)?),
            "leave" => ArmCmd::Leave(parse_params(command, params)?),
            "grasp_plate" => ArmCmd::GraspPlate(parse_params(command, params)?),
            "release_plate" => ArmCmd::ReleasePlate(parse_params(command, params)?),
            "retrieve_plate" => ArmCmd::RetrievePlate(parse_params(command, params)?),
            "dropoff_plate" => ArmCmd::DropOffPlate(parse_params(command, params)?),
            "transfer" => ArmCmd::Transfer(parse_params(command, params)?),
            "smart_transfer" => ArmCmd::SmartTransfer(parse_params(command, params)?),
            "run_sequence" => ArmCmd::RunSequence(parse_params(command, params)?),
            "pick_lid" => ArmCmd::PickLid(parse_params(command, params)?),
            "place_lid" => ArmCmd::PlaceLid(parse_params(command, params)?),
            "unwind" => ArmCmd::Unwind,
            "jog" => ArmCmd::Jog(parse_params(command, params)?),
            "free" => ArmCmd::Free(parse_params(command, params)?),
            "unfree" => ArmCmd::Unfree,
            "register_motion_profile" => {
                ArmCmd::RegisterMotionProfile(parse_params(command, params)?)
            }
            "wait" => ArmCmd::Wait(parse_params(command, params)?),
            "configure" => ArmCmd::Configure(parse_params(command, params)?),
            "home" => ArmCmd::Home,
            "get_teachpoints" => ArmCmd::GetTeachpoints,
            "get_current_location" => ArmCmd::GetCurrentLocation,
            "get_state" => ArmCmd::GetState,
            _ => return Err(CmdParseError::UnknownCommand(command.to_string())),
        };

        Ok(cmd)
    }

    /// Convert the command into its wire record.
    pub fn to_record(&self) -> Result<CmdRecord, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;

        let params = match value.get_mut("params") {
            Some(p) => p.take(),
            None => Value::Null,
        };

        Ok(CmdRecord {
            command: self.name().to_string(),
            params,
        })
    }

    /// Serialise the command as a JSON record string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_record()?)
    }

    /// The wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            ArmCmd::Move(_) => "move",
            ArmCmd::Approach(_) => "approach",
            ArmCmd::Leave(_) => "leave",
            ArmCmd::GraspPlate(_) => "grasp_plate",
            ArmCmd::ReleasePlate(_) => "release_plate",
            ArmCmd::RetrievePlate(_) => "retrieve_plate",
            ArmCmd::DropOffPlate(_) => "dropoff_plate",
            ArmCmd::Transfer(_) => "transfer",
            ArmCmd::SmartTransfer(_) => "smart_transfer",
            ArmCmd::RunSequence(_) => "run_sequence",
            ArmCmd::PickLid(_) => "pick_lid",
            ArmCmd::PlaceLid(_) => "place_lid",
            ArmCmd::Unwind => "unwind",
            ArmCmd::Jog(_) => "jog",
            ArmCmd::Free(_) => "free",
            ArmCmd::Unfree => "unfree",
            ArmCmd::RegisterMotionProfile(_) => "register_motion_profile",
            ArmCmd::Wait(_) => "wait",
            ArmCmd::Configure(_) => "configure",
            ArmCmd::Home => "home",
            ArmCmd::GetTeachpoints => "get_teachpoints",
            ArmCmd::GetCurrentLocation => "get_current_location",
            ArmCmd::GetState => "get_state",
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Deserialise a parameter struct. Absent parameters are treated as an empty object so that
/// structs whose fields all have defaults can be given without any.
fn parse_params<P: DeserializeOwned>(command: &str, params: Value) -> Result<P, CmdParseError> {
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        p => p,
    };

    serde_json::from_value(params).map_err(|e| CmdParseError::InvalidParams(command.into(), e))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_record_defaults() {
        let cmd = ArmCmd::from_record("approach", json!({"nest": "hotel_1"})).unwrap();

        assert_eq!(
            cmd,
            ArmCmd::Approach(ApproachParams {
                nest: "hotel_1".into(),
                x_offset: 0.0,
                y_offset: 0.0,
                z_offset: 0.0,
                motion_profile_id: DEFAULT_MOTION_PROFILE_ID,
                ignore_safepath: false,
            })
        );

        // Commands with no parameters accept a missing params field
        let cmd = ArmCmd::from_json(r#"{"command": "unwind"}"#).unwrap();
        assert_eq!(cmd, ArmCmd::Unwind);

        // As do commands where every parameter has a default
        let cmd = ArmCmd::from_json(r#"{"command": "free"}"#).unwrap();
        assert_eq!(cmd, ArmCmd::Free(FreeParams::default()));
    }

    #[test]
    fn test_from_record_errors() {
        match ArmCmd::from_record("teleport", Value::Null) {
            Err(CmdParseError::UnknownCommand(n)) => assert_eq!(n, "teleport"),
            r => panic!("Expected an unknown command error, got {:?}", r),
        }

        match ArmCmd::from_record("move", json!({"motion_profile_id": 2})) {
            Err(CmdParseError::InvalidParams(n, _)) => assert_eq!(n, "move"),
            r => panic!("Expected an invalid params error, got {:?}", r),
        }

        assert!(matches!(
            ArmCmd::from_json("{not json"),
            Err(CmdParseError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_record_names() {
        let cmd = ArmCmd::DropOffPlate(DropOffPlateParams {
            nest: "reader".into(),
            release_params: Some(ReleaseParams {
                width: 130.0,
                speed: 10.0,
            }),
            x_offset: 0.0,
            y_offset: 0.0,
            z_offset: 2.0,
            motion_profile_id: 3,
            grip_width: None,
            labware: Some("greiner_96".into()),
        });

        let record = cmd.to_record().unwrap();
        assert_eq!(record.command, "dropoff_plate");
        assert_eq!(record.params["release_params"]["width"], json!(130.0));
        assert_eq!(
            ArmCmd::from_record(&record.command, record.params).unwrap(),
            cmd
        );

        let record = ArmCmd::GetState.to_record().unwrap();
        assert_eq!(record.command, "get_state");
        assert_eq!(record.params, Value::Null);
    }

    #[test]
    fn test_structopt_parse() {
        let cmd = ArmCmd::from_iter_safe(&["arm", "jog", "z", "-5.5"]).unwrap();
        assert_eq!(
            cmd,
            ArmCmd::Jog(JogParams {
                axis: "z".into(),
                distance: -5.5
            })
        );

        let cmd =
            ArmCmd::from_iter_safe(&["arm", "move", "safe_1", "--motion-profile-id", "2"]).unwrap();
        assert_eq!(
            cmd,
            ArmCmd::Move(MoveParams {
                waypoint: "safe_1".into(),
                motion_profile_id: 2
            })
        );
    }

    #[test]
    fn test_explicit_grip_params() {
        assert_eq!(explicit_grasp(&None), None);
        assert_eq!(explicit_grasp(&Some(GraspParams::default())), None);

        let p = GraspParams {
            width: 122.0,
            force: 10.0,
            speed: 10.0,
        };
        assert_eq!(explicit_grasp(&Some(p)), Some(p));
    }
}

//! # Sequence file loader
//!
//! A sequence is a JSON list of command records (`{"command": ..., "params": {...}}`) which is
//! executed in order by the arm. Every record is parsed up front so that an unknown command or bad
//! parameters anywhere in the file are reported before the first step is run.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal
use comms_if::cmd::{ArmCmd, CmdParseError, CmdRecord};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Commands which accept a `labware` parameter that a sequence caller can supply.
pub const LABWARE_COMMANDS: [&str; 4] =
    ["dropoff_plate", "retrieve_plate", "pick_lid", "place_lid"];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A parsed sequence, ready to be executed.
#[derive(Debug, Clone)]
pub struct Sequence {
    /// Path the sequence was loaded from
    pub path: PathBuf,

    /// The commands in execution order
    pub cmds: Vec<ArmCmd>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("Could not find the sequence at {0:?}")]
    FileNotFound(PathBuf),

    #[error("Could not load the sequence: {0}")]
    LoadError(std::io::Error),

    #[error("The sequence is not a valid JSON list of command records: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Sequence step {0} is invalid: {1}")]
    InvalidCmd(usize, CmdParseError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Sequence {
    /// Load a sequence from the given path.
    ///
    /// If `labware` is given it is added to every plate and lid step which doesn't specify its own.
    pub fn load<P: AsRef<Path>>(path: P, labware: Option<&str>) -> Result<Self, SequenceError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(SequenceError::FileNotFound(path));
        }

        let json_str = fs::read_to_string(&path).map_err(SequenceError::LoadError)?;

        let cmds = Self::parse(&json_str, labware)?;

        Ok(Self { path, cmds })
    }

    /// Parse the contents of a sequence file.
    pub fn parse(json_str: &str, labware: Option<&str>) -> Result<Vec<ArmCmd>, SequenceError> {
        let records: Vec<CmdRecord> =
            serde_json::from_str(json_str).map_err(SequenceError::InvalidJson)?;

        records
            .into_iter()
            .enumerate()
            .map(|(i, mut record)| {
                if let Some(labware) = labware {
                    inject_labware(&mut record, labware);
                }

                ArmCmd::from_record(&record.command, record.params)
                    .map_err(|e| SequenceError::InvalidCmd(i, e))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Set the labware of a record if it accepts one and doesn't already have one.
fn inject_labware(record: &mut CmdRecord, labware: &str) {
    if !LABWARE_COMMANDS.contains(&record.command.as_str()) {
        return;
    }

    if record.params.is_null() {
        record.params = Value::Object(Default::default());
    }

    if let Some(params) = record.params.as_object_mut() {
        let missing = match params.get("labware") {
            None | Some(Value::Null) => true,
            Some(_) => false,
        };

        if missing {
            params.insert("labware".into(), Value::String(labware.into()));
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::cmd::{PickLidParams, RetrievePlateParams};

    const SEQ: &str = r#"[
        {"command": "retrieve_plate", "params": {"nest": "hotel_1"}},
        {"command": "pick_lid", "params": {"nest": "lid_nest", "labware": "own_lid"}},
        {"command": "move", "params": {"waypoint": "safe_1"}},
        {"command": "unwind"}
    ]"#;

    #[test]
    fn test_labware_injection() {
        let cmds = Sequence::parse(SEQ, Some("greiner_96")).unwrap();

        assert_eq!(cmds.len(), 4);

        match &cmds[0] {
            ArmCmd::RetrievePlate(RetrievePlateParams { labware, .. }) => {
                assert_eq!(labware.as_deref(), Some("greiner_96"))
            }
            c => panic!("Unexpected command {:?}", c),
        }

        // Existing labware is kept
        match &cmds[1] {
            ArmCmd::PickLid(PickLidParams { labware, .. }) => assert_eq!(labware, "own_lid"),
            c => panic!("Unexpected command {:?}", c),
        }

        // Without injection the retrieve has no labware
        let cmds = Sequence::parse(SEQ, None).unwrap();
        match &cmds[0] {
            ArmCmd::RetrievePlate(p) => assert!(p.labware.is_none()),
            c => panic!("Unexpected command {:?}", c),
        }
    }

    #[test]
    fn test_invalid_sequences() {
        let bad = r#"[
            {"command": "move", "params": {"waypoint": "safe_1"}},
            {"command": "fly", "params": {}}
        ]"#;

        match Sequence::parse(bad, None) {
            Err(SequenceError::InvalidCmd(1, CmdParseError::UnknownCommand(n))) => {
                assert_eq!(n, "fly")
            }
            r => panic!("Expected an invalid command error, got {:?}", r),
        }

        assert!(matches!(
            Sequence::parse("{\"command\": \"move\"}", None),
            Err(SequenceError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_empty_sequence() {
        assert!(Sequence::parse("[]", Some("greiner_96")).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file() {
        match Sequence::load("/no/such/sequence.json", None) {
            Err(SequenceError::FileNotFound(p)) => {
                assert_eq!(p, PathBuf::from("/no/such/sequence.json"))
            }
            r => panic!("Expected a file not found error, got {:?}", r),
        }
    }

    #[test]
    fn test_demo_sequences() {
        let delid = include_str!("../../sequences/demo/delid.json");

        assert_eq!(Sequence::parse(delid, Some("greiner_96")).unwrap().len(), 3);

        // The lid commands can't be parsed without a labware
        assert!(matches!(
            Sequence::parse(delid, None),
            Err(SequenceError::InvalidCmd(0, CmdParseError::InvalidParams(..)))
        ));

        let read_plate = include_str!("../../sequences/demo/read_plate.json");
        assert_eq!(Sequence::parse(read_plate, None).unwrap().len(), 3);
    }
}

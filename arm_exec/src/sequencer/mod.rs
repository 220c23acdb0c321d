//! # Command interpreter
//!
//! The interpreter owns the configuration of the current workcell and the driver of the arm, and
//! processes one command at a time. Commands are first planned into [`Primitive`] steps, which
//! catches every lookup and validation problem before the arm moves, then executed in order. The
//! first failing step aborts the command, nothing is rolled back.
//!
//! The tool goes through the states:
//!
//! ```text
//! Unconfigured --configure--> Ready --command--> Busy --done--> Ready
//!                               |
//!                               +--initialise fails--> Failed --configure--> ...
//! ```

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod error;
mod exec;
mod plan;

pub use error::CmdError;
pub use plan::{CmdPlanner, Primitive, MAX_SEQUENCE_DEPTH};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::cmd::ArmCmd;
use log::{info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::driver::{DriverParams, Pf400Driver};
use crate::labware::LabwareCatalog;
use crate::transport::{ControllerChannel, SimController, TcpTransport, Transport, TransportError};
use crate::waypoints::WaypointStore;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Opens the link to the controller, called on every (re)configuration.
pub trait Connector: Send {
    fn connect(&mut self) -> Result<Box<dyn Transport>, TransportError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Connects to a controller over TCP.
pub struct TcpConnector {
    pub address: String,
    pub connect_timeout: Duration,
}

/// Connects to a simulated controller.
pub struct SimConnector {
    pub sim: SimController,
}

/// Parameters of the interpreter.
#[derive(Debug, Clone)]
pub struct InterpreterParams {
    /// Directory holding `<workcell>.json` configuration files
    pub workcells_dir: PathBuf,

    /// Directory holding one directory of sequence files per workcell
    pub sequences_dir: PathBuf,

    pub max_read_attempts: u32,

    pub driver: DriverParams,
}

pub struct CmdInterpreter {
    params: InterpreterParams,

    connector: Box<dyn Connector>,

    catalog: Box<dyn LabwareCatalog>,

    state: ToolState,

    session: Option<ArmSession>,
}

/// Everything derived from one configuration of the tool.
struct ArmSession {
    workcell: String,

    store: WaypointStore,

    driver: Pf400Driver,

    /// Graph node the arm was last moved to, `None` when unknown
    current_node: Option<String>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// State of the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolState {
    Unconfigured,
    Ready,
    Busy,
    Failed,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Connector for TcpConnector {
    fn connect(&mut self) -> Result<Box<dyn Transport>, TransportError> {
        info!("Connecting to the controller at {}", self.address);
        Ok(Box::new(TcpTransport::connect(
            &self.address,
            self.connect_timeout,
        )?))
    }
}

impl Connector for SimConnector {
    fn connect(&mut self) -> Result<Box<dyn Transport>, TransportError> {
        info!("Using the simulated controller");
        Ok(Box::new(self.sim.clone()))
    }
}

impl CmdInterpreter {
    pub fn new(
        params: InterpreterParams,
        connector: Box<dyn Connector>,
        catalog: Box<dyn LabwareCatalog>,
    ) -> Self {
        Self {
            params,
            connector,
            catalog,
            state: ToolState::Unconfigured,
            session: None,
        }
    }

    pub fn state(&self) -> ToolState {
        self.state
    }

    /// Name of the configured workcell.
    pub fn workcell(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.workcell.as_str())
    }

    /// Load a workcell's configuration, (re)connect to the controller and initialise the arm.
    ///
    /// The previous configuration and connection are dropped first. A configuration which can't
    /// be loaded leaves the tool `Unconfigured`, a failure to connect or initialise leaves it
    /// `Failed`.
    pub fn configure(&mut self, workcell: &str) -> Result<(), CmdError> {
        if workcell.trim().is_empty() {
            return Err(CmdError::Validation(String::from("The workcell name is empty")));
        }

        info!("Configuring workcell \"{}\"", workcell);

        self.session = None;
        self.set_state(ToolState::Unconfigured);

        let path = self.params.workcells_dir.join(format!("{}.json", workcell));
        let store = WaypointStore::load(&path).map_err(|e| {
            warn!("Could not load the workcell configuration: {}", e);
            CmdError::from(e)
        })?;

        let driver = match self.connect(&store) {
            Ok(d) => d,
            Err(e) => {
                warn!("Could not initialise the arm: {}", e);
                self.set_state(ToolState::Failed);
                return Err(e);
            }
        };

        self.session = Some(ArmSession {
            workcell: workcell.to_string(),
            store,
            driver,
            current_node: None,
        });
        self.set_state(ToolState::Ready);

        Ok(())
    }

    /// Process a single command, returning the payload of the reply.
    pub fn handle(&mut self, cmd: &ArmCmd) -> Result<Option<Value>, CmdError> {
        match cmd {
            ArmCmd::Configure(p) => return self.configure(&p.workcell).map(|_| None),
            ArmCmd::GetState => return Ok(Some(self.state_payload())),
            _ => (),
        }

        if self.state != ToolState::Ready {
            return Err(CmdError::NotReady(self.state));
        }

        let session = match self.session.as_mut() {
            Some(s) => s,
            None => return Err(CmdError::NotReady(ToolState::Unconfigured)),
        };

        match cmd {
            ArmCmd::GetTeachpoints => return Ok(Some(session.store.teachpoints())),
            ArmCmd::GetCurrentLocation => {
                let joint = session.driver.where_joint()?;
                let cartesian = session.driver.where_cartesian()?;
                return Ok(Some(json!({
                    "joint": joint,
                    "cartesian": cartesian,
                    "node": session.current_node,
                })));
            }
            _ => (),
        }

        info!("Executing {}", cmd.name());

        let steps = self.plan(cmd).map_err(|e| {
            warn!("Rejected {}: {}", cmd.name(), e);
            e
        })?;

        self.set_state(ToolState::Busy);

        let result = match self.session.as_mut() {
            Some(s) => exec::execute(&mut s.driver, &mut s.current_node, &steps),
            None => Err(CmdError::NotReady(ToolState::Unconfigured)),
        };

        self.set_state(ToolState::Ready);

        match result {
            Ok(()) => {
                info!("Completed {} ({} steps)", cmd.name(), steps.len());
                Ok(None)
            }
            Err(e) => {
                warn!("{} failed: {}", cmd.name(), e);
                Err(e)
            }
        }
    }

    /// Expand a command into its steps without running any of them.
    pub fn plan(&self, cmd: &ArmCmd) -> Result<Vec<Primitive>, CmdError> {
        let session = match self.session.as_ref() {
            Some(s) => s,
            None => return Err(CmdError::NotReady(self.state)),
        };

        let sequences_dir = self.params.sequences_dir.join(&session.workcell);
        let mut planner = CmdPlanner::new(
            &session.store,
            self.catalog.as_ref(),
            &sequences_dir,
            session.current_node.clone(),
        );

        planner.plan(cmd)
    }

    fn connect(&mut self, store: &WaypointStore) -> Result<Pf400Driver, CmdError> {
        let transport = self.connector.connect()?;
        let channel = ControllerChannel::new(transport, self.params.max_read_attempts);
        let mut driver = Pf400Driver::new(channel, self.params.driver);

        driver.initialize(store.motion_profiles())?;

        Ok(driver)
    }

    fn state_payload(&mut self) -> Value {
        let state = self.state;

        match self.session.as_mut() {
            Some(s) => json!({
                "tool_state": state,
                "workcell": s.workcell,
                "robot_state": s.driver.state(),
                "current_node": s.current_node,
                "joint": s.driver.poll_joint(),
            }),
            None => json!({ "tool_state": state }),
        }
    }

    fn set_state(&mut self, state: ToolState) {
        if self.state != state {
            info!("Tool state {} -> {}", self.state, state);
            self.state = state;
        }
    }
}

impl fmt::Display for ToolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToolState::Unconfigured => "unconfigured",
            ToolState::Ready => "ready",
            ToolState::Busy => "busy",
            ToolState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::labware::{JsonLabwareCatalog, TEST_LABWARE};
    use crate::location::Location;
    use crate::waypoints::TEST_WORKCELL;
    use comms_if::cmd::{
        ApproachParams, ConfigureParams, GraspParams, MoveParams, PickLidParams, ReleaseParams,
        RetrievePlateParams, RunSequenceParams, TransferParams, DEFAULT_MOTION_PROFILE_ID,
    };
    use std::fs;
    use std::path::Path;

    /// Scratch directory holding a `test` workcell and its sequences.
    fn scratch_dir(name: &str, workcell_json: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("arm_exec_{}_{}", std::process::id(), name));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("sequences").join("test")).unwrap();
        fs::write(dir.join("test.json"), workcell_json).unwrap();
        dir
    }

    fn write_sequence(dir: &Path, name: &str, json_str: &str) {
        fs::write(
            dir.join("sequences").join("test").join(format!("{}.json", name)),
            json_str,
        )
        .unwrap();
    }

    fn interpreter(dir: &Path) -> (CmdInterpreter, SimController) {
        let sim = SimController::new();
        let params = InterpreterParams {
            workcells_dir: dir.to_path_buf(),
            sequences_dir: dir.join("sequences"),
            max_read_attempts: 3,
            driver: DriverParams {
                read_timeout: Duration::from_secs(1),
                init_timeout: Duration::from_secs(1),
            },
        };
        let interp = CmdInterpreter::new(
            params,
            Box::new(SimConnector { sim: sim.clone() }),
            Box::new(JsonLabwareCatalog::from_json(TEST_LABWARE).unwrap()),
        );

        (interp, sim)
    }

    fn configured(name: &str) -> (CmdInterpreter, SimController, PathBuf) {
        let dir = scratch_dir(name, TEST_WORKCELL);
        let (mut interp, sim) = interpreter(&dir);
        interp.configure("test").unwrap();
        sim.clear_sent();
        (interp, sim, dir)
    }

    fn transfer(src: &str, dst: &str) -> TransferParams {
        TransferParams {
            source_nest: src.into(),
            destination_nest: dst.into(),
            motion_profile_id: DEFAULT_MOTION_PROFILE_ID,
            grasp_params: None,
            release_params: None,
            grip_width: None,
            labware: None,
        }
    }

    fn move_targets(steps: &[Primitive]) -> Vec<(Option<String>, Location)> {
        steps
            .iter()
            .filter_map(|s| match s {
                Primitive::MoveTo { target, node, .. } => Some((node.clone(), target.clone())),
                _ => None,
            })
            .collect()
    }

    fn step_names(steps: &[Primitive]) -> Vec<String> {
        steps
            .iter()
            .map(|s| match s {
                Primitive::MoveTo { node, .. } => {
                    format!("move:{}", node.as_deref().unwrap_or("?"))
                }
                Primitive::Grasp(_) => String::from("grasp"),
                Primitive::Release(_) => String::from("release"),
                Primitive::Wait(_) => String::from("wait"),
                other => other.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_configure() {
        let dir = scratch_dir("configure", TEST_WORKCELL);
        let (mut interp, sim) = interpreter(&dir);

        assert_eq!(interp.state(), ToolState::Unconfigured);
        assert!(matches!(
            interp.handle(&ArmCmd::Home),
            Err(CmdError::NotReady(ToolState::Unconfigured))
        ));

        interp
            .handle(&ArmCmd::Configure(ConfigureParams {
                workcell: "test".into(),
            }))
            .unwrap();
        assert_eq!(interp.state(), ToolState::Ready);
        assert_eq!(interp.workcell(), Some("test"));

        let sent = sim.sent_commands();
        assert_eq!(&sent[..3], &["mode 0", "hp 1 30", "attach 1"]);
        assert_eq!(sent.iter().filter(|c| c.starts_with("profile")).count(), 2);

        // Unknown workcell
        assert!(matches!(
            interp.configure("nowhere"),
            Err(CmdError::Configuration(_))
        ));
        assert_eq!(interp.state(), ToolState::Unconfigured);
    }

    #[test]
    fn test_configure_missing_grip_params() {
        let workcell = TEST_WORKCELL.replace(
            r#""portrait": {"width": 86, "force": 15, "speed": 10},"#,
            "",
        );
        let dir = scratch_dir("missing_grip", &workcell);
        let (mut interp, sim) = interpreter(&dir);

        assert!(matches!(
            interp.configure("test"),
            Err(CmdError::Configuration(_))
        ));
        assert_ne!(interp.state(), ToolState::Ready);
        assert!(sim.sent().is_empty());
    }

    #[test]
    fn test_configure_initialise_failure() {
        let dir = scratch_dir("init_failure", TEST_WORKCELL);
        let (mut interp, sim) = interpreter(&dir);

        sim.script("hp", &["-1046 Power disabled"]);

        assert!(matches!(
            interp.configure("test"),
            Err(CmdError::PhysicalState { code: -1046, .. })
        ));
        assert_eq!(interp.state(), ToolState::Failed);
        assert!(matches!(
            interp.handle(&ArmCmd::Unwind),
            Err(CmdError::NotReady(ToolState::Failed))
        ));

        // Reconfiguring recovers
        interp.configure("test").unwrap();
        assert_eq!(interp.state(), ToolState::Ready);
    }

    #[test]
    fn test_configure_homes_if_needed() {
        let dir = scratch_dir("homing", TEST_WORKCELL);
        let (mut interp, sim) = interpreter(&dir);

        sim.script("attach", &["-1021 Robot not homed"]);

        interp.configure("test").unwrap();

        let sent = sim.sent_commands();
        assert_eq!(&sent[..5], &["mode 0", "hp 1 30", "attach 1", "home", "attach 1"]);
    }

    #[test]
    fn test_transfer_steps() {
        let (interp, _sim, _dir) = configured("transfer_steps");

        let steps = interp.plan(&ArmCmd::Transfer(transfer("A", "B"))).unwrap();

        assert_eq!(
            step_names(&steps),
            vec![
                "move:safe1", "release", "move:A", "move:A", "move:A", "grasp", "move:A",
                "move:A", "move:A", "move:safe1", "move:safe2", "move:B", "move:B", "release",
                "move:B", "move:B", "move:safe2",
            ]
        );

        // Orientation defaults
        assert_eq!(
            steps[1],
            Primitive::Release(ReleaseParams {
                width: 133.0,
                speed: 20.0
            })
        );
        assert_eq!(
            steps[5],
            Primitive::Grasp(GraspParams {
                width: 123.0,
                force: 10.0,
                speed: 20.0
            })
        );

        // Approach walks the path from the outside in, leave from the nest out
        let moves = move_targets(&steps);
        let heights: Vec<f64> = moves[1..7].iter().map(|(_, l)| l.values[2]).collect();
        assert_eq!(heights, vec![160.0, 120.0, 100.0, 100.0, 120.0, 160.0]);

        // The return to the safe point uses the holding profile
        match &steps[9] {
            Primitive::MoveTo {
                motion_profile_id, ..
            } => assert_eq!(*motion_profile_id, 2),
            s => panic!("Expected a move, got {}", s),
        }
    }

    #[test]
    fn test_transfer_controller_order() {
        let (mut interp, sim, _dir) = configured("transfer_order");

        interp.handle(&ArmCmd::Transfer(transfer("A", "B"))).unwrap();
        assert_eq!(interp.state(), ToolState::Ready);

        let words: Vec<String> = sim
            .sent_commands()
            .iter()
            .map(|c| c.split_whitespace().next().unwrap_or("").to_string())
            .collect();
        assert_eq!(
            words,
            vec![
                "movec", "releaseplate", "movec", "movec", "movec", "graspplate", "movec",
                "movec", "movec", "movec", "movec", "movec", "movec", "releaseplate", "movec",
                "movec", "movec",
            ]
        );

        // Every command is followed by a wait for the end of the motion
        let sent = sim.sent();
        assert_eq!(sent.len(), 2 * words.len());
        assert!(sent.iter().skip(1).step_by(2).all(|l| l == "waitForEom"));
    }

    #[test]
    fn test_transfer_orientation_mismatch() {
        let (mut interp, sim, _dir) = configured("orientation");

        assert!(matches!(
            interp.handle(&ArmCmd::Transfer(transfer("A", "P"))),
            Err(CmdError::Validation(_))
        ));
        assert!(sim.sent().is_empty());
        assert_eq!(interp.state(), ToolState::Ready);
    }

    #[test]
    fn test_unknown_names_fail_before_motion() {
        let (mut interp, sim, _dir) = configured("unknown_names");

        assert!(matches!(
            interp.handle(&ArmCmd::Transfer(transfer("A", "Z"))),
            Err(CmdError::Lookup(_))
        ));
        assert!(matches!(
            interp.handle(&ArmCmd::Move(MoveParams {
                waypoint: "nowhere".into(),
                motion_profile_id: 1
            })),
            Err(CmdError::Lookup(_))
        ));

        let mut p = transfer("A", "B");
        p.labware = Some("mystery_plate".into());
        assert!(matches!(
            interp.handle(&ArmCmd::Transfer(p)),
            Err(CmdError::Lookup(_))
        ));

        assert!(sim.sent().is_empty());
    }

    #[test]
    fn test_bad_numbers_fail_before_motion() {
        let (mut interp, sim, _dir) = configured("bad_numbers");

        // Longer than a Duration can hold
        let wait = ArmCmd::from_json(r#"{"command": "wait", "params": {"duration_s": 1e20}}"#)
            .unwrap();
        assert!(matches!(interp.handle(&wait), Err(CmdError::Validation(_))));

        let wait = ArmCmd::from_json(r#"{"command": "wait", "params": {"duration_s": -1}}"#)
            .unwrap();
        assert!(matches!(interp.handle(&wait), Err(CmdError::Validation(_))));

        assert!(matches!(
            interp.handle(&ArmCmd::Approach(ApproachParams {
                nest: "A".into(),
                x_offset: 0.0,
                y_offset: f64::NAN,
                z_offset: 0.0,
                motion_profile_id: 1,
                ignore_safepath: false,
            })),
            Err(CmdError::Validation(_))
        ));

        assert!(matches!(
            interp.handle(&ArmCmd::RetrievePlate(RetrievePlateParams {
                nest: "A".into(),
                grasp_params: None,
                x_offset: 0.0,
                y_offset: 0.0,
                z_offset: f64::INFINITY,
                motion_profile_id: 1,
                grip_width: None,
                labware: None,
            })),
            Err(CmdError::Validation(_))
        ));

        assert!(sim.sent().is_empty());
        assert_eq!(interp.state(), ToolState::Ready);

        // A plain wait still runs
        let wait = ArmCmd::from_json(r#"{"command": "wait", "params": {"duration_s": 0.01}}"#)
            .unwrap();
        interp.handle(&wait).unwrap();
    }

    #[test]
    fn test_transfer_aborts_on_failed_grasp() {
        let (mut interp, sim, _dir) = configured("failed_grasp");

        sim.script("graspplate", &["0 0"]);

        assert!(matches!(
            interp.handle(&ArmCmd::Transfer(transfer("A", "B"))),
            Err(CmdError::Response(_))
        ));

        let sent = sim.sent_commands();
        assert!(sent[sent.len() - 1].starts_with("graspplate"));
        assert_eq!(interp.state(), ToolState::Ready);
    }

    #[test]
    fn test_hotel_transfer() {
        let (interp, _sim, _dir) = configured("hotel");

        let names = step_names(&interp.plan(&ArmCmd::Transfer(transfer("hotel_3", "B"))).unwrap());

        assert_eq!(names[0], "move:middle_safe");
        assert_eq!(names[1], "move:safe1");
        let retrieve_end = names.iter().position(|n| n == "grasp").unwrap() + 3;
        assert_eq!(names[retrieve_end], "move:safe1");
        assert_eq!(names[retrieve_end + 1], "move:middle_safe");
        assert_eq!(names[retrieve_end + 2], "move:safe2");
    }

    #[test]
    fn test_retrieve_explicit_params() {
        let (interp, _sim, _dir) = configured("retrieve_params");

        let steps = interp
            .plan(&ArmCmd::RetrievePlate(RetrievePlateParams {
                nest: "B".into(),
                grasp_params: Some(GraspParams {
                    width: 120.0,
                    force: 5.0,
                    speed: 5.0,
                }),
                x_offset: 0.0,
                y_offset: 0.0,
                z_offset: 5.0,
                motion_profile_id: 1,
                grip_width: Some(140.0),
                labware: Some("greiner_96".into()),
            }))
            .unwrap();

        assert_eq!(
            steps[1],
            Primitive::Release(ReleaseParams {
                width: 140.0,
                speed: 20.0
            })
        );
        assert!(steps.contains(&Primitive::Grasp(GraspParams {
            width: 120.0,
            force: 5.0,
            speed: 5.0
        })));

        // B is at z 110 with a single 50 mm checkpoint, offset by 5 mm
        let heights: Vec<f64> = move_targets(&steps)[1..5]
            .iter()
            .map(|(_, l)| l.values[2])
            .collect();
        assert_eq!(heights, vec![165.0, 115.0, 115.0, 165.0]);
    }

    #[test]
    fn test_smart_transfer() {
        let (mut interp, _sim, _dir) = configured("smart_transfer");

        // No known position, straight to the retrieve
        let steps = interp.plan(&ArmCmd::SmartTransfer(transfer("A", "B"))).unwrap();
        let names = step_names(&steps);
        assert_eq!(names[0], "move:safe1");

        // From safe2 the route to safe1 goes through the hub, and the loaded leg back too
        interp
            .handle(&ArmCmd::Move(MoveParams {
                waypoint: "safe2".into(),
                motion_profile_id: 1,
            }))
            .unwrap();
        let steps = interp.plan(&ArmCmd::SmartTransfer(transfer("A", "B"))).unwrap();
        let names = step_names(&steps);
        assert_eq!(names[0], "move:hub");
        assert_eq!(names[1], "move:safe1");
        // Three moves out of A, back to safe1, then the hub
        let grasp = names.iter().position(|n| n == "grasp").unwrap();
        assert_eq!(names[grasp + 4], "move:safe1");
        assert_eq!(names[grasp + 5], "move:hub");
        assert_eq!(names[grasp + 6], "move:safe2");
        assert_eq!(names.last().unwrap(), "move:safe2");
    }

    #[test]
    fn test_smart_transfer_no_path() {
        let workcell = TEST_WORKCELL.replace(r#"["hub", "safe2"],"#, "");
        let dir = scratch_dir("smart_no_path", &workcell);
        let (mut interp, sim) = interpreter(&dir);
        interp.configure("test").unwrap();
        sim.clear_sent();

        assert!(matches!(
            interp.handle(&ArmCmd::SmartTransfer(transfer("A", "B"))),
            Err(CmdError::PathNotFound { .. })
        ));
        assert!(sim.sent().is_empty());
    }

    #[test]
    fn test_smart_transfer_maneuvers() {
        let workcell = TEST_WORKCELL.replacen(
            r#""holding_motion_profile_id""#,
            r#""special_maneuvers": [
                {
                    "nest_prefix": "hotel",
                    "commands": [{"command": "move", "params": {"waypoint": "middle_safe"}}]
                }
            ],
            "holding_motion_profile_id""#,
            1,
        );
        let dir = scratch_dir("smart_maneuvers", &workcell);
        let (mut interp, _sim) = interpreter(&dir);
        interp.configure("test").unwrap();

        let steps = interp
            .plan(&ArmCmd::SmartTransfer(transfer("hotel_3", "A")))
            .unwrap();
        let names = step_names(&steps);
        // Two moves out of the hotel, back to safe1, then the maneuver
        let grasp = names.iter().position(|n| n == "grasp").unwrap();
        assert_eq!(names[grasp + 3], "move:safe1");
        assert_eq!(names[grasp + 4], "move:middle_safe");
    }

    #[test]
    fn test_run_sequence() {
        let (mut interp, sim, dir) = configured("sequence");

        write_sequence(
            &dir,
            "to_b",
            r#"[
                {"command": "move", "params": {"waypoint": "safe2"}},
                {"command": "dropoff_plate", "params": {"nest": "B"}},
                {"command": "wait", "params": {"duration_s": 0.0}}
            ]"#,
        );
        write_sequence(
            &dir,
            "loop",
            r#"[{"command": "run_sequence", "params": {"sequence_name": "loop"}}]"#,
        );
        write_sequence(
            &dir,
            "reconfigure",
            r#"[{"command": "configure", "params": {"workcell": "test"}}]"#,
        );
        write_sequence(
            &dir,
            "bad_second",
            r#"[
                {"command": "move", "params": {"waypoint": "safe2"}},
                {"command": "move", "params": {"waypoint": "nowhere"}}
            ]"#,
        );

        let run = |name: &str, labware: Option<&str>| {
            ArmCmd::RunSequence(RunSequenceParams {
                sequence_name: name.into(),
                labware: labware.map(String::from),
            })
        };

        interp.handle(&run("to_b", Some("greiner_96"))).unwrap();
        assert_eq!(sim.sent_commands().len(), 8);

        sim.clear_sent();
        assert!(matches!(
            interp.handle(&run("missing", None)),
            Err(CmdError::Configuration(_))
        ));
        assert!(matches!(
            interp.handle(&run("loop", None)),
            Err(CmdError::Validation(_))
        ));
        assert!(matches!(
            interp.handle(&run("reconfigure", None)),
            Err(CmdError::Validation(_))
        ));

        // Injected labware must exist
        assert!(matches!(
            interp.handle(&run("to_b", Some("mystery_plate"))),
            Err(CmdError::Lookup(_))
        ));

        // Every step is checked before the first one moves
        assert!(matches!(
            interp.handle(&run("bad_second", None)),
            Err(CmdError::Lookup(_))
        ));
        assert!(sim.sent().is_empty());
    }

    #[test]
    fn test_pick_lid() {
        let (interp, _sim, _dir) = configured("pick_lid");

        let steps = interp
            .plan(&ArmCmd::PickLid(PickLidParams {
                nest: "B".into(),
                labware: "greiner_96".into(),
                motion_profile_id: 1,
                pick_from_plate: true,
            }))
            .unwrap();

        assert_eq!(
            step_names(&steps),
            vec!["release", "move:B", "move:B", "grasp", "move:B"]
        );

        // Grip at 14 - 4 = 10 mm above the nest, depart 14 mm above that
        let heights: Vec<f64> = move_targets(&steps).iter().map(|(_, l)| l.values[2]).collect();
        assert_eq!(heights, vec![134.0, 120.0, 134.0]);

        assert!(matches!(
            interp.plan(&ArmCmd::PickLid(PickLidParams {
                nest: "B".into(),
                labware: "mystery_plate".into(),
                motion_profile_id: 1,
                pick_from_plate: true,
            })),
            Err(CmdError::Lookup(_))
        ));
    }

    #[test]
    fn test_free_and_unwind() {
        let (mut interp, sim, _dir) = configured("free_unwind");

        interp
            .handle(&ArmCmd::Free(comms_if::cmd::FreeParams {
                axis: 0,
                keep_gripper: false,
            }))
            .unwrap();
        assert_eq!(sim.sent_commands(), vec!["freemode 0"]);

        // Unwinding leaves free mode first and keeps the current height
        sim.clear_sent();
        interp.handle(&ArmCmd::Unwind).unwrap();
        let sent = sim.sent_commands();
        assert_eq!(sent[0], "wherej");
        assert_eq!(sent[1], "freemode -1");
        assert!(sent[2].starts_with("movej 1 400.000 10.000 170.000 0.000 120.000"));

        assert!(matches!(
            interp.handle(&ArmCmd::Jog(comms_if::cmd::JogParams {
                axis: "w".into(),
                distance: 5.0
            })),
            Err(CmdError::Validation(_))
        ));
    }

    #[test]
    fn test_queries() {
        let (mut interp, _sim, _dir) = configured("queries");

        let teachpoints = interp.handle(&ArmCmd::GetTeachpoints).unwrap().unwrap();
        assert!(teachpoints["nests"].get("A").is_some());

        interp
            .handle(&ArmCmd::Move(MoveParams {
                waypoint: "hub".into(),
                motion_profile_id: 1,
            }))
            .unwrap();
        let location = interp.handle(&ArmCmd::GetCurrentLocation).unwrap().unwrap();
        assert_eq!(location["node"], "hub");

        let state = interp.handle(&ArmCmd::GetState).unwrap().unwrap();
        assert_eq!(state["tool_state"], "ready");
        assert_eq!(state["current_node"], "hub");
    }
}

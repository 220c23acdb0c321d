//! # Waypoint and topology store
//!
//! Holds the taught configuration of one workcell: named locations, nests, motion profiles, the
//! grip parameters for each plate orientation, and the graph connecting the named points. The
//! store is loaded once from the workcell's JSON file and is read-only afterwards; reconfiguring
//! replaces it wholesale.
//!
//! Loading fails before anything is used if the file is malformed, either orientation's grip
//! parameters are missing, or the graph refers to a point that doesn't exist.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod config;

pub use config::{GripParams, Nest, Orientation, OrientationGripParams, RELEASE_CLEARANCE_MM};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::cmd::{ArmCmd, CmdParseError, GraspParams, MotionProfile, ReleaseParams};
use log::debug;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::location::{Location, LocationError};
use crate::planner::{is_wait_node, TopologyGraph};
use config::WorkcellFile;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The taught configuration of a workcell.
#[derive(Debug, Clone)]
pub struct WaypointStore {
    locations: HashMap<String, Location>,

    nests: HashMap<String, Nest>,

    motion_profiles: Vec<MotionProfile>,

    grip_params: GripParams,

    graph: TopologyGraph,

    holding_motion_profile_id: Option<i32>,

    special_maneuvers: Vec<SpecialManeuver>,
}

/// Extra commands run when a transfer starts or ends at a nest whose name has the given prefix.
#[derive(Debug, Clone)]
pub struct SpecialManeuver {
    pub nest_prefix: String,
    pub commands: Vec<ArmCmd>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised while loading a workcell configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not find the workcell configuration at {0:?}")]
    FileNotFound(PathBuf),

    #[error("Could not read the workcell configuration: {0}")]
    LoadError(std::io::Error),

    #[error("The workcell configuration is invalid: {0}")]
    InvalidJson(serde_json::Error),

    #[error("The workcell configuration has no {0} grip parameters")]
    MissingGripParams(Orientation),

    #[error("Graph edge ({0}, {1}) refers to an unknown point")]
    UnknownEdgeEndpoint(String, String),

    #[error("Nest {nest} has an unknown safe location \"{safe_loc}\"")]
    UnknownSafeLoc { nest: String, safe_loc: String },

    #[error("The special maneuver for \"{0}\" is invalid: {1}")]
    InvalidManeuver(String, CmdParseError),
}

/// A command referred to something that isn't configured.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LookupError {
    #[error("Unknown waypoint \"{0}\"")]
    UnknownWaypoint(String),

    #[error("Unknown nest \"{0}\"")]
    UnknownNest(String),

    #[error("Unknown labware \"{0}\"")]
    UnknownLabware(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl WaypointStore {
    /// Load a workcell configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let json_str = fs::read_to_string(path).map_err(ConfigError::LoadError)?;

        Self::from_json(&json_str)
    }

    /// Build a store from the contents of a workcell configuration file.
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        let file: WorkcellFile = serde_json::from_str(json_str).map_err(ConfigError::InvalidJson)?;

        let grip_params = GripParams {
            portrait: file
                .grip_params
                .portrait
                .ok_or(ConfigError::MissingGripParams(Orientation::Portrait))?,
            landscape: file
                .grip_params
                .landscape
                .ok_or(ConfigError::MissingGripParams(Orientation::Landscape))?,
        };

        for (name, nest) in &file.nests {
            if !file.locations.contains_key(&nest.safe_loc) {
                return Err(ConfigError::UnknownSafeLoc {
                    nest: name.clone(),
                    safe_loc: nest.safe_loc.clone(),
                });
            }
        }

        // Every named point is a node, edges may also pass through wait nodes
        let mut graph = TopologyGraph::new();
        for name in file.locations.keys().chain(file.nests.keys()) {
            graph.add_node(name);
        }
        for (a, b) in &file.graph_edges {
            let known = |n: &String| {
                file.locations.contains_key(n) || file.nests.contains_key(n) || is_wait_node(n)
            };
            if !known(a) || !known(b) {
                return Err(ConfigError::UnknownEdgeEndpoint(a.clone(), b.clone()));
            }
            graph.add_edge(a, b);
        }

        let special_maneuvers = file
            .special_maneuvers
            .into_iter()
            .map(|m| {
                let nest_prefix = &m.nest_prefix;
                let commands = m
                    .commands
                    .into_iter()
                    .map(|r| ArmCmd::from_record(&r.command, r.params))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| ConfigError::InvalidManeuver(nest_prefix.clone(), e))?;

                Ok(SpecialManeuver {
                    nest_prefix: m.nest_prefix,
                    commands,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        debug!(
            "Loaded {} locations, {} nests, {} motion profiles and {} graph edges",
            file.locations.len(),
            file.nests.len(),
            file.motion_profiles.len(),
            file.graph_edges.len()
        );

        Ok(Self {
            locations: file.locations,
            nests: file.nests,
            motion_profiles: file.motion_profiles,
            grip_params,
            graph,
            holding_motion_profile_id: file.holding_motion_profile_id,
            special_maneuvers,
        })
    }

    pub fn location(&self, name: &str) -> Result<&Location, LookupError> {
        self.locations
            .get(name)
            .ok_or_else(|| LookupError::UnknownWaypoint(name.to_string()))
    }

    pub fn nest(&self, name: &str) -> Result<&Nest, LookupError> {
        self.nests
            .get(name)
            .ok_or_else(|| LookupError::UnknownNest(name.to_string()))
    }

    pub fn is_nest(&self, name: &str) -> bool {
        self.nests.contains_key(name)
    }

    pub fn is_location(&self, name: &str) -> bool {
        self.locations.contains_key(name)
    }

    /// Resolve a waypoint name, which may be either a location or a nest.
    pub fn resolve(&self, name: &str) -> Result<&Location, LookupError> {
        match (self.locations.get(name), self.nests.get(name)) {
            (Some(l), _) => Ok(l),
            (None, Some(n)) => Ok(&n.loc),
            (None, None) => Err(LookupError::UnknownWaypoint(name.to_string())),
        }
    }

    /// Default grasp parameters for plates in the given orientation.
    pub fn grasp_params(&self, orientation: Orientation) -> GraspParams {
        self.grip_params.get(orientation).grasp()
    }

    /// Default release parameters for plates in the given orientation.
    pub fn release_params(&self, orientation: Orientation) -> ReleaseParams {
        self.grip_params.get(orientation).release()
    }

    /// Locations along the approach path of a nest.
    ///
    /// The first entry is the (offset) nest location itself, followed by each checkpoint of the
    /// approach path added to it. Approaching walks the list backwards, leaving walks it forwards.
    pub fn nest_approach_path(
        &self,
        nest_name: &str,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<Vec<Location>, NestPathError> {
        let nest = self.nest(nest_name)?;
        let base = nest.loc.offset(x, y, z)?;

        let mut path = Vec::with_capacity(nest.approach_path.len() + 1);
        for checkpoint in &nest.approach_path {
            path.push(base.checked_add(checkpoint)?);
        }
        path.insert(0, base);

        Ok(path)
    }

    pub fn motion_profiles(&self) -> &[MotionProfile] {
        &self.motion_profiles
    }

    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    pub fn holding_motion_profile_id(&self) -> Option<i32> {
        self.holding_motion_profile_id
    }

    /// Special maneuvers matching a nest name.
    pub fn maneuvers_for<'a>(
        &'a self,
        nest_name: &'a str,
    ) -> impl Iterator<Item = &'a SpecialManeuver> {
        self.special_maneuvers
            .iter()
            .filter(move |m| nest_name.starts_with(&m.nest_prefix))
    }

    /// The whole configuration as JSON, as returned to clients asking for the teachpoints.
    pub fn teachpoints(&self) -> Value {
        let mut locations: Vec<_> = self.locations.iter().collect();
        locations.sort_by(|a, b| a.0.cmp(b.0));
        let mut nests: Vec<_> = self.nests.iter().collect();
        nests.sort_by(|a, b| a.0.cmp(b.0));

        json!({
            "locations": locations
                .into_iter()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect::<serde_json::Map<_, _>>(),
            "nests": nests
                .into_iter()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect::<serde_json::Map<_, _>>(),
            "motion_profiles": self.motion_profiles,
            "grip_params": self.grip_params,
            "graph_edges": self.graph.edges(),
        })
    }
}

/// Errors building a nest approach path.
#[derive(Debug, Error)]
pub enum NestPathError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Location(#[from] LocationError),
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

/// A small landscape workcell shared by the tests of the crate.
#[cfg(test)]
pub(crate) const TEST_WORKCELL: &str = r#"{
    "locations": {
        "safe1": "c 300 -200 300 0 90 180",
        "safe2": "c 300 200 300 0 90 180",
        "middle_safe": "c 350 0 350 0 90 180",
        "hub": "c 320 0 320 0 90 180",
        "unwind": "j 0 10 170 0 0 500"
    },
    "nests": {
        "A": {
            "loc": "c 300 -200 100 0 90 180",
            "approach_path": ["c 0 0 20 0 0 0", "c 0 0 60 0 0 0"],
            "safe_loc": "safe1",
            "orientation": "landscape"
        },
        "B": {
            "loc": "c 300 200 110 0 90 180",
            "approach_path": ["c 0 0 50 0 0 0"],
            "safe_loc": "safe2",
            "orientation": "landscape"
        },
        "P": {
            "loc": "c 400 0 90 90 90 180",
            "safe_loc": "hub",
            "orientation": "portrait"
        },
        "hotel_3": {
            "loc": "c 100 -300 250 0 90 180",
            "approach_path": ["c -40 0 0 0 0 0"],
            "safe_loc": "safe1",
            "orientation": "landscape"
        },
        "regrip_a": {
            "loc": "c 320 10 90 0 90 180",
            "safe_loc": "hub",
            "orientation": "landscape"
        },
        "regrip_b": {
            "loc": "c 320 -10 90 0 90 180",
            "safe_loc": "hub",
            "orientation": "landscape"
        }
    },
    "motion_profiles": [
        {"id": 1, "speed": 50, "speed2": 50, "acceleration": 50, "deceleration": 50,
         "accel_ramp": 0.1, "decel_ramp": 0.1, "inrange": 0, "straight": false},
        {"id": 2, "speed": 20, "speed2": 20, "acceleration": 20, "deceleration": 20,
         "accel_ramp": 0.2, "decel_ramp": 0.2, "inrange": 1, "straight": true}
    ],
    "grip_params": {
        "portrait": {"width": 86, "force": 15, "speed": 10},
        "landscape": {"width": 123, "force": 10, "speed": 20}
    },
    "graph_edges": [
        ["safe1", "hub"],
        ["hub", "safe2"],
        ["safe1", "A"],
        ["safe2", "B"],
        ["hub", "wait_0.01"],
        ["wait_0.01", "regrip_a"],
        ["regrip_a", "regrip_b"],
        ["regrip_b", "middle_safe"]
    ],
    "holding_motion_profile_id": 2
}"#;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_load() {
        let store = WaypointStore::from_json(TEST_WORKCELL).unwrap();

        assert!(store.is_nest("A"));
        assert!(store.is_location("safe1"));
        assert_eq!(store.resolve("A").unwrap(), &store.nest("A").unwrap().loc);
        assert_eq!(
            store.location("nowhere"),
            Err(LookupError::UnknownWaypoint("nowhere".into()))
        );
        assert_eq!(
            store.nest("safe1").unwrap_err(),
            LookupError::UnknownNest("safe1".into())
        );
        assert_eq!(store.motion_profiles().len(), 2);
        assert_eq!(store.holding_motion_profile_id(), Some(2));

        let grasp = store.grasp_params(Orientation::Landscape);
        assert_eq!(grasp.width, 123.0);
        let release = store.release_params(Orientation::Landscape);
        assert_eq!(release.width, 123.0 + RELEASE_CLEARANCE_MM);
        assert_eq!(release.speed, 20.0);
    }

    #[test]
    fn test_missing_grip_params() {
        let mut doc: Value = serde_json::from_str(TEST_WORKCELL).unwrap();
        doc["grip_params"]
            .as_object_mut()
            .unwrap()
            .remove("landscape");

        match WaypointStore::from_json(&doc.to_string()) {
            Err(ConfigError::MissingGripParams(Orientation::Landscape)) => (),
            r => panic!("Expected missing grip params, got {:?}", r.map(|_| ())),
        }

        doc.as_object_mut().unwrap().remove("grip_params");
        assert!(matches!(
            WaypointStore::from_json(&doc.to_string()),
            Err(ConfigError::MissingGripParams(Orientation::Portrait))
        ));
    }

    #[test]
    fn test_invalid_graph() {
        let mut doc: Value = serde_json::from_str(TEST_WORKCELL).unwrap();
        doc["graph_edges"]
            .as_array_mut()
            .unwrap()
            .push(json!(["safe1", "ghost"]));

        assert!(matches!(
            WaypointStore::from_json(&doc.to_string()),
            Err(ConfigError::UnknownEdgeEndpoint(_, b)) if b == "ghost"
        ));
    }

    #[test]
    fn test_invalid_safe_loc() {
        let mut doc: Value = serde_json::from_str(TEST_WORKCELL).unwrap();
        doc["nests"]["B"]["safe_loc"] = json!("B_safe");

        assert!(matches!(
            WaypointStore::from_json(&doc.to_string()),
            Err(ConfigError::UnknownSafeLoc { .. })
        ));
    }

    #[test]
    fn test_nest_approach_path() {
        let store = WaypointStore::from_json(TEST_WORKCELL).unwrap();

        let path = store.nest_approach_path("A", 1.0, 0.0, 2.0).unwrap();
        let z: Vec<f64> = path.iter().map(|l| l.values[2]).collect();
        assert_eq!(z, vec![102.0, 122.0, 162.0]);
        assert!(path.iter().all(|l| l.values[0] == 301.0));

        assert!(matches!(
            store.nest_approach_path("Z", 0.0, 0.0, 0.0),
            Err(NestPathError::Lookup(LookupError::UnknownNest(_)))
        ));
    }

    #[test]
    fn test_special_maneuvers() {
        let mut doc: Value = serde_json::from_str(TEST_WORKCELL).unwrap();
        doc["special_maneuvers"] = json!([{
            "nest_prefix": "fridge_hotel",
            "commands": [{"command": "move", "params": {"waypoint": "hub"}}]
        }]);
        let store = WaypointStore::from_json(&doc.to_string()).unwrap();

        assert_eq!(store.maneuvers_for("fridge_hotel_2").count(), 1);
        assert_eq!(store.maneuvers_for("hotel_2").count(), 0);

        doc["special_maneuvers"][0]["commands"][0]["command"] = json!("press_button");
        assert!(matches!(
            WaypointStore::from_json(&doc.to_string()),
            Err(ConfigError::InvalidManeuver(..))
        ));
    }

    #[test]
    fn test_teachpoints() {
        let store = WaypointStore::from_json(TEST_WORKCELL).unwrap();
        let tp = store.teachpoints();

        assert_eq!(
            tp["locations"]["safe1"],
            json!("c 300.000 -200.000 300.000 0.000 90.000 180.000")
        );
        assert_eq!(tp["nests"]["A"]["orientation"], json!("landscape"));
        assert_eq!(tp["motion_profiles"].as_array().unwrap().len(), 2);
        assert_eq!(tp["graph_edges"].as_array().unwrap().len(), 8);
    }

    #[test]
    fn test_demo_workcell() {
        let store = WaypointStore::from_json(include_str!("../../../workcells/demo.json")).unwrap();

        assert_eq!(store.maneuvers_for("hotel_1").count(), 1);
        assert_eq!(
            store.graph().shortest_path("sealer", "hotel_2").unwrap(),
            vec!["sealer", "safe_right", "safe_front", "safe_left", "middle_safe", "hotel_2"]
        );
    }
}

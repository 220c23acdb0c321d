//! # Path planner
//!
//! Finds the shortest route between two named points of the workcell graph and turns it into the
//! arm commands which follow it. Nodes of a route are classified as:
//!
//! - nests, which are entered to put a plate down or pick one up,
//! - safe points, which are moved to directly,
//! - wait nodes, named `wait_<seconds>`, which pause the arm.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod graph;

pub use graph::TopologyGraph;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::cmd::{
    explicit_grasp, explicit_release, ApproachParams, ArmCmd, GraspParams, LeaveParams,
    MoveParams, ReleaseParams, WaitParams,
};
use conquer_once::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::waypoints::WaypointStore;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Pattern of wait node names, capturing the duration in seconds.
const WAIT_NODE_PATTERN: &str = r"^wait_(\d+(\.\d+)?)$";

// ------------------------------------------------------------------------------------------------
// STATICS
// ------------------------------------------------------------------------------------------------

/// Compiled wait node pattern, `None` only if the pattern constant is broken.
static WAIT_NODE_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(WAIT_NODE_PATTERN).ok());

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters applied to every command generated from a path.
#[derive(Debug, Clone, Default)]
pub struct PathContext {
    pub motion_profile_id: i32,

    /// Grasp parameters used at nests instead of the nest orientation's defaults
    pub grasp_params: Option<GraspParams>,

    /// Release parameters used at nests instead of the nest orientation's defaults
    pub release_params: Option<ReleaseParams>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Kind of a node on a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    SafePoint,
    Nest,
    Wait(f64),
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("\"{0}\" is not a point of the workcell graph")]
    UnknownNode(String),

    #[error("There is no path from \"{from}\" to \"{to}\"")]
    NoPath { from: String, to: String },

    #[error("\"{0}\" is not a nest, safe point or wait node")]
    InvalidNode(String),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Shortest path between two named points of the store's graph.
pub fn shortest_path(
    store: &WaypointStore,
    from: &str,
    to: &str,
) -> Result<Vec<String>, PlanError> {
    store.graph().shortest_path(from, to)
}

/// Classify a node name.
pub fn classify(store: &WaypointStore, name: &str) -> Result<NodeKind, PlanError> {
    if store.is_nest(name) {
        Ok(NodeKind::Nest)
    } else if store.is_location(name) {
        Ok(NodeKind::SafePoint)
    } else {
        match wait_duration(name) {
            Some(s) => Ok(NodeKind::Wait(s)),
            None => Err(PlanError::InvalidNode(name.to_string())),
        }
    }
}

/// True if the name follows the wait node convention.
pub fn is_wait_node(name: &str) -> bool {
    wait_duration(name).is_some()
}

/// Convert a path into the commands which follow it.
///
/// Safe points become moves and wait nodes become waits. Nests are entered, a grip action is
/// performed, and left again, unless `skip_nests` is set in which case they are passed over. The
/// grip action is a grasp when the previous node of the path was also a nest (the plate was just
/// put down there and is being picked up from the neighbouring nest), otherwise a release.
pub fn expand_path_to_commands(
    store: &WaypointStore,
    path: &[String],
    ctx: &PathContext,
    skip_nests: bool,
) -> Result<Vec<ArmCmd>, PlanError> {
    let mut cmds = Vec::new();
    let mut prev_kind = None;

    for name in path {
        let kind = classify(store, name)?;

        match kind {
            NodeKind::SafePoint => cmds.push(ArmCmd::Move(MoveParams {
                waypoint: name.clone(),
                motion_profile_id: ctx.motion_profile_id,
            })),
            NodeKind::Wait(duration_s) => cmds.push(ArmCmd::Wait(WaitParams { duration_s })),
            NodeKind::Nest if skip_nests => (),
            NodeKind::Nest => {
                let orientation = store
                    .nest(name)
                    .map_err(|_| PlanError::InvalidNode(name.clone()))?
                    .orientation;

                cmds.push(ArmCmd::Approach(ApproachParams {
                    nest: name.clone(),
                    x_offset: 0.0,
                    y_offset: 0.0,
                    z_offset: 0.0,
                    motion_profile_id: ctx.motion_profile_id,
                    ignore_safepath: false,
                }));

                if prev_kind == Some(NodeKind::Nest) {
                    let p = explicit_grasp(&ctx.grasp_params)
                        .unwrap_or_else(|| store.grasp_params(orientation));
                    cmds.push(ArmCmd::GraspPlate(p));
                } else {
                    let p = explicit_release(&ctx.release_params)
                        .unwrap_or_else(|| store.release_params(orientation));
                    cmds.push(ArmCmd::ReleasePlate(p));
                }

                cmds.push(ArmCmd::Leave(LeaveParams {
                    nest: name.clone(),
                    x_offset: 0.0,
                    y_offset: 0.0,
                    z_offset: 0.0,
                    motion_profile_id: ctx.motion_profile_id,
                    ignore_safepath: false,
                }));
            }
        }

        prev_kind = Some(kind);
    }

    Ok(cmds)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn wait_duration(name: &str) -> Option<f64> {
    (*WAIT_NODE_RE)
        .as_ref()?
        .captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::waypoints::{Orientation, TEST_WORKCELL};

    fn path(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_classify() {
        let store = WaypointStore::from_json(TEST_WORKCELL).unwrap();

        assert_eq!(classify(&store, "A").unwrap(), NodeKind::Nest);
        assert_eq!(classify(&store, "safe1").unwrap(), NodeKind::SafePoint);
        assert_eq!(classify(&store, "wait_2").unwrap(), NodeKind::Wait(2.0));
        assert_eq!(classify(&store, "wait_0.5").unwrap(), NodeKind::Wait(0.5));
        assert!(matches!(
            classify(&store, "wait_soon"),
            Err(PlanError::InvalidNode(_))
        ));
        assert!(matches!(
            classify(&store, "ghost"),
            Err(PlanError::InvalidNode(_))
        ));
    }

    #[test]
    fn test_wait_node_pattern() {
        assert!(WAIT_NODE_RE.is_some());
        assert!(is_wait_node("wait_10"));
        assert!(!is_wait_node("wait_"));
        assert!(!is_wait_node("a_wait_1"));
    }

    #[test]
    fn test_shortest_path() {
        let store = WaypointStore::from_json(TEST_WORKCELL).unwrap();

        assert_eq!(
            shortest_path(&store, "safe1", "safe2").unwrap(),
            path(&["safe1", "hub", "safe2"])
        );
        assert_eq!(shortest_path(&store, "A", "A").unwrap(), path(&["A"]));

        // P has no edges
        assert!(matches!(
            shortest_path(&store, "safe1", "P"),
            Err(PlanError::NoPath { .. })
        ));
    }

    #[test]
    fn test_expand_path() {
        let store = WaypointStore::from_json(TEST_WORKCELL).unwrap();
        let ctx = PathContext {
            motion_profile_id: 3,
            ..Default::default()
        };
        let route = shortest_path(&store, "hub", "middle_safe").unwrap();
        assert_eq!(
            route,
            path(&["hub", "wait_0.01", "regrip_a", "regrip_b", "middle_safe"])
        );

        let cmds = expand_path_to_commands(&store, &route, &ctx, false).unwrap();
        let names: Vec<&str> = cmds.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec![
                "move",
                "wait",
                "approach",
                "release_plate",
                "leave",
                "approach",
                "grasp_plate",
                "leave",
                "move"
            ]
        );

        // Orientation defaults are used at nests
        assert_eq!(
            cmds[3],
            ArmCmd::ReleasePlate(store.release_params(Orientation::Landscape))
        );
        assert_eq!(
            cmds[6],
            ArmCmd::GraspPlate(store.grasp_params(Orientation::Landscape))
        );

        let cmds = expand_path_to_commands(&store, &route, &ctx, true).unwrap();
        let names: Vec<&str> = cmds.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["move", "wait", "move"]);
    }

    #[test]
    fn test_expand_path_explicit_params() {
        let store = WaypointStore::from_json(TEST_WORKCELL).unwrap();
        let release = ReleaseParams {
            width: 140.0,
            speed: 5.0,
        };
        let ctx = PathContext {
            motion_profile_id: 1,
            grasp_params: None,
            release_params: Some(release),
        };

        let cmds = expand_path_to_commands(&store, &path(&["safe1", "A"]), &ctx, false).unwrap();
        assert_eq!(cmds[2], ArmCmd::ReleasePlate(release));
    }
}

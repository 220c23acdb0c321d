//! Expansion of commands into primitive steps
//!
//! Every command is fully expanded into its [`Primitive`] steps before the first one is executed.
//! All name lookups, orientation checks, labware lookups and sequence file parsing therefore
//! happen up front, and a command that fails to plan never moves the arm.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::cmd::{
    explicit_grasp, explicit_release, ArmCmd, DropOffPlateParams, GraspParams, MotionProfile,
    PickLidParams, PlaceLidParams, ReleaseParams, RetrievePlateParams, RunSequenceParams,
    TransferParams, DEFAULT_MOTION_PROFILE_ID,
};
use log::debug;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use util::sequence::Sequence;

use super::CmdError;
use crate::driver::{FreeAxes, JogAxis};
use crate::labware::LabwareCatalog;
use crate::location::Location;
use crate::planner::{self, PathContext};
use crate::waypoints::{Nest, WaypointStore};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum nesting of sequences (and of commands generated by transfers) within one command.
pub const MAX_SEQUENCE_DEPTH: usize = 8;

/// Nests whose names start with this sit in a hotel column.
pub const HOTEL_PREFIX: &str = "hotel";

/// Waypoint passed through on the way into and out of the hotel columns.
pub const MIDDLE_SAFE_WAYPOINT: &str = "middle_safe";

/// Taught waypoint used to straighten out the joints.
pub const UNWIND_WAYPOINT: &str = "unwind";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Plans commands against a workcell configuration.
pub struct CmdPlanner<'a> {
    store: &'a WaypointStore,

    catalog: &'a dyn LabwareCatalog,

    /// Directory holding this workcell's sequence files
    sequences_dir: &'a Path,

    /// The graph node the arm will be at once the steps planned so far have run
    cursor: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Offsets {
    x: f64,
    y: f64,
    z: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A single controller level step.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Move to a location, `node` being the graph node the arm is at afterwards (if any)
    MoveTo {
        target: Location,
        motion_profile_id: i32,
        node: Option<String>,
    },
    Grasp(GraspParams),
    Release(ReleaseParams),
    Wait(Duration),
    Jog {
        axis: JogAxis,
        distance: f64,
        motion_profile_id: i32,
    },
    Free(FreeAxes),
    Unfree,
    RegisterProfile(MotionProfile),
    Unwind {
        target: Location,
        motion_profile_id: i32,
    },
    Home,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<'a> CmdPlanner<'a> {
    pub fn new(
        store: &'a WaypointStore,
        catalog: &'a dyn LabwareCatalog,
        sequences_dir: &'a Path,
        current_node: Option<String>,
    ) -> Self {
        Self {
            store,
            catalog,
            sequences_dir,
            cursor: current_node,
        }
    }

    /// Expand a command into primitive steps.
    pub fn plan(&mut self, cmd: &ArmCmd) -> Result<Vec<Primitive>, CmdError> {
        self.plan_at(cmd, 0)
    }

    fn plan_at(&mut self, cmd: &ArmCmd, depth: usize) -> Result<Vec<Primitive>, CmdError> {
        if depth > MAX_SEQUENCE_DEPTH {
            return Err(CmdError::Validation(format!(
                "Commands are nested more than {} levels deep",
                MAX_SEQUENCE_DEPTH
            )));
        }

        match cmd {
            ArmCmd::Move(p) => self.plan_move(&p.waypoint, p.motion_profile_id),
            ArmCmd::Approach(p) => self.plan_approach(
                &p.nest,
                Offsets::new(p.x_offset, p.y_offset, p.z_offset)?,
                p.motion_profile_id,
                p.ignore_safepath,
            ),
            ArmCmd::Leave(p) => self.plan_leave(
                &p.nest,
                Offsets::new(p.x_offset, p.y_offset, p.z_offset)?,
                p.motion_profile_id,
                p.ignore_safepath,
            ),
            ArmCmd::GraspPlate(p) => Ok(vec![Primitive::Grasp(*p)]),
            ArmCmd::ReleasePlate(p) => Ok(vec![Primitive::Release(*p)]),
            ArmCmd::RetrievePlate(p) => self.plan_retrieve(p),
            ArmCmd::DropOffPlate(p) => self.plan_dropoff(p),
            ArmCmd::Transfer(p) => self.plan_transfer(p),
            ArmCmd::SmartTransfer(p) => self.plan_smart_transfer(p, depth),
            ArmCmd::RunSequence(p) => self.plan_sequence(p, depth),
            ArmCmd::PickLid(p) => self.plan_pick_lid(p),
            ArmCmd::PlaceLid(p) => self.plan_place_lid(p),
            ArmCmd::Unwind => {
                let target = self.store.location(UNWIND_WAYPOINT)?.clone();
                self.cursor = None;
                Ok(vec![Primitive::Unwind {
                    target,
                    motion_profile_id: DEFAULT_MOTION_PROFILE_ID,
                }])
            }
            ArmCmd::Jog(p) => {
                let axis: JogAxis = p.axis.parse()?;
                if !p.distance.is_finite() {
                    return Err(CmdError::Validation(format!(
                        "Invalid jog distance {}",
                        p.distance
                    )));
                }
                self.cursor = None;
                Ok(vec![Primitive::Jog {
                    axis,
                    distance: p.distance,
                    motion_profile_id: DEFAULT_MOTION_PROFILE_ID,
                }])
            }
            ArmCmd::Free(p) => {
                let axes = FreeAxes::from_selector(p.axis, p.keep_gripper)?;
                self.cursor = None;
                Ok(vec![Primitive::Free(axes)])
            }
            ArmCmd::Unfree => Ok(vec![Primitive::Unfree]),
            ArmCmd::RegisterMotionProfile(p) => Ok(vec![Primitive::RegisterProfile(p.clone())]),
            ArmCmd::Wait(p) => match Duration::try_from_secs_f64(p.duration_s) {
                Ok(d) => Ok(vec![Primitive::Wait(d)]),
                Err(_) => Err(CmdError::Validation(format!(
                    "Invalid wait duration {} s",
                    p.duration_s
                ))),
            },
            ArmCmd::Home => {
                self.cursor = None;
                Ok(vec![Primitive::Home])
            }
            ArmCmd::Configure(_)
            | ArmCmd::GetTeachpoints
            | ArmCmd::GetCurrentLocation
            | ArmCmd::GetState => Err(CmdError::Validation(format!(
                "\"{}\" is not a motion command and can't be part of a sequence",
                cmd.name()
            ))),
        }
    }

    fn plan_move(
        &mut self,
        waypoint: &str,
        motion_profile_id: i32,
    ) -> Result<Vec<Primitive>, CmdError> {
        require_name("waypoint", waypoint)?;

        let target = self.store.resolve(waypoint)?.clone();
        self.cursor = Some(waypoint.to_string());

        Ok(vec![Primitive::MoveTo {
            target,
            motion_profile_id,
            node: Some(waypoint.to_string()),
        }])
    }

    /// Walk the approach path from the outside in, ending at the nest.
    fn plan_approach(
        &mut self,
        nest: &str,
        offsets: Offsets,
        motion_profile_id: i32,
        ignore_safepath: bool,
    ) -> Result<Vec<Primitive>, CmdError> {
        let mut path = self.nest_path(nest, offsets, ignore_safepath)?;
        path.reverse();

        Ok(self.moves_at_nest(nest, path, motion_profile_id))
    }

    /// Walk the approach path from the nest outwards.
    fn plan_leave(
        &mut self,
        nest: &str,
        offsets: Offsets,
        motion_profile_id: i32,
        ignore_safepath: bool,
    ) -> Result<Vec<Primitive>, CmdError> {
        let path = self.nest_path(nest, offsets, ignore_safepath)?;

        Ok(self.moves_at_nest(nest, path, motion_profile_id))
    }

    fn plan_retrieve(&mut self, p: &RetrievePlateParams) -> Result<Vec<Primitive>, CmdError> {
        let store = self.store;
        let nest = self.nest(&p.nest)?;
        self.check_labware(&p.labware)?;

        let default_release = store.release_params(nest.orientation);
        let release = match p.grip_width {
            Some(width) => ReleaseParams {
                width,
                speed: default_release.speed,
            },
            None => default_release,
        };
        let grasp =
            explicit_grasp(&p.grasp_params).unwrap_or_else(|| store.grasp_params(nest.orientation));
        let holding_profile = store
            .holding_motion_profile_id()
            .unwrap_or(p.motion_profile_id);
        let offsets = Offsets::new(p.x_offset, p.y_offset, p.z_offset)?;

        let mut steps = self.plan_move(&nest.safe_loc, p.motion_profile_id)?;
        steps.push(Primitive::Release(release));
        steps.extend(self.plan_approach(&p.nest, offsets, p.motion_profile_id, false)?);
        steps.push(Primitive::Grasp(grasp));
        steps.extend(self.plan_leave(&p.nest, offsets, p.motion_profile_id, false)?);
        steps.extend(self.plan_move(&nest.safe_loc, holding_profile)?);

        Ok(steps)
    }

    fn plan_dropoff(&mut self, p: &DropOffPlateParams) -> Result<Vec<Primitive>, CmdError> {
        let store = self.store;
        let nest = self.nest(&p.nest)?;
        self.check_labware(&p.labware)?;

        let default_release = store.release_params(nest.orientation);
        let release = explicit_release(&p.release_params)
            .or_else(|| {
                p.grip_width.map(|width| ReleaseParams {
                    width,
                    speed: default_release.speed,
                })
            })
            .unwrap_or(default_release);
        let offsets = Offsets::new(p.x_offset, p.y_offset, p.z_offset)?;

        let mut steps = self.plan_move(&nest.safe_loc, p.motion_profile_id)?;
        steps.extend(self.plan_approach(&p.nest, offsets, p.motion_profile_id, false)?);
        steps.push(Primitive::Release(release));
        steps.extend(self.plan_leave(&p.nest, offsets, p.motion_profile_id, false)?);
        steps.extend(self.plan_move(&nest.safe_loc, p.motion_profile_id)?);

        Ok(steps)
    }

    fn plan_transfer(&mut self, p: &TransferParams) -> Result<Vec<Primitive>, CmdError> {
        self.check_transfer(p)?;

        let (retrieve, dropoff) = split_transfer(p);
        let src_hotel = p.source_nest.starts_with(HOTEL_PREFIX);
        let dst_hotel = p.destination_nest.starts_with(HOTEL_PREFIX);

        let mut steps = Vec::new();

        if src_hotel {
            steps.extend(self.plan_move(MIDDLE_SAFE_WAYPOINT, p.motion_profile_id)?);
        }
        steps.extend(self.plan_retrieve(&retrieve)?);
        if src_hotel {
            steps.extend(self.plan_move(MIDDLE_SAFE_WAYPOINT, p.motion_profile_id)?);
        }

        if dst_hotel {
            steps.extend(self.plan_move(MIDDLE_SAFE_WAYPOINT, p.motion_profile_id)?);
        }
        steps.extend(self.plan_dropoff(&dropoff)?);
        if dst_hotel {
            steps.extend(self.plan_move(MIDDLE_SAFE_WAYPOINT, p.motion_profile_id)?);
        }

        Ok(steps)
    }

    /// Transfer along the shortest graph paths, from wherever the arm is to the source's safe
    /// point and from there to the destination's safe point.
    fn plan_smart_transfer(
        &mut self,
        p: &TransferParams,
        depth: usize,
    ) -> Result<Vec<Primitive>, CmdError> {
        self.check_transfer(p)?;

        let store = self.store;
        let src_safe = store.nest(&p.source_nest)?.safe_loc.clone();
        let dst_safe = store.nest(&p.destination_nest)?.safe_loc.clone();
        let (retrieve, dropoff) = split_transfer(p);

        let mut steps = Vec::new();

        // Empty handed, so nests along the way are passed over. With no known position the
        // retrieve's own move to the safe point is the route.
        if let Some(node) = self.cursor.clone() {
            let route = planner::shortest_path(store, &node, &src_safe)?;
            let ctx = PathContext {
                motion_profile_id: p.motion_profile_id,
                ..Default::default()
            };
            let cmds = planner::expand_path_to_commands(store, interior(&route), &ctx, true)?;
            steps.extend(self.plan_all(&cmds, depth + 1)?);
        }

        steps.extend(self.plan_retrieve(&retrieve)?);

        for m in store.maneuvers_for(&p.source_nest) {
            debug!("Adding special maneuver for \"{}\" after retrieve", m.nest_prefix);
            steps.extend(self.plan_all(&m.commands, depth + 1)?);
        }

        let route = planner::shortest_path(store, &src_safe, &dst_safe)?;
        let ctx = PathContext {
            motion_profile_id: p.motion_profile_id,
            grasp_params: p.grasp_params,
            release_params: p.release_params,
        };
        let cmds = planner::expand_path_to_commands(store, interior(&route), &ctx, false)?;
        steps.extend(self.plan_all(&cmds, depth + 1)?);

        for m in store.maneuvers_for(&p.destination_nest) {
            debug!("Adding special maneuver for \"{}\" before dropoff", m.nest_prefix);
            steps.extend(self.plan_all(&m.commands, depth + 1)?);
        }

        steps.extend(self.plan_dropoff(&dropoff)?);

        Ok(steps)
    }

    fn plan_sequence(
        &mut self,
        p: &RunSequenceParams,
        depth: usize,
    ) -> Result<Vec<Primitive>, CmdError> {
        require_name("sequence", &p.sequence_name)?;

        let path = self
            .sequences_dir
            .join(format!("{}.json", p.sequence_name));
        let sequence = Sequence::load(&path, p.labware.as_deref())?;

        debug!(
            "Planning sequence \"{}\" ({} commands)",
            p.sequence_name,
            sequence.cmds.len()
        );

        self.plan_all(&sequence.cmds, depth + 1)
    }

    fn plan_pick_lid(&mut self, p: &PickLidParams) -> Result<Vec<Primitive>, CmdError> {
        let orientation = self.nest(&p.nest)?.orientation;
        let grasp = self.store.grasp_params(orientation);

        let mut steps = vec![Primitive::Release(self.store.release_params(orientation))];
        steps.extend(self.plan_lid(
            &p.nest,
            &p.labware,
            p.pick_from_plate,
            p.motion_profile_id,
            Primitive::Grasp(grasp),
        )?);

        Ok(steps)
    }

    fn plan_place_lid(&mut self, p: &PlaceLidParams) -> Result<Vec<Primitive>, CmdError> {
        let release = self.store.release_params(self.nest(&p.nest)?.orientation);

        self.plan_lid(
            &p.nest,
            &p.labware,
            p.place_on_plate,
            p.motion_profile_id,
            Primitive::Release(release),
        )
    }

    /// Go down to the lid's grip height above the nest, grip or release it, and back up.
    ///
    /// A lid on a plate is gripped `plate_lid_offset` below the top of the plate, a lid on its
    /// own at `lid_offset`. The arm arrives and departs one plate height above the grip height.
    fn plan_lid(
        &mut self,
        nest: &str,
        labware: &str,
        on_plate: bool,
        motion_profile_id: i32,
        grip_action: Primitive,
    ) -> Result<Vec<Primitive>, CmdError> {
        let geometry = self.catalog.lookup(labware)?;

        let grip_z = if on_plate {
            geometry.height - geometry.plate_lid_offset
        } else {
            geometry.lid_offset
        };
        let depart = Offsets::new(0.0, 0.0, grip_z + geometry.height)?;
        let grip = Offsets::new(0.0, 0.0, grip_z)?;

        let mut steps = self.plan_approach(nest, depart, motion_profile_id, true)?;
        steps.extend(self.plan_approach(nest, grip, motion_profile_id, true)?);
        steps.push(grip_action);
        steps.extend(self.plan_leave(nest, depart, motion_profile_id, true)?);

        Ok(steps)
    }

    fn plan_all(&mut self, cmds: &[ArmCmd], depth: usize) -> Result<Vec<Primitive>, CmdError> {
        let mut steps = Vec::new();

        for cmd in cmds {
            steps.extend(self.plan_at(cmd, depth)?);
        }

        Ok(steps)
    }

    /// Both nests exist and hold plates the same way round.
    fn check_transfer(&self, p: &TransferParams) -> Result<(), CmdError> {
        let src = self.nest(&p.source_nest)?;
        let dst = self.nest(&p.destination_nest)?;

        if src.orientation != dst.orientation {
            return Err(CmdError::Validation(format!(
                "Cannot transfer from {} nest \"{}\" to {} nest \"{}\"",
                src.orientation, p.source_nest, dst.orientation, p.destination_nest
            )));
        }

        self.check_labware(&p.labware)
    }

    fn check_labware(&self, labware: &Option<String>) -> Result<(), CmdError> {
        match labware {
            Some(l) => self.catalog.lookup(l).map(|_| ()).map_err(CmdError::from),
            None => Ok(()),
        }
    }

    fn nest(&self, name: &str) -> Result<&'a Nest, CmdError> {
        require_name("nest", name)?;
        Ok(self.store.nest(name)?)
    }

    fn nest_path(
        &self,
        nest: &str,
        offsets: Offsets,
        ignore_safepath: bool,
    ) -> Result<Vec<Location>, CmdError> {
        require_name("nest", nest)?;

        let mut path = self
            .store
            .nest_approach_path(nest, offsets.x, offsets.y, offsets.z)?;
        if ignore_safepath {
            path.truncate(1);
        }

        Ok(path)
    }

    fn moves_at_nest(
        &mut self,
        nest: &str,
        path: Vec<Location>,
        motion_profile_id: i32,
    ) -> Vec<Primitive> {
        self.cursor = Some(nest.to_string());

        path.into_iter()
            .map(|target| Primitive::MoveTo {
                target,
                motion_profile_id,
                node: Some(nest.to_string()),
            })
            .collect()
    }
}

impl Offsets {
    fn new(x: f64, y: f64, z: f64) -> Result<Self, CmdError> {
        if [x, y, z].iter().all(|v| v.is_finite()) {
            Ok(Self { x, y, z })
        } else {
            Err(CmdError::Validation(format!("Invalid offsets ({}, {}, {})", x, y, z)))
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::MoveTo {
                target,
                motion_profile_id,
                node,
            } => match node {
                Some(n) => write!(
                    f,
                    "move to {} ({}) with profile {}",
                    n, target, motion_profile_id
                ),
                None => write!(f, "move to {} with profile {}", target, motion_profile_id),
            },
            Primitive::Grasp(p) => write!(f, "grasp at {} mm", p.width),
            Primitive::Release(p) => write!(f, "release to {} mm", p.width),
            Primitive::Wait(d) => write!(f, "wait {} s", d.as_secs_f64()),
            Primitive::Jog { axis, distance, .. } => write!(f, "jog {:?} by {}", axis, distance),
            Primitive::Free(a) => write!(f, "free {:?}", a),
            Primitive::Unfree => write!(f, "unfree"),
            Primitive::RegisterProfile(p) => write!(f, "register motion profile {}", p.id),
            Primitive::Unwind { .. } => write!(f, "unwind"),
            Primitive::Home => write!(f, "home"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn require_name(what: &str, name: &str) -> Result<(), CmdError> {
    if name.trim().is_empty() {
        Err(CmdError::Validation(format!("The {} name is empty", what)))
    } else {
        Ok(())
    }
}

/// The nodes of a route between its two ends.
fn interior(route: &[String]) -> &[String] {
    if route.len() > 2 {
        &route[1..route.len() - 1]
    } else {
        &[]
    }
}

/// The retrieve and dropoff halves of a transfer.
fn split_transfer(p: &TransferParams) -> (RetrievePlateParams, DropOffPlateParams) {
    (
        RetrievePlateParams {
            nest: p.source_nest.clone(),
            grasp_params: p.grasp_params,
            x_offset: 0.0,
            y_offset: 0.0,
            z_offset: 0.0,
            motion_profile_id: p.motion_profile_id,
            grip_width: p.grip_width,
            labware: p.labware.clone(),
        },
        DropOffPlateParams {
            nest: p.destination_nest.clone(),
            release_params: p.release_params,
            x_offset: 0.0,
            y_offset: 0.0,
            z_offset: 0.0,
            motion_profile_id: p.motion_profile_id,
            grip_width: p.grip_width,
            labware: p.labware.clone(),
        },
    )
}

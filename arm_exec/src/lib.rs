//! # Arm Library
//!
//! Command and motion sequencing for a PF400 arm working in a laboratory workcell.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command server abstraction
pub mod arm_server;

/// PF400 driver, the primitive operations of the arm
pub mod driver;

/// Labware geometry catalog
pub mod labware;

/// Joint and Cartesian locations
pub mod location;

/// Parameters of the arm executable
pub mod params;

/// Shortest path planning over the workcell graph
pub mod planner;

/// Command interpreter
pub mod sequencer;

/// Line based link to the controller
pub mod transport;

/// Workcell configuration
pub mod waypoints;

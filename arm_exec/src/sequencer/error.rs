//! Command error taxonomy

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use thiserror::Error;
use util::sequence::SequenceError;

use super::ToolState;
use crate::driver::DriverError;
use crate::location::LocationError;
use crate::planner::PlanError;
use crate::transport::TransportError;
use crate::waypoints::{ConfigError, LookupError, NestPathError};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Failure of a command, as reported to the client.
#[derive(Debug, Error)]
pub enum CmdError {
    /// The controller link failed or never gave a well formed reply
    #[error("Communication error: {0}")]
    Communication(TransportError),

    /// The controller replied, but not with an acceptable status
    #[error("Response error: {0}")]
    Response(String),

    /// The workcell configuration or a sequence file couldn't be loaded
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// The command's parameters were rejected before any motion
    #[error("Validation error: {0}")]
    Validation(String),

    /// The controller reported a problem with the arm itself
    #[error("Physical state error: {message} (controller code {code})")]
    PhysicalState { code: i32, message: String },

    #[error("No path from \"{from}\" to \"{to}\"")]
    PathNotFound { from: String, to: String },

    #[error("The tool is not ready (currently {0})")]
    NotReady(ToolState),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CmdError {
    /// Error code sent back to clients, one per category.
    pub fn code(&self) -> i32 {
        match self {
            CmdError::Communication(_) => -1,
            CmdError::Response(_) => -2,
            CmdError::Configuration(_) => -3,
            CmdError::Lookup(_) => -4,
            CmdError::Validation(_) => -5,
            CmdError::PhysicalState { .. } => -6,
            CmdError::PathNotFound { .. } => -7,
            CmdError::NotReady(_) => -8,
        }
    }
}

impl From<TransportError> for CmdError {
    fn from(e: TransportError) -> Self {
        CmdError::Communication(e)
    }
}

impl From<DriverError> for CmdError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::Transport(t) => CmdError::Communication(t),
            DriverError::UnexpectedResponse { .. } | DriverError::Controller { .. } => {
                CmdError::Response(e.to_string())
            }
            DriverError::PhysicalState { code, .. } => CmdError::PhysicalState {
                code,
                message: e.to_string(),
            },
            DriverError::InvalidJogAxis(_)
            | DriverError::InvalidFreeAxis(_)
            | DriverError::Location(_) => CmdError::Validation(e.to_string()),
        }
    }
}

impl From<PlanError> for CmdError {
    fn from(e: PlanError) -> Self {
        match e {
            PlanError::UnknownNode(n) | PlanError::InvalidNode(n) => {
                CmdError::Lookup(LookupError::UnknownWaypoint(n))
            }
            PlanError::NoPath { from, to } => CmdError::PathNotFound { from, to },
        }
    }
}

impl From<NestPathError> for CmdError {
    fn from(e: NestPathError) -> Self {
        match e {
            NestPathError::Lookup(l) => CmdError::Lookup(l),
            NestPathError::Location(l) => l.into(),
        }
    }
}

impl From<LocationError> for CmdError {
    fn from(e: LocationError) -> Self {
        CmdError::Validation(e.to_string())
    }
}

impl From<ConfigError> for CmdError {
    fn from(e: ConfigError) -> Self {
        CmdError::Configuration(e.to_string())
    }
}

impl From<SequenceError> for CmdError {
    fn from(e: SequenceError) -> Self {
        CmdError::Configuration(e.to_string())
    }
}

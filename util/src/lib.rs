//! Utility library for the PF400 arm software

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Host information
pub mod host;

/// Logging to the terminal and the session log file
pub mod logger;

/// Parameter file loading
pub mod params;

/// Sequence file loading
pub mod sequence;

/// Execution sessions
pub mod session;

pub mod time;

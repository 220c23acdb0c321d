//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the PF400 arm software: the command surface
//! exposed by the arm executable and the networking layer it is carried over.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Arm commands, their parameters, and the responses sent back to clients
pub mod cmd;

/// Network module
pub mod net;

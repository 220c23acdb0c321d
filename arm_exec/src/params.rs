//! # Arm Executable Parameters
//!
//! This module provides the parameters of the arm executable, loaded from `arm_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::driver::DriverParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmExecParams {
    /// Network endpoint the command server binds to
    pub cmd_endpoint: String,

    /// Address (`host:port`) of the arm's controller
    pub controller_address: String,

    /// Use the simulated controller instead of connecting to the arm
    #[serde(default)]
    pub simulate: bool,

    /// Directory of the workcell configuration files, relative to the software root
    pub workcells_dir: String,

    /// Directory of the sequence files, relative to the software root
    pub sequences_dir: String,

    /// Labware catalog, relative to the software root
    #[serde(default)]
    pub labware_file: Option<String>,

    /// Workcell configured at start up
    #[serde(default)]
    pub default_workcell: Option<String>,

    /// Number of lines read while waiting for a well formed controller response
    #[serde(default = "default_max_read_attempts")]
    pub max_read_attempts: u32,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Read timeout for ordinary commands, which block until the motion has finished
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Read timeout while powering on, homing and attaching
    #[serde(default = "default_init_timeout_ms")]
    pub init_timeout_ms: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ArmExecParams {
    pub fn driver_params(&self) -> DriverParams {
        DriverParams {
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            init_timeout: Duration::from_millis(self.init_timeout_ms),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_max_read_attempts() -> u32 {
    3
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_read_timeout_ms() -> u64 {
    60_000
}

fn default_init_timeout_ms() -> u64 {
    120_000
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let params: ArmExecParams = toml::from_str(
            r#"
            cmd_endpoint = "tcp://*:5020"
            controller_address = "192.168.0.1:10100"
            workcells_dir = "workcells"
            sequences_dir = "sequences"
            "#,
        )
        .unwrap();

        assert!(!params.simulate);
        assert_eq!(params.default_workcell, None);
        assert_eq!(params.max_read_attempts, 3);
        assert_eq!(params.driver_params().read_timeout, Duration::from_secs(60));
        assert_eq!(params.driver_params().init_timeout, Duration::from_secs(120));
    }
}

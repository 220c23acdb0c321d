//! # Command responses

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Response sent by the arm executable to a client after processing a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArmResponse {
    /// The command was executed. Query commands carry their result in the payload.
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },

    /// The request could not be parsed into a command and nothing was executed
    Invalid { message: String },

    /// The command failed
    Error { code: i32, message: String },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ArmResponse {
    /// A successful response without a payload.
    pub fn ok() -> Self {
        ArmResponse::Ok { payload: None }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ArmResponse::Ok { .. })
    }
}

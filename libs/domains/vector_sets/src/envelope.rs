//! Uniform response envelope returned by every gateway call.
//!
//! Serialized shape, consumed by the HTTP/UI layer:
//!
//! ```text
//! { "success": true,  "result": T, "executionTimeMs"?: n, "executedCommand"?: "..." }
//! { "success": false, "error": "..." }
//! ```

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::GatewayResult;

#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult<T> {
    Success {
        result: T,
        execution_time_ms: Option<u64>,
        executed_command: Option<String>,
    },
    Failure {
        error: String,
    },
}

impl<T> OperationResult<T> {
    pub fn failure(error: impl Into<String>) -> Self {
        OperationResult::Failure {
            error: error.into(),
        }
    }

    /// Wrap a gateway result, attaching timing and the command only on success.
    pub fn from_result(
        result: GatewayResult<T>,
        execution_time_ms: u64,
        executed_command: Option<String>,
    ) -> Self {
        match result {
            Ok(result) => OperationResult::Success {
                result,
                execution_time_ms: Some(execution_time_ms),
                executed_command,
            },
            Err(e) => OperationResult::failure(e.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success { .. })
    }

    pub fn result(&self) -> Option<&T> {
        match self {
            OperationResult::Success { result, .. } => Some(result),
            OperationResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            OperationResult::Success { .. } => None,
            OperationResult::Failure { error } => Some(error),
        }
    }

    pub fn executed_command(&self) -> Option<&str> {
        match self {
            OperationResult::Success {
                executed_command, ..
            } => executed_command.as_deref(),
            OperationResult::Failure { .. } => None,
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            OperationResult::Success { result, .. } => Ok(result),
            OperationResult::Failure { error } => Err(error),
        }
    }
}

impl<T: Serialize> Serialize for OperationResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OperationResult::Success {
                result,
                execution_time_ms,
                executed_command,
            } => {
                let len = 2
                    + usize::from(execution_time_ms.is_some())
                    + usize::from(executed_command.is_some());
                let mut state = serializer.serialize_struct("OperationResult", len)?;
                state.serialize_field("success", &true)?;
                state.serialize_field("result", result)?;
                if let Some(ms) = execution_time_ms {
                    state.serialize_field("executionTimeMs", ms)?;
                }
                if let Some(command) = executed_command {
                    state.serialize_field("executedCommand", command)?;
                }
                state.end()
            }
            OperationResult::Failure { error } => {
                let mut state = serializer.serialize_struct("OperationResult", 2)?;
                state.serialize_field("success", &false)?;
                state.serialize_field("error", error)?;
                state.end()
            }
        }
    }
}

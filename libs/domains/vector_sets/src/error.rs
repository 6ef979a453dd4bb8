//! Error types for the vector-set gateway.
//!
//! Errors fall into the categories callers react to differently:
//! - **Connection** / **Timeout**: the store could not be reached; never retried here
//! - **Protocol**: the reply shape did not match the operation
//! - **Store**: the store rejected the command (`ERR ...`)
//! - **Validation** / **DimensionMismatch**: the request was rejected before any network call

use database::DatabaseError;
use thiserror::Error;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Opening or using the transport failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A connect attempt or operation exceeded its deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The reply did not have the shape the operation expects.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The store replied with an error.
    #[error("Store error: {0}")]
    Store(String),

    /// The request parameters are invalid.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A vector does not match the dimensionality of its embedding configuration.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The pool was shut down while the operation was in flight.
    #[error("Connection pool is shut down")]
    Shutdown,
}

impl GatewayError {
    pub fn protocol(message: impl Into<String>) -> Self {
        GatewayError::Protocol(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation(message.into())
    }

    /// Whether the failure happened before anything was sent to the store.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GatewayError::Validation(_) | GatewayError::DimensionMismatch { .. }
        )
    }

    /// Whether the failure means the transport itself is unusable.
    pub fn is_connection(&self) -> bool {
        matches!(self, GatewayError::Connection(_) | GatewayError::Timeout(_))
    }
}

impl From<redis::RedisError> for GatewayError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout(err.to_string())
        } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal()
        {
            GatewayError::Connection(err.to_string())
        } else {
            GatewayError::Store(err.to_string())
        }
    }
}

impl From<DatabaseError> for GatewayError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Timeout { .. } => GatewayError::Timeout(err.to_string()),
            DatabaseError::Redis(inner) => match GatewayError::from(inner) {
                GatewayError::Store(message) => GatewayError::Connection(message),
                other => other,
            },
            other => GatewayError::Connection(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Serialization(err.to_string())
    }
}

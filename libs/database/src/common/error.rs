use std::time::Duration;

/// Unified error type for connection-level operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Redis-specific errors
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Connection could not be established
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connect attempt exceeded its deadline
    #[error("Connection to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type alias for connection operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

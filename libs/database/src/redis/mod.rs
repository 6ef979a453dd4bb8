//! Redis connector and configuration
//!
//! Provides bounded-time connection setup for the vector-set datastore.

mod config;
mod connector;

pub use config::{PoolConfig, RedisConfig};
pub use connector::{connect, connect_from_config};

// Re-export redis types for convenience
pub use redis::aio::MultiplexedConnection;
pub use redis::{Client, RedisResult, Value};

//! Connection primitives for the vector-set datastore
//!
//! This library owns the low-level pieces needed to reach a Redis 8 server:
//! configuration, a bounded-time connect that verifies the session with `PING`,
//! and a unified error type. Pooling and command semantics live in the domain crate.
//!
//! # Features
//!
//! - `redis` (default) - Redis support
//! - `config` - Configuration support with `core_config::FromEnv`
//! - `all` - All features
//!
//! # Example
//!
//! ```ignore
//! use database::redis;
//! use std::time::Duration;
//!
//! let conn = redis::connect("redis://127.0.0.1:6379", Duration::from_secs(5)).await?;
//! ```

pub mod common;

#[cfg(feature = "redis")]
pub mod redis;

pub use common::{DatabaseError, DatabaseResult};

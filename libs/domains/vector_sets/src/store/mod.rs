//! Transport seam between the gateway and the datastore.
//!
//! [`StoreTransport`] is one live session; [`StoreConnector`] opens sessions for the
//! connection pool. The Redis implementations live in [`redis`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ::redis::Value;

use crate::commands::StoreCommand;
use crate::error::GatewayResult;

pub mod redis;

pub use self::redis::{RedisConnector, RedisTransport};

/// One live session to a store endpoint.
///
/// Commands issued on one transport are executed in submission order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreTransport: Send + Sync {
    /// Execute a single command and return the raw reply
    async fn query(&self, command: &StoreCommand) -> GatewayResult<Value>;

    /// Execute commands as one pipelined round trip, replies in command order
    ///
    /// The outer error means the round trip itself failed. An error reply to one command
    /// is returned in that command's slot and does not affect the others.
    async fn query_pipeline(&self, commands: &[StoreCommand]) -> GatewayResult<Vec<GatewayResult<Value>>>;

    /// Whether the session is still usable
    fn is_open(&self) -> bool;

    /// Close the session; later queries fail with a connection error
    async fn close(&self);
}

/// Opens transports for a store URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, url: &str, timeout: Duration) -> GatewayResult<Arc<dyn StoreTransport>>;
}

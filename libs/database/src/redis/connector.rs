use std::time::Duration;

use redis::Client;
use redis::aio::MultiplexedConnection;
use tracing::{debug, info, warn};

use super::RedisConfig;
use crate::common::{DatabaseError, DatabaseResult};

/// Open one multiplexed connection to `url` and verify it with `PING`
///
/// The whole sequence (TCP connect, handshake, `PING`) is bounded by `timeout`.
/// Failures are returned to the caller as-is; this function never retries.
///
/// # Example
/// ```ignore
/// use database::redis::connect;
/// use std::time::Duration;
///
/// let conn = connect("redis://127.0.0.1:6379", Duration::from_secs(5)).await?;
/// ```
pub async fn connect(url: &str, timeout: Duration) -> DatabaseResult<MultiplexedConnection> {
    debug!(url = %url, timeout_ms = timeout.as_millis() as u64, "Opening Redis connection");

    let client = Client::open(url)?;

    let attempt = async {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(DatabaseError::ConnectionFailed(format!(
                "unexpected PING reply from {}: {}",
                url, pong
            )));
        }
        Ok(conn)
    };

    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(conn)) => {
            info!(url = %url, "Connected to Redis");
            Ok(conn)
        }
        Ok(Err(e)) => {
            warn!(url = %url, error = %e, "Redis connection failed");
            Err(e)
        }
        Err(_) => {
            warn!(url = %url, timeout_ms = timeout.as_millis() as u64, "Redis connection timed out");
            Err(DatabaseError::Timeout {
                url: url.to_string(),
                timeout,
            })
        }
    }
}

/// Connect using a RedisConfig
pub async fn connect_from_config(config: &RedisConfig) -> DatabaseResult<MultiplexedConnection> {
    connect(&config.url, config.connect_timeout).await
}

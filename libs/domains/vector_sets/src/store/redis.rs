use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use database::redis::{MultiplexedConnection, RedisConfig, Value};
use tracing::{debug, info, warn};

use super::{StoreConnector, StoreTransport};
use crate::commands::StoreCommand;
use crate::error::{GatewayError, GatewayResult};

/// [`StoreTransport`] over one multiplexed Redis connection.
pub struct RedisTransport {
    url: String,
    conn: Mutex<Option<MultiplexedConnection>>,
    open: AtomicBool,
}

impl RedisTransport {
    pub fn new(url: impl Into<String>, conn: MultiplexedConnection) -> Self {
        Self {
            url: url.into(),
            conn: Mutex::new(Some(conn)),
            open: AtomicBool::new(true),
        }
    }

    fn connection(&self) -> GatewayResult<MultiplexedConnection> {
        self.conn
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| GatewayError::Connection(format!("connection to {} is closed", self.url)))
    }

    fn observe(&self, err: redis::RedisError) -> GatewayError {
        if err.is_io_error() || err.is_connection_dropped() {
            warn!(url = %self.url, error = %err, "Redis connection lost");
            self.open.store(false, Ordering::SeqCst);
        }
        err.into()
    }
}

#[async_trait]
impl StoreTransport for RedisTransport {
    async fn query(&self, command: &StoreCommand) -> GatewayResult<Value> {
        let mut conn = self.connection()?;
        debug!(url = %self.url, command = %command.verb(), "Executing command");
        command
            .to_redis()
            .query_async::<Value>(&mut conn)
            .await
            .map_err(|e| self.observe(e))
    }

    async fn query_pipeline(&self, commands: &[StoreCommand]) -> GatewayResult<Vec<GatewayResult<Value>>> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection()?;
        debug!(url = %self.url, commands = commands.len(), "Executing pipeline");

        let mut pipe = redis::pipe();
        pipe.ignore_errors();
        for command in commands {
            pipe.add_command(command.to_redis());
        }
        let replies = pipe
            .query_async::<Vec<redis::RedisResult<Value>>>(&mut conn)
            .await
            .map_err(|e| self.observe(e))?;
        Ok(replies
            .into_iter()
            .map(|reply| reply.map_err(GatewayError::from))
            .collect())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        if self.conn.lock().unwrap().take().is_some() {
            info!(url = %self.url, "Closed Redis connection");
        }
    }
}

/// Opens [`RedisTransport`]s with [`database::redis::connect_from_config`].
#[derive(Debug, Clone, Default)]
pub struct RedisConnector;

#[async_trait]
impl StoreConnector for RedisConnector {
    async fn connect(&self, url: &str, timeout: Duration) -> GatewayResult<Arc<dyn StoreTransport>> {
        let config = RedisConfig::new(url).with_connect_timeout(timeout);
        let conn = database::redis::connect_from_config(&config).await?;
        Ok(Arc::new(RedisTransport::new(url, conn)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connector_reports_bad_url_as_connection_error() {
        let err = RedisConnector
            .connect("not-a-redis-url", Duration::from_millis(200))
            .await
            .err()
            .unwrap();
        assert!(err.is_connection(), "unexpected error: {err:?}");
    }
}

//! Redis test infrastructure
//!
//! Provides a `TestVectorStore` helper that runs a Redis 8 container, which ships the
//! vector-set data type built in.

use redis::Client;
use redis::aio::MultiplexedConnection;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

/// Disposable Redis 8 instance
///
/// The container is automatically stopped and removed when this struct is dropped.
///
/// # Example
///
/// ```no_run
/// use test_utils::TestVectorStore;
///
/// # async fn example() {
/// let store = TestVectorStore::new().await;
/// store.seed_set("movies", &[("alien", vec![1.0, 0.0]), ("heat", vec![0.0, 1.0])]).await;
///
/// let url = store.url();
/// // Point the gateway at `url`
/// # }
/// ```
pub struct TestVectorStore {
    #[allow(dead_code)]
    container: ContainerAsync<Redis>,
    connection: MultiplexedConnection,
    url: String,
}

impl TestVectorStore {
    /// Start a Redis 8 Alpine container and connect to it
    pub async fn new() -> Self {
        let container = Redis::default()
            .with_tag("8-alpine")
            .start()
            .await
            .expect("Failed to start Redis container");

        let host_port = container
            .get_host_port_ipv4(6379)
            .await
            .expect("Failed to get Redis port");

        let url = format!("redis://127.0.0.1:{}", host_port);

        let connection = Client::open(url.clone())
            .expect("Failed to create Redis client")
            .get_multiplexed_async_connection()
            .await
            .expect("Failed to connect to Redis");

        tracing::info!(port = host_port, "Test vector store ready (Redis 8-alpine)");

        Self {
            container,
            connection,
            url,
        }
    }

    /// Connection URL for the gateway under test
    pub fn url(&self) -> &str {
        &self.url
    }

    /// A direct connection, for arranging state and checking it behind the gateway's back
    pub fn connection(&self) -> MultiplexedConnection {
        self.connection.clone()
    }

    /// Add `elements` to the vector set `set` with plain `VADD`s
    pub async fn seed_set(&self, set: &str, elements: &[(&str, Vec<f32>)]) {
        let mut conn = self.connection();
        for (element, vector) in elements {
            let mut cmd = redis::cmd("VADD");
            cmd.arg(set).arg("VALUES").arg(vector.len());
            for component in vector {
                cmd.arg(component.to_string());
            }
            cmd.arg(*element);
            cmd.query_async::<i64>(&mut conn)
                .await
                .expect("Failed to seed vector set");
        }
    }
}

// Container is automatically cleaned up when TestVectorStore is dropped
impl Drop for TestVectorStore {
    fn drop(&mut self) {
        tracing::debug!("Cleaning up test vector store container");
    }
}

use std::time::Duration;

#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv, env_millis, env_parse, env_secs};

const DEFAULT_URL: &str = "redis://127.0.0.1:6379";

/// Redis endpoint configuration
///
/// # Example
///
/// ```ignore
/// use database::redis::RedisConfig;
///
/// let config = RedisConfig::new("redis://127.0.0.1:6379");
/// let conn = database::redis::connect_from_config(&config).await?;
/// ```
#[derive(Clone, Debug)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Upper bound for opening a connection
    pub connect_timeout: Duration,
}

impl RedisConfig {
    /// Create a new RedisConfig with the default connect timeout
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: PoolConfig::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Get a reference to the Redis URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

/// Load RedisConfig from environment variables
///
/// - `REDIS_URL` or `REDIS_HOST` (optional, defaults to `redis://127.0.0.1:6379`)
/// - `VSET_CONNECT_TIMEOUT_MS` (optional, defaults to 5000)
#[cfg(feature = "config")]
impl FromEnv for RedisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("REDIS_URL")
            .or_else(|_| std::env::var("REDIS_HOST"))
            .unwrap_or_else(|_| DEFAULT_URL.to_string());

        Ok(Self {
            url,
            connect_timeout: env_millis(
                "VSET_CONNECT_TIMEOUT_MS",
                PoolConfig::DEFAULT_CONNECT_TIMEOUT,
            )?,
        })
    }
}

/// Timing knobs for the per-URL connection pool
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound for a single connect attempt
    pub connect_timeout: Duration,

    /// A connection unused for longer than this is closed by the evictor
    pub idle_timeout: Duration,

    /// How often the evictor scans the pool
    pub eviction_interval: Duration,

    /// Delay between checks while another caller is connecting
    pub wait_poll_interval: Duration,

    /// Number of checks before a waiting caller gives up
    pub wait_max_attempts: u32,
}

impl PoolConfig {
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
    pub const DEFAULT_EVICTION_INTERVAL: Duration = Duration::from_secs(10);
    pub const DEFAULT_WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);
    pub const DEFAULT_WAIT_MAX_ATTEMPTS: u32 = 50;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_eviction_interval(mut self, interval: Duration) -> Self {
        self.eviction_interval = interval;
        self
    }

    /// Configure how long a caller waits for an in-flight connect by another caller
    pub fn with_wait(mut self, poll_interval: Duration, max_attempts: u32) -> Self {
        self.wait_poll_interval = poll_interval;
        self.wait_max_attempts = max_attempts;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
            eviction_interval: Self::DEFAULT_EVICTION_INTERVAL,
            wait_poll_interval: Self::DEFAULT_WAIT_POLL_INTERVAL,
            wait_max_attempts: Self::DEFAULT_WAIT_MAX_ATTEMPTS,
        }
    }
}

/// Load PoolConfig from environment variables
///
/// - `VSET_CONNECT_TIMEOUT_MS` (default 5000)
/// - `VSET_IDLE_TIMEOUT_SECS` (default 60)
/// - `VSET_EVICTION_INTERVAL_SECS` (default 10)
/// - `VSET_WAIT_POLL_INTERVAL_MS` (default 100)
/// - `VSET_WAIT_MAX_ATTEMPTS` (default 50)
#[cfg(feature = "config")]
impl FromEnv for PoolConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            connect_timeout: env_millis("VSET_CONNECT_TIMEOUT_MS", Self::DEFAULT_CONNECT_TIMEOUT)?,
            idle_timeout: env_secs("VSET_IDLE_TIMEOUT_SECS", Self::DEFAULT_IDLE_TIMEOUT)?,
            eviction_interval: env_secs(
                "VSET_EVICTION_INTERVAL_SECS",
                Self::DEFAULT_EVICTION_INTERVAL,
            )?,
            wait_poll_interval: env_millis(
                "VSET_WAIT_POLL_INTERVAL_MS",
                Self::DEFAULT_WAIT_POLL_INTERVAL,
            )?,
            wait_max_attempts: env_parse("VSET_WAIT_MAX_ATTEMPTS", Self::DEFAULT_WAIT_MAX_ATTEMPTS)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config_new() {
        let config = RedisConfig::new("redis://localhost:6379");
        assert_eq!(config.url(), "redis://localhost:6379");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_redis_config_default() {
        let config = RedisConfig::default();
        assert_eq!(config.url, "redis://127.0.0.1:6379");
    }

    #[test]
    fn test_pool_config_builder() {
        let config = PoolConfig::new()
            .with_connect_timeout(Duration::from_millis(200))
            .with_idle_timeout(Duration::from_secs(5))
            .with_eviction_interval(Duration::from_secs(1))
            .with_wait(Duration::from_millis(10), 3);

        assert_eq!(config.connect_timeout, Duration::from_millis(200));
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
        assert_eq!(config.eviction_interval, Duration::from_secs(1));
        assert_eq!(config.wait_poll_interval, Duration::from_millis(10));
        assert_eq!(config.wait_max_attempts, 3);
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_redis_config_from_env_with_redis_host() {
        temp_env::with_vars(
            [
                ("REDIS_URL", None::<&str>),
                ("REDIS_HOST", Some("redis://prod:6379")),
            ],
            || {
                let config = RedisConfig::from_env().unwrap();
                assert_eq!(config.url, "redis://prod:6379");
            },
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_redis_config_from_env_defaults_url() {
        temp_env::with_vars(
            [("REDIS_URL", None::<&str>), ("REDIS_HOST", None::<&str>)],
            || {
                let config = RedisConfig::from_env().unwrap();
                assert_eq!(config.url, "redis://127.0.0.1:6379");
            },
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_pool_config_from_env() {
        temp_env::with_vars(
            [
                ("VSET_CONNECT_TIMEOUT_MS", Some("1500")),
                ("VSET_IDLE_TIMEOUT_SECS", Some("120")),
                ("VSET_EVICTION_INTERVAL_SECS", None::<&str>),
                ("VSET_WAIT_POLL_INTERVAL_MS", None::<&str>),
                ("VSET_WAIT_MAX_ATTEMPTS", Some("5")),
            ],
            || {
                let config = PoolConfig::from_env().unwrap();
                assert_eq!(config.connect_timeout, Duration::from_millis(1500));
                assert_eq!(config.idle_timeout, Duration::from_secs(120));
                assert_eq!(config.eviction_interval, PoolConfig::DEFAULT_EVICTION_INTERVAL);
                assert_eq!(config.wait_max_attempts, 5);
            },
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_pool_config_from_env_invalid() {
        temp_env::with_var("VSET_IDLE_TIMEOUT_SECS", Some("soon"), || {
            let err = PoolConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("VSET_IDLE_TIMEOUT_SECS"));
        });
    }
}

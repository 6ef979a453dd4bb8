//! Per-URL connection pool
//!
//! Holds at most one transport per store URL. Entries move through
//! `Absent -> Connecting -> Open -> (idle) -> Absent`, with `Connecting -> Absent`
//! when the connect attempt fails or its caller is cancelled.
//!
//! The check for an existing entry and the insertion of the `Connecting` placeholder
//! happen under one lock; the connect itself runs outside the lock and its result is
//! committed under a second short lock. Callers that find a placeholder poll until it
//! resolves instead of opening a second connection.
//!
//! A background evictor is spawned when the pool gains its first entry and exits once
//! the pool is empty again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use core_config::FromEnv;
use database::redis::PoolConfig;
use once_cell::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::metrics;
use crate::store::{RedisConnector, StoreConnector, StoreTransport};

static SHARED_POOL: OnceCell<Arc<ConnectionPool>> = OnceCell::new();

enum Slot {
    Connecting,
    Open(Arc<dyn StoreTransport>),
}

struct PoolEntry {
    id: u64,
    slot: Slot,
    last_used_at: Instant,
}

#[derive(Default)]
struct PoolState {
    entries: HashMap<String, PoolEntry>,
    evictor: Option<JoinHandle<()>>,
    /// Bumped by every shutdown; connects started before it are discarded.
    generation: u64,
}

struct PoolInner {
    connector: Arc<dyn StoreConnector>,
    config: PoolConfig,
    state: Mutex<PoolState>,
    next_id: AtomicU64,
}

/// What a caller does after inspecting the pool under the lock.
enum Next {
    Ready(Arc<dyn StoreTransport>),
    Wait,
    Connect {
        id: u64,
        generation: u64,
        stale: Option<Arc<dyn StoreTransport>>,
    },
}

/// Outcome of committing a finished connect.
enum Commit {
    Stored(Option<Arc<dyn StoreTransport>>),
    Existing(Arc<dyn StoreTransport>),
    Shutdown,
}

/// Removes a `Connecting` placeholder unless the connect was committed.
///
/// Runs on error returns and when the acquiring future is dropped mid-connect.
struct PlaceholderGuard<'a> {
    inner: &'a PoolInner,
    url: &'a str,
    id: u64,
    armed: bool,
}

impl PlaceholderGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PlaceholderGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(mut state) = self.inner.state.lock() else {
            return;
        };
        let ours = state
            .entries
            .get(self.url)
            .is_some_and(|e| e.id == self.id && matches!(e.slot, Slot::Connecting));
        if ours {
            state.entries.remove(self.url);
            debug!(url = %self.url, "Removed connection placeholder");
        }
    }
}

/// Pool of one multiplexed transport per store URL.
///
/// Cloning is cheap and clones share the same entries.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn StoreConnector>, config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                connector,
                config,
                state: Mutex::new(PoolState::default()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Pool over real Redis connections.
    pub fn redis(config: PoolConfig) -> Self {
        Self::new(Arc::new(RedisConnector), config)
    }

    /// Process-wide pool, created on first use with [`PoolConfig::from_env`].
    pub fn shared() -> Arc<ConnectionPool> {
        SHARED_POOL
            .get_or_init(|| {
                let config = PoolConfig::from_env().unwrap_or_else(|e| {
                    warn!(error = %e, "Invalid pool configuration, using defaults");
                    PoolConfig::default()
                });
                Arc::new(ConnectionPool::redis(config))
            })
            .clone()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Get the transport for `url`, opening it if needed.
    ///
    /// Connect failures are returned as-is and never retried here.
    pub async fn acquire(&self, url: &str) -> GatewayResult<Arc<dyn StoreTransport>> {
        let mut waited = 0u32;
        loop {
            match self.inspect(url, waited >= self.inner.config.wait_max_attempts) {
                Next::Ready(transport) => return Ok(transport),
                Next::Wait => {
                    waited += 1;
                    tokio::time::sleep(self.inner.config.wait_poll_interval).await;
                }
                Next::Connect {
                    id,
                    generation,
                    stale,
                } => return self.open(url, id, generation, stale).await,
            }
        }
    }

    fn inspect(&self, url: &str, wait_exhausted: bool) -> Next {
        let mut state = self.inner.state.lock().unwrap();

        if let Some(entry) = state.entries.get_mut(url) {
            match &entry.slot {
                Slot::Open(transport) if transport.is_open() => {
                    entry.last_used_at = Instant::now();
                    return Next::Ready(transport.clone());
                }
                Slot::Connecting if !wait_exhausted => return Next::Wait,
                Slot::Connecting => {
                    warn!(url = %url, "Gave up waiting for another connect, taking over");
                }
                Slot::Open(_) => {}
            }
        }

        let stale = match state.entries.remove(url) {
            Some(PoolEntry {
                slot: Slot::Open(transport),
                ..
            }) => Some(transport),
            _ => None,
        };
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        state.entries.insert(
            url.to_string(),
            PoolEntry {
                id,
                slot: Slot::Connecting,
                last_used_at: Instant::now(),
            },
        );
        PoolInner::ensure_evictor(&self.inner, &mut state);
        Next::Connect {
            id,
            generation: state.generation,
            stale,
        }
    }

    async fn open(
        &self,
        url: &str,
        id: u64,
        generation: u64,
        stale: Option<Arc<dyn StoreTransport>>,
    ) -> GatewayResult<Arc<dyn StoreTransport>> {
        let mut guard = PlaceholderGuard {
            inner: &self.inner,
            url,
            id,
            armed: true,
        };
        if let Some(stale) = stale {
            debug!(url = %url, "Replacing closed connection");
            stale.close().await;
        }

        let timeout = self.inner.config.connect_timeout;
        let transport =
            match tokio::time::timeout(timeout, self.inner.connector.connect(url, timeout)).await {
                Ok(Ok(transport)) => transport,
                Ok(Err(e)) => {
                    warn!(url = %url, error = %e, "Failed to open store connection");
                    return Err(e);
                }
                Err(_) => {
                    warn!(url = %url, timeout_ms = timeout.as_millis() as u64, "Store connection timed out");
                    return Err(GatewayError::Timeout(format!(
                        "connecting to {} took longer than {:?}",
                        url, timeout
                    )));
                }
            };

        // First finished connect wins; a later one for the same URL hands back the winner
        let commit = {
            let mut state = self.inner.state.lock().unwrap();
            let commit = match state.entries.get(url) {
                _ if state.generation != generation => Commit::Shutdown,
                Some(PoolEntry {
                    id: other,
                    slot: Slot::Open(existing),
                    ..
                }) if *other != id && existing.is_open() => Commit::Existing(existing.clone()),
                _ => {
                    let previous = state.entries.insert(
                        url.to_string(),
                        PoolEntry {
                            id,
                            slot: Slot::Open(transport.clone()),
                            last_used_at: Instant::now(),
                        },
                    );
                    guard.disarm();
                    PoolInner::ensure_evictor(&self.inner, &mut state);
                    Commit::Stored(previous.and_then(|entry| match entry.slot {
                        Slot::Open(previous) => Some(previous),
                        Slot::Connecting => None,
                    }))
                }
            };
            metrics::pool_connections(state.entries.len());
            commit
        };

        match commit {
            Commit::Stored(previous) => {
                if let Some(previous) = previous {
                    previous.close().await;
                }
                info!(url = %url, "Store connection opened");
                Ok(transport)
            }
            Commit::Existing(existing) => {
                debug!(url = %url, "Another connect finished first, closing ours");
                transport.close().await;
                Ok(existing)
            }
            Commit::Shutdown => {
                transport.close().await;
                Err(GatewayError::Shutdown)
            }
        }
    }

    /// Close every connection and stop the evictor. The pool stays usable afterwards.
    pub async fn shutdown(&self) {
        let (transports, evictor) = {
            let mut state = self.inner.state.lock().unwrap();
            let transports: Vec<_> = state
                .entries
                .drain()
                .filter_map(|(_, entry)| match entry.slot {
                    Slot::Open(transport) => Some(transport),
                    Slot::Connecting => None,
                })
                .collect();
            state.generation += 1;
            (transports, state.evictor.take())
        };

        if let Some(evictor) = evictor {
            evictor.abort();
        }
        let closed = transports.len();
        for transport in transports {
            transport.close().await;
        }
        metrics::pool_connections(0);
        info!(closed = closed, "Connection pool shut down");
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.state.lock().unwrap().entries.len()
    }

    #[cfg(test)]
    pub(crate) fn is_connecting(&self, url: &str) -> bool {
        self.inner
            .state
            .lock()
            .unwrap()
            .entries
            .get(url)
            .is_some_and(|e| matches!(e.slot, Slot::Connecting))
    }

    #[cfg(test)]
    pub(crate) fn has_evictor(&self) -> bool {
        self.inner
            .state
            .lock()
            .unwrap()
            .evictor
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl PoolInner {
    fn ensure_evictor(inner: &Arc<PoolInner>, state: &mut PoolState) {
        if state.evictor.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let pool: Weak<PoolInner> = Arc::downgrade(inner);
        let period = inner.config.eviction_interval;
        debug!(interval_ms = period.as_millis() as u64, "Starting idle connection evictor");

        state.evictor = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = pool.upgrade() else {
                    break;
                };
                if !inner.evict_idle().await {
                    debug!("Pool is empty, stopping evictor");
                    break;
                }
            }
        }));
    }

    /// Close entries idle past the threshold. Returns whether the evictor should keep running.
    async fn evict_idle(&self) -> bool {
        let (expired, keep_running) = {
            let mut state = self.state.lock().unwrap();
            let now = Instant::now();
            let idle_timeout = self.config.idle_timeout;

            let urls: Vec<String> = state
                .entries
                .iter()
                .filter(|(_, entry)| match &entry.slot {
                    Slot::Open(transport) => {
                        !transport.is_open()
                            || now.duration_since(entry.last_used_at) >= idle_timeout
                    }
                    Slot::Connecting => false,
                })
                .map(|(url, _)| url.clone())
                .collect();

            let expired: Vec<(String, Arc<dyn StoreTransport>)> = urls
                .into_iter()
                .filter_map(|url| match state.entries.remove(&url) {
                    Some(PoolEntry {
                        slot: Slot::Open(transport),
                        ..
                    }) => Some((url, transport)),
                    _ => None,
                })
                .collect();

            let keep_running = !state.entries.is_empty();
            if !keep_running {
                state.evictor = None;
            }
            metrics::pool_connections(state.entries.len());
            (expired, keep_running)
        };

        for (url, transport) in expired {
            info!(url = %url, "Evicting idle store connection");
            transport.close().await;
        }
        keep_running
    }
}

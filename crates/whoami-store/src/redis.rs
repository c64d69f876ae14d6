use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, RedisResult};
use tokio::sync::{Notify, RwLock};
use tracing::{info, warn};

use whoami_core::{ClientId, CounterStore, VisitCounts, VisitTotals};

use crate::{error::StoreError, health::StoreHealth};

const RECONNECT_STEP_MS: u64 = 50;
const RECONNECT_MAX_MS: u64 = 2_000;

/// Connection settings for [`RedisStore`].
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: String,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub ping_interval: Duration,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key_prefix: key_prefix.into(),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(2),
            ping_interval: Duration::from_secs(5),
        }
    }
}

/// Delay before reconnect attempt number `attempt` (1-based): grows by
/// 50 ms per attempt and is capped at 2 s. Attempts are unbounded.
pub fn reconnect_delay(attempt: u32) -> Duration {
    Duration::from_millis((u64::from(attempt) * RECONNECT_STEP_MS).min(RECONNECT_MAX_MS))
}

/// Visit counters kept in Redis.
///
/// Layout:
///
/// ```text
/// {prefix}:total     → integer, every recorded visit
/// {prefix}:clients   → hash, client key → that client's visit count
/// ```
///
/// An increment is `INCR` + `HINCRBY` + `HLEN` sent as one `MULTI/EXEC`
/// pipeline, so the three values it returns come from the same point in the
/// command stream. No client-side lock is held across the round trip; the
/// multiplexed connection is cloned out per call.
///
/// A command that fails without a reply (a timeout, or a connection dropped
/// mid-flight) is reported as a failure even though Redis may already have
/// executed it. The caller's fallback then counts that visit a second time in
/// the file store, so the sum across both stores can exceed the number of
/// requests by the number of such unanswered commands. It never falls short.
///
/// A supervisor task spawned by [`RedisStore::start`] owns the connection
/// lifecycle: it connects, pings periodically, and reconnects with linear
/// backoff. [`StoreHealth`] mirrors whether a live connection is available.
pub struct RedisStore {
    client: redis::Client,
    conn: RwLock<Option<MultiplexedConnection>>,
    health: StoreHealth,
    /// Woken by a failed command so the supervisor drops the connection.
    broken: Notify,
    total_key: String,
    clients_key: String,
    connect_timeout: Duration,
    command_timeout: Duration,
    ping_interval: Duration,
}

impl RedisStore {
    /// Build the store without connecting. It reports not-ready until a
    /// supervisor installs a connection.
    pub fn new(config: RedisConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(config.url.as_str())?;
        Ok(Self {
            client,
            conn: RwLock::new(None),
            health: StoreHealth::new(),
            broken: Notify::new(),
            total_key: format!("{}:total", config.key_prefix),
            clients_key: format!("{}:clients", config.key_prefix),
            connect_timeout: config.connect_timeout,
            command_timeout: config.command_timeout,
            ping_interval: config.ping_interval,
        })
    }

    /// Build the store and spawn its connection supervisor on the current
    /// Tokio runtime. The supervisor runs for the life of the process.
    pub fn start(config: RedisConfig) -> Result<Arc<Self>, StoreError> {
        let store = Arc::new(Self::new(config)?);
        tokio::spawn(Arc::clone(&store).supervise());
        Ok(store)
    }

    pub fn total_key(&self) -> &str {
        &self.total_key
    }

    pub fn clients_key(&self) -> &str {
        &self.clients_key
    }

    async fn supervise(self: Arc<Self>) {
        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                tokio::time::sleep(reconnect_delay(attempt)).await;
            }

            let conn = match self.open_connection().await {
                Ok(conn) => conn,
                Err(e) => {
                    attempt = attempt.saturating_add(1);
                    warn!(
                        attempt,
                        retry_in_ms = reconnect_delay(attempt).as_millis() as u64,
                        error = %e,
                        "Redis connect failed"
                    );
                    continue;
                }
            };

            info!(after_attempts = attempt, "Redis connected");
            *self.conn.write().await = Some(conn.clone());
            self.health.mark_ready();

            self.watch(conn).await;

            *self.conn.write().await = None;
            self.health.mark_unavailable();
            warn!("Redis connection lost, reconnecting");
            attempt = 1;
        }
    }

    async fn open_connection(&self) -> Result<MultiplexedConnection, StoreError> {
        match tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout(self.connect_timeout.as_millis() as u64)),
        }
    }

    /// Ping the connection until it fails or a command reports it broken.
    ///
    /// A failure reported while the supervisor is busy pinging is not queued
    /// as a wakeup; the readiness check on the next tick picks it up instead.
    async fn watch(&self, mut conn: MultiplexedConnection) {
        let mut ticker = tokio::time::interval(self.ping_interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.health.is_ready() {
                        return;
                    }
                    let pong: Result<String, StoreError> =
                        self.bounded(redis::cmd("PING").query_async(&mut conn)).await;
                    if let Err(e) = pong {
                        warn!(error = %e, "Redis ping failed");
                        return;
                    }
                }
                _ = self.broken.notified() => return,
            }
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        if !self.health.is_ready() {
            return Err(StoreError::NotReady);
        }
        self.conn.read().await.clone().ok_or(StoreError::NotReady)
    }

    async fn bounded<T>(
        &self,
        command: impl Future<Output = RedisResult<T>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.command_timeout, command).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout(self.command_timeout.as_millis() as u64)),
        }
    }

    /// Mark the store unavailable and wake a watching supervisor. Only the
    /// call that flips the flag notifies, and no permit is stored, so a stale
    /// wakeup can never tear down the next connection.
    fn report_failure(&self, error: &StoreError) {
        if self.health.mark_unavailable() {
            warn!(error = %error, "Redis command failed, marking store unavailable");
            self.broken.notify_waiters();
        }
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn increment(&self, client: &ClientId) -> anyhow::Result<VisitCounts> {
        let mut conn = self.connection().await?;
        let result: Result<(u64, u64, u64), StoreError> = self
            .bounded(
                redis::pipe()
                    .atomic()
                    .incr(&self.total_key, 1u64)
                    .hincr(&self.clients_key, client.as_str(), 1u64)
                    .hlen(&self.clients_key)
                    .query_async(&mut conn),
            )
            .await;

        match result {
            Ok((total, your_visits, unique)) => Ok(VisitCounts {
                total,
                unique,
                your_visits,
            }),
            Err(e) => {
                self.report_failure(&e);
                Err(e.into())
            }
        }
    }

    async fn snapshot(&self) -> anyhow::Result<VisitTotals> {
        let mut conn = self.connection().await?;
        let result: Result<(Option<u64>, u64), StoreError> = self
            .bounded(
                redis::pipe()
                    .get(&self.total_key)
                    .hlen(&self.clients_key)
                    .query_async(&mut conn),
            )
            .await;

        match result {
            Ok((total, unique)) => Ok(VisitTotals {
                total: total.unwrap_or(0),
                unique,
            }),
            Err(e) => {
                self.report_failure(&e);
                Err(e.into())
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.health.is_ready()
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

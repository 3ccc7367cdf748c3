//! MySQL driver backed by sqlx.
//!
//! sqlx pools are configured at construction time, so applying limits builds a
//! fresh lazily-connecting pool and swaps it in behind the handle. The handle
//! itself, and therefore every `Arc` handed out by the registry, never changes.
//!
//! sqlx reports slow statements on its own `sqlx::query` target. Each handle
//! owns a `mysql` span carrying the node name and its slow-logger `channel`;
//! query work run through [`MySqlHandle::acquire`] or [`MySqlHandle::in_span`]
//! happens inside it, so those events can be routed per channel.

use crate::db::dsn::Dsn;
use crate::db::handle::{Connector, NodeHandle, PoolControl};
use crate::db::policy::LogPolicy;
use crate::error::{DbError, DbResult};
use crate::models::{PoolLimits, PoolStats};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::pool::PoolConnection;
use sqlx::{ConnectOptions, Connection, MySql, MySqlPool};
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::{Duration, Instant};
use tracing::instrument::Instrumented;
use tracing::{Instrument, Span, debug, error};

/// Default time allowed for the reachability check on open.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// sqlx needs a finite bound; used when `max_open` is unlimited.
const UNLIMITED_MAX_OPEN: u32 = 1 << 16;

/// Limits a handle starts with before tuning.
const INITIAL_LIMITS: PoolLimits = PoolLimits {
    max_idle: 2,
    max_open: 0,
    max_lifetime: Duration::ZERO,
};

/// Opens [`MySqlHandle`]s.
#[derive(Debug, Clone, Copy)]
pub struct MySqlConnector {
    connect_timeout: Duration,
    verify: bool,
}

impl MySqlConnector {
    /// Connector that checks reachability with one connection on open.
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            verify: true,
        }
    }

    /// Connector that skips the reachability check; connections are made on
    /// first use.
    pub fn lazy() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            verify: false,
        }
    }

    async fn ping(&self, options: &MySqlConnectOptions) -> DbResult<()> {
        let conn = tokio::time::timeout(self.connect_timeout, options.connect())
            .await
            .map_err(|_| {
                DbError::internal(format!(
                    "connect timed out after {}s",
                    self.connect_timeout.as_secs()
                ))
            })?
            .map_err(|e| DbError::internal(format!("Failed to connect: {}", e)))?;

        if let Err(e) = conn.close().await {
            debug!(error = %e, "Failed to close probe connection");
        }
        Ok(())
    }
}

impl Default for MySqlConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Connector for MySqlConnector {
    type Handle = MySqlHandle;

    async fn open(&self, node: &str, dsn: &Dsn, policy: &LogPolicy) -> DbResult<MySqlHandle> {
        let options = MySqlConnectOptions::from_str(dsn.expose())
            .map_err(|e| DbError::invalid_input(format!("Invalid MySQL connection string: {}", e)))?;
        let options = apply_policy(options, policy);

        if self.verify {
            self.ping(&options).await?;
        }

        Ok(MySqlHandle {
            span: node_span(node, policy),
            policy: policy.clone(),
            pool: SqlxPool::new(options),
        })
    }
}

/// Route sqlx statement logging according to the node's policy.
fn apply_policy(options: MySqlConnectOptions, policy: &LogPolicy) -> MySqlConnectOptions {
    if policy.sink.is_null() {
        return options.disable_statement_logging();
    }
    options
        .log_statements(log::LevelFilter::Off)
        .log_slow_statements(policy.level_filter(), policy.slow_threshold)
}

/// Span that node query work runs in.
fn node_span(node: &str, policy: &LogPolicy) -> Span {
    // Error level: the span must stay enabled whenever the node's events are.
    let span = tracing::error_span!("mysql", node = %node, channel = tracing::field::Empty);
    if let Some(channel) = policy.channel() {
        span.record("channel", channel);
    }
    span
}

/// Pooled handle to one MySQL node.
#[derive(Debug)]
pub struct MySqlHandle {
    span: Span,
    policy: LogPolicy,
    pool: SqlxPool,
}

impl MySqlHandle {
    pub fn policy(&self) -> &LogPolicy {
        &self.policy
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// The current sqlx pool, for issuing queries.
    ///
    /// Run queries on it through [`MySqlHandle::in_span`] so slow statements
    /// are attributed to this node.
    pub fn sqlx_pool(&self) -> DbResult<MySqlPool> {
        Ok(self.pool()?.current())
    }

    /// Run `fut` inside the node span.
    pub fn in_span<F: Future>(&self, fut: F) -> Instrumented<F> {
        fut.instrument(self.span.clone())
    }

    /// Acquire a connection, counting the wait when the pool is saturated.
    pub async fn acquire(&self) -> DbResult<PoolConnection<MySql>> {
        let pool = self.pool()?;
        pool.acquire().instrument(self.span.clone()).await
    }

    /// Report a failed query through the node's logging policy.
    pub fn report_error(&self, err: &sqlx::Error) {
        let Some(channel) = self.policy.channel() else {
            return;
        };
        if self.policy.ignore_not_found && matches!(err, sqlx::Error::RowNotFound) {
            return;
        }
        error!(parent: &self.span, channel = %channel, error = %err, "mysql: query failed");
    }

    /// Close the pool. Later `pool()` calls fail.
    pub async fn close(&self) {
        self.pool.current().close().await;
    }
}

impl NodeHandle for MySqlHandle {
    type Pool = SqlxPool;

    fn pool(&self) -> DbResult<&SqlxPool> {
        if self.pool.current().is_closed() {
            return Err(DbError::internal("sql: database is closed"));
        }
        Ok(&self.pool)
    }
}

/// Swappable sqlx pool with wait accounting.
pub struct SqlxPool {
    options: MySqlConnectOptions,
    state: Arc<PoolState>,
}

struct PoolState {
    current: RwLock<MySqlPool>,
    limits: RwLock<PoolLimits>,
    wait_count: AtomicU64,
    wait_nanos: AtomicU64,
}

impl PoolState {
    fn current(&self) -> MySqlPool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn limits(&self) -> PoolLimits {
        *self.limits.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SqlxPool {
    fn new(options: MySqlConnectOptions) -> Self {
        let state = Arc::new_cyclic(|weak| PoolState {
            current: RwLock::new(build_pool(&options, &INITIAL_LIMITS, weak.clone())),
            limits: RwLock::new(INITIAL_LIMITS),
            wait_count: AtomicU64::new(0),
            wait_nanos: AtomicU64::new(0),
        });
        Self { options, state }
    }

    pub fn current(&self) -> MySqlPool {
        self.state.current()
    }

    pub fn limits(&self) -> PoolLimits {
        self.state.limits()
    }

    async fn acquire(&self) -> DbResult<PoolConnection<MySql>> {
        let pool = self.current();
        let saturated = pool.num_idle() == 0
            && self
                .limits()
                .max_open()
                .is_some_and(|max| pool.size() >= max);

        let started = Instant::now();
        let conn = pool.acquire().await?;

        if saturated {
            let waited = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
            self.state.wait_count.fetch_add(1, Ordering::Relaxed);
            self.state.wait_nanos.fetch_add(waited, Ordering::Relaxed);
        }
        Ok(conn)
    }
}

impl PoolControl for SqlxPool {
    /// Must be called within a Tokio runtime.
    fn apply_limits(&self, limits: &PoolLimits) {
        let next = build_pool(&self.options, limits, Arc::downgrade(&self.state));
        *self
            .state
            .limits
            .write()
            .unwrap_or_else(PoisonError::into_inner) = *limits;
        let previous = std::mem::replace(
            &mut *self
                .state
                .current
                .write()
                .unwrap_or_else(PoisonError::into_inner),
            next,
        );

        tokio::spawn(async move { previous.close().await });
    }

    fn stats(&self) -> PoolStats {
        let pool = self.current();
        let open = pool.size();
        let idle = u32::try_from(pool.num_idle()).unwrap_or(u32::MAX);
        PoolStats {
            max_open: self.limits().max_open,
            open,
            in_use: open.saturating_sub(idle),
            idle,
            wait_count: self.state.wait_count.load(Ordering::Relaxed),
            wait_duration: Duration::from_nanos(self.state.wait_nanos.load(Ordering::Relaxed)),
        }
    }
}

impl std::fmt::Debug for SqlxPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlxPool")
            .field("limits", &self.limits())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Build a lazily-connecting pool honoring `limits`.
///
/// sqlx has no idle cap, so released connections are closed once the pool
/// already holds `max_idle` idle connections.
fn build_pool(
    options: &MySqlConnectOptions,
    limits: &PoolLimits,
    state: Weak<PoolState>,
) -> MySqlPool {
    let max_idle = limits.max_idle() as usize;

    MySqlPoolOptions::new()
        .min_connections(0)
        .max_connections(limits.max_open().unwrap_or(UNLIMITED_MAX_OPEN))
        .max_lifetime(limits.max_lifetime())
        .after_release(move |_conn, _meta| {
            let keep = state
                .upgrade()
                .is_none_or(|state| state.current().num_idle() < max_idle);
            Box::pin(async move { Ok(keep) })
        })
        .connect_lazy_with(options.clone())
}

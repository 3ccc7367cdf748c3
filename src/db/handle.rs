//! Capability traits for the database driver.
//!
//! The registry never talks to a driver directly. A [`Connector`] opens
//! handles, a [`NodeHandle`] exposes its pool, and a [`PoolControl`] is tuned
//! and sampled through these traits. The MySQL implementation lives in
//! [`super::mysql`].

use crate::db::dsn::Dsn;
use crate::db::policy::LogPolicy;
use crate::error::DbResult;
use crate::models::{PoolLimits, PoolStats};
use std::future::Future;

/// Opens database handles.
pub trait Connector: Send + Sync + 'static {
    type Handle: NodeHandle;

    /// Open the handle for node `node` at `dsn`, reporting statements
    /// according to `policy`.
    fn open(
        &self,
        node: &str,
        dsn: &Dsn,
        policy: &LogPolicy,
    ) -> impl Future<Output = DbResult<Self::Handle>> + Send;
}

/// A thread-safe, pooled handle to one node.
pub trait NodeHandle: Send + Sync + 'static {
    type Pool: PoolControl;

    /// The underlying pool. Fails when the handle has no usable pool.
    fn pool(&self) -> DbResult<&Self::Pool>;
}

/// Tuning and statistics for a connection pool.
pub trait PoolControl: Send + Sync {
    /// Apply idle, open and lifetime limits in one step.
    fn apply_limits(&self, limits: &PoolLimits);

    fn stats(&self) -> PoolStats;
}

//! Registry of named database nodes.
//!
//! A [`Registry`] starts empty, is populated through [`Registry::initialize`]
//! and is then read concurrently through [`Registry::lookup`]. Every node is
//! opened, tuned and put under a stats monitor before it becomes visible.
//!
//! # Concurrency
//!
//! - The name map sits behind a `std::sync::RwLock` that is never held across
//!   an await point, so lookups are synchronous.
//! - Handles are shared as `Arc`s; a stored name keeps returning the same
//!   instance until a later `initialize` call overwrites it.
//! - Monitors are spawned on one `TaskTracker` and stopped by the
//!   `CancellationToken` passed to `initialize`. Cancelling never closes handles.

use crate::db::factory::{open_handle, tune_handle};
use crate::db::handle::Connector;
use crate::db::monitor::spawn_monitor;
use crate::error::{DbError, DbResult};
use crate::models::NodeConfig;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

pub struct Registry<C: Connector> {
    connector: C,
    nodes: RwLock<HashMap<String, Arc<C::Handle>>>,
    monitors: TaskTracker,
}

impl<C: Connector> Registry<C> {
    /// Create an empty registry opening handles through `connector`.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            nodes: RwLock::new(HashMap::new()),
            monitors: TaskTracker::new(),
        }
    }

    /// Open, tune, monitor and register every node in `configs`.
    ///
    /// Nodes are processed one at a time. The first failure aborts the call and
    /// is returned; nodes registered before it stay registered. Names already
    /// present are overwritten. Monitors run until `token` is cancelled.
    pub async fn initialize<I, K, V>(&self, token: &CancellationToken, configs: I) -> DbResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Borrow<NodeConfig>,
    {
        for (name, config) in configs {
            let name = name.into();
            let config: &NodeConfig = config.borrow();

            let handle = open_handle(&self.connector, &name, config).await?;
            tune_handle(&name, &handle, config)?;

            let handle = Arc::new(handle);
            spawn_monitor(
                &self.monitors,
                token.clone(),
                name.clone(),
                Arc::clone(&handle),
            );

            let replaced = self.write().insert(name.clone(), handle).is_some();
            info!(node = %name, replaced, "Node registered");
        }
        Ok(())
    }

    /// Get the handle registered under `name`.
    ///
    /// # Panics
    ///
    /// Looking up a name that was never initialized is a programming error:
    /// it is logged on the `error` channel and then panics. Use
    /// [`Registry::try_lookup`] when the name comes from untrusted input.
    pub fn lookup(&self, name: &str) -> Arc<C::Handle> {
        match self.try_lookup(name) {
            Ok(handle) => handle,
            Err(e) => {
                error!(target: "error", node = %name, "{}", e);
                panic!("mysql: not exists node:{name}");
            }
        }
    }

    /// Get the handle registered under `name`, or [`DbError::NodeNotFound`].
    pub fn try_lookup(&self, name: &str) -> DbResult<Arc<C::Handle>> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::node_not_found(name))
    }

    /// Check if a node is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Registered node names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Number of monitor tasks still running.
    pub fn monitor_count(&self) -> usize {
        self.monitors.len()
    }

    /// Wait for every monitor to exit.
    ///
    /// Only returns once the tokens passed to `initialize` have been cancelled.
    pub async fn wait_monitors(&self) {
        self.monitors.close();
        self.monitors.wait().await;
        self.monitors.reopen();
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<C::Handle>>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<C::Handle>>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Connector> std::fmt::Debug for Registry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("nodes", &self.names())
            .field("monitors", &self.monitor_count())
            .finish_non_exhaustive()
    }
}

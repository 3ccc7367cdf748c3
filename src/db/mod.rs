//! Database node layer.
//!
//! This module provides the node registry and its building blocks:
//! - Capability traits for the driver
//! - Descriptor assembly and slow-operation logging policy
//! - Handle construction and pool tuning
//! - Per-node stats monitors
//! - The registry itself and its sqlx MySQL backend

pub mod dsn;
pub mod factory;
pub mod handle;
pub mod monitor;
pub mod mysql;
pub mod policy;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use dsn::Dsn;
pub use factory::{open_handle, tune_handle};
pub use handle::{Connector, NodeHandle, PoolControl};
pub use monitor::{MONITOR_INTERVAL, spawn_monitor};
pub use mysql::{MySqlConnector, MySqlHandle, SqlxPool};
pub use policy::{DEFAULT_SLOW_THRESHOLD, LogPolicy, LogSink};
pub use registry::Registry;

/// Registry backed by the sqlx MySQL driver.
pub type MySqlRegistry = Registry<MySqlConnector>;

//! Node-related data models.
//!
//! This module defines the per-node configuration and the pool limits and
//! statistics derived from it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for one named MySQL endpoint.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// `host` or `host:port`
    pub addr: String,
    pub username: String,
    /// Contains sensitive data - never log
    #[serde(default, skip_serializing)]
    pub password: String,
    pub database: String,
    /// Extra driver options appended after `?`, e.g. `charset=utf8mb4`.
    #[serde(default)]
    pub dsn_options: String,

    #[serde(default)]
    pub max_idle: u32,
    /// 0 means unlimited
    #[serde(default)]
    pub max_open: u32,
    #[serde(default, rename = "max_lifetime_secs", with = "duration_secs")]
    pub max_lifetime: Duration,

    #[serde(default, rename = "slow_time_ms", with = "duration_millis")]
    pub slow_time: Duration,
    /// Logging channel for slow statements. Empty disables slow logging.
    #[serde(default)]
    pub slow_logger: String,
}

impl NodeConfig {
    /// Create a configuration for the given endpoint with zeroed pool settings.
    pub fn new(
        addr: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            addr: addr.into(),
            username: username.into(),
            password: password.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    /// Pool limits carried by this configuration.
    pub fn pool_limits(&self) -> PoolLimits {
        PoolLimits {
            max_idle: self.max_idle,
            max_open: self.max_open,
            max_lifetime: self.max_lifetime,
        }
    }

    /// Whether a dedicated slow-statement channel is configured.
    pub fn has_slow_logger(&self) -> bool {
        !self.slow_logger.is_empty() && !self.slow_time.is_zero()
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.addr.trim().is_empty() {
            return Err("addr must not be empty".to_string());
        }
        if self.username.is_empty() {
            return Err("username must not be empty".to_string());
        }
        if self.dsn_options.starts_with('?') {
            return Err("dsn_options must not start with '?'".to_string());
        }
        Ok(())
    }
}

impl std::fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeConfig")
            .field("addr", &self.addr)
            .field("username", &self.username)
            .field("password", &"****")
            .field("database", &self.database)
            .field("dsn_options", &self.dsn_options)
            .field("max_idle", &self.max_idle)
            .field("max_open", &self.max_open)
            .field("max_lifetime", &self.max_lifetime)
            .field("slow_time", &self.slow_time)
            .field("slow_logger", &self.slow_logger)
            .finish()
    }
}

/// Connection limits applied to a node's pool after it is opened.
///
/// Zero values keep the classic pool semantics: `max_open == 0` is unlimited,
/// `max_lifetime == 0` reuses connections forever, `max_idle == 0` retains no
/// idle connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolLimits {
    pub max_idle: u32,
    pub max_open: u32,
    pub max_lifetime: Duration,
}

impl PoolLimits {
    /// Upper bound on open connections, `None` when unlimited.
    pub fn max_open(&self) -> Option<u32> {
        (self.max_open > 0).then_some(self.max_open)
    }

    /// Idle limit, never above a limited `max_open`.
    pub fn max_idle(&self) -> u32 {
        match self.max_open() {
            Some(open) => self.max_idle.min(open),
            None => self.max_idle,
        }
    }

    /// Connection lifetime, `None` when connections never expire.
    pub fn max_lifetime(&self) -> Option<Duration> {
        (!self.max_lifetime.is_zero()).then_some(self.max_lifetime)
    }
}

/// Snapshot of a pool's state, sampled by the stats monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// 0 means unlimited
    pub max_open: u32,
    /// Established connections, both in use and idle.
    pub open: u32,
    pub in_use: u32,
    pub idle: u32,
    /// Total number of acquisitions that had to wait for a connection.
    pub wait_count: u64,
    /// Total time spent waiting for a connection.
    pub wait_duration: Duration,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

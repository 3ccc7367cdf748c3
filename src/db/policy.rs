//! Slow-operation logging policy.
//!
//! Each node reports statements through one of two policies: a quiet default
//! that discards output, or a slow-statement policy writing to a named channel.

use crate::models::NodeConfig;
use std::time::Duration;
use tracing::Level;

/// Threshold used when the node has no dedicated slow logger.
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(2000);

/// Destination for statement logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    /// Discards everything.
    Null,
    /// A named logging channel.
    Channel(String),
}

impl LogSink {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPolicy {
    pub sink: LogSink,
    /// Most verbose level emitted.
    pub level: Level,
    pub slow_threshold: Duration,
    /// Suppress "no rows" conditions from error reports.
    pub ignore_not_found: bool,
}

impl LogPolicy {
    /// Select the policy for a node.
    ///
    /// A slow logger is used only when both the channel name and a positive
    /// threshold are configured.
    pub fn for_node(config: &NodeConfig) -> Self {
        if config.has_slow_logger() {
            Self::slow(config.slow_logger.clone(), config.slow_time)
        } else {
            Self::quiet()
        }
    }

    /// Null sink, errors only.
    pub fn quiet() -> Self {
        Self {
            sink: LogSink::Null,
            level: Level::ERROR,
            slow_threshold: DEFAULT_SLOW_THRESHOLD,
            ignore_not_found: true,
        }
    }

    /// Warnings and slow statements to `channel`.
    pub fn slow(channel: impl Into<String>, threshold: Duration) -> Self {
        Self {
            sink: LogSink::Channel(channel.into()),
            level: Level::WARN,
            slow_threshold: threshold,
            ignore_not_found: false,
        }
    }

    /// Name of the channel, `None` for the null sink.
    pub fn channel(&self) -> Option<&str> {
        match &self.sink {
            LogSink::Null => None,
            LogSink::Channel(name) => Some(name),
        }
    }

    /// Level for sqlx statement logging.
    pub fn level_filter(&self) -> log::LevelFilter {
        if self.sink.is_null() {
            return log::LevelFilter::Off;
        }
        if self.level == Level::ERROR {
            log::LevelFilter::Error
        } else if self.level == Level::WARN {
            log::LevelFilter::Warn
        } else if self.level == Level::INFO {
            log::LevelFilter::Info
        } else if self.level == Level::DEBUG {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Trace
        }
    }
}

impl Default for LogPolicy {
    fn default() -> Self {
        Self::quiet()
    }
}

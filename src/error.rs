//! Error types for the node registry.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Every fallible registry operation returns a typed error; escalating to process
//! termination is left to the caller.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Opening the handle for a node failed.
    #[error("Connection failed for node '{node}': {message}")]
    Connection { node: String, message: String },

    /// The handle opened but its pool could not be retrieved.
    #[error("Pool configuration failed for node '{node}': {message}")]
    Configuration { node: String, message: String },

    #[error("MySQL node \"{node}\" not exists")]
    NodeNotFound { node: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error for a node.
    pub fn connection(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Create a pool configuration error for a node.
    pub fn configuration(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            node: node.into(),
            message: message.into(),
        }
    }

    /// Create a node not found error.
    pub fn node_not_found(node: impl Into<String>) -> Self {
        Self::NodeNotFound { node: node.into() }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Name of the node the error refers to, if any.
    pub fn node(&self) -> Option<&str> {
        match self {
            Self::Connection { node, .. }
            | Self::Configuration { node, .. }
            | Self::NodeNotFound { node } => Some(node),
            _ => None,
        }
    }

    /// Connection failures may succeed on a later `initialize` call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

/// Convert sqlx errors that surface outside node initialization.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => {
                DbError::invalid_input(format!("Invalid connection options: {}", msg))
            }
            sqlx::Error::PoolClosed => DbError::internal("Connection pool is closed"),
            sqlx::Error::PoolTimedOut => DbError::internal("Timed out acquiring a connection"),
            sqlx::Error::Io(io_err) => DbError::internal(format!("I/O error: {}", io_err)),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for registry operations.
pub type DbResult<T> = Result<T, DbError>;

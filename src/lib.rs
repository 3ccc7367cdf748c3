//! MySQL Node Registry Library
//!
//! This library keeps a registry of named MySQL connection pools. Each node is
//! opened from its own configuration, tuned, and sampled by a background stats
//! monitor; application code looks nodes up by name.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use db::{MySqlRegistry, Registry};
pub use error::{DbError, DbResult};
pub use models::NodeConfig;

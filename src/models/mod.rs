//! Data models for the node registry.
//!
//! This module re-exports all model types used throughout the application.

pub mod node;

// Re-export commonly used types
pub use node::{NodeConfig, PoolLimits, PoolStats};

//! Core types for the VoxBridge caching system.
//!
//! This crate holds the pieces shared by every cache component and by
//! external collaborators: the error taxonomy, cache categories with their
//! TTL policies, configuration, and the health vocabulary used in
//! monitoring snapshots.

pub mod category;
pub mod config;
pub mod error;
pub mod health;

pub use category::CacheCategory;
pub use config::{CacheConfig, RedisConfig};
pub use error::{CacheError, ErrorCategory, Result};
pub use health::HealthStatus;

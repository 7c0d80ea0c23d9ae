//! Cache lifecycle handle.
//!
//! One `CacheLifecycle` is constructed at process start and passed (or its
//! `Arc<MultiLevelCache>` clones are) to every consumer: explicit
//! dependency injection instead of a process-wide singleton. Teardown
//! consumes the handle, so init and shutdown each happen exactly once and
//! "not yet initialized" is unrepresentable.

use std::sync::Arc;

use voxbridge_core::{CacheConfig, Result};

use crate::coordinator::MultiLevelCache;

/// Owner of one initialized cache coordinator.
pub struct CacheLifecycle {
    cache: Arc<MultiLevelCache>,
}

impl CacheLifecycle {
    /// Validate the config, build the coordinator, connect the distributed
    /// tier and start background tasks.
    pub async fn initialize(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(MultiLevelCache::new(config));
        cache.initialize().await;
        tracing::info!("cache lifecycle initialized");
        Ok(Self { cache })
    }

    /// Handle to the coordinator for injection into consumers.
    pub fn cache(&self) -> Arc<MultiLevelCache> {
        self.cache.clone()
    }

    /// Tear down the cache system: cancels background tasks, drains
    /// warming and closes the distributed tier.
    pub async fn shutdown(self) {
        self.cache.shutdown().await;
        tracing::info!("cache lifecycle shutdown complete");
    }
}

//! Proactive cache warming.
//!
//! Warms a known key set through the same L1 → L2 → compute fallthrough as
//! a normal read, so cold starts pay the compute cost before callers do.
//! Keys already cached are skipped, keys already being warmed are not
//! duplicated, and one key's failure never aborts the batch; that key
//! just stays cold.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use futures_util::future::{BoxFuture, join_all};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use voxbridge_core::{CacheCategory, CacheConfig, Result};

use crate::coordinator::MultiLevelCache;
use crate::stats::StatsRecorder;

/// Future produced by a warming compute function.
pub type ComputeFuture = BoxFuture<'static, Result<Value>>;

/// Boxed compute function for warming task lists.
pub type ComputeFn = Box<dyn Fn() -> ComputeFuture + Send + Sync>;

/// A key to warm within a single category.
pub struct WarmingKey {
    pub key: String,
    compute: ComputeFn,
}

impl WarmingKey {
    pub fn new<F, Fut>(key: impl Into<String>, compute: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            key: key.into(),
            compute: Box::new(move || -> ComputeFuture { Box::pin(compute()) }),
        }
    }
}

/// A self-contained warming request: key, category, compute and an
/// optional TTL override.
pub struct WarmingSpec {
    pub key: String,
    pub category: CacheCategory,
    compute: ComputeFn,
    pub ttl_override: Option<Duration>,
}

impl WarmingSpec {
    pub fn new<F, Fut>(key: impl Into<String>, category: CacheCategory, compute: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            key: key.into(),
            category,
            compute: Box::new(move || -> ComputeFuture { Box::pin(compute()) }),
            ttl_override: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_override = Some(ttl);
        self
    }
}

/// Warming status for monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct WarmingStatus {
    pub enabled: bool,
    pub concurrency: usize,
    pub active_tasks: usize,
    pub active_keys: Vec<String>,
}

/// Schedules concurrent precomputation with in-flight de-duplication.
pub struct CacheWarmer {
    enabled: bool,
    concurrency: usize,
    semaphore: Arc<Semaphore>,
    in_flight: DashSet<String>,
    stats: Arc<StatsRecorder>,
}

impl CacheWarmer {
    pub fn new(config: &CacheConfig, stats: Arc<StatsRecorder>) -> Self {
        Self {
            enabled: config.warming_enabled,
            concurrency: config.warming_concurrency,
            semaphore: Arc::new(Semaphore::new(config.warming_concurrency)),
            in_flight: DashSet::new(),
            stats,
        }
    }

    /// Warm a batch of keys in one category, awaiting the whole batch.
    pub async fn warm_keys(
        &self,
        cache: &MultiLevelCache,
        category: CacheCategory,
        keys: Vec<WarmingKey>,
    ) {
        if !self.enabled {
            tracing::info!("cache warming disabled, skipping");
            return;
        }
        tracing::info!(count = keys.len(), category = %category, "starting cache warming");

        let mut tasks = Vec::with_capacity(keys.len());
        for warming_key in keys {
            if !self.in_flight.insert(warming_key.key.clone()) {
                tracing::debug!(key = %warming_key.key, "warming already in flight, skipping");
                continue;
            }
            tasks.push(self.warm_one(cache, category.clone(), warming_key, None));
        }
        join_all(tasks).await;

        tracing::info!(category = %category, "cache warming complete");
    }

    /// Warm a heterogeneous batch of specs, each with its own category and
    /// optional TTL override.
    pub async fn warm_custom(&self, cache: &MultiLevelCache, specs: Vec<WarmingSpec>) {
        if !self.enabled {
            tracing::info!("cache warming disabled, skipping custom specs");
            return;
        }
        tracing::info!(count = specs.len(), "starting custom cache warming");

        let mut tasks = Vec::with_capacity(specs.len());
        for spec in specs {
            if !self.in_flight.insert(spec.key.clone()) {
                tracing::debug!(key = %spec.key, "warming already in flight, skipping");
                continue;
            }
            let WarmingSpec {
                key,
                category,
                compute,
                ttl_override,
            } = spec;
            tasks.push(self.warm_one(cache, category, WarmingKey { key, compute }, ttl_override));
        }
        join_all(tasks).await;

        tracing::info!("custom cache warming complete");
    }

    async fn warm_one(
        &self,
        cache: &MultiLevelCache,
        category: CacheCategory,
        warming_key: WarmingKey,
        ttl_override: Option<Duration>,
    ) {
        let _permit = self.semaphore.acquire().await.ok();
        let key = warming_key.key.clone();

        if let Err(e) = self
            .warm_inner(cache, &category, warming_key, ttl_override)
            .await
        {
            tracing::error!(key = %key, category = %category, error = %e, "cache warming failed, key stays cold");
        }

        self.in_flight.remove(&key);
    }

    async fn warm_inner(
        &self,
        cache: &MultiLevelCache,
        category: &CacheCategory,
        warming_key: WarmingKey,
        ttl_override: Option<Duration>,
    ) -> Result<()> {
        if cache.get(&warming_key.key, category).await.is_some() {
            tracing::debug!(key = %warming_key.key, "already cached, skipping warm");
            return Ok(());
        }

        match ttl_override {
            Some(ttl) => {
                let value = (warming_key.compute)().await?;
                cache
                    .set_with_ttl(&warming_key.key, value, category, ttl)
                    .await;
            }
            None => {
                cache
                    .get_or_compute(&warming_key.key, category, || (warming_key.compute)())
                    .await?;
            }
        }

        self.stats.record_warming_operation();
        tracing::debug!(key = %warming_key.key, category = %category, "cache key warmed");
        Ok(())
    }

    /// Current warming status for monitoring.
    pub fn status(&self) -> WarmingStatus {
        WarmingStatus {
            enabled: self.enabled,
            concurrency: self.concurrency,
            active_tasks: self.in_flight.len(),
            active_keys: self
                .in_flight
                .iter()
                .take(10)
                .map(|key| key.key().clone())
                .collect(),
        }
    }

    /// Number of warming tasks currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Drop bookkeeping for any leftover in-flight keys.
    pub fn shutdown(&self) {
        let active = self.in_flight.len();
        if active > 0 {
            tracing::info!(count = active, "clearing in-flight warming tasks");
        }
        self.in_flight.clear();
        tracing::info!("cache warmer shutdown complete");
    }
}

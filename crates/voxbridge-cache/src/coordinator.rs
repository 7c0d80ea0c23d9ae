//! Multi-level cache coordinator.
//!
//! ## Cache Hierarchy
//!
//! ```text
//! get(key) → L1 (in-process) → L2 (Redis) → compute function
//!                 ↓                 ↓             ↓
//!             instant           ~ms latency   caller-supplied cost
//! ```
//!
//! An L2 hit backfills L1; a double miss runs the caller's compute
//! function and schedules a fire-and-forget write-back into both tiers.
//! Tier failures degrade to the next level and never surface to callers;
//! only compute errors cross this boundary.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use voxbridge_core::{CacheCategory, CacheConfig, CacheError, HealthStatus, Result};

use crate::l1::L1Store;
use crate::l2::{L2Client, L2Health};
use crate::metrics;
use crate::stats::{StatsRecorder, StatsSnapshot};
use crate::warmer::{CacheWarmer, WarmingKey, WarmingSpec, WarmingStatus};

/// Interval between metrics gauge refreshes.
const METRICS_INTERVAL: Duration = Duration::from_secs(30);

/// L1 tier health details.
#[derive(Debug, Clone, Serialize)]
pub struct L1Health {
    pub size: usize,
    pub max_size: usize,
    pub utilization_percent: f64,
}

/// Effective configuration echoed in health reports.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub business_lookup_ttl_secs: u64,
    pub knowledge_base_ttl_secs: u64,
    pub compression_enabled: bool,
    pub warming_enabled: bool,
}

/// Aggregate health snapshot for monitoring collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub l1_cache: L1Health,
    pub l2_cache: L2Health,
    pub statistics: StatsSnapshot,
    pub configuration: ConfigSummary,
}

/// Statistics report including tier sizes and warming state.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsReport {
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    pub l1_cache_size: usize,
    pub warming: WarmingStatus,
}

/// Two-tier cache with compute fallthrough, warming and invalidation.
pub struct MultiLevelCache {
    config: CacheConfig,
    stats: Arc<StatsRecorder>,
    l1: Arc<L1Store>,
    l2: Arc<L2Client>,
    warmer: CacheWarmer,
    metrics_task: Mutex<Option<JoinHandle<()>>>,
    initialized: AtomicBool,
}

impl MultiLevelCache {
    pub fn new(config: CacheConfig) -> Self {
        let stats = Arc::new(StatsRecorder::new());
        let l1 = Arc::new(L1Store::new(config.l1_max_size, config.l1_ttl()));
        let l2 = Arc::new(L2Client::new(config.clone(), stats.clone()));
        let warmer = CacheWarmer::new(&config, stats.clone());

        Self {
            config,
            stats,
            l1,
            l2,
            warmer,
            metrics_task: Mutex::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    /// Connect the distributed tier and start the periodic metrics task.
    /// Calling twice is a logged no-op.
    pub async fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            tracing::warn!("cache already initialized");
            return;
        }

        let connected = self.l2.connect().await;

        let stats = self.stats.clone();
        let l1 = self.l1.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(METRICS_INTERVAL);
            loop {
                interval.tick().await;
                let snapshot = stats.snapshot();
                metrics::set_hit_rate("l1", snapshot.performance.l1_hit_rate);
                metrics::set_hit_rate("l2", snapshot.performance.l2_hit_rate);
                metrics::set_hit_rate("overall", snapshot.performance.overall_hit_rate);
                metrics::set_cache_size("l1", l1.len());
            }
        });
        *self.metrics_task.lock() = Some(handle);

        tracing::info!(
            l1_size = self.config.l1_max_size,
            l1_ttl_secs = self.config.l1_ttl_secs,
            business_ttl_secs = self.config.business_lookup_ttl_secs,
            knowledge_ttl_secs = self.config.knowledge_base_ttl_secs,
            l2_connected = connected,
            "multi-level cache initialized"
        );
    }

    /// Tear down background work and close the distributed tier.
    /// Idempotent; the metrics task is cancelled and awaited.
    pub async fn shutdown(&self) {
        if !self.initialized.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::info!("shutting down cache system");

        let handle = self.metrics_task.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }

        self.warmer.shutdown();
        self.l2.close();

        tracing::info!("multi-level cache shutdown complete");
    }

    fn l1_key(key: &str, category: &CacheCategory) -> String {
        format!("{}:{key}", category.name())
    }

    /// Get a value, falling through L1 → L2 and backfilling L1 on an L2
    /// hit. Tier failures are contained and reported as a miss.
    pub async fn get(&self, key: &str, category: &CacheCategory) -> Option<Value> {
        let started = Instant::now();
        let l1_key = Self::l1_key(key, category);

        if let Some(value) = self.l1.get(&l1_key) {
            self.stats.record_l1_hit();
            tracing::debug!(key = %key, category = %category, "L1 cache hit");
            return Some(value);
        }
        self.stats.record_l1_miss();
        tracing::debug!(key = %key, category = %category, "L1 cache miss");

        if let Some(value) = self.l2.get(key, category).await {
            self.stats.record_l2_hit();
            self.l1.insert(l1_key, value.clone());
            self.stats
                .record_operation_time("cache_get", started.elapsed());
            return Some(value);
        }
        self.stats.record_l2_miss();
        tracing::debug!(key = %key, category = %category, "L2 cache miss");

        self.stats
            .record_operation_time("cache_get", started.elapsed());
        None
    }

    /// Get a value or compute it on a double miss.
    ///
    /// The computed value is returned immediately; writing it back into
    /// both tiers happens on a background task and is best-effort. Compute
    /// errors propagate to the caller, caching errors never do.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        category: &CacheCategory,
        compute: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if let Some(value) = self.get(key, category).await {
            return Ok(value);
        }

        let started = Instant::now();
        tracing::debug!(key = %key, category = %category, "computing value on cache miss");
        let value = match compute().await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key = %key, category = %category, error = %e, "error computing cache value");
                self.stats.record_error("compute_error");
                return Err(e);
            }
        };
        self.stats.record_compute();

        self.write_back(key.to_string(), value.clone(), category.clone());
        self.stats
            .record_operation_time("cache_get_with_compute", started.elapsed());
        Ok(value)
    }

    /// Like [`get_or_compute`](Self::get_or_compute) for synchronous
    /// compute functions, which run on the blocking pool instead of
    /// stalling the scheduler.
    pub async fn get_or_compute_blocking<F>(
        &self,
        key: &str,
        category: &CacheCategory,
        compute: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Result<Value> + Send + 'static,
    {
        self.get_or_compute(key, category, || async move {
            match tokio::task::spawn_blocking(compute).await {
                Ok(result) => result,
                Err(e) => Err(CacheError::compute(format!(
                    "blocking compute task failed: {e}"
                ))),
            }
        })
        .await
    }

    /// Higher-order caching wrapper: derive a key, then serve the cached
    /// value or compute it.
    pub async fn cached<K, F, Fut>(
        &self,
        category: &CacheCategory,
        key_fn: K,
        compute: F,
    ) -> Result<Value>
    where
        K: FnOnce() -> String,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let key = key_fn();
        self.get_or_compute(&key, category, compute).await
    }

    fn write_back(&self, key: String, value: Value, category: CacheCategory) {
        let l1 = self.l1.clone();
        let l2 = self.l2.clone();
        let ttl = self.config.ttl_for(&category);
        tokio::spawn(async move {
            l1.insert(Self::l1_key(&key, &category), value.clone());
            if !l2.set(&key, &value, ttl, &category).await {
                tracing::debug!(key = %key, category = %category, "write-back to L2 did not complete");
            }
        });
    }

    /// Write a value to both tiers with the category TTL. Returns whether
    /// the L1 write succeeded; L2 failure only degrades.
    pub async fn set(&self, key: &str, value: Value, category: &CacheCategory) -> bool {
        let ttl = self.config.ttl_for(category);
        self.set_with_ttl(key, value, category, ttl).await
    }

    /// Write a value to both tiers with an explicit TTL.
    pub async fn set_with_ttl(
        &self,
        key: &str,
        value: Value,
        category: &CacheCategory,
        ttl: Duration,
    ) -> bool {
        self.l1.insert(Self::l1_key(key, category), value.clone());
        let l2_written = self.l2.set(key, &value, ttl, category).await;
        tracing::debug!(key = %key, category = %category, l2 = l2_written, "cache set");
        true
    }

    /// Remove a key from both tiers. Returns the L2 outcome even when the
    /// key only lived in L1.
    pub async fn delete(&self, key: &str, category: &CacheCategory) -> bool {
        if self.l1.remove(&Self::l1_key(key, category)) {
            tracing::debug!(key = %key, category = %category, "L1 cache delete");
        }
        self.l2.delete(key, category).await
    }

    /// Clear keys matching a `*` wildcard pattern within one category,
    /// across both tiers. Returns the summed count.
    pub async fn clear_pattern(&self, pattern: &str, category: &CacheCategory) -> usize {
        let prefix = format!("{}:", category.name());
        let matcher = wildcard_matcher(pattern);

        let mut l1_cleared = 0;
        for l1_key in self.l1.keys() {
            if let Some(key) = l1_key.strip_prefix(&prefix) {
                let matched = matcher
                    .as_ref()
                    .map_or(key == pattern, |regex| regex.is_match(key));
                if matched && self.l1.remove(&l1_key) {
                    l1_cleared += 1;
                }
            }
        }

        let l2_cleared = self.l2.clear_pattern(pattern, category).await;

        tracing::info!(
            pattern = %pattern,
            category = %category,
            l1_cleared,
            l2_cleared,
            "cache pattern cleared"
        );
        l1_cleared + l2_cleared
    }

    // ------------------------------------------------------------------
    // Convenience wrappers for the well-known categories
    // ------------------------------------------------------------------

    /// Cached business record lookup keyed by phone number.
    pub async fn get_business_lookup<F, Fut>(&self, phone: &str, compute: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        self.get_or_compute(
            &format!("business:{phone}"),
            &CacheCategory::BusinessLookup,
            compute,
        )
        .await
    }

    /// Cached knowledge-base query. The free-text query is hashed so keys
    /// stay bounded in length.
    pub async fn get_knowledge_base<F, Fut>(
        &self,
        business_id: &str,
        query: &str,
        compute: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        self.get_or_compute(
            &knowledge_base_key(business_id, query),
            &CacheCategory::KnowledgeBase,
            compute,
        )
        .await
    }

    /// Drop the cached record for one business.
    pub async fn invalidate_business(&self, phone: &str) -> bool {
        let deleted = self
            .delete(&format!("business:{phone}"), &CacheCategory::BusinessLookup)
            .await;
        tracing::info!(phone = %phone, "invalidated business cache");
        deleted
    }

    /// Drop every cached knowledge-base query for one business.
    pub async fn invalidate_knowledge_base(&self, business_id: &str) -> usize {
        let cleared = self
            .clear_pattern(
                &format!("kb:{business_id}:*"),
                &CacheCategory::KnowledgeBase,
            )
            .await;
        tracing::info!(business_id = %business_id, cleared, "invalidated knowledge base cache");
        cleared
    }

    // ------------------------------------------------------------------
    // Warming
    // ------------------------------------------------------------------

    /// Warm a batch of keys in one category.
    pub async fn warm_keys(&self, category: CacheCategory, keys: Vec<WarmingKey>) {
        self.warmer.warm_keys(self, category, keys).await;
    }

    /// Warm a heterogeneous batch of specs.
    pub async fn warm_custom(&self, specs: Vec<WarmingSpec>) {
        self.warmer.warm_custom(self, specs).await;
    }

    pub fn warming_status(&self) -> WarmingStatus {
        self.warmer.status()
    }

    /// Number of warming tasks currently in flight.
    pub fn warming_in_flight(&self) -> usize {
        self.warmer.in_flight_count()
    }

    // ------------------------------------------------------------------
    // Monitoring
    // ------------------------------------------------------------------

    /// Aggregate health across both tiers: healthy only when L2 is.
    pub async fn health_check(&self) -> HealthReport {
        let l2_health = self.l2.health_check().await;
        let status = if l2_health.status.is_healthy() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        HealthReport {
            status,
            l1_cache: L1Health {
                size: self.l1.len(),
                max_size: self.l1.capacity(),
                utilization_percent: self.l1.utilization_percent(),
            },
            l2_cache: l2_health,
            statistics: self.stats.snapshot(),
            configuration: ConfigSummary {
                business_lookup_ttl_secs: self.config.business_lookup_ttl_secs,
                knowledge_base_ttl_secs: self.config.knowledge_base_ttl_secs,
                compression_enabled: self.config.compression_enabled,
                warming_enabled: self.config.warming_enabled,
            },
        }
    }

    /// Counters, derived rates and warming status.
    pub fn stats(&self) -> CacheStatsReport {
        CacheStatsReport {
            stats: self.stats.snapshot(),
            l1_cache_size: self.l1.len(),
            warming: self.warmer.status(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

/// Compile a `*` wildcard pattern into an anchored regex. `None` means the
/// pattern should be compared literally.
fn wildcard_matcher(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("^{escaped}$")).ok()
}

/// Knowledge-base cache key: business id plus a bounded hash of the query.
pub fn knowledge_base_key(business_id: &str, query: &str) -> String {
    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    format!("kb:{business_id}:{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l1_key_namespacing() {
        assert_eq!(
            MultiLevelCache::l1_key("k", &CacheCategory::BusinessLookup),
            "business_lookup:k"
        );
    }

    #[test]
    fn test_wildcard_matcher() {
        let matcher = wildcard_matcher("pattern_test_*").expect("compile");
        assert!(matcher.is_match("pattern_test_1"));
        assert!(matcher.is_match("pattern_test_"));
        assert!(!matcher.is_match("other_key"));
        assert!(!matcher.is_match("prefix_pattern_test_1"));

        let exact = wildcard_matcher("plain").expect("compile");
        assert!(exact.is_match("plain"));
        assert!(!exact.is_match("plainer"));
    }

    #[test]
    fn test_knowledge_base_key_bounded_and_stable() {
        let long_query = "how do I reset my router password ".repeat(50);
        let key = knowledge_base_key("biz-1", &long_query);
        assert!(key.len() < 64);
        assert_eq!(key, knowledge_base_key("biz-1", &long_query));
        assert_ne!(key, knowledge_base_key("biz-1", "different query"));
    }
}

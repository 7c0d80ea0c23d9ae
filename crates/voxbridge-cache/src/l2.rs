//! Distributed (L2) cache tier backed by Redis.
//!
//! ## Resilience
//!
//! Every wire operation runs through the retry executor, and every attempt
//! through the circuit breaker. While disconnected (Redis disabled, pool
//! creation failed, or the initial ping refused) every operation degrades
//! to a no-op miss/false so the coordinator can still serve from L1 or
//! compute.
//!
//! ## Key Namespace
//!
//! Wire keys are `voxbridge:<category>:<key>`, so pattern clears stay
//! scoped to one category.

use std::time::{Duration, Instant};

use deadpool_redis::Pool;
use parking_lot::RwLock;
use redis::AsyncCommands;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use voxbridge_core::{CacheCategory, CacheConfig, HealthStatus, Result};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerStatus};
use crate::retry::RetryExecutor;
use crate::serializer::{self, Serializer};
use crate::stats::StatsRecorder;

/// Fixed prefix partitioning the distributed keyspace.
pub const KEY_PREFIX: &str = "voxbridge";

/// SCAN page size when enumerating keys for a pattern clear.
const SCAN_COUNT: usize = 100;

/// Keys deleted per DEL command during a pattern clear.
const DELETE_BATCH: usize = 100;

/// L2 tier health snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct L2Health {
    pub status: HealthStatus,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub circuit_breaker: CircuitBreakerStatus,
}

/// Client for the distributed cache tier.
pub struct L2Client {
    config: CacheConfig,
    pool: RwLock<Option<Pool>>,
    serializer: Serializer,
    breaker: Arc<CircuitBreaker>,
    retry: RetryExecutor,
    stats: Arc<StatsRecorder>,
}

impl L2Client {
    pub fn new(config: CacheConfig, stats: Arc<StatsRecorder>) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(
            "redis_cache",
            config.circuit_breaker_threshold,
            Duration::from_secs(config.circuit_breaker_timeout_secs),
        ));
        let retry = RetryExecutor::new(
            config.max_retries,
            Duration::from_millis(config.retry_delay_ms),
            breaker.clone(),
            stats.clone(),
        );
        let serializer = Serializer::new(config.compression_enabled, config.compression_threshold);

        Self {
            config,
            pool: RwLock::new(None),
            serializer,
            breaker,
            retry,
            stats,
        }
    }

    /// Connect to Redis, verifying with a ping.
    ///
    /// Failure leaves the client disconnected and the tier degraded rather
    /// than failing startup. Returns whether the client is connected.
    pub async fn connect(&self) -> bool {
        if !self.config.redis.enabled {
            tracing::info!("redis disabled, L2 tier will serve misses only");
            return false;
        }

        let timeout = Duration::from_millis(self.config.redis.timeout_ms);
        let mut redis_config = deadpool_redis::Config::from_url(&self.config.redis.url);
        let mut pool_config = deadpool_redis::PoolConfig::new(self.config.redis.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        redis_config.pool = Some(pool_config);

        let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
            Ok(pool) => pool,
            Err(e) => {
                tracing::warn!(error = %e, "failed to create redis pool, L2 tier disabled");
                self.stats.record_error("connection_error");
                return false;
            }
        };

        let ping: Result<()> = async {
            let mut conn = pool.get().await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        }
        .await;

        match ping {
            Ok(()) => {
                *self.pool.write() = Some(pool);
                tracing::info!(url = %self.config.redis.url, "connected to redis");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to connect to redis, L2 tier disabled");
                self.stats.record_error("connection_error");
                false
            }
        }
    }

    /// Close the connection pool. Safe to call when never connected.
    pub fn close(&self) {
        if let Some(pool) = self.pool.write().take() {
            pool.close();
            tracing::info!("redis connection pool closed");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.pool.read().is_some()
    }

    fn wire_key(key: &str, category: &CacheCategory) -> String {
        format!("{KEY_PREFIX}:{}:{key}", category.name())
    }

    /// Get and decode a value. Backend failures degrade to a miss; a
    /// corrupt stored value is logged, counted and evicted.
    pub async fn get(&self, key: &str, category: &CacheCategory) -> Option<Value> {
        let Some(pool) = self.pool.read().clone() else {
            tracing::debug!("redis not connected, skipping get");
            return None;
        };

        let full_key = Self::wire_key(key, category);
        let started = Instant::now();
        let result = self
            .retry
            .execute(|| {
                let pool = pool.clone();
                let full_key = full_key.clone();
                async move {
                    let mut conn = pool.get().await?;
                    let data: Option<Vec<u8>> = conn.get(&full_key).await?;
                    Ok(data)
                }
            })
            .await;
        self.stats.record_operation_time("l2_get", started.elapsed());

        match result {
            Ok(Some(data)) => match self.serializer.decode(&data) {
                Ok(value) => {
                    tracing::debug!(key = %key, category = %category, "redis cache hit");
                    Some(value)
                }
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "failed to deserialize cached value");
                    self.stats.record_error("deserialization_error");
                    self.evict_corrupt(&pool, full_key);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::error!(key = %key, category = %category, error = %e, "error getting from redis cache");
                self.stats.record_error("l2_get_error");
                None
            }
        }
    }

    /// Serialize and store a value with a TTL. Returns whether the write
    /// reached the backend.
    pub async fn set(
        &self,
        key: &str,
        value: &Value,
        ttl: Duration,
        category: &CacheCategory,
    ) -> bool {
        let Some(pool) = self.pool.read().clone() else {
            tracing::debug!("redis not connected, skipping set");
            return false;
        };

        let data = match self.serializer.encode(value) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "failed to serialize value for cache");
                self.stats.record_error("serialization_error");
                return false;
            }
        };
        if serializer::is_compressed(&data) {
            self.stats.record_compression_save();
        }

        let full_key = Self::wire_key(key, category);
        let ttl_secs = ttl.as_secs().max(1);
        let started = Instant::now();
        let result = self
            .retry
            .execute(|| {
                let pool = pool.clone();
                let full_key = full_key.clone();
                let data = data.clone();
                async move {
                    let mut conn = pool.get().await?;
                    conn.set_ex::<_, _, ()>(&full_key, data.as_slice(), ttl_secs)
                        .await?;
                    Ok(())
                }
            })
            .await;
        self.stats.record_operation_time("l2_set", started.elapsed());

        match result {
            Ok(()) => {
                tracing::debug!(key = %key, category = %category, ttl_secs, "redis cache set");
                true
            }
            Err(e) => {
                tracing::error!(key = %key, category = %category, error = %e, "error setting in redis cache");
                self.stats.record_error("l2_set_error");
                false
            }
        }
    }

    /// Delete a key. Returns whether the backend removed anything.
    pub async fn delete(&self, key: &str, category: &CacheCategory) -> bool {
        let Some(pool) = self.pool.read().clone() else {
            return false;
        };

        let full_key = Self::wire_key(key, category);
        let result = self
            .retry
            .execute(|| {
                let pool = pool.clone();
                let full_key = full_key.clone();
                async move {
                    let mut conn = pool.get().await?;
                    let removed: u64 = conn.del(&full_key).await?;
                    Ok(removed)
                }
            })
            .await;

        match result {
            Ok(removed) => {
                tracing::debug!(key = %key, category = %category, removed, "redis cache delete");
                removed > 0
            }
            Err(e) => {
                tracing::error!(key = %key, category = %category, error = %e, "error deleting from redis cache");
                self.stats.record_error("l2_delete_error");
                false
            }
        }
    }

    /// Check key existence without fetching the value.
    pub async fn exists(&self, key: &str, category: &CacheCategory) -> bool {
        let Some(pool) = self.pool.read().clone() else {
            return false;
        };

        let full_key = Self::wire_key(key, category);
        let result = self
            .retry
            .execute(|| {
                let pool = pool.clone();
                let full_key = full_key.clone();
                async move {
                    let mut conn = pool.get().await?;
                    let found: u64 = conn.exists(&full_key).await?;
                    Ok(found)
                }
            })
            .await;

        match result {
            Ok(found) => found > 0,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "error checking existence in redis cache");
                false
            }
        }
    }

    /// Delete all keys matching a wildcard pattern within a category.
    ///
    /// Keys are enumerated with cursor-based SCAN and deleted in bounded
    /// batches so a broad pattern never turns into one oversized request.
    pub async fn clear_pattern(&self, pattern: &str, category: &CacheCategory) -> usize {
        let Some(pool) = self.pool.read().clone() else {
            return 0;
        };

        let full_pattern = Self::wire_key(pattern, category);
        let scanned = self
            .retry
            .execute(|| {
                let pool = pool.clone();
                let full_pattern = full_pattern.clone();
                async move {
                    let mut conn = pool.get().await?;
                    let mut cursor: u64 = 0;
                    let mut keys: Vec<String> = Vec::new();
                    loop {
                        let (next, page): (u64, Vec<String>) = redis::cmd("SCAN")
                            .arg(cursor)
                            .arg("MATCH")
                            .arg(&full_pattern)
                            .arg("COUNT")
                            .arg(SCAN_COUNT)
                            .query_async(&mut conn)
                            .await?;
                        keys.extend(page);
                        cursor = next;
                        if cursor == 0 {
                            break;
                        }
                    }
                    Ok(keys)
                }
            })
            .await;

        let keys = match scanned {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!(pattern = %pattern, category = %category, error = %e, "error scanning pattern in redis cache");
                self.stats.record_error("l2_clear_pattern_error");
                return 0;
            }
        };
        if keys.is_empty() {
            return 0;
        }

        let mut deleted = 0usize;
        for chunk in keys.chunks(DELETE_BATCH) {
            let batch: Vec<String> = chunk.to_vec();
            let result = self
                .retry
                .execute(|| {
                    let pool = pool.clone();
                    let batch = batch.clone();
                    async move {
                        let mut conn = pool.get().await?;
                        let removed: u64 = conn.del(&batch).await?;
                        Ok(removed)
                    }
                })
                .await;
            match result {
                Ok(removed) => deleted += removed as usize,
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "failed to delete batch during pattern clear");
                    self.stats.record_error("l2_clear_pattern_error");
                }
            }
        }

        tracing::info!(pattern = %pattern, category = %category, deleted, "cleared redis cache pattern");
        deleted
    }

    /// Ping the backend and report tier health.
    pub async fn health_check(&self) -> L2Health {
        let Some(pool) = self.pool.read().clone() else {
            return L2Health {
                status: HealthStatus::Unhealthy,
                connected: false,
                latency_ms: None,
                error: Some("not connected".to_string()),
                circuit_breaker: self.breaker.status(),
            };
        };

        let started = Instant::now();
        let ping: Result<()> = async {
            let mut conn = pool.get().await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        }
        .await;

        match ping {
            Ok(()) => L2Health {
                status: HealthStatus::Healthy,
                connected: true,
                latency_ms: Some((started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0),
                error: None,
                circuit_breaker: self.breaker.status(),
            },
            Err(e) => L2Health {
                status: HealthStatus::Unhealthy,
                connected: true,
                latency_ms: None,
                error: Some(e.to_string()),
                circuit_breaker: self.breaker.status(),
            },
        }
    }

    /// Breaker status for diagnostics.
    pub fn breaker_status(&self) -> CircuitBreakerStatus {
        self.breaker.status()
    }

    // Corrupt entries are evicted so the next read recomputes instead of
    // failing the same way forever.
    fn evict_corrupt(&self, pool: &Pool, full_key: String) {
        let pool = pool.clone();
        tokio::spawn(async move {
            if let Ok(mut conn) = pool.get().await {
                if let Err(e) = conn.del::<_, ()>(&full_key).await {
                    tracing::warn!(key = %full_key, error = %e, "failed to evict corrupt entry");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn disconnected_client() -> L2Client {
        let config = CacheConfig {
            redis: voxbridge_core::RedisConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        L2Client::new(config, Arc::new(StatsRecorder::new()))
    }

    #[test]
    fn test_wire_key_namespacing() {
        assert_eq!(
            L2Client::wire_key("business:+14155551234", &CacheCategory::BusinessLookup),
            "voxbridge:business_lookup:business:+14155551234"
        );
        assert_eq!(
            L2Client::wire_key("k", &CacheCategory::Custom("sessions".into())),
            "voxbridge:sessions:k"
        );
    }

    #[tokio::test]
    async fn test_disabled_redis_stays_disconnected() {
        let client = disconnected_client();
        assert!(!client.connect().await);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_disconnected_operations_degrade() {
        let client = disconnected_client();
        let category = CacheCategory::Default;

        assert!(client.get("k", &category).await.is_none());
        assert!(
            !client
                .set("k", &json!("v"), Duration::from_secs(60), &category)
                .await
        );
        assert!(!client.delete("k", &category).await);
        assert!(!client.exists("k", &category).await);
        assert_eq!(client.clear_pattern("*", &category).await, 0);
    }

    #[tokio::test]
    async fn test_disconnected_health_is_unhealthy() {
        let client = disconnected_client();
        let health = client.health_check().await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert!(!health.connected);
        assert_eq!(health.error.as_deref(), Some("not connected"));
    }

    #[tokio::test]
    async fn test_close_without_connection_is_noop() {
        let client = disconnected_client();
        client.close();
        assert!(!client.is_connected());
    }
}

//! Cache configuration.
//!
//! Constructed once, from explicit values or the environment, and immutable
//! for the life of a cache coordinator. Every field carries a serde default
//! so partial TOML/JSON sources deserialize into a fully-populated config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::category::CacheCategory;
use crate::error::{CacheError, Result};

/// Configuration for the multi-level cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries in the in-process (L1) tier
    #[serde(default = "default_l1_max_size")]
    pub l1_max_size: usize,

    /// Global TTL for the L1 tier, in seconds.
    ///
    /// Applies to every L1 entry regardless of category; per-category TTLs
    /// only govern the distributed tier.
    #[serde(default = "default_l1_ttl_secs")]
    pub l1_ttl_secs: u64,

    /// Distributed (L2) tier connection settings
    #[serde(default)]
    pub redis: RedisConfig,

    /// TTL for business lookup entries, in seconds (business info is stable)
    #[serde(default = "default_business_lookup_ttl_secs")]
    pub business_lookup_ttl_secs: u64,

    /// TTL for knowledge-base query entries, in seconds
    #[serde(default = "default_knowledge_base_ttl_secs")]
    pub knowledge_base_ttl_secs: u64,

    /// TTL for uncategorized L2 entries, in seconds
    #[serde(default = "default_l2_ttl_secs")]
    pub l2_default_ttl_secs: u64,

    /// Compress serialized values larger than the threshold
    #[serde(default = "default_compression_enabled")]
    pub compression_enabled: bool,

    /// Minimum serialized size, in bytes, before compression kicks in
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,

    /// Retry attempts after the first failure of an L2 operation
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries, in milliseconds (doubles per attempt)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Consecutive failures before the circuit breaker opens
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,

    /// Cooldown, in seconds, before an open breaker allows a probe
    #[serde(default = "default_circuit_breaker_timeout_secs")]
    pub circuit_breaker_timeout_secs: u64,

    /// Enable proactive cache warming
    #[serde(default = "default_warming_enabled")]
    pub warming_enabled: bool,

    /// Maximum concurrent warming tasks
    #[serde(default = "default_warming_concurrency")]
    pub warming_concurrency: usize,
}

/// Redis connection settings for the L2 tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable the distributed tier (gracefully degrades without it)
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g. "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_l1_max_size() -> usize {
    500
}

fn default_l1_ttl_secs() -> u64 {
    300 // 5 minutes
}

fn default_business_lookup_ttl_secs() -> u64 {
    1800 // 30 minutes
}

fn default_knowledge_base_ttl_secs() -> u64 {
    3600 // 1 hour
}

fn default_l2_ttl_secs() -> u64 {
    3600
}

fn default_compression_enabled() -> bool {
    true
}

fn default_compression_threshold() -> usize {
    1024 // compress if > 1KB
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_circuit_breaker_threshold() -> u32 {
    5
}

fn default_circuit_breaker_timeout_secs() -> u64 {
    30
}

fn default_warming_enabled() -> bool {
    true
}

fn default_warming_concurrency() -> usize {
    4
}

fn default_redis_enabled() -> bool {
    true
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_max_size: default_l1_max_size(),
            l1_ttl_secs: default_l1_ttl_secs(),
            redis: RedisConfig::default(),
            business_lookup_ttl_secs: default_business_lookup_ttl_secs(),
            knowledge_base_ttl_secs: default_knowledge_base_ttl_secs(),
            l2_default_ttl_secs: default_l2_ttl_secs(),
            compression_enabled: default_compression_enabled(),
            compression_threshold: default_compression_threshold(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            circuit_breaker_threshold: default_circuit_breaker_threshold(),
            circuit_breaker_timeout_secs: default_circuit_breaker_timeout_secs(),
            warming_enabled: default_warming_enabled(),
            warming_concurrency: default_warming_concurrency(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|raw| raw.to_ascii_lowercase() == "true")
        .unwrap_or(default)
}

impl CacheConfig {
    /// Create a config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            l1_max_size: env_parse("CACHE_L1_SIZE", defaults.l1_max_size),
            l1_ttl_secs: env_parse("CACHE_L1_TTL", defaults.l1_ttl_secs),
            redis: RedisConfig {
                enabled: env_bool("REDIS_ENABLED", defaults.redis.enabled),
                url: std::env::var("REDIS_URL").unwrap_or(defaults.redis.url),
                pool_size: env_parse("REDIS_POOL_SIZE", defaults.redis.pool_size),
                timeout_ms: env_parse("REDIS_TIMEOUT_MS", defaults.redis.timeout_ms),
            },
            business_lookup_ttl_secs: env_parse(
                "CACHE_BUSINESS_TTL",
                defaults.business_lookup_ttl_secs,
            ),
            knowledge_base_ttl_secs: env_parse(
                "CACHE_KNOWLEDGE_TTL",
                defaults.knowledge_base_ttl_secs,
            ),
            l2_default_ttl_secs: env_parse("CACHE_L2_TTL", defaults.l2_default_ttl_secs),
            compression_enabled: env_bool("CACHE_COMPRESSION", defaults.compression_enabled),
            compression_threshold: env_parse(
                "CACHE_COMPRESSION_THRESHOLD",
                defaults.compression_threshold,
            ),
            max_retries: env_parse("CACHE_MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env_parse("CACHE_RETRY_DELAY_MS", defaults.retry_delay_ms),
            circuit_breaker_threshold: env_parse(
                "CACHE_CB_THRESHOLD",
                defaults.circuit_breaker_threshold,
            ),
            circuit_breaker_timeout_secs: env_parse(
                "CACHE_CB_TIMEOUT",
                defaults.circuit_breaker_timeout_secs,
            ),
            warming_enabled: env_bool("CACHE_WARMING", defaults.warming_enabled),
            warming_concurrency: env_parse(
                "CACHE_WARMING_CONCURRENCY",
                defaults.warming_concurrency,
            ),
        }
    }

    /// Validate invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.l1_max_size == 0 {
            return Err(CacheError::configuration("l1_max_size must be > 0"));
        }
        if self.l1_ttl_secs == 0 {
            return Err(CacheError::configuration("l1_ttl_secs must be > 0"));
        }
        if self.redis.pool_size == 0 {
            return Err(CacheError::configuration("redis.pool_size must be > 0"));
        }
        if self.circuit_breaker_threshold == 0 {
            return Err(CacheError::configuration(
                "circuit_breaker_threshold must be > 0",
            ));
        }
        if self.warming_concurrency == 0 {
            return Err(CacheError::configuration(
                "warming_concurrency must be > 0",
            ));
        }
        Ok(())
    }

    /// TTL policy for a category, used for L2 writes.
    pub fn ttl_for(&self, category: &CacheCategory) -> Duration {
        let secs = match category {
            CacheCategory::BusinessLookup => self.business_lookup_ttl_secs,
            CacheCategory::KnowledgeBase => self.knowledge_base_ttl_secs,
            CacheCategory::Default | CacheCategory::Custom(_) => self.l1_ttl_secs,
        };
        Duration::from_secs(secs)
    }

    /// Global TTL ceiling for the L1 tier.
    pub fn l1_ttl(&self) -> Duration {
        Duration::from_secs(self.l1_ttl_secs)
    }

    /// Effective L1 lifetime for a category: the category TTL clamped to
    /// the L1 ceiling.
    pub fn l1_ttl_for(&self, category: &CacheCategory) -> Duration {
        self.ttl_for(category).min(self.l1_ttl())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.l1_max_size, 500);
        assert_eq!(config.l1_ttl_secs, 300);
        assert_eq!(config.business_lookup_ttl_secs, 1800);
        assert_eq!(config.knowledge_base_ttl_secs, 3600);
        assert!(config.compression_enabled);
        assert_eq!(config.compression_threshold, 1024);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.circuit_breaker_threshold, 5);
        assert!(config.warming_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"l1_max_size": 50, "redis": {"enabled": false}}"#)
                .expect("deserialize partial config");
        assert_eq!(config.l1_max_size, 50);
        assert!(!config.redis.enabled);
        assert_eq!(config.redis.url, "redis://localhost:6379");
        assert_eq!(config.knowledge_base_ttl_secs, 3600);
    }

    #[test]
    fn test_validation_rejects_zero_sizes() {
        let config = CacheConfig {
            l1_max_size: 0,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());

        let config = CacheConfig {
            warming_concurrency: 0,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ttl_policy_table() {
        let config = CacheConfig::default();
        assert_eq!(
            config.ttl_for(&CacheCategory::BusinessLookup),
            Duration::from_secs(1800)
        );
        assert_eq!(
            config.ttl_for(&CacheCategory::KnowledgeBase),
            Duration::from_secs(3600)
        );
        // Unknown categories fall back to the short default.
        assert_eq!(
            config.ttl_for(&CacheCategory::Custom("sessions".into())),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_l1_ttl_clamped_to_ceiling() {
        let config = CacheConfig::default();
        assert_eq!(
            config.l1_ttl_for(&CacheCategory::BusinessLookup),
            Duration::from_secs(300)
        );
        assert_eq!(
            config.l1_ttl_for(&CacheCategory::Default),
            Duration::from_secs(300)
        );
    }
}

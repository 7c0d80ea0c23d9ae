//! Resilient two-tier lookup cache.
//!
//! ## Architecture
//!
//! - **L1 ([`L1Store`])**: in-process, bounded, single global TTL
//! - **L2 ([`L2Client`])**: Redis, per-category TTL, retry + circuit breaker
//! - **Coordinator ([`MultiLevelCache`])**: L1 → L2 → compute fallthrough,
//!   backfill, pattern invalidation, health reporting
//! - **Warmer ([`CacheWarmer`])**: concurrent precomputation with in-flight
//!   de-duplication
//!
//! ## Graceful Degradation
//!
//! Redis being down never fails a caller: L2 operations degrade to misses,
//! reads fall back to L1 or the compute function, and health reporting
//! flips to `degraded`. Only compute-function errors propagate.
//!
//! ## Example
//!
//! ```ignore
//! let lifecycle = CacheLifecycle::initialize(CacheConfig::from_env()).await?;
//! let cache = lifecycle.cache();
//!
//! let record = cache
//!     .get_business_lookup("+14155551234", || async { lookup_business("+14155551234").await })
//!     .await?;
//! ```

pub mod circuit_breaker;
pub mod coordinator;
pub mod l1;
pub mod l2;
pub mod lifecycle;
pub mod metrics;
pub mod retry;
pub mod serializer;
pub mod stats;
pub mod warmer;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerStatus, CircuitState};
pub use coordinator::{CacheStatsReport, HealthReport, MultiLevelCache, knowledge_base_key};
pub use l1::L1Store;
pub use l2::{L2Client, L2Health};
pub use lifecycle::CacheLifecycle;
pub use serializer::Serializer;
pub use stats::{StatsRecorder, StatsSnapshot};
pub use warmer::{CacheWarmer, WarmingKey, WarmingSpec, WarmingStatus};

pub use voxbridge_core::{CacheCategory, CacheConfig, CacheError, HealthStatus, RedisConfig, Result};

//! Metrics facade for the cache.
//!
//! Emits through the `metrics` macros so any installed recorder (Prometheus
//! exporter, statsd bridge) picks these up. Counters are recorded
//! incrementally by the stats recorder; gauges are refreshed by the
//! coordinator's periodic metrics task.

use std::time::Duration;

use ::metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "voxbridge_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "voxbridge_cache_misses_total";
    pub const CACHE_COMPUTES_TOTAL: &str = "voxbridge_cache_computes_total";
    pub const CACHE_ERRORS_TOTAL: &str = "voxbridge_cache_errors_total";
    pub const CACHE_HIT_RATE_PERCENT: &str = "voxbridge_cache_hit_rate_percent";
    pub const CACHE_SIZE_ENTRIES: &str = "voxbridge_cache_size_entries";
    pub const CACHE_OPERATION_DURATION_SECONDS: &str = "voxbridge_cache_operation_duration_seconds";
    pub const CIRCUIT_BREAKER_TRIPS_TOTAL: &str = "voxbridge_circuit_breaker_trips_total";
    pub const COMPRESSION_SAVES_TOTAL: &str = "voxbridge_compression_saves_total";
    pub const WARMING_OPERATIONS_TOTAL: &str = "voxbridge_warming_operations_total";
}

/// Record a cache hit for a tier ("l1" or "l2").
pub fn record_cache_hit(tier: &str) {
    counter!(names::CACHE_HITS_TOTAL, "tier" => tier.to_string()).increment(1);
}

/// Record a cache miss for a tier.
pub fn record_cache_miss(tier: &str) {
    counter!(names::CACHE_MISSES_TOTAL, "tier" => tier.to_string()).increment(1);
}

/// Record a compute-function invocation.
pub fn record_compute() {
    counter!(names::CACHE_COMPUTES_TOTAL).increment(1);
}

/// Record an error by kind.
pub fn record_error(kind: &str) {
    counter!(names::CACHE_ERRORS_TOTAL, "kind" => kind.to_string()).increment(1);
}

/// Record an operation duration.
pub fn record_operation_duration(operation: &str, duration: Duration) {
    histogram!(
        names::CACHE_OPERATION_DURATION_SECONDS,
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a circuit breaker trip.
pub fn record_circuit_breaker_trip() {
    counter!(names::CIRCUIT_BREAKER_TRIPS_TOTAL).increment(1);
}

/// Record a payload saved by compression.
pub fn record_compression_save() {
    counter!(names::COMPRESSION_SAVES_TOTAL).increment(1);
}

/// Record a completed warming operation.
pub fn record_warming_operation() {
    counter!(names::WARMING_OPERATIONS_TOTAL).increment(1);
}

/// Set the rolling hit rate gauge for a cache level ("l1", "l2", "overall").
pub fn set_hit_rate(level: &str, percent: f64) {
    gauge!(names::CACHE_HIT_RATE_PERCENT, "cache_level" => level.to_string()).set(percent);
}

/// Set the entry-count gauge for a tier.
pub fn set_cache_size(tier: &str, entries: usize) {
    gauge!(names::CACHE_SIZE_ENTRIES, "tier" => tier.to_string()).set(entries as f64);
}

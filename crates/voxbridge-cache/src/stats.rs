//! Cache statistics: monotonic counters plus a bounded rolling window of
//! operation durations. Hit and miss rates are derived at snapshot time,
//! never stored.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::metrics;

/// Samples kept per named operation; oldest dropped first.
const OPERATION_WINDOW: usize = 100;

/// Hit/miss/error/latency recorder shared across cache components.
pub struct StatsRecorder {
    l1_hits: AtomicU64,
    l1_misses: AtomicU64,
    l2_hits: AtomicU64,
    l2_misses: AtomicU64,
    computes: AtomicU64,
    errors: AtomicU64,
    circuit_breaker_trips: AtomicU64,
    compression_saves: AtomicU64,
    warming_operations: AtomicU64,
    error_kinds: DashMap<String, u64>,
    operation_times: Mutex<HashMap<String, VecDeque<f64>>>,
    started_at: Instant,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self {
            l1_hits: AtomicU64::new(0),
            l1_misses: AtomicU64::new(0),
            l2_hits: AtomicU64::new(0),
            l2_misses: AtomicU64::new(0),
            computes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            circuit_breaker_trips: AtomicU64::new(0),
            compression_saves: AtomicU64::new(0),
            warming_operations: AtomicU64::new(0),
            error_kinds: DashMap::new(),
            operation_times: Mutex::new(HashMap::new()),
            started_at: Instant::now(),
        }
    }

    pub fn record_l1_hit(&self) {
        self.l1_hits.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_hit("l1");
    }

    pub fn record_l1_miss(&self) {
        self.l1_misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_miss("l1");
    }

    pub fn record_l2_hit(&self) {
        self.l2_hits.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_hit("l2");
    }

    pub fn record_l2_miss(&self) {
        self.l2_misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_miss("l2");
    }

    pub fn record_compute(&self) {
        self.computes.fetch_add(1, Ordering::Relaxed);
        metrics::record_compute();
    }

    pub fn record_error(&self, kind: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.error_kinds
            .entry(kind.to_string())
            .and_modify(|count| *count += 1)
            .or_insert(1);
        metrics::record_error(kind);
    }

    pub fn record_circuit_breaker_trip(&self) {
        self.circuit_breaker_trips.fetch_add(1, Ordering::Relaxed);
        metrics::record_circuit_breaker_trip();
    }

    pub fn record_compression_save(&self) {
        self.compression_saves.fetch_add(1, Ordering::Relaxed);
        metrics::record_compression_save();
    }

    pub fn record_warming_operation(&self) {
        self.warming_operations.fetch_add(1, Ordering::Relaxed);
        metrics::record_warming_operation();
    }

    /// Push a duration sample into the named operation's rolling window.
    pub fn record_operation_time(&self, operation: &str, duration: Duration) {
        let mut times = self.operation_times.lock();
        let window = times.entry(operation.to_string()).or_default();
        window.push_back(duration.as_secs_f64());
        while window.len() > OPERATION_WINDOW {
            window.pop_front();
        }
        metrics::record_operation_duration(operation, duration);
    }

    /// Build a point-in-time snapshot with derived rates.
    pub fn snapshot(&self) -> StatsSnapshot {
        let l1_hits = self.l1_hits.load(Ordering::Relaxed);
        let l1_misses = self.l1_misses.load(Ordering::Relaxed);
        let l2_hits = self.l2_hits.load(Ordering::Relaxed);
        let l2_misses = self.l2_misses.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let total_requests = l1_hits + l1_misses;

        let average_operation_ms = {
            let times = self.operation_times.lock();
            times
                .iter()
                .map(|(operation, window)| {
                    let avg_ms = if window.is_empty() {
                        0.0
                    } else {
                        window.iter().sum::<f64>() / window.len() as f64 * 1000.0
                    };
                    (operation.clone(), round2(avg_ms))
                })
                .collect()
        };

        let overall_hit_rate = percent(l1_hits + l2_hits, total_requests);

        StatsSnapshot {
            performance: PerformanceStats {
                l1_hit_rate: percent(l1_hits, l1_hits + l1_misses),
                l2_hit_rate: percent(l2_hits, l2_hits + l2_misses),
                overall_hit_rate,
                miss_rate: if total_requests == 0 {
                    0.0
                } else {
                    round2(100.0 - overall_hit_rate)
                },
                average_operation_ms,
            },
            counts: CountStats {
                l1_hits,
                l1_misses,
                l2_hits,
                l2_misses,
                computes: self.computes.load(Ordering::Relaxed),
                total_requests,
            },
            reliability: ReliabilityStats {
                errors,
                error_kinds: self
                    .error_kinds
                    .iter()
                    .map(|entry| (entry.key().clone(), *entry.value()))
                    .collect(),
                circuit_breaker_trips: self.circuit_breaker_trips.load(Ordering::Relaxed),
                error_rate: percent(errors, total_requests),
            },
            efficiency: EfficiencyStats {
                compression_saves: self.compression_saves.load(Ordering::Relaxed),
                warming_operations: self.warming_operations.load(Ordering::Relaxed),
                uptime_seconds: round2(self.started_at.elapsed().as_secs_f64()),
            },
        }
    }
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

fn percent(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        round2(numerator as f64 / denominator as f64 * 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Point-in-time statistics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub performance: PerformanceStats,
    pub counts: CountStats,
    pub reliability: ReliabilityStats,
    pub efficiency: EfficiencyStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceStats {
    pub l1_hit_rate: f64,
    pub l2_hit_rate: f64,
    pub overall_hit_rate: f64,
    pub miss_rate: f64,
    pub average_operation_ms: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountStats {
    pub l1_hits: u64,
    pub l1_misses: u64,
    pub l2_hits: u64,
    pub l2_misses: u64,
    pub computes: u64,
    pub total_requests: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReliabilityStats {
    pub errors: u64,
    pub error_kinds: HashMap<String, u64>,
    pub circuit_breaker_trips: u64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EfficiencyStats {
    pub compression_saves: u64,
    pub warming_operations: u64,
    pub uptime_seconds: f64,
}

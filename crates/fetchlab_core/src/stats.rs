//! Statistics collector for store round trips and cache lookups.
//!
//! # Responsibility
//! - Count queries, entity loads and cache hits/misses per cache region.
//! - Track the slowest query since the last reset, in microseconds and
//!   whole milliseconds.
//! - Export an immutable, serializable snapshot.
//!
//! # Invariants
//! - Every update and `reset` runs inside one critical section.
//! - `max_latency_us` only grows between resets; `max_latency_ms` is its
//!   value truncated to whole milliseconds.
//! - `hit_ratio` is `0.0` when no lookup happened.

use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Second-level cache region a lookup went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheRegion {
    Entity,
    Query,
}

impl CacheRegion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Query => "query",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RegionCounters {
    hits: u64,
    misses: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    query_count: u64,
    max_latency_us: u64,
    entity_load_count: u64,
    entity: RegionCounters,
    query: RegionCounters,
}

/// Hit/miss view of one region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegionSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
}

impl RegionSnapshot {
    fn new(hits: u64, misses: u64) -> Self {
        Self {
            hits,
            misses,
            hit_ratio: hit_ratio(hits, misses),
        }
    }
}

/// Immutable view of every counter at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    pub query_count: u64,
    pub max_latency_ms: u64,
    /// Slowest query in microseconds; SQLite lookups here are mostly
    /// sub-millisecond.
    pub max_latency_us: u64,
    pub entity_load_count: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub hit_ratio: f64,
    pub entity_cache: RegionSnapshot,
    pub query_cache: RegionSnapshot,
}

/// `hits / (hits + misses)`, or `0.0` when both are zero.
pub fn hit_ratio(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Shared collector; cheap to update, safe to read at any time.
#[derive(Debug, Default)]
pub struct Statistics {
    counters: Mutex<Counters>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroes every counter. Call before each measured unit of work.
    pub fn reset(&self) {
        *self.lock() = Counters::default();
    }

    pub fn record_query(&self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        let mut counters = self.lock();
        counters.query_count += 1;
        counters.max_latency_us = counters.max_latency_us.max(micros);
    }

    /// Adds entities materialized from the store (never from cache).
    pub fn record_entity_load(&self, count: u64) {
        self.lock().entity_load_count += count;
    }

    pub fn record_cache_hit(&self, region: CacheRegion) {
        let mut counters = self.lock();
        match region {
            CacheRegion::Entity => counters.entity.hits += 1,
            CacheRegion::Query => counters.query.hits += 1,
        }
    }

    pub fn record_cache_miss(&self, region: CacheRegion) {
        let mut counters = self.lock();
        match region {
            CacheRegion::Entity => counters.entity.misses += 1,
            CacheRegion::Query => counters.query.misses += 1,
        }
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let counters = *self.lock();
        let cache_hits = counters.entity.hits + counters.query.hits;
        let cache_misses = counters.entity.misses + counters.query.misses;
        StatisticsSnapshot {
            query_count: counters.query_count,
            max_latency_ms: counters.max_latency_us / 1000,
            max_latency_us: counters.max_latency_us,
            entity_load_count: counters.entity_load_count,
            cache_hits,
            cache_misses,
            hit_ratio: hit_ratio(cache_hits, cache_misses),
            entity_cache: RegionSnapshot::new(counters.entity.hits, counters.entity.misses),
            query_cache: RegionSnapshot::new(counters.query.hits, counters.query.misses),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        // Counters stay consistent even if a holder panicked mid-report.
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{hit_ratio, CacheRegion, Statistics};
    use std::time::Duration;

    #[test]
    fn hit_ratio_is_zero_without_lookups() {
        assert_eq!(hit_ratio(0, 0), 0.0);
        assert_eq!(Statistics::new().snapshot().hit_ratio, 0.0);
    }

    #[test]
    fn hit_ratio_matches_counts() {
        for (hits, misses) in [(1, 0), (0, 3), (3, 1), (7, 13)] {
            let expected = hits as f64 / (hits + misses) as f64;
            assert!((hit_ratio(hits, misses) - expected).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn max_latency_is_monotonic_until_reset() {
        let stats = Statistics::new();
        stats.record_query(Duration::from_millis(12));
        stats.record_query(Duration::from_millis(3));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.query_count, 2);
        assert_eq!(snapshot.max_latency_ms, 12);

        stats.reset();
        stats.record_query(Duration::from_millis(3));
        assert_eq!(stats.snapshot().max_latency_ms, 3);
    }

    #[test]
    fn sub_millisecond_latency_is_kept_in_microseconds() {
        let stats = Statistics::new();
        stats.record_query(Duration::from_micros(250));
        stats.record_query(Duration::from_micros(1_730));
        stats.record_query(Duration::from_micros(40));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.max_latency_us, 1_730);
        assert_eq!(snapshot.max_latency_ms, 1);

        stats.reset();
        stats.record_query(Duration::from_micros(250));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.max_latency_us, 250);
        assert_eq!(snapshot.max_latency_ms, 0);
    }

    #[test]
    fn regions_are_counted_separately_and_summed() {
        let stats = Statistics::new();
        stats.record_cache_hit(CacheRegion::Entity);
        stats.record_cache_hit(CacheRegion::Entity);
        stats.record_cache_miss(CacheRegion::Query);
        stats.record_entity_load(4);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.entity_cache.hits, 2);
        assert_eq!(snapshot.query_cache.misses, 1);
        assert_eq!(snapshot.entity_load_count, 4);
        assert!((snapshot.hit_ratio - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn reset_zeroes_everything() {
        let stats = Statistics::new();
        stats.record_cache_miss(CacheRegion::Entity);
        stats.record_entity_load(1);
        stats.reset();
        assert_eq!(stats.snapshot(), Statistics::new().snapshot());
    }
}

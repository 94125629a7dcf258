//! Benchmark scenarios over the sample library.
//!
//! # Responsibility
//! - Seed the sample library and run the five measured scenarios: N+1
//!   baseline, join fetch, entity graph, second-level cache and the
//!   with/without cache comparison.
//! - Produce serializable reports carrying a statistics snapshot per
//!   measured phase.
//!
//! # Invariants
//! - Statistics are reset right before each measured phase.
//! - Fetch scenarios start from an evicted cache so their counts are cold.
//! - Every phase borrows the store through its own `UnitOfWork`.

use crate::cache::{AccessError, AccessResult, CacheLayer, SecondLevelCache};
use crate::config::{CacheConfig, LabConfig};
use crate::fetch::{FetchEngine, FetchStrategy, PrefetchSpec};
use crate::model::library::DraftError;
use crate::seed::sample_library;
use crate::stats::{Statistics, StatisticsSnapshot};
use crate::store::{LibraryCounts, SqliteStore, StoreError, UnitOfWork};
use log::info;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Author looked up by the second-level cache scenario.
pub const CACHED_AUTHOR_ID: i64 = 1;
/// Last name used by the cached query phases.
pub const CACHED_LAST_NAME: &str = "Hugo";
/// Comparison lookups cycle through author ids `1..=COMPARISON_AUTHOR_SPAN`.
pub const COMPARISON_AUTHOR_SPAN: i64 = 4;

#[derive(Debug)]
pub enum ServiceError {
    Store(StoreError),
    Access(AccessError),
    Draft(DraftError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Access(err) => write!(f, "{err}"),
            Self::Draft(err) => write!(f, "invalid sample library: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Access(err) => Some(err),
            Self::Draft(err) => Some(err),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<AccessError> for ServiceError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

impl From<DraftError> for ServiceError {
    fn from(value: DraftError) -> Self {
        Self::Draft(value)
    }
}

/// Outcome of one measured phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub strategy: String,
    pub elapsed_ms: f64,
    /// Roots materialized (or lookups performed) by the phase.
    pub roots: usize,
    /// Store calls that went through the phase's unit of work.
    pub round_trips: u64,
    pub statistics: StatisticsSnapshot,
}

/// Same workload run with caching bypassed and then enabled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub iterations: u32,
    pub without_cache: ScenarioReport,
    pub with_cache: ScenarioReport,
    /// `without / with` elapsed time; `None` when the cached run took no
    /// measurable time.
    pub speedup: Option<f64>,
}

/// Every scenario of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabReport {
    pub seeded: LibraryCounts,
    pub scenarios: Vec<ScenarioReport>,
    pub comparison: ComparisonReport,
}

/// Owns the store, the shared cache and the statistics collector.
pub struct BenchmarkService {
    store: SqliteStore,
    cache: SecondLevelCache,
    stats: Statistics,
    config: LabConfig,
}

impl BenchmarkService {
    pub fn new(store: SqliteStore, config: LabConfig) -> Self {
        Self {
            store,
            cache: SecondLevelCache::new(config.cache),
            stats: Statistics::new(),
            config,
        }
    }

    /// Opens the store `config.database` points at.
    pub fn open(config: LabConfig) -> ServiceResult<Self> {
        let store = SqliteStore::open_location(&config.database)?;
        Ok(Self::new(store, config))
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn cache(&self) -> &SecondLevelCache {
        &self.cache
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    /// Seeds the sample library unless the store already holds data.
    pub fn seed_sample_library(&mut self) -> ServiceResult<LibraryCounts> {
        let existing = self.store.counts()?;
        if !existing.is_empty() {
            info!(
                "event=store_seed module=service status=skipped authors={} books={}",
                existing.authors, existing.books
            );
            return Ok(existing);
        }
        let draft = sample_library()?;
        Ok(self.store.seed(&draft)?)
    }

    /// Seeds, then runs every scenario in order.
    pub fn run_all(&mut self) -> ServiceResult<LabReport> {
        let seeded = self.seed_sample_library()?;

        let mut scenarios = vec![
            self.n_plus_one()?,
            self.join_fetch()?,
            self.entity_graph()?,
        ];
        scenarios.extend(self.second_level_cache()?);
        let comparison = self.cache_comparison()?;

        Ok(LabReport {
            seeded,
            scenarios,
            comparison,
        })
    }

    /// Authors, then books per author, then categories per book, all lazy.
    pub fn n_plus_one(&self) -> ServiceResult<ScenarioReport> {
        self.fetch_scenario("n_plus_one", FetchStrategy::Lazy, |engine, strategy| {
            engine.load_authors(strategy).map(|graphs| graphs.len())
        })
    }

    /// Authors joined with their books; categories stay lazy.
    pub fn join_fetch(&self) -> ServiceResult<ScenarioReport> {
        self.fetch_scenario("join_fetch", FetchStrategy::EagerJoin, |engine, strategy| {
            engine.load_authors(strategy).map(|graphs| graphs.len())
        })
    }

    /// Books with author and categories in one query.
    pub fn entity_graph(&self) -> ServiceResult<ScenarioReport> {
        let strategy = FetchStrategy::EagerGraph(PrefetchSpec::book_categories_and_author());
        self.fetch_scenario("entity_graph", strategy, |engine, strategy| {
            engine.load_books(strategy).map(|graphs| graphs.len())
        })
    }

    /// Author lookup and cached query, each run twice in separate units of
    /// work. The first run of each pair misses, the second hits.
    pub fn second_level_cache(&self) -> ServiceResult<Vec<ScenarioReport>> {
        self.cache.evict_all();
        let mut reports = Vec::with_capacity(4);
        for name in ["cache.entity.first", "cache.entity.second"] {
            reports.push(self.measure(name, "entity_cache", &self.cache, |engine| {
                engine.find_author(CACHED_AUTHOR_ID).map(|_| 1)
            })?);
        }
        for name in ["cache.query.first", "cache.query.second"] {
            reports.push(self.measure(name, "query_cache", &self.cache, |engine| {
                engine
                    .authors_by_last_name(CACHED_LAST_NAME)
                    .map(|authors| authors.len())
            })?);
        }
        Ok(reports)
    }

    /// `comparison_iterations` author lookups with book access, first with
    /// caching bypassed, then through the shared cache after eviction.
    pub fn cache_comparison(&self) -> ServiceResult<ComparisonReport> {
        let iterations = self.config.comparison_iterations;
        let uncached = SecondLevelCache::new(CacheConfig::disabled());
        let without_cache =
            self.measure("comparison.without_cache", "lazy", &uncached, |engine| {
                author_lookups(engine, iterations)
            })?;

        self.cache.evict_all();
        let with_cache = self.measure("comparison.with_cache", "lazy", &self.cache, |engine| {
            author_lookups(engine, iterations)
        })?;

        let speedup = (with_cache.elapsed_ms > 0.0)
            .then(|| without_cache.elapsed_ms / with_cache.elapsed_ms);
        Ok(ComparisonReport {
            iterations,
            without_cache,
            with_cache,
            speedup,
        })
    }

    fn fetch_scenario(
        &self,
        name: &'static str,
        strategy: FetchStrategy,
        run: impl FnOnce(&FetchEngine<'_, UnitOfWork<'_>>, &FetchStrategy) -> AccessResult<usize>,
    ) -> ServiceResult<ScenarioReport> {
        self.cache.evict_all();
        self.measure(name, strategy.name(), &self.cache, |engine| {
            run(engine, &strategy)
        })
    }

    /// Resets statistics, runs `run` in a fresh unit of work over `cache`
    /// and captures the outcome.
    fn measure(
        &self,
        name: &'static str,
        strategy: &str,
        cache: &SecondLevelCache,
        run: impl FnOnce(&FetchEngine<'_, UnitOfWork<'_>>) -> AccessResult<usize>,
    ) -> ServiceResult<ScenarioReport> {
        self.stats.reset();
        let started_at = Instant::now();

        let layer = CacheLayer::new(self.store.unit_of_work(name), cache, &self.stats);
        let engine = FetchEngine::new(&layer);
        let roots = run(&engine)?;
        let unit = engine.layer().store();
        let (label, round_trips) = (unit.label(), unit.round_trips());
        drop(layer);

        let report = ScenarioReport {
            name: label.to_string(),
            strategy: strategy.to_string(),
            elapsed_ms: started_at.elapsed().as_secs_f64() * 1000.0,
            roots,
            round_trips,
            statistics: self.stats.snapshot(),
        };
        info!(
            "event=scenario module=service status=ok name={} strategy={} roots={} queries={} entity_loads={} cache_hits={} cache_misses={} max_query_us={} elapsed_ms={:.3}",
            report.name,
            report.strategy,
            report.roots,
            report.statistics.query_count,
            report.statistics.entity_load_count,
            report.statistics.cache_hits,
            report.statistics.cache_misses,
            report.statistics.max_latency_us,
            report.elapsed_ms
        );
        Ok(report)
    }
}

fn author_lookups(engine: &FetchEngine<'_, UnitOfWork<'_>>, iterations: u32) -> AccessResult<usize> {
    for i in 0..iterations {
        let author = engine.find_author(i64::from(i) % COMPARISON_AUTHOR_SPAN + 1)?;
        engine.resolve_books(&author)?;
    }
    Ok(iterations as usize)
}

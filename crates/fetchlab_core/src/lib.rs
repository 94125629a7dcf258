//! Core of the fetch-strategy lab.
//!
//! A relational library (authors, books, categories) behind an instrumented
//! second-level cache, a fetch engine comparing lazy, join and graph loading,
//! and the benchmark scenarios built on top of them.

pub mod cache;
pub mod config;
pub mod db;
pub mod fetch;
pub mod logging;
pub mod model;
pub mod seed;
pub mod service;
pub mod stats;
pub mod store;

pub use cache::{AccessError, AccessResult, CacheLayer, QuerySignature, SecondLevelCache};
pub use config::{CacheConfig, ConfigError, DatabaseLocation, LabConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use fetch::{FetchEngine, FetchStrategy, LoadedGraph, PrefetchSpec, RootKind};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LogTarget};
pub use model::{Author, AuthorGraph, Book, BookGraph, Category, EntityKind, LibraryDraft};
pub use service::{BenchmarkService, LabReport, ScenarioReport, ServiceError};
pub use stats::{Statistics, StatisticsSnapshot};
pub use store::{RelationalStore, SqliteStore, StoreError, StoreResult};

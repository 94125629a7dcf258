use fetchlab_core::config::{CacheConfig, LabConfig};
use fetchlab_core::service::{BenchmarkService, ScenarioReport};
use fetchlab_core::store::SqliteStore;

fn service(iterations: u32) -> BenchmarkService {
    let config = LabConfig {
        comparison_iterations: iterations,
        ..LabConfig::default()
    };
    BenchmarkService::open(config).unwrap()
}

fn scenario<'r>(reports: &'r [ScenarioReport], name: &str) -> &'r ScenarioReport {
    reports
        .iter()
        .find(|report| report.name == name)
        .unwrap_or_else(|| panic!("missing scenario {name}"))
}

#[test]
fn run_all_reports_every_scenario() {
    let mut service = service(12);
    let report = service.run_all().unwrap();

    let names: Vec<&str> = report.scenarios.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "n_plus_one",
            "join_fetch",
            "entity_graph",
            "cache.entity.first",
            "cache.entity.second",
            "cache.query.first",
            "cache.query.second",
        ]
    );
    assert_eq!(report.seeded.books, 26);

    let n_plus_one = scenario(&report.scenarios, "n_plus_one");
    assert!(n_plus_one.statistics.query_count >= 31);
    assert_eq!(n_plus_one.roots, 4);
    assert_eq!(n_plus_one.round_trips, 31);
    assert_eq!(scenario(&report.scenarios, "join_fetch").statistics.query_count, 27);

    let graph = scenario(&report.scenarios, "entity_graph");
    assert_eq!(graph.statistics.query_count, 1);
    assert_eq!(graph.roots, 26);
}

#[test]
fn second_level_cache_misses_once_then_hits() {
    let mut service = service(0);
    service.seed_sample_library().unwrap();
    let reports = service.second_level_cache().unwrap();

    let first = scenario(&reports, "cache.entity.first").statistics;
    assert_eq!((first.cache_misses, first.cache_hits), (1, 0));
    assert_eq!(first.entity_load_count, 1);

    let second = scenario(&reports, "cache.entity.second").statistics;
    assert_eq!((second.cache_misses, second.cache_hits), (0, 1));
    assert_eq!(second.entity_load_count, 0);

    let query_first = scenario(&reports, "cache.query.first").statistics;
    assert_eq!(query_first.query_count, 1);
    assert_eq!(query_first.query_cache.misses, 1);

    let query_second = scenario(&reports, "cache.query.second");
    assert_eq!(query_second.statistics.query_count, 0);
    assert_eq!(query_second.statistics.query_cache.hits, 1);
    assert_eq!(query_second.round_trips, 0);
    assert_eq!(query_second.roots, 1);
}

#[test]
fn comparison_runs_the_same_workload_with_and_without_cache() {
    let mut service = service(20);
    service.seed_sample_library().unwrap();
    let comparison = service.cache_comparison().unwrap();

    let without = comparison.without_cache.statistics;
    assert_eq!(comparison.iterations, 20);
    assert_eq!(without.query_count, 20);
    assert_eq!(without.cache_hits + without.cache_misses, 0);

    let with = comparison.with_cache.statistics;
    assert_eq!(with.query_count, 4);
    assert_eq!(with.entity_cache.misses, 4);
    assert_eq!(with.query_cache.hits, 16);
    assert!(with.hit_ratio > 0.5);
}

#[test]
fn disabled_cache_config_is_honored_by_scenarios() {
    let config = LabConfig {
        cache: CacheConfig::disabled(),
        ..LabConfig::default()
    };
    let mut service = BenchmarkService::new(SqliteStore::open_in_memory().unwrap(), config);
    service.seed_sample_library().unwrap();

    let reports = service.second_level_cache().unwrap();
    let second = scenario(&reports, "cache.entity.second").statistics;
    assert_eq!(second.cache_hits, 0);
    assert_eq!(second.entity_load_count, 1);
}

#[test]
fn seeding_twice_keeps_a_single_library() {
    let mut service = service(0);
    let first = service.seed_sample_library().unwrap();
    let second = service.seed_sample_library().unwrap();
    assert_eq!(first, second);
    assert_eq!(service.store().counts().unwrap().authors, 4);
}

#[test]
fn report_serializes_to_json() {
    let mut service = service(4);
    let report = service.run_all().unwrap();
    let value = serde_json::to_value(&report).unwrap();

    assert_eq!(value["scenarios"].as_array().unwrap().len(), 7);
    assert_eq!(value["scenarios"][2]["statistics"]["query_count"], 1);
    assert_eq!(value["comparison"]["iterations"], 4);
}

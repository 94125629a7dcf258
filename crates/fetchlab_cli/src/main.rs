//! CLI entry point running every fetch-strategy scenario.
//!
//! # Responsibility
//! - Load `FETCHLAB_*` configuration, start logging and run the lab.
//! - Print a text report, or the full report as JSON with `--json`.

use fetchlab_core::service::{ComparisonReport, LabReport, ScenarioReport};
use fetchlab_core::{init_from_config, BenchmarkService, LabConfig};
use log::error;
use std::process::ExitCode;

const USAGE: &str = "usage: fetchlab [--json]

Seeds the sample library and runs the N+1, join fetch, entity graph,
second-level cache and cache comparison scenarios.

Environment: FETCHLAB_LOG_LEVEL, FETCHLAB_LOG_DIR, FETCHLAB_DB_PATH,
FETCHLAB_ENTITY_CACHE, FETCHLAB_QUERY_CACHE, FETCHLAB_ITERATIONS";

fn main() -> ExitCode {
    let mut json = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                return ExitCode::SUCCESS;
            }
            other => {
                eprintln!("unknown argument `{other}`\n\n{USAGE}");
                return ExitCode::from(2);
            }
        }
    }

    let config = match LabConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("fetchlab: {err}");
            return ExitCode::from(2);
        }
    };
    if let Err(err) = init_from_config(&config) {
        eprintln!("fetchlab: logging disabled: {err}");
    }

    let report = match BenchmarkService::open(config).and_then(|mut service| service.run_all()) {
        Ok(report) => report,
        Err(err) => {
            error!("event=lab_run module=cli status=error error={err}");
            eprintln!("fetchlab: {err}");
            return ExitCode::FAILURE;
        }
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                eprintln!("fetchlab: cannot encode report: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_report(&report);
    }
    ExitCode::SUCCESS
}

fn print_report(report: &LabReport) {
    let seeded = &report.seeded;
    println!(
        "library: {} authors, {} books, {} categories, {} memberships",
        seeded.authors, seeded.books, seeded.categories, seeded.memberships
    );
    for scenario in &report.scenarios {
        print_scenario(scenario);
    }
    print_comparison(&report.comparison);
}

fn print_scenario(scenario: &ScenarioReport) {
    let stats = &scenario.statistics;
    println!();
    println!("=== {} ({}) ===", scenario.name, scenario.strategy);
    println!("elapsed:          {:.3} ms", scenario.elapsed_ms);
    println!("roots:            {}", scenario.roots);
    println!("queries:          {}", stats.query_count);
    println!(
        "max query time:   {:.3} ms",
        stats.max_latency_us as f64 / 1000.0
    );
    println!("entities loaded:  {}", stats.entity_load_count);
    println!("cache hits:       {}", stats.cache_hits);
    println!("cache misses:     {}", stats.cache_misses);
    println!("hit ratio:        {:.2}", stats.hit_ratio);
}

fn print_comparison(comparison: &ComparisonReport) {
    println!();
    println!("=== cache comparison ({} iterations) ===", comparison.iterations);
    println!(
        "without cache:    {:.3} ms, {} queries",
        comparison.without_cache.elapsed_ms, comparison.without_cache.statistics.query_count
    );
    println!(
        "with cache:       {:.3} ms, {} queries, hit ratio {:.2}",
        comparison.with_cache.elapsed_ms,
        comparison.with_cache.statistics.query_count,
        comparison.with_cache.statistics.hit_ratio
    );
    match comparison.speedup {
        Some(speedup) => println!("speedup:          {speedup:.1}x"),
        None => println!("speedup:          n/a"),
    }
}

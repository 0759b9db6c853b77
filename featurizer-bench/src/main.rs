//! Benchmark runner for the featurizers
//!
//! Takes an optional path to a JSON [`BenchConfig`].

use anyhow::Context;
use featurizer_bench::{bench_normalize, bench_tfidf_fit, bench_tfidf_transform, BenchConfig, BenchResult};

fn print_result(result: &BenchResult) {
    println!("\nBenchmark: {}", result.name);
    println!("  Total time:   {:?}", result.total_time);
    println!("  Average time: {:?}", result.avg_time);
    println!("  Min time:     {:?}", result.min_time);
    println!("  Max time:     {:?}", result.max_time);
    println!("  Throughput:   {:.2} rows/sec", result.throughput);
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading benchmark config {path}"))?;
            serde_json::from_str(&json).with_context(|| format!("parsing benchmark config {path}"))?
        }
        None => BenchConfig::default(),
    };

    println!("=== Featurizer Benchmarks ===");
    print_result(&bench_tfidf_fit(&config)?);
    print_result(&bench_tfidf_transform(&config)?);
    print_result(&bench_normalize(&config)?);

    println!("\n=== Corpus Size Scaling ===");
    for num_rows in [1_000, 10_000, 100_000] {
        let scaled = BenchConfig {
            num_rows,
            iterations: 3,
            warmup_iterations: 1,
            ..config.clone()
        };
        let result = bench_tfidf_transform(&scaled)?;
        println!("\nDocuments: {num_rows}");
        println!("  Average time: {:?}", result.avg_time);
        println!("  Throughput:   {:.2} rows/sec", result.throughput);
    }
    Ok(())
}

//! Benchmarks for featurizer training and transformation

use std::time::{Duration, Instant};

use featurizer_core::{train, transform_all, AnnotationMaps, Result, TrainingConfig, Transformable};
use featurizer_transforms::numeric::{normalize_estimator, NormKind, NormalizeConfig};
use featurizer_transforms::text::{tfidf_vectorizer_estimator, TfidfVectorizerConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Benchmark configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Number of measured iterations
    pub iterations: usize,

    /// Iterations run before measuring
    pub warmup_iterations: usize,

    /// Number of rows (documents or vectors) per iteration
    pub num_rows: usize,

    /// Rows per training batch
    pub batch_size: usize,

    /// Distinct words in the synthetic corpus
    pub vocabulary_size: usize,

    /// Words per synthetic document
    pub words_per_document: usize,

    /// Elements per numeric row
    pub row_width: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            warmup_iterations: 3,
            num_rows: 10_000,
            batch_size: 1_000,
            vocabulary_size: 5_000,
            words_per_document: 40,
            row_width: 32,
        }
    }
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchResult {
    /// Name of the benchmark
    pub name: String,

    /// Total time of the measured iterations
    pub total_time: Duration,

    /// Average time per iteration
    pub avg_time: Duration,

    /// Min time per iteration
    pub min_time: Duration,

    /// Max time per iteration
    pub max_time: Duration,

    /// Throughput (rows/second)
    pub throughput: f64,
}

/// Run `func` for the configured iterations and collect timings
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn run_benchmark<F>(name: &str, config: &BenchConfig, mut func: F) -> Result<BenchResult>
where
    F: FnMut() -> Result<()>,
{
    for _ in 0..config.warmup_iterations {
        func()?;
    }

    let iterations = config.iterations.max(1);
    let mut times = Vec::with_capacity(iterations);
    let start_total = Instant::now();
    for _ in 0..iterations {
        let start = Instant::now();
        func()?;
        times.push(start.elapsed());
    }
    let total_time = start_total.elapsed();

    let avg_time = times.iter().sum::<Duration>() / iterations as u32;
    let min_time = times.iter().min().copied().unwrap_or_default();
    let max_time = times.iter().max().copied().unwrap_or_default();
    let total_rows = iterations * config.num_rows;
    let throughput = total_rows as f64 / total_time.as_secs_f64().max(f64::EPSILON);

    info!(benchmark = name, ?avg_time, throughput, "benchmark finished");
    Ok(BenchResult {
        name: name.to_string(),
        total_time,
        avg_time,
        min_time,
        max_time,
        throughput,
    })
}

/// Deterministic documents drawn from `w0 .. w{vocabulary_size}`
pub fn synthetic_corpus(config: &BenchConfig) -> Vec<String> {
    let vocabulary = config.vocabulary_size.max(1);
    (0..config.num_rows)
        .map(|doc| {
            (0..config.words_per_document)
                .map(|word| format!("w{}", (doc * 31 + word * word * 7 + word) % vocabulary))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Deterministic numeric rows
#[allow(clippy::cast_precision_loss)]
pub fn synthetic_rows(config: &BenchConfig) -> Vec<Vec<f64>> {
    (0..config.num_rows)
        .map(|row| {
            (0..config.row_width)
                .map(|col| ((row * 17 + col * 13) % 101) as f64 - 50.0)
                .collect()
        })
        .collect()
}

/// Split `rows` into training batches
pub fn batches<T: Clone>(rows: &[T], batch_size: usize) -> Vec<Vec<T>> {
    rows.chunks(batch_size.max(1)).map(<[T]>::to_vec).collect()
}

/// Fit a TF-IDF vectorizer over the synthetic corpus
pub fn bench_tfidf_fit(config: &BenchConfig) -> Result<BenchResult> {
    let batches = batches(&synthetic_corpus(config), config.batch_size);
    run_benchmark("TF-IDF fit", config, || {
        let mut estimator =
            tfidf_vectorizer_estimator(AnnotationMaps::new(1), 0, TfidfVectorizerConfig::default())?;
        train(&mut estimator, &batches, &TrainingConfig::default())
    })
}

/// Transform the synthetic corpus with a trained TF-IDF vectorizer
pub fn bench_tfidf_transform(config: &BenchConfig) -> Result<BenchResult> {
    let corpus = synthetic_corpus(config);
    let mut estimator =
        tfidf_vectorizer_estimator(AnnotationMaps::new(1), 0, TfidfVectorizerConfig::default())?;
    train(&mut estimator, &batches(&corpus, config.batch_size), &TrainingConfig::default())?;
    let mut transformer = estimator.create_transformer()?;

    run_benchmark("TF-IDF transform", config, || {
        let outputs = transform_all(&mut transformer, corpus.iter().map(String::as_str))?;
        std::hint::black_box(outputs);
        Ok(())
    })
}

/// Fit and apply an L2 normalizer over the synthetic rows
pub fn bench_normalize(config: &BenchConfig) -> Result<BenchResult> {
    let rows = synthetic_rows(config);
    let batches = batches(&rows, config.batch_size);
    run_benchmark("Normalize fit + transform", config, || {
        let mut estimator = normalize_estimator::<f64>(
            AnnotationMaps::new(1),
            0,
            &NormalizeConfig::new(NormKind::L2),
        )?;
        train(&mut estimator, &batches, &TrainingConfig::default())?;
        let mut transformer = estimator.create_transformer()?;
        let outputs = transform_all(&mut transformer, rows.iter().map(Vec::as_slice))?;
        std::hint::black_box(outputs);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> BenchConfig {
        BenchConfig {
            iterations: 2,
            warmup_iterations: 0,
            num_rows: 20,
            batch_size: 7,
            vocabulary_size: 50,
            words_per_document: 5,
            row_width: 4,
        }
    }

    #[test]
    fn test_synthetic_data_shape() {
        let config = small();
        let corpus = synthetic_corpus(&config);
        assert_eq!(corpus.len(), 20);
        assert!(corpus.iter().all(|doc| doc.split(' ').count() == 5));
        assert_eq!(batches(&corpus, config.batch_size).len(), 3);
        assert!(synthetic_rows(&config).iter().all(|row| row.len() == 4));
    }

    #[test]
    fn test_benchmarks_run() {
        let config = small();
        for result in [
            bench_tfidf_fit(&config).unwrap(),
            bench_tfidf_transform(&config).unwrap(),
            bench_normalize(&config).unwrap(),
        ] {
            assert!(result.min_time <= result.max_time);
            assert!(result.throughput > 0.0);
        }
    }

    #[test]
    fn test_config_from_json() {
        let config: BenchConfig = serde_json::from_str(r#"{"iterations": 3}"#).unwrap();
        assert_eq!(config.iterations, 3);
        assert_eq!(config.num_rows, BenchConfig::default().num_rows);
    }
}

//! Value histogram over a categorical column

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use featurizer_core::{
    EstimatorContext, EstimatorImpl, FitResult, HashKey, Nullability, Result,
};
use tracing::trace;

/// Name the histogram annotation is published under
pub const HISTOGRAM_ESTIMATOR_NAME: &str = "HistogramEstimator";

/// Counts of every non-null value seen in training, in first-seen order
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramAnnotation<T> {
    /// `(value, count)` pairs in the order values were first seen
    values: Vec<(T, u32)>,
}

impl<T> HistogramAnnotation<T> {
    /// `(value, count)` pairs in first-seen order
    pub fn values(&self) -> &[(T, u32)] {
        &self.values
    }

    /// Number of non-null values counted
    pub fn total(&self) -> u64 {
        self.values.iter().map(|(_, count)| u64::from(*count)).sum()
    }

    /// The most frequent value; ties go to the value seen first
    pub fn most_frequent(&self) -> Option<&T> {
        let mut best: Option<&(T, u32)> = None;
        for entry in &self.values {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(value, _)| value)
    }
}

/// Builds a [`HistogramAnnotation`] from the non-null values of a column
pub struct HistogramEstimator<I: Nullability>
where
    I::Value: HashKey,
{
    /// Position of each value in `values`
    index: HashMap<<I::Value as HashKey>::Key, usize>,

    /// Values and counts in first-seen order
    values: Vec<(I::Value, u32)>,

    _input: PhantomData<fn(&I)>,
}

impl<I: Nullability> HistogramEstimator<I>
where
    I::Value: HashKey,
{
    /// Create an empty histogram
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            values: Vec::new(),
            _input: PhantomData,
        }
    }
}

impl<I: Nullability> Default for HistogramEstimator<I>
where
    I::Value: HashKey,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Nullability> fmt::Debug for HistogramEstimator<I>
where
    I::Value: HashKey,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistogramEstimator")
            .field("distinct_values", &self.values.len())
            .finish()
    }
}

impl<I: Nullability> EstimatorImpl for HistogramEstimator<I>
where
    I::Value: HashKey + Clone + fmt::Debug + Send + Sync + 'static,
{
    type Input = I;

    fn fit(&mut self, context: &EstimatorContext, batch: &[I]) -> Result<FitResult> {
        let mut nulls = 0usize;
        for input in batch {
            if input.is_null() {
                nulls += 1;
                continue;
            }

            let value = input.nullable_value()?;
            let key = value.hash_key();
            match self.index.get(&key) {
                Some(&position) => {
                    let count = &mut self.values[position].1;
                    *count = count.saturating_add(1);
                }
                None => {
                    self.index.insert(key, self.values.len());
                    self.values.push((value.clone(), 1));
                }
            }
        }

        trace!(
            estimator = context.name(),
            rows = batch.len(),
            nulls,
            distinct = self.values.len(),
            "histogram updated"
        );
        Ok(FitResult::Continue)
    }

    fn complete_training(&mut self, context: &EstimatorContext) -> Result<()> {
        self.index.clear();
        context.publish(HistogramAnnotation {
            values: std::mem::take(&mut self.values),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use featurizer_core::{train, AnnotationMaps, Estimator, TrainingConfig};

    #[test]
    fn test_counts_in_first_seen_order() {
        let maps = AnnotationMaps::new(1);
        let mut estimator = Estimator::new(
            HISTOGRAM_ESTIMATOR_NAME,
            maps.clone(),
            0,
            HistogramEstimator::<Option<i32>>::new(),
        )
        .unwrap();

        let batches = vec![vec![Some(3), None, Some(1)], vec![Some(1), Some(3), Some(1)]];
        train(&mut estimator, &batches, &TrainingConfig::default()).unwrap();

        let histogram = maps
            .get::<HistogramAnnotation<i32>>(0, HISTOGRAM_ESTIMATOR_NAME)
            .unwrap();
        assert_eq!(histogram.values(), &[(3, 2), (1, 3)]);
        assert_eq!(histogram.total(), 5);
        assert_eq!(histogram.most_frequent(), Some(&1));
    }

    #[test]
    fn test_ties_go_to_first_seen() {
        let histogram = HistogramAnnotation {
            values: vec![("b".to_string(), 2), ("a".to_string(), 2)],
        };
        assert_eq!(histogram.most_frequent().map(String::as_str), Some("b"));
    }

    #[test]
    fn test_nan_is_skipped() {
        let mut estimator = HistogramEstimator::<f64>::new();
        let maps = AnnotationMaps::new(1);
        let context = EstimatorContext::new("h", maps.clone(), 0).unwrap();

        estimator.fit(&context, &[f64::NAN, 2.5, 2.5, f64::NAN]).unwrap();
        estimator.complete_training(&context).unwrap();

        let histogram = maps.get::<HistogramAnnotation<f64>>(0, "h").unwrap();
        assert_eq!(histogram.values(), &[(2.5, 2)]);
    }

    #[test]
    fn test_empty_histogram_has_no_mode() {
        let histogram: HistogramAnnotation<u8> = HistogramAnnotation { values: Vec::new() };
        assert_eq!(histogram.most_frequent(), None);
    }
}

//! Categorical imputer
//!
//! Replaces nulls with the most frequent value seen in training. Training is
//! a two stage pipeline: a [`HistogramEstimator`] counts values, then a
//! [`HistogramConsumer`] picks the mode from the published histogram.

use std::fmt;
use std::marker::PhantomData;

use featurizer_core::{
    AnnotationMapsPtr, Archivable, Archive, Error, Estimator, EstimatorContext, EstimatorImpl,
    HashKey, Nullability, PipelineEstimator, PipelineStage, Result, Transformer,
    TransformerFactory,
};
use tracing::debug;

use super::histogram::{HistogramAnnotation, HistogramEstimator, HISTOGRAM_ESTIMATOR_NAME};

/// Name of the stage that picks the most frequent value
pub const HISTOGRAM_CONSUMER_ESTIMATOR_NAME: &str = "HistogramConsumerEstimator";

/// Name of the imputer pipeline
pub const CAT_IMPUTER_ESTIMATOR_NAME: &str = "CatImputerEstimator";

/// Values the imputer can count and persist
pub trait Category: HashKey + Clone + Archivable + fmt::Debug + Send + Sync + 'static {}

impl<T> Category for T where T: HashKey + Clone + Archivable + fmt::Debug + Send + Sync + 'static {}

/// Replaces null inputs with a fixed value
pub struct CatImputerTransformer<I: Nullability> {
    most_frequent: I::Value,
    _input: PhantomData<fn(&I)>,
}

impl<I: Nullability> CatImputerTransformer<I> {
    /// Create an imputer filling nulls with `most_frequent`
    pub fn new(most_frequent: I::Value) -> Self {
        Self {
            most_frequent,
            _input: PhantomData,
        }
    }

    /// The value nulls are replaced with
    pub fn most_frequent_value(&self) -> &I::Value {
        &self.most_frequent
    }
}

impl<I: Nullability> fmt::Debug for CatImputerTransformer<I>
where
    I::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatImputerTransformer")
            .field("most_frequent", &self.most_frequent)
            .finish()
    }
}

impl<I: Nullability> PartialEq for CatImputerTransformer<I>
where
    I::Value: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.most_frequent == other.most_frequent
    }
}

impl<I: Nullability> Transformer for CatImputerTransformer<I>
where
    I::Value: Clone + Archivable,
{
    type Input = I;
    type Output = I::Value;

    fn execute(&mut self, input: &I, callback: &mut dyn FnMut(I::Value)) -> Result<()> {
        if input.is_null() {
            callback(self.most_frequent.clone());
        } else {
            callback(input.nullable_value()?.clone());
        }
        Ok(())
    }

    fn save(&self, archive: &mut Archive) -> Result<()> {
        archive.write_version(1, 0)?;
        self.most_frequent.serialize(archive)
    }

    fn load(archive: &mut Archive) -> Result<Self> {
        archive.expect_version(1, 0)?;
        Ok(Self::new(I::Value::deserialize(archive)?))
    }
}

/// Reads the histogram and keeps its most frequent value
pub struct HistogramConsumer<I: Nullability> {
    most_frequent: Option<I::Value>,
    _input: PhantomData<fn(&I)>,
}

impl<I: Nullability> HistogramConsumer<I> {
    /// Create a consumer that has not picked a value yet
    pub fn new() -> Self {
        Self {
            most_frequent: None,
            _input: PhantomData,
        }
    }
}

impl<I: Nullability> Default for HistogramConsumer<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Nullability> EstimatorImpl for HistogramConsumer<I>
where
    I::Value: Category,
{
    type Input = I;

    fn begin_training(&mut self, _context: &EstimatorContext) -> Result<bool> {
        Ok(false)
    }

    fn complete_training(&mut self, context: &EstimatorContext) -> Result<()> {
        let histogram =
            context.annotation::<HistogramAnnotation<I::Value>>(HISTOGRAM_ESTIMATOR_NAME)?;

        let value = histogram
            .most_frequent()
            .cloned()
            .ok_or_else(|| Error::Training("All null values or empty training set.".into()))?;

        debug!(
            estimator = context.name(),
            column = context.column_index(),
            value = ?value,
            "most frequent value selected"
        );
        self.most_frequent = Some(value);
        Ok(())
    }

    fn expected_passes(&self) -> Option<usize> {
        Some(0)
    }
}

impl<I: Nullability> TransformerFactory for HistogramConsumer<I>
where
    I::Value: Category,
{
    type Transformer = CatImputerTransformer<I>;

    fn create_transformer(&self, context: &EstimatorContext) -> Result<Self::Transformer> {
        let value = self.most_frequent.clone().ok_or_else(|| {
            Error::InvalidOperation(format!(
                "Estimator '{}' has no most frequent value",
                context.name()
            ))
        })?;
        Ok(CatImputerTransformer::new(value))
    }
}

/// Imputer estimator: histogram followed by the consumer
pub type CatImputerEstimator<I> = PipelineEstimator<I, Estimator<HistogramConsumer<I>>>;

/// Create an imputer estimator for `column_index`
pub fn cat_imputer_estimator<I>(
    annotations: AnnotationMapsPtr,
    column_index: usize,
) -> Result<CatImputerEstimator<I>>
where
    I: Nullability + 'static,
    I::Value: Category,
{
    let histogram: PipelineStage<I> = Box::new(Estimator::new(
        HISTOGRAM_ESTIMATOR_NAME,
        annotations.clone(),
        column_index,
        HistogramEstimator::<I>::new(),
    )?);
    let consumer = Estimator::new(
        HISTOGRAM_CONSUMER_ESTIMATOR_NAME,
        annotations.clone(),
        column_index,
        HistogramConsumer::<I>::new(),
    )?;

    PipelineEstimator::new(
        CAT_IMPUTER_ESTIMATOR_NAME,
        annotations,
        column_index,
        vec![histogram],
        consumer,
    )
}

static_assertions::assert_not_impl_any!(CatImputerTransformer<Option<i64>>: Clone);

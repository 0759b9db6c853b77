//! Row normalization
//!
//! The norms of the training rows are computed by a
//! [`VectorNormsEstimator`]; the transformer then divides each element of
//! the n-th row presented to it by the n-th norm. Rows must be presented in
//! training order and no more rows than were trained on can be transformed.

use std::fmt;
use std::marker::PhantomData;

use featurizer_core::{
    AnnotationMapsPtr, Archivable, Archive, Error, Estimator, EstimatorContext, EstimatorImpl,
    Nullability, Numeric, PipelineEstimator, PipelineStage, Result, Transformer,
    TransformerFactory,
};

use super::norms::{NormKind, VectorNormsAnnotation, VectorNormsEstimator, VECTOR_NORMS_ESTIMATOR_NAME};

/// Name of the stage creating the transformer
pub const NORMALIZE_ESTIMATOR_IMPL_NAME: &str = "NormalizeEstimatorImpl";

/// Name of the normalize pipeline
pub const NORMALIZE_ESTIMATOR_NAME: &str = "NormalizeEstimator";

/// Configuration for normalize estimators
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Norm computed for every row
    pub norm: NormKind,

    /// Stop fitting after this many rows
    pub max_num_training_items: Option<usize>,
}

impl NormalizeConfig {
    /// Create a configuration for `norm`
    pub fn new(norm: NormKind) -> Self {
        Self {
            norm,
            max_num_training_items: None,
        }
    }

    /// Set the norm type
    pub fn with_norm(mut self, norm: NormKind) -> Self {
        self.norm = norm;
        self
    }

    /// Stop fitting after `count` rows
    pub fn with_max_num_training_items(mut self, count: usize) -> Self {
        self.max_num_training_items = Some(count);
        self
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidArgument(format!("Invalid normalize configuration: {e}")))
    }
}

/// Divides every element of a row by the norm computed for that row
pub struct NormalizeTransformer<T> {
    norms: Vec<f64>,
    row: usize,
    _value: PhantomData<fn(&T)>,
}

impl<T> NormalizeTransformer<T> {
    /// Create a transformer over `norms`, one per row
    pub fn new(norms: Vec<f64>) -> Result<Self> {
        if norms.is_empty() {
            return Err(Error::InvalidArgument(
                "Norms input to NormalizeTransformer is empty!".into(),
            ));
        }
        if norms.iter().any(|norm| *norm < 0.0) {
            return Err(Error::InvalidArgument(
                "Norms shouldn't be less than 0!".into(),
            ));
        }

        Ok(Self {
            norms,
            row: 0,
            _value: PhantomData,
        })
    }

    /// Per-row norms
    pub fn norms(&self) -> &[f64] {
        &self.norms
    }

    /// Number of rows transformed so far
    pub fn rows_transformed(&self) -> usize {
        self.row
    }
}

impl<T> fmt::Debug for NormalizeTransformer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizeTransformer")
            .field("norms", &self.norms)
            .field("row", &self.row)
            .finish()
    }
}

/// Transformers are equal when their norms are; the row position is ignored
impl<T> PartialEq for NormalizeTransformer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.norms == other.norms
    }
}

impl<T> Transformer for NormalizeTransformer<T>
where
    T: Nullability,
    T::Value: Numeric,
{
    type Input = [T];
    type Output = Vec<f64>;

    fn execute(&mut self, input: &[T], callback: &mut dyn FnMut(Vec<f64>)) -> Result<()> {
        let norm = *self.norms.get(self.row).ok_or_else(|| {
            Error::Alignment("Number of norms is not aligned with number of rows!".into())
        })?;

        let mut output = Vec::with_capacity(input.len());
        for value in input {
            if value.is_null() {
                output.push(f64::NAN);
            } else {
                output.push(value.nullable_value()?.to_f64() / norm);
            }
        }

        self.row += 1;
        callback(output);
        Ok(())
    }

    fn flush(&mut self, _callback: &mut dyn FnMut(Vec<f64>)) -> Result<()> {
        if self.row != self.norms.len() {
            return Err(Error::Alignment(format!(
                "Number of norms is not aligned with number of rows! {} norms, {} rows",
                self.norms.len(),
                self.row
            )));
        }
        Ok(())
    }

    fn save(&self, archive: &mut Archive) -> Result<()> {
        archive.write_version(1, 0)?;
        self.norms.serialize(archive)
    }

    fn load(archive: &mut Archive) -> Result<Self> {
        archive.expect_version(1, 0)?;
        Self::new(Vec::<f64>::deserialize(archive)?)
    }
}

/// Reads the published norms; never fits
pub struct NormalizeEstimatorImpl<T> {
    _value: PhantomData<fn(&T)>,
}

impl<T> NormalizeEstimatorImpl<T> {
    /// Create the transformer-producing stage
    pub fn new() -> Self {
        Self {
            _value: PhantomData,
        }
    }
}

impl<T> Default for NormalizeEstimatorImpl<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EstimatorImpl for NormalizeEstimatorImpl<T> {
    type Input = Vec<T>;

    fn begin_training(&mut self, _context: &EstimatorContext) -> Result<bool> {
        Ok(false)
    }

    fn complete_training(&mut self, _context: &EstimatorContext) -> Result<()> {
        Ok(())
    }

    fn expected_passes(&self) -> Option<usize> {
        Some(0)
    }
}

impl<T> TransformerFactory for NormalizeEstimatorImpl<T>
where
    T: Nullability,
    T::Value: Numeric,
{
    type Transformer = NormalizeTransformer<T>;

    fn create_transformer(&self, context: &EstimatorContext) -> Result<Self::Transformer> {
        let annotation = context.annotation::<VectorNormsAnnotation>(VECTOR_NORMS_ESTIMATOR_NAME)?;
        NormalizeTransformer::new(annotation.norms.clone())
    }
}

/// Normalize estimator: vector norms followed by the transformer factory
pub type NormalizeEstimator<T> = PipelineEstimator<Vec<T>, Estimator<NormalizeEstimatorImpl<T>>>;

/// Create a normalize estimator for `column_index`
pub fn normalize_estimator<T>(
    annotations: AnnotationMapsPtr,
    column_index: usize,
    config: &NormalizeConfig,
) -> Result<NormalizeEstimator<T>>
where
    T: Nullability + 'static,
    T::Value: Numeric,
{
    let norms: PipelineStage<Vec<T>> = Box::new(Estimator::new(
        VECTOR_NORMS_ESTIMATOR_NAME,
        annotations.clone(),
        column_index,
        VectorNormsEstimator::<T>::new(config.norm, config.max_num_training_items),
    )?);
    let transformer_stage = Estimator::new(
        NORMALIZE_ESTIMATOR_IMPL_NAME,
        annotations.clone(),
        column_index,
        NormalizeEstimatorImpl::<T>::new(),
    )?;

    PipelineEstimator::new(
        NORMALIZE_ESTIMATOR_NAME,
        annotations,
        column_index,
        vec![norms],
        transformer_stage,
    )
}

static_assertions::assert_not_impl_any!(NormalizeTransformer<f64>: Clone);

//! Per-row vector norms
//!
//! Supports three norm types:
//! - L1: sum of absolute values
//! - L2 (default): square root of the sum of squares
//! - Max: maximum absolute value

use std::fmt;
use std::marker::PhantomData;

use featurizer_core::{EstimatorContext, EstimatorImpl, FitResult, Nullability, Numeric, Result};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Name the norms annotation is published under
pub const VECTOR_NORMS_ESTIMATOR_NAME: &str = "VectorNormsEstimator";

/// Type of norm computed per row
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormKind {
    /// Sum of absolute values
    L1,
    /// Euclidean norm
    #[default]
    L2,
    /// Maximum absolute value
    Max,
}

impl NormKind {
    /// Start accumulating one row
    pub fn updater(self) -> NormUpdater {
        NormUpdater {
            kind: self,
            accumulated: 0.0,
        }
    }
}

impl fmt::Display for NormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::L1 => "l1",
            Self::L2 => "l2",
            Self::Max => "max",
        };
        f.write_str(name)
    }
}

/// Running norm over the values of one row
#[derive(Debug, Clone, Copy)]
pub struct NormUpdater {
    kind: NormKind,
    accumulated: f64,
}

impl NormUpdater {
    /// Fold one value into the norm
    pub fn update(&mut self, value: f64) {
        match self.kind {
            NormKind::L1 => self.accumulated += value.abs(),
            NormKind::L2 => self.accumulated += value * value,
            NormKind::Max => self.accumulated = self.accumulated.max(value.abs()),
        }
    }

    /// Norm of the values folded so far
    pub fn commit(&self) -> f64 {
        match self.kind {
            NormKind::L2 => self.accumulated.sqrt(),
            NormKind::L1 | NormKind::Max => self.accumulated,
        }
    }
}

/// Norms of every training row, in training order
#[derive(Debug, Clone, PartialEq)]
pub struct VectorNormsAnnotation {
    /// Norm type used
    pub kind: NormKind,

    /// One norm per training row
    pub norms: Vec<f64>,
}

/// Computes one norm per training row; null elements are skipped
pub struct VectorNormsEstimator<T> {
    kind: NormKind,
    max_num_training_items: Option<usize>,
    norms: Vec<f64>,
    _value: PhantomData<fn(&T)>,
}

impl<T> VectorNormsEstimator<T> {
    /// Create an estimator computing `kind` norms
    ///
    /// With `max_num_training_items`, fitting completes once that many rows
    /// were seen.
    pub fn new(kind: NormKind, max_num_training_items: Option<usize>) -> Self {
        Self {
            kind,
            max_num_training_items,
            norms: Vec::new(),
            _value: PhantomData,
        }
    }

    fn row_norm(&self, row: &[T]) -> Result<f64>
    where
        T: Nullability,
        T::Value: Numeric,
    {
        let mut updater = self.kind.updater();
        for value in row {
            if !value.is_null() {
                updater.update(value.nullable_value()?.to_f64());
            }
        }
        Ok(updater.commit())
    }
}

impl<T> fmt::Debug for VectorNormsEstimator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorNormsEstimator")
            .field("kind", &self.kind)
            .field("max_num_training_items", &self.max_num_training_items)
            .field("rows", &self.norms.len())
            .finish()
    }
}

impl<T> EstimatorImpl for VectorNormsEstimator<T>
where
    T: Nullability,
    T::Value: Numeric,
{
    type Input = Vec<T>;

    fn fit(&mut self, context: &EstimatorContext, batch: &[Vec<T>]) -> Result<FitResult> {
        for row in batch {
            if self.max_num_training_items == Some(self.norms.len()) {
                break;
            }
            let norm = self.row_norm(row)?;
            self.norms.push(norm);
        }
        trace!(estimator = context.name(), rows = self.norms.len(), "norms updated");

        if self.max_num_training_items == Some(self.norms.len()) {
            return Ok(FitResult::Complete);
        }
        Ok(FitResult::Continue)
    }

    fn complete_training(&mut self, context: &EstimatorContext) -> Result<()> {
        context.publish(VectorNormsAnnotation {
            kind: self.kind,
            norms: std::mem::take(&mut self.norms),
        })
    }
}

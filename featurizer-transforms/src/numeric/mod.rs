//! Numeric featurizers

mod normalize;
mod norms;

pub use normalize::{
    normalize_estimator, NormalizeConfig, NormalizeEstimator, NormalizeEstimatorImpl,
    NormalizeTransformer, NORMALIZE_ESTIMATOR_IMPL_NAME, NORMALIZE_ESTIMATOR_NAME,
};
pub use norms::{
    NormKind, NormUpdater, VectorNormsAnnotation, VectorNormsEstimator,
    VECTOR_NORMS_ESTIMATOR_NAME,
};

//! Categorical featurizers

mod cat_imputer;
mod histogram;

pub use cat_imputer::{
    cat_imputer_estimator, CatImputerEstimator, CatImputerTransformer, Category,
    HistogramConsumer, CAT_IMPUTER_ESTIMATOR_NAME, HISTOGRAM_CONSUMER_ESTIMATOR_NAME,
};
pub use histogram::{HistogramAnnotation, HistogramEstimator, HISTOGRAM_ESTIMATOR_NAME};

//! Core traits and abstractions for streaming featurizers
//!
//! This crate provides the machinery every featurizer builds upon: the
//! estimator training lifecycle, column-scoped annotation maps through which
//! estimators share fit results, the transformer contract, a versioned binary
//! archive for persisting transformers, and per-type null and encoding
//! policies.
//!
//! A typical run creates [`AnnotationMaps`] for the columns of a dataset,
//! builds estimators on top of them, trains each with [`train`], and then
//! applies the resulting transformers with [`transform_all`].

#![warn(missing_docs)]

pub mod annotation;
pub mod archive;
pub mod error;
pub mod estimator;
pub mod io;
pub mod pipeline;
pub mod traits;
pub mod training;
pub mod transformer;

// Re-export key types for convenience
pub use annotation::{Annotation, AnnotationMaps, AnnotationMapsPtr};
pub use archive::{Archive, ArchiveMode};
pub use error::{Error, Result};
pub use estimator::{
    Estimator, EstimatorContext, EstimatorImpl, FitResult, Trainable, TrainingState,
    Transformable, TransformerFactory,
};
pub use io::{load_transformer, save_transformer};
pub use pipeline::{PipelineEstimator, PipelineStage};
pub use traits::{Archivable, HashKey, NullValue, Nullability, Numeric};
pub use training::{train, TrainingConfig};
pub use transformer::{transform_all, Transformer};

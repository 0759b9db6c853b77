//! Estimator training lifecycle
//!
//! Every estimator moves through the same states:
//!
//! ```text
//! Pending --begin_training--> Training --(Complete)--> Finished --complete_training--> Completed
//!                               |  ^                                                      ^
//!                               |  +--(Reset: replay data from the first batch)           |
//!                               +----------------------complete_training-----------------+
//! ```
//!
//! The lifecycle lives in [`Estimator`]; featurizer specific behavior is
//! plugged in through [`EstimatorImpl`] and, for estimators that produce a
//! transformer, [`TransformerFactory`]. Callers drive any estimator (including
//! pipelines) through the [`Trainable`] and [`Transformable`] traits.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::annotation::{Annotation, AnnotationMapsPtr};
use crate::error::{Error, Result};
use crate::transformer::Transformer;

/// Training state of an estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    /// Created, `begin_training` not yet called
    Pending,
    /// Accepting data through `fit`
    Training,
    /// Done with data, waiting for `complete_training`
    Finished,
    /// Training completed; terminal
    Completed,
}

impl fmt::Display for TrainingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Training => "Training",
            Self::Finished => "Finished",
            Self::Completed => "Completed",
        };
        f.write_str(name)
    }
}

/// Signal returned from a fit call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitResult {
    /// More data expected in the current pass
    Continue,
    /// Fitting is done; call `complete_training`
    Complete,
    /// Replay all data from the first batch
    Reset,
}

/// Identity of an estimator and its view of the shared annotation maps
#[derive(Debug, Clone)]
pub struct EstimatorContext {
    /// Name under which annotations are published
    name: String,

    /// Column this estimator operates on
    column_index: usize,

    /// Annotation maps shared with the rest of the pipeline
    annotations: AnnotationMapsPtr,
}

impl EstimatorContext {
    /// Create a context, failing if `column_index` is not tracked by `annotations`
    pub fn new(
        name: impl Into<String>,
        annotations: AnnotationMapsPtr,
        column_index: usize,
    ) -> Result<Self> {
        annotations.check_column(column_index)?;
        Ok(Self {
            name: name.into(),
            column_index,
            annotations,
        })
    }

    /// Name of the estimator
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column of the estimator
    pub fn column_index(&self) -> usize {
        self.column_index
    }

    /// Shared annotation maps
    pub fn annotations(&self) -> &AnnotationMapsPtr {
        &self.annotations
    }

    /// Publish this estimator's annotation for its column
    pub fn publish<A: Annotation>(&self, data: A) -> Result<()> {
        self.annotations.insert(self.column_index, &self.name, data)
    }

    /// Read an annotation published on this column by `producer`
    pub fn annotation<A: Annotation>(&self, producer: &str) -> Result<Arc<A>> {
        self.annotations.get(self.column_index, producer)
    }
}

/// Training interface shared by single estimators and pipelines
pub trait Trainable {
    /// Type of one training value
    type Input;

    /// Name of the estimator
    fn name(&self) -> &str;

    /// Column the estimator operates on
    fn column_index(&self) -> usize;

    /// Annotation maps the estimator reads from and publishes to
    fn annotations(&self) -> &AnnotationMapsPtr;

    /// Current training state
    fn state(&self) -> TrainingState;

    /// Move from `Pending` to `Training` (or straight to `Finished`)
    fn begin_training(&mut self) -> Result<()>;

    /// Feed one batch of training data
    fn fit(&mut self, batch: &[Self::Input]) -> Result<FitResult>;

    /// Signal that every batch of the current pass has been fed
    ///
    /// Returns [`FitResult::Complete`] when fitting is done, or
    /// [`FitResult::Reset`] when the data must be replayed from the start.
    fn on_data_completed(&mut self) -> Result<FitResult>;

    /// Finish training; valid exactly once
    fn complete_training(&mut self) -> Result<()>;

    /// Number of passes over the data started so far
    fn passes(&self) -> usize;

    /// Number of passes this estimator expects to need, if known up front
    fn expected_passes(&self) -> Option<usize>;
}

/// Estimators that manufacture a transformer once trained
pub trait Transformable: Trainable {
    /// Transformer produced by this estimator
    type Transformer: Transformer;

    /// Create the transformer; only valid once training is completed
    fn create_transformer(&self) -> Result<Self::Transformer>;
}

/// Featurizer specific hooks driven by [`Estimator`]
///
/// The state checks are done by [`Estimator`], so hooks only run in the
/// states they are documented for.
pub trait EstimatorImpl {
    /// Type of one training value
    type Input;

    /// Called on `begin_training`; return `false` when there is nothing to fit
    fn begin_training(&mut self, _context: &EstimatorContext) -> Result<bool> {
        Ok(true)
    }

    /// Called for every batch while `Training`
    fn fit(&mut self, context: &EstimatorContext, _batch: &[Self::Input]) -> Result<FitResult> {
        Err(Error::InvalidOperation(format!(
            "Estimator '{}' does not accept training data",
            context.name()
        )))
    }

    /// Called once all batches of a pass have been fed
    fn on_data_completed(&mut self, _context: &EstimatorContext) -> Result<FitResult> {
        Ok(FitResult::Complete)
    }

    /// Called exactly once from `complete_training`
    fn complete_training(&mut self, context: &EstimatorContext) -> Result<()>;

    /// Number of passes this estimator expects to need
    fn expected_passes(&self) -> Option<usize> {
        Some(1)
    }
}

/// Hooks of estimators that produce a transformer
pub trait TransformerFactory: EstimatorImpl {
    /// Transformer produced once training completed
    type Transformer: Transformer;

    /// Build the transformer from fit state or published annotations
    fn create_transformer(&self, context: &EstimatorContext) -> Result<Self::Transformer>;
}

/// Generic estimator enforcing the training lifecycle around an [`EstimatorImpl`]
pub struct Estimator<E> {
    /// Name, column and annotations
    context: EstimatorContext,

    /// Current training state
    state: TrainingState,

    /// Passes over the data started so far
    passes: usize,

    /// Featurizer specific behavior
    inner: E,
}

impl<E: EstimatorImpl> Estimator<E> {
    /// Create an estimator for `column_index`
    pub fn new(
        name: impl Into<String>,
        annotations: AnnotationMapsPtr,
        column_index: usize,
        inner: E,
    ) -> Result<Self> {
        Ok(Self {
            context: EstimatorContext::new(name, annotations, column_index)?,
            state: TrainingState::Pending,
            passes: 0,
            inner,
        })
    }

    /// Featurizer specific state
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Name, column and annotations of this estimator
    pub fn context(&self) -> &EstimatorContext {
        &self.context
    }

    fn require(&self, allowed: &[TrainingState], operation: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(Error::InvalidOperation(format!(
            "'{operation}' is not valid for estimator '{}' in state {}",
            self.context.name(),
            self.state
        )))
    }

    fn transition(&mut self, state: TrainingState) {
        debug!(
            estimator = self.context.name(),
            column = self.context.column_index(),
            from = %self.state,
            to = %state,
            "training state change"
        );
        self.state = state;
    }

    fn start_pass(&mut self) {
        self.passes += 1;
        if self.passes > 1 {
            warn!(
                estimator = self.context.name(),
                pass = self.passes,
                "replaying training data"
            );
        }
    }
}

impl<E: EstimatorImpl> Trainable for Estimator<E> {
    type Input = E::Input;

    fn name(&self) -> &str {
        self.context.name()
    }

    fn column_index(&self) -> usize {
        self.context.column_index()
    }

    fn annotations(&self) -> &AnnotationMapsPtr {
        self.context.annotations()
    }

    fn state(&self) -> TrainingState {
        self.state
    }

    fn begin_training(&mut self) -> Result<()> {
        self.require(&[TrainingState::Pending], "begin_training")?;

        if self.inner.begin_training(&self.context)? {
            self.start_pass();
            self.transition(TrainingState::Training);
        } else {
            self.transition(TrainingState::Finished);
        }
        Ok(())
    }

    fn fit(&mut self, batch: &[Self::Input]) -> Result<FitResult> {
        self.require(&[TrainingState::Training], "fit")?;
        trace!(estimator = self.context.name(), rows = batch.len(), "fit");

        let result = self.inner.fit(&self.context, batch)?;
        match result {
            FitResult::Continue => {}
            FitResult::Complete => self.transition(TrainingState::Finished),
            FitResult::Reset => self.start_pass(),
        }
        Ok(result)
    }

    fn on_data_completed(&mut self) -> Result<FitResult> {
        self.require(&[TrainingState::Training], "on_data_completed")?;

        match self.inner.on_data_completed(&self.context)? {
            FitResult::Complete => {
                self.transition(TrainingState::Finished);
                Ok(FitResult::Complete)
            }
            FitResult::Continue | FitResult::Reset => {
                self.start_pass();
                Ok(FitResult::Reset)
            }
        }
    }

    fn complete_training(&mut self) -> Result<()> {
        self.require(
            &[TrainingState::Training, TrainingState::Finished],
            "complete_training",
        )?;

        self.inner.complete_training(&self.context)?;
        self.transition(TrainingState::Completed);
        info!(
            run_id = %self.context.annotations().run_id(),
            estimator = self.context.name(),
            column = self.context.column_index(),
            passes = self.passes,
            "training completed"
        );
        Ok(())
    }

    fn passes(&self) -> usize {
        self.passes
    }

    fn expected_passes(&self) -> Option<usize> {
        self.inner.expected_passes()
    }
}

impl<E: TransformerFactory> Transformable for Estimator<E> {
    type Transformer = E::Transformer;

    fn create_transformer(&self) -> Result<Self::Transformer> {
        self.require(&[TrainingState::Completed], "create_transformer")?;
        self.inner.create_transformer(&self.context)
    }
}

impl<E> fmt::Debug for Estimator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Estimator")
            .field("name", &self.context.name())
            .field("column_index", &self.context.column_index())
            .field("state", &self.state)
            .field("passes", &self.passes)
            .finish_non_exhaustive()
    }
}

static_assertions::assert_not_impl_any!(Estimator<()>: Clone);

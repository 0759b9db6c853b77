//! Pipeline of estimators presented as a single estimator
//!
//! A [`PipelineEstimator`] chains annotation-producing stages with a final
//! transformer-producing stage. All stages share one annotation map and one
//! column. Stages are trained one after the other, each over the full data:
//! when a stage completes and the next one needs data, the pipeline answers
//! [`FitResult::Reset`] so the caller replays the data from the first batch.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::annotation::AnnotationMapsPtr;
use crate::error::{Error, Result};
use crate::estimator::{FitResult, Trainable, TrainingState, Transformable};

/// Boxed annotation-producing stage of a pipeline
pub type PipelineStage<I> = Box<dyn Trainable<Input = I> + Send>;

/// Chain of estimators sharing one annotation map and column
pub struct PipelineEstimator<I, F> {
    /// Name of the pipeline
    name: String,

    /// Column shared by every stage
    column_index: usize,

    /// Annotation maps shared by every stage
    annotations: AnnotationMapsPtr,

    /// Annotation-producing stages, in order
    stages: Vec<PipelineStage<I>>,

    /// Stage that creates the transformer
    final_stage: F,

    /// Index of the stage currently being trained
    active: usize,

    /// State of the pipeline as a whole
    state: TrainingState,

    /// Passes over the data started so far, across all stages
    passes: usize,
}

impl<I, F> PipelineEstimator<I, F>
where
    F: Transformable<Input = I>,
{
    /// Create a pipeline from at least one leading stage and a final stage
    ///
    /// Every stage must operate on `column_index`.
    pub fn new(
        name: impl Into<String>,
        annotations: AnnotationMapsPtr,
        column_index: usize,
        stages: Vec<PipelineStage<I>>,
        final_stage: F,
    ) -> Result<Self> {
        let name = name.into();
        annotations.check_column(column_index)?;

        if stages.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "Pipeline '{name}' needs at least two estimators"
            )));
        }

        let mismatched = stages
            .iter()
            .map(|stage| (stage.name(), stage.column_index()))
            .chain(std::iter::once((final_stage.name(), final_stage.column_index())))
            .find(|(_, column)| *column != column_index);
        if let Some((stage, column)) = mismatched {
            return Err(Error::InvalidArgument(format!(
                "Stage '{stage}' of pipeline '{name}' uses column {column}, expected {column_index}"
            )));
        }

        let foreign = stages
            .iter()
            .map(|stage| (stage.name(), stage.annotations()))
            .chain(std::iter::once((final_stage.name(), final_stage.annotations())))
            .find(|(_, maps)| !Arc::ptr_eq(maps, &annotations));
        if let Some((stage, _)) = foreign {
            return Err(Error::InvalidArgument(format!(
                "Stage '{stage}' of pipeline '{name}' uses different annotation maps"
            )));
        }

        let all_pending = stages
            .iter()
            .all(|stage| stage.state() == TrainingState::Pending)
            && final_stage.state() == TrainingState::Pending;
        if !all_pending {
            return Err(Error::InvalidArgument(format!(
                "Stages of pipeline '{name}' must not have started training"
            )));
        }

        Ok(Self {
            name,
            column_index,
            annotations,
            stages,
            final_stage,
            active: 0,
            state: TrainingState::Pending,
            passes: 0,
        })
    }

    /// Number of stages, including the final one
    pub fn num_stages(&self) -> usize {
        self.stages.len() + 1
    }

    /// Index of the stage currently being trained
    pub fn active_stage(&self) -> usize {
        self.active
    }

    /// The transformer-producing stage
    pub fn final_stage(&self) -> &F {
        &self.final_stage
    }

    fn stage(&self, index: usize) -> &dyn Trainable<Input = I> {
        match self.stages.get(index) {
            Some(stage) => stage.as_ref(),
            None => &self.final_stage,
        }
    }

    fn stage_mut(&mut self, index: usize) -> &mut dyn Trainable<Input = I> {
        match self.stages.get_mut(index) {
            Some(stage) => stage.as_mut(),
            None => &mut self.final_stage,
        }
    }

    fn require(&self, allowed: &[TrainingState], operation: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(Error::InvalidOperation(format!(
            "'{operation}' is not valid for pipeline '{}' in state {}",
            self.name, self.state
        )))
    }

    /// Walk stages forward until one needs data or all are completed
    ///
    /// Stages that are done are completed, which publishes their annotations
    /// before the next stage begins. With `force`, stages still in training
    /// are completed with whatever data they saw. Returns true if the active
    /// stage is waiting for data.
    fn settle(&mut self, force: bool) -> Result<bool> {
        loop {
            let index = self.active;
            let state = self.stage(index).state();
            match state {
                TrainingState::Training if !force => return Ok(true),
                TrainingState::Pending => self.stage_mut(index).begin_training()?,
                TrainingState::Training | TrainingState::Finished => {
                    self.stage_mut(index).complete_training()?;
                }
                TrainingState::Completed => {
                    if index + 1 == self.num_stages() {
                        return Ok(false);
                    }
                    self.active += 1;
                    debug!(
                        pipeline = %self.name,
                        stage = self.stage(self.active).name(),
                        index = self.active,
                        "advancing to next stage"
                    );
                }
            }
        }
    }

    /// Follow up on a completed stage: ask for a replay or finish
    fn advance(&mut self) -> Result<FitResult> {
        if self.settle(false)? {
            self.passes += 1;
            Ok(FitResult::Reset)
        } else {
            self.state = TrainingState::Finished;
            Ok(FitResult::Complete)
        }
    }
}

impl<I, F> Trainable for PipelineEstimator<I, F>
where
    F: Transformable<Input = I>,
{
    type Input = I;

    fn name(&self) -> &str {
        &self.name
    }

    fn column_index(&self) -> usize {
        self.column_index
    }

    fn annotations(&self) -> &AnnotationMapsPtr {
        &self.annotations
    }

    fn state(&self) -> TrainingState {
        self.state
    }

    fn begin_training(&mut self) -> Result<()> {
        self.require(&[TrainingState::Pending], "begin_training")?;

        if self.settle(false)? {
            self.passes = 1;
            self.state = TrainingState::Training;
        } else {
            self.state = TrainingState::Finished;
        }
        debug!(pipeline = %self.name, state = %self.state, "pipeline training started");
        Ok(())
    }

    fn fit(&mut self, batch: &[I]) -> Result<FitResult> {
        self.require(&[TrainingState::Training], "fit")?;

        let index = self.active;
        match self.stage_mut(index).fit(batch)? {
            FitResult::Continue => Ok(FitResult::Continue),
            FitResult::Reset => {
                self.passes += 1;
                Ok(FitResult::Reset)
            }
            FitResult::Complete => self.advance(),
        }
    }

    fn on_data_completed(&mut self) -> Result<FitResult> {
        self.require(&[TrainingState::Training], "on_data_completed")?;

        let index = self.active;
        match self.stage_mut(index).on_data_completed()? {
            FitResult::Complete => self.advance(),
            FitResult::Continue | FitResult::Reset => {
                self.passes += 1;
                Ok(FitResult::Reset)
            }
        }
    }

    fn complete_training(&mut self) -> Result<()> {
        self.require(
            &[TrainingState::Training, TrainingState::Finished],
            "complete_training",
        )?;

        self.settle(true)?;
        self.state = TrainingState::Completed;
        info!(
            run_id = %self.annotations.run_id(),
            pipeline = %self.name,
            column = self.column_index,
            passes = self.passes,
            "pipeline training completed"
        );
        Ok(())
    }

    fn passes(&self) -> usize {
        self.passes
    }

    fn expected_passes(&self) -> Option<usize> {
        self.stages
            .iter()
            .map(|stage| stage.expected_passes())
            .chain(std::iter::once(self.final_stage.expected_passes()))
            .sum()
    }
}

impl<I, F> Transformable for PipelineEstimator<I, F>
where
    F: Transformable<Input = I>,
{
    type Transformer = F::Transformer;

    fn create_transformer(&self) -> Result<Self::Transformer> {
        self.require(&[TrainingState::Completed], "create_transformer")?;
        self.final_stage.create_transformer()
    }
}

impl<I, F> fmt::Debug for PipelineEstimator<I, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineEstimator")
            .field("name", &self.name)
            .field("column_index", &self.column_index)
            .field("num_stages", &(self.stages.len() + 1))
            .field("active", &self.active)
            .field("state", &self.state)
            .field("passes", &self.passes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationMaps;
    use crate::archive::Archive;
    use crate::estimator::{Estimator, EstimatorContext, EstimatorImpl, TransformerFactory};
    use crate::traits::Archivable;
    use crate::training::{train, TrainingConfig};
    use crate::transformer::Transformer;

    /// Publishes the maximum of the data
    struct MaxFinder(i64);

    impl EstimatorImpl for MaxFinder {
        type Input = i64;

        fn fit(&mut self, _context: &EstimatorContext, batch: &[i64]) -> Result<FitResult> {
            self.0 = batch.iter().copied().fold(self.0, i64::max);
            Ok(FitResult::Continue)
        }

        fn complete_training(&mut self, context: &EstimatorContext) -> Result<()> {
            context.publish(self.0)
        }
    }

    /// Counts values above the published maximum divided by two
    #[derive(Default)]
    struct AboveHalf {
        half: Option<i64>,
        count: u32,
    }

    impl EstimatorImpl for AboveHalf {
        type Input = i64;

        fn begin_training(&mut self, context: &EstimatorContext) -> Result<bool> {
            self.half = Some(*context.annotation::<i64>("MaxFinder")? / 2);
            Ok(true)
        }

        fn fit(&mut self, _context: &EstimatorContext, batch: &[i64]) -> Result<FitResult> {
            let half = self.half.unwrap_or_default();
            self.count += u32::try_from(batch.iter().filter(|v| **v > half).count()).unwrap();
            Ok(FitResult::Continue)
        }

        fn complete_training(&mut self, _context: &EstimatorContext) -> Result<()> {
            Ok(())
        }
    }

    impl TransformerFactory for AboveHalf {
        type Transformer = Constant;

        fn create_transformer(&self, _context: &EstimatorContext) -> Result<Constant> {
            Ok(Constant(self.count))
        }
    }

    /// Reads the published maximum without fitting
    struct MaxReader;

    impl EstimatorImpl for MaxReader {
        type Input = i64;

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

    impl TransformerFactory for MaxReader {
        type Transformer = Constant;

        fn create_transformer(&self, context: &EstimatorContext) -> Result<Constant> {
            let max = *context.annotation::<i64>("MaxFinder")?;
            Ok(Constant(u32::try_from(max).unwrap_or(u32::MAX)))
        }
    }

    #[derive(Debug, PartialEq)]
    struct Constant(u32);

    impl Transformer for Constant {
        type Input = i64;
        type Output = u32;

        fn execute(&mut self, _input: &i64, callback: &mut dyn FnMut(u32)) -> Result<()> {
            callback(self.0);
            Ok(())
        }

        fn save(&self, archive: &mut Archive) -> Result<()> {
            archive.write_version(1, 0)?;
            self.0.serialize(archive)
        }

        fn load(archive: &mut Archive) -> Result<Self> {
            archive.expect_version(1, 0)?;
            Ok(Self(u32::deserialize(archive)?))
        }
    }

    fn max_stage(maps: &AnnotationMapsPtr) -> PipelineStage<i64> {
        Box::new(Estimator::new("MaxFinder", maps.clone(), 0, MaxFinder(i64::MIN)).unwrap())
    }

    #[test]
    fn test_reader_final_stage() {
        let maps = AnnotationMaps::new(1);
        let final_stage = Estimator::new("MaxReader", maps.clone(), 0, MaxReader).unwrap();
        let mut pipeline =
            PipelineEstimator::new("Max", maps.clone(), 0, vec![max_stage(&maps)], final_stage)
                .unwrap();

        assert_eq!(pipeline.expected_passes(), Some(1));
        pipeline.begin_training().unwrap();
        assert_eq!(pipeline.fit(&[3, 9, 4]).unwrap(), FitResult::Continue);
        assert_eq!(pipeline.on_data_completed().unwrap(), FitResult::Complete);
        assert_eq!(pipeline.state(), TrainingState::Finished);

        pipeline.complete_training().unwrap();
        let mut transformer = pipeline.create_transformer().unwrap();
        assert_eq!(transformer.transform(&0).unwrap(), vec![9]);
    }

    #[test]
    fn test_fitting_final_stage_requests_replay() {
        let maps = AnnotationMaps::new(1);
        let final_stage = Estimator::new("AboveHalf", maps.clone(), 0, AboveHalf::default()).unwrap();
        let mut pipeline =
            PipelineEstimator::new("Above", maps.clone(), 0, vec![max_stage(&maps)], final_stage)
                .unwrap();

        pipeline.begin_training().unwrap();
        pipeline.fit(&[2, 10]).unwrap();
        pipeline.fit(&[6]).unwrap();
        assert_eq!(pipeline.on_data_completed().unwrap(), FitResult::Reset);
        assert_eq!(pipeline.active_stage(), 1);
        assert!(maps.contains(0, "MaxFinder"));

        pipeline.fit(&[2, 10]).unwrap();
        pipeline.fit(&[6]).unwrap();
        assert_eq!(pipeline.on_data_completed().unwrap(), FitResult::Complete);
        pipeline.complete_training().unwrap();

        assert_eq!(pipeline.passes(), 2);
        assert_eq!(pipeline.create_transformer().unwrap(), Constant(2));
    }

    #[test]
    fn test_train_driver_with_pipeline() {
        let maps = AnnotationMaps::new(1);
        let final_stage = Estimator::new("AboveHalf", maps.clone(), 0, AboveHalf::default()).unwrap();
        let mut pipeline =
            PipelineEstimator::new("Above", maps.clone(), 0, vec![max_stage(&maps)], final_stage)
                .unwrap();

        train(&mut pipeline, &[vec![1, 8], vec![5, 3]], &TrainingConfig::default()).unwrap();
        assert_eq!(pipeline.state(), TrainingState::Completed);
        assert_eq!(pipeline.create_transformer().unwrap(), Constant(2));
    }

    #[test]
    fn test_create_transformer_before_completion_fails() {
        let maps = AnnotationMaps::new(1);
        let final_stage = Estimator::new("MaxReader", maps.clone(), 0, MaxReader).unwrap();
        let mut pipeline =
            PipelineEstimator::new("Max", maps.clone(), 0, vec![max_stage(&maps)], final_stage)
                .unwrap();

        assert!(pipeline.create_transformer().is_err());
        pipeline.begin_training().unwrap();
        assert!(matches!(pipeline.create_transformer(), Err(Error::InvalidOperation(_))));
    }

    #[test]
    fn test_missing_annotation_surfaces() {
        let maps = AnnotationMaps::new(1);
        let reader = Estimator::new("MaxReader", maps.clone(), 0, MaxReader).unwrap();
        let lead: PipelineStage<i64> =
            Box::new(Estimator::new("Other", maps.clone(), 0, MaxFinder(0)).unwrap());
        let mut pipeline = PipelineEstimator::new("Max", maps, 0, vec![lead], reader).unwrap();

        train(&mut pipeline, &[vec![1]], &TrainingConfig::default()).unwrap();
        assert!(matches!(
            pipeline.create_transformer(),
            Err(Error::MissingAnnotation { .. })
        ));
    }

    #[test]
    fn test_construction_checks() {
        let maps = AnnotationMaps::new(2);
        let reader = Estimator::new("MaxReader", maps.clone(), 0, MaxReader).unwrap();
        assert!(matches!(
            PipelineEstimator::new("Max", maps.clone(), 0, Vec::new(), reader),
            Err(Error::InvalidArgument(_))
        ));

        let reader = Estimator::new("MaxReader", maps.clone(), 1, MaxReader).unwrap();
        assert!(matches!(
            PipelineEstimator::new("Max", maps.clone(), 0, vec![max_stage(&maps)], reader),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_stages_must_share_annotation_maps() {
        let maps = AnnotationMaps::new(1);
        let other = AnnotationMaps::new(1);

        let reader = Estimator::new("MaxReader", maps.clone(), 0, MaxReader).unwrap();
        let err = PipelineEstimator::new("Max", maps.clone(), 0, vec![max_stage(&other)], reader)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(err.to_string().contains("MaxFinder"));

        let reader = Estimator::new("MaxReader", other.clone(), 0, MaxReader).unwrap();
        assert!(matches!(
            PipelineEstimator::new("Max", maps.clone(), 0, vec![max_stage(&maps)], reader),
            Err(Error::InvalidArgument(_))
        ));

        let reader = Estimator::new("MaxReader", maps.clone(), 0, MaxReader).unwrap();
        let pipeline =
            PipelineEstimator::new("Max", maps.clone(), 0, vec![max_stage(&maps)], reader).unwrap();
        assert!(Arc::ptr_eq(pipeline.annotations(), &maps));
    }
}

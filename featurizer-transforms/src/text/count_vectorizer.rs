//! Count vectorizer
//!
//! Emits one [`TfStruct`] per distinct vocabulary term of a document, in
//! lexicographic term order.

use std::collections::HashMap;

use featurizer_core::{
    AnnotationMapsPtr, Archivable, Archive, Error, Estimator, EstimatorContext, EstimatorImpl,
    PipelineEstimator, PipelineStage, Result, Transformer, TransformerFactory,
};

use super::document_statistics::{
    DocumentStatisticsAnnotation, DocumentStatisticsConfig, DocumentStatisticsEstimator,
    DOCUMENT_STATISTICS_ESTIMATOR_NAME,
};
use super::strings::{term_frequencies, StringDecorator};

/// Name of the stage creating the transformer
pub const COUNT_VECTORIZER_ESTIMATOR_IMPL_NAME: &str = "CountVectorizerEstimatorImpl";

/// Name of the count vectorizer pipeline
pub const COUNT_VECTORIZER_ESTIMATOR_NAME: &str = "CountVectorizerEstimator";

/// Vocabulary index and number of appearances of one term in a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TfStruct {
    /// Index of the term in the vocabulary
    pub dictionary_id: u32,

    /// Number of appearances, or 1 for binary vectorizers
    pub num_of_appearances: u32,
}

impl TfStruct {
    /// Create a term frequency entry
    pub fn new(dictionary_id: u32, num_of_appearances: u32) -> Self {
        Self {
            dictionary_id,
            num_of_appearances,
        }
    }
}

/// Configuration of a count vectorizer
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CountVectorizerConfig {
    /// Report 1 instead of the count for every present term
    pub binary: bool,

    /// Vocabulary options
    #[serde(flatten)]
    pub statistics: DocumentStatisticsConfig,
}

impl CountVectorizerConfig {
    /// Report presence instead of counts
    pub fn with_binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    /// Document frequency bounds, as fractions of the documents
    pub fn with_df_bounds(mut self, min_df: f32, max_df: f32) -> Self {
        self.statistics.min_df = min_df;
        self.statistics.max_df = max_df;
        self
    }

    /// Use a fixed vocabulary
    pub fn with_vocabulary(mut self, vocabulary: HashMap<String, u32>) -> Self {
        self.statistics.vocabulary = Some(vocabulary);
        self
    }

    /// Keep only the `max_features` most frequent terms
    pub fn with_max_features(mut self, max_features: u32) -> Self {
        self.statistics.max_features = Some(max_features);
        self
    }

    /// Transform training documents before tokenizing them
    pub fn with_decorator(mut self, decorator: StringDecorator) -> Self {
        self.statistics.decorator = Some(decorator);
        self
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::InvalidArgument(format!("Invalid count vectorizer configuration: {e}"))
        })
    }
}

/// Maps documents to vocabulary term counts
#[derive(Debug, PartialEq, Eq)]
pub struct CountVectorizerTransformer {
    labels: HashMap<String, u32>,
    binary: bool,
}

impl CountVectorizerTransformer {
    /// Create a transformer over a non-empty vocabulary
    pub fn new(labels: HashMap<String, u32>, binary: bool) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::InvalidArgument("Index map is empty!".into()));
        }
        Ok(Self { labels, binary })
    }

    /// Term to vocabulary index mapping
    pub fn labels(&self) -> &HashMap<String, u32> {
        &self.labels
    }

    /// Whether counts are reported as presence
    pub fn binary(&self) -> bool {
        self.binary
    }
}

impl Transformer for CountVectorizerTransformer {
    type Input = str;
    type Output = TfStruct;

    fn execute(&mut self, input: &str, callback: &mut dyn FnMut(TfStruct)) -> Result<()> {
        for (term, count) in term_frequencies(input) {
            if let Some(&dictionary_id) = self.labels.get(term) {
                let count = if self.binary { 1 } else { count };
                callback(TfStruct::new(dictionary_id, count));
            }
        }
        Ok(())
    }

    fn save(&self, archive: &mut Archive) -> Result<()> {
        archive.write_version(1, 0)?;
        self.labels.serialize(archive)?;
        self.binary.serialize(archive)
    }

    fn load(archive: &mut Archive) -> Result<Self> {
        archive.expect_version(1, 0)?;
        let labels = HashMap::<String, u32>::deserialize(archive)?;
        let binary = bool::deserialize(archive)?;
        Self::new(labels, binary)
    }
}

/// Builds the transformer from the published document statistics
#[derive(Debug)]
pub struct CountVectorizerEstimatorImpl {
    binary: bool,
}

impl CountVectorizerEstimatorImpl {
    /// Create the transformer-producing stage
    pub fn new(binary: bool) -> Self {
        Self { binary }
    }
}

impl EstimatorImpl for CountVectorizerEstimatorImpl {
    type Input = String;

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

impl TransformerFactory for CountVectorizerEstimatorImpl {
    type Transformer = CountVectorizerTransformer;

    fn create_transformer(&self, context: &EstimatorContext) -> Result<Self::Transformer> {
        let statistics = context
            .annotation::<DocumentStatisticsAnnotation>(DOCUMENT_STATISTICS_ESTIMATOR_NAME)?;
        CountVectorizerTransformer::new(statistics.labels(), self.binary)
    }
}

/// Count vectorizer estimator: document statistics followed by the factory
pub type CountVectorizerEstimator = PipelineEstimator<String, Estimator<CountVectorizerEstimatorImpl>>;

/// Create a count vectorizer estimator for `column_index`
pub fn count_vectorizer_estimator(
    annotations: AnnotationMapsPtr,
    column_index: usize,
    config: CountVectorizerConfig,
) -> Result<CountVectorizerEstimator> {
    let statistics: PipelineStage<String> = Box::new(Estimator::new(
        DOCUMENT_STATISTICS_ESTIMATOR_NAME,
        annotations.clone(),
        column_index,
        DocumentStatisticsEstimator::new(config.statistics)?,
    )?);
    let transformer_stage = Estimator::new(
        COUNT_VECTORIZER_ESTIMATOR_IMPL_NAME,
        annotations.clone(),
        column_index,
        CountVectorizerEstimatorImpl::new(config.binary),
    )?;

    PipelineEstimator::new(
        COUNT_VECTORIZER_ESTIMATOR_NAME,
        annotations,
        column_index,
        vec![statistics],
        transformer_stage,
    )
}

static_assertions::assert_not_impl_any!(CountVectorizerTransformer: Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use featurizer_core::{train, AnnotationMaps, Transformable, TrainingConfig};

    fn labels(terms: &[(&str, u32)]) -> HashMap<String, u32> {
        terms.iter().map(|(t, i)| ((*t).to_string(), *i)).collect()
    }

    #[test]
    fn test_counts_known_terms() {
        let mut transformer =
            CountVectorizerTransformer::new(labels(&[("b", 0), ("a", 1)]), false).unwrap();
        let out = transformer.transform("b a c b  b").unwrap();
        assert_eq!(out, vec![TfStruct::new(1, 1), TfStruct::new(0, 3)]);
    }

    #[test]
    fn test_binary_counts() {
        let mut transformer = CountVectorizerTransformer::new(labels(&[("b", 0)]), true).unwrap();
        assert_eq!(transformer.transform("b b b").unwrap(), vec![TfStruct::new(0, 1)]);
        assert!(transformer.transform("c").unwrap().is_empty());
    }

    #[test]
    fn test_empty_labels_rejected() {
        let err = CountVectorizerTransformer::new(HashMap::new(), false).unwrap_err();
        assert!(err.to_string().contains("Index map is empty!"));
    }

    #[test]
    fn test_serialization() {
        let transformer =
            CountVectorizerTransformer::new(labels(&[("ab", 4), ("c", 9)]), true).unwrap();
        let bytes = transformer.to_bytes().unwrap();
        // version, count, ("ab", 4), ("c", 9), binary
        assert_eq!(bytes.len(), 4 + 4 + (4 + 2 + 4) + (4 + 1 + 4) + 1);
        assert_eq!(CountVectorizerTransformer::from_bytes(bytes).unwrap(), transformer);
    }

    #[test]
    fn test_trained_vectorizer() {
        let mut estimator = count_vectorizer_estimator(
            AnnotationMaps::new(1),
            0,
            CountVectorizerConfig::default(),
        )
        .unwrap();
        let batches = vec![vec!["a b".to_string(), "b c".to_string()]];
        train(&mut estimator, &batches, &TrainingConfig::default()).unwrap();

        let mut transformer = estimator.create_transformer().unwrap();
        assert_eq!(
            transformer.transform("c c a").unwrap(),
            vec![TfStruct::new(0, 1), TfStruct::new(2, 2)]
        );
    }

    #[test]
    fn test_config_from_json() {
        let config = CountVectorizerConfig::from_json(
            r#"{"binary": true, "max_df": 0.5, "max_features": 10}"#,
        )
        .unwrap();
        assert!(config.binary);
        assert!((config.statistics.max_df - 0.5).abs() < f32::EPSILON);
        assert!(config.statistics.min_df.abs() < f32::EPSILON);
        assert_eq!(config.statistics.max_features, Some(10));
        assert!(config.statistics.decorator.is_none());
    }
}

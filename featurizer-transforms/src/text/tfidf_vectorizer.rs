//! TF-IDF vectorizer
//!
//! For each vocabulary term of a document the weight is `tf * idf` where
//! - `tf` is 1 for binary vectorizers, else `1 + ln(count)` when sublinear,
//!   else the raw count;
//! - `idf` is 1 when unused, else `1 + ln((1 + n) / (1 + df))` when smoothed,
//!   else `1 + ln((1 + n) / df)`.
//!
//! Weights of one document are then divided by their L1 or L2 norm.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

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
pub const TFIDF_VECTORIZER_ESTIMATOR_IMPL_NAME: &str = "TfidfVectorizerEstimatorImpl";

/// Name of the TF-IDF pipeline
pub const TFIDF_VECTORIZER_ESTIMATOR_NAME: &str = "TfidfVectorizerEstimator";

/// Tolerance used when comparing weights
pub const TFIDF_EPSILON: f32 = 1e-6;

/// Vocabulary index and weight of one term in a document
#[derive(Debug, Clone, Copy)]
pub struct TfidfStruct {
    /// Index of the term in the vocabulary
    pub dictionary_id: u32,

    /// Normalized TF-IDF weight
    pub value: f32,
}

impl TfidfStruct {
    /// Create a weight entry
    pub fn new(dictionary_id: u32, value: f32) -> Self {
        Self {
            dictionary_id,
            value,
        }
    }
}

/// Weights within [`TFIDF_EPSILON`] compare equal
impl PartialEq for TfidfStruct {
    fn eq(&self, other: &Self) -> bool {
        self.dictionary_id == other.dictionary_id
            && (self.value - other.value).abs() <= TFIDF_EPSILON
    }
}

/// Per-document normalization of the weights
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TfidfNorm {
    /// Divide by the sum of absolute weights
    L1,
    /// Divide by the Euclidean norm of the weights
    #[default]
    L2,
}

impl TfidfNorm {
    /// Name used in configurations and archives
    pub fn as_str(self) -> &'static str {
        match self {
            Self::L1 => "l1",
            Self::L2 => "l2",
        }
    }
}

impl fmt::Display for TfidfNorm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TfidfNorm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "l1" => Ok(Self::L1),
            "l2" => Ok(Self::L2),
            other => Err(Error::InvalidArgument(format!(
                "norm must be \"l1\" or \"l2\", got \"{other}\""
            ))),
        }
    }
}

/// How term weights are computed
#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TfidfWeighting {
    /// Use 1 as the term frequency of every present term
    pub binary: bool,

    /// Per-document normalization
    pub norm: TfidfNorm,

    /// Weight terms by inverse document frequency
    pub use_idf: bool,

    /// Add one to document frequencies, as if an extra document held every term
    pub smooth_idf: bool,

    /// Replace the term frequency with `1 + ln(tf)`
    pub sublinear_tf: bool,
}

impl Default for TfidfWeighting {
    fn default() -> Self {
        Self {
            binary: false,
            norm: TfidfNorm::L2,
            use_idf: true,
            smooth_idf: true,
            sublinear_tf: false,
        }
    }
}

impl TfidfWeighting {
    fn term_frequency(&self, count: u32) -> f64 {
        if self.binary {
            1.0
        } else if self.sublinear_tf {
            1.0 + f64::from(count).ln()
        } else {
            f64::from(count)
        }
    }

    fn inverse_document_frequency(&self, total_num_documents: u32, document_frequency: u32) -> f64 {
        let documents = 1.0 + f64::from(total_num_documents);
        if !self.use_idf {
            1.0
        } else if self.smooth_idf {
            1.0 + (documents / (1.0 + f64::from(document_frequency))).ln()
        } else {
            1.0 + (documents / f64::from(document_frequency)).ln()
        }
    }
}

/// Configuration of a TF-IDF vectorizer
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TfidfVectorizerConfig {
    /// Weighting options
    #[serde(flatten)]
    pub weighting: TfidfWeighting,

    /// Vocabulary options
    #[serde(flatten)]
    pub statistics: DocumentStatisticsConfig,
}

impl TfidfVectorizerConfig {
    /// Use 1 as the term frequency of every present term
    pub fn with_binary(mut self, binary: bool) -> Self {
        self.weighting.binary = binary;
        self
    }

    /// Per-document normalization
    pub fn with_norm(mut self, norm: TfidfNorm) -> Self {
        self.weighting.norm = norm;
        self
    }

    /// Weight by inverse document frequency
    pub fn with_use_idf(mut self, use_idf: bool) -> Self {
        self.weighting.use_idf = use_idf;
        self
    }

    /// Smooth inverse document frequencies
    pub fn with_smooth_idf(mut self, smooth_idf: bool) -> Self {
        self.weighting.smooth_idf = smooth_idf;
        self
    }

    /// Use sublinear term frequencies
    pub fn with_sublinear_tf(mut self, sublinear_tf: bool) -> Self {
        self.weighting.sublinear_tf = sublinear_tf;
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
            Error::InvalidArgument(format!("Invalid TF-IDF vectorizer configuration: {e}"))
        })
    }
}

/// Maps documents to normalized TF-IDF weights of their vocabulary terms
#[derive(Debug, PartialEq, Eq)]
pub struct TfidfTransformer {
    labels: HashMap<String, u32>,
    document_frequency: HashMap<String, u32>,
    total_num_documents: u32,
    weighting: TfidfWeighting,
}

impl TfidfTransformer {
    /// Create a transformer; every label needs a document frequency
    pub fn new(
        labels: HashMap<String, u32>,
        document_frequency: HashMap<String, u32>,
        total_num_documents: u32,
        weighting: TfidfWeighting,
    ) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::InvalidArgument("Index map is empty!".into()));
        }
        if document_frequency.is_empty() {
            return Err(Error::InvalidArgument("DocumentFrequency map is empty!".into()));
        }
        if let Some(term) = labels
            .keys()
            .find(|term| document_frequency.get(*term).map_or(true, |df| *df == 0))
        {
            return Err(Error::InvalidArgument(format!(
                "Term '{term}' has no document frequency"
            )));
        }

        Ok(Self {
            labels,
            document_frequency,
            total_num_documents,
            weighting,
        })
    }

    /// Term to vocabulary index mapping
    pub fn labels(&self) -> &HashMap<String, u32> {
        &self.labels
    }

    /// Term to document frequency mapping
    pub fn document_frequency(&self) -> &HashMap<String, u32> {
        &self.document_frequency
    }

    /// Number of training documents
    pub fn total_num_documents(&self) -> u32 {
        self.total_num_documents
    }

    /// Weighting options
    pub fn weighting(&self) -> TfidfWeighting {
        self.weighting
    }
}

impl Transformer for TfidfTransformer {
    type Input = str;
    type Output = TfidfStruct;

    #[allow(clippy::cast_possible_truncation)]
    fn execute(&mut self, input: &str, callback: &mut dyn FnMut(TfidfStruct)) -> Result<()> {
        let mut weights = Vec::new();
        let mut norm = 0.0f64;

        for (term, count) in term_frequencies(input) {
            let Some(&dictionary_id) = self.labels.get(term) else {
                continue;
            };
            let df = self.document_frequency.get(term).copied().ok_or_else(|| {
                Error::InvalidOperation(format!("Term '{term}' has no document frequency"))
            })?;

            let weight = self.weighting.term_frequency(count)
                * self
                    .weighting
                    .inverse_document_frequency(self.total_num_documents, df);
            match self.weighting.norm {
                TfidfNorm::L1 => norm += weight.abs(),
                TfidfNorm::L2 => norm += weight * weight,
            }
            weights.push((dictionary_id, weight));
        }

        if self.weighting.norm == TfidfNorm::L2 {
            norm = norm.sqrt();
        }

        for (dictionary_id, weight) in weights {
            callback(TfidfStruct::new(dictionary_id, (weight / norm) as f32));
        }
        Ok(())
    }

    fn save(&self, archive: &mut Archive) -> Result<()> {
        archive.write_version(1, 0)?;
        self.labels.serialize(archive)?;
        self.document_frequency.serialize(archive)?;
        self.total_num_documents.serialize(archive)?;
        self.weighting.binary.serialize(archive)?;
        self.weighting.norm.as_str().to_string().serialize(archive)?;
        self.weighting.use_idf.serialize(archive)?;
        self.weighting.smooth_idf.serialize(archive)?;
        self.weighting.sublinear_tf.serialize(archive)
    }

    fn load(archive: &mut Archive) -> Result<Self> {
        archive.expect_version(1, 0)?;
        let labels = HashMap::<String, u32>::deserialize(archive)?;
        let document_frequency = HashMap::<String, u32>::deserialize(archive)?;
        let total_num_documents = u32::deserialize(archive)?;
        let binary = bool::deserialize(archive)?;
        let norm = String::deserialize(archive)?.parse::<TfidfNorm>()?;
        let weighting = TfidfWeighting {
            binary,
            norm,
            use_idf: bool::deserialize(archive)?,
            smooth_idf: bool::deserialize(archive)?,
            sublinear_tf: bool::deserialize(archive)?,
        };
        Self::new(labels, document_frequency, total_num_documents, weighting)
    }
}

/// Builds the transformer from the published document statistics
#[derive(Debug)]
pub struct TfidfVectorizerEstimatorImpl {
    weighting: TfidfWeighting,
}

impl TfidfVectorizerEstimatorImpl {
    /// Create the transformer-producing stage
    pub fn new(weighting: TfidfWeighting) -> Self {
        Self { weighting }
    }
}

impl EstimatorImpl for TfidfVectorizerEstimatorImpl {
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

impl TransformerFactory for TfidfVectorizerEstimatorImpl {
    type Transformer = TfidfTransformer;

    fn create_transformer(&self, context: &EstimatorContext) -> Result<Self::Transformer> {
        let statistics = context
            .annotation::<DocumentStatisticsAnnotation>(DOCUMENT_STATISTICS_ESTIMATOR_NAME)?;
        TfidfTransformer::new(
            statistics.labels(),
            statistics.document_frequencies(),
            statistics.total_num_documents,
            self.weighting,
        )
    }
}

/// TF-IDF estimator: document statistics followed by the factory
pub type TfidfVectorizerEstimator = PipelineEstimator<String, Estimator<TfidfVectorizerEstimatorImpl>>;

/// Create a TF-IDF estimator for `column_index`
pub fn tfidf_vectorizer_estimator(
    annotations: AnnotationMapsPtr,
    column_index: usize,
    config: TfidfVectorizerConfig,
) -> Result<TfidfVectorizerEstimator> {
    let statistics: PipelineStage<String> = Box::new(Estimator::new(
        DOCUMENT_STATISTICS_ESTIMATOR_NAME,
        annotations.clone(),
        column_index,
        DocumentStatisticsEstimator::new(config.statistics)?,
    )?);
    let transformer_stage = Estimator::new(
        TFIDF_VECTORIZER_ESTIMATOR_IMPL_NAME,
        annotations.clone(),
        column_index,
        TfidfVectorizerEstimatorImpl::new(config.weighting),
    )?;

    PipelineEstimator::new(
        TFIDF_VECTORIZER_ESTIMATOR_NAME,
        annotations,
        column_index,
        vec![statistics],
        transformer_stage,
    )
}

static_assertions::assert_not_impl_any!(TfidfTransformer: Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn map(entries: &[(&str, u32)]) -> HashMap<String, u32> {
        entries.iter().map(|(t, v)| ((*t).to_string(), *v)).collect()
    }

    fn transformer(weighting: TfidfWeighting) -> TfidfTransformer {
        TfidfTransformer::new(
            map(&[("a", 0), ("b", 1)]),
            map(&[("a", 1), ("b", 3)]),
            4,
            weighting,
        )
        .unwrap()
    }

    #[test]
    fn test_struct_equality_uses_epsilon() {
        assert_eq!(TfidfStruct::new(1, 0.5), TfidfStruct::new(1, 0.500_000_5));
        assert_ne!(TfidfStruct::new(1, 0.5), TfidfStruct::new(1, 0.5001));
        assert_ne!(TfidfStruct::new(1, 0.5), TfidfStruct::new(2, 0.5));
    }

    #[test]
    fn test_raw_weights_without_idf() {
        let weighting = TfidfWeighting {
            use_idf: false,
            norm: TfidfNorm::L1,
            ..TfidfWeighting::default()
        };
        let out = transformer(weighting).transform("b a b b").unwrap();
        assert_eq!(out, vec![TfidfStruct::new(0, 0.25), TfidfStruct::new(1, 0.75)]);
    }

    #[test_case(true, 1.0 + (5.0f64 / 2.0).ln(), 1.0 + (5.0f64 / 4.0).ln(); "smooth")]
    #[test_case(false, 1.0 + 5.0f64.ln(), 1.0 + (5.0f64 / 3.0).ln(); "unsmoothed")]
    #[allow(clippy::cast_possible_truncation)]
    fn test_idf(smooth_idf: bool, idf_a: f64, idf_b: f64) {
        let weighting = TfidfWeighting {
            smooth_idf,
            ..TfidfWeighting::default()
        };
        let out = transformer(weighting).transform("a b").unwrap();

        let norm = (idf_a * idf_a + idf_b * idf_b).sqrt();
        assert_eq!(
            out,
            vec![
                TfidfStruct::new(0, (idf_a / norm) as f32),
                TfidfStruct::new(1, (idf_b / norm) as f32),
            ]
        );
    }

    #[test]
    fn test_sublinear_and_binary_tf() {
        let weighting = TfidfWeighting {
            sublinear_tf: true,
            use_idf: false,
            ..TfidfWeighting::default()
        };
        assert!((weighting.term_frequency(1) - 1.0).abs() < 1e-12);
        assert!((weighting.term_frequency(3) - (1.0 + 3.0f64.ln())).abs() < 1e-12);

        let binary = TfidfWeighting {
            binary: true,
            ..weighting
        };
        assert!((binary.term_frequency(7) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_construction_invariants() {
        let weighting = TfidfWeighting::default();
        let err = TfidfTransformer::new(HashMap::new(), map(&[("a", 1)]), 1, weighting).unwrap_err();
        assert!(err.to_string().contains("Index map is empty!"));

        let err = TfidfTransformer::new(map(&[("a", 0)]), HashMap::new(), 1, weighting).unwrap_err();
        assert!(err.to_string().contains("DocumentFrequency map is empty!"));

        assert!(TfidfTransformer::new(map(&[("a", 0)]), map(&[("b", 1)]), 1, weighting).is_err());
    }

    #[test]
    fn test_norm_parsing() {
        assert_eq!("l1".parse::<TfidfNorm>().unwrap(), TfidfNorm::L1);
        assert!(matches!("l3".parse::<TfidfNorm>(), Err(Error::InvalidArgument(_))));
        assert!(TfidfVectorizerConfig::from_json(r#"{"norm": "max"}"#).is_err());
    }

    #[test]
    fn test_serialization() {
        let weighting = TfidfWeighting {
            norm: TfidfNorm::L1,
            sublinear_tf: true,
            ..TfidfWeighting::default()
        };
        let original = transformer(weighting);
        let bytes = original.to_bytes().unwrap();
        // version, labels, frequencies, documents, binary, "l1", three flags
        assert_eq!(bytes.len(), 4 + 2 * (4 + 2 * 9) + 4 + 1 + 6 + 3);
        assert_eq!(TfidfTransformer::from_bytes(bytes).unwrap(), original);
    }

    #[test]
    fn test_unknown_norm_in_archive() {
        let mut archive = Archive::new();
        archive.write_version(1, 0).unwrap();
        map(&[("a", 0)]).serialize(&mut archive).unwrap();
        map(&[("a", 1)]).serialize(&mut archive).unwrap();
        1u32.serialize(&mut archive).unwrap();
        false.serialize(&mut archive).unwrap();
        "max".to_string().serialize(&mut archive).unwrap();
        for flag in [true, true, false] {
            flag.serialize(&mut archive).unwrap();
        }
        let bytes = archive.commit().unwrap();
        assert!(matches!(
            TfidfTransformer::from_bytes(bytes),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_config_defaults() {
        let config = TfidfVectorizerConfig::from_json("{}").unwrap();
        assert_eq!(config.weighting, TfidfWeighting::default());
        assert_eq!(config.weighting.norm, TfidfNorm::L2);
        assert!(config.weighting.use_idf && config.weighting.smooth_idf);
        assert!((config.statistics.max_df - 1.0).abs() < f32::EPSILON);
    }
}

//! Document statistics shared by the vectorizers
//!
//! The first pass counts, for every token, how many documents contain it.
//! Terms whose document frequency falls outside `[min_df, max_df]` (as a
//! fraction of the documents) are dropped. When `max_features` limits the
//! vocabulary, a second pass counts the total occurrences of the surviving
//! terms and keeps the most frequent ones.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;

use featurizer_core::{Error, EstimatorContext, EstimatorImpl, FitResult, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::strings::{parse, StringDecorator, TOKEN_DELIMITER};

/// Name the statistics annotation is published under
pub const DOCUMENT_STATISTICS_ESTIMATOR_NAME: &str = "DocumentStatisticsEstimator";

/// Document frequency and vocabulary index of one term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermStatistics {
    /// Number of training documents containing the term
    pub document_frequency: u32,

    /// Index of the term in the vocabulary
    pub index: u32,
}

/// Vocabulary learned from the training documents
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentStatisticsAnnotation {
    /// Statistics of every retained term
    pub term_frequency_and_index: HashMap<String, TermStatistics>,

    /// Number of training documents
    pub total_num_documents: u32,
}

impl DocumentStatisticsAnnotation {
    /// Map from term to vocabulary index
    pub fn labels(&self) -> HashMap<String, u32> {
        self.term_frequency_and_index
            .iter()
            .map(|(term, stats)| (term.clone(), stats.index))
            .collect()
    }

    /// Map from term to document frequency
    pub fn document_frequencies(&self) -> HashMap<String, u32> {
        self.term_frequency_and_index
            .iter()
            .map(|(term, stats)| (term.clone(), stats.document_frequency))
            .collect()
    }
}

/// Vocabulary options shared by the vectorizers
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentStatisticsConfig {
    /// Drop terms present in a smaller fraction of documents
    pub min_df: f32,

    /// Drop terms present in a larger fraction of documents
    pub max_df: f32,

    /// Fixed term to index mapping; only these terms are counted
    pub vocabulary: Option<HashMap<String, u32>>,

    /// Keep only this many of the most frequent terms
    pub max_features: Option<u32>,

    /// Applied to documents before tokenizing them in training
    #[serde(skip)]
    pub decorator: Option<StringDecorator>,
}

impl Default for DocumentStatisticsConfig {
    fn default() -> Self {
        Self {
            min_df: 0.0,
            max_df: 1.0,
            vocabulary: None,
            max_features: None,
            decorator: None,
        }
    }
}

impl fmt::Debug for DocumentStatisticsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStatisticsConfig")
            .field("min_df", &self.min_df)
            .field("max_df", &self.max_df)
            .field("vocabulary", &self.vocabulary.as_ref().map(HashMap::len))
            .field("max_features", &self.max_features)
            .field("decorator", &self.decorator.is_some())
            .finish()
    }
}

impl DocumentStatisticsConfig {
    /// Check the frequency bounds and the vocabulary
    pub fn validate(&self) -> Result<()> {
        let in_unit = |value: f32| (0.0..=1.0).contains(&value);
        if !in_unit(self.min_df) || !in_unit(self.max_df) || self.min_df > self.max_df {
            return Err(Error::InvalidArgument(format!(
                "Document frequency bounds must satisfy 0 <= min_df <= max_df <= 1, got {} and {}",
                self.min_df, self.max_df
            )));
        }
        if self.vocabulary.as_ref().is_some_and(HashMap::is_empty) {
            return Err(Error::InvalidArgument("Vocabulary is empty".into()));
        }
        if self.max_features == Some(0) {
            return Err(Error::InvalidArgument("max_features must be positive".into()));
        }
        Ok(())
    }
}

/// Counting phase of the estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Counting document frequencies
    DocumentFrequency,
    /// Counting total occurrences of the terms that passed the df bounds
    Occurrences,
    /// Statistics are final
    Done,
}

/// Learns document frequencies and a vocabulary from string documents
pub struct DocumentStatisticsEstimator {
    config: DocumentStatisticsConfig,
    phase: Phase,
    document_frequency: HashMap<String, u32>,
    occurrences: HashMap<String, u64>,
    total_num_documents: u32,
}

impl DocumentStatisticsEstimator {
    /// Create an estimator, validating `config`
    pub fn new(config: DocumentStatisticsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            phase: Phase::DocumentFrequency,
            document_frequency: HashMap::new(),
            occurrences: HashMap::new(),
            total_num_documents: 0,
        })
    }

    fn decorate<'a>(&self, document: &'a str) -> Cow<'a, str> {
        match &self.config.decorator {
            Some(decorator) => Cow::Owned(decorator(document)),
            None => Cow::Borrowed(document),
        }
    }

    fn needs_ranking(&self) -> bool {
        self.config.max_features.is_some() && self.config.vocabulary.is_none()
    }

    fn count_document(&mut self, document: &str) {
        let decorated = self.decorate(document);
        let unique: HashSet<&str> = parse(&decorated, TOKEN_DELIMITER).collect();

        for token in unique {
            if let Some(vocabulary) = &self.config.vocabulary {
                if !vocabulary.contains_key(token) {
                    continue;
                }
            }
            match self.document_frequency.get_mut(token) {
                Some(count) => *count += 1,
                None => {
                    self.document_frequency.insert(token.to_string(), 1);
                }
            }
        }
        self.total_num_documents += 1;
    }

    fn count_occurrences(&mut self, document: &str) {
        let decorated = self.decorate(document);
        for token in parse(&decorated, TOKEN_DELIMITER) {
            if let Some(count) = self.occurrences.get_mut(token) {
                *count += 1;
            }
        }
    }

    /// Drop terms outside the document frequency bounds
    fn apply_df_bounds(&mut self) {
        if self.total_num_documents == 0 {
            return;
        }
        let total = f64::from(self.total_num_documents);
        let min_df = f64::from(self.config.min_df);
        let max_df = f64::from(self.config.max_df);
        let before = self.document_frequency.len();

        self.document_frequency.retain(|_, df| {
            let fraction = f64::from(*df) / total;
            fraction >= min_df && fraction <= max_df
        });
        debug!(
            before,
            after = self.document_frequency.len(),
            documents = self.total_num_documents,
            "document frequency bounds applied"
        );
    }

    /// Keep the `max_features` terms with the most occurrences
    fn apply_max_features(&mut self) {
        let Some(max_features) = self.config.max_features else {
            return;
        };

        let mut ranked: Vec<(String, u64)> = self.occurrences.drain().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(max_features as usize);

        let keep: HashSet<String> = ranked.into_iter().map(|(term, _)| term).collect();
        self.document_frequency.retain(|term, _| keep.contains(term));
    }

    fn build_annotation(&mut self) -> Result<DocumentStatisticsAnnotation> {
        if self.document_frequency.is_empty() {
            return Err(Error::Training(
                "Empty vocabulary after applying document frequency limits".into(),
            ));
        }

        let document_frequency = std::mem::take(&mut self.document_frequency);
        let term_frequency_and_index = match &self.config.vocabulary {
            Some(vocabulary) => document_frequency
                .into_iter()
                .filter_map(|(term, df)| {
                    let index = *vocabulary.get(&term)?;
                    Some((term, TermStatistics { document_frequency: df, index }))
                })
                .collect(),
            None => {
                let mut terms: Vec<(String, u32)> = document_frequency.into_iter().collect();
                terms.sort_by(|a, b| a.0.cmp(&b.0));
                terms
                    .into_iter()
                    .zip(0u32..)
                    .map(|((term, df), index)| {
                        (term, TermStatistics { document_frequency: df, index })
                    })
                    .collect()
            }
        };

        Ok(DocumentStatisticsAnnotation {
            term_frequency_and_index,
            total_num_documents: self.total_num_documents,
        })
    }
}

impl fmt::Debug for DocumentStatisticsEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStatisticsEstimator")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("terms", &self.document_frequency.len())
            .field("total_num_documents", &self.total_num_documents)
            .finish()
    }
}

impl EstimatorImpl for DocumentStatisticsEstimator {
    type Input = String;

    fn fit(&mut self, _context: &EstimatorContext, batch: &[String]) -> Result<FitResult> {
        match self.phase {
            Phase::DocumentFrequency => batch.iter().for_each(|doc| self.count_document(doc)),
            Phase::Occurrences => batch.iter().for_each(|doc| self.count_occurrences(doc)),
            Phase::Done => {}
        }
        Ok(FitResult::Continue)
    }

    fn on_data_completed(&mut self, context: &EstimatorContext) -> Result<FitResult> {
        match self.phase {
            Phase::DocumentFrequency => {
                self.apply_df_bounds();
                if self.needs_ranking() {
                    self.occurrences = self
                        .document_frequency
                        .keys()
                        .map(|term| (term.clone(), 0))
                        .collect();
                    self.phase = Phase::Occurrences;
                    debug!(
                        estimator = context.name(),
                        terms = self.occurrences.len(),
                        "counting occurrences for max_features"
                    );
                    return Ok(FitResult::Reset);
                }
            }
            Phase::Occurrences => self.apply_max_features(),
            Phase::Done => {}
        }
        self.phase = Phase::Done;
        Ok(FitResult::Complete)
    }

    fn complete_training(&mut self, context: &EstimatorContext) -> Result<()> {
        // Training may be cut short before the data was seen in full
        match self.phase {
            Phase::DocumentFrequency => self.apply_df_bounds(),
            Phase::Occurrences => self.apply_max_features(),
            Phase::Done => {}
        }
        self.phase = Phase::Done;

        let annotation = self.build_annotation()?;
        debug!(
            estimator = context.name(),
            terms = annotation.term_frequency_and_index.len(),
            documents = annotation.total_num_documents,
            "vocabulary built"
        );
        context.publish(annotation)
    }

    fn expected_passes(&self) -> Option<usize> {
        if self.needs_ranking() {
            Some(2)
        } else {
            Some(1)
        }
    }
}

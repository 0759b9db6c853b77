//! Text featurizers
//!
//! Documents are split on single spaces; callers wanting other tokenization
//! prepare documents with the helpers in this module or install a
//! [`StringDecorator`] on the vectorizer configuration.

mod count_vectorizer;
mod document_statistics;
mod strings;
mod tfidf_vectorizer;

pub use count_vectorizer::{
    count_vectorizer_estimator, CountVectorizerConfig, CountVectorizerEstimator,
    CountVectorizerEstimatorImpl, CountVectorizerTransformer, TfStruct,
    COUNT_VECTORIZER_ESTIMATOR_IMPL_NAME, COUNT_VECTORIZER_ESTIMATOR_NAME,
};
pub use document_statistics::{
    DocumentStatisticsAnnotation, DocumentStatisticsConfig, DocumentStatisticsEstimator,
    TermStatistics, DOCUMENT_STATISTICS_ESTIMATOR_NAME,
};
pub use strings::{
    parse, parse_ngram_word, parse_regex, term_frequencies, to_lower, to_upper, trim,
    trim_and_replace, trim_left, trim_right, StringDecorator, TOKEN_DELIMITER,
};
pub use tfidf_vectorizer::{
    tfidf_vectorizer_estimator, TfidfNorm, TfidfStruct, TfidfTransformer, TfidfVectorizerConfig,
    TfidfVectorizerEstimator, TfidfVectorizerEstimatorImpl, TfidfWeighting, TFIDF_EPSILON,
    TFIDF_VECTORIZER_ESTIMATOR_IMPL_NAME, TFIDF_VECTORIZER_ESTIMATOR_NAME,
};

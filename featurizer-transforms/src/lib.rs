//! Featurizers built on `featurizer-core`
//!
//! Each featurizer is an estimator that is trained over a column with
//! [`featurizer_core::train`] and then produces a transformer:
//!
//! - [`categorical`]: most-frequent-value imputation backed by a histogram
//! - [`numeric`]: per-row L1, L2 or max normalization
//! - [`text`]: count and TF-IDF vectorizers plus string helpers
//!
//! Every family sits behind a cargo feature of the same name; all are
//! enabled by default.

#![warn(missing_docs)]

#[cfg(feature = "categorical")]
pub mod categorical;
#[cfg(feature = "numeric")]
pub mod numeric;
#[cfg(feature = "text")]
pub mod text;

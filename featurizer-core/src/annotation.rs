//! Column-scoped annotation maps shared by the estimators of one pipeline
//!
//! When an estimator finishes training it may publish an annotation: an
//! immutable fit result keyed by `(column index, estimator name)`. Later
//! estimators working on the same column read it to build their
//! transformers. Each key can be written once.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Data that can be published as an annotation
pub trait Annotation: Any + Send + Sync + fmt::Debug {}

impl<T: Any + Send + Sync + fmt::Debug> Annotation for T {}

/// Annotations published for one column, keyed by estimator name
type ColumnAnnotations = HashMap<String, Arc<dyn Any + Send + Sync>>;

/// Shared handle to the annotation maps of one pipeline run
pub type AnnotationMapsPtr = Arc<AnnotationMaps>;

/// Annotations for every column of one pipeline run
pub struct AnnotationMaps {
    /// Identifier used to correlate log output of one run
    run_id: Uuid,

    /// One map per column
    columns: RwLock<Vec<ColumnAnnotations>>,
}

impl AnnotationMaps {
    /// Create annotation maps for `num_columns` columns
    pub fn new(num_columns: usize) -> AnnotationMapsPtr {
        Arc::new(Self {
            run_id: Uuid::new_v4(),
            columns: RwLock::new(vec![ColumnAnnotations::new(); num_columns]),
        })
    }

    /// Identifier of this pipeline run
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Number of columns tracked
    pub fn num_columns(&self) -> Result<usize> {
        self.columns
            .read()
            .map(|columns| columns.len())
            .map_err(|_| poisoned())
    }

    /// Fail unless `column` is tracked by this map
    pub fn check_column(&self, column: usize) -> Result<()> {
        let num_columns = self.num_columns()?;
        if column >= num_columns {
            return Err(Error::ColumnOutOfRange {
                column,
                num_columns,
            });
        }
        Ok(())
    }

    /// Publish an annotation for `(column, name)`
    ///
    /// Publishing twice for the same key is an error.
    pub fn insert<A: Annotation>(&self, column: usize, name: &str, data: A) -> Result<()> {
        let mut columns = self.columns.write().map_err(|_| poisoned())?;
        let num_columns = columns.len();
        let annotations = columns.get_mut(column).ok_or(Error::ColumnOutOfRange {
            column,
            num_columns,
        })?;

        if annotations.contains_key(name) {
            return Err(Error::DuplicateAnnotation {
                column,
                name: name.to_string(),
            });
        }

        annotations.insert(name.to_string(), Arc::new(data));
        info!(run_id = %self.run_id, column, estimator = name, "annotation published");
        Ok(())
    }

    /// Read the annotation published for `(column, name)`
    pub fn get<A: Annotation>(&self, column: usize, name: &str) -> Result<Arc<A>> {
        let columns = self.columns.read().map_err(|_| poisoned())?;
        let annotations = columns.get(column).ok_or(Error::ColumnOutOfRange {
            column,
            num_columns: columns.len(),
        })?;

        let data = annotations
            .get(name)
            .cloned()
            .ok_or_else(|| Error::MissingAnnotation {
                column,
                name: name.to_string(),
            })?;

        data.downcast::<A>().map_err(|_| Error::AnnotationType {
            column,
            name: name.to_string(),
        })
    }

    /// Check if an annotation was published for `(column, name)`
    pub fn contains(&self, column: usize, name: &str) -> bool {
        self.columns
            .read()
            .ok()
            .and_then(|columns| columns.get(column).map(|a| a.contains_key(name)))
            .unwrap_or(false)
    }

    /// Names of the estimators that published on `column`, sorted
    pub fn names(&self, column: usize) -> Result<Vec<String>> {
        let columns = self.columns.read().map_err(|_| poisoned())?;
        let annotations = columns.get(column).ok_or(Error::ColumnOutOfRange {
            column,
            num_columns: columns.len(),
        })?;

        let mut names: Vec<String> = annotations.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl fmt::Debug for AnnotationMaps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationMaps")
            .field("run_id", &self.run_id)
            .field("num_columns", &self.num_columns().ok())
            .finish_non_exhaustive()
    }
}

fn poisoned() -> Error {
    Error::InvalidOperation("Annotation map lock poisoned".into())
}

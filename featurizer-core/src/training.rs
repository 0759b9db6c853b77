//! Driver feeding batches of training data through an estimator
//!
//! The driver owns the replay loop: it feeds every batch in order, signals
//! the end of the data, and starts again from the first batch whenever the
//! estimator answers [`FitResult::Reset`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::estimator::{FitResult, Trainable, TrainingState};

/// Configuration of the training driver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Maximum number of passes over the data before training is aborted
    pub max_passes: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self { max_passes: 16 }
    }
}

/// Train `estimator` to completion over `batches`
///
/// Batches are replayed from the start as often as the estimator asks, up to
/// `config.max_passes` passes. Training data can be borrowed in any form that
/// views as a slice, such as `Vec<T>` or `&[T]`.
pub fn train<E, B>(estimator: &mut E, batches: &[B], config: &TrainingConfig) -> Result<()>
where
    E: Trainable + ?Sized,
    B: AsRef<[E::Input]>,
{
    if config.max_passes == 0 {
        return Err(Error::InvalidArgument(
            "TrainingConfig::max_passes must be at least 1".into(),
        ));
    }

    estimator.begin_training()?;

    let mut pass = 1;
    while estimator.state() == TrainingState::Training {
        debug!(estimator = estimator.name(), pass, batches = batches.len(), "training pass");

        let mut result = FitResult::Continue;
        for batch in batches {
            result = estimator.fit(batch.as_ref())?;
            if result != FitResult::Continue {
                break;
            }
        }

        if result == FitResult::Continue {
            result = estimator.on_data_completed()?;
        }

        if result == FitResult::Reset {
            pass += 1;
            if pass > config.max_passes {
                return Err(Error::PassLimitExceeded {
                    estimator: estimator.name().to_string(),
                    passes: config.max_passes,
                });
            }
        }
    }

    estimator.complete_training()?;
    info!(
        estimator = estimator.name(),
        column = estimator.column_index(),
        passes = estimator.passes(),
        "estimator trained"
    );
    Ok(())
}

//! Training module for forest CRF models
//!
//! This module contains the gradient estimator, the SGD hyperparameters,
//! the trainer and model serialization.

mod gradient;
pub(crate) mod model_writer;
mod sgd;
mod trainer;

// Re-export public types
pub use self::gradient::{
    expected_counts_into, expected_feature_vector, gradient, FeatureVector,
};
pub use self::model_writer::ModelWriter;
pub use self::sgd::SgdParams;
pub use self::trainer::{BatchReport, CrfTrainer, TrainReport};

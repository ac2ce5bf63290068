//! Model training over assembled feature tables

pub mod metrics;
pub mod model;
pub mod runs;

pub use metrics::{RegressionMetrics, explained_variance, mean_squared_error};
pub use model::{MeanBaseline, MeanModel, ModelTrainer, Regressor};
pub use runs::{TrainingReport, cross_validate, evaluate, full_train, train_on_folds};

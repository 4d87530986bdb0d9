//! Scoring of model predictions: metrics, error analysis, the batched evaluation
//! driver and bootstrap confidence estimates.

pub mod analysis;
pub mod bootstrap;
pub mod evaluator;
pub mod metrics;

pub use analysis::{analyze_predictions, PredictionRecord};
pub use bootstrap::{
    bootstrap_evaluation, bootstrap_sample, bootstrap_with_config, BootstrapConfig,
    BootstrapStats, SummaryStats,
};
pub use evaluator::{Evaluation, Evaluator};
pub use metrics::{
    compute_metrics, confusion_counts, matthews_corrcoef, per_class_scores, AveragedScores,
    ClassScores, MetricResult,
};

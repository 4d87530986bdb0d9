//! Evaluation and fine-tuning harness for transformer sentence classifiers.
//!
//! The crate scores a classifier on a labeled corpus: it prepares and encodes the
//! data, runs batched inference through any [`BatchInference`] implementation,
//! computes accuracy, MCC, macro and weighted precision/recall/F1 plus a
//! row-normalized confusion matrix, separates right from wrong predictions and
//! estimates the spread of every metric with bootstrap resampling.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), finetune_eval::EvalError> {
//! use finetune_eval::{bootstrap_with_config, BootstrapConfig, Dataset, EvalError, Evaluator, Example};
//! use ndarray::{Array2, ArrayView2};
//!
//! // Predicts class 1 for odd token ids and class 0 otherwise
//! let model = |ids: ArrayView2<'_, i64>, _mask: ArrayView2<'_, i64>| -> Result<Array2<f32>, EvalError> {
//!     Ok(Array2::from_shape_fn((ids.nrows(), 2), |(row, col)| {
//!         if (ids[[row, 1]] % 2) as usize == col { 1.0 } else { 0.0 }
//!     }))
//! };
//!
//! let dataset = Dataset::new(
//!     (0..8)
//!         .map(|t| Example {
//!             input_ids: vec![101, t, 102],
//!             attention_mask: vec![1, 1, 1],
//!             class_id: (t % 2) as usize,
//!             sentence: format!("sentence {}", t),
//!         })
//!         .collect(),
//! );
//!
//! let evaluator = Evaluator::new(&model, vec!["neg".into(), "pos".into()], 4)?;
//! let evaluation = evaluator.evaluate(&dataset)?;
//! assert_eq!(evaluation.metrics.accuracy, 1.0);
//! assert!(evaluation.wrong.is_empty());
//!
//! let stats = bootstrap_with_config(&evaluator, &dataset, &BootstrapConfig::default())?;
//! assert_eq!(stats.accuracy.std, 0.0);
//! # Ok(())
//! # }
//! ```
//!
//! # ONNX models
//!
//! [`OnnxSequenceClassifier`] loads an exported sequence-classification graph and
//! [`ModelStore`] fetches one, together with its tokenizer, from a model hub.
//!
//! # Fine-tuning
//!
//! ONNX sessions only run inference, so the `finetune-eval` binary evaluates and
//! never trains. To fine-tune, implement [`TrainableModel`] for a network that can
//! update its own weights and hand it to [`Trainer::fit`] together with the
//! train and validation partitions from [`split_dataset`]. Validation runs
//! through the same [`Evaluator`] the binary uses.

pub mod data;
pub mod error;
pub mod eval;
pub mod inference;
pub mod model_store;
pub mod report;
mod runtime;
pub mod train;
mod utils;

pub use data::{
    balance_classes, drop_duplicates, filter_classes, load_labeled_csv, split_dataset,
    BalanceOptions, ClassLabelMapping, Dataset, DatasetSplits, Example, LabeledSentence,
    SentenceEncoder, MAX_SEQUENCE_LENGTH,
};
pub use error::EvalError;
pub use eval::{
    analyze_predictions, bootstrap_evaluation, bootstrap_sample, bootstrap_with_config,
    compute_metrics, AveragedScores, BootstrapConfig, BootstrapStats, Evaluation, Evaluator,
    MetricResult, PredictionRecord, SummaryStats,
};
pub use inference::{BatchInference, OnnxSequenceClassifier};
pub use model_store::{ModelError, ModelFiles, ModelSpec, ModelStore};
pub use runtime::{create_session_builder, OptimizationLevel, RuntimeConfig};
pub use train::{LinearWarmupSchedule, Trainer, TrainableModel, TrainingConfig, TrainingHistory};
pub use utils::format_duration;

pub fn init_logger() {
    env_logger::init();
}

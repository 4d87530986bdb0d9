use std::time::{Duration, Instant};

use log::info;
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::schedule::LinearWarmupSchedule;
use crate::data::{stack_batch, Dataset};
use crate::error::EvalError;
use crate::eval::{Evaluator, MetricResult};
use crate::inference::BatchInference;
use crate::utils::format_duration;

/// A shuffled training batch, stacked for the model.
#[derive(Debug, Clone)]
pub struct TrainingBatch {
    pub input_ids: Array2<i64>,
    pub attention_mask: Array2<i64>,
    pub labels: Array1<i64>,
}

/// Optimizer settings for a single update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerStep {
    pub learning_rate: f64,
    /// Gradients are clipped to this global norm before the update
    pub max_grad_norm: f64,
}

/// A model that can be fine-tuned in place.
///
/// `train_step` runs the forward and backward pass on `batch`, clips gradients,
/// applies one optimizer update at the given learning rate and returns the batch
/// loss. Scoring through [`BatchInference`] must not update any state.
pub trait TrainableModel: BatchInference {
    fn train_step(&mut self, batch: &TrainingBatch, step: &OptimizerStep) -> Result<f32, EvalError>;
}

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub num_epochs: usize,
    pub batch_size: usize,
    /// Peak learning rate reached after warmup
    pub learning_rate: f64,
    pub warmup_steps: usize,
    pub max_grad_norm: f64,
    /// Log the average loss every this many batches; 0 disables it
    pub logging_steps: usize,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            num_epochs: 6,
            batch_size: 32,
            learning_rate: 5e-5,
            warmup_steps: 0,
            max_grad_norm: 1.0,
            logging_steps: 10,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), EvalError> {
        if self.num_epochs == 0 {
            return Err(EvalError::Config("Number of epochs must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(EvalError::Config("Batch size must be at least 1".into()));
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return Err(EvalError::Config(format!(
                "Learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    /// 1-based
    pub epoch: usize,
    pub average_loss: f64,
    pub elapsed: Duration,
    pub validation: Option<MetricResult>,
}

/// Everything the training loop measured, returned instead of kept in globals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochSummary>,
    /// (global step, average loss over the preceding `logging_steps` batches)
    pub logged_losses: Vec<(usize, f64)>,
    pub global_step: usize,
}

/// Supervised fine-tuning loop with a linear-warmup schedule.
#[derive(Debug)]
pub struct Trainer {
    config: TrainingConfig,
    classes: Vec<String>,
}

impl Trainer {
    pub fn new(config: TrainingConfig, classes: Vec<String>) -> Result<Self, EvalError> {
        config.validate()?;
        Ok(Self { config, classes })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Trains `model` on `train` for the configured number of epochs.
    ///
    /// Batches are reshuffled every epoch from a generator seeded once per call, so
    /// runs are reproducible. When `validation` is given the model is evaluated on
    /// it after every epoch.
    ///
    /// # Errors
    /// - `Config` if the training set is empty
    /// - Any error raised by the model or the validation pass, which aborts training
    pub fn fit<M: TrainableModel>(
        &self,
        model: &mut M,
        train: &Dataset,
        validation: Option<&Dataset>,
    ) -> Result<TrainingHistory, EvalError> {
        if train.is_empty() {
            return Err(EvalError::Config("Training set is empty".into()));
        }
        let cfg = &self.config;
        let batches_per_epoch = train.len().div_ceil(cfg.batch_size);
        let schedule = LinearWarmupSchedule::new(
            cfg.learning_rate,
            cfg.warmup_steps,
            batches_per_epoch * cfg.num_epochs,
        );
        info!(
            "Training on {} samples: {} epochs x {} batches",
            train.len(),
            cfg.num_epochs,
            batches_per_epoch
        );

        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
        let mut history = TrainingHistory::default();
        let mut tr_loss = 0.0_f64;
        let mut logging_loss = 0.0_f64;
        let started = Instant::now();

        for epoch in 1..=cfg.num_epochs {
            info!("======== Epoch {} / {} ========", epoch, cfg.num_epochs);
            let epoch_start = Instant::now();
            let mut epoch_loss = 0.0_f64;

            let mut order: Vec<usize> = (0..train.len()).collect();
            order.shuffle(&mut rng);

            for (step, indices) in order.chunks(cfg.batch_size).enumerate() {
                let batch = make_batch(train, indices);
                let update = OptimizerStep {
                    learning_rate: schedule.learning_rate(history.global_step),
                    max_grad_norm: cfg.max_grad_norm,
                };
                let loss = f64::from(model.train_step(&batch, &update)?);
                epoch_loss += loss;
                tr_loss += loss;
                history.global_step += 1;

                if cfg.logging_steps > 0 && step != 0 && step % cfg.logging_steps == 0 {
                    let window_loss = (tr_loss - logging_loss) / cfg.logging_steps as f64;
                    logging_loss = tr_loss;
                    history.logged_losses.push((history.global_step, window_loss));
                    info!(
                        "  Batch {:>5} of {:>5}.    Elapsed: {}.    Training loss: {:.2}",
                        step,
                        batches_per_epoch,
                        format_duration(epoch_start.elapsed()),
                        window_loss
                    );
                }
            }

            let elapsed = epoch_start.elapsed();
            let average_loss = epoch_loss / batches_per_epoch as f64;
            info!("  Average training loss: {:.4}", average_loss);
            info!("  Training epoch took: {}", format_duration(elapsed));

            let validation = match validation {
                Some(dataset) => {
                    info!("Running validation on val set...");
                    let evaluator = Evaluator::new(&*model, self.classes.clone(), cfg.batch_size)?;
                    let metrics = evaluator.evaluate(dataset)?.metrics;
                    log_metrics(&metrics);
                    Some(metrics)
                }
                None => None,
            };

            history.epochs.push(EpochSummary {
                epoch,
                average_loss,
                elapsed,
                validation,
            });
        }

        info!("Training complete! Took: {}", format_duration(started.elapsed()));
        Ok(history)
    }
}

fn make_batch(dataset: &Dataset, indices: &[usize]) -> TrainingBatch {
    let examples = dataset.select(indices);
    let (input_ids, attention_mask) = stack_batch(examples.examples());
    let labels = examples.iter().map(|e| e.class_id as i64).collect();
    TrainingBatch {
        input_ids,
        attention_mask,
        labels,
    }
}

/// Logs a metric result the way validation and test passes report it.
pub fn log_metrics(metrics: &MetricResult) {
    info!("  * Accuracy: {:.6}", metrics.accuracy);
    info!("  * MCC: {:.6}", metrics.mcc);
    info!("  Macro Average");
    info!("  * Recall: {:.6}", metrics.macro_average.recall);
    info!("  * Precision: {:.6}", metrics.macro_average.precision);
    info!("  * F1 score: {:.6}", metrics.macro_average.f1);
    info!("  Weighted Average");
    info!("  * Recall: {:.6}", metrics.weighted_average.recall);
    info!("  * Precision: {:.6}", metrics.weighted_average.precision);
    info!("  * F1 score: {:.6}", metrics.weighted_average.f1);
}

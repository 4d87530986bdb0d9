//! Fine-tuning loop for models that can update their own weights.

pub mod schedule;
pub mod trainer;

pub use schedule::LinearWarmupSchedule;
pub use trainer::{
    log_metrics, EpochSummary, OptimizerStep, Trainer, TrainableModel, TrainingBatch,
    TrainingConfig, TrainingHistory,
};

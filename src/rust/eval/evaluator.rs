use log::debug;
use serde::Serialize;

use super::analysis::{analyze_predictions, PredictionRecord};
use super::metrics::{compute_metrics, MetricResult};
use crate::data::{stack_batch, Dataset};
use crate::error::EvalError;
use crate::inference::BatchInference;
use crate::utils::argmax_rows;

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub metrics: MetricResult,
    pub wrong: Vec<PredictionRecord>,
    pub right: Vec<PredictionRecord>,
}

/// Runs a dataset through a model in fixed-size, order-preserving batches and
/// scores the predictions.
///
/// The evaluator never shuffles: prediction `i` always belongs to example `i`,
/// which keeps bootstrap resamples and error analysis aligned.
///
/// # Example
/// ```
/// use finetune_eval::{Dataset, EvalError, Evaluator, Example};
/// use ndarray::{Array2, ArrayView2};
///
/// # fn main() -> Result<(), EvalError> {
/// // Always predicts class 1
/// let model = |ids: ArrayView2<'_, i64>, _mask: ArrayView2<'_, i64>| -> Result<Array2<f32>, EvalError> {
///     Ok(Array2::from_shape_fn((ids.nrows(), 2), |(_, col)| col as f32))
/// };
/// let dataset = Dataset::new(vec![Example {
///     input_ids: vec![101, 102],
///     attention_mask: vec![1, 1],
///     class_id: 1,
///     sentence: "hello".into(),
/// }]);
/// let evaluator = Evaluator::new(&model, vec!["A".into(), "B".into()], 32)?;
/// let evaluation = evaluator.evaluate(&dataset)?;
/// assert_eq!(evaluation.metrics.accuracy, 1.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Evaluator<'m, M: ?Sized> {
    model: &'m M,
    classes: Vec<String>,
    batch_size: usize,
}

impl<'m, M: BatchInference + ?Sized> Evaluator<'m, M> {
    /// # Errors
    /// - `Config` if `batch_size` is 0 or `classes` is empty
    pub fn new(model: &'m M, classes: Vec<String>, batch_size: usize) -> Result<Self, EvalError> {
        if batch_size == 0 {
            return Err(EvalError::Config("Batch size must be at least 1".into()));
        }
        if classes.is_empty() {
            return Err(EvalError::Config("At least one class is required".into()));
        }
        Ok(Self {
            model,
            classes,
            batch_size,
        })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Predicted class id of every example, in dataset order.
    ///
    /// # Errors
    /// - Any error raised by the model, unchanged
    /// - `InputShape` if the model returns a score matrix that does not match the batch
    pub fn predict(&self, dataset: &Dataset) -> Result<Vec<usize>, EvalError> {
        let num_classes = self.classes.len();
        let mut predictions = Vec::with_capacity(dataset.len());
        for (step, batch) in dataset.examples().chunks(self.batch_size).enumerate() {
            let (input_ids, attention_mask) = stack_batch(batch);
            let scores = self.model.infer(input_ids.view(), attention_mask.view())?;

            if scores.nrows() != batch.len() || scores.ncols() != num_classes {
                return Err(EvalError::InputShape(format!(
                    "Model returned scores of shape {:?} for a batch of {} examples and {} classes",
                    scores.shape(),
                    batch.len(),
                    num_classes
                )));
            }
            predictions.extend(argmax_rows(scores.view()));
            debug!("Evaluated batch {} ({} examples)", step + 1, batch.len());
        }
        Ok(predictions)
    }

    /// Evaluates the model on `dataset`.
    ///
    /// # Errors
    /// - Everything [`Evaluator::predict`] and [`compute_metrics`] can fail with
    pub fn evaluate(&self, dataset: &Dataset) -> Result<Evaluation, EvalError> {
        let predictions = self.predict(dataset)?;
        let labels = dataset.labels();

        let metrics = compute_metrics(&predictions, &labels, &self.classes)?;
        let (wrong, right) = analyze_predictions(&predictions, &labels, &dataset.sentences())?;
        Ok(Evaluation {
            metrics,
            wrong,
            right,
        })
    }
}

use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::evaluator::Evaluator;
use super::metrics::MetricResult;
use crate::data::Dataset;
use crate::error::EvalError;
use crate::inference::BatchInference;

/// Settings for a bootstrap run.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Number of resamples
    pub iterations: usize,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            seed: 42,
        }
    }
}

/// Mean, population standard deviation and population variance of one metric.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryStats {
    pub mean: f64,
    pub std: f64,
    pub var: f64,
}

/// Distribution of every scalar metric over the bootstrap resamples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapStats {
    pub iterations: usize,
    pub macro_precision: SummaryStats,
    pub macro_recall: SummaryStats,
    pub macro_f1: SummaryStats,
    pub weighted_precision: SummaryStats,
    pub weighted_recall: SummaryStats,
    pub weighted_f1: SummaryStats,
    pub mcc: SummaryStats,
    pub accuracy: SummaryStats,
}

/// Welford accumulator; population statistics.
#[derive(Debug, Clone, Copy, Default)]
struct RunningStats {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn finish(&self) -> SummaryStats {
        if self.count == 0 {
            return SummaryStats::default();
        }
        let var = (self.m2 / self.count as f64).max(0.0);
        SummaryStats {
            mean: self.mean,
            std: var.sqrt(),
            var,
        }
    }
}

#[derive(Debug, Default)]
struct MetricAccumulators {
    macro_precision: RunningStats,
    macro_recall: RunningStats,
    macro_f1: RunningStats,
    weighted_precision: RunningStats,
    weighted_recall: RunningStats,
    weighted_f1: RunningStats,
    mcc: RunningStats,
    accuracy: RunningStats,
}

impl MetricAccumulators {
    fn fold(&mut self, result: &MetricResult) {
        self.macro_precision.push(result.macro_average.precision);
        self.macro_recall.push(result.macro_average.recall);
        self.macro_f1.push(result.macro_average.f1);
        self.weighted_precision.push(result.weighted_average.precision);
        self.weighted_recall.push(result.weighted_average.recall);
        self.weighted_f1.push(result.weighted_average.f1);
        self.mcc.push(result.mcc);
        self.accuracy.push(result.accuracy);
    }

    fn finish(&self, iterations: usize) -> BootstrapStats {
        BootstrapStats {
            iterations,
            macro_precision: self.macro_precision.finish(),
            macro_recall: self.macro_recall.finish(),
            macro_f1: self.macro_f1.finish(),
            weighted_precision: self.weighted_precision.finish(),
            weighted_recall: self.weighted_recall.finish(),
            weighted_f1: self.weighted_f1.finish(),
            mcc: self.mcc.finish(),
            accuracy: self.accuracy.finish(),
        }
    }
}

/// Draws `dataset.len()` examples uniformly with replacement.
///
/// # Errors
/// - `InputShape` if the dataset is empty
pub fn bootstrap_sample<R: Rng + ?Sized>(dataset: &Dataset, rng: &mut R) -> Result<Dataset, EvalError> {
    if dataset.is_empty() {
        return Err(EvalError::InputShape("Cannot resample an empty dataset".into()));
    }
    let n = dataset.len();
    let indices: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
    Ok(dataset.select(&indices))
}

/// Estimates the sampling distribution of every scalar metric by evaluating
/// `iterations` resamples of `dataset`.
///
/// Each resample has the size of `dataset` and is drawn independently. The
/// confusion matrix is not aggregated.
///
/// # Errors
/// - `Config` if `iterations` is 0
/// - `InputShape` if the dataset is empty
/// - Any error from the evaluation of a resample, which aborts the run
pub fn bootstrap_evaluation<M, R>(
    evaluator: &Evaluator<'_, M>,
    dataset: &Dataset,
    iterations: usize,
    rng: &mut R,
) -> Result<BootstrapStats, EvalError>
where
    M: BatchInference + ?Sized,
    R: Rng + ?Sized,
{
    if iterations == 0 {
        return Err(EvalError::Config("Bootstrap needs at least one iteration".into()));
    }

    let mut accumulators = MetricAccumulators::default();
    for i in 0..iterations {
        let sample = bootstrap_sample(dataset, rng)?;
        let evaluation = evaluator.evaluate(&sample)?;
        accumulators.fold(&evaluation.metrics);
        debug!(
            "Bootstrap iteration {}/{}: accuracy={:.6}",
            i + 1,
            iterations,
            evaluation.metrics.accuracy
        );
    }

    let stats = accumulators.finish(iterations);
    info!(
        "Bootstrap over {} resamples: accuracy {:.6} ± {:.6}, macro F1 {:.6} ± {:.6}",
        iterations, stats.accuracy.mean, stats.accuracy.std, stats.macro_f1.mean, stats.macro_f1.std
    );
    Ok(stats)
}

/// Runs [`bootstrap_evaluation`] with a ChaCha8 generator seeded from `config`.
pub fn bootstrap_with_config<M>(
    evaluator: &Evaluator<'_, M>,
    dataset: &Dataset,
    config: &BootstrapConfig,
) -> Result<BootstrapStats, EvalError>
where
    M: BatchInference + ?Sized,
{
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    bootstrap_evaluation(evaluator, dataset, config.iterations, &mut rng)
}

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_same_len, EvalError};

/// Precision, recall and F1 averaged over classes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AveragedScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Scores of one evaluation pass.
///
/// `confusion_matrix[t][p]` is the fraction of examples of true class `t` that were
/// predicted as `p`; rows of classes absent from the ground truth are all zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub accuracy: f64,
    pub mcc: f64,
    pub macro_average: AveragedScores,
    pub weighted_average: AveragedScores,
    pub confusion_matrix: Vec<Vec<f64>>,
}

/// Per-class precision/recall/F1 and support.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: u64,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Raw confusion counts, `counts[[true, predicted]]`.
///
/// # Errors
/// - `InputShape` if the sequences differ in length
/// - `LabelRange` if a label is not below `num_classes`
pub fn confusion_counts(
    predicted: &[usize],
    truth: &[usize],
    num_classes: usize,
) -> Result<Array2<u64>, EvalError> {
    ensure_same_len("predictions/labels", predicted.len(), truth.len())?;
    let mut counts = Array2::<u64>::zeros((num_classes, num_classes));
    for (&p, &t) in predicted.iter().zip(truth) {
        for label in [p, t] {
            if label >= num_classes {
                return Err(EvalError::LabelRange { label, num_classes });
            }
        }
        counts[[t, p]] += 1;
    }
    Ok(counts)
}

/// Precision, recall and F1 of every class from a confusion-count matrix.
///
/// A class that is never predicted has precision 0; one that never occurs has
/// recall 0; F1 is 0 when precision and recall are both 0.
pub fn per_class_scores(counts: &Array2<u64>) -> Vec<ClassScores> {
    let num_classes = counts.nrows();
    (0..num_classes)
        .map(|k| {
            let tp = counts[[k, k]] as f64;
            let support = counts.row(k).sum();
            let predicted = counts.column(k).sum();
            let precision = ratio(tp, predicted as f64);
            let recall = ratio(tp, support as f64);
            ClassScores {
                precision,
                recall,
                f1: ratio(2.0 * precision * recall, precision + recall),
                support,
            }
        })
        .collect()
}

/// Multiclass Matthews correlation coefficient (Gorodkin's R_K).
///
/// Returns 0 when either marginal distribution is degenerate.
pub fn matthews_corrcoef(counts: &Array2<u64>) -> f64 {
    let total = counts.sum() as f64;
    let correct = counts.diag().sum() as f64;
    let true_totals = counts.sum_axis(ndarray::Axis(1)).mapv(|v| v as f64);
    let pred_totals = counts.sum_axis(ndarray::Axis(0)).mapv(|v| v as f64);

    let cov_ytyp = correct * total - true_totals.dot(&pred_totals);
    let cov_ypyp = total * total - pred_totals.dot(&pred_totals);
    let cov_ytyt = total * total - true_totals.dot(&true_totals);

    let denom = (cov_ytyt * cov_ypyp).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        cov_ytyp / denom
    }
}

/// Row-normalizes confusion counts; rows with no examples stay at zero.
pub fn normalize_rows(counts: &Array2<u64>) -> Vec<Vec<f64>> {
    counts
        .rows()
        .into_iter()
        .map(|row| {
            let support = row.sum() as f64;
            row.iter().map(|&c| ratio(c as f64, support)).collect()
        })
        .collect()
}

/// Computes the full set of classification scores.
///
/// `classes` fixes the number of classes and the axis order of the confusion
/// matrix. Macro averages run over the classes that occur in `truth`; weighted
/// averages weight each class by its support in `truth`.
///
/// # Errors
/// - `InputShape` if the sequences differ in length or are empty
/// - `LabelRange` if a label is outside `[0, classes.len())`
///
/// # Example
/// ```
/// use finetune_eval::compute_metrics;
///
/// let classes = vec!["A".to_string(), "B".to_string()];
/// let result = compute_metrics(&[0, 1, 1, 0], &[0, 1, 0, 0], &classes).unwrap();
/// assert_eq!(result.accuracy, 0.75);
/// assert_eq!(result.confusion_matrix[1], vec![0.0, 1.0]);
/// ```
pub fn compute_metrics<S: AsRef<str>>(
    predicted: &[usize],
    truth: &[usize],
    classes: &[S],
) -> Result<MetricResult, EvalError> {
    if truth.is_empty() {
        return Err(EvalError::InputShape(
            "Cannot compute metrics on an empty label set".into(),
        ));
    }
    let counts = confusion_counts(predicted, truth, classes.len())?;
    let total = truth.len() as f64;

    let scores = per_class_scores(&counts);
    let present: Vec<&ClassScores> = scores.iter().filter(|s| s.support > 0).collect();
    let n_present = present.len() as f64;

    let macro_average = AveragedScores {
        precision: present.iter().map(|s| s.precision).sum::<f64>() / n_present,
        recall: present.iter().map(|s| s.recall).sum::<f64>() / n_present,
        f1: present.iter().map(|s| s.f1).sum::<f64>() / n_present,
    };
    let weighted = |metric: fn(&ClassScores) -> f64| {
        present
            .iter()
            .map(|s| metric(s) * s.support as f64)
            .sum::<f64>()
            / total
    };
    let weighted_average = AveragedScores {
        precision: weighted(|s| s.precision),
        recall: weighted(|s| s.recall),
        f1: weighted(|s| s.f1),
    };

    Ok(MetricResult {
        accuracy: counts.diag().sum() as f64 / total,
        mcc: matthews_corrcoef(&counts),
        macro_average,
        weighted_average,
        confusion_matrix: normalize_rows(&counts),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn classes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("class_{}", i)).collect()
    }

    #[test]
    fn test_two_class_scenario() -> Result<(), EvalError> {
        let result = compute_metrics(&[0, 1, 1, 0], &[0, 1, 0, 0], &["A", "B"])?;
        assert!((result.accuracy - 0.75).abs() < EPS);

        assert!((result.confusion_matrix[0][0] - 2.0 / 3.0).abs() < EPS);
        assert!((result.confusion_matrix[0][1] - 1.0 / 3.0).abs() < EPS);
        assert_eq!(result.confusion_matrix[1], vec![0.0, 1.0]);

        // A: P=1, R=2/3, F1=0.8; B: P=0.5, R=1, F1=2/3
        assert!((result.macro_average.precision - 0.75).abs() < EPS);
        assert!((result.macro_average.recall - 5.0 / 6.0).abs() < EPS);
        assert!((result.macro_average.f1 - (0.8 + 2.0 / 3.0) / 2.0).abs() < EPS);
        assert!((result.weighted_average.precision - 0.875).abs() < EPS);
        assert!((result.weighted_average.recall - 0.75).abs() < EPS);
        assert!((result.weighted_average.f1 - (3.0 * 0.8 + 2.0 / 3.0) / 4.0).abs() < EPS);

        assert!((result.mcc - 4.0 / 48.0_f64.sqrt()).abs() < EPS);
        Ok(())
    }

    #[test]
    fn test_half_misclassified_row() -> Result<(), EvalError> {
        let result = compute_metrics(&[0, 1, 1], &[0, 1, 0], &["A", "B"])?;
        assert_eq!(result.confusion_matrix, vec![vec![0.5, 0.5], vec![0.0, 1.0]]);
        Ok(())
    }

    #[test]
    fn test_absent_class_row_is_zero() -> Result<(), EvalError> {
        let result = compute_metrics(&[0, 2, 0], &[0, 0, 0], &classes(3))?;
        assert_eq!(result.confusion_matrix[1], vec![0.0, 0.0, 0.0]);
        assert_eq!(result.confusion_matrix[2], vec![0.0, 0.0, 0.0]);
        let row_sum: f64 = result.confusion_matrix[0].iter().sum();
        assert!((row_sum - 1.0).abs() < EPS);
        // Only class 0 is present: P=1, R=2/3
        assert!((result.macro_average.precision - 1.0).abs() < EPS);
        assert!((result.macro_average.recall - 2.0 / 3.0).abs() < EPS);
        Ok(())
    }

    #[test]
    fn test_perfect_predictions() -> Result<(), EvalError> {
        let labels = [0, 1, 2, 2, 1, 0];
        let result = compute_metrics(&labels, &labels, &classes(3))?;
        assert_eq!(result.accuracy, 1.0);
        assert!((result.mcc - 1.0).abs() < EPS);
        assert_eq!(result.macro_average, AveragedScores { precision: 1.0, recall: 1.0, f1: 1.0 });
        Ok(())
    }

    #[test]
    fn test_constant_prediction_mcc_is_zero() -> Result<(), EvalError> {
        let result = compute_metrics(&[0, 0, 0, 0], &[0, 1, 0, 1], &classes(2))?;
        assert_eq!(result.mcc, 0.0);
        assert_eq!(result.accuracy, 0.5);
        Ok(())
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            compute_metrics(&[0, 1], &[0], &classes(2)),
            Err(EvalError::InputShape(_))
        ));
        assert!(matches!(
            compute_metrics(&[0, 5], &[0, 1], &classes(2)),
            Err(EvalError::LabelRange { label: 5, num_classes: 2 })
        ));
        assert!(matches!(
            compute_metrics(&[0], &[3], &classes(2)),
            Err(EvalError::LabelRange { label: 3, num_classes: 2 })
        ));
        let empty: [usize; 0] = [];
        assert!(matches!(
            compute_metrics(&empty, &empty, &classes(2)),
            Err(EvalError::InputShape(_))
        ));
    }

    #[test]
    fn test_result_serializes() -> Result<(), Box<dyn std::error::Error>> {
        let result = compute_metrics(&[0, 1], &[0, 1], &["A", "B"])?;
        let json = serde_json::to_value(&result)?;
        assert_eq!(json["accuracy"], 1.0);
        assert_eq!(json["macro_average"]["f1"], 1.0);
        assert_eq!(json["confusion_matrix"][1][1], 1.0);
        Ok(())
    }
}

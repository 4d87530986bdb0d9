use finetune_eval::{analyze_predictions, compute_metrics};
use proptest::prelude::*;

/// (number of classes, predicted, true) with labels in range.
fn labeled_pairs() -> impl Strategy<Value = (usize, Vec<usize>, Vec<usize>)> {
    (2usize..6).prop_flat_map(|k| {
        (1usize..60).prop_flat_map(move |n| {
            (
                Just(k),
                prop::collection::vec(0..k, n),
                prop::collection::vec(0..k, n),
            )
        })
    })
}

fn class_names(k: usize) -> Vec<String> {
    (0..k).map(|i| format!("c{}", i)).collect()
}

proptest! {
    #[test]
    fn accuracy_is_fraction_of_matches((k, predicted, truth) in labeled_pairs()) {
        let result = compute_metrics(&predicted, &truth, &class_names(k)).unwrap();
        let matches = predicted.iter().zip(&truth).filter(|(p, t)| p == t).count();
        prop_assert!((result.accuracy - matches as f64 / truth.len() as f64).abs() < 1e-12);
        prop_assert!(result.mcc >= -1.0 - 1e-9 && result.mcc <= 1.0 + 1e-9);
    }

    #[test]
    fn confusion_rows_sum_to_one_or_zero((k, predicted, truth) in labeled_pairs()) {
        let result = compute_metrics(&predicted, &truth, &class_names(k)).unwrap();
        for (class, row) in result.confusion_matrix.iter().enumerate() {
            let sum: f64 = row.iter().sum();
            if truth.contains(&class) {
                prop_assert!((sum - 1.0).abs() < 1e-9);
            } else {
                prop_assert_eq!(sum, 0.0);
            }
        }
    }

    #[test]
    fn averages_ignore_class_order(
        (k, predicted, truth, permutation) in labeled_pairs().prop_flat_map(|(k, p, t)| {
            let identity: Vec<usize> = (0..k).collect();
            (Just(k), Just(p), Just(t), Just(identity).prop_shuffle())
        })
    ) {
        let original = compute_metrics(&predicted, &truth, &class_names(k)).unwrap();
        let relabel = |labels: &[usize]| labels.iter().map(|&l| permutation[l]).collect::<Vec<_>>();
        let permuted = compute_metrics(&relabel(&predicted), &relabel(&truth), &class_names(k)).unwrap();

        prop_assert!((original.macro_average.f1 - permuted.macro_average.f1).abs() < 1e-9);
        prop_assert!((original.weighted_average.f1 - permuted.weighted_average.f1).abs() < 1e-9);
        prop_assert!((original.mcc - permuted.mcc).abs() < 1e-9);
        prop_assert_eq!(original.accuracy, permuted.accuracy);
    }

    #[test]
    fn analysis_partitions_every_position((_k, predicted, truth) in labeled_pairs()) {
        let sentences: Vec<String> = (0..truth.len()).map(|i| format!("s{}", i)).collect();
        let (wrong, right) = analyze_predictions(&predicted, &truth, &sentences).unwrap();
        prop_assert_eq!(wrong.len() + right.len(), truth.len());
        prop_assert!(wrong.iter().all(|r| r.class_id != r.prediction_id));
        prop_assert!(right.iter().all(|r| r.class_id == r.prediction_id));
    }
}

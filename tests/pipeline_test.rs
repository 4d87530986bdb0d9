use std::fs;
use std::path::Path;

use env_logger::{Builder, Env};
use finetune_eval::{
    bootstrap_with_config, drop_duplicates, load_labeled_csv, report, split_dataset,
    BootstrapConfig, ClassLabelMapping, EvalError, Evaluator, MetricResult, SentenceEncoder,
};
use ndarray::{Array2, ArrayView2};
use tempfile::tempdir;

fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

const CORPUS: &str = "\
sentence,label
good movie,positive
great plot,positive
bad movie,negative
awful plot,negative
good plot,positive
bad plot,positive
awful movie,negative
great movie,positive
good movie,positive
great great,negative
great great,positive
";

const TOKENIZER: &str = r#"{
  "version": "1.0",
  "truncation": null,
  "padding": null,
  "added_tokens": [],
  "normalizer": null,
  "pre_tokenizer": { "type": "Whitespace" },
  "post_processor": null,
  "decoder": null,
  "model": {
    "type": "WordLevel",
    "vocab": { "[UNK]": 1, "good": 2, "great": 3, "bad": 4, "awful": 5, "movie": 6, "plot": 7 },
    "unk_token": "[UNK]"
  }
}"#;

fn write_fixtures(dir: &Path) -> std::io::Result<()> {
    fs::write(dir.join("corpus.csv"), CORPUS)?;
    fs::write(dir.join("tokenizer.json"), TOKENIZER)
}

/// Class 0 ("positive") when a sentence contains "good" or "great".
fn keyword_model(ids: ArrayView2<'_, i64>, _mask: ArrayView2<'_, i64>) -> Result<Array2<f32>, EvalError> {
    Ok(Array2::from_shape_fn((ids.nrows(), 2), |(row, col)| {
        let positive = ids.row(row).iter().any(|&id| id == 2 || id == 3);
        if positive == (col == 0) { 1.0 } else { 0.0 }
    }))
}

#[test]
fn test_prepare_evaluate_and_report() -> Result<(), Box<dyn std::error::Error>> {
    init();
    let dir = tempdir()?;
    write_fixtures(dir.path())?;

    let records = drop_duplicates(load_labeled_csv(dir.path().join("corpus.csv"))?);
    assert_eq!(records.len(), 8);
    assert!(records.iter().all(|r| r.sentence != "great great"));

    let mapping = ClassLabelMapping::from_labels(records.iter().map(|r| r.class_name.as_str()));
    assert_eq!(mapping.names(), ["positive", "negative"]);

    let encoder = SentenceEncoder::from_file(dir.path().join("tokenizer.json"))?;
    let dataset = encoder.build_dataset(&records, &mapping)?;
    assert_eq!(dataset.len(), 8);
    assert!(dataset.iter().all(|e| e.input_ids.len() == 2 && e.attention_mask == vec![1, 1]));

    let evaluator = Evaluator::new(&keyword_model, mapping.names().to_vec(), 3)?;
    let evaluation = evaluator.evaluate(&dataset)?;
    assert_eq!(evaluation.metrics.accuracy, 7.0 / 8.0);
    assert_eq!(evaluation.metrics.confusion_matrix, vec![vec![0.8, 0.2], vec![0.0, 1.0]]);
    assert_eq!(evaluation.wrong.len(), 1);
    assert_eq!(evaluation.wrong[0].sentence, "bad plot");
    assert_eq!((evaluation.wrong[0].class_id, evaluation.wrong[0].prediction_id), (0, 1));
    assert_eq!(evaluation.right.len(), 7);

    let out = dir.path().join("output").join("keyword");
    report::write_json(out.join("test_set_scores.json"), &evaluation.metrics)?;
    report::write_predictions_csv(out.join("preds_wrong.csv"), &evaluation.wrong)?;
    report::write_predictions_csv(out.join("preds_right.csv"), &evaluation.right)?;
    report::write_confusion_csv(
        out.join("confusion_matrix.csv"),
        &evaluation.metrics.confusion_matrix,
        mapping.names(),
    )?;
    mapping.save_json(out.join("map_classes.json"))?;

    let scores: MetricResult = serde_json::from_str(&fs::read_to_string(out.join("test_set_scores.json"))?)?;
    assert_eq!(scores, evaluation.metrics);
    let wrong = fs::read_to_string(out.join("preds_wrong.csv"))?;
    assert_eq!(wrong.lines().collect::<Vec<_>>(), vec!["Sentence,Class_id,Prediction_id", "bad plot,0,1"]);
    assert_eq!(ClassLabelMapping::load_json(out.join("map_classes.json"))?, mapping);

    let stats = bootstrap_with_config(&evaluator, &dataset, &BootstrapConfig { iterations: 20, seed: 5 })?;
    report::write_json(out.join("bootstrap_scores.json"), &stats)?;
    assert_eq!(stats.iterations, 20);
    assert!(stats.accuracy.mean > 0.5 && stats.accuracy.mean <= 1.0);
    assert!(out.join("bootstrap_scores.json").exists());
    Ok(())
}

#[test]
fn test_split_partitions_corpus() -> Result<(), Box<dyn std::error::Error>> {
    init();
    let dir = tempdir()?;
    write_fixtures(dir.path())?;

    let records = drop_duplicates(load_labeled_csv(dir.path().join("corpus.csv"))?);
    let mapping = ClassLabelMapping::from_labels(records.iter().map(|r| r.class_name.as_str()));
    let encoder = SentenceEncoder::from_file(dir.path().join("tokenizer.json"))?;
    let dataset = encoder.build_dataset(&records, &mapping)?;

    let splits = split_dataset(dataset.clone(), 0.25, 42)?;
    assert_eq!(
        (splits.train.len(), splits.validation.len(), splits.test.len()),
        (4, 2, 2)
    );

    let mut seen: Vec<String> = splits
        .train
        .iter()
        .chain(splits.validation.iter())
        .chain(splits.test.iter())
        .map(|e| e.sentence.clone())
        .collect();
    seen.sort();
    let mut all: Vec<String> = dataset.sentences().iter().map(|s| s.to_string()).collect();
    all.sort();
    assert_eq!(seen, all);

    let again = split_dataset(dataset, 0.25, 42)?;
    assert_eq!(again.test, splits.test);
    Ok(())
}

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use finetune_eval::train::log_metrics;
use finetune_eval::{
    balance_classes, bootstrap_with_config, drop_duplicates, filter_classes, format_duration,
    load_labeled_csv, report, split_dataset, BalanceOptions, BootstrapConfig, ClassLabelMapping,
    Dataset, Evaluator, ModelStore, OnnxSequenceClassifier, RuntimeConfig, SentenceEncoder,
};
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Labeled corpus (CSV with sentence and class columns)
    #[arg(long)]
    filepath: PathBuf,

    /// Local model directory or model hub repository id
    #[arg(long)]
    model_name_or_path: String,

    /// Defaults to ./output/<model name>/
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Where downloaded models are cached
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[arg(long, default_value_t = 0.1)]
    test_percent: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 32)]
    batch_size: usize,

    #[arg(long, default_value_t = 100)]
    bootstrap_iters: usize,

    /// Keep only these classes (repeatable)
    #[arg(long = "classes")]
    classes: Vec<String>,

    /// Down-sample every class to the size of the smallest large class
    #[arg(long)]
    balanced: bool,

    /// Evaluate the model on the test partition and write the reports
    #[arg(long)]
    do_test: bool,
}

fn model_name(reference: &str) -> String {
    Path::new(reference.trim_end_matches('/'))
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| reference.to_string())
}

fn log_class_counts(partition: &str, dataset: &Dataset, mapping: &ClassLabelMapping) {
    info!("{} set: {} examples", partition, dataset.len());
    for (id, count) in dataset.class_counts(mapping.len()).iter().enumerate() {
        info!("  {:<30} {}", mapping.name(id).unwrap_or("?"), count);
    }
}

/// Saves the class mapping next to the reports so predictions can be decoded later.
fn persist_mapping(output_dir: &Path, mapping: &ClassLabelMapping) -> Result<PathBuf> {
    report::ensure_output_dir(output_dir)?;
    let path = output_dir.join("map_classes.json");
    mapping.save_json(&path)?;
    info!("Wrote class mapping to {:?}", path);
    Ok(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let started = Instant::now();

    info!("=== Preparing data ===");
    let mut records = load_labeled_csv(&args.filepath)
        .with_context(|| format!("Failed to load {:?}", args.filepath))?;
    if !args.classes.is_empty() {
        records = filter_classes(records, &args.classes);
        info!("Kept {} rows of classes {:?}", records.len(), args.classes);
    }
    records = drop_duplicates(records);
    if args.balanced {
        records = balance_classes(records, &BalanceOptions::default())?;
    }
    if records.is_empty() {
        bail!("No labeled rows left after filtering");
    }

    let mapping = ClassLabelMapping::from_labels(records.iter().map(|r| r.class_name.as_str()));
    info!("{} classes: {:?}", mapping.len(), mapping.names());

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("output").join(model_name(&args.model_name_or_path)));
    persist_mapping(&output_dir, &mapping)?;

    let store = match &args.cache_dir {
        Some(dir) => ModelStore::new(dir)?,
        None => ModelStore::new_default()?,
    };
    let files = store.resolve(&args.model_name_or_path).await?;

    let encoder = SentenceEncoder::from_file(&files.tokenizer_path)?;
    let dataset = encoder.build_dataset(&records, &mapping)?;
    let splits = split_dataset(dataset, args.test_percent, args.seed)?;
    log_class_counts("Train", &splits.train, &mapping);
    log_class_counts("Validation", &splits.validation, &mapping);
    log_class_counts("Test", &splits.test, &mapping);

    if !args.do_test {
        info!("Nothing else to do without --do-test");
        return Ok(());
    }

    info!("=== Evaluating on the test set ===");
    let model = OnnxSequenceClassifier::from_file(&files.model_path, &RuntimeConfig::default())?;
    let evaluator = Evaluator::new(&model, mapping.names().to_vec(), args.batch_size)?;
    let eval_start = Instant::now();
    let evaluation = evaluator.evaluate(&splits.test)?;
    log_metrics(&evaluation.metrics);
    info!("Test evaluation took: {}", format_duration(eval_start.elapsed()));

    report::write_json(output_dir.join("test_set_scores.json"), &evaluation.metrics)?;
    report::write_predictions_csv(output_dir.join("preds_wrong.csv"), &evaluation.wrong)?;
    report::write_predictions_csv(output_dir.join("preds_right.csv"), &evaluation.right)?;
    report::write_confusion_csv(
        output_dir.join("confusion_matrix.csv"),
        &evaluation.metrics.confusion_matrix,
        mapping.names(),
    )?;

    info!("=== Bootstrapping {} resamples ===", args.bootstrap_iters);
    let config = BootstrapConfig {
        iterations: args.bootstrap_iters,
        seed: args.seed,
    };
    let stats = bootstrap_with_config(&evaluator, &splits.test, &config)?;
    report::write_json(output_dir.join("bootstrap_scores.json"), &stats)?;

    info!("Done in {}", format_duration(started.elapsed()));
    Ok(())
}

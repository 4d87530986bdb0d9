use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::{debug, info, warn};
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{ensure_ratio, ensure_same_len, EvalError};

/// A raw row of the labeled corpus, before tokenization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledSentence {
    pub sentence: String,
    pub class_name: String,
}

impl LabeledSentence {
    pub fn new(sentence: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            sentence: sentence.into(),
            class_name: class_name.into(),
        }
    }
}

/// Loads a comma-delimited labeled corpus.
///
/// The file must have a header row. With three or more columns the first one is
/// treated as an index column and the next two hold the sentence and its class;
/// with exactly two columns they are the sentence and the class. The layout is
/// taken from the header and every row must have the header's width.
pub fn load_labeled_csv<P: AsRef<Path>>(path: P) -> Result<Vec<LabeledSentence>, EvalError> {
    let path = path.as_ref();
    info!("Loading labeled sentences from {:?}", path);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let width = reader.headers()?.len();
    let (sentence_col, class_col) = match width {
        0 | 1 => {
            return Err(EvalError::Dataset(format!(
                "Header has {} column(s), expected a sentence and a class",
                width
            )))
        }
        2 => (0, 1),
        _ => (1, 2),
    };

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        if record.len() != width {
            return Err(EvalError::Dataset(format!(
                "Row {} has {} column(s), the header has {}",
                row + 1,
                record.len(),
                width
            )));
        }
        records.push(LabeledSentence::new(&record[sentence_col], &record[class_col]));
    }
    info!("  - Loaded {} rows", records.len());
    Ok(records)
}

/// Keeps only the rows whose class is one of `classes`.
pub fn filter_classes<S: AsRef<str>>(
    records: Vec<LabeledSentence>,
    classes: &[S],
) -> Vec<LabeledSentence> {
    let wanted: HashSet<&str> = classes.iter().map(AsRef::as_ref).collect();
    records
        .into_iter()
        .filter(|r| wanted.contains(r.class_name.as_str()))
        .collect()
}

/// Resolves duplicated sentences.
///
/// Repeated (sentence, class) pairs keep their first occurrence. A sentence seen
/// with more than one class is ambiguous and every row carrying it is dropped.
pub fn drop_duplicates(records: Vec<LabeledSentence>) -> Vec<LabeledSentence> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(records.len());
    for record in records {
        if seen.insert((record.sentence.clone(), record.class_name.clone())) {
            unique.push(record);
        }
    }

    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    for record in &unique {
        *occurrences.entry(record.sentence.as_str()).or_default() += 1;
    }
    let conflicting: HashSet<String> = occurrences
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(sentence, _)| sentence.to_string())
        .collect();

    if !conflicting.is_empty() {
        warn!(
            "Dropping {} sentence(s) labeled with conflicting classes",
            conflicting.len()
        );
    }
    unique
        .into_iter()
        .filter(|r| !conflicting.contains(&r.sentence))
        .collect()
}

/// Options for down-sampling the corpus to equal class sizes.
#[derive(Debug, Clone)]
pub struct BalanceOptions {
    /// Classes with this many rows or fewer are left out entirely
    pub min_class_size: usize,
    pub seed: u64,
}

impl Default for BalanceOptions {
    fn default() -> Self {
        Self {
            min_class_size: 1500,
            seed: 2,
        }
    }
}

/// Down-samples every sufficiently large class to the size of the smallest one.
///
/// Classes are emitted by descending frequency; rows inside a class are drawn
/// without replacement.
pub fn balance_classes(
    records: Vec<LabeledSentence>,
    options: &BalanceOptions,
) -> Result<Vec<LabeledSentence>, EvalError> {
    let mut by_class: Vec<(String, Vec<LabeledSentence>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for record in records {
        let slot = *positions.entry(record.class_name.clone()).or_insert_with(|| {
            by_class.push((record.class_name.clone(), Vec::new()));
            by_class.len() - 1
        });
        by_class[slot].1.push(record);
    }

    by_class.retain(|(_, rows)| rows.len() > options.min_class_size);
    by_class.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    let nb_samples = by_class
        .iter()
        .map(|(_, rows)| rows.len())
        .min()
        .ok_or_else(|| {
            EvalError::Config(format!(
                "No class has more than {} rows, nothing left to balance",
                options.min_class_size
            ))
        })?;

    info!(
        "Balancing {} classes to {} rows each",
        by_class.len(),
        nb_samples
    );
    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    let mut balanced = Vec::with_capacity(nb_samples * by_class.len());
    for (class_name, rows) in by_class {
        debug!("  - {}: {} -> {}", class_name, rows.len(), nb_samples);
        balanced.extend(rows.choose_multiple(&mut rng, nb_samples).cloned());
    }
    Ok(balanced)
}

/// One encoded example: padded token ids, attention mask, class id and the
/// original sentence kept for error analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub class_id: usize,
    pub sentence: String,
}

/// An ordered collection of encoded examples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    examples: Vec<Example>,
}

impl Dataset {
    pub fn new(examples: Vec<Example>) -> Self {
        Self { examples }
    }

    /// Zips parallel columns into a dataset.
    ///
    /// # Errors
    /// - `InputShape` if the columns do not all have the same length
    pub fn from_columns(
        input_ids: Vec<Vec<i64>>,
        attention_masks: Vec<Vec<i64>>,
        class_ids: Vec<usize>,
        sentences: Vec<String>,
    ) -> Result<Self, EvalError> {
        ensure_same_len("input ids/attention masks", input_ids.len(), attention_masks.len())?;
        ensure_same_len("input ids/class ids", input_ids.len(), class_ids.len())?;
        ensure_same_len("input ids/sentences", input_ids.len(), sentences.len())?;

        let examples = input_ids
            .into_iter()
            .zip(attention_masks)
            .zip(class_ids)
            .zip(sentences)
            .map(|(((input_ids, attention_mask), class_id), sentence)| Example {
                input_ids,
                attention_mask,
                class_id,
                sentence,
            })
            .collect();
        Ok(Self { examples })
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Example> {
        self.examples.iter()
    }

    pub fn labels(&self) -> Vec<usize> {
        self.examples.iter().map(|e| e.class_id).collect()
    }

    pub fn sentences(&self) -> Vec<&str> {
        self.examples.iter().map(|e| e.sentence.as_str()).collect()
    }

    /// Builds a new dataset from the examples at `indices`, in that order.
    /// Indices may repeat.
    ///
    /// # Panics
    /// Panics if an index is out of bounds.
    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            examples: indices.iter().map(|&i| self.examples[i].clone()).collect(),
        }
    }

    /// Appends `other` after `self`.
    pub fn combine(mut self, other: Dataset) -> Dataset {
        self.examples.extend(other.examples);
        self
    }

    /// Number of examples per class id; ids at or above `num_classes` are ignored.
    pub fn class_counts(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0; num_classes];
        for example in &self.examples {
            if let Some(count) = counts.get_mut(example.class_id) {
                *count += 1;
            }
        }
        counts
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Example;
    type IntoIter = std::slice::Iter<'a, Example>;

    fn into_iter(self) -> Self::IntoIter {
        self.examples.iter()
    }
}

/// Stacks a batch of examples into `[batch_size, seq_len]` input-id and
/// attention-mask matrices.
///
/// Rows shorter than the longest one are right-padded with id 0 and mask 0.
pub fn stack_batch(batch: &[Example]) -> (Array2<i64>, Array2<i64>) {
    let seq_len = batch.iter().map(|e| e.input_ids.len()).max().unwrap_or(0);
    let mut input_ids = Array2::zeros((batch.len(), seq_len));
    let mut attention_mask = Array2::zeros((batch.len(), seq_len));
    for (row, example) in batch.iter().enumerate() {
        for (col, &id) in example.input_ids.iter().enumerate() {
            input_ids[[row, col]] = id;
        }
        for (col, &mask) in example.attention_mask.iter().enumerate().take(seq_len) {
            attention_mask[[row, col]] = mask;
        }
    }
    (input_ids, attention_mask)
}

/// Train/validation/test partitions of one corpus.
#[derive(Debug, Clone)]
pub struct DatasetSplits {
    pub train: Dataset,
    pub validation: Dataset,
    pub test: Dataset,
}

/// Splits a dataset into disjoint train/validation/test partitions.
///
/// The test partition receives `ceil(test_percent * n)` examples of a seeded
/// permutation. The validation partition is carved out of the remainder so that
/// it has about the same size as the test partition.
///
/// # Errors
/// - `Config` if `test_percent` is outside `[0, 1]`
pub fn split_dataset(
    dataset: Dataset,
    test_percent: f64,
    seed: u64,
) -> Result<DatasetSplits, EvalError> {
    ensure_ratio("test_percent", test_percent)?;

    let n = dataset.len();
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

    let n_test = ceil_count(test_percent, n);
    let remaining = n - n_test;
    let n_val = if remaining == 0 || test_percent >= 1.0 {
        0
    } else {
        ceil_count(test_percent / (1.0 - test_percent), remaining)
    };

    let (test_idx, rest) = indices.split_at(n_test);
    let (val_idx, train_idx) = rest.split_at(n_val);
    debug!(
        "Split {} examples into train={} val={} test={}",
        n,
        train_idx.len(),
        val_idx.len(),
        test_idx.len()
    );
    Ok(DatasetSplits {
        train: dataset.select(train_idx),
        validation: dataset.select(val_idx),
        test: dataset.select(test_idx),
    })
}

// Absorbs representation error so that 0.1 / 0.9 * 90 yields 10, not 11.
fn ceil_count(ratio: f64, n: usize) -> usize {
    ((ratio * n as f64 - 1e-9).ceil().max(0.0) as usize).min(n)
}

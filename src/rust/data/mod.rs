//! Corpus loading, cleaning, label mapping, tokenization and partitioning.

pub mod dataset;
pub mod encoding;
pub mod labels;

pub use dataset::{
    balance_classes, drop_duplicates, filter_classes, load_labeled_csv, split_dataset,
    stack_batch, BalanceOptions, Dataset, DatasetSplits, Example, LabeledSentence,
};
pub use encoding::{attention_masks, pad_sequences, SentenceEncoder, MAX_SEQUENCE_LENGTH};
pub use labels::ClassLabelMapping;

use std::path::Path;

use log::{error, info};
use tokenizers::Tokenizer;

use super::dataset::{Dataset, LabeledSentence};
use super::labels::ClassLabelMapping;
use crate::error::EvalError;

/// Hard cap on the padded sequence length accepted by BERT-style encoders.
pub const MAX_SEQUENCE_LENGTH: usize = 512;

/// Padding token id; also the id the attention mask treats as padding.
pub const PAD_TOKEN_ID: i64 = 0;

/// Turns sentences into fixed-length token-id sequences using a pretrained tokenizer.
///
/// Every sentence is encoded with the model's special tokens (`[CLS]`/`[SEP]` for
/// BERT vocabularies), then the whole corpus is padded or truncated at the end to
/// the length of its longest sequence, capped at `max_length`.
#[derive(Debug)]
pub struct SentenceEncoder {
    tokenizer: Tokenizer,
    max_length: usize,
}

impl SentenceEncoder {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self {
            tokenizer,
            max_length: MAX_SEQUENCE_LENGTH,
        }
    }

    /// Loads a `tokenizer.json` file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EvalError> {
        let tokenizer = Tokenizer::from_file(path.as_ref()).map_err(|e| {
            error!("Failed to load tokenizer: {}", e);
            EvalError::Tokenizer(format!("Failed to load tokenizer: {}", e))
        })?;
        info!("Tokenizer loaded successfully");
        Ok(Self::new(tokenizer))
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Counts the tokens of `text` without special tokens.
    pub fn count_tokens(&self, text: &str) -> Result<usize, EvalError> {
        self.tokenizer
            .encode(text, false)
            .map_err(|e| EvalError::Tokenizer(e.to_string()))
            .map(|encoding| encoding.get_ids().len())
    }

    /// Encodes one sentence with special tokens, without padding.
    pub fn encode(&self, text: &str) -> Result<Vec<i64>, EvalError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EvalError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().iter().map(|&id| i64::from(id)).collect())
    }

    /// Encodes and pads a corpus, returning the padded ids and their attention masks.
    pub fn encode_corpus<S: AsRef<str>>(
        &self,
        sentences: &[S],
    ) -> Result<(Vec<Vec<i64>>, Vec<Vec<i64>>), EvalError> {
        let tokenized = sentences
            .iter()
            .map(|s| self.encode(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let longest = tokenized.iter().map(Vec::len).max().unwrap_or(0);
        let max_len = longest.min(self.max_length);
        info!("  - Max sentence length: {}", max_len);
        info!("  - Padding/truncating all sentences to {} tokens...", max_len);

        let padded = pad_sequences(&tokenized, max_len, PAD_TOKEN_ID);
        let masks = attention_masks(&padded);
        Ok((padded, masks))
    }

    /// Encodes labeled rows into a [`Dataset`], resolving class names through `mapping`.
    ///
    /// # Errors
    /// - `Dataset` if a row's class is missing from the mapping
    /// - `Tokenizer` if a sentence cannot be encoded
    pub fn build_dataset(
        &self,
        records: &[LabeledSentence],
        mapping: &ClassLabelMapping,
    ) -> Result<Dataset, EvalError> {
        let class_ids = records
            .iter()
            .map(|r| {
                mapping.id(&r.class_name).ok_or_else(|| {
                    EvalError::Dataset(format!("Unknown class '{}'", r.class_name))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let sentences: Vec<String> = records.iter().map(|r| r.sentence.clone()).collect();
        let (input_ids, masks) = self.encode_corpus(&sentences)?;
        Dataset::from_columns(input_ids, masks, class_ids, sentences)
    }
}

/// Pads (with `value`) or truncates every sequence at its end to exactly `max_len`.
pub fn pad_sequences(sequences: &[Vec<i64>], max_len: usize, value: i64) -> Vec<Vec<i64>> {
    sequences
        .iter()
        .map(|seq| {
            let mut padded: Vec<i64> = seq.iter().copied().take(max_len).collect();
            padded.resize(max_len, value);
            padded
        })
        .collect()
}

/// 1 for real tokens (id > 0), 0 for padding.
pub fn attention_masks(sequences: &[Vec<i64>]) -> Vec<Vec<i64>> {
    sequences
        .iter()
        .map(|seq| seq.iter().map(|&id| i64::from(id > PAD_TOKEN_ID)).collect())
        .collect()
}

use serde::{Deserialize, Serialize};

use crate::error::{ensure_same_len, EvalError};

/// One evaluated example, kept for error analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRecord {
    #[serde(rename = "Sentence")]
    pub sentence: String,
    #[serde(rename = "Class_id")]
    pub class_id: usize,
    #[serde(rename = "Prediction_id")]
    pub prediction_id: usize,
}

impl PredictionRecord {
    pub fn is_correct(&self) -> bool {
        self.class_id == self.prediction_id
    }
}

/// Splits evaluated examples into (wrong, right) predictions, each in original order.
///
/// # Errors
/// - `InputShape` if the three sequences are not aligned
pub fn analyze_predictions<S: AsRef<str>>(
    predicted: &[usize],
    truth: &[usize],
    sentences: &[S],
) -> Result<(Vec<PredictionRecord>, Vec<PredictionRecord>), EvalError> {
    ensure_same_len("predictions/labels", predicted.len(), truth.len())?;
    ensure_same_len("predictions/sentences", predicted.len(), sentences.len())?;

    let (right, wrong): (Vec<_>, Vec<_>) = predicted
        .iter()
        .zip(truth)
        .zip(sentences)
        .map(|((&prediction_id, &class_id), sentence)| PredictionRecord {
            sentence: sentence.as_ref().to_string(),
            class_id,
            prediction_id,
        })
        .partition(PredictionRecord::is_correct);
    Ok((wrong, right))
}

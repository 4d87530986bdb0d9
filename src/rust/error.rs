use ort::Error as OrtError;

/// Represents the different types of errors that can occur while preparing data,
/// running the model or scoring its predictions.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Sequences that must be aligned position by position have different lengths,
    /// or a score matrix does not match its batch
    #[error("Input shape error: {0}")]
    InputShape(String),
    /// A class id is outside `[0, num_classes)`
    #[error("Label {label} is out of range for {num_classes} classes")]
    LabelRange { label: usize, num_classes: usize },
    /// The inference backend failed while scoring a batch
    #[error("Inference failure: {0}")]
    Inference(String),
    /// A numeric option is outside its valid range
    #[error("Config error: {0}")]
    Config(String),
    /// The labeled dataset could not be read or is malformed
    #[error("Dataset error: {0}")]
    Dataset(String),
    /// Error occurred while loading or using the tokenizer
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
    /// Error occurred while loading the ONNX model
    #[error("Model error: {0}")]
    Model(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<OrtError> for EvalError {
    fn from(err: OrtError) -> Self {
        EvalError::Model(err.to_string())
    }
}

impl From<csv::Error> for EvalError {
    fn from(err: csv::Error) -> Self {
        EvalError::Dataset(err.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::Serialization(err.to_string())
    }
}

/// Fails with `InputShape` unless both sequences have the same length.
pub(crate) fn ensure_same_len(what: &str, left: usize, right: usize) -> Result<(), EvalError> {
    if left != right {
        return Err(EvalError::InputShape(format!(
            "{}: length mismatch ({} vs {})",
            what, left, right
        )));
    }
    Ok(())
}

/// Fails with `Config` unless `value` lies in `[0, 1]`.
pub(crate) fn ensure_ratio(name: &str, value: f64) -> Result<(), EvalError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(EvalError::Config(format!(
            "'{}' must be between [0,1], got {}",
            name, value
        )));
    }
    Ok(())
}

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use log::info;
use ndarray::{Array2, ArrayView2, Ix2};
use ort::session::Session;
use ort::value::Tensor;

use crate::error::EvalError;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// A batched scoring capability: maps a batch of token-id rows and their attention
/// masks (both `[batch_size, seq_len]`) to per-example class scores
/// (`[batch_size, num_classes]`).
///
/// Implementations must not mutate model state. Any closure with the matching
/// signature is a `BatchInference`, which keeps evaluation code testable without
/// a real network.
pub trait BatchInference {
    fn infer(
        &self,
        input_ids: ArrayView2<'_, i64>,
        attention_mask: ArrayView2<'_, i64>,
    ) -> Result<Array2<f32>, EvalError>;
}

impl<F> BatchInference for F
where
    F: Fn(ArrayView2<'_, i64>, ArrayView2<'_, i64>) -> Result<Array2<f32>, EvalError>,
{
    fn infer(
        &self,
        input_ids: ArrayView2<'_, i64>,
        attention_mask: ArrayView2<'_, i64>,
    ) -> Result<Array2<f32>, EvalError> {
        self(input_ids, attention_mask)
    }
}

/// A sequence-classification network exported to ONNX.
///
/// The graph is expected to:
/// - Accept `input_ids` and `attention_mask` (both i64 `[batch_size, sequence_length]`),
///   and optionally `token_type_ids`, which is fed with zeros
/// - Output logits of shape `[batch_size, num_classes]` as its first output
#[derive(Debug, Clone)]
pub struct OnnxSequenceClassifier {
    pub model_path: String,
    session: Arc<Session>,
    wants_token_type_ids: bool,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<OnnxSequenceClassifier>();
    }
};

impl OnnxSequenceClassifier {
    /// Loads and validates an ONNX model.
    ///
    /// # Errors
    /// - `Model` if the file is missing, cannot be loaded, or lacks the expected inputs/outputs
    pub fn from_file<P: AsRef<Path>>(path: P, config: &RuntimeConfig) -> Result<Self, EvalError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EvalError::Model(format!("Model file not found: {:?}", path)));
        }

        let session = create_session_builder(config)?.commit_from_file(path)?;
        Self::validate_model(&session)?;
        info!("Model structure validated successfully");

        let wants_token_type_ids = session.inputs.iter().any(|i| i.name == "token_type_ids");
        Ok(Self {
            model_path: path.to_string_lossy().to_string(),
            session: Arc::new(session),
            wants_token_type_ids,
        })
    }

    fn validate_model(session: &Session) -> Result<(), EvalError> {
        let inputs = &session.inputs;
        if inputs.len() < 2 {
            return Err(EvalError::Model(format!(
                "Model must have at least 2 inputs (input_ids and attention_mask), found {}",
                inputs.len()
            )));
        }
        if session.outputs.is_empty() {
            return Err(EvalError::Model(
                "Model must have at least 1 output for logits".to_string(),
            ));
        }
        Ok(())
    }
}

impl BatchInference for OnnxSequenceClassifier {
    fn infer(
        &self,
        input_ids: ArrayView2<'_, i64>,
        attention_mask: ArrayView2<'_, i64>,
    ) -> Result<Array2<f32>, EvalError> {
        let to_tensor = |name: &str, array: ArrayView2<'_, i64>| {
            let array = array.into_dyn();
            let array = array.as_standard_layout();
            Tensor::from_array(&array).map_err(|e| {
                EvalError::Inference(format!("Failed to create {} tensor: {}", name, e))
            })
        };

        let mut input_tensors = HashMap::new();
        input_tensors.insert("input_ids", to_tensor("input_ids", input_ids)?);
        input_tensors.insert("attention_mask", to_tensor("attention_mask", attention_mask)?);
        if self.wants_token_type_ids {
            let token_type_ids = Array2::<i64>::zeros(input_ids.raw_dim());
            input_tensors.insert("token_type_ids", to_tensor("token_type_ids", token_type_ids.view())?);
        }

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| EvalError::Inference(format!("Failed to run model: {}", e)))?;
        let logits = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EvalError::Inference(format!("Failed to extract output tensor: {}", e)))?;

        logits
            .into_dimensionality::<Ix2>()
            .map(|view| view.to_owned())
            .map_err(|e| EvalError::Inference(format!("Expected [batch, num_classes] logits: {}", e)))
    }
}

use std::fmt::Display;
use std::sync::OnceLock;

use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::Result as OrtResult;

use crate::error::EvalError;

static INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Graph optimization applied by ONNX Runtime when the session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationLevel {
    Disable,
    Level1,
    Level2,
    #[default]
    Level3,
}

impl From<OptimizationLevel> for GraphOptimizationLevel {
    fn from(level: OptimizationLevel) -> Self {
        match level {
            OptimizationLevel::Disable => GraphOptimizationLevel::Disable,
            OptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
            OptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
            OptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// 0 lets ONNX Runtime decide
    pub inter_threads: usize,
    /// 0 lets ONNX Runtime decide
    pub intra_threads: usize,
    pub optimization_level: OptimizationLevel,
}

fn init_onnx_environment() -> OrtResult<()> {
    ort::init()
        .with_name("finetune-eval")
        .commit()?;
    Ok(())
}

/// Runs `init` at most once per `cell` and replays its outcome on every call.
fn init_once<E: Display>(
    cell: &OnceLock<Result<(), String>>,
    init: impl FnOnce() -> Result<(), E>,
) -> Result<(), EvalError> {
    cell.get_or_init(|| {
        init().map_err(|e| {
            log::error!("Failed to initialize ONNX Runtime environment: {}", e);
            e.to_string()
        })
    })
    .clone()
    .map_err(|e| EvalError::Model(format!("ONNX Runtime environment unavailable: {}", e)))
}

pub fn ensure_initialized() -> Result<(), EvalError> {
    init_once(&INIT, init_onnx_environment)
}

pub fn create_session_builder(config: &RuntimeConfig) -> Result<SessionBuilder, EvalError> {
    ensure_initialized()?;
    let mut builder = Session::builder()?;

    if config.inter_threads > 0 {
        builder = builder.with_inter_threads(config.inter_threads)?;
    }
    if config.intra_threads > 0 {
        builder = builder.with_intra_threads(config.intra_threads)?;
    }
    builder = builder.with_optimization_level(config.optimization_level.into())?;

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_initialization() {
        assert!(ensure_initialized().is_ok());
        assert!(ensure_initialized().is_ok()); // Second call should be fine
    }

    #[test]
    fn test_failed_initialization_is_remembered() {
        let cell = OnceLock::new();
        let mut attempts = 0;
        let first = init_once(&cell, || {
            attempts += 1;
            Err("no execution provider")
        });
        assert!(matches!(first, Err(EvalError::Model(msg)) if msg.contains("no execution provider")));

        let second = init_once(&cell, || -> Result<(), &str> { Ok(()) });
        assert!(matches!(second, Err(EvalError::Model(_))));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_session_builder_config() {
        let config = RuntimeConfig {
            inter_threads: 2,
            intra_threads: 2,
            optimization_level: OptimizationLevel::Level1,
        };
        let builder = create_session_builder(&config);
        assert!(builder.is_ok());
    }

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.inter_threads, 0);
        assert_eq!(config.optimization_level, OptimizationLevel::Level3);
    }
}

use modelwrap_core::{format_dims, InputError};
use thiserror::Error;

/// Per-example input dims that do not match what the engine declares.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(
    "input shape is {}, while {} is given",
    format_dims(.expected),
    format_concrete(.actual)
)]
pub struct ShapeMismatch {
    /// Engine's declared dims without the batch dimension. `None` = dynamic.
    pub expected: Vec<Option<usize>>,
    /// Input dims without the batch dimension.
    pub actual: Vec<usize>,
}

fn format_concrete(dims: &[usize]) -> String {
    let dims: Vec<Option<usize>> = dims.iter().copied().map(Some).collect();
    format_dims(&dims)
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    ShapeMismatch(#[from] ShapeMismatch),

    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    #[error("model {model} has no engine attached")]
    EngineMissing { model: String },

    #[error("engine failure: {0:#}")]
    Engine(#[source] anyhow::Error),
}

impl PredictError {
    /// True when the caller sent bad input, as opposed to a failing model.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PredictError::ShapeMismatch(_) | PredictError::InvalidInput(_)
        )
    }

    pub fn shape_mismatch(&self) -> Option<&ShapeMismatch> {
        match self {
            PredictError::ShapeMismatch(mismatch) => Some(mismatch),
            _ => None,
        }
    }
}

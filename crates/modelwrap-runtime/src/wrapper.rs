use std::fmt;
use std::time::Instant;

use modelwrap_core::{DType, Engine, NestedList, Tensor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{check_input_shape, PredictError};

/// Identity of a wrapped model as exposed to API callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub tag: String,
}

/// A named, tagged model ready to serve predictions.
///
/// The engine is optional so a wrapper can be registered before its weights
/// are loaded; predicting without one fails with
/// [`PredictError::EngineMissing`].
pub struct ModelWrapper {
    name: String,
    tag: String,
    engine: Option<Box<dyn Engine>>,
}

impl ModelWrapper {
    pub fn new(name: impl Into<String>, tag: impl Into<String>, engine: impl Engine) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
            engine: Some(Box::new(engine)),
        }
    }

    pub fn without_engine(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
            engine: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn engine(&self) -> Option<&dyn Engine> {
        self.engine.as_deref()
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            name: self.name.clone(),
            tag: self.tag.clone(),
        }
    }

    /// Runs the engine on plain nested-list input and returns plain output.
    ///
    /// Input is packed into a tensor of the engine's input dtype, then its
    /// per-example shape is checked before any inference happens.
    pub fn predict(&mut self, input: &NestedList) -> Result<NestedList, PredictError> {
        let (label, engine) = self.prepare()?;

        let dtype = engine
            .spec()
            .inputs
            .first()
            .map_or(DType::F32, |spec| spec.dtype);
        let tensor = input.to_tensor(dtype)?;

        let output = run(engine, &label, tensor)?;
        NestedList::from_tensor(&output).map_err(PredictError::Engine)
    }

    /// Same as [`ModelWrapper::predict`] for callers that already hold a tensor.
    pub fn predict_tensor(&mut self, input: Tensor) -> Result<Tensor, PredictError> {
        let (label, engine) = self.prepare()?;
        run(engine, &label, input)
    }

    fn prepare(&mut self) -> Result<(String, &mut dyn Engine), PredictError> {
        let label = self.to_string();
        let engine: &mut dyn Engine = self
            .engine
            .as_deref_mut()
            .ok_or_else(|| PredictError::EngineMissing {
                model: label.clone(),
            })?;

        info!(model = %label, "model summary:\n{}", engine.summary());
        Ok((label, engine))
    }
}

fn run(engine: &mut dyn Engine, model: &str, input: Tensor) -> Result<Tensor, PredictError> {
    let declared = engine.input_shape().map_err(PredictError::Engine)?;
    if let Err(err) = check_input_shape(declared, input.shape()) {
        debug!(model, error = %err, "rejecting input");
        return Err(err);
    }

    let batch = input.shape().batch_size();
    let t0 = Instant::now();
    let output = engine.predict(input).map_err(PredictError::Engine)?;
    debug!(
        model,
        batch = ?batch,
        output_shape = %output.shape(),
        elapsed_us = t0.elapsed().as_micros() as u64,
        "inference done"
    );

    Ok(output)
}

impl fmt::Display for ModelWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model(name={}, tag={})", self.name, self.tag)
    }
}

impl fmt::Debug for ModelWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelWrapper")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("engine_loaded", &self.engine.is_some())
            .finish()
    }
}

use anyhow::{Context, Result};

use crate::{Device, ModelArtifact, ModelSpec, Tensor};

pub trait Backend: Send + Sync + 'static {
    type Model: Engine;

    fn name(&self) -> &'static str;
    fn load(&self, artifact: &ModelArtifact, device: Device) -> Result<Self::Model>;
}

/// A loaded, inference-capable model.
pub trait Engine: Send + 'static {
    fn spec(&self) -> &ModelSpec;

    /// Declared input shape, leading batch dimension included.
    fn input_shape(&self) -> Result<&[Option<usize>]> {
        let input = self
            .spec()
            .inputs
            .first()
            .context("model declares no inputs")?;
        Ok(&input.dims)
    }

    /// Runs one forward pass. Input is batched along its first dimension.
    fn predict(&mut self, input: Tensor) -> Result<Tensor>;

    /// Human-readable description of the model structure.
    fn summary(&self) -> String {
        self.spec().to_string()
    }
}

//! Feed-forward network engine loaded from a JSON weights manifest.
//!
//! Each layer computes `activation(x · Wᵀ + b)` where `W` is stored
//! `out x in`. Inputs are `f32` with shape `[batch, input_dim]`.

use std::fmt::Write as _;

use anyhow::{bail, ensure, Context, Result};
use modelwrap_core::{
    Backend, DType, Device, Engine, IOName, ModelArtifact, ModelSpec, Shape, Tensor, TensorSpec,
};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

impl Activation {
    fn apply(self, x: &mut Array2<f32>) {
        match self {
            Activation::Linear => {}
            Activation::Relu => x.mapv_inplace(|v| v.max(0.0)),
            Activation::Sigmoid => x.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Tanh => x.mapv_inplace(f32::tanh),
            Activation::Softmax => {
                for mut row in x.axis_iter_mut(Axis(0)) {
                    let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                    row.mapv_inplace(|v| (v - max).exp());
                    let sum = row.sum();
                    if sum > 0.0 {
                        row /= sum;
                    }
                }
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayerManifest {
    /// Row-major `out x in` weight matrix.
    pub weights: Vec<Vec<f32>>,
    #[serde(default)]
    pub bias: Option<Vec<f32>>,
    #[serde(default)]
    pub activation: Activation,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DenseManifest {
    #[serde(default)]
    pub name: Option<String>,
    pub input_dim: usize,
    pub layers: Vec<LayerManifest>,
}

/// Fully connected layer.
struct Linear {
    weight: Array2<f32>, // out x in
    bias: Option<Array1<f32>>,
    activation: Activation,
}

impl Linear {
    fn from_manifest(idx: usize, layer: LayerManifest, in_dim: usize) -> Result<Self> {
        let out_dim = layer.weights.len();
        ensure!(out_dim > 0, "layer {idx} has no weight rows");
        for (row_idx, row) in layer.weights.iter().enumerate() {
            ensure!(
                row.len() == in_dim,
                "layer {idx} weight row {row_idx} has {} columns, expected {in_dim}",
                row.len()
            );
        }

        let flat: Vec<f32> = layer.weights.into_iter().flatten().collect();
        let weight = Array2::from_shape_vec((out_dim, in_dim), flat)
            .with_context(|| format!("layer {idx} weights are not {out_dim}x{in_dim}"))?;

        let bias = match layer.bias {
            Some(bias) => {
                ensure!(
                    bias.len() == out_dim,
                    "layer {idx} bias has {} entries, expected {out_dim}",
                    bias.len()
                );
                Some(Array1::from(bias))
            }
            None => None,
        };

        Ok(Self {
            weight,
            bias,
            activation: layer.activation,
        })
    }

    fn out_dim(&self) -> usize {
        self.weight.nrows()
    }

    fn params(&self) -> usize {
        self.weight.len() + self.bias.as_ref().map_or(0, |bias| bias.len())
    }

    fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        let mut y = x.dot(&self.weight.t());
        if let Some(bias) = &self.bias {
            y += bias;
        }
        self.activation.apply(&mut y);
        y
    }
}

pub struct DenseBackend;

impl DenseBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DenseBackend {
    fn default() -> Self {
        Self::new()
    }
}

pub struct DenseModel {
    spec: ModelSpec,
    name: String,
    input_dim: usize,
    layers: Vec<Linear>,
}

impl Backend for DenseBackend {
    type Model = DenseModel;

    fn name(&self) -> &'static str {
        "dense"
    }

    fn load(&self, artifact: &ModelArtifact, device: Device) -> Result<Self::Model> {
        let ModelArtifact::DenseJson(path) = artifact else {
            bail!("dense backend expects a JSON weights manifest");
        };
        ensure!(
            device == Device::Cpu,
            "dense backend only runs on cpu, got {device:?}"
        );

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let manifest: DenseManifest =
            serde_json::from_str(&raw).context("failed to parse dense manifest")?;

        let model = DenseModel::from_manifest(manifest)?;
        info!(
            model = %model.name,
            path = %path.display(),
            layers = model.layers.len(),
            "dense model loaded"
        );
        Ok(model)
    }
}

impl DenseModel {
    pub fn from_manifest(manifest: DenseManifest) -> Result<Self> {
        ensure!(manifest.input_dim > 0, "input_dim must be positive");
        ensure!(!manifest.layers.is_empty(), "model has no layers");

        let mut layers = Vec::with_capacity(manifest.layers.len());
        let mut in_dim = manifest.input_dim;
        for (idx, layer) in manifest.layers.into_iter().enumerate() {
            let linear = Linear::from_manifest(idx, layer, in_dim)?;
            in_dim = linear.out_dim();
            layers.push(linear);
        }

        let spec = ModelSpec {
            inputs: vec![TensorSpec {
                name: IOName("x".to_string()),
                dtype: DType::F32,
                rank: 2,
                dims: vec![None, Some(manifest.input_dim)],
            }],
            outputs: vec![TensorSpec {
                name: IOName("y".to_string()),
                dtype: DType::F32,
                rank: 2,
                dims: vec![None, Some(in_dim)],
            }],
        };

        Ok(Self {
            spec,
            name: manifest.name.unwrap_or_else(|| "dense".to_string()),
            input_dim: manifest.input_dim,
            layers,
        })
    }

    pub fn param_count(&self) -> usize {
        self.layers.iter().map(Linear::params).sum()
    }
}

impl Engine for DenseModel {
    fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn predict(&mut self, input: Tensor) -> Result<Tensor> {
        let dims = input.shape().dims();
        ensure!(dims.len() == 2, "expected a rank-2 input, got {}", input.shape());
        ensure!(
            dims[1] == self.input_dim,
            "expected {} features, got {}",
            self.input_dim,
            dims[1]
        );

        let batch = dims[0];
        let x = Array2::from_shape_vec((batch, self.input_dim), input.values::<f32>()?)
            .context("input does not fit [batch, input_dim]")?;

        let y = self
            .layers
            .iter()
            .fold(x, |x, layer| layer.forward(&x));

        let out: Vec<f32> = y.iter().copied().collect();
        Tensor::from_values(Shape::from_slice(&[batch, y.ncols()]), &out)
    }

    fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "dense model \"{}\"", self.name);
        let _ = writeln!(out, "{:<8}{:<14}{:<12}{:>10}", "layer", "output", "activation", "params");
        for (idx, layer) in self.layers.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:<8}{:<14}{:<12}{:>10}",
                idx,
                format!("[?, {}]", layer.out_dim()),
                format!("{:?}", layer.activation).to_lowercase(),
                layer.params()
            );
        }
        let _ = writeln!(out, "total params: {}", self.param_count());
        out
    }
}

use anyhow::{Context, Result};
use modelwrap_backend_dense::DenseBackend;
use modelwrap_backend_ort::OrtBackend;
use modelwrap_core::{Backend, Device, ModelArtifact};
use modelwrap_runtime::ModelWrapper;
use tracing::info;

use crate::cli::{BackendKind, ModelArgs};

/// Loads the model described by `args` and wraps it under its name and tag.
pub fn load_model(args: &ModelArgs) -> Result<ModelWrapper> {
    let device = parse_device(&args.device)?;
    let path = args.model_path.clone();

    let wrapper = match args.backend {
        BackendKind::Onnx => {
            load_with(OrtBackend::new(), ModelArtifact::OnnxPath(path), device, args)?
        }
        BackendKind::Dense => {
            load_with(DenseBackend::new(), ModelArtifact::DenseJson(path), device, args)?
        }
    };

    info!(model = %wrapper, backend = ?args.backend, "model ready");
    Ok(wrapper)
}

fn load_with<B: Backend>(
    backend: B,
    artifact: ModelArtifact,
    device: Device,
    args: &ModelArgs,
) -> Result<ModelWrapper> {
    let model = backend.load(&artifact, device).with_context(|| {
        format!(
            "{} backend failed to load {}",
            backend.name(),
            artifact.path().display()
        )
    })?;
    Ok(ModelWrapper::new(&args.name, &args.tag, model))
}

pub fn parse_device(raw: &str) -> Result<Device> {
    if raw.eq_ignore_ascii_case("cpu") {
        return Ok(Device::Cpu);
    }

    if let Some(rest) = raw.strip_prefix("cuda:") {
        let device_id: u32 = rest.parse().context("invalid cuda device id")?;
        return Ok(Device::Cuda { device_id });
    }

    anyhow::bail!("unsupported device: {raw} (expected cpu or cuda:N)");
}

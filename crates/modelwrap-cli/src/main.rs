mod cli;
mod loader;

use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, ModelArgs};
use modelwrap_core::NestedList;
use modelwrap_runtime::PredictError;
use serde_json::{json, Value};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Exit status for input the model rejected.
const EXIT_CLIENT_ERROR: i32 = 2;

fn main() -> Result<()> {
    let cli = Cli::parse();

    std::env::set_var("RUST_LOG", &cli.log);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Predict { model, input } => predict(&model, &input),
        Command::Describe { model } => describe(&model),
    }
}

fn predict(args: &ModelArgs, input: &str) -> Result<()> {
    let input = read_input(input)?;
    let mut wrapper = loader::load_model(args)?;

    match wrapper.predict(&input) {
        Ok(outputs) => {
            let body = json!({ "model": wrapper.info(), "outputs": outputs });
            println!("{}", serde_json::to_string(&body)?);
            Ok(())
        }
        Err(err) if err.is_client_error() => {
            warn!(model = %wrapper, error = %err, "input rejected");
            eprintln!("{}", client_error_body(&err));
            std::process::exit(EXIT_CLIENT_ERROR);
        }
        Err(err) => Err(anyhow::Error::new(err).context(format!("{wrapper} failed to predict"))),
    }
}

fn describe(args: &ModelArgs) -> Result<()> {
    let wrapper = loader::load_model(args)?;
    println!("{}", serde_json::to_string_pretty(&wrapper.info())?);
    if let Some(engine) = wrapper.engine() {
        print!("{}", engine.summary());
    }
    Ok(())
}

fn read_input(source: &str) -> Result<NestedList> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read input from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("failed to read {source}"))?
    };

    serde_json::from_str(&raw).context("input is not a JSON list of numbers")
}

fn client_error_body(err: &PredictError) -> Value {
    let mut body = json!({ "error": err.to_string() });
    if let Some(mismatch) = err.shape_mismatch() {
        body["expected"] = json!(mismatch.expected);
        body["actual"] = json!(mismatch.actual);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelwrap_core::InputError;
    use modelwrap_runtime::ShapeMismatch;

    #[test]
    fn shape_mismatch_body_carries_both_dims() {
        let err = PredictError::from(ShapeMismatch {
            expected: vec![None, Some(10)],
            actual: vec![4, 8],
        });
        assert_eq!(
            client_error_body(&err),
            json!({
                "error": "input shape is [?, 10], while [4, 8] is given",
                "expected": [null, 10],
                "actual": [4, 8]
            })
        );
    }

    #[test]
    fn other_client_errors_carry_only_a_message() {
        let err = PredictError::from(InputError::MixedDepth { depth: 1 });
        assert_eq!(
            client_error_body(&err),
            json!({ "error": "invalid input: input mixes numbers and lists at depth 1" })
        );
    }

    #[test]
    fn reads_input_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.json");
        std::fs::write(&path, "[[1, 2], [3, 4]]").unwrap();

        let input = read_input(path.to_str().unwrap()).unwrap();
        assert_eq!(input.shape().unwrap().dims(), &[2, 2]);

        std::fs::write(&path, r#"{"x": 1}"#).unwrap();
        assert!(read_input(path.to_str().unwrap()).is_err());
    }
}

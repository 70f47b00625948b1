use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "modelwrap", version, about = "Run a pre-trained model on JSON input")]
pub struct Cli {
    /// Log level (RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the model on a JSON nested list and print the outputs
    Predict {
        #[command(flatten)]
        model: ModelArgs,

        /// JSON input file, `-` reads stdin
        #[arg(long, default_value = "-")]
        input: String,
    },
    /// Print the model info and its structure
    Describe {
        #[command(flatten)]
        model: ModelArgs,
    },
}

#[derive(Args, Debug)]
pub struct ModelArgs {
    /// Inference backend
    #[arg(long, value_enum, default_value_t = BackendKind::Onnx)]
    pub backend: BackendKind,

    /// Path to the ONNX file or dense JSON manifest
    #[arg(long, default_value = "models/model.onnx")]
    pub model_path: PathBuf,

    /// Device for inference (cpu or cuda:N)
    #[arg(long, default_value = "cpu")]
    pub device: String,

    /// Model name reported to callers
    #[arg(long, default_value = "default")]
    pub name: String,

    /// Model tag, e.g. a version label
    #[arg(long, default_value = "latest")]
    pub tag: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    Onnx,
    Dense,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_defaults() {
        let cli = Cli::try_parse_from(["modelwrap", "predict"]).unwrap();
        assert_eq!(cli.log, "info");
        let Command::Predict { model, input } = cli.command else {
            panic!("expected predict");
        };
        assert_eq!(input, "-");
        assert_eq!(model.backend, BackendKind::Onnx);
        assert_eq!(model.device, "cpu");
        assert_eq!(model.name, "default");
        assert_eq!(model.tag, "latest");
    }

    #[test]
    fn describe_with_dense_backend() {
        let cli = Cli::try_parse_from([
            "modelwrap",
            "describe",
            "--backend",
            "dense",
            "--model-path",
            "weights.json",
            "--name",
            "sentiment",
            "--tag",
            "v1",
            "--log",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log, "debug");
        let Command::Describe { model } = cli.command else {
            panic!("expected describe");
        };
        assert_eq!(model.backend, BackendKind::Dense);
        assert_eq!(model.model_path, PathBuf::from("weights.json"));
        assert_eq!(model.name, "sentiment");
        assert_eq!(model.tag, "v1");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Cli::try_parse_from(["modelwrap", "predict", "--backend", "torch"]).is_err());
    }
}

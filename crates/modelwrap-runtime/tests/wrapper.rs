use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use modelwrap_core::{
    DType, Engine, IOName, InputError, ModelSpec, NestedList, Shape, Tensor, TensorSpec,
};
use modelwrap_runtime::{ModelWrapper, PredictError, ShapeMismatch};

/// Sums each example's values into a `[sum, count]` output row.
struct SumEngine {
    spec: ModelSpec,
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl SumEngine {
    fn new(dims: Vec<Option<usize>>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let spec = ModelSpec {
            inputs: vec![TensorSpec {
                name: IOName("x".to_string()),
                dtype: DType::F32,
                rank: dims.len(),
                dims,
            }],
            outputs: vec![TensorSpec {
                name: IOName("y".to_string()),
                dtype: DType::F32,
                rank: 2,
                dims: vec![None, Some(2)],
            }],
        };
        let engine = Self {
            spec,
            calls: Arc::clone(&calls),
            fail: false,
        };
        (engine, calls)
    }
}

impl Engine for SumEngine {
    fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn predict(&mut self, input: Tensor) -> Result<Tensor> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("device lost");
        }

        let batch = input.shape().batch_size().unwrap_or(0);
        let values = input.values::<f32>()?;
        let per_row = values.len().checked_div(batch).unwrap_or(0);
        let mut out = Vec::with_capacity(batch * 2);
        for row in values.chunks(per_row.max(1)).take(batch) {
            out.push(row.iter().sum::<f32>());
            out.push(row.len() as f32);
        }
        Tensor::from_values(Shape::from_slice(&[batch, 2]), &out)
    }
}

fn rows(batch: usize, width: usize) -> NestedList {
    NestedList::from(vec![vec![1.0_f64; width]; batch])
}

#[test]
fn matching_shape_predicts_for_any_batch() -> Result<()> {
    let (engine, calls) = SumEngine::new(vec![None, Some(10)]);
    let mut model = ModelWrapper::new("sentiment", "v1", engine);

    for batch in [1, 3, 5] {
        let out = model.predict(&rows(batch, 10))?;
        let out_rows = out.as_list().map(<[NestedList]>::len);
        assert_eq!(out_rows, Some(batch));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let out = model.predict(&rows(3, 10))?;
    let first = NestedList::from(vec![10.0_f64, 10.0]);
    assert_eq!(out.as_list().and_then(|r| r.first()), Some(&first));
    Ok(())
}

#[test]
fn wrong_width_is_a_shape_mismatch() {
    let (engine, calls) = SumEngine::new(vec![None, Some(10)]);
    let mut model = ModelWrapper::new("sentiment", "v1", engine);

    let err = model.predict(&rows(3, 8)).unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(
        err.shape_mismatch(),
        Some(&ShapeMismatch {
            expected: vec![Some(10)],
            actual: vec![8],
        })
    );
    assert_eq!(err.to_string(), "input shape is [10], while [8] is given");
    assert_eq!(calls.load(Ordering::SeqCst), 0, "engine must not run");
}

#[test]
fn extra_dimension_is_a_shape_mismatch() {
    let (engine, _) = SumEngine::new(vec![None, Some(2)]);
    let mut model = ModelWrapper::new("m", "t", engine);

    let input = NestedList::from(vec![vec![vec![1.0_f64], vec![2.0]]]);
    let err = model.predict(&input).unwrap_err();
    assert_eq!(
        err.shape_mismatch(),
        Some(&ShapeMismatch {
            expected: vec![Some(2)],
            actual: vec![2, 1],
        })
    );
}

#[test]
fn missing_batch_dimension_is_a_shape_mismatch() {
    let (engine, calls) = SumEngine::new(vec![None, Some(3)]);
    let mut model = ModelWrapper::new("m", "t", engine);

    let single = NestedList::from(vec![1.0_f64, 2.0, 3.0]);
    let err = model.predict(&single).unwrap_err();
    assert_eq!(
        err.shape_mismatch(),
        Some(&ShapeMismatch {
            expected: vec![Some(3)],
            actual: vec![],
        })
    );
    assert_eq!(err.to_string(), "input shape is [3], while [] is given");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn integer_engine_rejects_unrepresentable_input() {
    let (mut engine, calls) = SumEngine::new(vec![None, Some(3)]);
    engine.spec.inputs[0].dtype = DType::U8;
    let mut model = ModelWrapper::new("pixels", "v1", engine);

    let input = NestedList::from(vec![vec![1.9_f64, -5.0, 300.0]]);
    let err = model.predict(&input).unwrap_err();
    assert!(matches!(
        err,
        PredictError::InvalidInput(InputError::NotRepresentable {
            dtype: DType::U8,
            ..
        })
    ));
    assert!(err.is_client_error());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn ragged_input_never_reaches_the_engine() {
    let (engine, calls) = SumEngine::new(vec![None, Some(2)]);
    let mut model = ModelWrapper::new("m", "t", engine);

    let input = NestedList::from(vec![vec![1.0_f64, 2.0], vec![3.0]]);
    let err = model.predict(&input).unwrap_err();
    assert!(matches!(err, PredictError::InvalidInput(_)));
    assert!(err.is_client_error());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_engine_is_an_explicit_error() {
    let mut model = ModelWrapper::without_engine("sentiment", "v1");
    assert!(model.engine().is_none());

    let err = model.predict(&rows(1, 10)).unwrap_err();
    assert!(matches!(err, PredictError::EngineMissing { .. }));
    assert!(!err.is_client_error());
    assert_eq!(
        err.to_string(),
        "model Model(name=sentiment, tag=v1) has no engine attached"
    );
}

#[test]
fn engine_failures_propagate() {
    let (mut engine, _) = SumEngine::new(vec![None, Some(2)]);
    engine.fail = true;
    let mut model = ModelWrapper::new("m", "t", engine);

    let err = model.predict(&rows(2, 2)).unwrap_err();
    assert!(matches!(err, PredictError::Engine(_)));
    assert!(!err.is_client_error());
    assert!(err.to_string().contains("device lost"));
}

#[test]
fn info_is_name_and_tag_only() -> Result<()> {
    let (engine, _) = SumEngine::new(vec![None, Some(10)]);
    let mut model = ModelWrapper::new("sentiment", "v1", engine);

    let before = model.info();
    let _ = model.predict(&rows(2, 10))?;
    let _ = model.predict(&rows(2, 3));
    assert_eq!(model.info(), before);

    assert_eq!(
        serde_json::to_string(&model.info())?,
        r#"{"name":"sentiment","tag":"v1"}"#
    );
    Ok(())
}

#[test]
fn display_names_the_model() {
    let model = ModelWrapper::without_engine("sentiment", "v1");
    assert_eq!(model.to_string(), "Model(name=sentiment, tag=v1)");
    assert_eq!(model.name(), "sentiment");
    assert_eq!(model.tag(), "v1");
}

#[test]
fn predict_tensor_validates_too() -> Result<()> {
    let (engine, _) = SumEngine::new(vec![None, Some(3)]);
    let mut model = ModelWrapper::new("m", "t", engine);

    let ok = Tensor::from_values(Shape::from_slice(&[2, 3]), &[1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0])?;
    let out = model.predict_tensor(ok)?;
    assert_eq!(out.values::<f32>()?, vec![6.0, 3.0, 15.0, 3.0]);

    let bad = Tensor::from_values(Shape::from_slice(&[1, 4]), &[0.0_f32; 4])?;
    assert!(model.predict_tensor(bad).is_err());
    Ok(())
}

use anyhow::anyhow;
use modelwrap_core::{InputError, Shape};

use crate::{PredictError, ShapeMismatch};

/// Compares the per-example dims of `actual` with the declared input shape.
///
/// Both shapes lead with a batch dimension, which is never compared. The
/// remaining dims must agree in count and, position by position, in size.
///
/// This is exact tuple equality except for dims the engine leaves
/// unspecified: a `None` declared dim (e.g. a symbolic ONNX sequence length)
/// matches any size at its position. Fixed dims and the dim count are always
/// compared exactly.
pub fn check_input_shape(declared: &[Option<usize>], actual: &Shape) -> Result<(), PredictError> {
    if actual.rank() == 0 {
        return Err(InputError::MissingBatchDimension.into());
    }
    let Some((_batch, expected)) = declared.split_first() else {
        return Err(PredictError::Engine(anyhow!(
            "engine declares an input without a batch dimension"
        )));
    };

    let actual = actual.trailing();
    let matches = expected.len() == actual.len()
        && expected
            .iter()
            .zip(actual)
            .all(|(want, got)| want.map_or(true, |want| want == *got));

    if matches {
        Ok(())
    } else {
        Err(ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
        .into())
    }
}

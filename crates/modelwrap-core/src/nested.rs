//! Plain nested-list values exchanged with callers.
//!
//! A [`NestedList`] is what a caller hands to a model and what it gets back:
//! ordinary numbers in ordinary ordered lists, no tensor types. Converting to a
//! [`Tensor`] requires the value to be homogeneous (every sibling list at a
//! given depth has the same length), the same way an n-d array would be.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{DType, Shape, Tensor};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NestedList {
    Number(f64),
    List(Vec<NestedList>),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error("ragged input at depth {depth}: expected {expected} elements, found {found}")]
    Ragged {
        depth: usize,
        expected: usize,
        found: usize,
    },
    #[error("input mixes numbers and lists at depth {depth}")]
    MixedDepth { depth: usize },
    #[error("input has no batch dimension")]
    MissingBatchDimension,
    #[error("unsupported input dtype {0}")]
    UnsupportedDType(DType),
    #[error("{value} is not representable as {dtype}")]
    NotRepresentable { value: f64, dtype: DType },
}

impl NestedList {
    pub fn as_list(&self) -> Option<&[NestedList]> {
        match self {
            NestedList::List(items) => Some(items.as_slice()),
            NestedList::Number(_) => None,
        }
    }

    /// Shape of a homogeneous value. Fails on ragged or mixed nesting.
    pub fn shape(&self) -> Result<Shape, InputError> {
        let mut dims: SmallVec<[usize; 6]> = SmallVec::new();
        let mut node = self;
        while let NestedList::List(items) = node {
            dims.push(items.len());
            match items.first() {
                Some(first) => node = first,
                None => break,
            }
        }

        self.check(&dims, 0)?;
        Ok(Shape(dims))
    }

    fn check(&self, dims: &[usize], depth: usize) -> Result<(), InputError> {
        match (self, dims.split_first()) {
            (NestedList::Number(_), None) => Ok(()),
            (NestedList::List(items), Some((&len, rest))) => {
                if items.len() != len {
                    return Err(InputError::Ragged {
                        depth,
                        expected: len,
                        found: items.len(),
                    });
                }
                items.iter().try_for_each(|item| item.check(rest, depth + 1))
            }
            _ => Err(InputError::MixedDepth { depth }),
        }
    }

    fn flatten_into(&self, out: &mut Vec<f64>) {
        match self {
            NestedList::Number(n) => out.push(*n),
            NestedList::List(items) => items.iter().for_each(|item| item.flatten_into(out)),
        }
    }

    /// Packs the value into a row-major tensor of `dtype`, keeping its shape.
    ///
    /// Values are never clamped or truncated: a fraction, an out-of-range
    /// number or a non-finite one fails with [`InputError::NotRepresentable`].
    pub fn to_tensor(&self, dtype: DType) -> Result<Tensor, InputError> {
        if dtype == DType::F16 {
            return Err(InputError::UnsupportedDType(dtype));
        }
        let shape = self.shape()?;
        let mut values = Vec::with_capacity(shape.numel());
        self.flatten_into(&mut values);
        if let Some(&value) = values.iter().find(|v| !dtype.can_represent(**v)) {
            return Err(InputError::NotRepresentable { value, dtype });
        }
        Tensor::from_f64(dtype, shape, &values).map_err(|_| InputError::UnsupportedDType(dtype))
    }

    /// Unpacks a tensor into lists nested exactly like its shape.
    pub fn from_tensor(tensor: &Tensor) -> anyhow::Result<Self> {
        let values = tensor.to_f64_vec()?;
        let mut values = values.into_iter();
        Ok(build(tensor.shape().dims(), &mut values))
    }
}

fn build(dims: &[usize], values: &mut impl Iterator<Item = f64>) -> NestedList {
    match dims.split_first() {
        None => NestedList::Number(values.next().unwrap_or_default()),
        Some((&len, rest)) => NestedList::List((0..len).map(|_| build(rest, values)).collect()),
    }
}

impl From<f64> for NestedList {
    fn from(value: f64) -> Self {
        NestedList::Number(value)
    }
}

impl From<f32> for NestedList {
    fn from(value: f32) -> Self {
        NestedList::Number(value.into())
    }
}

impl<T: Into<NestedList>> From<Vec<T>> for NestedList {
    fn from(items: Vec<T>) -> Self {
        NestedList::List(items.into_iter().map(Into::into).collect())
    }
}

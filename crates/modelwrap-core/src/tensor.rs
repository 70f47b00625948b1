use std::fmt;

use anyhow::{bail, ensure, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use smallvec::SmallVec;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda { device_id: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DType {
    F32,
    F16,
    I64,
    I32,
    U8,
}

impl DType {
    pub fn byte_size(self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F16 => 2,
            DType::I64 => 8,
            DType::I32 => 4,
            DType::U8 => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F16 => "f16",
            DType::I64 => "i64",
            DType::I32 => "i32",
            DType::U8 => "u8",
        }
    }

    /// Whether `value` converts to this dtype without loss of range or
    /// fraction. Integer dtypes take only whole, in-range values.
    pub fn can_represent(self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        let (min, max_exclusive) = match self {
            DType::F32 => return (value as f32).is_finite(),
            DType::F16 => return false,
            DType::I64 => (i64::MIN as f64, -(i64::MIN as f64)),
            DType::I32 => (i32::MIN as f64, i32::MAX as f64 + 1.0),
            DType::U8 => (0.0, 256.0),
        };
        value.fract() == 0.0 && value >= min && value < max_exclusive
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shape(pub SmallVec<[usize; 6]>);

impl Shape {
    pub fn from_slice(d: &[usize]) -> Self {
        Self(d.iter().copied().collect())
    }
    pub fn dims(&self) -> &[usize] {
        &self.0
    }
    pub fn rank(&self) -> usize {
        self.0.len()
    }
    /// Element count. A rank-0 shape holds a single scalar.
    pub fn numel(&self) -> usize {
        self.0.iter().product::<usize>()
    }
    pub fn batch_size(&self) -> Option<usize> {
        self.0.first().copied()
    }
    /// Per-example dimensions, i.e. everything after the batch dimension.
    pub fn trailing(&self) -> &[usize] {
        self.0.get(1..).unwrap_or(&[])
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0.as_slice())
    }
}

/// Scalar types a [`Tensor`] can hold. Storage is always little-endian.
pub trait Element: Copy + Sized {
    const DTYPE: DType;

    fn put(self, buf: &mut BytesMut);
    fn get(buf: &mut &[u8]) -> Self;
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $dtype:ident, $put:ident, $get:ident) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$dtype;

            fn put(self, buf: &mut BytesMut) {
                buf.$put(self);
            }
            fn get(buf: &mut &[u8]) -> Self {
                buf.$get()
            }
            fn to_f64(self) -> f64 {
                self as f64
            }
            fn from_f64(value: f64) -> Self {
                value as $ty
            }
        }
    };
}

impl_element!(f32, F32, put_f32_le, get_f32_le);
impl_element!(i64, I64, put_i64_le, get_i64_le);
impl_element!(i32, I32, put_i32_le, get_i32_le);
impl_element!(u8, U8, put_u8, get_u8);

#[derive(Clone, Debug)]
pub struct TensorDesc {
    pub dtype: DType,
    pub shape: Shape,
}

/// Dense, row-major tensor backed by CPU bytes.
#[derive(Clone, Debug)]
pub struct Tensor {
    pub desc: TensorDesc,
    pub bytes: Bytes,
}

impl Tensor {
    pub fn from_bytes(dtype: DType, shape: Shape, bytes: Bytes) -> Result<Self> {
        let expected = shape.numel() * dtype.byte_size();
        ensure!(
            bytes.len() == expected,
            "tensor byte size mismatch: got {}, expected {} for {dtype} {shape}",
            bytes.len(),
            expected
        );
        Ok(Self {
            desc: TensorDesc { dtype, shape },
            bytes,
        })
    }

    pub fn from_values<T: Element>(shape: Shape, values: &[T]) -> Result<Self> {
        ensure!(
            values.len() == shape.numel(),
            "{} values do not fill shape {shape}",
            values.len()
        );
        let mut buf = BytesMut::with_capacity(std::mem::size_of_val(values));
        for value in values {
            value.put(&mut buf);
        }
        Self::from_bytes(T::DTYPE, shape, buf.freeze())
    }

    /// Builds a tensor of `dtype`. Every value must be representable in it.
    pub fn from_f64(dtype: DType, shape: Shape, values: &[f64]) -> Result<Self> {
        if dtype == DType::F16 {
            bail!("f16 tensors are not supported yet");
        }
        if let Some(value) = values.iter().find(|v| !dtype.can_represent(**v)) {
            bail!("{value} is not representable as {dtype}");
        }
        match dtype {
            DType::F32 => Self::from_values(shape, &cast::<f32>(values)),
            DType::I64 => Self::from_values(shape, &cast::<i64>(values)),
            DType::I32 => Self::from_values(shape, &cast::<i32>(values)),
            DType::U8 => Self::from_values(shape, &cast::<u8>(values)),
            DType::F16 => bail!("f16 tensors are not supported yet"),
        }
    }

    pub fn dtype(&self) -> DType {
        self.desc.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.desc.shape
    }

    pub fn values<T: Element>(&self) -> Result<Vec<T>> {
        ensure!(
            self.desc.dtype == T::DTYPE,
            "tensor holds {}, not {}",
            self.desc.dtype,
            T::DTYPE
        );
        let numel = self.desc.shape.numel();
        ensure!(
            self.bytes.len() == numel * T::DTYPE.byte_size(),
            "{} tensor has invalid byte length {}",
            T::DTYPE,
            self.bytes.len()
        );
        let mut buf = &self.bytes[..];
        Ok((0..numel).map(|_| T::get(&mut buf)).collect())
    }

    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        fn widen<T: Element>(values: Vec<T>) -> Vec<f64> {
            values.into_iter().map(Element::to_f64).collect()
        }

        match self.desc.dtype {
            DType::F32 => self.values::<f32>().map(widen),
            DType::I64 => self.values::<i64>().map(widen),
            DType::I32 => self.values::<i32>().map(widen),
            DType::U8 => self.values::<u8>().map(widen),
            DType::F16 => bail!("f16 tensors are not supported yet"),
        }
    }
}

fn cast<T: Element>(values: &[f64]) -> Vec<T> {
    values.iter().copied().map(T::from_f64).collect()
}

//! Data types and typed scalars
//!
//! Tensors carry one of two fixed-width float dtypes. Scalars coerced to a
//! tensor's dtype are kept in a tagged [`Scalar`] so the width travels with
//! the value.

use std::fmt;

/// Supported tensor data types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DType {
    /// 32-bit floating point (default)
    #[default]
    F32 = 0,
    /// 64-bit floating point
    F64 = 1,
}

impl DType {
    /// Returns the name of this dtype as a string
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single value already cast to a concrete dtype
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    F32(f32),
    F64(f64),
}

impl Scalar {
    /// Cast `value` to the scalar type of `dtype`
    #[must_use]
    pub fn cast(dtype: DType, value: f64) -> Self {
        match dtype {
            DType::F32 => Scalar::F32(value as f32),
            DType::F64 => Scalar::F64(value),
        }
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Scalar::F32(_) => DType::F32,
            Scalar::F64(_) => DType::F64,
        }
    }

    #[must_use]
    pub fn to_f64(&self) -> f64 {
        match *self {
            Scalar::F32(v) => f64::from(v),
            Scalar::F64(v) => v,
        }
    }

    /// Natural log, computed in the scalar's own width
    #[must_use]
    pub fn ln(&self) -> Self {
        match *self {
            Scalar::F32(v) => Scalar::F32(v.ln()),
            Scalar::F64(v) => Scalar::F64(v.ln()),
        }
    }
}

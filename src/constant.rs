//! Constant operands and dtype coercion
//!
//! A constant never enters the backward graph. At forward time it is
//! coerced to the dtype of the tensor it meets ([`force_type`]), and the
//! coerced form is what the kernels see.

use crate::backend::{self, Arg};
use crate::dtype::{DType, Scalar};
use crate::error::{EmberError, Result};
use crate::ops::kernels;
use crate::tensor::Tensor;

/// A non-differentiable operand: a plain number or a whole array
#[derive(Clone, Debug)]
pub enum Constant {
    Scalar(f64),
    Array(Tensor),
}

impl From<f64> for Constant {
    fn from(v: f64) -> Self {
        Constant::Scalar(v)
    }
}

impl From<f32> for Constant {
    fn from(v: f32) -> Self {
        Constant::Scalar(f64::from(v))
    }
}

impl From<i32> for Constant {
    fn from(v: i32) -> Self {
        Constant::Scalar(f64::from(v))
    }
}

impl From<Tensor> for Constant {
    fn from(t: Tensor) -> Self {
        Constant::Array(t)
    }
}

impl Constant {
    /// How the constant appears in operator labels
    pub fn render(&self) -> String {
        match self {
            Constant::Scalar(v) => format!("{v:?}"),
            Constant::Array(_) => "constant array".to_string(),
        }
    }

    /// `-c`, elementwise for arrays
    pub fn negated(&self) -> Result<Constant> {
        match self {
            Constant::Scalar(v) => Ok(Constant::Scalar(-v)),
            Constant::Array(t) => Ok(Constant::Array(
                backend::select(&[t])?.elementwise(&kernels::NEG, &[Arg::Tensor(t)])?,
            )),
        }
    }

    /// `1 / c`, elementwise for arrays
    pub fn reciprocal(&self) -> Result<Constant> {
        match self {
            Constant::Scalar(v) => Ok(Constant::Scalar(1.0 / v)),
            Constant::Array(t) => Ok(Constant::Array(
                backend::select(&[t])?.elementwise(&kernels::RECIP, &[Arg::Tensor(t)])?,
            )),
        }
    }
}

/// A constant after coercion to a concrete dtype
#[derive(Clone, Debug)]
pub enum Coerced {
    Scalar(Scalar),
    Array(Tensor),
}

impl Coerced {
    pub fn as_arg(&self) -> Arg<'_> {
        match self {
            Coerced::Scalar(s) => Arg::Scalar(*s),
            Coerced::Array(t) => Arg::Tensor(t),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Coerced::Scalar(s) => s.dtype(),
            Coerced::Array(t) => t.dtype(),
        }
    }
}

/// Coerce `value` to `dtype`
///
/// Scalars are cast; arrays pass through unchanged.
///
/// # Errors
/// `UnsupportedConstantType` for an array of a different dtype
pub fn force_type(dtype: DType, value: &Constant) -> Result<Coerced> {
    match value {
        Constant::Scalar(v) => Ok(Coerced::Scalar(Scalar::cast(dtype, *v))),
        Constant::Array(t) if t.dtype() == dtype => Ok(Coerced::Array(t.clone())),
        Constant::Array(t) => Err(EmberError::UnsupportedConstantType(format!(
            "array of {} cannot combine with {dtype} data",
            t.dtype()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_cast_to_tensor_dtype() {
        match force_type(DType::F32, &Constant::from(0.1)).unwrap() {
            Coerced::Scalar(Scalar::F32(v)) => assert_eq!(v, 0.1f32),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            force_type(DType::F64, &Constant::from(2)).unwrap().dtype(),
            DType::F64
        );
    }

    #[test]
    fn test_array_passes_through() {
        let t = Tensor::new(vec![1.0, 2.0], &[2]).unwrap();
        match force_type(DType::F32, &Constant::from(t)).unwrap() {
            Coerced::Array(a) => assert_eq!(a.to_vec().unwrap(), vec![1.0, 2.0]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_incompatible_array_rejected() {
        let t = Tensor::new_f64(vec![1.0], &[1]).unwrap();
        assert!(matches!(
            force_type(DType::F32, &Constant::from(t)),
            Err(EmberError::UnsupportedConstantType(_))
        ));
    }

    #[test]
    fn test_render() {
        assert_eq!(Constant::from(2.0).render(), "2.0");
        assert_eq!(Constant::from(-0.5).render(), "-0.5");
        assert_eq!(
            Constant::from(Tensor::scalar(1.0)).render(),
            "constant array"
        );
    }

    #[test]
    fn test_negated_and_reciprocal() {
        let t = Tensor::new(vec![2.0, -4.0], &[2]).unwrap();
        let c = Constant::from(t);
        match c.negated().unwrap() {
            Constant::Array(n) => assert_eq!(n.to_vec().unwrap(), vec![-2.0, 4.0]),
            other => panic!("unexpected {other:?}"),
        }
        match c.reciprocal().unwrap() {
            Constant::Array(r) => assert_eq!(r.to_vec().unwrap(), vec![0.5, -0.25]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            Constant::from(4.0).reciprocal().unwrap(),
            Constant::Scalar(v) if v == 0.25
        ));
    }
}

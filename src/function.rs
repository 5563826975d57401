//! The operator contract
//!
//! Every differentiable primitive implements [`Function`]. A call goes
//! through the [`forward`] / [`backward`] drivers, which:
//! 1. run the operator's type checks against the inputs
//! 2. pick the [`Backend`] from where the inputs live
//! 3. call the operator
//!
//! Whatever forward needs to hand to backward (cached outputs, the coerced
//! constant) travels in a [`Context`], which backward consumes by value.

use tracing::trace;

use crate::backend::{self, Backend};
use crate::constant::Coerced;
use crate::dtype::DType;
use crate::error::{EmberError, Result};
use crate::tensor::Tensor;

/// Dtype and shape of one operand, as seen by type checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub dtype: DType,
    pub shape: Vec<usize>,
}

/// A differentiable primitive operator
pub trait Function {
    /// Stable identifier, also stamped on the forward context
    fn name(&self) -> &'static str;

    /// Human readable form, e.g. `_ + 2.0`
    fn label(&self) -> String {
        self.name().to_string()
    }

    /// # Errors
    /// `TypeConstraint` when the inputs violate the operator's constraints
    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()>;

    fn check_type_backward(&self, _inputs: &[TypeInfo], _grad_outputs: &[TypeInfo]) -> Result<()> {
        Ok(())
    }

    /// Compute the outputs and the context backward will need
    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)>;

    /// Gradient with respect to each input, in input order
    fn backward(
        &self,
        xp: &dyn Backend,
        inputs: &[&Tensor],
        grad_outputs: &[&Tensor],
        ctx: Context,
    ) -> Result<Vec<Tensor>>;
}

// ===== CONTEXT =====

/// State carried from one forward call to the matching backward call
///
/// Not `Clone`: backward takes it by value, so each context drives at most
/// one backward.
#[derive(Debug)]
pub struct Context {
    function: &'static str,
    saved: Vec<Tensor>,
    constant: Option<Coerced>,
}

impl Context {
    pub fn new(function: &'static str) -> Self {
        Context {
            function,
            saved: Vec::new(),
            constant: None,
        }
    }

    /// Keep a tensor for backward
    pub fn save(mut self, tensor: Tensor) -> Self {
        self.saved.push(tensor);
        self
    }

    /// Keep the constant as coerced at forward time
    pub fn with_constant(mut self, constant: Coerced) -> Self {
        self.constant = Some(constant);
        self
    }

    /// Name of the operator whose forward produced this context
    pub fn function(&self) -> &'static str {
        self.function
    }

    /// # Errors
    /// `ContextMismatch` if the context came from another operator
    pub fn verify(&self, expected: &'static str) -> Result<()> {
        if self.function == expected {
            Ok(())
        } else {
            Err(EmberError::ContextMismatch {
                expected,
                actual: self.function,
            })
        }
    }

    pub fn saved(&self, index: usize) -> Result<&Tensor> {
        self.saved
            .get(index)
            .ok_or(EmberError::MissingContext("saved tensor"))
    }

    pub fn constant(&self) -> Result<&Coerced> {
        self.constant
            .as_ref()
            .ok_or(EmberError::MissingContext("constant"))
    }
}

// ===== DRIVERS =====

fn type_infos(tensors: &[&Tensor]) -> Vec<TypeInfo> {
    tensors.iter().map(|t| t.type_info()).collect()
}

/// Type-check and run `f`'s forward on the backend owning `inputs`
///
/// # Errors
/// Type violations, mixed residency, or backend failures.
pub fn forward(f: &dyn Function, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
    f.check_type_forward(&type_infos(inputs))?;
    let xp = backend::select(inputs)?;
    trace!(function = f.name(), backend = xp.name(), "forward");
    f.forward(xp, inputs)
}

/// Type-check and run `f`'s backward with a context from its own forward
///
/// # Errors
/// `ContextMismatch` for a foreign context, plus everything [`forward`]
/// can return.
pub fn backward(
    f: &dyn Function,
    inputs: &[&Tensor],
    grad_outputs: &[&Tensor],
    ctx: Context,
) -> Result<Vec<Tensor>> {
    let xp = prepare_backward(f, inputs, grad_outputs)?;
    run_backward(f, xp, inputs, grad_outputs, ctx)
}

/// The checks of [`backward`] that need no context: type constraints and
/// backend selection
///
/// A caller holding a one-shot context runs this first so a rejected call
/// leaves the context in place.
pub(crate) fn prepare_backward(
    f: &dyn Function,
    inputs: &[&Tensor],
    grad_outputs: &[&Tensor],
) -> Result<&'static dyn Backend> {
    f.check_type_backward(&type_infos(inputs), &type_infos(grad_outputs))?;
    let all: Vec<&Tensor> = inputs.iter().chain(grad_outputs).copied().collect();
    backend::select(&all)
}

pub(crate) fn run_backward(
    f: &dyn Function,
    xp: &dyn Backend,
    inputs: &[&Tensor],
    grad_outputs: &[&Tensor],
    ctx: Context,
) -> Result<Vec<Tensor>> {
    ctx.verify(f.name())?;
    trace!(function = f.name(), backend = xp.name(), "backward");
    f.backward(xp, inputs, grad_outputs, ctx)
}

// ===== TYPE CHECK HELPERS =====

fn violation(function: &str, reason: String) -> EmberError {
    EmberError::TypeConstraint {
        function: function.to_string(),
        reason,
    }
}

pub fn expect_arity(function: &str, what: &str, infos: &[TypeInfo], n: usize) -> Result<()> {
    if infos.len() == n {
        Ok(())
    } else {
        Err(violation(
            function,
            format!("expected {n} {what}, got {}", infos.len()),
        ))
    }
}

pub fn expect_dtype(function: &str, info: &TypeInfo, dtype: DType) -> Result<()> {
    if info.dtype == dtype {
        Ok(())
    } else {
        Err(violation(
            function,
            format!("expected dtype {dtype}, got {}", info.dtype),
        ))
    }
}

pub fn expect_same_dtype(function: &str, a: &TypeInfo, b: &TypeInfo) -> Result<()> {
    if a.dtype == b.dtype {
        Ok(())
    } else {
        Err(violation(
            function,
            format!("dtypes differ: {} vs {}", a.dtype, b.dtype),
        ))
    }
}

pub fn expect_same_shape(function: &str, a: &TypeInfo, b: &TypeInfo) -> Result<()> {
    if a.shape == b.shape {
        Ok(())
    } else {
        Err(violation(
            function,
            format!("shapes differ: {:?} vs {:?}", a.shape, b.shape),
        ))
    }
}

/// Destructure a tensor slice into a fixed-size array
pub(crate) fn unpack<'a, const N: usize>(
    function: &str,
    tensors: &[&'a Tensor],
) -> Result<[&'a Tensor; N]> {
    <[&'a Tensor; N]>::try_from(tensors).map_err(|_| {
        violation(
            function,
            format!("expected {N} tensors, got {}", tensors.len()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(dtype: DType, shape: &[usize]) -> TypeInfo {
        TypeInfo {
            dtype,
            shape: shape.to_vec(),
        }
    }

    #[test]
    fn test_context_verify() {
        let ctx = Context::new("add");
        assert!(ctx.verify("add").is_ok());
        assert!(matches!(
            ctx.verify("mul"),
            Err(EmberError::ContextMismatch {
                expected: "mul",
                actual: "add"
            })
        ));
    }

    #[test]
    fn test_context_slots() {
        let ctx = Context::new("exp").save(Tensor::scalar(3.0));
        assert_eq!(ctx.saved(0).unwrap().to_vec().unwrap(), vec![3.0]);
        assert!(matches!(ctx.saved(1), Err(EmberError::MissingContext(_))));
        assert!(matches!(ctx.constant(), Err(EmberError::MissingContext(_))));
    }

    #[test]
    fn test_checks_name_the_operator() {
        let a = info(DType::F32, &[2]);
        let b = info(DType::F64, &[3]);
        let err = expect_same_dtype("_ + _", &a, &b).unwrap_err();
        assert!(err.to_string().contains("_ + _"));
        assert!(expect_same_shape("_ + _", &a, &b).is_err());
        assert!(expect_dtype("_ * _", &a, DType::F32).is_ok());
        assert!(expect_arity("exp", "inputs", &[a], 1).is_ok());
    }

    #[test]
    fn test_unpack() {
        let a = Tensor::scalar(1.0);
        let b = Tensor::scalar(2.0);
        let [x, y] = unpack::<2>("f", &[&a, &b]).unwrap();
        assert_eq!(x.to_vec().unwrap(), vec![1.0]);
        assert_eq!(y.to_vec().unwrap(), vec![2.0]);
        assert!(unpack::<1>("f", &[&a, &b]).is_err());
    }
}

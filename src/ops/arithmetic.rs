//! Elementwise arithmetic operators
//!
//! Derivatives:
//! - Neg: d(-x)/dx = -1
//! - Absolute: d|x|/dx = sign(x), with sign(0) = 0
//! - Add / Sub: ±1 for each operand
//! - Mul: d(x0·x1)/dx0 = x1, d(x0·x1)/dx1 = x0
//! - Div: d(x0/x1)/dx0 = 1/x1, d(x0/x1)/dx1 = -x0/x1²
//! - Pow: d(x0^x1)/dx0 = x1·x0^(x1-1), d(x0^x1)/dx1 = ln(x0)·x0^x1
//!
//! The `*Constant` and `*FromConstant` variants take one tensor and a
//! [`Constant`] coerced to the tensor's dtype at forward time.

use super::kernels::{
    ABS, ABS_BWD, ADD, COPY, DIV, DIV_BWD_X1, DIV_FROM_CONST_BWD, LOG, MUL, NEG, POW, POW_CV_BWD,
    POW_VC_BWD, POW_VV_BWD_X0, POW_VV_BWD_X1, SUB,
};
use crate::backend::{Arg, Backend};
use crate::constant::{Coerced, Constant, force_type};
use crate::dtype::DType;
use crate::error::Result;
use crate::function::{
    Context, Function, TypeInfo, expect_arity, expect_dtype, expect_same_dtype, expect_same_shape,
    unpack,
};
use crate::tensor::Tensor;

fn check_unary(label: &str, inputs: &[TypeInfo]) -> Result<()> {
    expect_arity(label, "inputs", inputs, 1)
}

/// Two operands of equal shape and equal dtype
fn check_binary(label: &str, inputs: &[TypeInfo]) -> Result<()> {
    expect_arity(label, "inputs", inputs, 2)?;
    expect_same_dtype(label, &inputs[0], &inputs[1])?;
    expect_same_shape(label, &inputs[0], &inputs[1])
}

/// Two f32 operands of equal shape
fn check_binary_f32(label: &str, inputs: &[TypeInfo]) -> Result<()> {
    expect_arity(label, "inputs", inputs, 2)?;
    expect_dtype(label, &inputs[0], DType::F32)?;
    expect_dtype(label, &inputs[1], DType::F32)?;
    expect_same_shape(label, &inputs[0], &inputs[1])
}

/// Forward of a one-tensor-one-constant operator: coerce, run, remember the constant
fn constant_forward(
    name: &'static str,
    inputs: &[&Tensor],
    value: &Constant,
    run: impl FnOnce(&Tensor, &Coerced) -> Result<Tensor>,
) -> Result<(Vec<Tensor>, Context)> {
    let [x] = unpack::<1>(name, inputs)?;
    let c = force_type(x.dtype(), value)?;
    let y = run(x, &c)?;
    Ok((vec![y], Context::new(name).with_constant(c)))
}

// ===== NEG / ABSOLUTE =====

/// `y = -x`
#[derive(Debug, Clone, Copy, Default)]
pub struct Neg;

impl Function for Neg {
    fn name(&self) -> &'static str {
        "neg"
    }

    fn label(&self) -> String {
        "__neg__".to_string()
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        check_unary(&self.label(), inputs)
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        let [x] = unpack::<1>(self.name(), inputs)?;
        let y = xp.elementwise(&NEG, &[x.into()])?;
        Ok((vec![y], Context::new(self.name())))
    }

    fn backward(
        &self,
        xp: &dyn Backend,
        _inputs: &[&Tensor],
        grad_outputs: &[&Tensor],
        _ctx: Context,
    ) -> Result<Vec<Tensor>> {
        let [gy] = unpack::<1>(self.name(), grad_outputs)?;
        Ok(vec![xp.elementwise(&NEG, &[gy.into()])?])
    }
}

/// `y = |x|`
#[derive(Debug, Clone, Copy, Default)]
pub struct Absolute;

impl Function for Absolute {
    fn name(&self) -> &'static str {
        "absolute"
    }

    fn label(&self) -> String {
        "|_|".to_string()
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        check_unary(&self.label(), inputs)
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        let [x] = unpack::<1>(self.name(), inputs)?;
        let y = xp.elementwise(&ABS, &[x.into()])?;
        Ok((vec![y], Context::new(self.name())))
    }

    fn backward(
        &self,
        xp: &dyn Backend,
        inputs: &[&Tensor],
        grad_outputs: &[&Tensor],
        _ctx: Context,
    ) -> Result<Vec<Tensor>> {
        let [x] = unpack::<1>(self.name(), inputs)?;
        let [gy] = unpack::<1>(self.name(), grad_outputs)?;
        Ok(vec![xp.elementwise(&ABS_BWD, &[x.into(), gy.into()])?])
    }
}

// ===== ADD =====

/// `y = x0 + x1`
#[derive(Debug, Clone, Copy, Default)]
pub struct Add;

impl Function for Add {
    fn name(&self) -> &'static str {
        "add"
    }

    fn label(&self) -> String {
        "_ + _".to_string()
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        check_binary(&self.label(), inputs)
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        let [x0, x1] = unpack::<2>(self.name(), inputs)?;
        let y = xp.elementwise(&ADD, &[x0.into(), x1.into()])?;
        Ok((vec![y], Context::new(self.name())))
    }

    fn backward(
        &self,
        xp: &dyn Backend,
        _inputs: &[&Tensor],
        grad_outputs: &[&Tensor],
        _ctx: Context,
    ) -> Result<Vec<Tensor>> {
        let [gy] = unpack::<1>(self.name(), grad_outputs)?;
        Ok(vec![
            xp.elementwise(&COPY, &[gy.into()])?,
            xp.elementwise(&COPY, &[gy.into()])?,
        ])
    }
}

/// `y = x + c`
#[derive(Debug, Clone)]
pub struct AddConstant {
    value: Constant,
}

impl AddConstant {
    pub fn new(value: impl Into<Constant>) -> Self {
        AddConstant {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &Constant {
        &self.value
    }
}

impl Function for AddConstant {
    fn name(&self) -> &'static str {
        "add_constant"
    }

    fn label(&self) -> String {
        format!("_ + {}", self.value.render())
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        check_unary(&self.label(), inputs)
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        constant_forward(self.name(), inputs, &self.value, |x, c| {
            xp.elementwise(&ADD, &[x.into(), c.as_arg()])
        })
    }

    fn backward(
        &self,
        xp: &dyn Backend,
        _inputs: &[&Tensor],
        grad_outputs: &[&Tensor],
        _ctx: Context,
    ) -> Result<Vec<Tensor>> {
        let [gy] = unpack::<1>(self.name(), grad_outputs)?;
        Ok(vec![xp.elementwise(&COPY, &[gy.into()])?])
    }
}

// ===== SUB =====

/// `y = x0 - x1`
#[derive(Debug, Clone, Copy, Default)]
pub struct Sub;

impl Function for Sub {
    fn name(&self) -> &'static str {
        "sub"
    }

    fn label(&self) -> String {
        "_ - _".to_string()
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        check_binary(&self.label(), inputs)
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        let [x0, x1] = unpack::<2>(self.name(), inputs)?;
        let y = xp.elementwise(&SUB, &[x0.into(), x1.into()])?;
        Ok((vec![y], Context::new(self.name())))
    }

    fn backward(
        &self,
        xp: &dyn Backend,
        _inputs: &[&Tensor],
        grad_outputs: &[&Tensor],
        _ctx: Context,
    ) -> Result<Vec<Tensor>> {
        let [gy] = unpack::<1>(self.name(), grad_outputs)?;
        Ok(vec![
            xp.elementwise(&COPY, &[gy.into()])?,
            xp.elementwise(&NEG, &[gy.into()])?,
        ])
    }
}

/// `y = c - x`
#[derive(Debug, Clone)]
pub struct SubFromConstant {
    value: Constant,
}

impl SubFromConstant {
    pub fn new(value: impl Into<Constant>) -> Self {
        SubFromConstant {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &Constant {
        &self.value
    }
}

impl Function for SubFromConstant {
    fn name(&self) -> &'static str {
        "sub_from_constant"
    }

    fn label(&self) -> String {
        format!("{} - _", self.value.render())
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        check_unary(&self.label(), inputs)
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        constant_forward(self.name(), inputs, &self.value, |x, c| {
            xp.elementwise(&SUB, &[c.as_arg(), x.into()])
        })
    }

    fn backward(
        &self,
        xp: &dyn Backend,
        _inputs: &[&Tensor],
        grad_outputs: &[&Tensor],
        _ctx: Context,
    ) -> Result<Vec<Tensor>> {
        let [gy] = unpack::<1>(self.name(), grad_outputs)?;
        Ok(vec![xp.elementwise(&NEG, &[gy.into()])?])
    }
}

// ===== MUL =====

/// `y = x0 * x1` (f32 only)
#[derive(Debug, Clone, Copy, Default)]
pub struct Mul;

impl Function for Mul {
    fn name(&self) -> &'static str {
        "mul"
    }

    fn label(&self) -> String {
        "_ * _".to_string()
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        check_binary_f32(&self.label(), inputs)
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        let [x0, x1] = unpack::<2>(self.name(), inputs)?;
        let y = xp.elementwise(&MUL, &[x0.into(), x1.into()])?;
        Ok((vec![y], Context::new(self.name())))
    }

    fn backward(
        &self,
        xp: &dyn Backend,
        inputs: &[&Tensor],
        grad_outputs: &[&Tensor],
        _ctx: Context,
    ) -> Result<Vec<Tensor>> {
        let [x0, x1] = unpack::<2>(self.name(), inputs)?;
        let [gy] = unpack::<1>(self.name(), grad_outputs)?;
        Ok(vec![
            xp.elementwise(&MUL, &[gy.into(), x1.into()])?,
            xp.elementwise(&MUL, &[gy.into(), x0.into()])?,
        ])
    }
}

/// `y = c * x`
#[derive(Debug, Clone)]
pub struct MulConstant {
    value: Constant,
}

impl MulConstant {
    pub fn new(value: impl Into<Constant>) -> Self {
        MulConstant {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &Constant {
        &self.value
    }
}

impl Function for MulConstant {
    fn name(&self) -> &'static str {
        "mul_constant"
    }

    fn label(&self) -> String {
        format!("_ * {}", self.value.render())
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        check_unary(&self.label(), inputs)
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        constant_forward(self.name(), inputs, &self.value, |x, c| {
            xp.elementwise(&MUL, &[c.as_arg(), x.into()])
        })
    }

    fn backward(
        &self,
        xp: &dyn Backend,
        _inputs: &[&Tensor],
        grad_outputs: &[&Tensor],
        ctx: Context,
    ) -> Result<Vec<Tensor>> {
        let [gy] = unpack::<1>(self.name(), grad_outputs)?;
        let c = ctx.constant()?;
        Ok(vec![xp.elementwise(&MUL, &[c.as_arg(), gy.into()])?])
    }
}

// ===== DIV =====

/// `y = x0 / x1` (f32 only)
#[derive(Debug, Clone, Copy, Default)]
pub struct Div;

impl Function for Div {
    fn name(&self) -> &'static str {
        "div"
    }

    fn label(&self) -> String {
        "_ / _".to_string()
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        check_binary_f32(&self.label(), inputs)
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        let [x0, x1] = unpack::<2>(self.name(), inputs)?;
        let y = xp.elementwise(&DIV, &[x0.into(), x1.into()])?;
        Ok((vec![y], Context::new(self.name())))
    }

    fn backward(
        &self,
        xp: &dyn Backend,
        inputs: &[&Tensor],
        grad_outputs: &[&Tensor],
        _ctx: Context,
    ) -> Result<Vec<Tensor>> {
        let [x0, x1] = unpack::<2>(self.name(), inputs)?;
        let [gy] = unpack::<1>(self.name(), grad_outputs)?;
        let gx0 = xp.elementwise(&DIV, &[gy.into(), x1.into()])?;
        let gx1 = xp.elementwise(&DIV_BWD_X1, &[(&gx0).into(), x0.into(), x1.into()])?;
        Ok(vec![gx0, gx1])
    }
}

/// `y = c / x`
#[derive(Debug, Clone)]
pub struct DivFromConstant {
    value: Constant,
}

impl DivFromConstant {
    pub fn new(value: impl Into<Constant>) -> Self {
        DivFromConstant {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &Constant {
        &self.value
    }
}

impl Function for DivFromConstant {
    fn name(&self) -> &'static str {
        "div_from_constant"
    }

    fn label(&self) -> String {
        format!("{} / _", self.value.render())
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        check_unary(&self.label(), inputs)
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        constant_forward(self.name(), inputs, &self.value, |x, c| {
            xp.elementwise(&DIV, &[c.as_arg(), x.into()])
        })
    }

    fn backward(
        &self,
        xp: &dyn Backend,
        inputs: &[&Tensor],
        grad_outputs: &[&Tensor],
        ctx: Context,
    ) -> Result<Vec<Tensor>> {
        let [x] = unpack::<1>(self.name(), inputs)?;
        let [gy] = unpack::<1>(self.name(), grad_outputs)?;
        let c = ctx.constant()?;
        Ok(vec![xp.elementwise(
            &DIV_FROM_CONST_BWD,
            &[x.into(), gy.into(), c.as_arg()],
        )?])
    }
}

// ===== POW =====

/// `y = x0 ** x1` (f32 only)
#[derive(Debug, Clone, Copy, Default)]
pub struct PowVarVar;

impl Function for PowVarVar {
    fn name(&self) -> &'static str {
        "pow_var_var"
    }

    fn label(&self) -> String {
        "_ ** _".to_string()
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        check_binary_f32(&self.label(), inputs)
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        let [x0, x1] = unpack::<2>(self.name(), inputs)?;
        let y = xp.elementwise(&POW, &[x0.into(), x1.into()])?;
        let ctx = Context::new(self.name()).save(y.clone());
        Ok((vec![y], ctx))
    }

    fn backward(
        &self,
        xp: &dyn Backend,
        inputs: &[&Tensor],
        grad_outputs: &[&Tensor],
        ctx: Context,
    ) -> Result<Vec<Tensor>> {
        let [x0, x1] = unpack::<2>(self.name(), inputs)?;
        let [gy] = unpack::<1>(self.name(), grad_outputs)?;
        let y = ctx.saved(0)?;
        Ok(vec![
            xp.elementwise(&POW_VV_BWD_X0, &[x0.into(), x1.into(), gy.into()])?,
            xp.elementwise(&POW_VV_BWD_X1, &[x0.into(), y.into(), gy.into()])?,
        ])
    }
}

/// `y = x ** c`
#[derive(Debug, Clone)]
pub struct PowVarConst {
    value: Constant,
}

impl PowVarConst {
    pub fn new(value: impl Into<Constant>) -> Self {
        PowVarConst {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &Constant {
        &self.value
    }
}

impl Function for PowVarConst {
    fn name(&self) -> &'static str {
        "pow_var_const"
    }

    fn label(&self) -> String {
        format!("_ ** {}", self.value.render())
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        check_unary(&self.label(), inputs)
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        constant_forward(self.name(), inputs, &self.value, |x, c| {
            xp.elementwise(&POW, &[x.into(), c.as_arg()])
        })
    }

    fn backward(
        &self,
        xp: &dyn Backend,
        inputs: &[&Tensor],
        grad_outputs: &[&Tensor],
        ctx: Context,
    ) -> Result<Vec<Tensor>> {
        let [x] = unpack::<1>(self.name(), inputs)?;
        let [gy] = unpack::<1>(self.name(), grad_outputs)?;
        let c = ctx.constant()?;
        Ok(vec![xp.elementwise(
            &POW_VC_BWD,
            &[x.into(), gy.into(), c.as_arg()],
        )?])
    }
}

/// `y = c ** x`
///
/// The output is kept in the context, so backward is `ln(c) * y * gy`
/// without recomputing the power.
#[derive(Debug, Clone)]
pub struct PowConstVar {
    value: Constant,
}

impl PowConstVar {
    pub fn new(value: impl Into<Constant>) -> Self {
        PowConstVar {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &Constant {
        &self.value
    }
}

impl Function for PowConstVar {
    fn name(&self) -> &'static str {
        "pow_const_var"
    }

    fn label(&self) -> String {
        format!("{} ** _", self.value.render())
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        check_unary(&self.label(), inputs)
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        let [x] = unpack::<1>(self.name(), inputs)?;
        let c = force_type(x.dtype(), &self.value)?;
        let y = xp.elementwise(&POW, &[c.as_arg(), x.into()])?;
        let ctx = Context::new(self.name()).save(y.clone()).with_constant(c);
        Ok((vec![y], ctx))
    }

    fn backward(
        &self,
        xp: &dyn Backend,
        _inputs: &[&Tensor],
        grad_outputs: &[&Tensor],
        ctx: Context,
    ) -> Result<Vec<Tensor>> {
        let [gy] = unpack::<1>(self.name(), grad_outputs)?;
        let y = ctx.saved(0)?;
        let log_array;
        let logv = match ctx.constant()? {
            Coerced::Scalar(s) => Arg::Scalar(s.ln()),
            Coerced::Array(t) => {
                log_array = xp.elementwise(&LOG, &[t.into()])?;
                Arg::Tensor(&log_array)
            }
        };
        Ok(vec![xp.elementwise(&POW_CV_BWD, &[y.into(), gy.into(), logv])?])
    }
}

//! Elementwise exponential, logarithm, and trigonometric operators
//!
//! - Exp: d(eˣ)/dx = eˣ
//! - Log: d(ln(x))/dx = 1/x
//! - Sin: d(sin(x))/dx = cos(x)
//! - Cos: d(cos(x))/dx = -sin(x)

use super::kernels::{COS, COS_BWD, DIV, EXP, LOG, MUL, SIN, SIN_BWD};
use crate::backend::Backend;
use crate::error::Result;
use crate::function::{Context, Function, TypeInfo, expect_arity, unpack};
use crate::tensor::Tensor;

/// `y = exp(x)`; the output is kept for backward
#[derive(Debug, Clone, Copy, Default)]
pub struct Exp;

impl Function for Exp {
    fn name(&self) -> &'static str {
        "exp"
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        expect_arity("exp", "inputs", inputs, 1)
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        let [x] = unpack::<1>(self.name(), inputs)?;
        let y = xp.elementwise(&EXP, &[x.into()])?;
        let ctx = Context::new(self.name()).save(y.clone());
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
        Ok(vec![xp.elementwise(&MUL, &[y.into(), gy.into()])?])
    }
}

/// `y = ln(x)`
///
/// Non-positive inputs produce NaN or -inf, as does the gradient at zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct Log;

impl Function for Log {
    fn name(&self) -> &'static str {
        "log"
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        expect_arity("log", "inputs", inputs, 1)
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        let [x] = unpack::<1>(self.name(), inputs)?;
        let y = xp.elementwise(&LOG, &[x.into()])?;
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
        Ok(vec![xp.elementwise(&DIV, &[gy.into(), x.into()])?])
    }
}

/// `y = sin(x)`
#[derive(Debug, Clone, Copy, Default)]
pub struct Sin;

impl Function for Sin {
    fn name(&self) -> &'static str {
        "sin"
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        expect_arity("sin", "inputs", inputs, 1)
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        let [x] = unpack::<1>(self.name(), inputs)?;
        let y = xp.elementwise(&SIN, &[x.into()])?;
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
        Ok(vec![xp.elementwise(&SIN_BWD, &[x.into(), gy.into()])?])
    }
}

/// `y = cos(x)`
#[derive(Debug, Clone, Copy, Default)]
pub struct Cos;

impl Function for Cos {
    fn name(&self) -> &'static str {
        "cos"
    }

    fn check_type_forward(&self, inputs: &[TypeInfo]) -> Result<()> {
        expect_arity("cos", "inputs", inputs, 1)
    }

    fn forward(&self, xp: &dyn Backend, inputs: &[&Tensor]) -> Result<(Vec<Tensor>, Context)> {
        let [x] = unpack::<1>(self.name(), inputs)?;
        let y = xp.elementwise(&COS, &[x.into()])?;
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
        Ok(vec![xp.elementwise(&COS_BWD, &[x.into(), gy.into()])?])
    }
}

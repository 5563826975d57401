//! Operand resolution
//!
//! Picks the concrete operator for an arithmetic expression from what the
//! right-hand side is: another graph node selects the two-input operator,
//! a constant selects the one-input constant variant. Reflected forms
//! (`rsub`, `rdiv`, `rpow`) describe `rhs op lhs`.
//!
//! | op    | rhs graph           | rhs constant              |
//! |-------|---------------------|---------------------------|
//! | add   | `Add(lhs, rhs)`     | `AddConstant(c)(lhs)`     |
//! | sub   | `Sub(lhs, rhs)`     | `AddConstant(-c)(lhs)`    |
//! | rsub  | `Sub(rhs, lhs)`     | `SubFromConstant(c)(lhs)` |
//! | mul   | `Mul(lhs, rhs)`     | `MulConstant(c)(lhs)`     |
//! | div   | `Div(lhs, rhs)`     | `MulConstant(1/c)(lhs)`   |
//! | rdiv  | `Div(rhs, lhs)`     | `DivFromConstant(c)(lhs)` |
//! | pow   | `PowVarVar(lhs, rhs)` | `PowVarConst(c)(lhs)`   |
//! | rpow  | `PowVarVar(rhs, lhs)` | `PowConstVar(c)(lhs)`   |

use crate::constant::Constant;
use crate::error::Result;
use crate::function::Function;
use crate::ops::{
    Absolute, Add, AddConstant, Cos, Div, DivFromConstant, Exp, Gaussian, Log, Mul, MulConstant,
    Neg, PowConstVar, PowVarConst, PowVarVar, Sin, Sub, SubFromConstant,
};
use crate::tensor::Tensor;
use crate::variable::Variable;

/// Right-hand side of a binary expression
#[derive(Debug, Clone)]
pub enum Operand {
    Graph(Variable),
    Constant(Constant),
}

impl From<Variable> for Operand {
    fn from(v: Variable) -> Self {
        Operand::Graph(v)
    }
}

impl From<&Variable> for Operand {
    fn from(v: &Variable) -> Self {
        Operand::Graph(v.clone())
    }
}

impl From<Constant> for Operand {
    fn from(c: Constant) -> Self {
        Operand::Constant(c)
    }
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Constant(Constant::Scalar(v))
    }
}

impl From<f32> for Operand {
    fn from(v: f32) -> Self {
        Operand::Constant(v.into())
    }
}

impl From<i32> for Operand {
    fn from(v: i32) -> Self {
        Operand::Constant(v.into())
    }
}

/// A bare tensor is a constant array, not a graph node
impl From<Tensor> for Operand {
    fn from(t: Tensor) -> Self {
        Operand::Constant(Constant::Array(t))
    }
}

/// The operator chosen for an expression, and the nodes it will consume
pub struct Selection {
    pub function: Box<dyn Function>,
    pub inputs: Vec<Variable>,
}

impl Selection {
    fn new(function: impl Function + 'static, inputs: Vec<Variable>) -> Self {
        Selection {
            function: Box::new(function),
            inputs,
        }
    }

    pub fn label(&self) -> String {
        self.function.label()
    }

    pub fn apply(self) -> Result<Variable> {
        let inputs: Vec<&Variable> = self.inputs.iter().collect();
        Variable::apply(self.function, &inputs)
    }
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("function", &self.label())
            .field("inputs", &self.inputs.len())
            .finish()
    }
}

// ===== SELECTION =====

pub fn select_neg(x: &Variable) -> Selection {
    Selection::new(Neg, vec![x.clone()])
}

pub fn select_absolute(x: &Variable) -> Selection {
    Selection::new(Absolute, vec![x.clone()])
}

pub fn select_add(lhs: &Variable, rhs: Operand) -> Selection {
    match rhs {
        Operand::Graph(r) => Selection::new(Add, vec![lhs.clone(), r]),
        Operand::Constant(c) => Selection::new(AddConstant::new(c), vec![lhs.clone()]),
    }
}

/// # Errors
/// Negating an array constant runs a kernel, which can fail.
pub fn select_sub(lhs: &Variable, rhs: Operand) -> Result<Selection> {
    Ok(match rhs {
        Operand::Graph(r) => Selection::new(Sub, vec![lhs.clone(), r]),
        Operand::Constant(c) => Selection::new(AddConstant::new(c.negated()?), vec![lhs.clone()]),
    })
}

pub fn select_rsub(lhs: &Variable, rhs: Operand) -> Selection {
    match rhs {
        Operand::Graph(r) => Selection::new(Sub, vec![r, lhs.clone()]),
        Operand::Constant(c) => Selection::new(SubFromConstant::new(c), vec![lhs.clone()]),
    }
}

pub fn select_mul(lhs: &Variable, rhs: Operand) -> Selection {
    match rhs {
        Operand::Graph(r) => Selection::new(Mul, vec![lhs.clone(), r]),
        Operand::Constant(c) => Selection::new(MulConstant::new(c), vec![lhs.clone()]),
    }
}

/// # Errors
/// Inverting an array constant runs a kernel, which can fail.
pub fn select_div(lhs: &Variable, rhs: Operand) -> Result<Selection> {
    Ok(match rhs {
        Operand::Graph(r) => Selection::new(Div, vec![lhs.clone(), r]),
        Operand::Constant(c) => {
            Selection::new(MulConstant::new(c.reciprocal()?), vec![lhs.clone()])
        }
    })
}

pub fn select_rdiv(lhs: &Variable, rhs: Operand) -> Selection {
    match rhs {
        Operand::Graph(r) => Selection::new(Div, vec![r, lhs.clone()]),
        Operand::Constant(c) => Selection::new(DivFromConstant::new(c), vec![lhs.clone()]),
    }
}

pub fn select_pow(lhs: &Variable, rhs: Operand) -> Selection {
    match rhs {
        Operand::Graph(r) => Selection::new(PowVarVar, vec![lhs.clone(), r]),
        Operand::Constant(c) => Selection::new(PowVarConst::new(c), vec![lhs.clone()]),
    }
}

pub fn select_rpow(lhs: &Variable, rhs: Operand) -> Selection {
    match rhs {
        Operand::Graph(r) => Selection::new(PowVarVar, vec![r, lhs.clone()]),
        Operand::Constant(c) => Selection::new(PowConstVar::new(c), vec![lhs.clone()]),
    }
}

// ===== APPLICATION =====

/// `-x`
pub fn neg(x: &Variable) -> Result<Variable> {
    select_neg(x).apply()
}

/// `|x|`
pub fn absolute(x: &Variable) -> Result<Variable> {
    select_absolute(x).apply()
}

/// `lhs + rhs`; also serves as the reflected `rhs + lhs`
pub fn add(lhs: &Variable, rhs: impl Into<Operand>) -> Result<Variable> {
    select_add(lhs, rhs.into()).apply()
}

/// `lhs - rhs`
pub fn sub(lhs: &Variable, rhs: impl Into<Operand>) -> Result<Variable> {
    select_sub(lhs, rhs.into())?.apply()
}

/// `rhs - lhs`
pub fn rsub(lhs: &Variable, rhs: impl Into<Operand>) -> Result<Variable> {
    select_rsub(lhs, rhs.into()).apply()
}

/// `lhs * rhs`; also serves as the reflected `rhs * lhs`
pub fn mul(lhs: &Variable, rhs: impl Into<Operand>) -> Result<Variable> {
    select_mul(lhs, rhs.into()).apply()
}

/// `lhs / rhs`
pub fn div(lhs: &Variable, rhs: impl Into<Operand>) -> Result<Variable> {
    select_div(lhs, rhs.into())?.apply()
}

/// `rhs / lhs`
pub fn rdiv(lhs: &Variable, rhs: impl Into<Operand>) -> Result<Variable> {
    select_rdiv(lhs, rhs.into()).apply()
}

/// `lhs ** rhs`
pub fn pow(lhs: &Variable, rhs: impl Into<Operand>) -> Result<Variable> {
    select_pow(lhs, rhs.into()).apply()
}

/// `rhs ** lhs`
pub fn rpow(lhs: &Variable, rhs: impl Into<Operand>) -> Result<Variable> {
    select_rpow(lhs, rhs.into()).apply()
}

pub fn exp(x: &Variable) -> Result<Variable> {
    Variable::apply(Box::new(Exp), &[x])
}

pub fn log(x: &Variable) -> Result<Variable> {
    Variable::apply(Box::new(Log), &[x])
}

pub fn sin(x: &Variable) -> Result<Variable> {
    Variable::apply(Box::new(Sin), &[x])
}

pub fn cos(x: &Variable) -> Result<Variable> {
    Variable::apply(Box::new(Cos), &[x])
}

/// Sample `mean + exp(ln_var / 2) * eps` with fresh noise
pub fn gaussian(mean: &Variable, ln_var: &Variable) -> Result<Variable> {
    Variable::apply(Box::new(Gaussian::new()), &[mean, ln_var])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(v: f32) -> Variable {
        Variable::new(Tensor::scalar(v))
    }

    #[test]
    fn test_selection_by_operand_kind() {
        let x = var(1.0);
        assert_eq!(select_add(&x, var(2.0).into()).label(), "_ + _");
        assert_eq!(select_add(&x, 2.0.into()).label(), "_ + 2.0");
        assert_eq!(select_sub(&x, 2.0.into()).unwrap().label(), "_ + -2.0");
        assert_eq!(select_rsub(&x, 2.0.into()).label(), "2.0 - _");
        assert_eq!(select_div(&x, 4.0.into()).unwrap().label(), "_ * 0.25");
        assert_eq!(select_rdiv(&x, 4.0.into()).label(), "4.0 / _");
        assert_eq!(select_pow(&x, 3.0.into()).label(), "_ ** 3.0");
        assert_eq!(select_rpow(&x, 3.0.into()).label(), "3.0 ** _");
    }

    #[test]
    fn test_reflected_graph_operands_swap() {
        let a = var(1.0);
        let b = var(2.0);
        let s = select_rsub(&a, (&b).into());
        assert_eq!(s.label(), "_ - _");
        assert!(s.inputs[0].ptr_eq(&b));
        assert!(s.inputs[1].ptr_eq(&a));
    }

    #[test]
    fn test_tensor_operand_is_constant() {
        let x = var(1.0);
        let s = select_mul(&x, Tensor::scalar(3.0).into());
        assert_eq!(s.label(), "_ * constant array");
        assert_eq!(s.inputs.len(), 1);
    }
}

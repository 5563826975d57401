// Operator families and the kernels they share
pub mod arithmetic;
pub mod gaussian;
pub(crate) mod kernels;
pub mod transcendental;

// Re-export operator types
pub use arithmetic::{
    Absolute, Add, AddConstant, Div, DivFromConstant, Mul, MulConstant, Neg, PowConstVar,
    PowVarConst, PowVarVar, Sub, SubFromConstant,
};
pub use gaussian::Gaussian;
pub use transcendental::{Cos, Exp, Log, Sin};

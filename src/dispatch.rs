//! Operator dispatch table
//!
//! Maps each syntactic operation (`-x`, `x + y`, `c - x`, ...) to its
//! resolver entry point. The table is built once by [`install`]; the
//! `std::ops` impls on `&Variable` look their entry up there.

use std::collections::HashMap;
use std::sync::OnceLock;

use tracing::debug;

use crate::error::{EmberError, Result};
use crate::resolver::{self, Operand};
use crate::variable::Variable;

/// A syntactic operation, named after the dunder it stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Syntax {
    Neg,
    Abs,
    Add,
    RAdd,
    Sub,
    RSub,
    Mul,
    RMul,
    Div,
    RDiv,
    Pow,
    RPow,
}

impl Syntax {
    pub const ALL: [Syntax; 12] = [
        Syntax::Neg,
        Syntax::Abs,
        Syntax::Add,
        Syntax::RAdd,
        Syntax::Sub,
        Syntax::RSub,
        Syntax::Mul,
        Syntax::RMul,
        Syntax::Div,
        Syntax::RDiv,
        Syntax::Pow,
        Syntax::RPow,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Syntax::Neg => "__neg__",
            Syntax::Abs => "__abs__",
            Syntax::Add => "__add__",
            Syntax::RAdd => "__radd__",
            Syntax::Sub => "__sub__",
            Syntax::RSub => "__rsub__",
            Syntax::Mul => "__mul__",
            Syntax::RMul => "__rmul__",
            Syntax::Div => "__truediv__",
            Syntax::RDiv => "__rtruediv__",
            Syntax::Pow => "__pow__",
            Syntax::RPow => "__rpow__",
        }
    }
}

/// Resolver entry point for one [`Syntax`]
#[derive(Clone, Copy)]
pub enum Entry {
    Unary(fn(&Variable) -> Result<Variable>),
    Binary(fn(&Variable, Operand) -> Result<Variable>),
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entry::Unary(_) => f.write_str("Entry::Unary"),
            Entry::Binary(_) => f.write_str("Entry::Binary"),
        }
    }
}

#[derive(Debug)]
pub struct DispatchTable {
    entries: HashMap<Syntax, Entry>,
}

impl DispatchTable {
    /// The table wiring every [`Syntax`] to the resolver
    pub fn standard() -> Self {
        let entries = HashMap::from([
            (Syntax::Neg, Entry::Unary(resolver::neg)),
            (Syntax::Abs, Entry::Unary(resolver::absolute)),
            (Syntax::Add, Entry::Binary(|x, rhs| resolver::add(x, rhs))),
            (Syntax::RAdd, Entry::Binary(|x, rhs| resolver::add(x, rhs))),
            (Syntax::Sub, Entry::Binary(|x, rhs| resolver::sub(x, rhs))),
            (Syntax::RSub, Entry::Binary(|x, rhs| resolver::rsub(x, rhs))),
            (Syntax::Mul, Entry::Binary(|x, rhs| resolver::mul(x, rhs))),
            (Syntax::RMul, Entry::Binary(|x, rhs| resolver::mul(x, rhs))),
            (Syntax::Div, Entry::Binary(|x, rhs| resolver::div(x, rhs))),
            (Syntax::RDiv, Entry::Binary(|x, rhs| resolver::rdiv(x, rhs))),
            (Syntax::Pow, Entry::Binary(|x, rhs| resolver::pow(x, rhs))),
            (Syntax::RPow, Entry::Binary(|x, rhs| resolver::rpow(x, rhs))),
        ]);
        DispatchTable { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, syntax: Syntax) -> Option<Entry> {
        self.entries.get(&syntax).copied()
    }

    /// # Errors
    /// `TypeConstraint` if `syntax` is missing or not unary
    pub fn unary(&self, syntax: Syntax, x: &Variable) -> Result<Variable> {
        match self.get(syntax) {
            Some(Entry::Unary(f)) => f(x),
            _ => Err(not_wired(syntax, "unary")),
        }
    }

    /// # Errors
    /// `TypeConstraint` if `syntax` is missing or not binary
    pub fn binary(&self, syntax: Syntax, lhs: &Variable, rhs: Operand) -> Result<Variable> {
        match self.get(syntax) {
            Some(Entry::Binary(f)) => f(lhs, rhs),
            _ => Err(not_wired(syntax, "binary")),
        }
    }
}

fn not_wired(syntax: Syntax, arity: &str) -> EmberError {
    EmberError::TypeConstraint {
        function: syntax.symbol().to_string(),
        reason: format!("no {arity} entry installed"),
    }
}

static TABLE: OnceLock<DispatchTable> = OnceLock::new();

/// Install the standard table; later calls return the same table
pub fn install() -> &'static DispatchTable {
    TABLE.get_or_init(|| {
        let table = DispatchTable::standard();
        debug!(entries = table.len(), "installed operator dispatch table");
        table
    })
}

/// The installed table, if [`install`] has run
pub fn installed() -> Option<&'static DispatchTable> {
    TABLE.get()
}

// ===== OPERATOR OVERLOADS =====

impl std::ops::Neg for &Variable {
    type Output = Result<Variable>;

    fn neg(self) -> Result<Variable> {
        install().unary(Syntax::Neg, self)
    }
}

macro_rules! binary_overload {
    ($trait:ident, $method:ident, $syntax:ident, $reflected:ident) => {
        impl std::ops::$trait<&Variable> for &Variable {
            type Output = Result<Variable>;

            fn $method(self, rhs: &Variable) -> Result<Variable> {
                install().binary(Syntax::$syntax, self, Operand::from(rhs))
            }
        }

        impl std::ops::$trait<f64> for &Variable {
            type Output = Result<Variable>;

            fn $method(self, rhs: f64) -> Result<Variable> {
                install().binary(Syntax::$syntax, self, Operand::from(rhs))
            }
        }

        impl std::ops::$trait<&Variable> for f64 {
            type Output = Result<Variable>;

            fn $method(self, rhs: &Variable) -> Result<Variable> {
                install().binary(Syntax::$reflected, rhs, Operand::from(self))
            }
        }
    };
}

binary_overload!(Add, add, Add, RAdd);
binary_overload!(Sub, sub, Sub, RSub);
binary_overload!(Mul, mul, Mul, RMul);
binary_overload!(Div, div, Div, RDiv);

impl Variable {
    /// `|self|`
    pub fn abs(&self) -> Result<Variable> {
        install().unary(Syntax::Abs, self)
    }

    /// `self ** rhs`
    pub fn pow(&self, rhs: impl Into<Operand>) -> Result<Variable> {
        install().binary(Syntax::Pow, self, rhs.into())
    }

    /// `rhs ** self`
    pub fn rpow(&self, rhs: impl Into<Operand>) -> Result<Variable> {
        install().binary(Syntax::RPow, self, rhs.into())
    }
}

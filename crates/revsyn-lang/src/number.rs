//! Numbers: constants, loop variables and constant expressions over them.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{LangError, LangResult};

/// Current values of the loop variables in scope.
pub type LoopVariables = FxHashMap<String, u64>;

/// Arithmetic on numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumberOp {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
}

impl NumberOp {
    /// Source symbol of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            NumberOp::Add => "+",
            NumberOp::Subtract => "-",
            NumberOp::Multiply => "*",
            NumberOp::Divide => "/",
        }
    }
}

/// A number known at synthesis time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Number {
    /// Literal value.
    Constant(u64),
    /// Value of the named loop variable (`$i`).
    LoopVariable(String),
    /// Arithmetic over two numbers.
    Binary {
        lhs: Box<Number>,
        op: NumberOp,
        rhs: Box<Number>,
    },
}

impl Number {
    /// Create a reference to a loop variable.
    pub fn loop_variable(name: impl Into<String>) -> Self {
        Number::LoopVariable(name.into())
    }

    /// Combine two numbers.
    pub fn binary(lhs: Number, op: NumberOp, rhs: Number) -> Self {
        Number::Binary {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        }
    }

    /// Evaluate under the given loop variable values.
    ///
    /// Arithmetic wraps on overflow.
    pub fn evaluate(&self, loop_variables: &LoopVariables) -> LangResult<u64> {
        match self {
            Number::Constant(value) => Ok(*value),
            Number::LoopVariable(name) => loop_variables
                .get(name)
                .copied()
                .ok_or_else(|| LangError::UnboundLoopVariable(name.clone())),
            Number::Binary { lhs, op, rhs } => {
                let lhs = lhs.evaluate(loop_variables)?;
                let rhs = rhs.evaluate(loop_variables)?;
                match op {
                    NumberOp::Add => Ok(lhs.wrapping_add(rhs)),
                    NumberOp::Subtract => Ok(lhs.wrapping_sub(rhs)),
                    NumberOp::Multiply => Ok(lhs.wrapping_mul(rhs)),
                    NumberOp::Divide => lhs.checked_div(rhs).ok_or(LangError::DivisionByZero),
                }
            }
        }
    }

    /// Check whether the number is a literal.
    pub fn is_constant(&self) -> bool {
        matches!(self, Number::Constant(_))
    }
}

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        Number::Constant(value)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Constant(value) => write!(f, "{value}"),
            Number::LoopVariable(name) => write!(f, "${name}"),
            Number::Binary { lhs, op, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
        }
    }
}

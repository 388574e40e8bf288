//! Expressions over bit-vectors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LangResult;
use crate::module::Module;
use crate::number::{LoopVariables, Number};
use crate::variable::{VarId, VariableAccess};

/// Binary operators on bit-vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `^`
    Exor,
    /// `*` (lower half of the product)
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// `*>` (upper half of the full-width product)
    FracDivide,
    /// `&&`
    LogicalAnd,
    /// `||`
    LogicalOr,
    /// `&`
    BitwiseAnd,
    /// `|`
    BitwiseOr,
    /// `<`
    LessThan,
    /// `>`
    GreaterThan,
    /// `=`
    Equals,
    /// `!=`
    NotEquals,
    /// `<=`
    LessEquals,
    /// `>=`
    GreaterEquals,
}

impl BinaryOp {
    /// Source symbol of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Exor => "^",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::FracDivide => "*>",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::BitwiseAnd => "&",
            BinaryOp::BitwiseOr => "|",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThan => ">",
            BinaryOp::Equals => "=",
            BinaryOp::NotEquals => "!=",
            BinaryOp::LessEquals => "<=",
            BinaryOp::GreaterEquals => ">=",
        }
    }

    /// Whether the operator yields a single bit.
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            BinaryOp::LogicalAnd
                | BinaryOp::LogicalOr
                | BinaryOp::LessThan
                | BinaryOp::GreaterThan
                | BinaryOp::Equals
                | BinaryOp::NotEquals
                | BinaryOp::LessEquals
                | BinaryOp::GreaterEquals
        )
    }

    /// Apply the operator to values of width `bitwidth`.
    ///
    /// Returns `None` for division or modulo by zero, whose circuit result
    /// is not an arithmetic value.
    pub fn apply(self, lhs: u64, rhs: u64, bitwidth: u32) -> Option<u64> {
        let value = match self {
            BinaryOp::Add => lhs.wrapping_add(rhs),
            BinaryOp::Subtract => lhs.wrapping_sub(rhs),
            BinaryOp::Exor => lhs ^ rhs,
            BinaryOp::Multiply => lhs.wrapping_mul(rhs),
            BinaryOp::Divide => lhs.checked_div(rhs)?,
            BinaryOp::Modulo => lhs.checked_rem(rhs)?,
            BinaryOp::FracDivide => {
                let product = u128::from(lhs) * u128::from(rhs);
                u64::try_from(product >> bitwidth).unwrap_or(u64::MAX)
            }
            BinaryOp::LogicalAnd => u64::from(lhs & 1 == 1 && rhs & 1 == 1),
            BinaryOp::LogicalOr => u64::from(lhs & 1 == 1 || rhs & 1 == 1),
            BinaryOp::BitwiseAnd => lhs & rhs,
            BinaryOp::BitwiseOr => lhs | rhs,
            BinaryOp::LessThan => u64::from(lhs < rhs),
            BinaryOp::GreaterThan => u64::from(lhs > rhs),
            BinaryOp::Equals => u64::from(lhs == rhs),
            BinaryOp::NotEquals => u64::from(lhs != rhs),
            BinaryOp::LessEquals => u64::from(lhs <= rhs),
            BinaryOp::GreaterEquals => u64::from(lhs >= rhs),
        };
        let width = if self.is_boolean() { 1 } else { bitwidth };
        Some(value & mask(width))
    }
}

/// Shift operators; the amount is a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShiftOp {
    /// `<<`
    Left,
    /// `>>`
    Right,
}

impl ShiftOp {
    /// Source symbol of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            ShiftOp::Left => "<<",
            ShiftOp::Right => ">>",
        }
    }
}

/// Unary operators in expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `!` on the whole operand: 1 iff every bit is 0.
    LogicalNot,
    /// `~`
    BitwiseNot,
}

impl UnaryOp {
    /// Source symbol of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::LogicalNot => "!",
            UnaryOp::BitwiseNot => "~",
        }
    }
}

/// An expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expression {
    /// Number of a given width.
    Numeric { value: Number, bitwidth: u32 },
    /// Variable read.
    Variable(VariableAccess),
    /// Binary operation.
    Binary {
        lhs: Box<Expression>,
        op: BinaryOp,
        rhs: Box<Expression>,
    },
    /// Shift by a number of positions.
    Shift {
        lhs: Box<Expression>,
        op: ShiftOp,
        amount: Number,
    },
    /// Unary operation.
    Unary { op: UnaryOp, expr: Box<Expression> },
}

impl Expression {
    /// Create a numeric literal.
    pub fn numeric(value: u64, bitwidth: u32) -> Self {
        Expression::Numeric {
            value: Number::Constant(value),
            bitwidth,
        }
    }

    /// Create a numeric expression from a number.
    pub fn number(value: Number, bitwidth: u32) -> Self {
        Expression::Numeric { value, bitwidth }
    }

    /// Read a whole variable.
    pub fn var(var: VarId) -> Self {
        Expression::Variable(VariableAccess::new(var))
    }

    /// Read a variable access.
    pub fn access(access: VariableAccess) -> Self {
        Expression::Variable(access)
    }

    /// Combine two expressions.
    pub fn binary(lhs: Expression, op: BinaryOp, rhs: Expression) -> Self {
        Expression::Binary {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        }
    }

    /// Shift an expression.
    pub fn shift(lhs: Expression, op: ShiftOp, amount: Number) -> Self {
        Expression::Shift {
            lhs: Box::new(lhs),
            op,
            amount,
        }
    }

    /// Apply a unary operator.
    pub fn unary(op: UnaryOp, expr: Expression) -> Self {
        Expression::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    /// Width of the expression's value.
    pub fn bitwidth(&self, module: &Module, loop_variables: &LoopVariables) -> LangResult<u32> {
        match self {
            Expression::Numeric { bitwidth, .. } => Ok(*bitwidth),
            Expression::Variable(access) => access.bitwidth(module, loop_variables),
            Expression::Binary { lhs, op, .. } => {
                if op.is_boolean() {
                    Ok(1)
                } else {
                    lhs.bitwidth(module, loop_variables)
                }
            }
            Expression::Shift { lhs, .. } => lhs.bitwidth(module, loop_variables),
            Expression::Unary { op, expr } => match op {
                UnaryOp::LogicalNot => Ok(1),
                UnaryOp::BitwiseNot => expr.bitwidth(module, loop_variables),
            },
        }
    }

    /// Fold every subtree whose operands are all numbers into a single
    /// numeric expression.
    pub fn fold_constants(
        &self,
        module: &Module,
        loop_variables: &LoopVariables,
    ) -> LangResult<Expression> {
        let folded = match self {
            Expression::Numeric { value, bitwidth } => Expression::Numeric {
                value: Number::Constant(value.evaluate(loop_variables)? & mask(*bitwidth)),
                bitwidth: *bitwidth,
            },
            Expression::Variable(_) => self.clone(),
            Expression::Binary { lhs, op, rhs } => {
                let width = lhs.bitwidth(module, loop_variables)?;
                let lhs = lhs.fold_constants(module, loop_variables)?;
                let rhs = rhs.fold_constants(module, loop_variables)?;
                match (lhs.constant_value(), rhs.constant_value()) {
                    (Some(a), Some(b)) => match op.apply(a, b, width) {
                        Some(value) => Expression::numeric(
                            value,
                            if op.is_boolean() { 1 } else { width },
                        ),
                        None => Expression::binary(lhs, *op, rhs),
                    },
                    _ => Expression::binary(lhs, *op, rhs),
                }
            }
            Expression::Shift { lhs, op, amount } => {
                let width = lhs.bitwidth(module, loop_variables)?;
                let amount = amount.evaluate(loop_variables)?;
                let lhs = lhs.fold_constants(module, loop_variables)?;
                match lhs.constant_value() {
                    Some(value) => {
                        let shifted = match op {
                            ShiftOp::Left => value.checked_shl(to_shift(amount)).unwrap_or(0),
                            ShiftOp::Right => value.checked_shr(to_shift(amount)).unwrap_or(0),
                        };
                        Expression::numeric(shifted & mask(width), width)
                    }
                    None => Expression::shift(lhs, *op, Number::Constant(amount)),
                }
            }
            Expression::Unary { op, expr } => {
                let width = expr.bitwidth(module, loop_variables)?;
                let expr = expr.fold_constants(module, loop_variables)?;
                match (op, expr.constant_value()) {
                    (UnaryOp::LogicalNot, Some(value)) => {
                        Expression::numeric(u64::from(value == 0), 1)
                    }
                    (UnaryOp::BitwiseNot, Some(value)) => {
                        Expression::numeric(!value & mask(width), width)
                    }
                    _ => Expression::unary(*op, expr),
                }
            }
        };
        Ok(folded)
    }

    /// Literal value of a folded numeric expression.
    pub fn constant_value(&self) -> Option<u64> {
        match self {
            Expression::Numeric {
                value: Number::Constant(value),
                ..
            } => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Mask selecting the low `bitwidth` bits.
pub fn mask(bitwidth: u32) -> u64 {
    if bitwidth >= 64 {
        u64::MAX
    } else {
        (1_u64 << bitwidth) - 1
    }
}

fn to_shift(amount: u64) -> u32 {
    u32::try_from(amount).unwrap_or(u32::MAX)
}

//! Error types for the program representation.

use thiserror::Error;

use crate::variable::VarId;

/// Errors raised while evaluating or analysing a program.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LangError {
    /// A loop variable was read outside of its loop.
    #[error("Loop variable '${0}' is not bound")]
    UnboundLoopVariable(String),

    /// A variable id does not belong to the module.
    #[error("Variable {0} is not declared in module '{1}'")]
    UnknownVariable(VarId, String),

    /// Numeric expression divides by zero.
    #[error("Division by zero in numeric expression")]
    DivisionByZero,

    /// JSON (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for program operations.
pub type LangResult<T> = Result<T, LangError>;

//! Error types for the synthesis engine.

use revsyn_ir::IrError;
use revsyn_lang::LangError;
use thiserror::Error;

/// Errors that can occur during synthesis.
///
/// A failed statement aborts the whole run: gates emitted before the
/// failure are not rolled back, so the target circuit must be discarded.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SynthError {
    /// Operands of a statement or expression have different widths.
    #[error("Bitwidth mismatch in '{context}': {lhs} vs {rhs}")]
    BitwidthMismatch {
        /// Operator or statement that combines the operands.
        context: String,
        /// Width of the left operand.
        lhs: usize,
        /// Width of the right operand.
        rhs: usize,
    },

    /// Called or selected module does not exist.
    #[error("Module '{0}' not found in program")]
    UnknownModule(String),

    /// Program has no module to synthesize.
    #[error("Program contains no modules")]
    NoModules,

    /// Call passes the wrong number of arguments.
    #[error("Module '{module}' expects {expected} arguments, got {got}")]
    ArgumentCountMismatch {
        /// Called module.
        module: String,
        /// Number of parameters.
        expected: usize,
        /// Number of arguments.
        got: usize,
    },

    /// Constant array index or bit position outside the declared bounds.
    #[error("Index {index} out of range for '{variable}' (size {size})")]
    IndexOutOfRange {
        /// Accessed variable.
        variable: String,
        /// Offending index.
        index: u64,
        /// Size of the indexed dimension or bit-vector.
        size: u64,
    },

    /// Construct the synthesizer cannot realize.
    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),

    /// Module calls nest deeper than the configured limit.
    #[error("Call depth exceeds the limit of {limit}")]
    RecursionLimit {
        /// Configured maximum call depth.
        limit: usize,
    },

    /// Loop step evaluates to zero.
    #[error("Loop step evaluates to zero")]
    InvalidLoopStep,

    /// Error from the program representation.
    #[error("Program error: {0}")]
    Lang(#[from] LangError),

    /// Error from the circuit container.
    #[error("Circuit error: {0}")]
    Ir(#[from] IrError),

    /// Settings could not be parsed.
    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Result type for synthesis operations.
pub type SynthResult<T> = Result<T, SynthError>;

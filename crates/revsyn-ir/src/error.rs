//! Error types for the IR crate.

use crate::line::LineId;
use thiserror::Error;

/// Errors that can occur in IR operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// Line not found in circuit.
    #[error("Line {line} not found in circuit{}", format_gate_context(.gate_name))]
    LineNotFound {
        /// The line that was not found.
        line: LineId,
        /// Optional gate name for context.
        gate_name: Option<String>,
    },

    /// A line appears more than once among the controls and targets of a gate.
    #[error("Duplicate line {line} in operation{}", format_gate_context(.gate_name))]
    DuplicateLine {
        /// The duplicate line.
        line: LineId,
        /// Optional gate name for context.
        gate_name: Option<String>,
    },

    /// Module gate refers to an unregistered sub-circuit.
    #[error("Module '{0}' is not registered in circuit")]
    UnknownModule(String),

    /// Module gate has the wrong number of targets.
    #[error("Module '{name}' has {expected} lines, got {got} targets")]
    ModuleArityMismatch {
        /// Name of the module.
        name: String,
        /// Number of lines of the module.
        expected: usize,
        /// Number of targets provided.
        got: usize,
    },

    /// Gate has the wrong number of targets for its kind.
    #[error("Gate '{gate_name}' requires {expected} targets, got {got}")]
    TargetCountMismatch {
        /// Name of the gate.
        gate_name: String,
        /// Expected number of targets.
        expected: usize,
        /// Actual number of targets.
        got: usize,
    },

    /// Simulation input does not match the circuit width.
    #[error("Input pattern has {got} bits, circuit has {expected} lines")]
    InputWidthMismatch {
        /// Number of circuit lines.
        expected: usize,
        /// Number of bits provided.
        got: usize,
    },

    /// Malformed realization text.
    #[error("Parse error at line {line}: {message}")]
    Parse {
        /// Line of the input, starting at 1.
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// Truth tables are only built for narrow circuits.
    #[error("Truth table over {inputs} free lines exceeds the limit of {max}")]
    TooManyInputs {
        /// Number of lines without a constant.
        inputs: usize,
        /// Largest supported number.
        max: usize,
    },

    /// I/O failure while reading or writing a realization.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Helper function to format optional gate context.
#[allow(clippy::ref_option)]
fn format_gate_context(gate_name: &Option<String>) -> String {
    match gate_name {
        Some(name) => format!(" (gate: {name})"),
        None => String::new(),
    }
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;

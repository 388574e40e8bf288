//! Circuit lines and their metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a line within a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineId(pub u32);

impl LineId {
    /// Position of the line in its circuit.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl From<u32> for LineId {
    fn from(id: u32) -> Self {
        LineId(id)
    }
}

impl From<usize> for LineId {
    fn from(id: usize) -> Self {
        LineId(u32::try_from(id).expect("LineId overflow: exceeds u32::MAX"))
    }
}

/// A circuit line together with its input/output roles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Line {
    /// The unique identifier.
    pub id: LineId,
    /// Name of the line on the input side.
    pub input: String,
    /// Name of the line on the output side.
    pub output: String,
    /// Known value of the line at the circuit input, if it is an ancilla.
    pub constant: Option<bool>,
    /// Whether the output value of the line is discarded.
    pub garbage: bool,
}

impl Line {
    /// Create a new line.
    pub fn new(
        id: LineId,
        input: impl Into<String>,
        output: impl Into<String>,
        constant: Option<bool>,
        garbage: bool,
    ) -> Self {
        Self {
            id,
            input: input.into(),
            output: output.into(),
            constant,
            garbage,
        }
    }

    /// Whether the line starts with a known constant value.
    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} -> {})", self.id, self.input, self.output)
    }
}

//! Reversible gate types.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::line::LineId;

/// The operation a gate performs on its targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateKind {
    /// Multiple-controlled NOT. NOT and CNOT are the 0- and 1-control cases.
    Toffoli,
    /// Multiple-controlled swap of two targets.
    Fredkin,
    /// Embedding of a named sub-circuit registered in the enclosing circuit.
    Module(String),
}

/// A reversible gate: an operation together with its control and target lines.
///
/// Every Toffoli and Fredkin gate is its own inverse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gate {
    /// The operation.
    pub kind: GateKind,
    /// Control lines; all must be 1 for the gate to act.
    pub controls: BTreeSet<LineId>,
    /// Target lines, in operation order.
    pub targets: Vec<LineId>,
}

impl Gate {
    /// Create a NOT gate.
    pub fn not(target: LineId) -> Self {
        Self::toffoli([], target)
    }

    /// Create a controlled-NOT gate.
    pub fn cnot(control: LineId, target: LineId) -> Self {
        Self::toffoli([control], target)
    }

    /// Create a multiple-controlled Toffoli gate.
    pub fn toffoli(controls: impl IntoIterator<Item = LineId>, target: LineId) -> Self {
        Self {
            kind: GateKind::Toffoli,
            controls: controls.into_iter().collect(),
            targets: vec![target],
        }
    }

    /// Create a multiple-controlled Fredkin gate.
    pub fn fredkin(controls: impl IntoIterator<Item = LineId>, a: LineId, b: LineId) -> Self {
        Self {
            kind: GateKind::Fredkin,
            controls: controls.into_iter().collect(),
            targets: vec![a, b],
        }
    }

    /// Create a gate embedding the module `name` on `targets`.
    pub fn module(
        name: impl Into<String>,
        controls: impl IntoIterator<Item = LineId>,
        targets: Vec<LineId>,
    ) -> Self {
        Self {
            kind: GateKind::Module(name.into()),
            controls: controls.into_iter().collect(),
            targets,
        }
    }

    /// Get the name of the gate as written in realization files.
    pub fn name(&self) -> String {
        match &self.kind {
            GateKind::Toffoli => format!("t{}", self.num_lines()),
            GateKind::Fredkin => format!("f{}", self.num_lines()),
            GateKind::Module(name) => name.clone(),
        }
    }

    /// Number of lines the gate touches.
    pub fn num_lines(&self) -> usize {
        self.controls.len() + self.targets.len()
    }

    /// Iterate over all lines of the gate, controls first.
    pub fn lines(&self) -> impl Iterator<Item = LineId> + '_ {
        self.controls.iter().copied().chain(self.targets.iter().copied())
    }

    /// Return a copy of this gate with additional controls.
    #[must_use]
    pub fn with_controls<'a>(&self, extra: impl IntoIterator<Item = &'a LineId>) -> Self {
        let mut gate = self.clone();
        gate.controls.extend(extra);
        gate
    }

    /// Rewrite every line `l` of this gate to `mapping[l]`.
    pub fn remap(&self, mapping: &[LineId]) -> IrResult<Self> {
        let lookup = |line: LineId| {
            mapping
                .get(line.index())
                .copied()
                .ok_or_else(|| IrError::LineNotFound {
                    line,
                    gate_name: Some(self.name()),
                })
        };
        Ok(Self {
            kind: self.kind.clone(),
            controls: self
                .controls
                .iter()
                .map(|&c| lookup(c))
                .collect::<IrResult<_>>()?,
            targets: self
                .targets
                .iter()
                .map(|&t| lookup(t))
                .collect::<IrResult<_>>()?,
        })
    }

    /// Check whether this is a Toffoli gate without controls.
    pub fn is_not(&self) -> bool {
        self.kind == GateKind::Toffoli && self.controls.is_empty()
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        for line in self.lines() {
            write!(f, " {line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_names() {
        assert_eq!(Gate::not(LineId(0)).name(), "t1");
        assert_eq!(Gate::cnot(LineId(0), LineId(1)).name(), "t2");
        assert_eq!(Gate::fredkin([LineId(2)], LineId(0), LineId(1)).name(), "f3");
        assert_eq!(
            Gate::module("increase_4", [], (0..8_u32).map(LineId).collect()).name(),
            "increase_4"
        );
    }

    #[test]
    fn test_display_lists_controls_then_targets() {
        let gate = Gate::toffoli([LineId(3), LineId(1)], LineId(2));
        assert_eq!(format!("{gate}"), "t3 x1 x3 x2");
    }

    #[test]
    fn test_with_controls_merges() {
        let gate = Gate::cnot(LineId(0), LineId(1));
        let extended = gate.with_controls(&[LineId(0), LineId(5)]);
        assert_eq!(extended.controls.len(), 2);
        assert!(extended.controls.contains(&LineId(5)));
    }

    #[test]
    fn test_remap() {
        let gate = Gate::cnot(LineId(0), LineId(1));
        let mapped = gate.remap(&[LineId(7), LineId(4)]).unwrap();
        assert_eq!(mapped, Gate::cnot(LineId(7), LineId(4)));

        let missing = Gate::not(LineId(3)).remap(&[LineId(0)]);
        assert!(matches!(missing, Err(IrError::LineNotFound { .. })));
    }
}

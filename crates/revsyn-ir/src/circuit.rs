//! High-level reversible circuit container.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::bus::BusCollection;
use crate::error::{IrError, IrResult};
use crate::gate::{Gate, GateKind};
use crate::line::{Line, LineId};

/// A reversible circuit.
///
/// A circuit is an ordered list of gates over a fixed set of lines. Each
/// line carries an input and an output name, an optional constant input
/// value and a garbage flag. Named sub-circuits ("modules") can be
/// registered and embedded through module gates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Circuit {
    /// Name of the circuit.
    name: String,
    /// Lines of the circuit, indexed by [`LineId`].
    lines: Vec<Line>,
    /// Gates in application order.
    gates: Vec<Gate>,
    /// Registered sub-circuits by name.
    modules: BTreeMap<String, Circuit>,
    /// Input buses.
    inputbuses: BusCollection,
    /// Output buses.
    outputbuses: BusCollection,
    /// State signals.
    statesignals: BusCollection,
}

impl Circuit {
    /// Create a new empty circuit.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Create a circuit with `num_lines` plain (non-constant, non-garbage) lines.
    pub fn with_lines(name: impl Into<String>, num_lines: u32) -> Self {
        let mut circuit = Self::new(name);
        for i in 0..num_lines {
            let label = format!("x{i}");
            circuit.add_line(label.clone(), label, None, false);
        }
        circuit
    }

    /// Add a line to the circuit.
    pub fn add_line(
        &mut self,
        input: impl Into<String>,
        output: impl Into<String>,
        constant: Option<bool>,
        garbage: bool,
    ) -> LineId {
        let id = LineId::from(self.lines.len());
        self.lines
            .push(Line::new(id, input, output, constant, garbage));
        id
    }

    /// Change the output name of a line.
    pub fn set_output(&mut self, line: LineId, output: impl Into<String>) -> IrResult<()> {
        let entry = self
            .lines
            .get_mut(line.index())
            .ok_or(IrError::LineNotFound {
                line,
                gate_name: None,
            })?;
        entry.output = output.into();
        Ok(())
    }

    /// Change the garbage flag of a line.
    pub fn set_garbage(&mut self, line: LineId, garbage: bool) -> IrResult<()> {
        let entry = self
            .lines
            .get_mut(line.index())
            .ok_or(IrError::LineNotFound {
                line,
                gate_name: None,
            })?;
        entry.garbage = garbage;
        Ok(())
    }

    // =========================================================================
    // Gates
    // =========================================================================

    /// Append a gate after checking its lines against the circuit.
    pub fn append_gate(&mut self, gate: Gate) -> IrResult<&mut Self> {
        self.check_gate(&gate)?;
        self.gates.push(gate);
        Ok(self)
    }

    /// Apply NOT gate.
    pub fn append_not(&mut self, target: LineId) -> IrResult<&mut Self> {
        self.append_gate(Gate::not(target))
    }

    /// Apply controlled-NOT gate.
    pub fn append_cnot(&mut self, control: LineId, target: LineId) -> IrResult<&mut Self> {
        self.append_gate(Gate::cnot(control, target))
    }

    /// Apply multiple-controlled Toffoli gate.
    pub fn append_toffoli(
        &mut self,
        controls: impl IntoIterator<Item = LineId>,
        target: LineId,
    ) -> IrResult<&mut Self> {
        self.append_gate(Gate::toffoli(controls, target))
    }

    /// Apply multiple-controlled Fredkin gate.
    pub fn append_fredkin(
        &mut self,
        controls: impl IntoIterator<Item = LineId>,
        a: LineId,
        b: LineId,
    ) -> IrResult<&mut Self> {
        self.append_gate(Gate::fredkin(controls, a, b))
    }

    /// Embed the registered module `name` on `targets`.
    pub fn append_module(
        &mut self,
        name: &str,
        controls: impl IntoIterator<Item = LineId>,
        targets: Vec<LineId>,
    ) -> IrResult<&mut Self> {
        self.append_gate(Gate::module(name, controls, targets))
    }

    /// Append a sequence of gates, adding `controls` to each of them.
    pub fn append_controlled<'a>(
        &mut self,
        gates: impl IntoIterator<Item = &'a Gate>,
        controls: &BTreeSet<LineId>,
    ) -> IrResult<&mut Self> {
        for gate in gates {
            self.append_gate(gate.with_controls(controls))?;
        }
        Ok(self)
    }

    fn check_gate(&self, gate: &Gate) -> IrResult<()> {
        let expected_targets = match &gate.kind {
            GateKind::Toffoli => 1,
            GateKind::Fredkin => 2,
            GateKind::Module(name) => self
                .modules
                .get(name)
                .ok_or_else(|| IrError::UnknownModule(name.clone()))?
                .num_lines(),
        };
        if gate.targets.len() != expected_targets {
            return Err(match &gate.kind {
                GateKind::Module(name) => IrError::ModuleArityMismatch {
                    name: name.clone(),
                    expected: expected_targets,
                    got: gate.targets.len(),
                },
                _ => IrError::TargetCountMismatch {
                    gate_name: gate.name(),
                    expected: expected_targets,
                    got: gate.targets.len(),
                },
            });
        }

        let mut seen = BTreeSet::new();
        for line in gate.lines() {
            if line.index() >= self.lines.len() {
                return Err(IrError::LineNotFound {
                    line,
                    gate_name: Some(gate.name()),
                });
            }
            if !seen.insert(line) {
                return Err(IrError::DuplicateLine {
                    line,
                    gate_name: Some(gate.name()),
                });
            }
        }
        Ok(())
    }

    // =========================================================================
    // Modules
    // =========================================================================

    /// Register a named sub-circuit.
    pub fn add_module(&mut self, name: impl Into<String>, module: Circuit) {
        self.modules.insert(name.into(), module);
    }

    /// Get a registered sub-circuit.
    pub fn module(&self, name: &str) -> Option<&Circuit> {
        self.modules.get(name)
    }

    /// Check whether a sub-circuit is registered under `name`.
    pub fn has_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Iterate over registered sub-circuits in name order.
    pub fn modules(&self) -> impl Iterator<Item = (&str, &Circuit)> {
        self.modules.iter().map(|(name, c)| (name.as_str(), c))
    }

    /// Expand every module gate into the Toffoli and Fredkin gates it embeds.
    pub fn flatten(&self) -> IrResult<Vec<Gate>> {
        let mut flat = Vec::with_capacity(self.gates.len());
        for gate in &self.gates {
            self.expand_into(gate, &mut flat)?;
        }
        Ok(flat)
    }

    fn expand_into(&self, gate: &Gate, flat: &mut Vec<Gate>) -> IrResult<()> {
        match &gate.kind {
            GateKind::Module(name) => {
                let module = self
                    .modules
                    .get(name)
                    .ok_or_else(|| IrError::UnknownModule(name.clone()))?;
                for inner in module.flatten()? {
                    flat.push(inner.remap(&gate.targets)?.with_controls(&gate.controls));
                }
            }
            GateKind::Toffoli | GateKind::Fredkin => flat.push(gate.clone()),
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of lines.
    pub fn num_lines(&self) -> usize {
        self.lines.len()
    }

    /// Get the number of gates (module gates count once).
    pub fn num_gates(&self) -> usize {
        self.gates.len()
    }

    /// Get the lines.
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Get a line by id.
    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(id.index())
    }

    /// Get the gates.
    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Input names in line order.
    pub fn inputs(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|l| l.input.as_str())
    }

    /// Output names in line order.
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|l| l.output.as_str())
    }

    /// Constant input values in line order.
    pub fn constants(&self) -> Vec<Option<bool>> {
        self.lines.iter().map(|l| l.constant).collect()
    }

    /// Garbage flags in line order.
    pub fn garbage(&self) -> Vec<bool> {
        self.lines.iter().map(|l| l.garbage).collect()
    }

    /// Number of lines whose output is discarded.
    pub fn num_garbage(&self) -> usize {
        self.lines.iter().filter(|l| l.garbage).count()
    }

    /// Get the input buses.
    pub fn inputbuses(&self) -> &BusCollection {
        &self.inputbuses
    }

    /// Get the input buses mutably.
    pub fn inputbuses_mut(&mut self) -> &mut BusCollection {
        &mut self.inputbuses
    }

    /// Get the output buses.
    pub fn outputbuses(&self) -> &BusCollection {
        &self.outputbuses
    }

    /// Get the output buses mutably.
    pub fn outputbuses_mut(&mut self) -> &mut BusCollection {
        &mut self.outputbuses
    }

    /// Get the state signals.
    pub fn statesignals(&self) -> &BusCollection {
        &self.statesignals
    }

    /// Get the state signals mutably.
    pub fn statesignals_mut(&mut self) -> &mut BusCollection {
        &mut self.statesignals
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Serialize the circuit to JSON.
    pub fn to_json(&self) -> IrResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize a circuit from JSON.
    pub fn from_json(json: &str) -> IrResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_circuit() {
        let circuit = Circuit::new("test");
        assert_eq!(circuit.name(), "test");
        assert_eq!(circuit.num_lines(), 0);
        assert_eq!(circuit.num_gates(), 0);
    }

    #[test]
    fn test_add_line_roles() {
        let mut circuit = Circuit::new("test");
        let a = circuit.add_line("a.0", "a.0", None, false);
        let c = circuit.add_line("const_0", "garbage", Some(false), true);

        assert_eq!(a, LineId(0));
        assert_eq!(c, LineId(1));
        assert_eq!(circuit.constants(), vec![None, Some(false)]);
        assert_eq!(circuit.garbage(), vec![false, true]);
        assert_eq!(circuit.num_garbage(), 1);

        circuit.set_output(c, "const_0").unwrap();
        assert_eq!(circuit.outputs().collect::<Vec<_>>(), vec!["a.0", "const_0"]);
    }

    #[test]
    fn test_fluent_api() {
        let mut circuit = Circuit::with_lines("test", 3);
        circuit
            .append_not(LineId(0))
            .unwrap()
            .append_cnot(LineId(0), LineId(1))
            .unwrap()
            .append_toffoli([LineId(0), LineId(1)], LineId(2))
            .unwrap()
            .append_fredkin([LineId(2)], LineId(0), LineId(1))
            .unwrap();

        assert_eq!(circuit.num_gates(), 4);
    }

    #[test]
    fn test_rejects_unknown_line() {
        let mut circuit = Circuit::with_lines("test", 2);
        let result = circuit.append_cnot(LineId(0), LineId(5));
        assert!(matches!(
            result,
            Err(IrError::LineNotFound { line: LineId(5), .. })
        ));
    }

    #[test]
    fn test_rejects_target_among_controls() {
        let mut circuit = Circuit::with_lines("test", 2);
        let result = circuit.append_toffoli([LineId(0), LineId(1)], LineId(1));
        assert!(matches!(result, Err(IrError::DuplicateLine { .. })));
    }

    #[test]
    fn test_module_gate_arity() {
        let mut circuit = Circuit::with_lines("test", 3);
        circuit.add_module("pair", Circuit::with_lines("pair", 2));

        assert!(
            circuit
                .append_module("pair", [], vec![LineId(0), LineId(1)])
                .is_ok()
        );
        assert!(matches!(
            circuit.append_module("pair", [], vec![LineId(0)]),
            Err(IrError::ModuleArityMismatch { .. })
        ));
        assert!(matches!(
            circuit.append_module("missing", [], vec![]),
            Err(IrError::UnknownModule(_))
        ));
    }

    #[test]
    fn test_flatten_remaps_and_adds_controls() {
        let mut module = Circuit::with_lines("m", 2);
        module.append_cnot(LineId(0), LineId(1)).unwrap();

        let mut circuit = Circuit::with_lines("top", 3);
        circuit.add_module("m", module);
        circuit
            .append_module("m", [LineId(0)], vec![LineId(2), LineId(1)])
            .unwrap();

        let flat = circuit.flatten().unwrap();
        assert_eq!(flat, vec![Gate::toffoli([LineId(0), LineId(2)], LineId(1))]);
    }

    #[test]
    fn test_append_controlled() {
        let mut circuit = Circuit::with_lines("test", 3);
        let gates = vec![Gate::not(LineId(1)), Gate::cnot(LineId(1), LineId(2))];
        let controls = BTreeSet::from([LineId(0)]);
        circuit.append_controlled(&gates, &controls).unwrap();

        assert!(circuit.gates().iter().all(|g| g.controls.contains(&LineId(0))));
    }

    #[test]
    fn test_json_roundtrip() {
        let mut circuit = Circuit::with_lines("test", 2);
        circuit.append_cnot(LineId(0), LineId(1)).unwrap();
        let json = circuit.to_json().unwrap();
        let restored = Circuit::from_json(&json).unwrap();
        assert_eq!(restored.gates(), circuit.gates());
        assert_eq!(restored.lines(), circuit.lines());
    }
}

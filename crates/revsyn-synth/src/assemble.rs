//! Control computation tree assembly.
//!
//! Flattens the recorded tree into the target circuit. Leaf gates receive
//! the controls of their leaf. An inner node may instead compute its
//! control set into a helper line with one Toffoli gate, run its subtree
//! under that single control, and uncompute the helper again; the choice is
//! made per node by comparing quantum costs.

use std::collections::BTreeSet;

use petgraph::graph::NodeIndex;
use rustc_hash::FxHashMap;
use tracing::debug;

use revsyn_ir::{Circuit, Gate, GateKind, LineId, gate_quantum_cost};

use crate::arith::{decrease_circuit, decrease_name, increase_circuit, increase_name};
use crate::cct::ControlStack;
use crate::error::{SynthError, SynthResult};

/// Register the adder modules the tree refers to.
pub fn register_adders(stack: &ControlStack, circuit: &mut Circuit) -> SynthResult<()> {
    for &width in stack.adder_widths() {
        if !circuit.has_module(&increase_name(width)) {
            circuit.add_module(increase_name(width), increase_circuit(width)?);
        }
        if !circuit.has_module(&decrease_name(width)) {
            circuit.add_module(decrease_name(width), decrease_circuit(width)?);
        }
    }
    Ok(())
}

/// Append every gate recorded in `stack` to `circuit`.
///
/// With `efficient` unset, controls are always propagated to every gate.
pub fn assemble(stack: &ControlStack, circuit: &mut Circuit, efficient: bool) -> SynthResult<()> {
    register_adders(stack, circuit)?;
    let mut assembler = Assembler::new(stack, circuit, efficient);
    let root = stack.root();
    assembler.node(root, &BTreeSet::new(), None)?;
    debug!(collapsed = assembler.collapsed, "assembled control computation tree");
    Ok(())
}

struct Assembler<'s, 'c> {
    stack: &'s ControlStack,
    circuit: &'c mut Circuit,
    efficient: bool,
    /// Helper lines back at 0, ready for reuse.
    helpers: Vec<LineId>,
    /// Flattened module bodies, for costing module gates.
    modules: FxHashMap<String, Vec<Gate>>,
    /// Module gate costs by name, extra control count and line count.
    module_costs: FxHashMap<(String, usize, usize), u64>,
    /// Leaf costs by leaf, effective controls and line count.
    leaf_costs: FxHashMap<(NodeIndex, Vec<LineId>, usize), u64>,
    collapsed: usize,
}

impl<'s, 'c> Assembler<'s, 'c> {
    fn new(stack: &'s ControlStack, circuit: &'c mut Circuit, efficient: bool) -> Self {
        Self {
            stack,
            circuit,
            efficient,
            helpers: vec![],
            modules: FxHashMap::default(),
            module_costs: FxHashMap::default(),
            leaf_costs: FxHashMap::default(),
            collapsed: 0,
        }
    }

    /// Controls a gate recorded under `recorded` actually receives when the
    /// controls in `replaced` are represented by `helper`.
    fn effective(
        recorded: &BTreeSet<LineId>,
        replaced: &BTreeSet<LineId>,
        helper: Option<LineId>,
    ) -> BTreeSet<LineId> {
        recorded
            .difference(replaced)
            .copied()
            .chain(helper)
            .collect()
    }

    fn node(
        &mut self,
        index: NodeIndex,
        replaced: &BTreeSet<LineId>,
        helper: Option<LineId>,
    ) -> SynthResult<()> {
        let node = self.stack.node(index);
        if self.stack.is_leaf(index) {
            let controls = Self::effective(&node.controls, replaced, helper);
            self.circuit.append_controlled(&node.gates, &controls)?;
            return Ok(());
        }

        let controls = Self::effective(&node.controls, replaced, helper);
        if self.efficient && node.control.is_some() && !controls.is_empty() {
            let naive = self.subtree_cost(index, replaced, helper)?;
            let fresh = LineId::from(self.circuit.num_lines());
            let optimized = 2 * self.cost(&Gate::toffoli(controls.iter().copied(), fresh))?
                + self.subtree_cost(index, &node.controls, Some(fresh))?;
            let collapse = optimized <= naive;
            debug!(
                controls = controls.len(),
                naive, optimized, collapse, "control cascade decision"
            );

            if collapse {
                self.collapsed += 1;
                let line = self.helper();
                let compute = Gate::toffoli(controls.iter().copied(), line);
                self.circuit.append_gate(compute.clone())?;
                for child in self.stack.children(index) {
                    self.node(child, &node.controls, Some(line))?;
                }
                self.circuit.append_gate(compute)?;
                self.helpers.push(line);
                return Ok(());
            }
        }

        for child in self.stack.children(index) {
            self.node(child, replaced, helper)?;
        }
        Ok(())
    }

    fn helper(&mut self) -> LineId {
        self.helpers
            .pop()
            .unwrap_or_else(|| self.circuit.add_line("const_0", "const_0", Some(false), false))
    }

    fn subtree_cost(
        &mut self,
        index: NodeIndex,
        replaced: &BTreeSet<LineId>,
        helper: Option<LineId>,
    ) -> SynthResult<u64> {
        let lines = self.circuit.num_lines() + 1;
        let mut total = 0;
        for leaf in self.stack.leaves(index) {
            let node = self.stack.node(leaf);
            let controls = Self::effective(&node.controls, replaced, helper);
            let key = (leaf, controls.iter().copied().collect::<Vec<_>>(), lines);
            if let Some(&cost) = self.leaf_costs.get(&key) {
                total += cost;
                continue;
            }
            let mut cost = 0;
            for gate in &node.gates {
                cost += self.cost(&gate.with_controls(&controls))?;
            }
            self.leaf_costs.insert(key, cost);
            total += cost;
        }
        Ok(total)
    }

    /// Quantum cost of a gate, counting one extra line for a helper.
    fn cost(&mut self, gate: &Gate) -> SynthResult<u64> {
        let lines = self.circuit.num_lines() + 1;
        let GateKind::Module(name) = &gate.kind else {
            return Ok(gate_quantum_cost(gate, lines));
        };
        let key = (name.clone(), gate.controls.len(), lines);
        if let Some(&cost) = self.module_costs.get(&key) {
            return Ok(cost);
        }
        if !self.modules.contains_key(name) {
            let body = self
                .circuit
                .module(name)
                .ok_or_else(|| SynthError::UnknownModule(name.clone()))?
                .flatten()?;
            self.modules.insert(name.clone(), body);
        }
        let body = self.modules.get(name).map(Vec::as_slice).unwrap_or_default();
        let mut total = 0;
        for inner in body {
            let mapped = inner.remap(&gate.targets)?.with_controls(&gate.controls);
            total += gate_quantum_cost(&mapped, lines);
        }
        self.module_costs.insert(key, total);
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arith;
    use revsyn_ir::simulate;

    fn deep_stack() -> ControlStack {
        let mut stack = ControlStack::new();
        for c in 0..4 {
            stack.push(LineId(c));
        }
        for t in 4..8 {
            stack.toffoli([LineId(8)], LineId(t));
        }
        for c in (0..4).rev() {
            stack.pop(LineId(c));
        }
        stack
    }

    #[test]
    fn test_naive_assembly() {
        let mut circuit = Circuit::with_lines("t", 9);
        assemble(&deep_stack(), &mut circuit, false).unwrap();
        assert_eq!(circuit.num_gates(), 4);
        assert_eq!(circuit.num_lines(), 9);
        assert!(circuit.gates().iter().all(|g| g.controls.len() == 5));
    }

    #[test]
    fn test_collapse_saves_cost() {
        let mut naive = Circuit::with_lines("t", 9);
        assemble(&deep_stack(), &mut naive, false).unwrap();
        let mut optimized = Circuit::with_lines("t", 9);
        assemble(&deep_stack(), &mut optimized, true).unwrap();

        let helpers = optimized.num_lines() - 9;
        assert!(helpers > 0);
        assert!(optimized.lines()[9..].iter().all(|l| l.constant == Some(false)));
        assert!(optimized.quantum_cost().unwrap() < naive.quantum_cost().unwrap());

        // Same function on the original lines, helpers back at 0.
        for pattern in [0b1_1111_1111_u32, 0b1_0000_1111, 0b0_1010_1111, 0b1_0000_0111] {
            let mut input: Vec<bool> = (0..9).map(|i| (pattern >> i) & 1 == 1).collect();
            let expected = simulate(&naive, &input).unwrap();
            input.resize(9 + helpers, false);
            let output = simulate(&optimized, &input).unwrap();
            assert_eq!(&output[..9], expected.as_slice());
            assert!(output[9..].iter().all(|bit| !bit));
        }
    }

    #[test]
    fn test_single_control_not_collapsed() {
        let mut stack = ControlStack::new();
        stack.push(LineId(0));
        stack.not(LineId(1));
        stack.not(LineId(2));
        stack.pop(LineId(0));

        let mut circuit = Circuit::with_lines("t", 3);
        assemble(&stack, &mut circuit, true).unwrap();
        assert_eq!(circuit.num_lines(), 3);
        assert_eq!(circuit.num_gates(), 2);
    }

    #[test]
    fn test_subtree_costs_are_cached() {
        let mut stack = ControlStack::new();
        let a: Vec<_> = (3..6).map(LineId).collect();
        let b: Vec<_> = (6..9).map(LineId).collect();
        for c in 0..3 {
            stack.push(LineId(c));
            arith::increase(&mut stack, &b, &a);
        }
        for c in (0..3).rev() {
            stack.pop(LineId(c));
        }
        let mut circuit = Circuit::with_lines("t", 9);
        register_adders(&stack, &mut circuit).unwrap();

        let mut assembler = Assembler::new(&stack, &mut circuit, true);
        let root = stack.root();
        let first = assembler.subtree_cost(root, &BTreeSet::new(), None).unwrap();
        let leaves = assembler.leaf_costs.len();
        assert_eq!(leaves, stack.leaves(root).len());
        // one adder width, costed once per control count
        assert_eq!(assembler.module_costs.len(), 3);

        let second = assembler.subtree_cost(root, &BTreeSet::new(), None).unwrap();
        assert_eq!(first, second);
        assert_eq!(assembler.leaf_costs.len(), leaves);
        assert_eq!(assembler.module_costs.len(), 3);
    }

    #[test]
    fn test_registers_adder_modules() {
        let mut stack = ControlStack::new();
        let a: Vec<_> = (0..3).map(LineId).collect();
        let b: Vec<_> = (3..6).map(LineId).collect();
        arith::increase(&mut stack, &b, &a);

        let mut circuit = Circuit::with_lines("t", 6);
        assemble(&stack, &mut circuit, true).unwrap();
        assert!(circuit.has_module("increase_3"));
        assert!(circuit.has_module("decrease_3"));
        assert_eq!(circuit.gates()[0].name(), "increase_3");
    }
}

//! Active controls and the control computation tree (CCT).
//!
//! Gates are not written to the target circuit while statements are
//! synthesized. They are recorded in the leaves of a tree whose inner nodes
//! stand for the controls pushed while the leaf was current:
//!
//! ```text
//! root {}
//!  ├── leaf {}          gates before the first push
//!  ├── node {h}         push(h)
//!  │    ├── leaf {h}
//!  │    └── node {h,s}  push(s)
//!  │         └── leaf {h,s}
//!  └── leaf {}          gates after pop(h)
//! ```
//!
//! The assembler later walks the tree in creation order and decides per
//! inner node whether its control set is worth collapsing into a helper line.
//!
//! While a [`Tape`] is open, every gate and control change is also recorded
//! so that the exact inverse can be emitted later with
//! [`ControlStack::replay_reversed`].

use std::collections::BTreeSet;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use revsyn_ir::{Gate, LineId};

use crate::arith::{decrease_name, increase_name};

/// A node of the control computation tree.
#[derive(Debug, Clone, Default)]
pub struct CctNode {
    /// Control pushed when the node was created; `None` for the root and leaves.
    pub control: Option<LineId>,
    /// Every control active below this node.
    pub controls: BTreeSet<LineId>,
    /// Recorded gates; only leaves carry gates.
    pub gates: Vec<Gate>,
}

/// An event recorded on a tape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapeEvent {
    /// A self-inverse gate.
    Gate(Gate),
    /// `dest += src` (or `-=`) through a named adder module.
    Adder {
        /// Destination lines.
        dest: Vec<LineId>,
        /// Source lines.
        src: Vec<LineId>,
        /// Whether the module subtracts.
        subtract: bool,
    },
    /// A control was pushed.
    Push(LineId),
    /// A control was popped.
    Pop(LineId),
}

/// Recorded forward form of a computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tape {
    events: Vec<TapeEvent>,
}

impl Tape {
    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Recorded events in emission order.
    pub fn events(&self) -> &[TapeEvent] {
        &self.events
    }
}

/// Active-control stack backed by the control computation tree.
#[derive(Debug)]
pub struct ControlStack {
    tree: DiGraph<CctNode, ()>,
    root: NodeIndex,
    current: NodeIndex,
    stack: Vec<LineId>,
    tape: Option<Vec<TapeEvent>>,
    adder_widths: BTreeSet<usize>,
    num_gates: usize,
}

impl ControlStack {
    /// Create a tree with an empty root and its first leaf.
    pub fn new() -> Self {
        let mut tree = DiGraph::new();
        let root = tree.add_node(CctNode::default());
        let current = tree.add_node(CctNode::default());
        tree.add_edge(root, current, ());
        Self {
            tree,
            root,
            current,
            stack: vec![],
            tape: None,
            adder_widths: BTreeSet::new(),
            num_gates: 0,
        }
    }

    // =========================================================================
    // Controls
    // =========================================================================

    /// Activate `control` for every gate until the matching [`pop`](Self::pop).
    pub fn push(&mut self, control: LineId) {
        self.record(TapeEvent::Push(control));
        self.push_inner(control);
    }

    /// Deactivate `control`, which must be the most recently pushed control.
    pub fn pop(&mut self, control: LineId) {
        self.record(TapeEvent::Pop(control));
        self.pop_inner(control);
    }

    fn push_inner(&mut self, control: LineId) {
        let parent = self.parent(self.current).unwrap_or(self.root);
        let mut controls = self.tree[parent].controls.clone();
        controls.insert(control);

        let node = self.tree.add_node(CctNode {
            control: Some(control),
            controls: controls.clone(),
            gates: vec![],
        });
        self.tree.add_edge(parent, node, ());
        self.add_leaf(node, controls);
        self.stack.push(control);
    }

    fn pop_inner(&mut self, control: LineId) {
        debug_assert_eq!(
            self.stack.last(),
            Some(&control),
            "controls must be popped in reverse push order"
        );
        self.stack.pop();

        let node = self.parent(self.current).unwrap_or(self.root);
        let grandparent = self.parent(node).unwrap_or(self.root);
        let controls = self.tree[grandparent].controls.clone();
        self.add_leaf(grandparent, controls);
    }

    fn add_leaf(&mut self, parent: NodeIndex, controls: BTreeSet<LineId>) {
        let leaf = self.tree.add_node(CctNode {
            control: None,
            controls,
            gates: vec![],
        });
        self.tree.add_edge(parent, leaf, ());
        self.current = leaf;
    }

    /// Controls active for the next gate.
    pub fn controls(&self) -> &BTreeSet<LineId> {
        &self.tree[self.current].controls
    }

    /// Pushed controls, oldest first.
    pub fn active(&self) -> &[LineId] {
        &self.stack
    }

    // =========================================================================
    // Gates
    // =========================================================================

    /// Record a gate under the active controls.
    pub fn emit(&mut self, gate: Gate) {
        self.record(TapeEvent::Gate(gate.clone()));
        self.emit_inner(gate);
    }

    fn emit_inner(&mut self, gate: Gate) {
        self.tree[self.current].gates.push(gate);
        self.num_gates += 1;
    }

    /// Record a gate with every active control suspended.
    ///
    /// Used to prepare constant lines, which must hold their value whether
    /// or not the surrounding controls are satisfied. Never recorded on a tape.
    pub fn emit_uncontrolled(&mut self, gate: Gate) {
        let suspended = self.stack.clone();
        for control in suspended.iter().rev() {
            self.pop_inner(*control);
        }
        self.emit_inner(gate);
        for control in &suspended {
            self.push_inner(*control);
        }
    }

    /// NOT gate.
    pub fn not(&mut self, target: LineId) {
        self.emit(Gate::not(target));
    }

    /// CNOT gate.
    pub fn cnot(&mut self, control: LineId, target: LineId) {
        self.emit(Gate::cnot(control, target));
    }

    /// Multiple-controlled Toffoli gate.
    pub fn toffoli(&mut self, controls: impl IntoIterator<Item = LineId>, target: LineId) {
        self.emit(Gate::toffoli(controls, target));
    }

    /// Swap of two lines.
    pub fn fredkin(&mut self, a: LineId, b: LineId) {
        self.emit(Gate::fredkin([], a, b));
    }

    /// `dest += src` (or `dest -= src`) through the adder module of the width.
    pub fn adder(&mut self, dest: &[LineId], src: &[LineId], subtract: bool) {
        self.record(TapeEvent::Adder {
            dest: dest.to_vec(),
            src: src.to_vec(),
            subtract,
        });
        self.adder_inner(dest, src, subtract);
    }

    fn adder_inner(&mut self, dest: &[LineId], src: &[LineId], subtract: bool) {
        let width = src.len();
        if width == 0 {
            return;
        }
        self.adder_widths.insert(width);
        let name = if subtract {
            decrease_name(width)
        } else {
            increase_name(width)
        };
        let targets = src.iter().chain(dest).copied().collect();
        self.emit_inner(Gate::module(name, [], targets));
    }

    /// Widths of the adder modules the recorded gates refer to.
    pub fn adder_widths(&self) -> &BTreeSet<usize> {
        &self.adder_widths
    }

    /// Number of recorded gates.
    pub fn num_gates(&self) -> usize {
        self.num_gates
    }

    // =========================================================================
    // Tapes
    // =========================================================================

    /// Start recording. Tapes do not nest.
    pub fn begin_tape(&mut self) {
        debug_assert!(self.tape.is_none(), "tapes do not nest");
        self.tape = Some(vec![]);
    }

    /// Stop recording and return what was recorded.
    pub fn end_tape(&mut self) -> Tape {
        Tape {
            events: self.tape.take().unwrap_or_default(),
        }
    }

    /// Check whether a tape is open.
    pub fn is_recording(&self) -> bool {
        self.tape.is_some()
    }

    fn record(&mut self, event: TapeEvent) {
        if let Some(tape) = self.tape.as_mut() {
            tape.push(event);
        }
    }

    /// Emit the inverse of a recorded computation: events in reverse order,
    /// pushes and pops exchanged, additions turned into subtractions.
    pub fn replay_reversed(&mut self, tape: &Tape) {
        for event in tape.events.iter().rev() {
            match event {
                TapeEvent::Gate(gate) => self.emit(gate.clone()),
                TapeEvent::Adder {
                    dest,
                    src,
                    subtract,
                } => self.adder(dest, src, !subtract),
                TapeEvent::Push(control) => self.pop(*control),
                TapeEvent::Pop(control) => self.push(*control),
            }
        }
    }

    // =========================================================================
    // Tree access
    // =========================================================================

    /// Root of the tree.
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    /// Get a node.
    pub fn node(&self, index: NodeIndex) -> &CctNode {
        &self.tree[index]
    }

    /// Children of a node in creation order.
    pub fn children(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .tree
            .edges_directed(index, Direction::Outgoing)
            .map(|e| (e.id(), e.target()))
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, target)| target).collect()
    }

    /// Check whether a node is a leaf.
    pub fn is_leaf(&self, index: NodeIndex) -> bool {
        self.tree
            .edges_directed(index, Direction::Outgoing)
            .next()
            .is_none()
    }

    /// Leaves below `index` in creation order.
    pub fn leaves(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut leaves = vec![];
        let mut pending = vec![index];
        while let Some(node) = pending.pop() {
            if self.is_leaf(node) {
                leaves.push(node);
            } else {
                pending.extend(self.children(node).into_iter().rev());
            }
        }
        leaves
    }

    fn parent(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.tree
            .neighbors_directed(index, Direction::Incoming)
            .next()
    }
}

impl Default for ControlStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gates_in_order(stack: &ControlStack) -> Vec<(Gate, BTreeSet<LineId>)> {
        stack
            .leaves(stack.root())
            .into_iter()
            .flat_map(|leaf| {
                let node = stack.node(leaf);
                node.gates
                    .iter()
                    .map(|g| (g.clone(), node.controls.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_push_pop_structure() {
        let mut stack = ControlStack::new();
        stack.not(LineId(0));
        stack.push(LineId(5));
        stack.not(LineId(1));
        stack.push(LineId(6));
        stack.not(LineId(2));
        stack.pop(LineId(6));
        stack.not(LineId(3));
        stack.pop(LineId(5));
        stack.not(LineId(4));

        let gates = gates_in_order(&stack);
        let targets: Vec<_> = gates.iter().map(|(g, _)| g.targets[0].0).collect();
        assert_eq!(targets, vec![0, 1, 2, 3, 4]);

        let controls: Vec<Vec<u32>> = gates
            .iter()
            .map(|(_, c)| c.iter().map(|l| l.0).collect())
            .collect();
        assert_eq!(
            controls,
            vec![vec![], vec![5], vec![5, 6], vec![5], vec![]]
        );
        assert!(stack.active().is_empty());
        assert_eq!(stack.num_gates(), 5);
    }

    #[test]
    fn test_emit_uncontrolled() {
        let mut stack = ControlStack::new();
        stack.push(LineId(3));
        stack.emit_uncontrolled(Gate::not(LineId(0)));
        stack.not(LineId(1));
        stack.pop(LineId(3));

        let gates = gates_in_order(&stack);
        assert_eq!(gates.len(), 2);
        assert!(gates[0].1.is_empty());
        assert_eq!(gates[1].1.iter().copied().collect::<Vec<_>>(), vec![LineId(3)]);
    }

    #[test]
    fn test_tape_replay() {
        let mut stack = ControlStack::new();
        stack.begin_tape();
        stack.cnot(LineId(0), LineId(1));
        stack.push(LineId(2));
        stack.adder(&[LineId(3)], &[LineId(4)], false);
        stack.pop(LineId(2));
        let tape = stack.end_tape();
        assert_eq!(tape.len(), 4);
        assert!(!stack.is_recording());

        stack.replay_reversed(&tape);
        let gates = gates_in_order(&stack);
        let names: Vec<_> = gates.iter().map(|(g, _)| g.name()).collect();
        assert_eq!(names, vec!["t2", "increase_1", "decrease_1", "t2"]);
        assert!(gates[2].1.contains(&LineId(2)));
        assert!(stack.active().is_empty());
        assert!(stack.adder_widths().contains(&1));
    }

    #[test]
    fn test_tape_ignores_uncontrolled() {
        let mut stack = ControlStack::new();
        stack.begin_tape();
        stack.emit_uncontrolled(Gate::not(LineId(0)));
        assert!(stack.end_tape().is_empty());
    }
}

//! Property-based tests for reversible circuit simulation.
//!
//! Every gate is self-inverse, so running a circuit forward and then
//! backward must restore any basis state.

use proptest::prelude::*;
use revsyn_ir::{Circuit, Gate, LineId, simulate, simulate_reverse};

/// Generate a random circuit with 2-6 lines and up to 20 gates.
fn arb_circuit() -> impl Strategy<Value = Circuit> {
    (2_u32..=6).prop_flat_map(|num_lines| {
        (
            Just(num_lines),
            prop::collection::vec(arb_gate(num_lines), 0..=20),
        )
            .prop_map(|(n, gates)| {
                let mut circuit = Circuit::with_lines("random", n);
                for gate in gates {
                    // Generated gates are valid by construction.
                    let _ = circuit.append_gate(gate);
                }
                circuit
            })
    })
}

/// A gate over distinct lines of an `n`-line circuit.
fn arb_gate(n: u32) -> impl Strategy<Value = Gate> {
    (Just((0..n).collect::<Vec<u32>>()).prop_shuffle(), any::<bool>(), 0_usize..4).prop_map(
        move |(order, fredkin, num_controls)| {
            let lines: Vec<LineId> = order.into_iter().map(LineId).collect();
            if fredkin {
                let controls = num_controls.min(lines.len() - 2);
                Gate::fredkin(lines[2..2 + controls].iter().copied(), lines[0], lines[1])
            } else {
                let controls = num_controls.min(lines.len() - 1);
                Gate::toffoli(lines[1..1 + controls].iter().copied(), lines[0])
            }
        },
    )
}

fn pattern(bits: u64, width: usize) -> Vec<bool> {
    (0..width).map(|i| bits & (1 << i) != 0).collect()
}

proptest! {
    #[test]
    fn reverse_restores_input(circuit in arb_circuit(), bits in any::<u64>()) {
        let input = pattern(bits, circuit.num_lines());
        let output = simulate(&circuit, &input).unwrap();
        prop_assert_eq!(simulate_reverse(&circuit, &output).unwrap(), input);
    }

    #[test]
    fn simulation_is_a_permutation(circuit in arb_circuit()) {
        let width = circuit.num_lines();
        let mut seen = std::collections::BTreeSet::new();
        for bits in 0..(1_u64 << width) {
            let output = simulate(&circuit, &pattern(bits, width)).unwrap();
            prop_assert!(seen.insert(output));
        }
    }
}

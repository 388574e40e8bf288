//! Bit-level simulation of reversible circuits.

use crate::circuit::Circuit;
use crate::error::{IrError, IrResult};
use crate::gate::{Gate, GateKind};
use crate::line::Line;

/// Simulate the circuit on a basis state, one bit per line.
pub fn simulate(circuit: &Circuit, input: &[bool]) -> IrResult<Vec<bool>> {
    let gates = prepare(circuit, input)?;
    let mut state = input.to_vec();
    for gate in &gates {
        apply(gate, &mut state);
    }
    Ok(state)
}

/// Run the circuit backwards: every gate is self-inverse, so the inverse
/// circuit is the gate sequence in reverse order.
pub fn simulate_reverse(circuit: &Circuit, output: &[bool]) -> IrResult<Vec<bool>> {
    let gates = prepare(circuit, output)?;
    let mut state = output.to_vec();
    for gate in gates.iter().rev() {
        apply(gate, &mut state);
    }
    Ok(state)
}

/// Build an input pattern: constant lines take their constant value, every
/// other line is asked from `value`.
pub fn input_pattern(circuit: &Circuit, mut value: impl FnMut(&Line) -> bool) -> Vec<bool> {
    circuit
        .lines()
        .iter()
        .map(|line| line.constant.unwrap_or_else(|| value(line)))
        .collect()
}

/// Largest number of free inputs [`truth_table`] enumerates.
pub const MAX_TRUTH_TABLE_INPUTS: usize = 20;

/// Simulate every assignment of the non-constant lines.
///
/// Row `k` assigns bit `i` of `k` to the `i`-th non-constant line; constant
/// lines keep their value. Each row is the full output state.
pub fn truth_table(circuit: &Circuit) -> IrResult<Vec<Vec<bool>>> {
    let inputs = circuit
        .lines()
        .iter()
        .filter(|line| line.constant.is_none())
        .count();
    if inputs > MAX_TRUTH_TABLE_INPUTS {
        return Err(IrError::TooManyInputs {
            inputs,
            max: MAX_TRUTH_TABLE_INPUTS,
        });
    }

    let gates = circuit.flatten()?;
    let rows = (0..1_u64 << inputs)
        .map(|assignment| {
            let mut bit = 0;
            let mut state = input_pattern(circuit, |_| {
                let value = assignment & (1 << bit) != 0;
                bit += 1;
                value
            });
            for gate in &gates {
                apply(gate, &mut state);
            }
            state
        })
        .collect();
    Ok(rows)
}

fn prepare(circuit: &Circuit, pattern: &[bool]) -> IrResult<Vec<Gate>> {
    if pattern.len() != circuit.num_lines() {
        return Err(IrError::InputWidthMismatch {
            expected: circuit.num_lines(),
            got: pattern.len(),
        });
    }
    circuit.flatten()
}

fn apply(gate: &Gate, state: &mut [bool]) {
    if !gate.controls.iter().all(|c| state[c.index()]) {
        return;
    }
    match gate.kind {
        GateKind::Toffoli => {
            let t = gate.targets[0].index();
            state[t] = !state[t];
        }
        GateKind::Fredkin => state.swap(gate.targets[0].index(), gate.targets[1].index()),
        // expanded by `Circuit::flatten`
        GateKind::Module(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::LineId;

    #[test]
    fn test_toffoli_truth_table() {
        let mut circuit = Circuit::with_lines("ccx", 3);
        circuit
            .append_toffoli([LineId(0), LineId(1)], LineId(2))
            .unwrap();

        assert_eq!(
            simulate(&circuit, &[true, true, false]).unwrap(),
            vec![true, true, true]
        );
        assert_eq!(
            simulate(&circuit, &[true, false, false]).unwrap(),
            vec![true, false, false]
        );
    }

    #[test]
    fn test_fredkin_swaps_when_controlled() {
        let mut circuit = Circuit::with_lines("cswap", 3);
        circuit
            .append_fredkin([LineId(0)], LineId(1), LineId(2))
            .unwrap();

        assert_eq!(
            simulate(&circuit, &[true, true, false]).unwrap(),
            vec![true, false, true]
        );
        assert_eq!(
            simulate(&circuit, &[false, true, false]).unwrap(),
            vec![false, true, false]
        );
    }

    #[test]
    fn test_reverse_undoes_forward() {
        let mut circuit = Circuit::with_lines("mix", 3);
        circuit
            .append_cnot(LineId(0), LineId(1))
            .unwrap()
            .append_toffoli([LineId(1), LineId(2)], LineId(0))
            .unwrap()
            .append_fredkin([LineId(0)], LineId(1), LineId(2))
            .unwrap();

        for bits in 0..8_u32 {
            let input: Vec<bool> = (0..3).map(|i| bits & (1 << i) != 0).collect();
            let output = simulate(&circuit, &input).unwrap();
            assert_eq!(simulate_reverse(&circuit, &output).unwrap(), input);
        }
    }

    #[test]
    fn test_width_mismatch() {
        let circuit = Circuit::with_lines("w", 2);
        assert!(matches!(
            simulate(&circuit, &[true]),
            Err(IrError::InputWidthMismatch {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn test_truth_table_skips_constants() {
        let mut circuit = Circuit::new("and");
        let a = circuit.add_line("a", "a", None, false);
        let b = circuit.add_line("b", "b", None, false);
        let c = circuit.add_line("const_0", "a&b", Some(false), false);
        circuit.append_toffoli([a, b], c).unwrap();

        let table = truth_table(&circuit).unwrap();
        assert_eq!(
            table,
            vec![
                vec![false, false, false],
                vec![true, false, false],
                vec![false, true, false],
                vec![true, true, true],
            ]
        );
    }

    #[test]
    fn test_truth_table_input_limit() {
        let circuit = Circuit::with_lines("wide", MAX_TRUTH_TABLE_INPUTS as u32 + 1);
        assert!(matches!(
            truth_table(&circuit),
            Err(IrError::TooManyInputs { inputs: 21, max: 20 })
        ));
    }

    #[test]
    fn test_input_pattern_uses_constants() {
        let mut circuit = Circuit::new("p");
        circuit.add_line("a", "a", None, false);
        circuit.add_line("const_1", "garbage", Some(true), true);
        let pattern = input_pattern(&circuit, |_| false);
        assert_eq!(pattern, vec![false, true]);
    }
}

//! Reversible arithmetic and logic building blocks.
//!
//! Every function emits gates through a [`ControlStack`], so each block is
//! implicitly controlled by whatever controls are active. Registers are
//! slices of lines, least significant bit first. Unless noted otherwise the
//! result register `dest` must hold 0 on entry and the operands are
//! restored on exit.
//!
//! Plain addition and subtraction are emitted as `increase_{n}` /
//! `decrease_{n}` module gates; see [`increase_circuit`].

use revsyn_ir::{Circuit, Gate, LineId};

use crate::cct::ControlStack;
use crate::error::SynthResult;

/// Name of the adder module of width `n`.
pub fn increase_name(n: usize) -> String {
    format!("increase_{n}")
}

/// Name of the subtractor module of width `n`.
pub fn decrease_name(n: usize) -> String {
    format!("decrease_{n}")
}

/// Ripple adder without ancilla: `dest += src`, `carry ^= carry-out`.
fn adder_gates(dest: &[LineId], src: &[LineId], carry: Option<LineId>) -> Vec<Gate> {
    debug_assert_eq!(dest.len(), src.len());
    let n = src.len();
    let (a, b) = (src, dest);
    let mut gates = vec![];
    if n == 0 {
        return gates;
    }

    for i in 1..n {
        gates.push(Gate::cnot(a[i], b[i]));
    }
    if let Some(carry) = carry {
        if n > 1 {
            gates.push(Gate::cnot(a[n - 1], carry));
        }
    }
    for i in (1..n - 1).rev() {
        gates.push(Gate::cnot(a[i], a[i + 1]));
    }
    for i in 0..n - 1 {
        gates.push(Gate::toffoli([b[i], a[i]], a[i + 1]));
    }
    if let Some(carry) = carry {
        gates.push(Gate::toffoli([b[n - 1], a[n - 1]], carry));
    }
    for i in (1..n).rev() {
        gates.push(Gate::cnot(a[i], b[i]));
        gates.push(Gate::toffoli([b[i - 1], a[i - 1]], a[i]));
    }
    for i in 1..n.saturating_sub(1) {
        gates.push(Gate::cnot(a[i], a[i + 1]));
    }
    for i in 0..n {
        gates.push(Gate::cnot(a[i], b[i]));
    }
    gates
}

fn lines(range: std::ops::Range<usize>) -> Vec<LineId> {
    range.map(LineId::from).collect()
}

/// Module circuit of `dest += src` over `2n` lines: `src` on lines
/// `0..n`, `dest` on lines `n..2n`.
pub fn increase_circuit(n: usize) -> SynthResult<Circuit> {
    let mut circuit = Circuit::with_lines(increase_name(n), u32::try_from(2 * n).unwrap_or(0));
    for gate in adder_gates(&lines(n..2 * n), &lines(0..n), None) {
        circuit.append_gate(gate)?;
    }
    Ok(circuit)
}

/// Module circuit of `dest -= src`, the inverse of [`increase_circuit`].
pub fn decrease_circuit(n: usize) -> SynthResult<Circuit> {
    let mut circuit = Circuit::with_lines(decrease_name(n), u32::try_from(2 * n).unwrap_or(0));
    for gate in adder_gates(&lines(n..2 * n), &lines(0..n), None)
        .into_iter()
        .rev()
    {
        circuit.append_gate(gate)?;
    }
    Ok(circuit)
}

fn emit_all(stack: &mut ControlStack, gates: Vec<Gate>) {
    for gate in gates {
        stack.emit(gate);
    }
}

// =============================================================================
// Addition
// =============================================================================

/// `dest += src`.
pub fn increase(stack: &mut ControlStack, dest: &[LineId], src: &[LineId]) {
    stack.adder(dest, src, false);
}

/// `dest -= src`.
pub fn decrease(stack: &mut ControlStack, dest: &[LineId], src: &[LineId]) {
    stack.adder(dest, src, true);
}

/// `dest += src`, toggling `carry` on overflow.
pub fn increase_with_carry(
    stack: &mut ControlStack,
    dest: &[LineId],
    src: &[LineId],
    carry: LineId,
) {
    emit_all(stack, adder_gates(dest, src, Some(carry)));
}

/// `dest -= src`, toggling `carry` when `dest < src` (borrow).
pub fn decrease_with_carry(
    stack: &mut ControlStack,
    dest: &[LineId],
    src: &[LineId],
    carry: LineId,
) {
    bitwise_negation(stack, dest);
    increase_with_carry(stack, dest, src, carry);
    bitwise_negation(stack, dest);
}

/// `dest += 1`.
pub fn increment(stack: &mut ControlStack, dest: &[LineId]) {
    for &line in dest {
        stack.push(line);
    }
    for &line in dest.iter().rev() {
        stack.pop(line);
        stack.not(line);
    }
}

/// `dest -= 1`.
pub fn decrement(stack: &mut ControlStack, dest: &[LineId]) {
    for &line in dest {
        stack.not(line);
        stack.push(line);
    }
    for &line in dest.iter().rev() {
        stack.pop(line);
    }
}

// =============================================================================
// Bitwise and logical operators
// =============================================================================

/// `dest ^= src`.
pub fn bitwise_cnot(stack: &mut ControlStack, dest: &[LineId], src: &[LineId]) {
    for (&d, &s) in dest.iter().zip(src) {
        stack.cnot(s, d);
    }
}

/// Invert every line of `dest`.
pub fn bitwise_negation(stack: &mut ControlStack, dest: &[LineId]) {
    for &line in dest {
        stack.not(line);
    }
}

/// `dest ^= src1 & src2`.
pub fn bitwise_and(stack: &mut ControlStack, dest: &[LineId], src1: &[LineId], src2: &[LineId]) {
    for ((&d, &a), &b) in dest.iter().zip(src1).zip(src2) {
        stack.toffoli([a, b], d);
    }
}

/// `dest ^= src1 | src2`.
pub fn bitwise_or(stack: &mut ControlStack, dest: &[LineId], src1: &[LineId], src2: &[LineId]) {
    for ((&d, &a), &b) in dest.iter().zip(src1).zip(src2) {
        stack.cnot(a, d);
        stack.cnot(b, d);
        stack.toffoli([a, b], d);
    }
}

/// `dest ^= src1 && src2` on single bits.
pub fn conjunction(stack: &mut ControlStack, dest: LineId, src1: LineId, src2: LineId) {
    stack.toffoli([src1, src2], dest);
}

/// `dest ^= src1 || src2` on single bits.
pub fn disjunction(stack: &mut ControlStack, dest: LineId, src1: LineId, src2: LineId) {
    bitwise_or(stack, &[dest], &[src1], &[src2]);
}

/// `dest ^= (src == 0)`.
pub fn logical_not(stack: &mut ControlStack, dest: LineId, src: &[LineId]) {
    bitwise_negation(stack, src);
    stack.toffoli(src.iter().copied(), dest);
    bitwise_negation(stack, src);
}

// =============================================================================
// Comparison
// =============================================================================

/// `dest ^= src1 == src2`.
pub fn equals(stack: &mut ControlStack, dest: LineId, src1: &[LineId], src2: &[LineId]) {
    for (&a, &b) in src1.iter().zip(src2) {
        stack.cnot(b, a);
        stack.not(a);
    }
    stack.toffoli(src1.iter().copied(), dest);
    for (&a, &b) in src1.iter().zip(src2).rev() {
        stack.not(a);
        stack.cnot(b, a);
    }
}

/// `dest ^= src1 != src2`.
pub fn not_equals(stack: &mut ControlStack, dest: LineId, src1: &[LineId], src2: &[LineId]) {
    equals(stack, dest, src1, src2);
    stack.not(dest);
}

/// `dest ^= src1 < src2`.
pub fn less_than(stack: &mut ControlStack, dest: LineId, src1: &[LineId], src2: &[LineId]) {
    debug_assert_eq!(src1.len(), src2.len());
    let n = src1.len();
    if n == 0 {
        return;
    }
    bitwise_cnot(stack, src1, src2);

    // src1[i] now marks a differing bit; scan from the top, requiring all
    // higher bits to be equal (their marks inverted to 1).
    let mut controls = vec![];
    for i in (1..n).rev() {
        controls.push(src1[i]);
        stack.toffoli(controls.iter().copied().chain([src2[i]]), dest);
        stack.not(src1[i]);
    }
    controls.push(src1[0]);
    controls.push(src2[0]);
    stack.toffoli(controls, dest);

    bitwise_negation(stack, &src1[1..]);
    for (&a, &b) in src1.iter().zip(src2).rev() {
        stack.cnot(b, a);
    }
}

/// `dest ^= src1 > src2`.
pub fn greater_than(stack: &mut ControlStack, dest: LineId, src1: &[LineId], src2: &[LineId]) {
    less_than(stack, dest, src2, src1);
}

/// `dest ^= src1 <= src2`.
pub fn less_equals(stack: &mut ControlStack, dest: LineId, src1: &[LineId], src2: &[LineId]) {
    less_than(stack, dest, src2, src1);
    stack.not(dest);
}

/// `dest ^= src1 >= src2`.
pub fn greater_equals(stack: &mut ControlStack, dest: LineId, src1: &[LineId], src2: &[LineId]) {
    less_than(stack, dest, src1, src2);
    stack.not(dest);
}

// =============================================================================
// Multiplication and division
// =============================================================================

/// `dest = (src1 * src2) mod 2^n`.
pub fn multiplication(
    stack: &mut ControlStack,
    dest: &[LineId],
    src1: &[LineId],
    src2: &[LineId],
) {
    if src1.is_empty() || dest.is_empty() {
        return;
    }
    let mut sum = dest;
    let mut partial = src2;

    stack.push(src1[0]);
    bitwise_cnot(stack, sum, partial);
    stack.pop(src1[0]);

    for &bit in &src1[1..dest.len().min(src1.len())] {
        sum = &sum[1..];
        partial = &partial[..partial.len() - 1];
        stack.push(bit);
        increase(stack, sum, partial);
        stack.pop(bit);
    }
}

/// `dest = src1 * src2` with `dest` twice as wide as the operands.
pub fn multiplication_full(
    stack: &mut ControlStack,
    dest: &[LineId],
    src1: &[LineId],
    src2: &[LineId],
) {
    let n = src1.len();
    if n == 0 {
        return;
    }
    debug_assert_eq!(dest.len(), 2 * n);
    let mut sum = dest[..n].to_vec();

    stack.push(src1[0]);
    bitwise_cnot(stack, &sum, src2);
    stack.pop(src1[0]);

    for i in 1..n {
        sum.remove(0);
        sum.push(dest[n + i - 1]);
        stack.push(src1[i]);
        increase_with_carry(stack, &sum, src2, dest[n + i]);
        stack.pop(src1[i]);
    }
}

/// Restoring division: `src1` becomes `src1 % src2`, `dest` receives the
/// quotient. Division by zero yields an all-ones quotient and leaves
/// `src1` unchanged.
pub fn modulo(stack: &mut ControlStack, dest: &[LineId], src1: &[LineId], src2: &[LineId]) {
    let n = src1.len();
    if n == 0 {
        return;
    }

    // Shifted divisor only fits while its upper bits are zero.
    bitwise_negation(stack, &src2[1..]);
    for &line in &src2[1..] {
        stack.push(line);
    }

    let mut sum = vec![];
    let mut partial = vec![];
    for i in (0..n).rev() {
        partial.push(src2[n - 1 - i]);
        sum.insert(0, src1[i]);
        decrease_with_carry(stack, &sum, &partial, dest[i]);
        stack.push(dest[i]);
        increase(stack, &sum, &partial);
        stack.pop(dest[i]);
        stack.not(dest[i]);

        if i > 0 {
            for &line in src2[n - i..].iter().rev() {
                stack.pop(line);
            }
            stack.not(src2[n - i]);
            for &line in &src2[n + 1 - i..] {
                stack.push(line);
            }
        }
    }
}

/// `dest = src1 / src2`; `src1` is restored.
pub fn division(stack: &mut ControlStack, dest: &[LineId], src1: &[LineId], src2: &[LineId]) {
    modulo(stack, dest, src1, src2);

    let n = src1.len();
    let mut sum = vec![];
    let mut partial = vec![];
    for i in (0..n).rev() {
        partial.push(src2[n - 1 - i]);
        sum.insert(0, src1[i]);
        stack.push(dest[i]);
        increase(stack, &sum, &partial);
        stack.pop(dest[i]);
    }
}

// =============================================================================
// Shifts and swap
// =============================================================================

/// `dest ^= src << amount`.
pub fn left_shift(stack: &mut ControlStack, dest: &[LineId], src: &[LineId], amount: usize) {
    for (i, &s) in src.iter().enumerate() {
        match i.checked_add(amount).and_then(|j| dest.get(j)) {
            Some(&d) => stack.cnot(s, d),
            None => break,
        }
    }
}

/// `dest ^= src >> amount`.
pub fn right_shift(stack: &mut ControlStack, dest: &[LineId], src: &[LineId], amount: usize) {
    for (i, &s) in src.iter().enumerate().skip(amount) {
        stack.cnot(s, dest[i - amount]);
    }
}

/// Exchange two registers bit by bit.
pub fn swap(stack: &mut ControlStack, dest1: &[LineId], dest2: &[LineId]) {
    for (&a, &b) in dest1.iter().zip(dest2) {
        stack.fredkin(a, b);
    }
}

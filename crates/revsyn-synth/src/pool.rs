//! Constant-line pool and the used-lines ledger.
//!
//! Scratch lines are handed out from two free lists, one per known value.
//! Every allocation pushes a [`ConstantLine`] record on a LIFO ledger;
//! releases pop it again. Callers take a [`ScratchMark`] before evaluating
//! something and release back to it afterwards, which keeps allocation and
//! release strictly nested.

use tracing::{error, trace};

use revsyn_ir::{Circuit, Gate, LineId};

use crate::cct::ControlStack;
use crate::error::SynthResult;

/// Ledger record of one allocated line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantLine {
    /// Whether the line was taken from the opposite-value list and inverted.
    pub inverted: bool,
    /// Value the line held when it was handed out.
    pub value: bool,
    /// The allocated line.
    pub line: LineId,
}

/// Ledger depth at some point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScratchMark(usize);

/// Pool of constant lines.
#[derive(Debug, Default)]
pub struct ConstantLinePool {
    free: [Vec<LineId>; 2],
    used: Vec<ConstantLine>,
    out_of_order: usize,
}

/// Output name of a line restored to `value`.
pub fn constant_output(value: bool) -> &'static str {
    if value { "const_1" } else { "const_0" }
}

impl ConstantLinePool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out one line holding `value`.
    ///
    /// Prefers a free line with the same value, then an opposite-value free
    /// line (inverted with all controls suspended), then a new circuit line.
    pub fn allocate_line(
        &mut self,
        circuit: &mut Circuit,
        stack: &mut ControlStack,
        value: bool,
    ) -> SynthResult<LineId> {
        let record = if let Some(line) = self.free[usize::from(value)].pop() {
            ConstantLine {
                inverted: false,
                value,
                line,
            }
        } else if let Some(line) = self.free[usize::from(!value)].pop() {
            stack.emit_uncontrolled(Gate::not(line));
            ConstantLine {
                inverted: true,
                value,
                line,
            }
        } else {
            let line = circuit.add_line(constant_output(value), "garbage", Some(value), true);
            ConstantLine {
                inverted: false,
                value,
                line,
            }
        };
        circuit.set_output(record.line, "garbage")?;
        circuit.set_garbage(record.line, true)?;
        trace!(line = %record.line, value, inverted = record.inverted, "allocated constant line");

        self.used.push(record);
        Ok(record.line)
    }

    /// Hand out `width` lines holding the bits of `value`, least significant
    /// first. The most significant line ends up on top of the ledger.
    pub fn allocate(
        &mut self,
        circuit: &mut Circuit,
        stack: &mut ControlStack,
        width: usize,
        value: u64,
    ) -> SynthResult<Vec<LineId>> {
        (0..width)
            .map(|bit| {
                let set = u32::try_from(bit)
                    .ok()
                    .and_then(|b| value.checked_shr(b))
                    .is_some_and(|v| v & 1 == 1);
                self.allocate_line(circuit, stack, set)
            })
            .collect()
    }

    /// Current ledger position.
    pub fn mark(&self) -> ScratchMark {
        ScratchMark(self.used.len())
    }

    /// Release everything allocated after `mark`, newest first.
    pub fn release_to(
        &mut self,
        circuit: &mut Circuit,
        stack: &mut ControlStack,
        mark: ScratchMark,
    ) -> SynthResult<()> {
        debug_assert!(mark.0 <= self.used.len(), "scratch mark above ledger top");
        while self.used.len() > mark.0 {
            self.release_top(circuit, stack)?;
        }
        Ok(())
    }

    /// Release the most recent allocation.
    ///
    /// The line must hold the value it was handed out with.
    pub fn release_top(&mut self, circuit: &mut Circuit, stack: &mut ControlStack) -> SynthResult<()> {
        let Some(record) = self.used.pop() else {
            debug_assert!(false, "release from an empty ledger");
            return Ok(());
        };
        self.give_back(circuit, stack, record)
    }

    /// Release a specific line.
    ///
    /// Anything but the ledger top is an out-of-order release: it is still
    /// honoured, but counted and reported.
    pub fn release(
        &mut self,
        circuit: &mut Circuit,
        stack: &mut ControlStack,
        line: LineId,
    ) -> SynthResult<()> {
        let Some(position) = self.used.iter().rposition(|r| r.line == line) else {
            error!(%line, "release of a line that is not allocated");
            self.out_of_order += 1;
            return Ok(());
        };
        if position + 1 != self.used.len() {
            error!(%line, depth = self.used.len(), position, "out-of-order constant line release");
            self.out_of_order += 1;
        }
        let record = self.used.remove(position);
        self.give_back(circuit, stack, record)
    }

    fn give_back(
        &mut self,
        circuit: &mut Circuit,
        stack: &mut ControlStack,
        record: ConstantLine,
    ) -> SynthResult<()> {
        let mut value = record.value;
        if record.inverted {
            stack.emit_uncontrolled(Gate::not(record.line));
            value = !value;
        }
        self.restore(circuit, record.line, value)
    }

    /// Drop the most recent allocation from the ledger without releasing
    /// it; the line stays garbage.
    pub fn keep_top(&mut self) -> Option<ConstantLine> {
        let record = self.used.pop();
        if let Some(record) = &record {
            trace!(line = %record.line, "constant line kept as garbage");
        }
        record
    }

    /// Drop everything allocated after `mark` from the ledger without
    /// releasing it.
    pub fn keep_to(&mut self, mark: ScratchMark) {
        while self.used.len() > mark.0 {
            self.keep_top();
        }
    }

    /// Return a line that is not on the ledger and is known to hold `value`.
    pub fn restore(&mut self, circuit: &mut Circuit, line: LineId, value: bool) -> SynthResult<()> {
        circuit.set_output(line, constant_output(value))?;
        circuit.set_garbage(line, false)?;
        trace!(%line, value, "released constant line");
        self.free[usize::from(value)].push(line);
        Ok(())
    }

    /// Free lines currently holding `value`.
    pub fn free_lines(&self, value: bool) -> &[LineId] {
        &self.free[usize::from(value)]
    }

    /// Total number of free lines.
    pub fn num_free(&self) -> usize {
        self.free[0].len() + self.free[1].len()
    }

    /// Number of allocations not yet released.
    pub fn ledger_depth(&self) -> usize {
        self.used.len()
    }

    /// Ledger records, oldest first.
    pub fn ledger(&self) -> &[ConstantLine] {
        &self.used
    }

    /// Number of releases that did not pop the ledger top.
    pub fn out_of_order_releases(&self) -> usize {
        self.out_of_order
    }
}

//! Shared helpers for synthesis integration tests.

#![allow(dead_code)]

use revsyn_ir::{Circuit, LineId, input_pattern, simulate, simulate_reverse};
use revsyn_lang::{Module, Program};
use revsyn_synth::{SynthesisSettings, SynthesisStatistics, synthesize};

/// Install a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Wrap modules into a program.
pub fn program(modules: Vec<Module>) -> Program {
    let mut program = Program::new();
    for module in modules {
        program.add_module(module);
    }
    program
}

/// Synthesize `program` into a fresh circuit.
pub fn synth(program: &Program, settings: &SynthesisSettings) -> (Circuit, SynthesisStatistics) {
    init_tracing();
    let mut circuit = Circuit::new("test");
    let stats = synthesize(&mut circuit, program, settings).unwrap();
    (circuit, stats)
}

/// Lines of the variable `name`, looked up in the circuit's buses.
pub fn bus(circuit: &Circuit, name: &str) -> Vec<LineId> {
    circuit
        .inputbuses()
        .get(name)
        .or_else(|| circuit.outputbuses().get(name))
        .or_else(|| circuit.statesignals().get(name))
        .unwrap_or_else(|| panic!("no bus named '{name}'"))
        .to_vec()
}

/// Simulated circuit state.
pub struct Run<'c> {
    pub circuit: &'c Circuit,
    pub input: Vec<bool>,
    pub output: Vec<bool>,
}

impl Run<'_> {
    /// Value of variable `name` after the run.
    pub fn get(&self, name: &str) -> u64 {
        read(&self.output, &bus(self.circuit, name))
    }

    /// Value of variable `name` before the run.
    pub fn before(&self, name: &str) -> u64 {
        read(&self.input, &bus(self.circuit, name))
    }

    /// Whether every constant line that is not garbage holds its constant
    /// again.
    pub fn constants_restored(&self) -> bool {
        self.circuit
            .lines()
            .iter()
            .enumerate()
            .filter(|(_, line)| line.output.starts_with("const_"))
            .all(|(i, line)| line.constant == Some(self.output[i]))
    }

    /// Whether running the circuit backwards recovers the input.
    pub fn reversible(&self) -> bool {
        simulate_reverse(self.circuit, &self.output).unwrap() == self.input
    }
}

/// Simulate `circuit` with variables set to `values`; unnamed lines start at
/// their constant, or 0.
pub fn run<'c>(circuit: &'c Circuit, values: &[(&str, u64)]) -> Run<'c> {
    let mut input = input_pattern(circuit, |_| false);
    for &(name, value) in values {
        for (bit, line) in bus(circuit, name).into_iter().enumerate() {
            input[line.index()] = (value >> bit) & 1 == 1;
        }
    }
    let output = simulate(circuit, &input).unwrap();
    Run {
        circuit,
        input,
        output,
    }
}

fn read(state: &[bool], lines: &[LineId]) -> u64 {
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| state[line.index()])
        .map(|(bit, _)| 1 << bit)
        .sum()
}

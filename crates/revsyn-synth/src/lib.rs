//! Revsyn Synthesis Engine
//!
//! This crate compiles reversible programs (see [`revsyn_lang`]) into
//! reversible circuits (see [`revsyn_ir`]) without leaving garbage: every
//! scratch line used to evaluate an expression is uncomputed and returned
//! to a pool of constant lines before the statement ends.
//!
//! # Core Components
//!
//! - **Pool**: [`ConstantLinePool`] hands out and reclaims constant lines
//! - **Control stack**: [`ControlStack`] records gates per control context
//! - **Arithmetic**: the [`arith`] library of reversible building blocks
//! - **Synthesizer**: [`Synthesizer`] translates statements and expressions
//! - **Assembly**: [`assemble`] flattens the control computation tree
//!
//! # Example: `a += 3`
//!
//! ```rust
//! use revsyn_ir::{Circuit, input_pattern, simulate};
//! use revsyn_lang::{AssignOp, Expression, Module, Program, Statement, Variable,
//!     VariableAccess, VariableType};
//! use revsyn_synth::{SynthesisSettings, synthesize};
//!
//! let mut main = Module::new("main");
//! let a = main.add_parameter(Variable::new("a", VariableType::Inout, 4));
//! main.add_statement(Statement::assign(
//!     VariableAccess::new(a),
//!     AssignOp::Add,
//!     Expression::numeric(3, 4),
//! ));
//! let mut program = Program::new();
//! program.add_module(main);
//!
//! let mut circuit = Circuit::new("main");
//! let stats = synthesize(&mut circuit, &program, &SynthesisSettings::default()).unwrap();
//! assert!(stats.num_gates > 0);
//!
//! // a = 5 (LSB first), constant lines at their declared values
//! let mut bits = [true, false, true, false].into_iter();
//! let input = input_pattern(&circuit, |_| bits.next().unwrap_or(false));
//! let output = simulate(&circuit, &input).unwrap();
//! assert_eq!(&output[..4], &[false, false, false, true]);
//! ```

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, instrument};

use revsyn_ir::Circuit;
use revsyn_lang::Program;

pub mod analysis;
pub mod arith;
pub mod assemble;
pub mod cct;
pub mod error;
pub mod pool;
pub mod settings;
pub mod synthesizer;

pub use analysis::ProgramAnalysis;
pub use assemble::assemble;
pub use cct::{CctNode, ControlStack, Tape, TapeEvent};
pub use error::{SynthError, SynthResult};
pub use pool::{ConstantLine, ConstantLinePool, ScratchMark};
pub use settings::{IfRealization, SynthesisSettings};
pub use synthesizer::{MAX_SELECTOR_WIDTH, Operand, Synthesizer};

/// Summary of a synthesis run.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisStatistics {
    /// Wall-clock time spent.
    pub runtime: Duration,
    /// Lines of the produced circuit.
    pub num_lines: usize,
    /// Top-level gates of the produced circuit.
    pub num_gates: usize,
    /// Quantum cost with module gates expanded.
    pub quantum_cost: u64,
    /// Lines whose output is garbage.
    pub garbage_lines: usize,
    /// Constant lines released out of allocation order.
    pub out_of_order_releases: usize,
}

/// Synthesize the main module of `program` into `circuit`.
///
/// The main module is `settings.main_module` when set, otherwise the module
/// named `main`, otherwise the first module of the program.
#[instrument(skip_all, fields(circuit = %circuit.name()))]
pub fn synthesize(
    circuit: &mut Circuit,
    program: &Program,
    settings: &SynthesisSettings,
) -> SynthResult<SynthesisStatistics> {
    let start = Instant::now();
    if program.modules.is_empty() {
        return Err(SynthError::NoModules);
    }
    let main = program
        .main_module(settings.main_module.as_deref())
        .ok_or_else(|| {
            SynthError::UnknownModule(settings.main_module.clone().unwrap_or_default())
        })?;
    info!(
        module = %main.name,
        modules = program.modules.len(),
        garbage_free = settings.garbage_free,
        "starting synthesis"
    );

    let analysis = ProgramAnalysis::new(program);
    let mut synthesizer = Synthesizer::new(circuit, program, &analysis, settings);
    synthesizer.on_module(main)?;
    let out_of_order_releases = synthesizer.pool().out_of_order_releases();
    synthesizer.finish()?;

    let stats = SynthesisStatistics {
        runtime: start.elapsed(),
        num_lines: circuit.num_lines(),
        num_gates: circuit.num_gates(),
        quantum_cost: circuit.quantum_cost()?,
        garbage_lines: circuit.num_garbage(),
        out_of_order_releases,
    };
    info!(
        lines = stats.num_lines,
        gates = stats.num_gates,
        quantum_cost = stats.quantum_cost,
        garbage = stats.garbage_lines,
        elapsed_ms = stats.runtime.as_millis() as u64,
        "synthesis finished"
    );
    Ok(stats)
}

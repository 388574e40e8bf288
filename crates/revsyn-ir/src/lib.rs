//! Revsyn Reversible Circuit Intermediate Representation
//!
//! This crate provides the circuit container that the synthesis engine
//! emits into. A [`Circuit`] is an ordered list of reversible gates over a
//! fixed set of lines; every line records its input and output names,
//! whether it starts as a known constant and whether its output is garbage.
//!
//! # Core Components
//!
//! - **Lines**: [`LineId`] and [`Line`] with constant/garbage metadata
//! - **Gates**: [`Gate`] with [`GateKind`] Toffoli, Fredkin or module embedding
//! - **Circuit**: [`Circuit`] builder with named sub-circuits and buses
//! - **Simulation**: [`simulate`], [`simulate_reverse`] and [`truth_table`]
//! - **Costs**: quantum and transistor cost models
//! - **Exchange**: [`write_realization`] and [`read_realization`] for the RevLib
//!   `.real` format
//!
//! # Example: a controlled increment
//!
//! ```rust
//! use revsyn_ir::{Circuit, LineId, simulate};
//!
//! let mut circuit = Circuit::with_lines("inc", 3);
//! circuit
//!     .append_toffoli([LineId(0), LineId(1)], LineId(2))
//!     .unwrap()
//!     .append_cnot(LineId(0), LineId(1))
//!     .unwrap()
//!     .append_not(LineId(0))
//!     .unwrap();
//!
//! // 3 + 1 = 4 on a 3-bit register (LSB first)
//! let output = simulate(&circuit, &[true, true, false]).unwrap();
//! assert_eq!(output, vec![false, false, true]);
//! ```

pub mod bus;
pub mod circuit;
pub mod cost;
pub mod error;
pub mod gate;
pub mod line;
pub mod real;
pub mod simulation;

pub use bus::BusCollection;
pub use circuit::Circuit;
pub use cost::{gate_quantum_cost, gate_transistor_cost, quantum_cost};
pub use error::{IrError, IrResult};
pub use gate::{Gate, GateKind};
pub use line::{Line, LineId};
pub use real::{
    RealizationSettings, parse_realization, read_realization, to_realization_string,
    write_realization,
};
pub use simulation::{
    MAX_TRUTH_TABLE_INPUTS, input_pattern, simulate, simulate_reverse, truth_table,
};

//! Program representation for the revsyn reversible language.
//!
//! Programs consist of modules with typed bit-vector (and array)
//! parameters and locals, and statements that are reversible by
//! construction: `+=`, `-=`, `^=`, swaps, unary updates, conditionals with
//! a closing guard, bounded loops and `call`/`uncall`.
//!
//! The synthesis engine walks this representation read-only. Variables are
//! referred to by [`VarId`], an index into the enclosing module's
//! declaration list.
//!
//! # Example
//!
//! ```rust
//! use revsyn_lang::{
//!     AssignOp, Expression, Module, Program, Statement, Variable, VariableAccess, VariableType,
//! };
//!
//! let mut module = Module::new("main");
//! let a = module.add_parameter(Variable::new("a", VariableType::Inout, 4));
//! module.add_statement(Statement::assign(
//!     VariableAccess::new(a),
//!     AssignOp::Add,
//!     Expression::numeric(3, 4),
//! ));
//!
//! let mut program = Program::new();
//! program.add_module(module);
//! assert_eq!(program.main_module(None).unwrap().statements.len(), 1);
//! ```

pub mod error;
pub mod expression;
pub mod module;
pub mod number;
pub mod statement;
pub mod variable;

pub use error::{LangError, LangResult};
pub use expression::{BinaryOp, Expression, ShiftOp, UnaryOp, mask};
pub use module::{Module, Program};
pub use number::{LoopVariables, Number, NumberOp};
pub use statement::{
    AssignOp, CallStatement, ForStatement, IfStatement, Statement, UnaryStatementOp,
    reverse_statements,
};
pub use variable::{VarId, Variable, VariableAccess, VariableType};

//! Statements and their algebraic inverses.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::expression::Expression;
use crate::module::{Module, Program};
use crate::number::Number;
use crate::variable::{VarId, VariableAccess};

/// Unary statement operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryStatementOp {
    /// `~=`
    Invert,
    /// `++=`
    Increment,
    /// `--=`
    Decrement,
}

impl UnaryStatementOp {
    /// The operator undoing this one.
    pub fn inverse(self) -> Self {
        match self {
            UnaryStatementOp::Invert => UnaryStatementOp::Invert,
            UnaryStatementOp::Increment => UnaryStatementOp::Decrement,
            UnaryStatementOp::Decrement => UnaryStatementOp::Increment,
        }
    }

    /// Source symbol of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryStatementOp::Invert => "~=",
            UnaryStatementOp::Increment => "++=",
            UnaryStatementOp::Decrement => "--=",
        }
    }
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignOp {
    /// `+=`
    Add,
    /// `-=`
    Subtract,
    /// `^=`
    Exor,
}

impl AssignOp {
    /// The operator undoing this one.
    pub fn inverse(self) -> Self {
        match self {
            AssignOp::Add => AssignOp::Subtract,
            AssignOp::Subtract => AssignOp::Add,
            AssignOp::Exor => AssignOp::Exor,
        }
    }

    /// Source symbol of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Add => "+=",
            AssignOp::Subtract => "-=",
            AssignOp::Exor => "^=",
        }
    }
}

/// `if condition then ... else ... fi fi_condition`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IfStatement {
    /// Guard evaluated before the branches.
    pub condition: Expression,
    /// Statements run when the guard holds.
    pub then_statements: Vec<Statement>,
    /// Statements run otherwise.
    pub else_statements: Vec<Statement>,
    /// Closing guard; must evaluate like `condition` did, after the branch ran.
    pub fi_condition: Expression,
}

/// `for $var = from to to step step do ... rof`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForStatement {
    /// Loop variable name, if the loop binds one.
    pub loop_variable: Option<String>,
    /// First value; 1 when omitted.
    pub from: Option<Number>,
    /// Last value (inclusive).
    pub to: Number,
    /// Step size; 1 when omitted.
    pub step: Option<Number>,
    /// Explicitly descending step (`step -s`).
    pub descending: bool,
    /// Visit the iteration values last-to-first.
    pub reverse_order: bool,
    /// Loop body.
    pub statements: Vec<Statement>,
}

impl ForStatement {
    /// Create a loop over `from..=to` with unit step.
    pub fn new(
        loop_variable: Option<&str>,
        from: Option<Number>,
        to: Number,
        statements: Vec<Statement>,
    ) -> Self {
        Self {
            loop_variable: loop_variable.map(str::to_string),
            from,
            to,
            step: None,
            descending: false,
            reverse_order: false,
            statements,
        }
    }

    /// Set an explicit step.
    #[must_use]
    pub fn with_step(mut self, step: Number, descending: bool) -> Self {
        self.step = Some(step);
        self.descending = descending;
        self
    }
}

/// `call target(arguments)` or `uncall target(arguments)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallStatement {
    /// Name of the called module.
    pub target: String,
    /// Caller variables bound to the callee's parameters, in order.
    pub arguments: Vec<VarId>,
}

/// A statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statement {
    /// `lhs <=> rhs`
    Swap {
        lhs: VariableAccess,
        rhs: VariableAccess,
    },
    /// `op var`
    Unary {
        op: UnaryStatementOp,
        var: VariableAccess,
    },
    /// `lhs op rhs`
    Assign {
        lhs: VariableAccess,
        op: AssignOp,
        rhs: Expression,
    },
    /// Conditional.
    If(IfStatement),
    /// Bounded loop, unrolled at synthesis time.
    For(ForStatement),
    /// Module call.
    Call(CallStatement),
    /// Module call in reverse.
    Uncall(CallStatement),
    /// `skip`
    Skip,
}

impl Statement {
    /// Create an assignment.
    pub fn assign(lhs: VariableAccess, op: AssignOp, rhs: Expression) -> Self {
        Statement::Assign { lhs, op, rhs }
    }

    /// Create a unary statement.
    pub fn unary(op: UnaryStatementOp, var: VariableAccess) -> Self {
        Statement::Unary { op, var }
    }

    /// Create a swap.
    pub fn swap(lhs: VariableAccess, rhs: VariableAccess) -> Self {
        Statement::Swap { lhs, rhs }
    }

    /// Create an if statement.
    pub fn if_then_else(
        condition: Expression,
        then_statements: Vec<Statement>,
        else_statements: Vec<Statement>,
        fi_condition: Expression,
    ) -> Self {
        Statement::If(IfStatement {
            condition,
            then_statements,
            else_statements,
            fi_condition,
        })
    }

    /// Create a call.
    pub fn call(target: impl Into<String>, arguments: Vec<VarId>) -> Self {
        Statement::Call(CallStatement {
            target: target.into(),
            arguments,
        })
    }

    /// Create an uncall.
    pub fn uncall(target: impl Into<String>, arguments: Vec<VarId>) -> Self {
        Statement::Uncall(CallStatement {
            target: target.into(),
            arguments,
        })
    }

    /// Name of the statement kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Swap { .. } => "swap",
            Statement::Unary { .. } => "unary",
            Statement::Assign { .. } => "assign",
            Statement::If(_) => "if",
            Statement::For(_) => "for",
            Statement::Call(_) => "call",
            Statement::Uncall(_) => "uncall",
            Statement::Skip => "skip",
        }
    }

    /// The statement undoing this one.
    ///
    /// Nested bodies are reversed in order and inverted recursively.
    #[must_use]
    pub fn reversed(&self) -> Statement {
        match self {
            Statement::Swap { .. } | Statement::Skip => self.clone(),
            Statement::Unary { op, var } => Statement::Unary {
                op: op.inverse(),
                var: var.clone(),
            },
            Statement::Assign { lhs, op, rhs } => Statement::Assign {
                lhs: lhs.clone(),
                op: op.inverse(),
                rhs: rhs.clone(),
            },
            Statement::If(stmt) => Statement::If(IfStatement {
                condition: stmt.fi_condition.clone(),
                then_statements: reverse_statements(&stmt.then_statements),
                else_statements: reverse_statements(&stmt.else_statements),
                fi_condition: stmt.condition.clone(),
            }),
            Statement::For(stmt) => Statement::For(ForStatement {
                reverse_order: !stmt.reverse_order,
                statements: reverse_statements(&stmt.statements),
                ..stmt.clone()
            }),
            Statement::Call(call) => Statement::Uncall(call.clone()),
            Statement::Uncall(call) => Statement::Call(call.clone()),
        }
    }

    /// Variables of `module` this statement may write, following calls.
    pub fn written_variables(&self, program: &Program) -> BTreeSet<VarId> {
        let mut written = BTreeSet::new();
        let mut visiting = vec![];
        self.collect_written(program, &mut visiting, &mut written);
        written
    }

    fn collect_written<'p>(
        &self,
        program: &'p Program,
        visiting: &mut Vec<&'p str>,
        written: &mut BTreeSet<VarId>,
    ) {
        match self {
            Statement::Swap { lhs, rhs } => {
                written.insert(lhs.var);
                written.insert(rhs.var);
            }
            Statement::Unary { var, .. } => {
                written.insert(var.var);
            }
            Statement::Assign { lhs, .. } => {
                written.insert(lhs.var);
            }
            Statement::If(stmt) => {
                for s in stmt.then_statements.iter().chain(&stmt.else_statements) {
                    s.collect_written(program, visiting, written);
                }
            }
            Statement::For(stmt) => {
                for s in &stmt.statements {
                    s.collect_written(program, visiting, written);
                }
            }
            Statement::Call(call) | Statement::Uncall(call) => {
                let callee = program.find_module(&call.target);
                match callee {
                    Some(callee) if !visiting.contains(&callee.name.as_str()) => {
                        visiting.push(&callee.name);
                        let inner = written_in_body(callee, program, visiting);
                        visiting.pop();
                        for (position, param) in callee.parameters.iter().enumerate() {
                            if inner.contains(param) {
                                if let Some(arg) = call.arguments.get(position) {
                                    written.insert(*arg);
                                }
                            }
                        }
                    }
                    // Unknown or recursive callee: assume every argument changes.
                    _ => written.extend(call.arguments.iter().copied()),
                }
            }
            Statement::Skip => {}
        }
    }
}

fn written_in_body<'p>(
    module: &'p Module,
    program: &'p Program,
    visiting: &mut Vec<&'p str>,
) -> BTreeSet<VarId> {
    let mut written = BTreeSet::new();
    for statement in &module.statements {
        statement.collect_written(program, visiting, &mut written);
    }
    written
}

/// Reverse a statement sequence and invert every statement.
pub fn reverse_statements(statements: &[Statement]) -> Vec<Statement> {
    statements.iter().rev().map(Statement::reversed).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::{Variable, VariableType};

    #[test]
    fn test_reverse_assign_and_unary() {
        let a = VariableAccess::new(VarId(0));
        let add = Statement::assign(a.clone(), AssignOp::Add, Expression::numeric(3, 4));
        assert_eq!(
            add.reversed(),
            Statement::assign(a.clone(), AssignOp::Subtract, Expression::numeric(3, 4))
        );

        let inc = Statement::unary(UnaryStatementOp::Increment, a.clone());
        assert_eq!(
            inc.reversed(),
            Statement::unary(UnaryStatementOp::Decrement, a.clone())
        );

        let xor = Statement::assign(a.clone(), AssignOp::Exor, Expression::numeric(1, 4));
        assert_eq!(xor.reversed(), xor);
    }

    #[test]
    fn test_reverse_if_swaps_guards_and_branches() {
        let a = VariableAccess::new(VarId(0));
        let stmt = Statement::if_then_else(
            Expression::numeric(1, 1),
            vec![
                Statement::unary(UnaryStatementOp::Increment, a.clone()),
                Statement::unary(UnaryStatementOp::Invert, a.clone()),
            ],
            vec![],
            Expression::numeric(0, 1),
        );
        let Statement::If(rev) = stmt.reversed() else {
            panic!("expected if statement");
        };
        assert_eq!(rev.condition, Expression::numeric(0, 1));
        assert_eq!(rev.fi_condition, Expression::numeric(1, 1));
        assert_eq!(
            rev.then_statements,
            vec![
                Statement::unary(UnaryStatementOp::Invert, a.clone()),
                Statement::unary(UnaryStatementOp::Decrement, a),
            ]
        );
    }

    #[test]
    fn test_reverse_for_toggles_order() {
        let stmt = Statement::For(ForStatement::new(Some("i"), Some(Number::from(1)), Number::from(3), vec![]));
        let Statement::For(rev) = stmt.reversed() else {
            panic!("expected for statement");
        };
        assert!(rev.reverse_order);
        assert_eq!(stmt.reversed().reversed(), stmt);
    }

    #[test]
    fn test_reverse_call() {
        let call = Statement::call("f", vec![VarId(0)]);
        assert_eq!(call.reversed(), Statement::uncall("f", vec![VarId(0)]));
    }

    #[test]
    fn test_written_variables_through_calls() {
        let mut callee = Module::new("f");
        let x = callee.add_parameter(Variable::new("x", VariableType::Inout, 2));
        let _y = callee.add_parameter(Variable::new("y", VariableType::In, 2));
        callee.statements.push(Statement::unary(
            UnaryStatementOp::Increment,
            VariableAccess::new(x),
        ));

        let mut main = Module::new("main");
        let a = main.add_parameter(Variable::new("a", VariableType::Inout, 2));
        let b = main.add_parameter(Variable::new("b", VariableType::Inout, 2));
        let call = Statement::call("f", vec![b, a]);
        main.statements.push(call.clone());

        let mut program = Program::new();
        program.add_module(callee);
        program.add_module(main);

        assert_eq!(call.written_variables(&program), BTreeSet::from([b]));
    }

    #[test]
    fn test_written_variables_recursive_callee() {
        let mut f = Module::new("f");
        let x = f.add_parameter(Variable::new("x", VariableType::Inout, 2));
        f.statements.push(Statement::call("f", vec![x]));
        let mut program = Program::new();
        program.add_module(f);

        let call = Statement::call("f", vec![VarId(4)]);
        assert_eq!(call.written_variables(&program), BTreeSet::from([VarId(4)]));
    }
}

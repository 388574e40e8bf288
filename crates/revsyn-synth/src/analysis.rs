//! Whole-program precomputation done once before synthesis.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use revsyn_lang::{Program, Statement, VarId};

/// Reversed module bodies and the variables each if-statement writes.
///
/// If-statements are identified by address, so the table is only valid for
/// statements borrowed from the analysed program or from
/// [`reversed_body`](Self::reversed_body).
#[derive(Debug, Default)]
pub struct ProgramAnalysis {
    reversed: FxHashMap<String, Vec<Statement>>,
    changing: FxHashMap<*const Statement, BTreeSet<VarId>>,
}

impl ProgramAnalysis {
    /// Analyse every module of `program`.
    pub fn new(program: &Program) -> Self {
        let mut analysis = Self::default();
        for module in &program.modules {
            analysis
                .reversed
                .insert(module.name.clone(), module.reversed_statements());
        }

        let mut changing = FxHashMap::default();
        let bodies = program
            .modules
            .iter()
            .map(|m| m.statements.as_slice())
            .chain(analysis.reversed.values().map(Vec::as_slice));
        for body in bodies {
            collect(body, program, &mut changing);
        }
        analysis.changing = changing;
        analysis
    }

    /// Body run by `uncall name`.
    pub fn reversed_body(&self, name: &str) -> Option<&[Statement]> {
        self.reversed.get(name).map(Vec::as_slice)
    }

    /// Variables written by an analysed if-statement (either branch).
    pub fn changing_variables(&self, statement: &Statement) -> Option<&BTreeSet<VarId>> {
        self.changing.get(&std::ptr::from_ref(statement))
    }

    /// Number of if-statements in the table.
    pub fn num_conditionals(&self) -> usize {
        self.changing.len()
    }
}

fn collect(
    statements: &[Statement],
    program: &Program,
    changing: &mut FxHashMap<*const Statement, BTreeSet<VarId>>,
) {
    for statement in statements {
        match statement {
            Statement::If(stmt) => {
                changing.insert(
                    std::ptr::from_ref(statement),
                    statement.written_variables(program),
                );
                collect(&stmt.then_statements, program, changing);
                collect(&stmt.else_statements, program, changing);
            }
            Statement::For(stmt) => collect(&stmt.statements, program, changing),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revsyn_lang::{
        AssignOp, Expression, ForStatement, Module, Number, UnaryStatementOp, Variable,
        VariableAccess, VariableType,
    };

    fn program() -> Program {
        let mut main = Module::new("main");
        let a = main.add_parameter(Variable::new("a", VariableType::Inout, 2));
        let b = main.add_parameter(Variable::new("b", VariableType::Inout, 2));
        let inner = Statement::if_then_else(
            Expression::var(a),
            vec![Statement::unary(UnaryStatementOp::Increment, VariableAccess::new(b))],
            vec![],
            Expression::var(a),
        );
        main.add_statement(Statement::For(ForStatement::new(
            None,
            None,
            Number::from(2),
            vec![inner],
        )));
        main.add_statement(Statement::assign(
            VariableAccess::new(a),
            AssignOp::Add,
            Expression::numeric(1, 2),
        ));
        let mut program = Program::new();
        program.add_module(main);
        program
    }

    #[test]
    fn test_changing_variables_forward_and_reversed() {
        let program = program();
        let analysis = ProgramAnalysis::new(&program);
        assert_eq!(analysis.num_conditionals(), 2);

        let Statement::For(forward) = &program.modules[0].statements[0] else {
            panic!("expected loop");
        };
        assert_eq!(
            analysis.changing_variables(&forward.statements[0]),
            Some(&BTreeSet::from([VarId(1)]))
        );

        let reversed = analysis.reversed_body("main").unwrap();
        assert_eq!(reversed.len(), 2);
        let Statement::For(backward) = &reversed[1] else {
            panic!("expected loop");
        };
        assert!(analysis.changing_variables(&backward.statements[0]).is_some());
    }

    #[test]
    fn test_unknown_statement() {
        let analysis = ProgramAnalysis::new(&program());
        assert!(analysis.changing_variables(&Statement::Skip).is_none());
        assert!(analysis.reversed_body("missing").is_none());
    }
}

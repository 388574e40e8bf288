//! Property-based tests for synthesized expressions.
//!
//! Every operator is synthesized as `c ^= a op b` and simulated on random
//! operands. The result must match the operator's arithmetic, the operands
//! must be untouched, and every scratch line must be back at its constant.

mod common;

use proptest::prelude::*;
use revsyn_lang::{
    AssignOp, BinaryOp, Expression, Module, Number, ShiftOp, Statement, UnaryOp, VarId,
    Variable, VariableAccess, VariableType, mask,
};
use revsyn_synth::SynthesisSettings;

use common::{program, run, synth};

const OPERATORS: [BinaryOp; 17] = [
    BinaryOp::Add,
    BinaryOp::Subtract,
    BinaryOp::Exor,
    BinaryOp::Multiply,
    BinaryOp::Divide,
    BinaryOp::Modulo,
    BinaryOp::FracDivide,
    BinaryOp::LogicalAnd,
    BinaryOp::LogicalOr,
    BinaryOp::BitwiseAnd,
    BinaryOp::BitwiseOr,
    BinaryOp::LessThan,
    BinaryOp::GreaterThan,
    BinaryOp::Equals,
    BinaryOp::NotEquals,
    BinaryOp::LessEquals,
    BinaryOp::GreaterEquals,
];

/// `c ^= expr(a, b)` with `a`, `b` inputs of width `n`.
fn module(n: u32, result_width: u32, expr: impl FnOnce(Expression, Expression) -> Expression) -> Module {
    let mut main = Module::new("main");
    let a = main.add_parameter(Variable::new("a", VariableType::In, n));
    let b = main.add_parameter(Variable::new("b", VariableType::In, n));
    let c = main.add_parameter(Variable::new("c", VariableType::Out, result_width));
    main.add_statement(Statement::assign(
        VariableAccess::new(c),
        AssignOp::Exor,
        expr(Expression::var(a), Expression::var(b)),
    ));
    main
}

fn operands() -> impl Strategy<Value = (u32, u64, u64)> {
    (1_u32..=8).prop_flat_map(|n| (Just(n), 0..(1_u64 << n), 0..(1_u64 << n)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn binary_operators_match_arithmetic(
        (n, a, b) in operands(),
        op in prop::sample::select(OPERATORS.to_vec()),
    ) {
        let Some(expected) = op.apply(a, b, n) else {
            return Ok(());
        };
        let width = if op.is_boolean() { 1 } else { n };
        let program = program(vec![module(n, width, |a, b| Expression::binary(a, op, b))]);
        let (circuit, stats) = synth(&program, &SynthesisSettings::default());

        let result = run(&circuit, &[("a", a), ("b", b)]);
        prop_assert_eq!(result.get("c"), expected, "{} {} {} at width {}", a, op, b, n);
        prop_assert_eq!(result.get("a"), a);
        prop_assert_eq!(result.get("b"), b);
        prop_assert!(result.constants_restored());
        prop_assert!(result.reversible());
        prop_assert_eq!(stats.garbage_lines, 2 * n as usize);
        prop_assert_eq!(stats.out_of_order_releases, 0);
    }

    #[test]
    fn literal_operand_takes_variable_width(
        (n, a, literal) in operands(),
        op in prop::sample::select(vec![BinaryOp::Add, BinaryOp::Subtract, BinaryOp::Multiply]),
    ) {
        let expected = op.apply(a, literal, n).unwrap_or_default();
        let program = program(vec![module(n, n, |a, _| {
            Expression::binary(a, op, Expression::numeric(literal, 8))
        })]);
        let (circuit, _) = synth(&program, &SynthesisSettings::default());

        let result = run(&circuit, &[("a", a)]);
        prop_assert_eq!(result.get("c"), expected);
        prop_assert!(result.constants_restored());
    }

    #[test]
    fn shifts_and_negation((n, a, amount) in operands()) {
        let amount = amount % u64::from(n + 1);
        let cases = [
            (Expression::shift(Expression::var(VarId(0)), ShiftOp::Left, Number::from(amount)),
             (a << amount) & mask(n)),
            (Expression::shift(Expression::var(VarId(0)), ShiftOp::Right, Number::from(amount)),
             a >> amount),
            (Expression::unary(UnaryOp::BitwiseNot, Expression::var(VarId(0))),
             !a & mask(n)),
        ];
        for (expr, expected) in cases {
            let program = program(vec![module(n, n, |_, _| expr)]);
            let (circuit, _) = synth(&program, &SynthesisSettings::default());
            let result = run(&circuit, &[("a", a)]);
            prop_assert_eq!(result.get("c"), expected);
            prop_assert!(result.constants_restored());
        }
    }

    #[test]
    fn logical_not((n, a, _) in operands()) {
        let program = program(vec![module(n, 1, |a, _| Expression::unary(UnaryOp::LogicalNot, a))]);
        let (circuit, _) = synth(&program, &SynthesisSettings::default());
        let result = run(&circuit, &[("a", a)]);
        prop_assert_eq!(result.get("c"), u64::from(a == 0));
        prop_assert!(result.constants_restored());
    }

    #[test]
    fn nested_expression_is_garbage_free((n, a, b) in operands()) {
        // c ^= (a + b) * (a - b)
        let program = program(vec![module(n, n, |a, b| {
            Expression::binary(
                Expression::binary(a.clone(), BinaryOp::Add, b.clone()),
                BinaryOp::Multiply,
                Expression::binary(a, BinaryOp::Subtract, b),
            )
        })]);
        let (circuit, _) = synth(&program, &SynthesisSettings::default());
        let result = run(&circuit, &[("a", a), ("b", b)]);
        let expected = (a.wrapping_add(b)).wrapping_mul(a.wrapping_sub(b)) & mask(n);
        prop_assert_eq!(result.get("c"), expected);
        prop_assert!(result.constants_restored());
        prop_assert!(result.reversible());
    }
}

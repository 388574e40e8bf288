//! Benchmarks for program synthesis
//!
//! Run with: cargo bench -p revsyn-synth

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use revsyn_ir::Circuit;
use revsyn_lang::{
    AssignOp, BinaryOp, Expression, ForStatement, Module, Number, Program, Statement,
    UnaryStatementOp, Variable, VariableAccess, VariableType,
};
use revsyn_synth::{SynthesisSettings, synthesize};

/// `c ^= a * b` on `n`-bit inputs.
fn multiplier(n: u32) -> Program {
    let mut main = Module::new("main");
    let a = main.add_parameter(Variable::new("a", VariableType::In, n));
    let b = main.add_parameter(Variable::new("b", VariableType::In, n));
    let c = main.add_parameter(Variable::new("c", VariableType::Out, n));
    main.add_statement(Statement::assign(
        VariableAccess::new(c),
        AssignOp::Exor,
        Expression::binary(Expression::var(a), BinaryOp::Multiply, Expression::var(b)),
    ));
    let mut program = Program::new();
    program.add_module(main);
    program
}

/// An unrolled loop of guarded increments over an array.
fn guarded_loop(iterations: u64) -> Program {
    let mut main = Module::new("main");
    let x = main.add_parameter(Variable::new("x", VariableType::In, 4));
    let arr = main.add_parameter(Variable::new("arr", VariableType::Inout, 4).with_dimensions(vec![8]));
    let body = Statement::if_then_else(
        Expression::access(VariableAccess::new(x).with_bit(Number::from(0))),
        vec![Statement::unary(
            UnaryStatementOp::Increment,
            VariableAccess::new(arr).with_index(Expression::number(Number::loop_variable("i"), 3)),
        )],
        vec![],
        Expression::access(VariableAccess::new(x).with_bit(Number::from(0))),
    );
    main.add_statement(Statement::For(ForStatement::new(
        Some("i"),
        Some(Number::from(0)),
        Number::from(iterations - 1),
        vec![body],
    )));
    let mut program = Program::new();
    program.add_module(main);
    program
}

fn bench_multiplier(c: &mut Criterion) {
    let mut group = c.benchmark_group("multiplier");
    let settings = SynthesisSettings::default();

    for n in &[4_u32, 8, 16, 32] {
        let program = multiplier(*n);
        group.bench_with_input(BenchmarkId::new("width", n), &program, |b, program| {
            b.iter(|| {
                let mut circuit = Circuit::new("bench");
                synthesize(&mut circuit, black_box(program), &settings).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_control_flow(c: &mut Criterion) {
    let mut group = c.benchmark_group("control_flow");
    let program = guarded_loop(8);

    for efficient in [false, true] {
        let settings = SynthesisSettings::default().with_efficient_controls(efficient);
        group.bench_with_input(
            BenchmarkId::new("efficient_controls", efficient),
            &settings,
            |b, settings| {
                b.iter(|| {
                    let mut circuit = Circuit::new("bench");
                    synthesize(&mut circuit, black_box(&program), settings).unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_multiplier, bench_control_flow);
criterion_main!(benches);
